//! Exhibit configuration.
//!
//! Every tunable of the import, follow and projection stages lives here. The
//! whole tree deserializes from JSON with per-field defaults, so a config file
//! only needs to name what it changes:
//!
//! ```json
//! { "follower": { "speed_scale": 2.0 }, "projector": { "y_offset": 1.6 } }
//! ```

use crate::error::ConfigError;
use crate::geometry::PathSpace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Axis convention of the recorded point file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Height is stored in `z`; swapped into `y` on import
    ZUp,
    /// Height is already in `y`
    #[default]
    YUp,
}

/// How the follower applies path positions to the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Copy x/z only; height is left to the avatar (and gravity)
    #[default]
    Planar,
    /// Copy the full 3D position, including the path's height
    Full,
}

/// How the follower applies path orientation to the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Heading only
    #[default]
    YawOnly,
    /// Full path orientation
    Full,
}

/// Where video media comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    /// Bundled clip resolved from the resource root
    #[default]
    Clip,
    /// URL on a media server, or a file under the streaming directory
    Url,
}

/// Point-file import settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Axis convention of the source file (default: YUp)
    pub coordinate_system: CoordinateSystem,

    /// Uniform scale applied to locations (default: 1.0)
    pub scale: f64,

    /// Flatten all heights to 0 and build a planar path (default: false)
    pub collapse_y: bool,

    /// Target spacing between sampled vertices in meters (default: 0.1)
    pub vertex_spacing: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            coordinate_system: CoordinateSystem::YUp,
            scale: 1.0,
            collapse_y: false,
            vertex_spacing: 0.1,
        }
    }
}

impl ImportSettings {
    /// Geometry space the imported path is built in.
    pub fn path_space(&self) -> PathSpace {
        if self.collapse_y {
            PathSpace::Xz
        } else {
            PathSpace::Xyz
        }
    }

    /// Builder: set the coordinate system.
    pub fn with_coordinate_system(mut self, coordinate_system: CoordinateSystem) -> Self {
        self.coordinate_system = coordinate_system;
        self
    }

    /// Builder: set the location scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Builder: flatten heights.
    pub fn with_collapse_y(mut self, collapse_y: bool) -> Self {
        self.collapse_y = collapse_y;
        self
    }
}

/// Path follower tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// Playback speed multiplier, 0.1..=10 (default: 1.0)
    pub speed_scale: f64,

    /// Speed used for instantaneous jumps (default: 0.0001 m/s)
    pub min_speed: f64,

    /// Position application (default: Planar)
    pub position_mode: PositionMode,

    /// Rotation application (default: YawOnly)
    pub rotation_mode: RotationMode,

    /// Downward acceleration for an ungrounded avatar in Planar mode (default: 20)
    pub gravity: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            speed_scale: 1.0,
            min_speed: 0.0001,
            position_mode: PositionMode::Planar,
            rotation_mode: RotationMode::YawOnly,
            gravity: 20.0,
        }
    }
}

impl FollowerConfig {
    pub const SPEED_SCALE_MIN: f64 = 0.1;
    pub const SPEED_SCALE_MAX: f64 = 10.0;

    /// Builder: set the playback multiplier.
    pub fn with_speed_scale(mut self, speed_scale: f64) -> Self {
        self.speed_scale = speed_scale;
        self
    }

    /// Builder: set the position mode.
    pub fn with_position_mode(mut self, position_mode: PositionMode) -> Self {
        self.position_mode = position_mode;
        self
    }

    /// Builder: set the rotation mode.
    pub fn with_rotation_mode(mut self, rotation_mode: RotationMode) -> Self {
        self.rotation_mode = rotation_mode;
        self
    }
}

/// Ground projection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Height above ground, 0..=2 (default: 0.0)
    pub y_offset: f64,

    /// Ceiling the downward probes start from (default: 2.0)
    pub max_height: f64,

    /// Re-project whenever the path origin moves (default: true)
    pub auto_project: bool,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            y_offset: 0.0,
            max_height: 2.0,
            auto_project: true,
        }
    }
}

impl ProjectorConfig {
    pub const Y_OFFSET_MIN: f64 = 0.0;
    pub const Y_OFFSET_MAX: f64 = 2.0;

    /// Builder: set the height above ground.
    pub fn with_y_offset(mut self, y_offset: f64) -> Self {
        self.y_offset = y_offset;
        self
    }

    /// Length of each downward probe: from the ceiling to as far below ground.
    pub fn probe_distance(&self) -> f64 {
        self.max_height * 2.0
    }
}

/// Media lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Where video media comes from (default: Clip)
    pub video_source: VideoSource,

    /// Media server base URL used in Url mode (default: none)
    pub server_url: Option<String>,

    /// Root that content references are resolved against (default: "Resources")
    pub resource_root: PathBuf,

    /// Directory local video URLs are expanded against (default: "StreamingAssets")
    pub streaming_root: PathBuf,

    /// Prefix stripped from content references (default: "Assets/Resources/")
    pub resource_prefix: String,

    /// Path fragments removed from content references
    pub skipped_words: Vec<String>,

    /// Fall back to a file-name search when the direct lookup fails (default: true)
    pub search_directory: bool,

    /// Upper bound for one reachability probe in milliseconds (default: 1200)
    pub probe_timeout_ms: u64,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            video_source: VideoSource::Clip,
            server_url: None,
            resource_root: PathBuf::from("Resources"),
            streaming_root: PathBuf::from("StreamingAssets"),
            resource_prefix: "Assets/Resources/".to_string(),
            skipped_words: vec![
                "saved/".to_string(),
                "icons//".to_string(),
                "public/".to_string(),
            ],
            search_directory: true,
            probe_timeout_ms: 1200,
        }
    }
}

impl MediaSettings {
    /// Probe timeout as a `Duration`.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Builder: set the resource root.
    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_root = root.into();
        self
    }

    /// Builder: switch to URL video and set the server.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.video_source = VideoSource::Url;
        self.server_url = Some(url.into());
        self
    }
}

/// Full exhibit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExhibitConfig {
    /// Exhibit name (for logging)
    pub name: String,

    /// Frame rate of the runtime loop in Hz (default: 60)
    pub tick_rate_hz: u32,

    pub import: ImportSettings,
    pub follower: FollowerConfig,
    pub projector: ProjectorConfig,
    pub media: MediaSettings,
}

impl Default for ExhibitConfig {
    fn default() -> Self {
        Self {
            name: "datapath-exhibit".to_string(),
            tick_rate_hz: 60,
            import: ImportSettings::default(),
            follower: FollowerConfig::default(),
            projector: ProjectorConfig::default(),
            media: MediaSettings::default(),
        }
    }
}

impl ExhibitConfig {
    /// Parses and validates a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Checks every bounded field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "follower.speed_scale",
            self.follower.speed_scale,
            FollowerConfig::SPEED_SCALE_MIN,
            FollowerConfig::SPEED_SCALE_MAX,
        )?;
        check_range(
            "projector.y_offset",
            self.projector.y_offset,
            ProjectorConfig::Y_OFFSET_MIN,
            ProjectorConfig::Y_OFFSET_MAX,
        )?;
        check_positive("follower.min_speed", self.follower.min_speed)?;
        check_positive("import.scale", self.import.scale)?;
        check_positive("import.vertex_spacing", self.import.vertex_spacing)?;
        check_positive("projector.max_height", self.projector.max_height)?;
        check_range("follower.gravity", self.follower.gravity, 0.0, f64::MAX)?;
        check_range("tick_rate_hz", self.tick_rate_hz as f64, 1.0, 1000.0)?;
        Ok(())
    }

    /// Frame duration at the configured tick rate.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        })
    }
}
