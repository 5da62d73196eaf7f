//! Point-file loading and DataPath construction.
//!
//! # Scan
//!
//! ```text
//! content:   A   A   -   B   B   A
//! anchors:   0   1   2   3   4   5      every point is an anchor
//! sub-paths: [0 1]       [3 4] [5]      "-" (no content) breaks a run
//! ```

use crate::config::{CoordinateSystem, ImportSettings};
use crate::error::{BuildError, GeometryError};
use crate::geometry::{PathGeometry, PathSpace, VertexPath};
use crate::media::{display_name, IconRegistry, MediaResolver, Medium};
use crate::path::{DataPath, SubPathId};
use crate::timing::{SubPath, SubPathPoint};
use datapath_env::PathId;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One recorded point after import normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub id: i64,
    pub position: Vector3<f64>,
    /// Euler angles in degrees, as recorded
    pub rotation: Vector3<f64>,
    pub timestamp: String,
    pub content: Option<String>,
    pub icon: Option<String>,
}

impl DataPoint {
    pub fn new(id: i64, position: Vector3<f64>, timestamp: impl Into<String>) -> Self {
        Self {
            id,
            position,
            rotation: Vector3::zeros(),
            timestamp: timestamp.into(),
            content: None,
            icon: None,
        }
    }

    /// Builder: set the content reference. Empty means none.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = non_empty(content.into());
        self
    }

    /// Builder: set the icon reference. Empty means none.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = non_empty(icon.into());
        self
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// `{x, y, z}` as written in point files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Record {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<Vec3Record> for Vector3<f64> {
    fn from(v: Vec3Record) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Vector3<f64>> for Vec3Record {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// One record of a point file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(default)]
    pub id: i64,
    pub location: Vec3Record,
    #[serde(default)]
    pub rotation: Vec3Record,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub icon: String,
}

impl From<&DataPoint> for PointRecord {
    fn from(point: &DataPoint) -> Self {
        Self {
            id: point.id,
            location: point.position.into(),
            rotation: point.rotation.into(),
            timestamp: point.timestamp.clone(),
            content: point.content.clone().unwrap_or_default(),
            icon: point.icon.clone().unwrap_or_default(),
        }
    }
}

/// Bare array or `{"points": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PointFile {
    List(Vec<PointRecord>),
    Wrapped { points: Vec<PointRecord> },
}

/// Parses a point file and applies the import settings.
pub fn parse_points(json: &str, settings: &ImportSettings) -> Result<Vec<DataPoint>, BuildError> {
    let records = match serde_json::from_str::<PointFile>(json)
        .map_err(|e| BuildError::Parse(e.to_string()))?
    {
        PointFile::List(records) => records,
        PointFile::Wrapped { points } => points,
    };

    Ok(records
        .into_iter()
        .map(|record| normalize(record, settings))
        .collect())
}

/// Reads and parses a point file.
pub fn load_points(path: impl AsRef<Path>, settings: &ImportSettings) -> Result<Vec<DataPoint>, BuildError> {
    let json = std::fs::read_to_string(path.as_ref())
        .map_err(|e| BuildError::Parse(format!("{}: {}", path.as_ref().display(), e)))?;
    parse_points(&json, settings)
}

/// Serializes points as a `{"points": [...]}` file.
pub fn points_to_json(points: &[DataPoint]) -> Result<String, BuildError> {
    let records: Vec<PointRecord> = points.iter().map(PointRecord::from).collect();
    serde_json::to_string_pretty(&serde_json::json!({ "points": records }))
        .map_err(|e| BuildError::Parse(e.to_string()))
}

/// Scale, axis remap and height collapse, in that order.
fn normalize(record: PointRecord, settings: &ImportSettings) -> DataPoint {
    let mut position: Vector3<f64> = record.location.into();
    let mut rotation: Vector3<f64> = record.rotation.into();

    position *= settings.scale;

    if settings.coordinate_system == CoordinateSystem::ZUp {
        position.swap_rows(1, 2);
        rotation.swap_rows(1, 2);
    }

    if settings.collapse_y {
        position.y = 0.0;
    }

    DataPoint {
        id: record.id,
        position,
        rotation,
        timestamp: record.timestamp,
        content: non_empty(record.content),
        icon: non_empty(record.icon),
    }
}

/// Builds DataPaths from normalized points.
///
/// Holds what the scan needs besides the points: the media resolver, the
/// directory references are relative to, and the import settings.
pub struct PathBuilder<'a> {
    resolver: &'a dyn MediaResolver,
    base_dir: String,
    settings: ImportSettings,
    name: String,
    path_id: Option<PathId>,
}

impl<'a> PathBuilder<'a> {
    pub fn new(resolver: &'a dyn MediaResolver) -> Self {
        Self {
            resolver,
            base_dir: String::new(),
            settings: ImportSettings::default(),
            name: "datapath".to_string(),
            path_id: None,
        }
    }

    /// Builder: directory content references are relative to.
    pub fn with_base_dir(mut self, base_dir: impl Into<String>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: fixed path id (default: random).
    pub fn with_path_id(mut self, id: PathId) -> Self {
        self.path_id = Some(id);
        self
    }

    /// Builds on the shipped polyline geometry.
    pub fn build(&self, points: &[DataPoint]) -> Result<DataPath<VertexPath>, BuildError> {
        let spacing = self.settings.vertex_spacing;
        self.build_with_geometry(points, |anchors, space| VertexPath::new(anchors, space, spacing))
    }

    /// Builds on a caller-supplied geometry.
    ///
    /// `make_geometry` receives every point's position in order and the
    /// configured path space.
    pub fn build_with_geometry<G, F>(&self, points: &[DataPoint], make_geometry: F) -> Result<DataPath<G>, BuildError>
    where
        G: PathGeometry,
        F: FnOnce(Vec<Vector3<f64>>, PathSpace) -> Result<G, GeometryError>,
    {
        if points.len() < 2 {
            return Err(BuildError::InsufficientData(points.len()));
        }

        let mut sub_paths: Vec<SubPath> = Vec::new();
        let mut icons = IconRegistry::new();
        let mut positions = Vec::with_capacity(points.len());
        let mut last_content: Option<&str> = None;

        for (global_index, point) in points.iter().enumerate() {
            positions.push(point.position);

            let Some(content) = point.content.as_deref() else {
                last_content = None;
                continue;
            };

            if last_content != Some(content) {
                let id = SubPathId(sub_paths.len());
                let mut sub_path = SubPath::new(id, content);
                sub_path.medium = self.resolve_medium(content);
                sub_path.icon = point.icon.as_deref().and_then(|icon| self.register_icon(icon, &mut icons));
                sub_paths.push(sub_path);
                last_content = Some(content);
            }

            if let Some(current) = sub_paths.last_mut() {
                current
                    .points
                    .push(SubPathPoint::new(global_index, point.position, point.timestamp.as_str()));
            }
        }

        let geometry = make_geometry(positions, self.settings.path_space())?;
        let id = self.path_id.unwrap_or_default();

        info!(
            "Built path {} ({}): {} points, {} sub-paths, {} icons",
            id,
            self.name,
            points.len(),
            sub_paths.len(),
            icons.len()
        );

        Ok(DataPath::new(id, self.name.clone(), geometry, sub_paths, icons))
    }

    fn resolve_medium(&self, content: &str) -> Medium {
        match self.resolver.resolve(content, &self.base_dir) {
            Ok(medium) => medium,
            Err(e) => {
                warn!("No medium for {}: {}", content, e);
                Medium::None
            }
        }
    }

    fn register_icon(&self, icon: &str, icons: &mut IconRegistry) -> Option<usize> {
        if let Some(index) = icons.index_of(&display_name(icon)) {
            return Some(index);
        }
        match self.resolver.resolve_icon(icon, &self.base_dir) {
            Ok(asset) => {
                let index = icons.register(asset);
                debug!("Registered icon {} as {}", icon, index);
                Some(index)
            }
            Err(e) => {
                warn!("No icon for {}: {}", icon, e);
                None
            }
        }
    }
}
