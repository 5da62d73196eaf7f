//! DataPath Core - Walkthroughs of Timestamped Position Recordings
//!
//! This library turns a recorded walk into an explorable exhibit:
//! 1. **Path building**: timestamped points grouped into SubPaths by content
//! 2. **Timing model**: relative times, path distances and speeds per point
//! 3. **Path following**: an avatar replays the walk, dwelling where the walker stood still
//! 4. **Ground projection**: anchors dropped onto terrain below them

pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod follower;
pub mod geometry;
pub mod ground;
pub mod media;
pub mod path;
pub mod runtime;
pub mod timing;

// Re-export key types for convenience
pub use builder::{load_points, parse_points, DataPoint, PathBuilder};
pub use config::{
    CoordinateSystem, ExhibitConfig, FollowerConfig, ImportSettings, MediaSettings, PositionMode, ProjectorConfig,
    RotationMode, VideoSource,
};
pub use error::{BuildError, ConfigError, FollowError, GeometryError, MediaError, TimingError};
pub use events::{EventBus, GameState, PathEvent};
pub use follower::{AvatarBody, FollowProgress, FollowStart, FollowState, KinematicBody, PathFollower};
pub use geometry::{PathGeometry, PathSpace, VertexPath};
pub use ground::{GroundCollider, GroundPlane, GroundProjector, HeightMap, ProjectionReport, RaycastHit};
pub use media::{FileMediaResolver, IconRegistry, MediaAsset, MediaResolver, Medium, MediumKind};
pub use path::{DataPath, SubPathId};
pub use runtime::{ExhibitRuntime, Interaction, InteractionOutcome, MediaCheck, MediaValidation};
pub use timing::{SubPath, SubPathPoint, TimingStatus};
