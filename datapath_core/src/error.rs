//! Error taxonomy for path construction, timing and following.

use crate::path::SubPathId;
use thiserror::Error;

/// Errors raised while turning a point list into a DataPath.
///
/// These abort the build and surface to the caller.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Fewer than two geometry points
    #[error("Insufficient data: a path needs at least 2 points, got {0}")]
    InsufficientData(usize),

    /// The point file could not be parsed
    #[error("Point list parse error: {0}")]
    Parse(String),

    /// The geometry collaborator rejected the positions
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// Errors raised by the per-SubPath timing initialization.
///
/// A failure only affects the SubPath it was raised for; it stays selectable
/// but is not traversable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingError {
    /// Timestamp string is not a recognizable date-time
    #[error("Malformed timestamp {value:?} at point {global_index}")]
    TimestampParse { global_index: usize, value: String },

    /// Timestamps go backwards within the SubPath
    #[error("Out-of-order timestamp at point {global_index}: {relative_secs:.3}s after start, previous point at {previous_secs:.3}s")]
    Ordering {
        global_index: usize,
        previous_secs: f64,
        relative_secs: f64,
    },

    /// Anchor index outside the SubPath's global range
    #[error("Point index {index} outside sub-path range {first}..={last}")]
    IndexOutOfRange { index: usize, first: usize, last: usize },

    /// The anchor has no vertex in the geometry mapping
    #[error("Anchor {0} has no vertex mapping")]
    UnmappedAnchor(usize),
}

/// Errors raised when attaching or steering the follower.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FollowError {
    #[error("Unknown sub-path {0}")]
    UnknownSubPath(SubPathId),

    #[error("Sub-path {id} is not traversable: {reason}")]
    NotTraversable { id: SubPathId, reason: String },

    #[error("Start index {index} outside sub-path of {len} points")]
    StartOutOfRange { index: usize, len: usize },

    #[error("No sub-path attached")]
    NotAttached,
}

/// Media resolution failures. Never fatal: the SubPath falls back to no medium.
#[derive(Debug, Error)]
pub enum MediaError {
    /// No file at the cleaned location and the directory search found nothing
    #[error("Media not found: {0}")]
    NotFound(String),

    /// File extension is not a known image, video or audio type
    #[error("Unknown media type: {0}")]
    UnknownType(String),

    /// The reference resolved, but not to the kind that was asked for
    #[error("Expected {expected} for {path}")]
    WrongKind { expected: &'static str, path: String },
}

impl MediaError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}

/// Errors raised by a `PathGeometry` implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("A path needs at least 2 anchors, got {0}")]
    TooFewPoints(usize),

    #[error("Anchor {index} out of range (path has {count} anchors)")]
    AnchorOutOfRange { index: usize, count: usize },

    #[error("Non-finite coordinate at anchor {0}")]
    NonFinite(usize),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} = {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Config I/O error: {0}")]
    Io(String),
}
