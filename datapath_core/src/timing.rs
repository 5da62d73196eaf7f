//! SubPath timing model.
//!
//! Every SubPath point carries the wall-clock time it was recorded at. After
//! the geometry is built these are turned into seconds since the SubPath's
//! first point, paired with the cumulative travel distance at the point's
//! anchor, and differenced into a speed per segment:
//!
//! ```text
//! point      t(s)   dist(m)   speed (to next)
//!   0        0.0     0.0      1.0
//!   1        2.0     2.0      0.0   <- same position, time passes: dwell
//!   2        5.0     2.0      0.5
//!   3        7.0     3.0      inf   <- last point
//! ```
//!
//! Zero speed means "stay put for the time gap"; infinite speed means the
//! position changed with no time passing.

use crate::error::TimingError;
use crate::geometry::PathGeometry;
use crate::media::Medium;
use crate::path::SubPathId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use nalgebra::Vector3;
use serde::Serialize;
use tracing::{debug, warn};

/// Value of a derived field that has not been computed.
pub const UNCOMPUTED: f64 = -1.0;

/// Naive layouts accepted besides RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
];

/// Parses a recorded timestamp.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Speed over one segment.
///
/// Zero distance is a dwell (speed 0) even with zero time; a position change
/// with zero time is infinite.
pub fn segment_speed(distance: f64, seconds: f64) -> f64 {
    if distance == 0.0 {
        0.0
    } else if seconds == 0.0 {
        f64::INFINITY
    } else {
        distance / seconds
    }
}

/// Timing state of a SubPath.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimingStatus {
    /// Not initialized yet
    #[default]
    Pending,
    /// Derived fields are valid
    Ready,
    /// Initialization failed; derived fields are reset to `UNCOMPUTED`
    Failed(TimingError),
}

/// One recorded point as seen by its SubPath.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubPathPoint {
    /// Index of the point (and its anchor) in the whole path
    pub global_index: usize,

    /// Recorded position, in path-local space
    pub position: Vector3<f64>,

    /// Timestamp as recorded
    pub timestamp: String,

    /// Parsed timestamp
    pub absolute_time: Option<DateTime<Utc>>,

    /// Seconds since the SubPath's first point, or `UNCOMPUTED`
    pub relative_time_secs: f64,

    /// Cumulative travel distance at the point's anchor, or `UNCOMPUTED`
    pub path_distance: f64,

    /// Speed over the segment to the next point
    pub speed: f64,
}

impl SubPathPoint {
    pub fn new(global_index: usize, position: Vector3<f64>, timestamp: impl Into<String>) -> Self {
        Self {
            global_index,
            position,
            timestamp: timestamp.into(),
            absolute_time: None,
            relative_time_secs: UNCOMPUTED,
            path_distance: UNCOMPUTED,
            speed: UNCOMPUTED,
        }
    }

    fn clear_derived(&mut self) {
        self.absolute_time = None;
        self.relative_time_secs = UNCOMPUTED;
        self.path_distance = UNCOMPUTED;
        self.speed = UNCOMPUTED;
    }
}

/// Maximal run of consecutive points sharing one content reference.
#[derive(Debug, Clone)]
pub struct SubPath {
    pub id: SubPathId,

    /// Content reference shared by all points
    pub content: String,

    /// Points in recording order; global indices are contiguous
    pub points: Vec<SubPathPoint>,

    /// Resolved medium
    pub medium: Medium,

    /// Index into the path's icon registry
    pub icon: Option<usize>,

    pub timing: TimingStatus,
}

impl SubPath {
    pub fn new(id: SubPathId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            points: Vec::new(),
            medium: Medium::None,
            icon: None,
            timing: TimingStatus::Pending,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_global_index(&self) -> Option<usize> {
        self.points.first().map(|p| p.global_index)
    }

    pub fn last_global_index(&self) -> Option<usize> {
        self.points.last().map(|p| p.global_index)
    }

    pub fn contains_global_index(&self, global_index: usize) -> bool {
        match (self.first_global_index(), self.last_global_index()) {
            (Some(first), Some(last)) => (first..=last).contains(&global_index),
            _ => false,
        }
    }

    /// True if the follower may attach to this SubPath.
    pub fn is_traversable(&self) -> bool {
        self.timing == TimingStatus::Ready && !self.points.is_empty()
    }

    pub fn point(&self, local_index: usize) -> Option<&SubPathPoint> {
        self.points.get(local_index)
    }

    /// Local index of a global index.
    ///
    /// One past the last point is clamped to the last point, so callers can
    /// look ahead from the final segment.
    pub fn local_index_of(&self, global_index: usize) -> Result<usize, TimingError> {
        let (first, last) = match (self.first_global_index(), self.last_global_index()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(TimingError::IndexOutOfRange {
                    index: global_index,
                    first: 0,
                    last: 0,
                })
            }
        };

        let index = if global_index == last + 1 { last } else { global_index };
        if index < first || index > last {
            return Err(TimingError::IndexOutOfRange {
                index: global_index,
                first,
                last,
            });
        }
        Ok(index - first)
    }

    /// Point at a global index, with the one-past-the-end clamp.
    pub fn point_by_global_index(&self, global_index: usize) -> Result<&SubPathPoint, TimingError> {
        let local = self.local_index_of(global_index)?;
        Ok(&self.points[local])
    }

    /// Relative time of the point at a global index.
    pub fn relative_time_at(&self, global_index: usize) -> Result<f64, TimingError> {
        Ok(self.point_by_global_index(global_index)?.relative_time_secs)
    }

    /// Seconds from first to last point.
    pub fn duration_secs(&self) -> f64 {
        self.points
            .last()
            .map(|p| p.relative_time_secs.max(0.0))
            .unwrap_or(0.0)
    }

    /// Fraction of the SubPath's duration elapsed at a global index.
    ///
    /// A SubPath with zero duration reports 0 at its first point and 1
    /// everywhere else.
    pub fn time_ratio_at(&self, global_index: usize) -> Result<f64, TimingError> {
        let local = self.local_index_of(global_index)?;
        let duration = self.duration_secs();
        if duration > 0.0 {
            Ok(self.points[local].relative_time_secs / duration)
        } else if local == 0 {
            Ok(0.0)
        } else {
            Ok(1.0)
        }
    }

    /// Point whose relative time is closest to `seconds`. Ties go to the
    /// earlier point.
    pub fn closest_to_relative_time(&self, seconds: f64) -> Option<&SubPathPoint> {
        let mut best: Option<(&SubPathPoint, f64)> = None;
        for point in &self.points {
            let gap = (point.relative_time_secs - seconds).abs();
            match best {
                Some((_, best_gap)) if gap >= best_gap => {}
                _ => best = Some((point, gap)),
            }
        }
        best.map(|(point, _)| point)
    }

    /// Local index of the point nearest to `world`, excluding the last point
    /// (there is nothing to follow from there). Positions are offset by
    /// `origin`.
    pub fn closest_local_index_to(&self, world: &Vector3<f64>, origin: &Vector3<f64>) -> Option<usize> {
        let candidates = self.points.len().saturating_sub(1);
        (0..candidates)
            .map(|i| (i, (self.points[i].position + origin - world).norm()))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if d >= best_d => best,
                _ => Some((i, d)),
            })
            .map(|(i, _)| i)
    }

    /// Derives relative times, distances and speeds.
    ///
    /// On failure the derived fields are reset, the status is `Failed` and
    /// the error is returned as well.
    pub fn initialize_timing<G: PathGeometry + ?Sized>(
        &mut self,
        geometry: &G,
        anchor_vertices: &[usize],
    ) -> Result<(), TimingError> {
        let result = self
            .compute_relative_times()
            .and_then(|_| self.compute_distances(geometry, anchor_vertices));
        self.settle(result)
    }

    /// Recomputes distances and speeds after the geometry changed. Relative
    /// times are kept. Only SubPaths whose timing is `Ready` are touched.
    pub fn refresh_distances<G: PathGeometry + ?Sized>(
        &mut self,
        geometry: &G,
        anchor_vertices: &[usize],
    ) -> Result<(), TimingError> {
        if self.timing != TimingStatus::Ready {
            return Ok(());
        }
        let result = self.compute_distances(geometry, anchor_vertices);
        self.settle(result)
    }

    fn settle(&mut self, result: Result<(), TimingError>) -> Result<(), TimingError> {
        match &result {
            Ok(()) => {
                self.timing = TimingStatus::Ready;
                debug!(
                    "Sub-path {} ready: {} points, {:.2}s",
                    self.id,
                    self.points.len(),
                    self.duration_secs()
                );
            }
            Err(e) => {
                warn!("Sub-path {} ({}) timing failed: {}", self.id, self.content, e);
                for point in &mut self.points {
                    point.clear_derived();
                }
                self.timing = TimingStatus::Failed(e.clone());
            }
        }
        result
    }

    fn compute_relative_times(&mut self) -> Result<(), TimingError> {
        let mut first: Option<DateTime<Utc>> = None;
        let mut previous_secs = 0.0;

        for point in &mut self.points {
            let absolute = parse_timestamp(&point.timestamp).ok_or_else(|| TimingError::TimestampParse {
                global_index: point.global_index,
                value: point.timestamp.clone(),
            })?;
            let elapsed = absolute - *first.get_or_insert(absolute);
            let relative_secs = elapsed
                .num_microseconds()
                .map(|us| us as f64 / 1_000_000.0)
                .unwrap_or_else(|| elapsed.num_milliseconds() as f64 / 1000.0);

            if relative_secs < previous_secs {
                return Err(TimingError::Ordering {
                    global_index: point.global_index,
                    previous_secs,
                    relative_secs,
                });
            }

            point.absolute_time = Some(absolute);
            point.relative_time_secs = relative_secs;
            previous_secs = relative_secs;
        }
        Ok(())
    }

    fn compute_distances<G: PathGeometry + ?Sized>(
        &mut self,
        geometry: &G,
        anchor_vertices: &[usize],
    ) -> Result<(), TimingError> {
        for point in &mut self.points {
            let vertex = anchor_vertices
                .get(point.global_index)
                .copied()
                .ok_or(TimingError::UnmappedAnchor(point.global_index))?;
            point.path_distance = geometry.distance_at_vertex(vertex);
        }

        let count = self.points.len();
        for i in 0..count {
            self.points[i].speed = match self.points.get(i + 1) {
                Some(next) => segment_speed(
                    next.path_distance - self.points[i].path_distance,
                    next.relative_time_secs - self.points[i].relative_time_secs,
                ),
                None => f64::INFINITY,
            };
        }
        Ok(())
    }

    /// Per-point debug table.
    pub fn summary(&self) -> SubPathSummary {
        SubPathSummary {
            id: self.id,
            content: self.content.clone(),
            rows: self
                .points
                .iter()
                .map(|p| SummaryRow {
                    global_index: p.global_index,
                    relative_time_secs: p.relative_time_secs,
                    path_distance: p.path_distance,
                    speed: p.speed,
                })
                .collect(),
        }
    }
}

/// Debug table of a SubPath's timing.
#[derive(Debug, Clone, Serialize)]
pub struct SubPathSummary {
    pub id: SubPathId,
    pub content: String,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub global_index: usize,
    pub relative_time_secs: f64,
    pub path_distance: f64,
    pub speed: f64,
}

impl std::fmt::Display for SubPathSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "sub-path {} ({})", self.id, self.content)?;
        writeln!(f, "{:>6} {:>10} {:>10} {:>10}", "index", "time[s]", "dist[m]", "speed")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:>6} {:>10.3} {:>10.3} {:>10.4}",
                row.global_index, row.relative_time_secs, row.path_distance, row.speed
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{anchor_vertex_indices, PathSpace, VertexPath};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn sub_path(points: &[(f64, &str)]) -> (SubPath, VertexPath) {
        let positions: Vec<Vector3<f64>> = points.iter().map(|(x, _)| Vector3::new(*x, 0.0, 0.0)).collect();
        let mut sp = SubPath::new(SubPathId(0), "A.jpg");
        for (i, (x, ts)) in points.iter().enumerate() {
            sp.points.push(SubPathPoint::new(i, Vector3::new(*x, 0.0, 0.0), *ts));
        }
        let geometry = VertexPath::new(positions, PathSpace::Xyz, 0.1).unwrap();
        (sp, geometry)
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 3)
            .unwrap()
            .and_utc();

        assert_eq!(parse_timestamp("2024-05-01T12:00:03Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:00:03+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:00:03"), Some(expected));
        assert_eq!(parse_timestamp("05/01/2024 12:00:03"), Some(expected));
        assert_eq!(parse_timestamp("01.05.2024 12:00:03"), Some(expected));
        assert!(parse_timestamp("2024-05-01T12:00:03.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_segment_speed() {
        assert_eq!(segment_speed(0.0, 0.0), 0.0);
        assert_eq!(segment_speed(0.0, 3.0), 0.0);
        assert_eq!(segment_speed(2.0, 0.0), f64::INFINITY);
        assert_eq!(segment_speed(2.0, 4.0), 0.5);
    }

    #[test]
    fn test_dwell_table() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (2.0, "2024-01-01T00:00:02Z"),
            (2.0, "2024-01-01T00:00:05Z"),
            (3.0, "2024-01-01T00:00:07Z"),
        ]);
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();

        let times: Vec<f64> = sp.points.iter().map(|p| p.relative_time_secs).collect();
        assert_eq!(times, vec![0.0, 2.0, 5.0, 7.0]);

        assert_relative_eq!(sp.points[0].speed, 1.0, epsilon = 1e-9);
        assert_eq!(sp.points[1].speed, 0.0);
        assert_relative_eq!(sp.points[2].speed, 0.5, epsilon = 1e-9);
        assert_eq!(sp.points[3].speed, f64::INFINITY);
        assert!(sp.is_traversable());
    }

    #[test]
    fn test_dwell_after_walk_along_z() {
        let positions = vec![Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 10.0)];
        let geometry = VertexPath::new(positions.clone(), PathSpace::Xyz, 0.1).unwrap();
        let mut sp = SubPath::new(SubPathId(0), "A.jpg");
        for (i, (position, ts)) in positions
            .into_iter()
            .zip(["2024-01-01T00:00:00Z", "2024-01-01T00:00:05Z", "2024-01-01T00:00:05Z"])
            .enumerate()
        {
            sp.points.push(SubPathPoint::new(i, position, ts));
        }
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();

        assert_relative_eq!(sp.points[0].speed, 2.0, epsilon = 1e-9);
        assert_eq!(sp.points[1].speed, 0.0);
        assert_eq!(sp.points[2].speed, f64::INFINITY);
        assert_relative_eq!(sp.duration_secs(), 5.0);
    }

    #[test]
    fn test_initialize_timing_twice_is_stable() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (2.0, "2024-01-01T00:00:02Z"),
            (2.0, "2024-01-01T00:00:05Z"),
            (2.0, "2024-01-01T00:00:05Z"),
            (6.0, "2024-01-01T00:00:05Z"),
        ]);
        let mapping = anchor_vertex_indices(&geometry);
        sp.initialize_timing(&geometry, &mapping).unwrap();
        let first = sp.points.clone();

        sp.initialize_timing(&geometry, &mapping).unwrap();
        assert_eq!(sp.points, first);

        sp.refresh_distances(&geometry, &mapping).unwrap();
        assert_eq!(sp.points, first);
        assert_eq!(sp.timing, TimingStatus::Ready);
    }

    #[test]
    fn test_instantaneous_jump_is_infinite() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (0.0, "2024-01-01T00:00:00Z"),
            (5.0, "2024-01-01T00:00:00Z"),
        ]);
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();

        assert_eq!(sp.points[0].speed, 0.0);
        assert_eq!(sp.points[1].speed, f64::INFINITY);
    }

    #[test]
    fn test_malformed_timestamp_fails_sub_path() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (1.0, "not a time"),
            (2.0, "2024-01-01T00:00:02Z"),
        ]);
        let err = sp
            .initialize_timing(&geometry, &anchor_vertex_indices(&geometry))
            .unwrap_err();

        assert_eq!(
            err,
            TimingError::TimestampParse {
                global_index: 1,
                value: "not a time".to_string()
            }
        );
        assert_eq!(sp.timing, TimingStatus::Failed(err));
        assert!(!sp.is_traversable());
        assert!(sp
            .points
            .iter()
            .all(|p| p.relative_time_secs == UNCOMPUTED && p.speed == UNCOMPUTED));
    }

    #[test]
    fn test_out_of_order_is_rejected() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:05Z"),
            (1.0, "2024-01-01T00:00:02Z"),
        ]);
        let err = sp
            .initialize_timing(&geometry, &anchor_vertex_indices(&geometry))
            .unwrap_err();
        assert!(matches!(err, TimingError::Ordering { global_index: 1, .. }));
    }

    #[test]
    fn test_global_index_lookup_and_clamp() {
        let mut sp = SubPath::new(SubPathId(1), "B.jpg");
        for i in 3..6 {
            sp.points.push(SubPathPoint::new(i, Vector3::zeros(), ""));
        }

        assert_eq!(sp.local_index_of(3).unwrap(), 0);
        assert_eq!(sp.local_index_of(5).unwrap(), 2);
        // One past the end clamps to the last point
        assert_eq!(sp.local_index_of(6).unwrap(), 2);
        assert!(matches!(
            sp.local_index_of(7),
            Err(TimingError::IndexOutOfRange { index: 7, first: 3, last: 5 })
        ));
        assert!(sp.local_index_of(2).is_err());
    }

    #[test]
    fn test_closest_to_relative_time_prefers_earlier() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (1.0, "2024-01-01T00:00:02Z"),
            (2.0, "2024-01-01T00:00:04Z"),
        ]);
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();

        assert_eq!(sp.closest_to_relative_time(3.0).unwrap().global_index, 1);
        assert_eq!(sp.closest_to_relative_time(3.1).unwrap().global_index, 2);
        assert_eq!(sp.closest_to_relative_time(-10.0).unwrap().global_index, 0);
        assert_eq!(sp.closest_to_relative_time(99.0).unwrap().global_index, 2);
    }

    #[test]
    fn test_closest_point_excludes_last() {
        let (sp, _) = sub_path(&[(0.0, ""), (1.0, ""), (2.0, "")]);
        let origin = Vector3::zeros();
        assert_eq!(sp.closest_local_index_to(&Vector3::new(0.9, 0.0, 0.0), &origin), Some(1));
        assert_eq!(sp.closest_local_index_to(&Vector3::new(5.0, 0.0, 0.0), &origin), Some(1));
        let offset = Vector3::new(10.0, 0.0, 0.0);
        assert_eq!(sp.closest_local_index_to(&Vector3::new(10.0, 0.0, 0.0), &offset), Some(0));
    }

    #[test]
    fn test_time_ratio() {
        let (mut sp, geometry) = sub_path(&[
            (0.0, "2024-01-01T00:00:00Z"),
            (1.0, "2024-01-01T00:00:01Z"),
            (2.0, "2024-01-01T00:00:04Z"),
        ]);
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();
        assert_relative_eq!(sp.time_ratio_at(1).unwrap(), 0.25, epsilon = 1e-9);
        assert_relative_eq!(sp.time_ratio_at(2).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_renders_every_row() {
        let (mut sp, geometry) = sub_path(&[(0.0, "2024-01-01T00:00:00Z"), (1.0, "2024-01-01T00:00:01Z")]);
        sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();
        let table = sp.summary().to_string();
        assert_eq!(table.lines().count(), 4);
    }

    proptest! {
        #[test]
        fn prop_timing_invariants(
            steps in prop::collection::vec((0.0f64..5.0, 0u32..10), 1..20),
        ) {
            let mut x = 0.0;
            let mut seconds = 0u32;
            let mut points = vec![(0.0, "2024-01-01T00:00:00Z".to_string())];
            for (dx, dt) in &steps {
                x += dx.round();
                seconds += dt;
                let ts = format!("2024-01-01T{:02}:{:02}:{:02}Z", seconds / 3600, (seconds / 60) % 60, seconds % 60);
                points.push((x, ts));
            }

            let positions: Vec<Vector3<f64>> = points.iter().map(|(x, _)| Vector3::new(*x, 0.0, 0.0)).collect();
            let geometry = VertexPath::new(positions, PathSpace::Xyz, 0.1).unwrap();
            let mut sp = SubPath::new(SubPathId(0), "A");
            for (i, (x, ts)) in points.iter().enumerate() {
                sp.points.push(SubPathPoint::new(i, Vector3::new(*x, 0.0, 0.0), ts.clone()));
            }
            sp.initialize_timing(&geometry, &anchor_vertex_indices(&geometry)).unwrap();

            prop_assert_eq!(sp.points[0].relative_time_secs, 0.0);
            prop_assert_eq!(sp.points.last().unwrap().speed, f64::INFINITY);
            for pair in sp.points.windows(2) {
                prop_assert!(pair[1].relative_time_secs >= pair[0].relative_time_secs);
                prop_assert!(pair[1].path_distance >= pair[0].path_distance);
                let dd = pair[1].path_distance - pair[0].path_distance;
                let dt = pair[1].relative_time_secs - pair[0].relative_time_secs;
                if dd == 0.0 {
                    prop_assert_eq!(pair[0].speed, 0.0);
                } else if dt == 0.0 {
                    prop_assert_eq!(pair[0].speed, f64::INFINITY);
                } else {
                    prop_assert!((pair[0].speed - dd / dt).abs() < 1e-9);
                }
            }
        }

        #[test]
        fn prop_timing_is_idempotent(
            steps in prop::collection::vec((0.0f64..5.0, 0u32..10), 1..20),
        ) {
            let mut x = 0.0;
            let mut seconds = 0u32;
            let mut positions = vec![Vector3::zeros()];
            let mut sp = SubPath::new(SubPathId(0), "A");
            sp.points.push(SubPathPoint::new(0, Vector3::zeros(), "2024-01-01T00:00:00Z"));
            for (i, (dx, dt)) in steps.iter().enumerate() {
                x += dx.round();
                seconds += dt;
                let ts = format!("2024-01-01T{:02}:{:02}:{:02}Z", seconds / 3600, (seconds / 60) % 60, seconds % 60);
                positions.push(Vector3::new(x, 0.0, 0.0));
                sp.points.push(SubPathPoint::new(i + 1, Vector3::new(x, 0.0, 0.0), ts));
            }
            let geometry = VertexPath::new(positions, PathSpace::Xyz, 0.1).unwrap();
            let mapping = anchor_vertex_indices(&geometry);

            sp.initialize_timing(&geometry, &mapping).unwrap();
            let first = sp.points.clone();
            sp.initialize_timing(&geometry, &mapping).unwrap();

            prop_assert_eq!(&sp.points, &first);
        }
    }
}
