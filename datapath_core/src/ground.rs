//! Ground projection: snapping anchor heights onto walkable ground.
//!
//! Each anchor is probed with a downward ray starting at `max_height` above
//! the world floor level and reaching as far below it:
//!
//! ```text
//!   y = +max_height   ── ray start (anchor x/z)
//!          │
//!   y = 0  │          ── probe midpoint
//!          ▼
//!   y = -max_height   ── ray end
//! ```
//!
//! Heights are written in path-local space, so the path origin's height is
//! subtracted.

use crate::config::ProjectorConfig;
use crate::error::GeometryError;
use crate::events::{EventBus, PathEvent};
use crate::geometry::PathGeometry;
use crate::path::DataPath;
use datapath_env::PathId;
use nalgebra::Vector3;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vector3<f64>,
    pub distance: f64,
}

/// Queryable walkable surface.
pub trait GroundCollider {
    /// First hit along `direction` (unit length) within `max_distance`.
    fn raycast(&self, origin: Vector3<f64>, direction: Vector3<f64>, max_distance: f64) -> Option<RaycastHit>;
}

/// Infinite (or rectangular) horizontal floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlane {
    pub height: f64,
    /// Optional x/z extent `(min, max)`
    pub bounds: Option<((f64, f64), (f64, f64))>,
}

impl GroundPlane {
    pub fn new(height: f64) -> Self {
        Self { height, bounds: None }
    }

    pub fn with_bounds(mut self, min: (f64, f64), max: (f64, f64)) -> Self {
        self.bounds = Some((min, max));
        self
    }

    fn contains(&self, x: f64, z: f64) -> bool {
        match self.bounds {
            Some(((min_x, min_z), (max_x, max_z))) => x >= min_x && x <= max_x && z >= min_z && z <= max_z,
            None => true,
        }
    }
}

impl GroundCollider for GroundPlane {
    fn raycast(&self, origin: Vector3<f64>, direction: Vector3<f64>, max_distance: f64) -> Option<RaycastHit> {
        if direction.y.abs() < 1e-12 {
            return None;
        }
        let t = (self.height - origin.y) / direction.y;
        if t < 0.0 || t > max_distance {
            return None;
        }
        let point = origin + direction * t;
        if !self.contains(point.x, point.z) {
            return None;
        }
        Some(RaycastHit { point, distance: t })
    }
}

/// Regular grid of ground heights, bilinearly interpolated.
///
/// Answers vertical rays only.
#[derive(Debug, Clone)]
pub struct HeightMap {
    /// World x/z of cell (0, 0)
    origin: (f64, f64),
    cell_size: f64,
    columns: usize,
    rows: usize,
    /// Row-major, `rows * columns`
    heights: Vec<f64>,
}

impl HeightMap {
    /// Returns `None` if the grid is smaller than 2x2 or the sizes disagree.
    pub fn new(origin: (f64, f64), cell_size: f64, columns: usize, rows: usize, heights: Vec<f64>) -> Option<Self> {
        if columns < 2 || rows < 2 || heights.len() != columns * rows || cell_size <= 0.0 {
            return None;
        }
        Some(Self {
            origin,
            cell_size,
            columns,
            rows,
            heights,
        })
    }

    /// Grid sampled from a height function.
    pub fn from_fn(
        origin: (f64, f64),
        cell_size: f64,
        columns: usize,
        rows: usize,
        height: impl Fn(f64, f64) -> f64,
    ) -> Option<Self> {
        let mut heights = Vec::with_capacity(columns * rows);
        for r in 0..rows {
            for c in 0..columns {
                heights.push(height(
                    origin.0 + c as f64 * cell_size,
                    origin.1 + r as f64 * cell_size,
                ));
            }
        }
        Self::new(origin, cell_size, columns, rows, heights)
    }

    /// Interpolated height, or `None` outside the grid.
    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        let gx = (x - self.origin.0) / self.cell_size;
        let gz = (z - self.origin.1) / self.cell_size;
        let max_x = (self.columns - 1) as f64;
        let max_z = (self.rows - 1) as f64;
        if !(0.0..=max_x).contains(&gx) || !(0.0..=max_z).contains(&gz) {
            return None;
        }

        let c0 = (gx.floor() as usize).min(self.columns - 2);
        let r0 = (gz.floor() as usize).min(self.rows - 2);
        let (tx, tz) = (gx - c0 as f64, gz - r0 as f64);
        let h = |c: usize, r: usize| self.heights[r * self.columns + c];

        let near = h(c0, r0) * (1.0 - tx) + h(c0 + 1, r0) * tx;
        let far = h(c0, r0 + 1) * (1.0 - tx) + h(c0 + 1, r0 + 1) * tx;
        Some(near * (1.0 - tz) + far * tz)
    }
}

impl GroundCollider for HeightMap {
    fn raycast(&self, origin: Vector3<f64>, direction: Vector3<f64>, max_distance: f64) -> Option<RaycastHit> {
        if direction.x.abs() > 1e-9 || direction.z.abs() > 1e-9 || direction.y >= 0.0 {
            return None;
        }
        let ground = self.height_at(origin.x, origin.z)?;
        let distance = (origin.y - ground) / -direction.y;
        if distance < 0.0 || distance > max_distance {
            return None;
        }
        Some(RaycastHit {
            point: Vector3::new(origin.x, ground, origin.z),
            distance,
        })
    }
}

/// Outcome of one projection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionReport {
    /// Anchors that found ground
    pub hits: usize,
    /// Anchors that fell back to the ceiling height
    pub misses: usize,
    /// SubPaths whose timing failed when distances were refreshed
    pub timing_failures: usize,
}

/// Projects path anchors onto ground.
#[derive(Debug, Clone)]
pub struct GroundProjector {
    config: ProjectorConfig,
    events: Option<EventBus>,
}

impl GroundProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config, events: None }
    }

    /// Builder: publish `GeometryChanged` after every pass.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    pub fn set_y_offset(&mut self, y_offset: f64) {
        self.config.y_offset = y_offset.clamp(ProjectorConfig::Y_OFFSET_MIN, ProjectorConfig::Y_OFFSET_MAX);
    }

    /// Local anchor height for the ground under world `(x, z)`.
    pub fn projected_height<C: GroundCollider + ?Sized>(&self, collider: &C, x: f64, z: f64, origin_y: f64) -> (f64, bool) {
        let start = Vector3::new(x, self.config.max_height, z);
        match collider.raycast(start, -Vector3::y(), self.config.probe_distance()) {
            Some(hit) => (hit.point.y + self.config.y_offset - origin_y, true),
            None => (self.config.max_height + self.config.y_offset - origin_y, false),
        }
    }

    /// Rewrites every anchor's height of `geometry`, placed at `origin`.
    pub fn project<G, C>(
        &self,
        path_id: PathId,
        geometry: &mut G,
        origin: Vector3<f64>,
        collider: &C,
    ) -> Result<ProjectionReport, GeometryError>
    where
        G: PathGeometry + ?Sized,
        C: GroundCollider + ?Sized,
    {
        let mut report = ProjectionReport::default();
        let mut heights = Vec::with_capacity(geometry.num_points());
        for index in 0..geometry.num_points() {
            let Some(anchor) = geometry.anchor(index) else { break };
            let (y, hit) = self.projected_height(collider, origin.x + anchor.x, origin.z + anchor.z, origin.y);
            if hit {
                report.hits += 1;
            } else {
                debug!("No ground under anchor {}", index);
                report.misses += 1;
            }
            heights.push(y);
        }
        geometry.set_point_heights(&heights)?;

        info!(
            "Projected path {} onto ground: {} hits, {} misses",
            path_id, report.hits, report.misses
        );
        if let Some(events) = &self.events {
            events.publish(PathEvent::GeometryChanged { path: path_id });
        }
        Ok(report)
    }

    /// Projects a DataPath and refreshes its timing distances.
    pub fn project_path<G, C>(&self, path: &mut DataPath<G>, collider: &C) -> Result<ProjectionReport, GeometryError>
    where
        G: PathGeometry,
        C: GroundCollider + ?Sized,
    {
        let (id, origin) = (path.id, path.origin());
        let mut report = self.project(id, path.geometry_mut(), origin, collider)?;
        for (sub_path, e) in path.refresh_after_geometry_change() {
            warn!("Sub-path {} lost its timing after projection: {}", sub_path, e);
            report.timing_failures += 1;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimingError;
    use crate::geometry::{PathSpace, VertexPath};
    use crate::media::IconRegistry;
    use crate::path::SubPathId;
    use crate::timing::{SubPath, SubPathPoint, TimingStatus};
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    /// Counts height writes on the way to a `VertexPath`.
    struct CountingPath {
        inner: VertexPath,
        single_writes: usize,
        batch_writes: usize,
    }

    impl PathGeometry for CountingPath {
        fn num_points(&self) -> usize {
            self.inner.num_points()
        }
        fn num_segments(&self) -> usize {
            self.inner.num_segments()
        }
        fn anchor(&self, index: usize) -> Option<Vector3<f64>> {
            self.inner.anchor(index)
        }
        fn set_point_height(&mut self, index: usize, y: f64) -> Result<(), GeometryError> {
            self.single_writes += 1;
            self.inner.set_point_height(index, y)
        }
        fn set_point_heights(&mut self, heights: &[f64]) -> Result<(), GeometryError> {
            self.batch_writes += 1;
            self.inner.set_point_heights(heights)
        }
        fn vertex_count_in_segment(&self, segment: usize) -> usize {
            self.inner.vertex_count_in_segment(segment)
        }
        fn num_vertices(&self) -> usize {
            self.inner.num_vertices()
        }
        fn distance_at_vertex(&self, vertex: usize) -> f64 {
            self.inner.distance_at_vertex(vertex)
        }
        fn length(&self) -> f64 {
            self.inner.length()
        }
        fn point_at_distance(&self, distance: f64) -> Vector3<f64> {
            self.inner.point_at_distance(distance)
        }
        fn rotation_at_distance(&self, distance: f64) -> UnitQuaternion<f64> {
            self.inner.rotation_at_distance(distance)
        }
    }

    fn flat_path() -> VertexPath {
        VertexPath::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(5.0, 0.0, 0.0),
            ],
            PathSpace::Xz,
            0.5,
        )
        .unwrap()
    }

    #[test]
    fn test_plane_raycast() {
        let plane = GroundPlane::new(0.5);
        let hit = plane
            .raycast(Vector3::new(1.0, 2.0, 1.0), -Vector3::y(), 4.0)
            .unwrap();
        assert_relative_eq!(hit.point.y, 0.5);
        assert_relative_eq!(hit.distance, 1.5);

        assert!(plane.raycast(Vector3::new(0.0, 2.0, 0.0), -Vector3::y(), 1.0).is_none());
        assert!(plane.raycast(Vector3::new(0.0, 2.0, 0.0), Vector3::y(), 4.0).is_none());
    }

    #[test]
    fn test_projection_hit_and_miss() {
        // Floor covers x <= 2 only
        let floor = GroundPlane::new(0.25).with_bounds((-10.0, -10.0), (2.0, 10.0));
        let projector = GroundProjector::new(ProjectorConfig::default().with_y_offset(1.0));
        let mut geometry = flat_path();

        let report = projector
            .project(PathId::from_seed(1), &mut geometry, Vector3::new(0.0, 0.5, 0.0), &floor)
            .unwrap();

        assert_eq!(report, ProjectionReport { hits: 2, misses: 1, timing_failures: 0 });
        assert_relative_eq!(geometry.anchor(0).unwrap().y, 0.25 + 1.0 - 0.5);
        assert_relative_eq!(geometry.anchor(1).unwrap().y, 0.25 + 1.0 - 0.5);
        // No ground: ceiling plus offset
        assert_relative_eq!(geometry.anchor(2).unwrap().y, 2.0 + 1.0 - 0.5);
    }

    #[test]
    fn test_projection_uses_origin_offset() {
        let map = HeightMap::from_fn((0.0, 0.0), 1.0, 11, 11, |x, _| x * 0.1).unwrap();
        let projector = GroundProjector::new(ProjectorConfig::default());
        let mut geometry = flat_path();

        projector
            .project(PathId::from_seed(2), &mut geometry, Vector3::new(3.0, 0.0, 2.0), &map)
            .unwrap();

        // Anchor 1 sits at world x = 4
        assert_relative_eq!(geometry.anchor(1).unwrap().y, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_height_map_interpolates() {
        let map = HeightMap::new((0.0, 0.0), 2.0, 2, 2, vec![0.0, 1.0, 1.0, 2.0]).unwrap();
        assert_relative_eq!(map.height_at(1.0, 1.0).unwrap(), 1.0);
        assert_relative_eq!(map.height_at(2.0, 2.0).unwrap(), 2.0);
        assert!(map.height_at(2.1, 0.0).is_none());
        assert!(HeightMap::new((0.0, 0.0), 1.0, 1, 2, vec![0.0, 0.0]).is_none());
    }

    #[tokio::test]
    async fn test_projection_publishes_geometry_changed() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let projector = GroundProjector::new(ProjectorConfig::default()).with_event_bus(bus);
        let mut geometry = flat_path();
        let id = PathId::from_seed(3);

        projector
            .project(id, &mut geometry, Vector3::zeros(), &GroundPlane::new(0.0))
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), PathEvent::GeometryChanged { path: id });
    }

    #[test]
    fn test_projection_rebuilds_once() {
        let anchors = (0..2000).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
        let mut geometry = CountingPath {
            inner: VertexPath::new(anchors, PathSpace::Xz, 0.1).unwrap(),
            single_writes: 0,
            batch_writes: 0,
        };
        let projector = GroundProjector::new(ProjectorConfig::default());

        let report = projector
            .project(PathId::from_seed(4), &mut geometry, Vector3::zeros(), &GroundPlane::new(0.5))
            .unwrap();

        assert_eq!(report.hits, 2000);
        assert_eq!((geometry.single_writes, geometry.batch_writes), (0, 1));
        assert!(geometry.inner.vertices().iter().all(|v| (v.y - 0.5).abs() < 1e-12));
        assert_relative_eq!(geometry.length(), 1999.0, epsilon = 1e-6);
    }

    #[test]
    fn test_project_path_reports_lost_timing() {
        let mut sub_path = SubPath::new(SubPathId(0), "a.jpg");
        for (i, x) in [0.0, 1.0, 5.0].into_iter().enumerate() {
            sub_path
                .points
                .push(SubPathPoint::new(i, Vector3::new(x, 0.0, 0.0), "2024-01-01T00:00:00Z"));
        }
        let mut path = DataPath::new(PathId::from_seed(5), "t", flat_path(), vec![sub_path], IconRegistry::new());
        assert!(path.initialize_timing().is_empty());

        // Refers to an anchor the geometry does not have
        let orphan = SubPathPoint::new(7, Vector3::zeros(), "2024-01-01T00:00:01Z");
        if let Some(sp) = path.sub_path_mut(SubPathId(0)) {
            sp.points.push(orphan);
        }

        let projector = GroundProjector::new(ProjectorConfig::default());
        let report = projector.project_path(&mut path, &GroundPlane::new(0.0)).unwrap();

        assert_eq!(report.timing_failures, 1);
        assert!(matches!(
            path.sub_path(SubPathId(0)).unwrap().timing,
            TimingStatus::Failed(TimingError::UnmappedAnchor(7))
        ));
    }

    #[test]
    fn test_y_offset_is_clamped() {
        let mut projector = GroundProjector::new(ProjectorConfig::default());
        projector.set_y_offset(5.0);
        assert_eq!(projector.config().y_offset, 2.0);
        projector.set_y_offset(-1.0);
        assert_eq!(projector.config().y_offset, 0.0);
    }
}
