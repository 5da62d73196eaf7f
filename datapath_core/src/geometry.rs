//! Path geometry: the anchor-to-vertex contract and a sampled polyline.
//!
//! A path is defined by its anchors (one per recorded point). For sampling,
//! the geometry subdivides every anchor-to-anchor segment into vertices and
//! tracks the cumulative travel distance at each vertex. Timing only ever
//! needs two things from it: how many vertices each segment produced, and
//! the distance at a given vertex.
//!
//! ```text
//! anchors:   A0 ─────────── A1 ───── A2
//! vertices:  v0  v1  v2  v3  v4  v5  v6
//! mapping:   [0,             4,       6]
//! ```

use crate::error::GeometryError;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upper bound on the vertices a `VertexPath` samples. Paths that would need
/// more are sampled at a wider spacing.
pub const MAX_VERTICES: usize = 1_000_000;

/// Dimensionality the path is built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSpace {
    /// Full 3D
    #[default]
    Xyz,
    /// Ground plane only; anchor heights start at 0
    Xz,
}

/// Geometry collaborator the path is built on.
///
/// Implementations must keep `vertex_count_in_segment` and
/// `distance_at_vertex` consistent: the mapping derived from the former
/// indexes into the latter.
pub trait PathGeometry {
    /// Number of anchors.
    fn num_points(&self) -> usize;

    /// Number of anchor-to-anchor segments.
    fn num_segments(&self) -> usize;

    /// Anchor position in path-local space.
    fn anchor(&self, index: usize) -> Option<Vector3<f64>>;

    /// Overwrites one anchor's height. Distances are recomputed.
    fn set_point_height(&mut self, index: usize, y: f64) -> Result<(), GeometryError>;

    /// Overwrites the heights of anchors `0..heights.len()`.
    ///
    /// Implementations should recompute distances once for the whole batch.
    fn set_point_heights(&mut self, heights: &[f64]) -> Result<(), GeometryError> {
        for (index, y) in heights.iter().enumerate() {
            self.set_point_height(index, *y)?;
        }
        Ok(())
    }

    /// Vertices the given segment was subdivided into.
    fn vertex_count_in_segment(&self, segment: usize) -> usize;

    /// Total number of sampled vertices.
    fn num_vertices(&self) -> usize;

    /// Cumulative travel distance at a vertex. Non-decreasing in `vertex`.
    fn distance_at_vertex(&self, vertex: usize) -> f64;

    /// Total path length.
    fn length(&self) -> f64;

    /// Position at a travel distance, clamped to the path.
    fn point_at_distance(&self, distance: f64) -> Vector3<f64>;

    /// Orientation at a travel distance. Local +Z faces along the path.
    fn rotation_at_distance(&self, distance: f64) -> UnitQuaternion<f64>;
}

/// Maps every anchor to the vertex index that coincides with it.
///
/// Anchor 0 sits on vertex 0; anchor `i` sits on the sum of the vertex counts
/// of segments `0..i`.
pub fn anchor_vertex_indices<G: PathGeometry + ?Sized>(geometry: &G) -> Vec<usize> {
    if geometry.num_points() == 0 {
        return Vec::new();
    }

    let mut indices = Vec::with_capacity(geometry.num_points());
    let mut count = 0;
    indices.push(count);
    for segment in 0..geometry.num_segments() {
        count += geometry.vertex_count_in_segment(segment);
        indices.push(count);
    }
    indices
}

/// Heading-only version of a rotation.
///
/// Projects the forward axis onto the ground plane. A vertical forward axis
/// has no heading and yields identity.
pub fn yaw_only(rotation: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    let forward = rotation * Vector3::z();
    if forward.x.hypot(forward.z) < 1e-9 {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), forward.x.atan2(forward.z))
}

/// Open polyline through the anchors, sampled at a fixed spacing.
///
/// Each segment of length `L` yields `max(1, ceil(L / spacing))` evenly
/// placed vertices, the last of which is the segment's end anchor. Travel
/// distances are exact for straight segments. The spacing widens when the
/// total would exceed `MAX_VERTICES`.
#[derive(Debug, Clone)]
pub struct VertexPath {
    /// Anchor positions
    anchors: Vec<Vector3<f64>>,

    /// Build space
    space: PathSpace,

    /// Target spacing between vertices
    vertex_spacing: f64,

    /// Sampled vertices, anchors included
    vertices: Vec<Vector3<f64>>,

    /// Travel distance at each vertex
    cumulative: Vec<f64>,

    /// Vertices produced per segment
    segment_vertex_counts: Vec<usize>,
}

impl VertexPath {
    /// Builds the polyline. Needs at least two anchors.
    pub fn new(
        anchors: Vec<Vector3<f64>>,
        space: PathSpace,
        vertex_spacing: f64,
    ) -> Result<Self, GeometryError> {
        if anchors.len() < 2 {
            return Err(GeometryError::TooFewPoints(anchors.len()));
        }
        if let Some(index) = anchors.iter().position(|a| !a.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::NonFinite(index));
        }

        let mut anchors = anchors;
        if space == PathSpace::Xz {
            for anchor in &mut anchors {
                anchor.y = 0.0;
            }
        }

        let mut path = Self {
            anchors,
            space,
            vertex_spacing: if vertex_spacing > 0.0 { vertex_spacing } else { 0.1 },
            vertices: Vec::new(),
            cumulative: Vec::new(),
            segment_vertex_counts: Vec::new(),
        };
        path.rebuild();
        Ok(path)
    }

    /// Sampled vertices.
    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    /// Build space.
    pub fn space(&self) -> PathSpace {
        self.space
    }

    /// Spacing actually used for sampling a path of `total_length`.
    fn sampling_spacing(&self, total_length: f64) -> f64 {
        let budget = MAX_VERTICES.saturating_sub(self.anchors.len()) as f64;
        if total_length / self.vertex_spacing <= budget {
            return self.vertex_spacing;
        }
        let spacing = total_length / budget;
        warn!(
            "Path of {:.0}m exceeds {} vertices at {}m spacing, sampling at {:.3}m",
            total_length, MAX_VERTICES, self.vertex_spacing, spacing
        );
        spacing
    }

    fn rebuild(&mut self) {
        let lengths: Vec<f64> = self.anchors.windows(2).map(|pair| (pair[1] - pair[0]).norm()).collect();
        let spacing = self.sampling_spacing(lengths.iter().sum());

        self.vertices.clear();
        self.cumulative.clear();
        self.segment_vertex_counts.clear();

        self.vertices.push(self.anchors[0]);
        self.cumulative.push(0.0);

        for (pair, length) in self.anchors.windows(2).zip(lengths) {
            let (start, end) = (pair[0], pair[1]);
            let count = ((length / spacing).ceil() as usize).max(1);

            let mut previous = start;
            for k in 1..=count {
                let vertex = if k == count {
                    end
                } else {
                    start + (end - start) * (k as f64 / count as f64)
                };
                let travelled = self.cumulative[self.cumulative.len() - 1] + (vertex - previous).norm();
                self.vertices.push(vertex);
                self.cumulative.push(travelled);
                previous = vertex;
            }
            self.segment_vertex_counts.push(count);
        }
    }

    /// Index `j` of the vertex step `j-1 -> j` containing `distance`.
    fn step_at(&self, distance: f64) -> usize {
        let upper = self.cumulative.partition_point(|&c| c <= distance);
        upper.clamp(1, self.vertices.len() - 1)
    }

    /// Direction of travel around the given step, skipping zero-length steps.
    fn direction_near(&self, step: usize) -> Option<Vector3<f64>> {
        let forward = (step..self.vertices.len()).map(|j| self.vertices[j] - self.vertices[j - 1]);
        let backward = (1..step).rev().map(|j| self.vertices[j] - self.vertices[j - 1]);
        forward
            .chain(backward)
            .find(|d| d.norm() > 1e-12)
            .map(|d| d.normalize())
    }
}

impl PathGeometry for VertexPath {
    fn num_points(&self) -> usize {
        self.anchors.len()
    }

    fn num_segments(&self) -> usize {
        self.anchors.len().saturating_sub(1)
    }

    fn anchor(&self, index: usize) -> Option<Vector3<f64>> {
        self.anchors.get(index).copied()
    }

    fn set_point_height(&mut self, index: usize, y: f64) -> Result<(), GeometryError> {
        let count = self.anchors.len();
        let anchor = self
            .anchors
            .get_mut(index)
            .ok_or(GeometryError::AnchorOutOfRange { index, count })?;
        if !y.is_finite() {
            return Err(GeometryError::NonFinite(index));
        }
        anchor.y = y;
        self.rebuild();
        Ok(())
    }

    fn set_point_heights(&mut self, heights: &[f64]) -> Result<(), GeometryError> {
        let count = self.anchors.len();
        if heights.len() > count {
            return Err(GeometryError::AnchorOutOfRange { index: count, count });
        }
        if let Some(index) = heights.iter().position(|y| !y.is_finite()) {
            return Err(GeometryError::NonFinite(index));
        }
        for (anchor, y) in self.anchors.iter_mut().zip(heights) {
            anchor.y = *y;
        }
        self.rebuild();
        Ok(())
    }

    fn vertex_count_in_segment(&self, segment: usize) -> usize {
        self.segment_vertex_counts.get(segment).copied().unwrap_or(0)
    }

    fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn distance_at_vertex(&self, vertex: usize) -> f64 {
        match self.cumulative.get(vertex) {
            Some(d) => *d,
            None => self.length(),
        }
    }

    fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn point_at_distance(&self, distance: f64) -> Vector3<f64> {
        let distance = distance.clamp(0.0, self.length());
        let step = self.step_at(distance);
        let (d0, d1) = (self.cumulative[step - 1], self.cumulative[step]);
        let t = if d1 > d0 { (distance - d0) / (d1 - d0) } else { 0.0 };
        self.vertices[step - 1].lerp(&self.vertices[step], t)
    }

    fn rotation_at_distance(&self, distance: f64) -> UnitQuaternion<f64> {
        let distance = distance.clamp(0.0, self.length());
        let Some(direction) = self.direction_near(self.step_at(distance)) else {
            return UnitQuaternion::identity();
        };

        let up = Vector3::y();
        if direction.cross(&up).norm() > 1e-9 {
            UnitQuaternion::face_towards(&direction, &up)
        } else {
            UnitQuaternion::rotation_between(&Vector3::z(), &direction)
                .unwrap_or_else(UnitQuaternion::identity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight() -> VertexPath {
        VertexPath::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(3.0, 0.0, 0.0),
            ],
            PathSpace::Xyz,
            0.25,
        )
        .unwrap()
    }

    #[test]
    fn test_requires_two_anchors() {
        let result = VertexPath::new(vec![Vector3::zeros()], PathSpace::Xyz, 0.1);
        assert_eq!(result.unwrap_err(), GeometryError::TooFewPoints(1));
    }

    #[test]
    fn test_mapping_matches_anchor_distances() {
        let path = straight();
        let mapping = anchor_vertex_indices(&path);

        assert_eq!(mapping, vec![0, 4, 12]);
        assert_eq!(path.num_vertices(), 13);
        assert_relative_eq!(path.distance_at_vertex(mapping[1]), 1.0, epsilon = 1e-9);
        assert_relative_eq!(path.distance_at_vertex(mapping[2]), 3.0, epsilon = 1e-9);
        assert_relative_eq!(path.length(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicate_anchor_gets_one_vertex() {
        let path = VertexPath::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.0, 0.0, 2.0),
                Vector3::new(0.0, 0.0, 2.0),
                Vector3::new(0.0, 0.0, 4.0),
            ],
            PathSpace::Xyz,
            0.5,
        )
        .unwrap();
        let mapping = anchor_vertex_indices(&path);

        assert_eq!(mapping, vec![0, 4, 5, 9]);
        assert_eq!(
            path.distance_at_vertex(mapping[1]),
            path.distance_at_vertex(mapping[2])
        );
    }

    #[test]
    fn test_point_at_distance_interpolates_and_clamps() {
        let path = straight();
        assert_relative_eq!(path.point_at_distance(2.0), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(path.point_at_distance(-1.0), Vector3::new(0.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(path.point_at_distance(99.0), Vector3::new(3.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_faces_travel_direction() {
        let path = straight();
        let forward = path.rotation_at_distance(1.5) * Vector3::z();
        assert_relative_eq!(forward, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_yaw_only_drops_pitch() {
        let climbing = UnitQuaternion::face_towards(&Vector3::new(1.0, 1.0, 0.0), &Vector3::y());
        let forward = yaw_only(&climbing) * Vector3::z();
        assert_relative_eq!(forward, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_xz_space_flattens_and_height_can_be_set() {
        let mut path = VertexPath::new(
            vec![Vector3::new(0.0, 5.0, 0.0), Vector3::new(0.0, 5.0, 1.0)],
            PathSpace::Xz,
            0.1,
        )
        .unwrap();
        assert_eq!(path.anchor(0).unwrap().y, 0.0);

        path.set_point_height(1, 1.0).unwrap();
        assert_eq!(path.anchor(1).unwrap().y, 1.0);
        assert_relative_eq!(path.length(), 2.0_f64.sqrt(), epsilon = 1e-9);
        assert!(matches!(
            path.set_point_height(2, 0.0),
            Err(GeometryError::AnchorOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_batch_heights_match_single_writes() {
        let mut single = straight();
        let mut batch = straight();
        for (index, y) in [0.5, 1.0, -0.5].into_iter().enumerate() {
            single.set_point_height(index, y).unwrap();
        }
        batch.set_point_heights(&[0.5, 1.0, -0.5]).unwrap();

        assert_eq!(batch.vertices(), single.vertices());
        assert_eq!(anchor_vertex_indices(&batch), anchor_vertex_indices(&single));
        assert_relative_eq!(batch.length(), single.length(), epsilon = 1e-12);
    }

    #[test]
    fn test_batch_heights_are_all_or_nothing() {
        let mut path = straight();
        assert_eq!(
            path.set_point_heights(&[1.0, f64::NAN, 1.0]),
            Err(GeometryError::NonFinite(1))
        );
        assert_eq!(
            path.set_point_heights(&[1.0, 1.0, 1.0, 1.0]),
            Err(GeometryError::AnchorOutOfRange { index: 3, count: 3 })
        );
        assert_eq!(path.anchor(0).unwrap().y, 0.0);
        assert_relative_eq!(path.length(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_far_outlier_is_sampled_coarser() {
        let path = VertexPath::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0e9, 0.0, 0.0),
            ],
            PathSpace::Xyz,
            0.1,
        )
        .unwrap();

        assert!(path.num_vertices() <= MAX_VERTICES + path.num_points());
        let mapping = anchor_vertex_indices(&path);
        assert_eq!(mapping.len(), 3);
        assert_relative_eq!(path.distance_at_vertex(mapping[1]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(path.length(), 1.0e9, max_relative = 1e-9);
    }
}
