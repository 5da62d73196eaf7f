//! The built DataPath: geometry plus the SubPaths partitioning its anchors.

use crate::error::TimingError;
use crate::geometry::{anchor_vertex_indices, PathGeometry, VertexPath};
use crate::media::IconRegistry;
use crate::timing::SubPath;
use datapath_env::PathId;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Index of a SubPath within its DataPath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubPathId(pub usize);

impl std::fmt::Display for SubPathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A path built from a recorded point list.
///
/// Owns the geometry and every SubPath. SubPaths refer to anchors by global
/// index and to icons by registry index; nothing holds references back into
/// the path.
#[derive(Debug, Clone)]
pub struct DataPath<G: PathGeometry = VertexPath> {
    pub id: PathId,

    /// Exhibit name (for logging)
    pub name: String,

    /// World position of the path's local origin
    origin: Vector3<f64>,

    geometry: G,
    sub_paths: Vec<SubPath>,
    icons: IconRegistry,

    /// Vertex index of every anchor
    anchor_vertices: Vec<usize>,
}

impl<G: PathGeometry> DataPath<G> {
    pub fn new(
        id: PathId,
        name: impl Into<String>,
        geometry: G,
        sub_paths: Vec<SubPath>,
        icons: IconRegistry,
    ) -> Self {
        let anchor_vertices = anchor_vertex_indices(&geometry);
        Self {
            id,
            name: name.into(),
            origin: Vector3::zeros(),
            geometry,
            sub_paths,
            icons,
            anchor_vertices,
        }
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// Mutable geometry. Call `refresh_after_geometry_change` afterwards.
    pub fn geometry_mut(&mut self) -> &mut G {
        &mut self.geometry
    }

    pub fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vector3<f64>) {
        self.origin = origin;
    }

    pub fn sub_paths(&self) -> &[SubPath] {
        &self.sub_paths
    }

    pub fn sub_path(&self, id: SubPathId) -> Option<&SubPath> {
        self.sub_paths.get(id.0)
    }

    pub fn sub_path_mut(&mut self, id: SubPathId) -> Option<&mut SubPath> {
        self.sub_paths.get_mut(id.0)
    }

    /// SubPath owning the given anchor.
    pub fn sub_path_at_anchor(&self, global_index: usize) -> Option<SubPathId> {
        self.sub_paths
            .iter()
            .find(|sp| sp.contains_global_index(global_index))
            .map(|sp| sp.id)
    }

    pub fn icons(&self) -> &IconRegistry {
        &self.icons
    }

    pub fn anchor_vertex_indices(&self) -> &[usize] {
        &self.anchor_vertices
    }

    /// Travel distance at an anchor.
    pub fn distance_at_anchor(&self, global_index: usize) -> Option<f64> {
        self.anchor_vertices
            .get(global_index)
            .map(|&v| self.geometry.distance_at_vertex(v))
    }

    /// World position at a travel distance.
    pub fn world_point_at_distance(&self, distance: f64) -> Vector3<f64> {
        self.origin + self.geometry.point_at_distance(distance)
    }

    pub fn rotation_at_distance(&self, distance: f64) -> UnitQuaternion<f64> {
        self.geometry.rotation_at_distance(distance)
    }

    /// Runs timing initialization on every SubPath.
    ///
    /// Failures stay local to their SubPath and are returned for reporting.
    pub fn initialize_timing(&mut self) -> Vec<(SubPathId, TimingError)> {
        let mut failures = Vec::new();
        for sub_path in &mut self.sub_paths {
            if let Err(e) = sub_path.initialize_timing(&self.geometry, &self.anchor_vertices) {
                failures.push((sub_path.id, e));
            }
        }
        info!(
            "Path {} timing: {} sub-paths, {} failed",
            self.id,
            self.sub_paths.len(),
            failures.len()
        );
        failures
    }

    /// Rebuilds the anchor mapping and every ready SubPath's distances and
    /// speeds. Relative times are unaffected.
    pub fn refresh_after_geometry_change(&mut self) -> Vec<(SubPathId, TimingError)> {
        self.anchor_vertices = anchor_vertex_indices(&self.geometry);
        let mut failures = Vec::new();
        for sub_path in &mut self.sub_paths {
            if let Err(e) = sub_path.refresh_distances(&self.geometry, &self.anchor_vertices) {
                failures.push((sub_path.id, e));
            }
        }
        failures
    }
}
