//! Path follower: replays a SubPath's recorded motion on an avatar.
//!
//! # State machine
//!
//! ```text
//!            attach                 speed == 0            deadline passed
//!   Idle ─────────────► Following ─────────────► Waiting ─────────────► Following
//!    ▲                      │
//!    │ detach               │ last reached anchor >= stop anchor
//!    └──────────────── Finished
//! ```
//!
//! Each tick advances the last reached anchor by at most one, reads the
//! recorded speed of the segment ahead and moves the avatar along the path
//! geometry by `speed * dt`.

use crate::config::{FollowerConfig, PositionMode, RotationMode};
use crate::error::FollowError;
use crate::geometry::{yaw_only, PathGeometry};
use crate::path::{DataPath, SubPathId};
use crate::timing::{SubPath, TimingStatus};
use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FollowState {
    Idle,
    Following,
    /// Dwelling at an anchor until the follower clock reaches `resume_at`
    Waiting { resume_at: f64 },
    Finished,
}

/// Where on the SubPath following starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowStart {
    Beginning,
    LocalIndex(usize),
}

/// The movable avatar the follower drives.
pub trait AvatarBody {
    fn position(&self) -> Vector3<f64>;

    /// Moves by a world-space delta.
    fn move_by(&mut self, delta: Vector3<f64>);

    fn set_rotation(&mut self, rotation: UnitQuaternion<f64>);

    /// True while standing on ground.
    fn is_grounded(&self) -> bool;
}

/// Collision-free avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicBody {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub grounded: bool,
}

impl KinematicBody {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
            grounded: true,
        }
    }
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self::new(Vector3::zeros())
    }
}

impl AvatarBody for KinematicBody {
    fn position(&self) -> Vector3<f64> {
        self.position
    }

    fn move_by(&mut self, delta: Vector3<f64>) {
        self.position += delta;
    }

    fn set_rotation(&mut self, rotation: UnitQuaternion<f64>) {
        self.rotation = rotation;
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }
}

/// Progress of the active SubPath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FollowProgress {
    pub sub_path: SubPathId,
    pub state: FollowState,
    pub last_reached_anchor: usize,
    /// Relative time of the last reached point
    pub relative_time_secs: f64,
    /// Elapsed share of the SubPath's duration, 0..=1
    pub ratio: f64,
    pub distance_travelled: f64,
}

/// Drives an avatar along one SubPath at a time.
#[derive(Debug, Clone)]
pub struct PathFollower {
    config: FollowerConfig,

    /// SubPath being followed
    active: Option<SubPathId>,

    state: FollowState,

    /// Travel distance along the whole path
    distance_travelled: f64,

    /// Global index of the anchor most recently passed
    last_reached_anchor: usize,

    /// Global index of the active SubPath's last anchor
    stop_anchor: usize,

    /// User pause
    paused: bool,

    /// Held until the SubPath's video is prepared
    awaiting_media: bool,

    /// The first step after attach does not advance the anchor index
    first_step_pending: bool,

    /// Speed applied on the last step
    current_speed: f64,

    /// Seconds of ticks seen since construction
    clock: f64,
}

impl PathFollower {
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            active: None,
            state: FollowState::Idle,
            distance_travelled: 0.0,
            last_reached_anchor: 0,
            stop_anchor: 0,
            paused: false,
            awaiting_media: false,
            first_step_pending: false,
            current_speed: 0.0,
            clock: 0.0,
        }
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    /// Sets the playback multiplier, clamped to 0.1..=10.
    pub fn set_speed_scale(&mut self, speed_scale: f64) {
        self.config.speed_scale =
            speed_scale.clamp(FollowerConfig::SPEED_SCALE_MIN, FollowerConfig::SPEED_SCALE_MAX);
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn active_sub_path(&self) -> Option<SubPathId> {
        self.active
    }

    pub fn is_following(&self) -> bool {
        matches!(self.state, FollowState::Following | FollowState::Waiting { .. })
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_awaiting_media(&self) -> bool {
        self.awaiting_media
    }

    pub fn distance_travelled(&self) -> f64 {
        self.distance_travelled
    }

    pub fn last_reached_anchor(&self) -> usize {
        self.last_reached_anchor
    }

    pub fn stop_anchor(&self) -> usize {
        self.stop_anchor
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Starts following a SubPath.
    ///
    /// All per-run state is reset. A single-point SubPath finishes at once.
    pub fn attach<G: PathGeometry>(
        &mut self,
        path: &DataPath<G>,
        id: SubPathId,
        start: FollowStart,
    ) -> Result<FollowState, FollowError> {
        let sub_path = path.sub_path(id).ok_or(FollowError::UnknownSubPath(id))?;
        if !sub_path.is_traversable() {
            let reason = match &sub_path.timing {
                TimingStatus::Failed(e) => e.to_string(),
                TimingStatus::Pending => "timing not initialized".to_string(),
                TimingStatus::Ready => "no points".to_string(),
            };
            return Err(FollowError::NotTraversable { id, reason });
        }

        let local = match start {
            FollowStart::Beginning => 0,
            FollowStart::LocalIndex(index) => index,
        };
        let point = sub_path.point(local).ok_or(FollowError::StartOutOfRange {
            index: local,
            len: sub_path.len(),
        })?;
        let stop_anchor = sub_path.last_global_index().unwrap_or(point.global_index);

        self.active = Some(id);
        self.distance_travelled = point.path_distance;
        self.last_reached_anchor = point.global_index;
        self.stop_anchor = stop_anchor;
        self.paused = false;
        self.awaiting_media = false;
        self.first_step_pending = true;
        self.current_speed = 0.0;
        self.state = if self.last_reached_anchor >= self.stop_anchor {
            FollowState::Finished
        } else {
            FollowState::Following
        };

        debug!(
            "Following sub-path {} from anchor {} to {}\n{}",
            id,
            self.last_reached_anchor,
            self.stop_anchor,
            sub_path.summary()
        );
        Ok(self.state)
    }

    /// Stops following and returns to free roam.
    pub fn detach(&mut self) {
        if self.active.is_some() {
            debug!("Detached from sub-path {:?}", self.active);
        }
        self.active = None;
        self.state = FollowState::Idle;
        self.paused = false;
        self.awaiting_media = false;
        self.first_step_pending = false;
        self.current_speed = 0.0;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Holds movement until `media_ready` is called.
    pub fn hold_for_media(&mut self) {
        self.awaiting_media = true;
    }

    pub fn media_ready(&mut self) {
        self.awaiting_media = false;
    }

    /// Jumps to the point whose relative time is closest to `seconds`.
    ///
    /// Returns the global index jumped to.
    pub fn reset_to_relative_time<G: PathGeometry>(
        &mut self,
        path: &DataPath<G>,
        seconds: f64,
    ) -> Result<usize, FollowError> {
        let id = self.active.ok_or(FollowError::NotAttached)?;
        let sub_path = path.sub_path(id).ok_or(FollowError::UnknownSubPath(id))?;
        let point = sub_path
            .closest_to_relative_time(seconds)
            .ok_or(FollowError::StartOutOfRange { index: 0, len: 0 })?;

        self.distance_travelled = point.path_distance;
        self.last_reached_anchor = point.global_index;
        self.first_step_pending = true;
        self.state = FollowState::Following;
        debug!("Reset sub-path {} to anchor {} ({:.2}s)", id, point.global_index, point.relative_time_secs);
        Ok(point.global_index)
    }

    /// Advances by `dt` seconds.
    pub fn tick<G, B>(&mut self, path: &DataPath<G>, body: &mut B, dt: f64) -> FollowState
    where
        G: PathGeometry,
        B: AvatarBody + ?Sized,
    {
        self.clock += dt;

        let Some(id) = self.active else {
            return self.state;
        };
        let Some(sub_path) = path.sub_path(id) else {
            warn!("Active sub-path {} vanished", id);
            self.detach();
            return self.state;
        };

        if let FollowState::Waiting { resume_at } = self.state {
            if self.clock < resume_at {
                return self.state;
            }
            debug!("Resuming sub-path {} at anchor {}", id, self.last_reached_anchor);
            self.state = FollowState::Following;
        }

        if self.state != FollowState::Following || self.paused || self.awaiting_media {
            return self.state;
        }

        if self.last_reached_anchor >= self.stop_anchor {
            self.finish(path);
            return self.state;
        }

        self.step(path, sub_path, body, dt);
        self.state
    }

    fn step<G, B>(&mut self, path: &DataPath<G>, sub_path: &SubPath, body: &mut B, dt: f64)
    where
        G: PathGeometry,
        B: AvatarBody + ?Sized,
    {
        if self.first_step_pending {
            self.first_step_pending = false;
        } else {
            self.update_last_reached(sub_path);
        }

        if self.last_reached_anchor >= self.stop_anchor {
            self.finish(path);
            return;
        }

        let Ok(point) = sub_path.point_by_global_index(self.last_reached_anchor) else {
            warn!("Anchor {} outside sub-path {}", self.last_reached_anchor, sub_path.id);
            self.detach();
            return;
        };

        if point.speed == 0.0 {
            let wait = sub_path
                .point_by_global_index(self.last_reached_anchor + 1)
                .map(|next| next.relative_time_secs - point.relative_time_secs)
                .unwrap_or(0.0)
                .max(0.0);
            debug!("Waiting {:.2}s at anchor {}", wait, self.last_reached_anchor);
            self.current_speed = 0.0;
            self.state = FollowState::Waiting {
                resume_at: self.clock + wait,
            };
            return;
        }

        self.current_speed = if point.speed.is_infinite() {
            self.config.min_speed
        } else {
            point.speed * self.config.speed_scale
        };
        self.distance_travelled += self.current_speed * dt;
        self.apply_pose(path, body, dt);
    }

    /// Advances the last reached anchor by one if its distance was passed.
    fn update_last_reached(&mut self, sub_path: &SubPath) {
        if let Ok(next) = sub_path.point_by_global_index(self.last_reached_anchor + 1) {
            if self.distance_travelled >= next.path_distance {
                self.last_reached_anchor += 1;
            }
        }
    }

    fn finish<G: PathGeometry>(&mut self, path: &DataPath<G>) {
        self.last_reached_anchor = self.stop_anchor;
        if let Some(stop_distance) = path.distance_at_anchor(self.stop_anchor) {
            self.distance_travelled = self.distance_travelled.min(stop_distance);
        }
        self.current_speed = 0.0;
        if self.state != FollowState::Finished {
            debug!("Finished sub-path {:?} at anchor {}", self.active, self.stop_anchor);
        }
        self.state = FollowState::Finished;
    }

    fn apply_pose<G, B>(&self, path: &DataPath<G>, body: &mut B, dt: f64)
    where
        G: PathGeometry,
        B: AvatarBody + ?Sized,
    {
        let target = path.world_point_at_distance(self.distance_travelled);
        let current = body.position();

        let next = match self.config.position_mode {
            PositionMode::Planar => {
                let y = if body.is_grounded() {
                    current.y
                } else {
                    current.y - self.config.gravity * dt
                };
                Vector3::new(target.x, y, target.z)
            }
            PositionMode::Full => target,
        };
        body.move_by(next - current);

        let rotation = path.rotation_at_distance(self.distance_travelled);
        match self.config.rotation_mode {
            RotationMode::YawOnly => body.set_rotation(yaw_only(&rotation)),
            RotationMode::Full => body.set_rotation(rotation),
        }
    }

    /// Progress of the active SubPath.
    pub fn progress<G: PathGeometry>(&self, path: &DataPath<G>) -> Option<FollowProgress> {
        let id = self.active?;
        let sub_path = path.sub_path(id)?;
        Some(FollowProgress {
            sub_path: id,
            state: self.state,
            last_reached_anchor: self.last_reached_anchor,
            relative_time_secs: sub_path.relative_time_at(self.last_reached_anchor).ok()?,
            ratio: sub_path.time_ratio_at(self.last_reached_anchor).ok()?,
            distance_travelled: self.distance_travelled,
        })
    }
}
