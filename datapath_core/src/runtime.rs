//! Exhibit runtime: wires a built path, its follower and projector to an
//! environment context.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      ExhibitRuntime                        │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │            Context: ExhibitContext                   │  │
//! │  │  • now() / sleep() → frame pacing                    │  │
//! │  │  • spawn() → media validation task                   │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! │                           │                                │
//! │  ┌──────────┐  ┌──────────────┐  ┌──────────┐  ┌────────┐ │
//! │  │ DataPath │  │ PathFollower │  │ Projector│  │EventBus│ │
//! │  └──────────┘  └──────────────┘  └──────────┘  └────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use datapath_core::{ExhibitConfig, ExhibitRuntime, Interaction, KinematicBody};
//! use datapath_env::TokioContext;
//!
//! let runtime = ExhibitRuntime::new(TokioContext::shared(), ExhibitConfig::default(), path);
//! runtime.interact(SubPathId(0), Interaction::Spot)?;
//! runtime.run(&mut KinematicBody::default(), 10_000).await;
//! ```

use crate::config::ExhibitConfig;
use crate::error::{FollowError, GeometryError};
use crate::events::{EventBus, GameState, PathEvent};
use crate::follower::{AvatarBody, FollowProgress, FollowStart, FollowState, PathFollower};
use crate::geometry::{PathGeometry, VertexPath};
use crate::ground::{GroundCollider, GroundProjector, ProjectionReport};
use crate::media::{expand_streaming_url, Medium};
use crate::path::{DataPath, SubPathId};
use datapath_env::{EnvError, ExhibitContext, MediaProbe};
use nalgebra::Vector3;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

/// How the visitor triggered a SubPath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// Marker at the SubPath's start
    Spot,
    /// Anywhere along the SubPath's line; following starts at the nearest point
    Line { player_position: Vector3<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InteractionOutcome {
    pub sub_path: SubPathId,
    pub start_local_index: usize,
    /// Relative time media should seek to
    pub start_secs: f64,
    /// False for a SubPath that can be shown but not followed
    pub following: bool,
}

/// Reachability of one medium.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaCheck {
    pub sub_path: SubPathId,
    pub location: String,
    pub reachable: bool,
    pub error: Option<String>,
}

/// Handle to a running media validation task.
///
/// Dropping the handle or calling `cancel` stops the task.
pub struct MediaValidation {
    results: oneshot::Receiver<Vec<MediaCheck>>,
    cancel: oneshot::Sender<()>,
}

impl MediaValidation {
    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }

    /// Waits for every probe to finish.
    pub async fn join(self) -> Result<Vec<MediaCheck>, EnvError> {
        let Self { results, cancel: _keep_alive } = self;
        results
            .await
            .map_err(|_| EnvError::cancelled("media validation"))
    }
}

/// Orchestrates one exhibit.
///
/// Generic over the context so the same code runs on Tokio or on the
/// simulation's virtual clock.
pub struct ExhibitRuntime<Ctx, G = VertexPath>
where
    Ctx: ExhibitContext,
    G: PathGeometry,
{
    /// Environment context
    pub context: Arc<Ctx>,

    pub config: ExhibitConfig,

    pub path: DataPath<G>,

    pub follower: PathFollower,

    pub projector: GroundProjector,

    events: EventBus,

    game_state: GameState,

    /// Current tick number
    tick_count: u64,
}

impl<Ctx, G> ExhibitRuntime<Ctx, G>
where
    Ctx: ExhibitContext,
    G: PathGeometry,
{
    /// Creates the runtime and initializes timing on every SubPath.
    ///
    /// Local video URLs are expanded against the streaming root here.
    pub fn new(context: Arc<Ctx>, config: ExhibitConfig, mut path: DataPath<G>) -> Self {
        let events = EventBus::default();
        let projector = GroundProjector::new(config.projector.clone()).with_event_bus(events.clone());
        let follower = PathFollower::new(config.follower.clone());

        let streaming_root = config.media.streaming_root.clone();
        for id in (0..path.sub_paths().len()).map(SubPathId) {
            if let Some(sub_path) = path.sub_path_mut(id) {
                if let Medium::VideoUrl { url } = &mut sub_path.medium {
                    *url = expand_streaming_url(url, &streaming_root);
                }
            }
        }

        let failures = path.initialize_timing();
        for (id, e) in &failures {
            warn!("Sub-path {} can be shown but not followed: {}", id, e);
        }
        info!("Exhibit {} ready with path {}", config.name, path.id);

        Self {
            context,
            config,
            path,
            follower,
            projector,
            events,
            game_state: GameState::WalkAround,
            tick_count: 0,
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PathEvent> {
        self.events.subscribe()
    }

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    /// Switches interaction mode. Leaving media view stops following.
    pub fn set_game_state(&mut self, state: GameState) {
        let from = self.game_state;
        self.game_state = state;
        if state != GameState::ViewMedia {
            self.follower.detach();
        }
        if from != state {
            debug!("Game state {:?} -> {:?}", from, state);
            self.events.publish(PathEvent::GameStateChanged { from, to: state });
        }
    }

    /// Handles a visitor interaction with a SubPath.
    ///
    /// The SubPath is always selected and presented. It is followed only if
    /// its timing is ready; a video SubPath holds the follower until
    /// `video_prepared`.
    pub fn interact(&mut self, id: SubPathId, interaction: Interaction) -> Result<InteractionOutcome, FollowError> {
        let sub_path = self.path.sub_path(id).ok_or(FollowError::UnknownSubPath(id))?;

        let start_local_index = match interaction {
            Interaction::Spot => 0,
            Interaction::Line { player_position } => sub_path
                .closest_local_index_to(&player_position, &self.path.origin())
                .unwrap_or(0),
        };
        let start_secs = sub_path
            .point(start_local_index)
            .map(|p| p.relative_time_secs.max(0.0))
            .unwrap_or(0.0);
        let is_video = sub_path.medium.is_video();
        let traversable = sub_path.is_traversable();

        self.set_game_state(GameState::ViewMedia);
        self.events.publish(PathEvent::SubPathSelected {
            path: self.path.id,
            sub_path: id,
            start_secs,
        });

        let following = if traversable {
            self.follower
                .attach(&self.path, id, FollowStart::LocalIndex(start_local_index))?;
            if is_video {
                self.follower.hold_for_media();
            }
            true
        } else {
            warn!("Sub-path {} selected without following", id);
            self.follower.detach();
            false
        };

        info!(
            "Interacted with sub-path {} at point {} ({:.2}s), following: {}",
            id, start_local_index, start_secs, following
        );
        Ok(InteractionOutcome {
            sub_path: id,
            start_local_index,
            start_secs,
            following,
        })
    }

    /// Signals that the active SubPath's video is ready.
    pub fn video_prepared(&mut self) {
        let Some(id) = self.follower.active_sub_path() else {
            return;
        };
        self.follower.media_ready();
        self.events.publish(PathEvent::VideoPrepared { sub_path: id });
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.follower.set_paused(paused);
    }

    pub fn reset_to_relative_time(&mut self, seconds: f64) -> Result<usize, FollowError> {
        self.follower.reset_to_relative_time(&self.path, seconds)
    }

    /// Jumps to a position given as a share (0..=1) of the SubPath's duration.
    pub fn scrub_to_ratio(&mut self, ratio: f64) -> Result<usize, FollowError> {
        let id = self.follower.active_sub_path().ok_or(FollowError::NotAttached)?;
        let sub_path = self.path.sub_path(id).ok_or(FollowError::UnknownSubPath(id))?;
        let seconds = ratio.clamp(0.0, 1.0) * sub_path.duration_secs();
        self.follower.reset_to_relative_time(&self.path, seconds)
    }

    pub fn progress(&self) -> Option<FollowProgress> {
        self.follower.progress(&self.path)
    }

    /// Advances the follower by one frame.
    pub fn tick<B: AvatarBody + ?Sized>(&mut self, body: &mut B, dt: f64) -> FollowState {
        self.tick_count += 1;
        self.follower.tick(&self.path, body, dt)
    }

    /// Runs frames paced by the context clock until the follower finishes,
    /// goes idle, or `max_ticks` frames have passed.
    pub async fn run<B: AvatarBody + ?Sized>(&mut self, body: &mut B, max_ticks: u64) -> FollowState {
        let frame = self.config.frame_duration();
        let mut last = self.context.now();

        for _ in 0..max_ticks {
            self.context.sleep(frame).await;
            let now = self.context.now();
            let dt = now.saturating_sub(last).as_secs_f64();
            last = now;

            match self.tick(body, dt) {
                FollowState::Finished | FollowState::Idle => break,
                _ => {}
            }
        }
        self.follower.state()
    }

    /// Projects the path onto ground and refreshes timing distances.
    pub fn project_to_ground<C: GroundCollider + ?Sized>(&mut self, collider: &C) -> Result<ProjectionReport, GeometryError> {
        self.projector.project_path(&mut self.path, collider)
    }

    /// Moves the path; re-projects when auto projection is on.
    pub fn set_path_origin<C: GroundCollider + ?Sized>(
        &mut self,
        origin: Vector3<f64>,
        collider: &C,
    ) -> Result<Option<ProjectionReport>, GeometryError> {
        self.path.set_origin(origin);
        if self.projector.config().auto_project {
            self.project_to_ground(collider).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Probes every URL medium in the background.
    pub fn spawn_media_validation<P: MediaProbe>(&self, probe: Arc<P>) -> MediaValidation {
        let targets: Vec<(SubPathId, String)> = self
            .path
            .sub_paths()
            .iter()
            .filter_map(|sp| match &sp.medium {
                Medium::VideoUrl { url } => Some((sp.id, url.clone())),
                _ => None,
            })
            .collect();

        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        self.context.spawn("media-validation", async move {
            let checks = async move {
                let mut checks = Vec::with_capacity(targets.len());
                for (sub_path, location) in targets {
                    let (reachable, error) = match probe.probe(&location).await {
                        Ok(reachable) => (reachable, None),
                        Err(e) => (false, Some(e.to_string())),
                    };
                    checks.push(MediaCheck {
                        sub_path,
                        location,
                        reachable,
                        error,
                    });
                }
                checks
            };

            tokio::select! {
                _ = &mut cancel_rx => debug!("Media validation cancelled"),
                checks = checks => {
                    let _ = result_tx.send(checks);
                }
            }
        });

        MediaValidation {
            results: result_rx,
            cancel: cancel_tx,
        }
    }

    /// Drops unreachable media. Returns how many were dropped.
    pub fn apply_media_checks(&mut self, checks: &[MediaCheck]) -> usize {
        let mut dropped = 0;
        for check in checks.iter().filter(|c| !c.reachable) {
            if let Some(sub_path) = self.path.sub_path_mut(check.sub_path) {
                warn!(
                    "Medium of sub-path {} unreachable ({}): {}",
                    check.sub_path,
                    check.location,
                    check.error.as_deref().unwrap_or("not found")
                );
                sub_path.medium = Medium::None;
                dropped += 1;
            }
        }
        dropped
    }

    /// Probes every URL medium and drops the unreachable ones.
    pub async fn validate_media<P: MediaProbe>(&mut self, probe: Arc<P>) -> Result<Vec<MediaCheck>, EnvError> {
        let checks = self.spawn_media_validation(probe).join().await?;
        let dropped = self.apply_media_checks(&checks);
        info!("Validated {} media, dropped {}", checks.len(), dropped);
        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{DataPoint, PathBuilder};
    use crate::config::{MediaSettings, PositionMode};
    use crate::error::MediaError;
    use crate::follower::KinematicBody;
    use crate::ground::GroundPlane;
    use crate::media::{display_name, MediaAsset, MediaResolver};
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use datapath_env::TokioContext;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::Duration;

    /// `.mp4` resolves to a URL, `.jpg` to an image, anything else fails.
    struct StubResolver;

    impl MediaResolver for StubResolver {
        fn resolve(&self, content: &str, _base_dir: &str) -> Result<Medium, MediaError> {
            if content.ends_with(".mp4") {
                Ok(Medium::VideoUrl {
                    url: format!("https://media.example.org/{}", content),
                })
            } else if content.ends_with(".jpg") {
                Ok(Medium::Image(MediaAsset {
                    path: PathBuf::from(content),
                    name: display_name(content),
                }))
            } else {
                Err(MediaError::not_found(content))
            }
        }
    }

    struct ListProbe {
        reachable: HashSet<String>,
    }

    #[async_trait]
    impl MediaProbe for ListProbe {
        async fn probe(&self, location: &str) -> Result<bool, EnvError> {
            if location.contains("timeout") {
                return Err(EnvError::Timeout(1200));
            }
            Ok(self.reachable.contains(location))
        }
    }

    fn ts(secs: u32) -> String {
        format!("2024-01-01T00:00:{:02}Z", secs)
    }

    /// Sub-path 0: image A over x 0..2; sub-path 1: video B over x 3..5;
    /// sub-path 2: image C with a broken timestamp.
    fn runtime() -> ExhibitRuntime<TokioContext> {
        let points = vec![
            DataPoint::new(0, Vector3::new(0.0, 0.0, 0.0), ts(0)).with_content("A.jpg"),
            DataPoint::new(1, Vector3::new(1.0, 0.0, 0.0), ts(1)).with_content("A.jpg"),
            DataPoint::new(2, Vector3::new(2.0, 0.0, 0.0), ts(2)).with_content("A.jpg"),
            DataPoint::new(3, Vector3::new(3.0, 0.0, 0.0), ts(3)).with_content("B.mp4"),
            DataPoint::new(4, Vector3::new(5.0, 0.0, 0.0), ts(5)).with_content("B.mp4"),
            DataPoint::new(5, Vector3::new(6.0, 0.0, 0.0), "broken").with_content("C.jpg"),
            DataPoint::new(6, Vector3::new(7.0, 0.0, 0.0), ts(7)).with_content("C.jpg"),
        ];
        let path = PathBuilder::new(&StubResolver).build(&points).unwrap();
        let mut config = ExhibitConfig::default();
        config.follower.position_mode = PositionMode::Full;
        ExhibitRuntime::new(TokioContext::shared(), config, path)
    }

    #[test]
    fn test_spot_interaction_follows_from_start() {
        let mut rt = runtime();
        let mut rx = rt.subscribe();

        let outcome = rt.interact(SubPathId(0), Interaction::Spot).unwrap();
        assert!(outcome.following);
        assert_eq!(outcome.start_local_index, 0);
        assert_eq!(rt.game_state(), GameState::ViewMedia);
        assert_eq!(rt.follower.state(), FollowState::Following);

        assert_eq!(
            rx.try_recv().unwrap(),
            PathEvent::GameStateChanged {
                from: GameState::WalkAround,
                to: GameState::ViewMedia
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            PathEvent::SubPathSelected { sub_path: SubPathId(0), .. }
        ));
    }

    #[test]
    fn test_line_interaction_starts_at_nearest_point() {
        let mut rt = runtime();
        let outcome = rt
            .interact(
                SubPathId(0),
                Interaction::Line {
                    player_position: Vector3::new(1.2, 0.0, 0.5),
                },
            )
            .unwrap();
        assert_eq!(outcome.start_local_index, 1);
        assert_relative_eq!(outcome.start_secs, 1.0);
        assert_eq!(rt.follower.last_reached_anchor(), 1);
    }

    #[test]
    fn test_video_holds_until_prepared() {
        let mut rt = runtime();
        let mut body = KinematicBody::default();
        rt.interact(SubPathId(1), Interaction::Spot).unwrap();
        assert!(rt.follower.is_awaiting_media());

        rt.tick(&mut body, 0.5);
        assert_relative_eq!(rt.follower.distance_travelled(), 3.0, epsilon = 1e-9);

        let mut rx = rt.subscribe();
        rt.video_prepared();
        assert_eq!(
            rx.try_recv().unwrap(),
            PathEvent::VideoPrepared { sub_path: SubPathId(1) }
        );
        rt.tick(&mut body, 0.5);
        assert_relative_eq!(rt.follower.distance_travelled(), 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_failed_timing_is_selected_but_not_followed() {
        let mut rt = runtime();
        let mut rx = rt.subscribe();
        let outcome = rt.interact(SubPathId(2), Interaction::Spot).unwrap();

        assert!(!outcome.following);
        assert_eq!(rt.follower.state(), FollowState::Idle);
        assert_eq!(rt.game_state(), GameState::ViewMedia);
        // Selection is still announced
        let _state_change = rx.try_recv().unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            PathEvent::SubPathSelected { sub_path: SubPathId(2), .. }
        ));
        // Other sub-paths are unaffected
        assert!(rt.path.sub_path(SubPathId(0)).unwrap().is_traversable());
    }

    #[test]
    fn test_walk_around_detaches() {
        let mut rt = runtime();
        rt.interact(SubPathId(0), Interaction::Spot).unwrap();
        rt.set_game_state(GameState::Menu);
        assert_eq!(rt.follower.state(), FollowState::Idle);
        assert_eq!(rt.follower.active_sub_path(), None);
    }

    #[test]
    fn test_scrub_to_ratio() {
        let mut rt = runtime();
        assert_eq!(rt.scrub_to_ratio(0.5), Err(FollowError::NotAttached));

        rt.interact(SubPathId(0), Interaction::Spot).unwrap();
        assert_eq!(rt.scrub_to_ratio(0.5).unwrap(), 1);
        assert_eq!(rt.scrub_to_ratio(1.0).unwrap(), 2);
        assert_eq!(rt.scrub_to_ratio(-3.0).unwrap(), 0);
        let progress = rt.progress().unwrap();
        assert_eq!(progress.ratio, 0.0);
    }

    #[test]
    fn test_projection_refreshes_distances() {
        let mut rt = runtime();
        let before = rt.path.sub_path(SubPathId(0)).unwrap().points[1].path_distance;

        let report = rt
            .set_path_origin(Vector3::new(0.0, 0.0, 0.0), &GroundPlane::new(0.0).with_bounds((-1.0, -1.0), (0.5, 1.0)))
            .unwrap()
            .unwrap();
        assert_eq!(report.hits, 1);

        // Anchor 0 dropped to the floor, anchor 1 stayed at the ceiling
        let after = rt.path.sub_path(SubPathId(0)).unwrap().points[1].path_distance;
        assert!(after > before);
        assert_relative_eq!(after, 5.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_validate_media_drops_unreachable() {
        let mut rt = runtime();
        let probe = Arc::new(ListProbe {
            reachable: HashSet::new(),
        });

        let checks = rt.validate_media(probe).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].reachable);
        assert!(rt.path.sub_path(SubPathId(1)).unwrap().medium.is_none());
        assert!(!rt.path.sub_path(SubPathId(0)).unwrap().medium.is_none());
    }

    #[tokio::test]
    async fn test_validate_media_keeps_reachable() {
        let mut rt = runtime();
        let probe = Arc::new(ListProbe {
            reachable: ["https://media.example.org/B.mp4".to_string()].into_iter().collect(),
        });

        let checks = rt.validate_media(probe).await.unwrap();
        assert!(checks[0].reachable);
        assert!(rt.path.sub_path(SubPathId(1)).unwrap().medium.is_video());
    }

    #[tokio::test]
    async fn test_cancelled_validation_reports_cancelled() {
        struct SlowProbe;

        #[async_trait]
        impl MediaProbe for SlowProbe {
            async fn probe(&self, _location: &str) -> Result<bool, EnvError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            }
        }

        let rt = runtime();
        let validation = rt.spawn_media_validation(Arc::new(SlowProbe));
        let (results, cancel) = (validation.results, validation.cancel);
        let _ = cancel.send(());
        assert!(results.await.is_err());
    }

    #[tokio::test]
    async fn test_run_finishes_sub_path() {
        let mut rt = runtime();
        let mut body = KinematicBody::default();
        rt.interact(SubPathId(0), Interaction::Spot).unwrap();
        rt.config.tick_rate_hz = 1000;

        let state = rt.run(&mut body, 10_000).await;
        assert_eq!(state, FollowState::Finished);
        assert_relative_eq!(body.position.x, 2.0, epsilon = 0.1);
    }

    #[test]
    fn test_streaming_urls_expanded_on_start() {
        let points = vec![
            DataPoint::new(0, Vector3::zeros(), ts(0)).with_content("walk/a.mp4"),
            DataPoint::new(1, Vector3::x(), ts(1)).with_content("walk/a.mp4"),
        ];
        let mut media = MediaSettings::default();
        media.video_source = crate::config::VideoSource::Url;
        media.streaming_root = PathBuf::from("/srv/streaming");
        let resolver = crate::media::FileMediaResolver::new(media.clone());
        let path = PathBuilder::new(&resolver).build(&points).unwrap();

        let config = ExhibitConfig {
            media,
            ..ExhibitConfig::default()
        };
        let rt = ExhibitRuntime::new(TokioContext::shared(), config, path);
        assert_eq!(
            rt.path.sub_path(SubPathId(0)).unwrap().medium,
            Medium::VideoUrl {
                url: "/srv/streaming/walk/a.mp4".to_string()
            }
        );
    }
}
