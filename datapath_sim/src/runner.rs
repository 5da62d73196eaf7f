//! Scenario runner - replays scripted walks through the exhibit runtime.

use crate::context::SimContext;
use crate::exporter::{state_name, SimEvent, SimExport, SimFrame};
use crate::network::ProbeFault;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use datapath_core::{
    DataPoint, ExhibitRuntime, FollowState, HeightMap, Interaction, KinematicBody, Medium, PathEvent, PathGeometry,
    PositionMode, SubPathId, TimingError, TimingStatus,
};
use nalgebra::Vector3;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total runtime ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of SubPaths built from the walk
    pub sub_path_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// Frame export, when requested
    pub export: Option<SimExport>,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    pub sub_paths_followed: usize,

    pub sub_paths_finished: usize,

    /// Ticks spent dwelling at anchors
    pub wait_ticks: u64,

    /// Horizontal avatar error against ground truth
    pub rms_error_m: Option<f64>,

    pub max_error_m: f64,

    pub media_checked: usize,

    pub media_dropped: usize,

    pub ground_hits: usize,

    pub ground_misses: usize,

    pub scrubs: usize,

    /// Runtime events observed
    pub events: u64,
}

/// Runs walkthrough scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    /// Overrides each scenario's sample noise
    sensor_noise_std: Option<f64>,

    /// Record a frame every this many ticks
    export_interval: Option<u64>,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 60,
            max_duration_secs: 120.0,
            sensor_noise_std: None,
            export_interval: None,
        }
    }

    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.sensor_noise_std = Some(std_dev);
        self
    }

    /// Builder: export a frame every `every_ticks` ticks.
    pub fn with_export(mut self, every_ticks: u64) -> Self {
        self.export_interval = Some(every_ticks.max(1));
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let outcome = match scenario {
            ScenarioId::Dwell => self.run_dwell().await,
            ScenarioId::ContentSwitch => self.run_content_switch().await,
            ScenarioId::MalformedTimestamp => self.run_malformed_timestamp().await,
            ScenarioId::GroundProjection => self.run_ground_projection().await,
            ScenarioId::Scrub => self.run_scrub().await,
            ScenarioId::MediaOutage => self.run_media_outage().await,
            ScenarioId::LongWalk => self.run_long_walk().await,
        };

        match outcome {
            Ok(replay) => replay.into_result(scenario, self.seed),
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                sub_path_count: 0,
                failure_reason: Some(reason),
                metrics: ScenarioMetrics::default(),
                export: None,
            },
        }
    }

    fn world(&self, default_noise: f64) -> SimWorld {
        SimWorld::new(SimConfig {
            seed: self.seed,
            tick_rate_hz: self.tick_rate_hz,
            max_duration_secs: self.max_duration_secs,
            sensor_noise_std: self.sensor_noise_std.unwrap_or(default_noise),
            ..SimConfig::default()
        })
    }

    fn replay(&self, scenario: ScenarioId, world: SimWorld, points: &[DataPoint]) -> Result<Replay, String> {
        let runtime = world.build_runtime(points).map_err(|e| e.to_string())?;
        let events = runtime.subscribe();
        let sample_times = world.oracle.sample_times();
        Ok(Replay {
            world,
            runtime,
            events,
            sample_times,
            metrics: ScenarioMetrics::default(),
            errors: Vec::new(),
            failures: Vec::new(),
            export: self.export_interval.map(|_| SimExport::new(scenario.name(), self.seed)),
            export_interval: self.export_interval.unwrap_or(u64::MAX),
            pending_events: Vec::new(),
        })
    }

    /// Three legs, one medium each.
    fn three_media_walk(world: &mut SimWorld) {
        world
            .oracle
            .walk_to(Vector3::new(4.0, 0.0, 0.0), 1.0, Some("tour/a.mp4"))
            .walk_to(Vector3::new(4.0, 0.0, 4.0), 1.0, Some("tour/b.mp4"))
            .walk_to(Vector3::new(0.0, 0.0, 4.0), 2.0, Some("tour/c.mp4"));
    }

    /// DP-001: Dwell - standing still is replayed as waiting.
    ///
    /// **Assertion**: about three seconds of waiting, RMS error < 0.5m.
    async fn run_dwell(&self) -> Result<Replay, String> {
        info!("DP-001: Dwell - walk, stand still, walk on");

        let mut world = self.world(0.0);
        let content = Some("tour/dwell.mp4");
        world
            .oracle
            .walk_to(Vector3::new(5.0, 0.0, 0.0), 1.25, content)
            .dwell(3.0, content)
            .walk_to(Vector3::new(5.0, 0.0, 5.0), 1.25, content);
        let points = world.record();
        let mut replay = self.replay(ScenarioId::Dwell, world, &points)?;

        let state = replay.follow(SubPathId(0))?;
        let wait_secs = replay.metrics.wait_ticks as f64 * replay.world.dt();
        let rms = replay.rms().unwrap_or(f64::INFINITY);

        info!("Dwell complete: waited {:.2}s, RMS error {:.3}m", wait_secs, rms);
        replay.expect(state == FollowState::Finished, || format!("ended {:?}", state));
        replay.expect((2.5..=3.6).contains(&wait_secs), || {
            format!("waited {:.2}s for a 3s dwell", wait_secs)
        });
        replay.expect(rms < 0.5, || format!("RMS error {:.2}m exceeds 0.5m", rms));
        Ok(replay)
    }

    /// DP-002: ContentSwitch - one SubPath per medium, each followed.
    async fn run_content_switch(&self) -> Result<Replay, String> {
        info!("DP-002: ContentSwitch - three media along one walk");

        let mut world = self.world(0.0);
        Self::three_media_walk(&mut world);
        let points = world.record();
        let mut replay = self.replay(ScenarioId::ContentSwitch, world, &points)?;

        let sub_paths = replay.runtime.path.sub_paths();
        let count = sub_paths.len();
        let contiguous = sub_paths.iter().all(|sp| {
            sp.points
                .windows(2)
                .all(|w| w[1].global_index == w[0].global_index + 1)
        }) && sub_paths
            .windows(2)
            .all(|w| w[0].last_global_index().map(|i| i + 1) == w[1].first_global_index());
        replay.expect(count == 3, || format!("{} sub-paths for 3 media", count));
        replay.expect(contiguous, || "sub-paths are not contiguous".to_string());

        for id in (0..count).map(SubPathId) {
            let interaction = match id {
                // Enter the middle medium by its line, near its third point
                SubPathId(1) => Interaction::Line {
                    player_position: Vector3::new(4.3, 0.0, 1.1),
                },
                _ => Interaction::Spot,
            };
            let outcome = replay.runtime.interact(id, interaction).map_err(|e| e.to_string())?;
            if id == SubPathId(1) {
                replay.expect(outcome.start_local_index == 2, || {
                    format!("line interaction started at point {}", outcome.start_local_index)
                });
            }
            replay.runtime.video_prepared();
            replay.metrics.sub_paths_followed += 1;

            let mut body = start_body(&replay.runtime, id, outcome.start_local_index);
            let budget = replay.tick_budget(id);
            let state = replay.runtime.run(&mut body, budget).await;
            replay.drain_events();

            let end = replay
                .runtime
                .path
                .sub_path(id)
                .and_then(|sp| sp.points.last())
                .map(|p| p.position)
                .unwrap_or_else(Vector3::zeros);
            let miss = horizontal_error(&body.position, &end);
            debug!("Sub-path {} ended {:?}, {:.3}m from its last point", id, state, miss);

            if state == FollowState::Finished {
                replay.metrics.sub_paths_finished += 1;
            }
            replay.expect(state == FollowState::Finished, || format!("sub-path {} ended {:?}", id, state));
            replay.expect(miss < 0.1, || format!("sub-path {} ended {:.2}m from its end", id, miss));
        }

        info!(
            "ContentSwitch complete: {}/{} sub-paths finished",
            replay.metrics.sub_paths_finished, count
        );
        Ok(replay)
    }

    /// DP-003: MalformedTimestamp - one bad timestamp blocks only its SubPath.
    async fn run_malformed_timestamp(&self) -> Result<Replay, String> {
        info!("DP-003: MalformedTimestamp - corrupted sample in the middle medium");

        let mut world = self.world(0.0);
        Self::three_media_walk(&mut world);
        let mut points = world.record();
        // t = 5.0s, inside the second medium
        let corrupted = 10;
        if let Some(point) = points.get_mut(corrupted) {
            point.timestamp = "not-a-timestamp".to_string();
        }
        let mut replay = self.replay(ScenarioId::MalformedTimestamp, world, &points)?;

        let timing = replay
            .runtime
            .path
            .sub_path(SubPathId(1))
            .map(|sp| sp.timing.clone());
        let parse_failed = matches!(
            timing,
            Some(TimingStatus::Failed(TimingError::TimestampParse { global_index, .. })) if global_index == corrupted
        );
        replay.expect(parse_failed, || format!("middle sub-path timing is {:?}", timing));

        let outcome = replay
            .runtime
            .interact(SubPathId(1), Interaction::Spot)
            .map_err(|e| e.to_string())?;
        replay.expect(!outcome.following, || "broken sub-path was followed".to_string());

        for id in [SubPathId(0), SubPathId(2)] {
            let state = replay.follow(id)?;
            replay.expect(state == FollowState::Finished, || format!("sub-path {} ended {:?}", id, state));
        }

        info!(
            "MalformedTimestamp complete: {} of 3 sub-paths followed",
            replay.metrics.sub_paths_finished
        );
        Ok(replay)
    }

    /// DP-004: GroundProjection - anchors land on terrain.
    async fn run_ground_projection(&self) -> Result<Replay, String> {
        info!("DP-004: GroundProjection - rolling terrain");

        let mut world = self.world(0.0);
        world.exhibit.follower.position_mode = PositionMode::Full;
        let content = Some("tour/hill.mp4");
        world
            .oracle
            .walk_to(Vector3::new(6.0, 0.0, 0.0), 1.0, content)
            .walk_to(Vector3::new(6.0, 0.0, 6.0), 1.0, content);
        let points = world.record();
        let mut replay = self.replay(ScenarioId::GroundProjection, world, &points)?;

        let terrain = HeightMap::from_fn((-10.0, -10.0), 0.5, 41, 41, |x, z| {
            0.3 * (x * 0.8).sin() + 0.2 * (z * 0.6).cos()
        })
        .ok_or_else(|| "invalid terrain grid".to_string())?;

        let flat_length = replay.runtime.path.geometry().length();
        let report = replay
            .runtime
            .project_to_ground(&terrain)
            .map_err(|e| e.to_string())?;
        replay.metrics.ground_hits = report.hits;
        replay.metrics.ground_misses = report.misses;
        replay.drain_events();

        let geometry = replay.runtime.path.geometry();
        let worst = (0..geometry.num_points())
            .filter_map(|i| geometry.anchor(i))
            .filter_map(|a| terrain.height_at(a.x, a.z).map(|h| (a.y - h).abs()))
            .fold(0.0, f64::max);
        let projected_length = geometry.length();
        let last_distance = replay
            .runtime
            .path
            .sub_path(SubPathId(0))
            .and_then(|sp| sp.points.last())
            .map(|p| p.path_distance)
            .unwrap_or(0.0);

        replay.expect(report.misses == 0, || format!("{} anchors missed the terrain", report.misses));
        replay.expect(worst < 1e-9, || format!("anchor off terrain by {:.3}m", worst));
        replay.expect(projected_length > flat_length, || {
            format!("length {:.3}m not longer than flat {:.3}m", projected_length, flat_length)
        });
        replay.expect((last_distance - projected_length).abs() < 1e-9, || {
            format!("distances not refreshed: {:.3} vs {:.3}", last_distance, projected_length)
        });

        let (state, body) = replay.follow_with_body(SubPathId(0))?;
        let end_height = replay
            .runtime
            .path
            .geometry()
            .anchor(points.len() - 1)
            .map(|a| a.y)
            .unwrap_or(f64::NAN);
        replay.expect(state == FollowState::Finished, || format!("ended {:?}", state));
        replay.expect((body.position.y - end_height).abs() < 1e-6, || {
            format!("avatar at height {:.3}, ground {:.3}", body.position.y, end_height)
        });

        info!(
            "GroundProjection complete: {} hits, length {:.2}m -> {:.2}m",
            report.hits, flat_length, projected_length
        );
        Ok(replay)
    }

    /// DP-005: Scrub - jumps land on the closest recorded point.
    async fn run_scrub(&self) -> Result<Replay, String> {
        info!("DP-005: Scrub - seeking while following");

        let mut world = self.world(0.0);
        world
            .oracle
            .walk_to(Vector3::new(10.0, 0.0, 0.0), 1.0, Some("tour/scrub.mp4"));
        let points = world.record();
        let mut replay = self.replay(ScenarioId::Scrub, world, &points)?;
        let id = SubPathId(0);
        let half_interval = replay.world.oracle.sample_interval() / 2.0;

        replay.runtime.interact(id, Interaction::Spot).map_err(|e| e.to_string())?;
        replay.runtime.video_prepared();
        let mut body = SimWorld::body_at_start(&replay.runtime, id);
        replay.advance(&mut body, 30);

        let duration = replay
            .runtime
            .path
            .sub_path(id)
            .map(|sp| sp.duration_secs())
            .unwrap_or(0.0);

        for ratio in [0.8, 0.2, 0.55, 0.0] {
            let reached = replay.runtime.scrub_to_ratio(ratio).map_err(|e| e.to_string())?;
            replay.metrics.scrubs += 1;
            let (relative, distance) = replay
                .runtime
                .path
                .sub_path(id)
                .and_then(|sp| sp.point_by_global_index(reached).ok())
                .map(|p| (p.relative_time_secs, p.path_distance))
                .unwrap_or((f64::NAN, f64::NAN));
            let gap = (relative - ratio * duration).abs();
            replay.expect(gap <= half_interval + 1e-9, || {
                format!("scrub to {:.2} landed {:.2}s away", ratio, gap)
            });

            replay.advance(&mut body, 10);
            let travelled = replay.runtime.follower.distance_travelled();
            replay.expect(travelled > distance, || {
                format!("no progress after scrub to {:.2}", ratio)
            });
        }

        let last = replay.runtime.scrub_to_ratio(1.0).map_err(|e| e.to_string())?;
        replay.metrics.scrubs += 1;
        replay.expect(last == points.len() - 1, || format!("scrub to end reached {}", last));
        let state = replay.advance(&mut body, 1);
        replay.expect(state == FollowState::Finished, || format!("scrub to end left {:?}", state));

        replay.runtime.scrub_to_ratio(0.3).map_err(|e| e.to_string())?;
        replay.metrics.scrubs += 1;
        let state = replay.advance(&mut body, 1);
        replay.expect(state == FollowState::Following, || {
            format!("scrub back from the end left {:?}", state)
        });

        info!("Scrub complete: {} scrubs", replay.metrics.scrubs);
        Ok(replay)
    }

    /// DP-006: MediaOutage - unreachable videos are dropped.
    async fn run_media_outage(&self) -> Result<Replay, String> {
        info!("DP-006: MediaOutage - one video server times out");

        let mut world = self.world(0.0);
        Self::three_media_walk(&mut world);
        for name in ["a", "b", "c"] {
            world.probe.publish(format!("StreamingAssets/tour/{}.mp4", name));
        }
        world
            .probe
            .inject_fault("StreamingAssets/tour/b.mp4", ProbeFault::Timeout);
        let points = world.record();
        let mut replay = self.replay(ScenarioId::MediaOutage, world, &points)?;

        let probe = Arc::clone(&replay.world.probe);
        let checks = replay
            .runtime
            .validate_media(probe)
            .await
            .map_err(|e| e.to_string())?;
        let dropped = checks.iter().filter(|c| !c.reachable).count();
        replay.metrics.media_checked = checks.len();
        replay.metrics.media_dropped = dropped;

        let media: Vec<Medium> = replay
            .runtime
            .path
            .sub_paths()
            .iter()
            .map(|sp| sp.medium.clone())
            .collect();
        replay.expect(checks.len() == 3, || format!("{} media checked", checks.len()));
        replay.expect(dropped == 1, || format!("{} media dropped", dropped));
        replay.expect(
            media.len() == 3 && media[1].is_none() && media[0].is_video() && media[2].is_video(),
            || format!("media after validation: {:?}", media),
        );
        let probes = replay.world.probe.total_calls();
        replay.expect(probes == 3, || format!("{} probes for 3 media", probes));

        // No video to wait for: following starts immediately
        let state = replay.follow(SubPathId(1))?;
        replay.expect(state == FollowState::Finished, || format!("ended {:?}", state));

        info!("MediaOutage complete: {}/{} media dropped", dropped, checks.len());
        Ok(replay)
    }

    /// DP-007: LongWalk - noisy random walk.
    ///
    /// **Assertion**: RMS error < 1m against ground truth.
    async fn run_long_walk(&self) -> Result<Replay, String> {
        info!("DP-007: LongWalk - noisy random walk");

        let mut world = self.world(0.05);
        let target_secs = (self.max_duration_secs * 0.5).max(10.0);
        let mut legs = 0;
        while world.oracle.duration() < target_secs && legs < 500 {
            world.oracle.random_walk(1, 15.0, Some("long/walk.mp4"));
            legs += 1;
        }
        let points = world.record();
        let mut replay = self.replay(ScenarioId::LongWalk, world, &points)?;

        let state = replay.follow(SubPathId(0))?;
        let rms = replay.rms().unwrap_or(f64::INFINITY);
        replay.expect(state == FollowState::Finished, || format!("ended {:?}", state));
        replay.expect(rms < 1.0, || format!("RMS error {:.2}m exceeds 1.0m", rms));

        info!(
            "LongWalk complete: {} legs, {} points, RMS error {:.3}m, max {:.3}m",
            legs,
            points.len(),
            rms,
            replay.metrics.max_error_m
        );
        Ok(replay)
    }
}

/// One scenario's world, runtime and bookkeeping.
struct Replay {
    world: SimWorld,
    runtime: ExhibitRuntime<SimContext>,
    events: broadcast::Receiver<PathEvent>,
    /// Walk time of every recorded point
    sample_times: Vec<f64>,
    metrics: ScenarioMetrics,
    /// Horizontal error per following tick
    errors: Vec<f64>,
    failures: Vec<String>,
    export: Option<SimExport>,
    export_interval: u64,
    pending_events: Vec<SimEvent>,
}

impl Replay {
    fn expect(&mut self, ok: bool, failure: impl FnOnce() -> String) {
        if !ok {
            self.failures.push(failure());
        }
    }

    /// Walk time at the first point of a SubPath.
    fn walk_time_of(&self, id: SubPathId) -> f64 {
        self.runtime
            .path
            .sub_path(id)
            .and_then(|sp| sp.first_global_index())
            .and_then(|g| self.sample_times.get(g).copied())
            .unwrap_or(0.0)
    }

    /// Twice the SubPath's duration plus five seconds.
    fn tick_budget(&self, id: SubPathId) -> u64 {
        let duration = self
            .runtime
            .path
            .sub_path(id)
            .map(|sp| sp.duration_secs())
            .unwrap_or(0.0);
        ((duration * 2.0 + 5.0) / self.world.dt()).ceil() as u64
    }

    fn follow(&mut self, id: SubPathId) -> Result<FollowState, String> {
        self.follow_with_body(id).map(|(state, _)| state)
    }

    /// Interacts with a SubPath and ticks until following ends, measuring the
    /// avatar against ground truth.
    fn follow_with_body(&mut self, id: SubPathId) -> Result<(FollowState, KinematicBody), String> {
        let outcome = self
            .runtime
            .interact(id, Interaction::Spot)
            .map_err(|e| e.to_string())?;
        let mut body = SimWorld::body_at_start(&self.runtime, id);
        if !outcome.following {
            return Ok((self.runtime.follower.state(), body));
        }
        self.metrics.sub_paths_followed += 1;
        if self.runtime.follower.is_awaiting_media() {
            self.runtime.video_prepared();
        }

        let start = self.walk_time_of(id);
        let mut elapsed = 0.0;
        let mut state = self.runtime.follower.state();
        for _ in 0..self.tick_budget(id) {
            if matches!(state, FollowState::Finished | FollowState::Idle) {
                break;
            }
            state = self.world.tick(&mut self.runtime, &mut body);
            elapsed += self.world.dt();
            if matches!(state, FollowState::Waiting { .. }) {
                self.metrics.wait_ticks += 1;
            }

            let truth = self.world.oracle.position_at(start + elapsed);
            let error = horizontal_error(&body.position, &truth);
            if state != FollowState::Finished {
                self.errors.push(error);
                self.metrics.max_error_m = self.metrics.max_error_m.max(error);
            }
            self.record_frame(truth, &body, state, Some(id), Some(error));
        }

        if state == FollowState::Finished {
            self.metrics.sub_paths_finished += 1;
        }
        debug!("Sub-path {} followed: {:?} after {:.2}s", id, state, elapsed);
        Ok((state, body))
    }

    /// Ticks `n` times without measuring.
    fn advance(&mut self, body: &mut KinematicBody, n: u64) -> FollowState {
        let mut state = self.runtime.follower.state();
        for _ in 0..n {
            state = self.world.tick(&mut self.runtime, body);
            let position = body.position;
            self.record_frame(position, body, state, self.runtime.follower.active_sub_path(), None);
        }
        state
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.metrics.events += 1;
                    if self.export.is_some() {
                        self.pending_events.push(SimEvent::from(&event));
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.metrics.events += skipped,
                Err(_) => break,
            }
        }
    }

    fn record_frame(
        &mut self,
        walker: Vector3<f64>,
        body: &KinematicBody,
        state: FollowState,
        sub_path: Option<SubPathId>,
        error_m: Option<f64>,
    ) {
        self.drain_events();
        if self.runtime.tick_count() % self.export_interval != 0 {
            return;
        }
        let time_sec = self.world.time();
        let events = std::mem::take(&mut self.pending_events);
        if let Some(export) = self.export.as_mut() {
            export.add_frame(SimFrame {
                time_sec,
                walker: walker.into(),
                avatar: body.position.into(),
                state: state_name(state).to_string(),
                sub_path: sub_path.map(|id| id.0),
                error_m,
                events,
            });
        }
    }

    fn rms(&self) -> Option<f64> {
        if self.errors.is_empty() {
            return None;
        }
        let mean_sq = self.errors.iter().map(|e| e * e).sum::<f64>() / self.errors.len() as f64;
        Some(mean_sq.sqrt())
    }

    fn into_result(mut self, scenario: ScenarioId, seed: u64) -> ScenarioResult {
        self.drain_events();
        self.metrics.rms_error_m = self.rms();
        let passed = self.failures.is_empty();
        let failure_reason = (!passed).then(|| self.failures.join("; "));
        if let Some(export) = self.export.as_mut() {
            export.finalize(passed, self.metrics.rms_error_m);
        }

        ScenarioResult {
            scenario,
            seed,
            passed,
            total_ticks: self.runtime.tick_count(),
            final_time_secs: self.world.time(),
            sub_path_count: self.runtime.path.sub_paths().len(),
            failure_reason,
            metrics: self.metrics,
            export: self.export,
        }
    }
}

/// Avatar on a given point of a SubPath.
fn start_body(runtime: &ExhibitRuntime<SimContext>, id: SubPathId, local_index: usize) -> KinematicBody {
    let position = runtime
        .path
        .sub_path(id)
        .and_then(|sp| sp.point(local_index))
        .map(|p| p.position + runtime.path.origin());
    match position {
        Some(position) => KinematicBody::new(position),
        None => SimWorld::body_at_start(runtime, id),
    }
}

fn horizontal_error(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt()
}
