//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::network::SimProbe;
use crate::oracle::Oracle;

use datapath_core::{
    BuildError, DataPoint, ExhibitConfig, ExhibitRuntime, FileMediaResolver, FollowState, KinematicBody, PathBuilder,
    SubPathId, VideoSource,
};
use datapath_env::{ExhibitContext, PathId};
use nalgebra::Vector3;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Tick rate in Hz
    pub tick_rate_hz: u32,

    /// Maximum simulation duration in seconds (0 = unlimited)
    pub max_duration_secs: f64,

    /// Horizontal noise standard deviation of recorded samples
    pub sensor_noise_std: f64,

    /// Seconds between recorded samples
    pub sample_interval_secs: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 60,
            max_duration_secs: 120.0,
            sensor_noise_std: 0.0,
            sample_interval_secs: 0.5,
        }
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Ground truth oracle
    pub oracle: Oracle,

    /// Media probe for fault injection
    pub probe: Arc<SimProbe>,

    /// Exhibit settings handed to every runtime built here
    pub exhibit: ExhibitConfig,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    pub fn new(config: SimConfig) -> Self {
        // Derive separate seeds for different subsystems
        let context_seed = config.seed;
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let context = SimContext::shared(context_seed);

        let mut oracle = Oracle::new(physics_seed, Vector3::zeros());
        oracle.set_position_noise(config.sensor_noise_std);
        oracle.set_sample_interval(config.sample_interval_secs);

        let mut exhibit = ExhibitConfig {
            name: format!("sim-{}", config.seed),
            tick_rate_hz: config.tick_rate_hz,
            ..ExhibitConfig::default()
        };
        exhibit.media.video_source = VideoSource::Url;
        exhibit.media.search_directory = false;

        Self {
            config,
            context,
            oracle,
            probe: Arc::new(SimProbe::new()),
            exhibit,
            tick_count: 0,
        }
    }

    /// Records the scripted walk.
    pub fn record(&mut self) -> Vec<DataPoint> {
        self.oracle.record()
    }

    /// Builds a path from `points` and wraps it in a runtime on the virtual clock.
    pub fn build_runtime(&self, points: &[DataPoint]) -> Result<ExhibitRuntime<SimContext>, BuildError> {
        let resolver = FileMediaResolver::new(self.exhibit.media.clone());
        let path = PathBuilder::new(&resolver)
            .with_settings(self.exhibit.import.clone())
            .with_name(self.exhibit.name.clone())
            .with_path_id(PathId::from_seed(self.config.seed))
            .build(points)?;
        Ok(ExhibitRuntime::new(self.context.clone(), self.exhibit.clone(), path))
    }

    /// Avatar standing on the first point of a SubPath.
    pub fn body_at_start(runtime: &ExhibitRuntime<SimContext>, id: SubPathId) -> KinematicBody {
        let origin = runtime.path.origin();
        let start = runtime
            .path
            .sub_path(id)
            .and_then(|sp| sp.points.first())
            .map(|p| p.position)
            .unwrap_or_else(Vector3::zeros);
        KinematicBody::new(origin + start)
    }

    pub fn dt(&self) -> f64 {
        1.0 / self.config.tick_rate_hz.max(1) as f64
    }

    /// Tick budget for `max_duration_secs`.
    pub fn max_ticks(&self) -> u64 {
        if self.config.max_duration_secs <= 0.0 {
            u64::MAX
        } else {
            (self.config.max_duration_secs * self.config.tick_rate_hz as f64).ceil() as u64
        }
    }

    /// Advances the virtual clock by one tick and steps the runtime.
    pub fn tick(&mut self, runtime: &mut ExhibitRuntime<SimContext>, body: &mut KinematicBody) -> FollowState {
        let dt = self.dt();
        self.context.advance_time(Duration::from_secs_f64(dt));
        self.tick_count += 1;
        runtime.tick(body, dt)
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapath_core::{Interaction, Medium};

    fn world() -> SimWorld {
        let mut world = SimWorld::new(SimConfig::default());
        world
            .oracle
            .walk_to(Vector3::new(3.0, 0.0, 0.0), 1.0, Some("tour/intro.mp4"))
            .walk_to(Vector3::new(3.0, 0.0, 2.0), 1.0, Some("tour/hall.mp4"));
        world
    }

    #[test]
    fn test_sim_world_tick() {
        let mut world = world();
        let points = world.record();
        let mut runtime = world.build_runtime(&points).unwrap();
        let mut body = SimWorld::body_at_start(&runtime, SubPathId(0));

        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.time(), 0.0);

        world.tick(&mut runtime, &mut body);
        assert_eq!(world.tick_count(), 1);
        assert!((world.time() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_sim_world_builds_url_media() {
        let mut world = world();
        let points = world.record();
        let runtime = world.build_runtime(&points).unwrap();

        assert_eq!(runtime.path.sub_paths().len(), 2);
        assert_eq!(
            runtime.path.sub_path(SubPathId(1)).unwrap().medium,
            Medium::VideoUrl {
                url: "StreamingAssets/tour/hall.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_sim_world_follows_walk() {
        let mut world = world();
        let points = world.record();
        let mut runtime = world.build_runtime(&points).unwrap();
        let mut body = SimWorld::body_at_start(&runtime, SubPathId(0));

        runtime.interact(SubPathId(0), Interaction::Spot).unwrap();
        runtime.video_prepared();

        let mut state = runtime.follower.state();
        while state != FollowState::Finished && world.tick_count() < world.max_ticks() {
            state = world.tick(&mut runtime, &mut body);
        }
        assert_eq!(state, FollowState::Finished);
        // The first SubPath ends on the sample at 2.5s
        assert!((world.time() - 2.5).abs() < 0.1);
        assert!((body.position.x - 2.5).abs() < 0.1);
    }

    #[test]
    fn test_sim_world_determinism() {
        let mut config = SimConfig::default();
        config.sensor_noise_std = 0.2;

        let record = |config: SimConfig| {
            let mut world = SimWorld::new(config);
            world.oracle.walk_to(Vector3::new(5.0, 0.0, 0.0), 1.0, None);
            world.record()
        };
        assert_eq!(record(config.clone()), record(config));
    }
}
