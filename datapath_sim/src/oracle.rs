//! Ground truth oracle for simulation.
//!
//! The Oracle scripts a visitor's walk and knows where the walker truly was
//! at every instant:
//! - Legs of walking at constant speed and of standing still
//! - Recording of timestamped samples (with noise) as a point file would hold them
//! - Ground truth lookup for error calculation

use crate::context::SIM_EPOCH_SECS;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use datapath_core::DataPoint;
use nalgebra::Vector3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// One piece of the scripted walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegKind {
    /// Straight walk to `to` at `speed` m/s
    Walk { to: Vector3<f64>, speed: f64 },
    /// Standing still
    Dwell { secs: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkLeg {
    pub kind: LegKind,
    /// Medium attached to samples of this leg
    pub content: Option<String>,
    /// Position at the start of the leg
    pub from: Vector3<f64>,
    /// Walk time at the start of the leg
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl WalkLeg {
    fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    fn position_at(&self, t: f64) -> Vector3<f64> {
        match &self.kind {
            LegKind::Dwell { .. } => self.from,
            LegKind::Walk { to, .. } => {
                if self.duration_secs <= 0.0 {
                    return *to;
                }
                let s = ((t - self.start_secs) / self.duration_secs).clamp(0.0, 1.0);
                self.from + (to - self.from) * s
            }
        }
    }
}

/// The Oracle - scripts the walk and records it.
pub struct Oracle {
    /// RNG for sample noise
    physics_rng: ChaCha8Rng,

    start: Vector3<f64>,

    legs: Vec<WalkLeg>,

    /// Horizontal position noise standard deviation (meters)
    position_noise_std: f64,

    /// Seconds between recorded samples
    sample_interval_secs: f64,
}

impl Oracle {
    /// Creates an Oracle whose walk begins at `start`.
    pub fn new(physics_seed: u64, start: Vector3<f64>) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            start,
            legs: Vec::new(),
            position_noise_std: 0.0,
            sample_interval_secs: 0.5,
        }
    }

    pub fn set_position_noise(&mut self, std_dev: f64) {
        self.position_noise_std = std_dev.max(0.0);
    }

    pub fn set_sample_interval(&mut self, secs: f64) {
        if secs > 0.0 {
            self.sample_interval_secs = secs;
        }
    }

    pub fn sample_interval(&self) -> f64 {
        self.sample_interval_secs
    }

    /// Position where the next leg begins.
    pub fn end_position(&self) -> Vector3<f64> {
        self.legs
            .last()
            .map(|leg| leg.position_at(leg.end_secs()))
            .unwrap_or(self.start)
    }

    /// Total scripted duration.
    pub fn duration(&self) -> f64 {
        self.legs.last().map(WalkLeg::end_secs).unwrap_or(0.0)
    }

    pub fn legs(&self) -> &[WalkLeg] {
        &self.legs
    }

    /// Appends a straight walk. Non-positive speeds are ignored.
    pub fn walk_to(&mut self, to: Vector3<f64>, speed: f64, content: Option<&str>) -> &mut Self {
        if speed <= 0.0 {
            return self;
        }
        let from = self.end_position();
        let duration_secs = (to - from).norm() / speed;
        self.push(LegKind::Walk { to, speed }, from, duration_secs, content);
        self
    }

    pub fn dwell(&mut self, secs: f64, content: Option<&str>) -> &mut Self {
        let from = self.end_position();
        self.push(LegKind::Dwell { secs }, from, secs.max(0.0), content);
        self
    }

    /// Appends `legs` random walk legs inside a square of half-size `extent`.
    ///
    /// Roughly one in four legs is a short dwell.
    pub fn random_walk(&mut self, legs: usize, extent: f64, content: Option<&str>) -> &mut Self {
        for _ in 0..legs {
            if self.physics_rng.gen_bool(0.25) {
                let secs = self.physics_rng.gen_range(1.0..3.0);
                self.dwell(secs, content);
            } else {
                let to = Vector3::new(
                    self.physics_rng.gen_range(-extent..extent),
                    0.0,
                    self.physics_rng.gen_range(-extent..extent),
                );
                let speed = self.physics_rng.gen_range(0.8..1.6);
                self.walk_to(to, speed, content);
            }
        }
        self
    }

    fn push(&mut self, kind: LegKind, from: Vector3<f64>, duration_secs: f64, content: Option<&str>) {
        let start_secs = self.duration();
        self.legs.push(WalkLeg {
            kind,
            content: content.map(str::to_string),
            from,
            start_secs,
            duration_secs,
        });
    }

    /// Index of the leg active at walk time `t`.
    fn leg_index_at(&self, t: f64) -> Option<usize> {
        if self.legs.is_empty() {
            return None;
        }
        let index = self.legs.partition_point(|leg| leg.end_secs() <= t);
        Some(index.min(self.legs.len() - 1))
    }

    /// True position at walk time `t`, clamped to the script.
    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        match self.leg_index_at(t) {
            Some(i) => self.legs[i].position_at(t),
            None => self.start,
        }
    }

    pub fn content_at(&self, t: f64) -> Option<&str> {
        self.leg_index_at(t).and_then(|i| self.legs[i].content.as_deref())
    }

    /// Wall-clock time of walk time `t`.
    pub fn timestamp_at(&self, t: f64) -> DateTime<Utc> {
        let epoch = DateTime::<Utc>::from_timestamp(SIM_EPOCH_SECS as i64, 0).unwrap_or_default();
        epoch + ChronoDuration::milliseconds((t * 1000.0).round() as i64)
    }

    /// Walk times at which samples are recorded: every interval plus the end.
    pub fn sample_times(&self) -> Vec<f64> {
        let duration = self.duration();
        let count = (duration / self.sample_interval_secs).floor() as usize;
        let mut times: Vec<f64> = (0..=count).map(|k| k as f64 * self.sample_interval_secs).collect();
        if times.last().map(|t| duration - t > 1e-6).unwrap_or(true) {
            times.push(duration);
        }
        times
    }

    /// Records the walk the way a tracking device would.
    ///
    /// Horizontal noise is added to every sample; heights stay exact.
    pub fn record(&mut self) -> Vec<DataPoint> {
        let normal = Normal::new(0.0, self.position_noise_std).ok();
        let times = self.sample_times();

        times
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let mut position = self.position_at(t);
                if let Some(normal) = normal.filter(|_| self.position_noise_std > 0.0) {
                    position.x += normal.sample(&mut self.physics_rng);
                    position.z += normal.sample(&mut self.physics_rng);
                }
                let timestamp = self
                    .timestamp_at(t)
                    .to_rfc3339_opts(SecondsFormat::Millis, true);
                let mut point = DataPoint::new(i as i64, position, timestamp);
                if let Some(content) = self.content_at(t) {
                    point = point.with_content(content);
                }
                point
            })
            .collect()
    }
}
