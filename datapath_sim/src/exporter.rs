//! JSON exporter for replay inspection.
//!
//! Exports simulation frames as JSON: ground truth walker, avatar and the
//! runtime events seen since the previous frame.

use datapath_core::{FollowState, PathEvent};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Ground truth walker position
    pub walker: Position,

    /// Avatar position
    pub avatar: Position,

    /// Follower state name
    pub state: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<usize>,

    /// Horizontal avatar error in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_m: Option<f64>,

    /// Events (selections, projections, state changes)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Position {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl From<&PathEvent> for SimEvent {
    fn from(event: &PathEvent) -> Self {
        let message = match event {
            PathEvent::GeometryChanged { path } => format!("geometry of {} changed", path),
            PathEvent::SubPathSelected { sub_path, start_secs, .. } => {
                format!("selected sub-path {} at {:.2}s", sub_path, start_secs)
            }
            PathEvent::VideoPrepared { sub_path } => format!("video of sub-path {} prepared", sub_path),
            PathEvent::GameStateChanged { from, to } => format!("game state {:?} -> {:?}", from, to),
        };
        Self { message, level: None }
    }
}

pub fn state_name(state: FollowState) -> &'static str {
    match state {
        FollowState::Idle => "idle",
        FollowState::Following => "following",
        FollowState::Waiting { .. } => "waiting",
        FollowState::Finished => "finished",
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Final RMS error if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_rms_error: Option<f64>,
}

impl SimExport {
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            final_rms_error: None,
        }
    }

    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    pub fn finalize(&mut self, passed: bool, rms_error: Option<f64>) {
        self.passed = passed;
        self.final_rms_error = rms_error;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapath_core::SubPathId;

    #[test]
    fn test_export_tracks_duration() {
        let mut export = SimExport::new("dwell", 42);
        for i in 0..3 {
            export.add_frame(SimFrame {
                time_sec: i as f64 * 0.5,
                walker: Vector3::zeros().into(),
                avatar: Vector3::new(1.0, 0.0, 0.0).into(),
                state: state_name(FollowState::Following).to_string(),
                sub_path: Some(0),
                error_m: Some(1.0),
                events: vec![],
            });
        }
        export.finalize(true, Some(0.1));

        assert_eq!(export.duration_sec, 1.0);
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["frames"].as_array().unwrap().len(), 3);
        assert!(json["frames"][0].get("events").is_none());
        assert_eq!(json["frames"][0]["state"], "following");
    }

    #[test]
    fn test_event_messages() {
        let event = SimEvent::from(&PathEvent::VideoPrepared { sub_path: SubPathId(3) });
        assert_eq!(event.message, "video of sub-path #3 prepared");
    }
}
