//! DataPath Deterministic Simulation Harness
//!
//! This crate replays scripted walks through the exhibit runtime on a
//! virtual clock, so every run of a scenario is identical.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: virtual clock advanced one frame per tick
//! - **Media servers**: scripted probe with fault injection
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock)                            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                        │                            │
//! │  ┌────▼──────────┐       ┌─────▼────┐                       │
//! │  │ ExhibitRuntime│◄─────►│ SimProbe │                       │
//! │  │  + avatar     │ media │          │                       │
//! │  └───────────────┘       └──────────┘                       │
//! │       ▲                                                     │
//! │  ┌────┴──────────────────────────────┐                      │
//! │  │            Oracle                 │                      │
//! │  │  (Scripted walk, ground truth)    │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use datapath_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Dwell).await;
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod file_replay;
mod network;
mod oracle;
mod runner;
pub mod scenarios;
mod world;

pub use context::{SimContext, SIM_EPOCH_SECS};
pub use exporter::{Position, SimEvent, SimExport, SimFrame};
pub use file_replay::{replay_file, FileReplayReport, ReplayError, SubPathReplay};
pub use network::{ProbeFault, SimProbe};
pub use oracle::{LegKind, Oracle, WalkLeg};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
