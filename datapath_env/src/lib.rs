//! DataPath Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the DataPath
//! walkthrough core run both **Production** (tokio) and **Simulation**
//! (virtual clock) environments.
//!
//! # Core Concept
//!
//! Everything the core would otherwise reach for through a global is passed in:
//! - Time (`now()`, `sleep()`)
//! - Background work (`spawn()`)
//! - Media reachability checks (`MediaProbe::probe()`)
//!
//! A simulation swaps in a virtual clock and a scripted probe, so a full walk
//! along a path can be replayed without waiting in real time.
//!
//! # Example
//!
//! ```ignore
//! use datapath_env::ExhibitContext;
//!
//! async fn frame_loop<Ctx: ExhibitContext>(ctx: &Ctx, runtime: &mut Runtime) {
//!     let frame = Duration::from_millis(16);
//!     loop {
//!         ctx.sleep(frame).await;
//!         runtime.tick(frame.as_secs_f64());
//!     }
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::ExhibitContext;
pub use network::{MediaProbe, is_remote};
pub use types::PathId;
pub use error::EnvError;
pub use tokio_impl::{HttpProbe, TokioContext, DEFAULT_PROBE_TIMEOUT};
