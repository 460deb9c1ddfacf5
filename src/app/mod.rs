//! The startup → run → shutdown state machine.
//!
//! ```text
//! ResolvingConfig → RunningStartup → AwaitingTrigger → RunningShutdown → Done
//!        │                 │
//!        └─────────────────┴──────────────→ Done   (startup error or timeout)
//! ```
//!
//! Startup steps run one after another on a single background worker.
//! Shutdown steps all run at once. Work abandoned because of a timeout is
//! left running on the orchestrator's task tracker.

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::Orchestrator;
pub use types::{Phase, StepState};
