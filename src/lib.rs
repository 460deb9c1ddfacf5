//! Process lifecycle orchestration.
//!
//! An [`Orchestrator`] runs startup steps one after another, waits for an OS
//! signal or an explicit request through a [`ShutdownHandle`], then runs
//! every shutdown step concurrently. Everything that went wrong along the
//! way is collected into the returned [`ExitReason`].
//!
//! ```no_run
//! use graceful::{multi, Options, Orchestrator, Step};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let mut orchestrator = Orchestrator::new(
//!     Options::new()
//!         .with_startup_timeout(Duration::from_secs(10))
//!         .with_shutdown_timeout(Duration::from_secs(5)),
//! );
//!
//! let startup = vec![
//!     Step::new("config", |_ctx| async { Ok(()) }),
//!     multi(vec![
//!         Step::new("database", |_ctx| async { Ok(()) }),
//!         Step::new("cache", |_ctx| async { Ok(()) }),
//!     ]),
//! ];
//! let shutdown = vec![Step::new("flush", |_ctx| async { Ok(()) })];
//!
//! let reason = orchestrator.start(startup, shutdown).await;
//! println!("{}", reason.to_indented_text("", "  "));
//! std::process::exit(reason.exit_code());
//! # }
//! ```

pub mod app;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_reason;
pub mod multi;
pub mod signal;
pub mod step;
pub mod trigger;

pub use app::{Orchestrator, Phase, StepState};
pub use crate::config::{LifecycleConfig, Options};
pub use context::StepContext;
pub use error::{GracefulError, Result};
pub use exit_reason::{ExitReason, PrintableExitReason};
pub use multi::multi;
pub use signal::{Signal, SignalListener};
pub use step::{Component, Step};
pub use trigger::ShutdownHandle;
