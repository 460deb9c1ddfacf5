use super::state::StepStates;
use super::types::{Phase, Trigger};
use crate::config::Options;
use crate::error::GracefulError;
use crate::exit_reason::ExitReason;
use crate::step::Step;
use crate::trigger::{self, ShutdownHandle, ShutdownReceiver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Runs one startup → run → shutdown cycle and reports why it ended
pub struct Orchestrator {
    pub(super) options: Options,

    // Lifecycle management
    pub(super) step_states: StepStates,
    pub(super) phase: watch::Sender<Phase>,
    pub(super) shutdown_handle: ShutdownHandle,
    pub(super) shutdown_receiver: Option<ShutdownReceiver>,
    pub(super) tracker: TaskTracker,
}

impl Orchestrator {
    /// Create an orchestrator. Options are validated when `start` runs, so
    /// invalid options surface as the exit reason's startup error.
    pub fn new(options: Options) -> Self {
        let (shutdown_handle, shutdown_receiver) = trigger::channel();
        let (phase, _) = watch::channel(Phase::Idle);

        Self {
            options,
            step_states: Arc::new(Mutex::new(HashMap::new())),
            phase,
            shutdown_handle,
            shutdown_receiver: Some(shutdown_receiver),
            tracker: TaskTracker::new(),
        }
    }

    /// Handle for requesting shutdown from anywhere in the program.
    ///
    /// Requests made before the orchestrator starts waiting are kept and
    /// honoured as soon as startup completes.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Run startup steps in order, wait for a signal or shutdown request,
    /// then run every shutdown step concurrently.
    ///
    /// Never fails: every error is captured in the returned `ExitReason`.
    /// An orchestrator runs once; calling `start` again returns a reason
    /// carrying `GracefulError::AlreadyStarted` without running anything.
    pub async fn start<S, T>(&mut self, startup: S, shutdown: T) -> ExitReason
    where
        S: IntoIterator<Item = Step>,
        T: IntoIterator<Item = Step>,
    {
        let mut reason = ExitReason::default();

        let mut receiver = match self.shutdown_receiver.take() {
            Some(receiver) => receiver,
            None => {
                error!("Orchestrator started more than once");
                reason.startup_error = Some(GracefulError::AlreadyStarted.into());
                return reason;
            }
        };

        self.set_phase(Phase::ResolvingConfig);
        let config = match self.options.resolve() {
            Ok(config) => config,
            Err(e) => {
                error!("Invalid lifecycle options: {}", e);
                reason.startup_error = Some(e.into());
                self.finish(&reason);
                return reason;
            }
        };

        self.set_phase(Phase::RunningStartup);
        if let Err(e) = self
            .run_startup(startup.into_iter().collect(), config.startup_timeout())
            .await
        {
            reason.startup_error = Some(e);
            self.finish(&reason);
            return reason;
        }

        match self.await_trigger(&mut receiver, config.signals()).await {
            Trigger::Signal(signal) => reason.os_signal = Some(signal),
            Trigger::Request(err) => reason.runtime_error = err,
        }
        drop(receiver);

        self.set_phase(Phase::RunningShutdown);
        reason.shutdown_errors = self
            .run_shutdown(shutdown.into_iter().collect(), config.shutdown_timeout())
            .await;

        self.finish(&reason);
        reason
    }

    fn finish(&self, reason: &ExitReason) {
        self.tracker.close();
        self.set_phase(Phase::Done);

        if reason.is_clean() {
            info!("Lifecycle complete: {}", reason);
        } else {
            warn!("Lifecycle complete with errors: {}", reason);
        }

        let abandoned = self.tracker.len();
        if abandoned > 0 {
            warn!("{} abandoned task(s) still running", abandoned);
        }
    }

    /// Background tasks still running, typically steps abandoned by a timeout
    pub fn abandoned_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Wait up to `limit` for abandoned tasks to finish. Returns `true` if
    /// they all did. Only meaningful once `start` has returned.
    pub async fn wait_for_abandoned(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.tracker.wait()).await.is_ok()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
