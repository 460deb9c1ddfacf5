use super::state::{record_step_state, StepStates};
use super::{Orchestrator, StepState};
use crate::context::StepContext;
use crate::error::GracefulError;
use crate::step::Step;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

impl Orchestrator {
    /// Run startup steps in declaration order on one background worker.
    ///
    /// The first failing step ends the sequence. If the timeout elapses
    /// first, the worker is abandoned: the context is cancelled so the
    /// running step can notice, and no further step is started.
    pub(super) async fn run_startup(
        &self,
        steps: Vec<Step>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<()> {
        info!("Starting {} startup step(s)", steps.len());

        let ctx = match timeout {
            Some(timeout) => StepContext::background().with_timeout(timeout),
            None => StepContext::background(),
        };

        let (result_tx, result_rx) = oneshot::channel();
        let worker_ctx = ctx.clone();
        let states = Arc::clone(&self.step_states);
        self.tracker.spawn(async move {
            let result = run_in_order(steps, worker_ctx, states).await;
            let _ = result_tx.send(result);
        });

        let result = tokio::select! {
            biased;

            received = result_rx => received.unwrap_or_else(|_| {
                Err(GracefulError::system("startup worker exited without reporting").into())
            }),
            _ = ctx.done() => {
                let timeout = timeout.unwrap_or_default();
                warn!("Startup timed out after {:?}", timeout);
                Err(GracefulError::StartupTimeout(timeout).into())
            }
        };

        // The startup context ends with the startup phase, successful or not
        ctx.cancel();

        match &result {
            Ok(()) => info!("All startup steps completed"),
            Err(e) => error!("Startup failed: {:#}", e),
        }
        result
    }
}

async fn run_in_order(
    steps: Vec<Step>,
    ctx: StepContext,
    states: StepStates,
) -> anyhow::Result<()> {
    for step in steps {
        if let Some(err) = ctx.error() {
            debug!("Skipping step '{}': {}", step.name(), err);
            return Err(err.into());
        }

        let name = step.name().to_string();
        record_step_state(&states, &name, StepState::Starting);

        match step.run(ctx.clone()).await {
            Ok(()) => {
                record_step_state(&states, &name, StepState::Running);
                info!("Step '{}' started", name);
            }
            Err(e) => {
                record_step_state(&states, &name, StepState::Failed);
                error!("Failed to start step '{}': {:#}", name, e);
                return Err(e);
            }
        }
    }

    Ok(())
}
