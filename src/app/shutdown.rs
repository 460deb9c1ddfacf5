use super::state::record_step_state;
use super::{Orchestrator, StepState};
use crate::context::StepContext;
use crate::error::GracefulError;
use crate::step::Step;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

impl Orchestrator {
    /// Run every shutdown step concurrently and collect their errors in the
    /// order they arrive.
    ///
    /// When the timeout elapses, collection stops at once and a timeout
    /// error is appended. Steps still running are left to finish on the
    /// tracker; if one of them fails later its error is logged and dropped,
    /// since the exit reason has already been handed back.
    pub(super) async fn run_shutdown(
        &self,
        steps: Vec<Step>,
        timeout: Option<Duration>,
    ) -> Vec<anyhow::Error> {
        info!("Beginning graceful shutdown of {} step(s)", steps.len());

        let ctx = match timeout {
            Some(timeout) => StepContext::background().with_timeout(timeout),
            None => StepContext::background(),
        };

        let expected = steps.len();
        let (result_tx, mut result_rx) = mpsc::channel(expected.max(1));

        for step in steps {
            let result_tx = result_tx.clone();
            let ctx = ctx.clone();
            let states = Arc::clone(&self.step_states);

            self.tracker.spawn(async move {
                let name = step.name().to_string();
                record_step_state(&states, &name, StepState::Stopping);

                let result = step.run(ctx).await;
                match &result {
                    Ok(()) => {
                        record_step_state(&states, &name, StepState::Stopped);
                        info!("Step '{}' stopped", name);
                    }
                    Err(e) => {
                        record_step_state(&states, &name, StepState::Failed);
                        error!("Error stopping step '{}': {:#}", name, e);
                    }
                }

                if let Err(mpsc::error::SendError(Err(e))) = result_tx.send(result).await {
                    warn!(
                        "Step '{}' failed after shutdown stopped waiting, discarding: {:#}",
                        name, e
                    );
                }
            });
        }
        drop(result_tx);

        let mut errors = Vec::new();
        let mut reported = 0;
        while reported < expected {
            tokio::select! {
                biased;

                received = result_rx.recv() => match received {
                    Some(Ok(())) => reported += 1,
                    Some(Err(e)) => {
                        reported += 1;
                        errors.push(e);
                    }
                    None => break,
                },
                _ = ctx.done() => {
                    let timeout = timeout.unwrap_or_default();
                    warn!(
                        "Shutdown timed out after {:?} with {} step(s) outstanding",
                        timeout,
                        expected - reported
                    );
                    errors.push(GracefulError::ShutdownTimeout(timeout).into());
                    break;
                }
            }
        }

        ctx.cancel();
        debug!("Shutdown collected {} error(s)", errors.len());
        errors
    }
}
