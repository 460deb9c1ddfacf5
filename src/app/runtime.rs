use super::types::Trigger;
use super::{Orchestrator, Phase};
use crate::signal::{Signal, SignalListener};
use crate::trigger::ShutdownReceiver;
use tracing::info;

impl Orchestrator {
    /// Block until a shutdown request or one of `signals` arrives.
    ///
    /// Signal handlers are installed before the phase is published, so an
    /// observer that sees `AwaitingTrigger` can safely deliver a signal.
    pub(super) async fn await_trigger(
        &self,
        receiver: &mut ShutdownReceiver,
        signals: &[Signal],
    ) -> Trigger {
        let mut listener = SignalListener::register(signals);
        self.set_phase(Phase::AwaitingTrigger);

        info!(
            "Running; waiting for a shutdown request or one of {} signal(s)",
            listener.registered()
        );

        tokio::select! {
            biased;

            request = receiver.recv() => {
                match &request {
                    Some(e) => info!("Shutdown requested with error: {:#}", e),
                    None => info!("Shutdown requested"),
                }
                Trigger::Request(request)
            }
            signal = listener.recv() => {
                info!("Received {} signal", signal);
                Trigger::Signal(signal)
            }
        }
    }
}
