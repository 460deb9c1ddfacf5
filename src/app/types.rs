use crate::signal::Signal;
use crate::trigger::ShutdownRequest;

/// Orchestrator phases, in the order a run moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ResolvingConfig,
    RunningStartup,
    AwaitingTrigger,
    RunningShutdown,
    Done,
}

/// Step lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// What ended the await phase
#[derive(Debug)]
pub(crate) enum Trigger {
    Signal(Signal),
    Request(ShutdownRequest),
}
