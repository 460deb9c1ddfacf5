//! Real signal delivery. Kept in its own test binary because a handler,
//! once installed, stays installed for the life of the process.
#![cfg(unix)]

use graceful::{Options, Orchestrator, Phase, Signal, Step};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_configured_signal_triggers_shutdown() {
    let mut orchestrator =
        Orchestrator::new(Options::new().with_signals([Signal::USER_DEFINED_2]));
    let mut phases = orchestrator.subscribe_phase();

    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            if *phases.borrow_and_update() == Phase::AwaitingTrigger {
                // SAFETY: raise only sends a signal to this process, and the
                // orchestrator has already installed a handler for it.
                unsafe {
                    libc::raise(libc::SIGUSR2);
                }
                break;
            }
        }
    });

    let stopped = Arc::new(AtomicBool::new(false));
    let flag = stopped.clone();
    let cleanup = Step::new("cleanup", move |_ctx| async move {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    let reason = orchestrator.start(Vec::<Step>::new(), vec![cleanup]).await;

    assert_eq!(reason.os_signal, Some(Signal::USER_DEFINED_2));
    assert!(reason.runtime_error.is_none());
    assert!(reason.startup_error.is_none());
    assert!(reason.shutdown_errors.is_empty());
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(reason.to_printable().os_signal, "user defined signal 2");
    assert_eq!(reason.exit_code(), 0);
}
