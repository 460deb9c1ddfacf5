//! Concurrent fan-out of independent steps.
//!
//! Useful for speeding up startup or shutdown when several steps do not
//! depend on one another, e.g. opening connections to a database, a cache
//! and a config service at the same time.

use crate::context::StepContext;
use crate::step::Step;
use tokio::task::JoinSet;
use tracing::debug;

/// Compose independent steps into one step that runs them concurrently.
///
/// The composed step waits for every inner step and reports the first
/// error in completion order. If the context finishes first, it returns the
/// context's error right away and detaches the steps still running; they
/// keep running on the runtime but their results are not observed.
///
/// No ordering between the inner steps is guaranteed.
pub fn multi<I>(steps: I) -> Step
where
    I: IntoIterator<Item = Step>,
{
    let steps: Vec<Step> = steps.into_iter().collect();
    let name = format!(
        "multi[{}]",
        steps.iter().map(Step::name).collect::<Vec<_>>().join(", ")
    );

    Step::new(name, move |ctx| run_concurrently(steps, ctx))
}

async fn run_concurrently(steps: Vec<Step>, ctx: StepContext) -> anyhow::Result<()> {
    if steps.is_empty() {
        return Ok(());
    }

    let mut pending = JoinSet::new();
    for step in steps {
        let ctx = ctx.clone();
        pending.spawn(async move {
            let name = step.name().to_string();
            (name, step.run(ctx).await)
        });
    }

    let mut first_error: Option<anyhow::Error> = None;
    loop {
        tokio::select! {
            biased;

            err = ctx.done_err() => {
                debug!("Context finished with {} step(s) outstanding", pending.len());
                pending.detach_all();
                return Err(err.into());
            }
            joined = pending.join_next() => match joined {
                None => break,
                Some(Ok((name, Ok(())))) => debug!("Step '{}' completed", name),
                Some(Ok((name, Err(e)))) => {
                    debug!("Step '{}' failed: {}", name, e);
                    first_error.get_or_insert(e);
                }
                Some(Err(join_error)) => {
                    first_error.get_or_insert(join_error.into());
                }
            },
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GracefulError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn sleeper(name: &str, delay_ms: u64, fail: bool, finished: Arc<AtomicUsize>) -> Step {
        let message = format!("{} failed", name);
        Step::new(name, move |_ctx| async move {
            sleep(Duration::from_millis(delay_ms)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(anyhow::anyhow!(message))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let finished = Arc::new(AtomicUsize::new(0));
        let step = multi(vec![
            sleeper("a", 5, false, finished.clone()),
            sleeper("b", 10, false, finished.clone()),
            sleeper("c", 1, false, finished.clone()),
        ]);

        assert!(step.run(StepContext::background()).await.is_ok());
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_failure_waits_for_all() {
        let finished = Arc::new(AtomicUsize::new(0));
        let step = multi(vec![
            sleeper("slow", 80, false, finished.clone()),
            sleeper("broken", 5, true, finished.clone()),
            sleeper("medium", 40, false, finished.clone()),
        ]);

        let started = Instant::now();
        let err = step.run(StepContext::background()).await.unwrap_err();

        assert_eq!(err.to_string(), "broken failed");
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_error_is_by_completion_order() {
        let finished = Arc::new(AtomicUsize::new(0));
        let step = multi(vec![
            sleeper("late", 60, true, finished.clone()),
            sleeper("early", 5, true, finished.clone()),
        ]);

        let err = step.run(StepContext::background()).await.unwrap_err();
        assert_eq!(err.to_string(), "early failed");
    }

    #[tokio::test]
    async fn test_expired_context_returns_promptly() {
        let stalled = |name: &str| {
            Step::new(name, |_ctx| async {
                std::future::pending::<()>().await;
                Ok(())
            })
        };
        let step = multi(vec![stalled("x"), stalled("y")]);
        let ctx = StepContext::background().with_timeout(Duration::from_millis(30));

        let started = Instant::now();
        let err = step.run(ctx).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<GracefulError>(),
            Some(GracefulError::DeadlineExceeded)
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancelled_context_reports_cancelled() {
        let step = multi(vec![Step::new("stuck", |_ctx| async {
            std::future::pending::<()>().await;
            Ok(())
        })]);
        let ctx = StepContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = step.run(ctx).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GracefulError>(),
            Some(GracefulError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_empty_multi_succeeds() {
        let ctx = StepContext::background();
        ctx.cancel();
        assert!(multi(Vec::new()).run(ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_panic_in_inner_step_is_an_error() {
        let step = multi(vec![Step::new("explodes", |_ctx| async {
            if true {
                panic!("inner");
            }
            Ok(())
        })]);

        let err = step.run(StepContext::background()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GracefulError>(),
            Some(GracefulError::StepPanicked { .. })
        ));
    }

    #[test]
    fn test_composed_name() {
        let step = multi(vec![
            Step::new("db", |_ctx| async { Ok(()) }),
            Step::new("cache", |_ctx| async { Ok(()) }),
        ]);
        assert_eq!(step.name(), "multi[db, cache]");
    }
}
