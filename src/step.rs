use crate::context::StepContext;
use crate::error::GracefulError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub type StepFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A named unit of work run by the orchestrator during startup or shutdown
pub struct Step {
    name: String,
    run: Box<dyn FnOnce(StepContext) -> StepFuture + Send>,
}

impl Step {
    /// Wrap an async closure as a step
    pub fn new<N, F, Fut>(name: N, f: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(StepContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(move |ctx| f(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the step to completion. A panic inside the step is caught and
    /// reported as `GracefulError::StepPanicked`.
    pub async fn run(self, ctx: StepContext) -> anyhow::Result<()> {
        let Step { name, run } = self;

        match AssertUnwindSafe(async move { run(ctx).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(GracefulError::StepPanicked {
                step: name,
                message: panic_message(&*payload),
            }
            .into()),
        }
    }

    /// Startup step that calls `Component::start`
    pub fn starting(component: Arc<dyn Component>) -> Self {
        let name = component.name().to_string();
        Self::new(name, move |ctx| async move { component.start(ctx).await })
    }

    /// Shutdown step that calls `Component::stop`
    pub fn stopping(component: Arc<dyn Component>) -> Self {
        let name = component.name().to_string();
        Self::new(name, move |ctx| async move { component.stop(ctx).await })
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A long-lived part of the host program with its own start and stop logic
#[async_trait]
pub trait Component: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn start(&self, ctx: StepContext) -> anyhow::Result<()>;

    async fn stop(&self, ctx: StepContext) -> anyhow::Result<()>;
}
