//! The step abstraction and its leaf implementations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::debug;

use hive_core::error::{HiveError, Result};
use hive_core::traits::AgentRuntime;
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::modifier::{ModifiedStep, Modifier};

/// A unit of orchestrated work.
///
/// Everything the engine runs, leaves and composites alike, implements
/// this one capability. `execute` may suspend on I/O and must honor
/// cancellation signaled through the context. Calls are independent and
/// reentrant: a step holds no per-execution state.
pub trait Step: Send + Sync + 'static {
    /// Descriptive name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Execute against an input under the given context.
    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>>;
}

impl<S: Step + ?Sized> Step for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        (**self).execute(input, ctx)
    }
}

/// Fluent modifier application, available on every step.
pub trait StepExt: Step + Sized {
    /// Erase the concrete type.
    fn boxed(self) -> Arc<dyn Step> {
        Arc::new(self)
    }

    /// Re-invoke on failure, up to `max_attempts` total attempts with a
    /// fixed delay between them.
    fn with_retry(self, max_attempts: usize, delay: Duration) -> ModifiedStep {
        ModifiedStep::new(Arc::new(self), Modifier::Retry { max_attempts, delay })
    }

    /// Race execution against a deadline.
    fn with_timeout(self, deadline: Duration) -> ModifiedStep {
        ModifiedStep::new(Arc::new(self), Modifier::Timeout(deadline))
    }

    /// Attach a descriptive name to results.
    fn named(self, name: impl Into<String>) -> ModifiedStep {
        ModifiedStep::new(Arc::new(self), Modifier::Named(name.into()))
    }

    /// Attach the label, input, and output to results.
    fn logged(self, label: impl Into<String>) -> ModifiedStep {
        ModifiedStep::new(Arc::new(self), Modifier::Logged(label.into()))
    }
}

impl<S: Step + Sized> StepExt for S {}

/// Leaf step delegating to an external agent runtime.
///
/// The run is raced against context cancellation; on cancellation the
/// delegate is told to stop and the step fails with [`HiveError::Cancelled`].
pub struct AgentStep {
    runtime: Arc<dyn AgentRuntime>,
    name: String,
}

impl AgentStep {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        let name = runtime.name().to_string();
        Self { runtime, name }
    }

    /// Override the delegate's own name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Step for AgentStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            ctx.ensure_live()?;
            if let Some(hooks) = ctx.hooks() {
                hooks.on_step_start(&self.name, input).await;
            }

            let started = Instant::now();
            debug!(step = %self.name, "Running agent step");
            let outcome = tokio::select! {
                _ = ctx.cancelled() => {
                    self.runtime.cancel();
                    Err(HiveError::Cancelled)
                }
                outcome = self.runtime.run(input, ctx.session(), ctx.hooks()) => outcome,
            };

            match outcome {
                Ok(mut result) => {
                    if result.duration.is_zero() {
                        result.duration = started.elapsed();
                    }
                    if let Some(hooks) = ctx.hooks() {
                        hooks.on_step_end(&self.name, &result).await;
                    }
                    Ok(result)
                }
                Err(e) => {
                    if let Some(hooks) = ctx.hooks() {
                        hooks.on_step_error(&self.name, &e).await;
                    }
                    Err(e)
                }
            }
        })
    }
}

/// Pass-through step: no delegated work, the input flows out unchanged.
///
/// Lets callers splice a "do nothing here" placeholder into a tree without
/// special-casing composite logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiveStep;

impl HiveStep {
    pub fn new() -> Self {
        Self
    }
}

impl Step for HiveStep {
    fn name(&self) -> &str {
        "hive_step"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            ctx.ensure_live()?;
            let mut result = StepResult::text(input);
            result.set_meta("hive_step.direct", true);
            Ok(result)
        })
    }
}
