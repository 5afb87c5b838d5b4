//! Cross-cutting step decorations.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::step::Step;

/// The behavior a [`ModifiedStep`] layers over its inner step.
#[derive(Debug, Clone)]
pub enum Modifier {
    /// Re-invoke the inner step up to `max_attempts` times with a fixed
    /// inter-attempt delay.
    Retry { max_attempts: usize, delay: Duration },
    /// Race the inner step against a deadline; expiry cancels it.
    Timeout(Duration),
    /// Attach `step.name` to the result metadata.
    Named(String),
    /// Attach `logging.label`, `logging.input`, `logging.output` to the
    /// result metadata.
    Logged(String),
}

/// Any step wrapped with one cross-cutting behavior.
///
/// Remains a first-class step, so modifiers nest by wrapping again and a
/// modified step slots into any composite.
pub struct ModifiedStep {
    inner: Arc<dyn Step>,
    modifier: Modifier,
    name: String,
}

impl ModifiedStep {
    pub fn new(inner: Arc<dyn Step>, modifier: Modifier) -> Self {
        let name = match &modifier {
            Modifier::Named(name) => name.clone(),
            _ => inner.name().to_string(),
        };
        Self {
            inner,
            modifier,
            name,
        }
    }

    async fn retry(
        &self,
        max_attempts: usize,
        delay: Duration,
        input: &str,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            ctx.ensure_live()?;
            match self.inner.execute(input, ctx).await {
                Ok(mut result) => {
                    result.set_meta("retry.attempts", attempt as u64);
                    result.set_meta("retry.succeeded", true);
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        step = %self.inner.name(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "Step attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            HiveError::InvalidConfiguration("retry requires at least one attempt".into())
        }))
    }

    async fn timed(
        &self,
        deadline: Duration,
        input: &str,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let scope = ctx.child();
        match tokio::time::timeout(deadline, self.inner.execute(input, &scope)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                scope.cancel();
                warn!(
                    step = %self.inner.name(),
                    timeout_ms = deadline.as_millis() as u64,
                    "Step timed out"
                );
                Err(HiveError::Timeout {
                    step: self.inner.name().to_string(),
                    timeout_ms: deadline.as_millis() as u64,
                })
            }
        }
    }
}

impl Step for ModifiedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            match &self.modifier {
                Modifier::Retry {
                    max_attempts,
                    delay,
                } => self.retry(*max_attempts, *delay, input, ctx).await,
                Modifier::Timeout(deadline) => self.timed(*deadline, input, ctx).await,
                Modifier::Named(name) => {
                    let mut result = self.inner.execute(input, ctx).await?;
                    result.set_meta("step.name", name.as_str());
                    Ok(result)
                }
                Modifier::Logged(label) => {
                    debug!(label = %label, input, "Step input");
                    let mut result = self.inner.execute(input, ctx).await?;
                    debug!(label = %label, output = %result.output, "Step output");
                    let output = result.output.clone();
                    result.set_meta("logging.label", label.as_str());
                    result.set_meta("logging.input", input);
                    result.set_meta("logging.output", output);
                    Ok(result)
                }
            }
        })
    }
}
