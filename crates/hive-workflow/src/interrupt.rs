//! Deliberate suspension and one-time resumption.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;
use uuid::Uuid;

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::step::Step;

/// Transform applied to the input to produce the interrupt reason.
pub type ReasonTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A step that never completes normally: executing it always fails with
/// [`HiveError::WorkflowInterrupted`], halting the surrounding chain at
/// this point.
///
/// Earlier steps' side effects are not undone; there is no compensation.
/// The orchestration's caller catches the signal and, when continuation is
/// wanted, builds a [`ResumeToken`] for the suspension point out-of-band.
/// Fallback and retry layers treat the signal as an ordinary failure.
#[derive(Clone, Default)]
pub struct Interrupt {
    transform: Option<ReasonTransform>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the interrupt reason from the input instead of using it raw.
    pub fn with_reason(transform: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            transform: Some(Arc::new(transform)),
        }
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("transform", &self.transform.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Step for Interrupt {
    fn name(&self) -> &str {
        "interrupt"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            ctx.ensure_live()?;
            let reason = match &self.transform {
                Some(transform) => transform(input),
                None => input.to_string(),
            };
            info!(reason = %reason, "Workflow interrupted");
            Err(HiveError::WorkflowInterrupted { reason })
        })
    }
}

/// One-time capability to continue a suspended execution.
///
/// Carries the suspension point's identity, the captured input, the
/// not-yet-executed step, and the captured context. Both consuming
/// operations take the token by value and the type is not `Clone`: a spent
/// token cannot be observed again, let alone reused.
pub struct ResumeToken {
    orchestration_id: Uuid,
    label: String,
    input: String,
    step: Arc<dyn Step>,
    context: ExecutionContext,
}

impl ResumeToken {
    pub fn new(
        orchestration_id: Uuid,
        label: impl Into<String>,
        input: impl Into<String>,
        step: Arc<dyn Step>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            orchestration_id,
            label: label.into(),
            input: input.into(),
            step,
            context,
        }
    }

    pub fn orchestration_id(&self) -> Uuid {
        self.orchestration_id
    }

    /// Label of the suspension point this token resumes.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The input captured when execution suspended.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Execute the captured step with externally supplied input, consuming
    /// the token.
    pub async fn resume(self, new_input: impl Into<String>) -> Result<StepResult> {
        let input = new_input.into();
        info!(
            orchestration = %self.orchestration_id,
            label = %self.label,
            "Resuming suspended step"
        );
        self.step.execute(&input, &self.context).await
    }

    /// Discard the suspension without executing the captured step,
    /// consuming the token.
    pub fn cancel(self) {
        info!(
            orchestration = %self.orchestration_id,
            label = %self.label,
            "Suspension discarded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::context::ContextStore;
    use crate::step::StepExt;
    use crate::testing::{test_context, AppendStep};

    #[tokio::test]
    async fn test_interrupt_always_fails_with_the_input() {
        let interrupt = Interrupt::new();
        let ctx = test_context();

        let err = interrupt.execute("needs human review", &ctx).await.unwrap_err();
        match err {
            HiveError::WorkflowInterrupted { reason } => {
                assert_eq!(reason, "needs human review");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reason_transform_changes_only_the_reason() {
        let interrupt = Interrupt::with_reason(|input| format!("approval required for: {input}"));
        let ctx = test_context();

        let err = interrupt.execute("wire transfer", &ctx).await.unwrap_err();
        match err {
            HiveError::WorkflowInterrupted { reason } => {
                assert_eq!(reason, "approval required for: wire transfer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_interrupt_halts_a_chain() {
        let chain = crate::chain(vec![
            AppendStep::new("-first").boxed(),
            Interrupt::new().boxed(),
            AppendStep::new("-never").boxed(),
        ]);
        let ctx = test_context();

        let err = chain.execute("x", &ctx).await.unwrap_err();
        assert!(err.is_interrupted());
    }

    #[tokio::test]
    async fn test_resume_runs_the_captured_step_with_new_input() {
        let ctx = test_context();
        let token = ResumeToken::new(
            Uuid::new_v4(),
            "post-approval",
            "original input",
            AppendStep::new("-resumed").boxed(),
            ctx,
        );

        assert_eq!(token.label(), "post-approval");
        assert_eq!(token.input(), "original input");

        let result = token.resume("approved input").await.unwrap();
        assert_eq!(result.output, "approved input-resumed");
    }

    #[tokio::test]
    async fn test_cancel_discards_without_executing() {
        let store = Arc::new(ContextStore::new());
        let ctx = ExecutionContext::new(store.clone());
        let token = ResumeToken::new(
            Uuid::new_v4(),
            "abandoned",
            "input",
            AppendStep::new("-x").boxed(),
            ctx,
        );

        token.cancel();
        // Nothing executed: the shared store was never touched.
        assert!(store.snapshot().await.is_empty());
    }
}
