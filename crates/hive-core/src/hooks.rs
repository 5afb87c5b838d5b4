use futures::future::BoxFuture;

use crate::error::HiveError;
use crate::types::StepResult;

/// Lifecycle notifications emitted at step boundaries.
///
/// Implementors observe, they never steer execution: every method defaults
/// to a no-op and return values are not consulted. Trace and metrics
/// backends live behind this seam, outside the engine.
pub trait LifecycleHooks: Send + Sync + 'static {
    /// A step is about to run with the given input.
    fn on_step_start<'a>(&'a self, step: &'a str, input: &'a str) -> BoxFuture<'a, ()> {
        let _ = (step, input);
        Box::pin(async {})
    }

    /// A step completed successfully.
    fn on_step_end<'a>(&'a self, step: &'a str, result: &'a StepResult) -> BoxFuture<'a, ()> {
        let _ = (step, result);
        Box::pin(async {})
    }

    /// A step failed.
    fn on_step_error<'a>(&'a self, step: &'a str, error: &'a HiveError) -> BoxFuture<'a, ()> {
        let _ = (step, error);
        Box::pin(async {})
    }
}

/// Hooks implementation that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}
