use futures::future::BoxFuture;

use crate::error::Result;
use crate::hooks::LifecycleHooks;
use crate::types::{SessionId, StepResult};

/// Agent delegate — the external runnable a leaf step drives.
///
/// The engine never looks inside a run: inference, tool execution, and
/// memory are the delegate's business. It only requires that a run can be
/// awaited and cancelled.
pub trait AgentRuntime: Send + Sync + 'static {
    /// Delegate name, used in logs and step metadata.
    fn name(&self) -> &str;

    /// Run the delegate against an input, optionally under a session and
    /// with lifecycle hooks.
    fn run<'a>(
        &'a self,
        input: &'a str,
        session: Option<&'a SessionId>,
        hooks: Option<&'a dyn LifecycleHooks>,
    ) -> BoxFuture<'a, Result<StepResult>>;

    /// Request cancellation of any in-flight run.
    fn cancel(&self) {}
}
