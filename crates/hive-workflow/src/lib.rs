//! Workflow orchestration engine — composable asynchronous steps.
//!
//! A workflow is a tree of [`Step`]s. Leaves delegate to external agent
//! runtimes; composites sequence ([`Group`]), fan out ([`Parallel`]), route
//! ([`Router`]), guard ([`Fallback`]), iterate ([`Loop`]), and suspend
//! ([`Interrupt`]). Every node exposes the same capability,
//! `execute(input, ctx)`, so composites simply run their children and
//! combine results.
//!
//! Data flows top-down as input text and shared context; results flow
//! bottom-up as output text plus a metadata map namespaced by the producing
//! composite. Cancellation flows top-down through the context's token:
//! cancelling a composite transitively cancels its descendants.

pub mod builder;
pub mod condition;
pub mod context;
pub mod fallback;
pub mod group;
pub mod interrupt;
pub mod loop_step;
pub mod modifier;
pub mod parallel;
pub mod router;
pub mod step;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{chain, fall_back, in_parallel, then};
pub use condition::RouteCondition;
pub use context::{ContextStore, ExecutionContext, OrchestrationRef};
pub use fallback::Fallback;
pub use group::{Group, Orchestration};
pub use interrupt::{Interrupt, ResumeToken};
pub use loop_step::{Loop, StopCondition};
pub use modifier::{ModifiedStep, Modifier};
pub use parallel::{ErrorPolicy, MergeStrategy, Parallel, ParallelBuilder};
pub use router::{Router, RouterBuilder};
pub use step::{AgentStep, HiveStep, Step, StepExt};
