//! Bounded iterative execution.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use hive_core::config::EngineConfig;
use hive_core::error::Result;
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::step::Step;

/// Hard ceiling on iterations when no [`EngineConfig`] override is given.
pub const DEFAULT_SAFETY_CAP: usize = 1000;

/// Predicate over the current accumulated output.
pub type OutputPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// When a loop stops. All forms are checked *before* running the next
/// iteration, so an initially-satisfied condition means the body never runs.
#[derive(Clone)]
pub enum StopCondition {
    /// Run the body exactly this many times.
    MaxIterations(usize),
    /// Stop as soon as the predicate over the current output turns true.
    Until(OutputPredicate),
    /// Continue while the predicate over the current output holds.
    WhileTrue(OutputPredicate),
}

impl StopCondition {
    pub fn until(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Until(Arc::new(predicate))
    }

    pub fn while_true(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::WhileTrue(Arc::new(predicate))
    }

    fn is_satisfied(&self, iterations: usize, current: &str) -> bool {
        match self {
            Self::MaxIterations(count) => iterations >= *count,
            Self::Until(predicate) => predicate(current),
            Self::WhileTrue(predicate) => !predicate(current),
        }
    }
}

impl fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxIterations(count) => f.debug_tuple("MaxIterations").field(count).finish(),
            Self::Until(_) => write!(f, "Until(..)"),
            Self::WhileTrue(_) => write!(f, "WhileTrue(..)"),
        }
    }
}

/// Repeatedly executes a body step, feeding each iteration's output into
/// the next iteration's input.
///
/// A safety cap guarantees termination at every nesting level; reaching it
/// is reported through a warning and `loop.cap_reached`, with the real
/// iteration count recorded.
pub struct Loop {
    body: Arc<dyn Step>,
    stop: StopCondition,
    safety_cap: usize,
}

impl Loop {
    pub fn new(body: impl Step, stop: StopCondition) -> Self {
        Self {
            body: Arc::new(body),
            stop,
            safety_cap: DEFAULT_SAFETY_CAP,
        }
    }

    /// Take the safety cap from engine configuration.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.safety_cap = config.loop_safety_cap;
        self
    }

    pub fn with_safety_cap(mut self, cap: usize) -> Self {
        self.safety_cap = cap;
        self
    }
}

impl Step for Loop {
    fn name(&self) -> &str {
        "loop"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let started = Instant::now();
            let mut aggregate = StepResult::empty();
            let mut current = input.to_string();
            let mut iterations = 0usize;
            let mut cap_reached = false;

            loop {
                ctx.ensure_live()?;
                if self.stop.is_satisfied(iterations, &current) {
                    break;
                }
                if iterations >= self.safety_cap {
                    warn!(
                        iterations,
                        cap = self.safety_cap,
                        step = %self.body.name(),
                        "Loop reached safety cap"
                    );
                    cap_reached = true;
                    break;
                }

                debug!(iteration = iterations, step = %self.body.name(), "Running loop body");
                let result = self.body.execute(&current, ctx).await?;
                current = result.output.clone();
                aggregate.absorb(&result);
                iterations += 1;
            }

            aggregate.output = current;
            aggregate.duration = started.elapsed();
            aggregate.set_meta("loop.iteration_count", iterations as u64);
            aggregate.set_meta("loop.duration_ms", started.elapsed().as_millis() as u64);
            if cap_reached {
                aggregate.set_meta("loop.cap_reached", true);
            }
            Ok(aggregate)
        })
    }
}
