//! Concurrent fan-out with declaration-order aggregation.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::step::Step;

/// How to combine successful child results into one output.
///
/// Every strategy assembles in declaration order, never completion order:
/// results are buffered by declared index as they arrive.
#[derive(Clone)]
pub enum MergeStrategy {
    /// Output of the declaration-order-first successful child.
    FirstSuccess,
    /// Output of the declaration-order-last successful child.
    LastSuccess,
    /// JSON array of all successful outputs.
    All,
    /// Successful outputs joined by a separator.
    Concatenate(String),
    /// Caller-supplied reducer over the successful results.
    Custom(Arc<dyn Fn(&[StepResult]) -> String + Send + Sync>),
}

impl MergeStrategy {
    /// Merge the successful results (declaration order). `None` when the
    /// subset is empty: no strategy can produce an output from nothing.
    fn apply(&self, results: &[StepResult]) -> Option<String> {
        if results.is_empty() {
            return None;
        }
        let output = match self {
            Self::FirstSuccess => results.first()?.output.clone(),
            Self::LastSuccess => results.last()?.output.clone(),
            Self::All => serde_json::Value::Array(
                results
                    .iter()
                    .map(|r| serde_json::Value::String(r.output.clone()))
                    .collect(),
            )
            .to_string(),
            Self::Concatenate(separator) => results
                .iter()
                .map(|r| r.output.as_str())
                .collect::<Vec<_>>()
                .join(separator),
            Self::Custom(reduce) => reduce(results),
        };
        Some(output)
    }
}

impl fmt::Debug for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstSuccess => write!(f, "FirstSuccess"),
            Self::LastSuccess => write!(f, "LastSuccess"),
            Self::All => write!(f, "All"),
            Self::Concatenate(sep) => f.debug_tuple("Concatenate").field(sep).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// What to do when children fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// First failure cancels the remaining children and propagates.
    FailFast,
    /// Succeed if at least one child succeeded; propagate the first
    /// (declaration-order) failure when all failed.
    ContinueOnPartialFailure,
    /// Merge whatever succeeded; failures become metadata, not errors.
    CollectErrors,
}

struct ParallelChild {
    name: Option<String>,
    step: Arc<dyn Step>,
}

/// Runs every child concurrently against the same input under one scope.
///
/// Structured concurrency: execution does not return until every child has
/// completed, failed, or been cancelled. Cancelling the parallel step
/// cancels every still-running child through the scope token.
pub struct Parallel {
    children: Vec<ParallelChild>,
    merge: MergeStrategy,
    policy: ErrorPolicy,
}

impl Parallel {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            children: steps
                .into_iter()
                .map(|step| ParallelChild { name: None, step })
                .collect(),
            merge: MergeStrategy::Concatenate("\n\n".to_string()),
            policy: ErrorPolicy::FailFast,
        }
    }

    pub fn builder() -> ParallelBuilder {
        ParallelBuilder::default()
    }

    pub fn with_merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Step for Parallel {
    fn name(&self) -> &str {
        "parallel"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            if self.children.is_empty() {
                return Err(HiveError::InvalidConfiguration(
                    "parallel has no steps".into(),
                ));
            }
            ctx.ensure_live()?;

            let started = Instant::now();
            let scope = ctx.child();
            let mut inflight = FuturesUnordered::new();
            for (index, child) in self.children.iter().enumerate() {
                let child_ctx = scope.clone();
                inflight.push(async move {
                    let outcome = child.step.execute(input, &child_ctx).await;
                    (index, outcome)
                });
            }
            debug!(count = self.children.len(), "Fanned out parallel steps");

            // Buffer by declared index: merge strategies assemble in
            // declaration order regardless of completion order.
            let mut slots: Vec<Option<Result<StepResult>>> =
                (0..self.children.len()).map(|_| None).collect();
            while let Some((index, outcome)) = inflight.next().await {
                match outcome {
                    Err(e) if self.policy == ErrorPolicy::FailFast => {
                        warn!(
                            step = %self.children[index].step.name(),
                            error = %e,
                            "Parallel step failed, cancelling siblings"
                        );
                        scope.cancel();
                        // Scope stays structured: wait for the siblings to
                        // observe cancellation before propagating.
                        while inflight.next().await.is_some() {}
                        return Err(e);
                    }
                    outcome => slots[index] = Some(outcome),
                }
            }

            let mut successes: Vec<(usize, StepResult)> = Vec::new();
            let mut failures: Vec<(usize, HiveError)> = Vec::new();
            for (index, slot) in slots.into_iter().enumerate() {
                match slot {
                    Some(Ok(result)) => successes.push((index, result)),
                    Some(Err(e)) => failures.push((index, e)),
                    None => {}
                }
            }

            let results: Vec<StepResult> =
                successes.iter().map(|(_, r)| r.clone()).collect();
            let Some(output) = self.merge.apply(&results) else {
                // Nothing succeeded: every policy propagates the first
                // declaration-order failure.
                let first = failures.into_iter().next().map(|(_, e)| e).unwrap_or_else(|| {
                    HiveError::InvalidConfiguration("parallel produced no results".into())
                });
                return Err(first);
            };

            let mut aggregate = StepResult::empty();
            for result in &results {
                aggregate.absorb(result);
            }
            for (index, result) in &successes {
                if let Some(name) = &self.children[*index].name {
                    aggregate.adopt_metadata(&format!("parallel.{name}"), result);
                }
            }
            aggregate.output = output;
            aggregate.duration = started.elapsed();
            aggregate.set_meta("parallel.agent_count", self.children.len() as u64);
            aggregate.set_meta("parallel.success_count", successes.len() as u64);
            aggregate.set_meta("parallel.error_count", failures.len() as u64);
            if self.policy == ErrorPolicy::CollectErrors && !failures.is_empty() {
                aggregate.set_meta(
                    "parallel.collected_errors",
                    serde_json::Value::Array(
                        failures
                            .iter()
                            .map(|(_, e)| serde_json::Value::String(e.to_string()))
                            .collect(),
                    ),
                );
            }

            debug!(
                successes = successes.len(),
                failures = failures.len(),
                "Parallel fan-in complete"
            );
            Ok(aggregate)
        })
    }
}

/// Builder for [`Parallel`] with named children and explicit policies.
#[derive(Default)]
pub struct ParallelBuilder {
    children: Vec<ParallelChild>,
    merge: Option<MergeStrategy>,
    policy: Option<ErrorPolicy>,
}

impl ParallelBuilder {
    pub fn step(mut self, step: impl Step) -> Self {
        self.children.push(ParallelChild {
            name: None,
            step: Arc::new(step),
        });
        self
    }

    /// Add a child whose metadata is re-emitted under `parallel.<name>.*`.
    pub fn named_step(mut self, name: impl Into<String>, step: impl Step) -> Self {
        self.children.push(ParallelChild {
            name: Some(name.into()),
            step: Arc::new(step),
        });
        self
    }

    pub fn merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> Parallel {
        let mut parallel = Parallel {
            children: self.children,
            merge: MergeStrategy::Concatenate("\n\n".to_string()),
            policy: ErrorPolicy::FailFast,
        };
        if let Some(merge) = self.merge {
            parallel.merge = merge;
        }
        if let Some(policy) = self.policy {
            parallel.policy = policy;
        }
        parallel
    }
}
