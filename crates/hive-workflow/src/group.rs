//! Sequential composition and the top-level orchestration wrapper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info};
use uuid::Uuid;

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::context::{ExecutionContext, OrchestrationRef};
use crate::step::Step;

/// Ordered children executed strictly in declared order, each child's
/// output feeding the next child's input.
///
/// Aggregation: tool calls/results concatenate across children, iteration
/// counts and usage sum, duration spans the whole group, and child *i*'s
/// metadata is re-emitted under `group.step_<i>.<key>`.
pub struct Group {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Group {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            name: "group".to_string(),
            steps,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Step for Group {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            if self.steps.is_empty() {
                return Err(HiveError::InvalidConfiguration(format!(
                    "group '{}' has no steps",
                    self.name
                )));
            }

            let started = Instant::now();
            let mut aggregate = StepResult::empty();
            let mut current = input.to_string();

            for (index, step) in self.steps.iter().enumerate() {
                ctx.ensure_live()?;
                debug!(group = %self.name, index, step = %step.name(), "Running group step");
                let result = step.execute(&current, ctx).await?;
                current = result.output.clone();
                aggregate.absorb(&result);
                aggregate.adopt_metadata(&format!("group.step_{index}"), &result);
            }

            aggregate.output = current;
            aggregate.duration = started.elapsed();
            aggregate.set_meta("group.total_steps", self.steps.len() as u64);
            Ok(aggregate)
        })
    }
}

/// Top-level named workflow: a [`Group`] with a stable identity and
/// metadata namespace.
///
/// While the orchestration runs, the context carries a back-reference to it
/// (name, id, handoff table), and every `group.*` metadata key is mirrored
/// under `orchestration.*` so callers read one namespace regardless of
/// nesting depth.
pub struct Orchestration {
    id: Uuid,
    name: String,
    group: Group,
    handoffs: HashMap<String, Arc<dyn Step>>,
}

impl Orchestration {
    pub fn new(name: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            group: Group::new(steps).with_name(name.clone()),
            name,
            handoffs: HashMap::new(),
        }
    }

    /// Register a named step other workflow participants can hand off to.
    pub fn with_handoff(mut self, name: impl Into<String>, step: Arc<dyn Step>) -> Self {
        self.handoffs.insert(name.into(), step);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run the workflow. Equivalent to `execute` but reads as an entry
    /// point at call sites.
    pub async fn run(&self, input: &str, ctx: &ExecutionContext) -> Result<StepResult> {
        self.execute(input, ctx).await
    }
}

impl Step for Orchestration {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let orchestration = Arc::new(OrchestrationRef::new(
                self.id,
                self.name.clone(),
                self.handoffs.clone(),
            ));
            let scoped = ctx.clone().with_orchestration(orchestration);

            info!(orchestration = %self.name, id = %self.id, "Starting orchestration");
            if let Some(hooks) = scoped.hooks() {
                hooks.on_step_start(&self.name, input).await;
            }

            let outcome = self.group.execute(input, &scoped).await;
            match outcome {
                Ok(mut result) => {
                    let mirrored: Vec<(String, serde_json::Value)> = result
                        .metadata
                        .iter()
                        .filter_map(|(key, value)| {
                            key.strip_prefix("group.")
                                .map(|rest| (format!("orchestration.{rest}"), value.clone()))
                        })
                        .collect();
                    for (key, value) in mirrored {
                        result.metadata.insert(key, value);
                    }
                    result.set_meta("orchestration.name", self.name.as_str());
                    result.set_meta("orchestration.id", self.id.to_string());

                    if let Some(hooks) = scoped.hooks() {
                        hooks.on_step_end(&self.name, &result).await;
                    }
                    info!(orchestration = %self.name, "Orchestration complete");
                    Ok(result)
                }
                Err(e) => {
                    if let Some(hooks) = scoped.hooks() {
                        hooks.on_step_error(&self.name, &e).await;
                    }
                    Err(e)
                }
            }
        })
    }
}
