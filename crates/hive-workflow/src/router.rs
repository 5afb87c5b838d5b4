//! Conditional branching over ordered When clauses.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use hive_core::error::{HiveError, Result};
use hive_core::types::StepResult;

use crate::condition::RouteCondition;
use crate::context::ExecutionContext;
use crate::group::Group;
use crate::step::Step;

struct When {
    name: Option<String>,
    condition: RouteCondition,
    step: Arc<dyn Step>,
}

/// Ordered `(condition, step)` pairs plus an ordered fallback chain.
///
/// Conditions are tested in declared order; the first that holds wins and
/// its step runs. On no match, *all* Otherwise steps run as a sequential
/// chain, output feeding forward exactly like [`Group`]; this is deliberate,
/// not a single-fallback router. No match and no Otherwise steps is
/// [`HiveError::NoRouteMatched`].
pub struct Router {
    whens: Vec<When>,
    otherwise: Option<Group>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("whens", &self.whens.len())
            .field("otherwise", &self.otherwise.is_some())
            .finish()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }
}

impl Step for Router {
    fn name(&self) -> &str {
        "router"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            ctx.ensure_live()?;

            for (index, when) in self.whens.iter().enumerate() {
                if when.condition.evaluate(input, ctx).await {
                    let route = when
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("when_{index}"));
                    info!(route = %route, step = %when.step.name(), "Route matched");
                    let mut result = when.step.execute(input, ctx).await?;
                    result.set_meta("router.matched_route", route);
                    return Ok(result);
                }
            }

            let Some(otherwise) = &self.otherwise else {
                return Err(HiveError::NoRouteMatched);
            };

            info!("No route matched, running fallback chain");
            let mut result = otherwise.execute(input, ctx).await?;
            result.set_meta("router.matched_route", "fallback");
            Ok(result)
        })
    }
}

/// Builder for [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
    whens: Vec<When>,
    otherwise: Vec<Arc<dyn Step>>,
}

impl RouterBuilder {
    /// Add a When clause; its route identifier defaults to `when_<index>`.
    pub fn when(mut self, condition: RouteCondition, step: impl Step) -> Self {
        self.whens.push(When {
            name: None,
            condition,
            step: Arc::new(step),
        });
        self
    }

    /// Add a When clause with an explicit route identifier.
    pub fn when_named(
        mut self,
        name: impl Into<String>,
        condition: RouteCondition,
        step: impl Step,
    ) -> Self {
        self.whens.push(When {
            name: Some(name.into()),
            condition,
            step: Arc::new(step),
        });
        self
    }

    /// Append a step to the fallback chain.
    pub fn otherwise(mut self, step: impl Step) -> Self {
        self.otherwise.push(Arc::new(step));
        self
    }

    /// A router with neither When clauses nor Otherwise steps could never
    /// produce a result, so construction fails instead.
    pub fn build(self) -> Result<Router> {
        if self.whens.is_empty() && self.otherwise.is_empty() {
            return Err(HiveError::InvalidConfiguration(
                "router has no when clauses and no fallback steps".into(),
            ));
        }
        let otherwise = if self.otherwise.is_empty() {
            None
        } else {
            Some(Group::new(self.otherwise).with_name("router_fallback"))
        };
        Ok(Router {
            whens: self.whens,
            otherwise,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, AppendStep};

    #[tokio::test]
    async fn test_first_matching_route_wins() {
        let router = Router::builder()
            .when(RouteCondition::contains("hello"), AppendStep::new("-greeting"))
            .when(RouteCondition::Always, AppendStep::new("-anything"))
            .build()
            .unwrap();
        let ctx = test_context();

        let result = router.execute("hello there", &ctx).await.unwrap();
        assert_eq!(result.output, "hello there-greeting");
        assert_eq!(result.meta_str("router.matched_route"), Some("when_0"));
    }

    #[tokio::test]
    async fn test_named_route_identifier() {
        let router = Router::builder()
            .when_named(
                "greeting",
                RouteCondition::contains("hello"),
                AppendStep::new("!"),
            )
            .build()
            .unwrap();
        let ctx = test_context();

        let result = router.execute("hello", &ctx).await.unwrap();
        assert_eq!(result.meta_str("router.matched_route"), Some("greeting"));
    }

    #[tokio::test]
    async fn test_all_otherwise_steps_run_in_sequence() {
        let router = Router::builder()
            .when(RouteCondition::contains("go"), AppendStep::new("-run"))
            .otherwise(AppendStep::new("B"))
            .otherwise(AppendStep::new("C"))
            .build()
            .unwrap();
        let ctx = test_context();

        let result = router.execute("stop", &ctx).await.unwrap();
        assert_eq!(result.output, "stopBC");
        assert_eq!(result.meta_str("router.matched_route"), Some("fallback"));
    }

    #[tokio::test]
    async fn test_no_match_and_no_fallback_is_an_error() {
        let router = Router::builder()
            .when(RouteCondition::Never, AppendStep::new("x"))
            .build()
            .unwrap();
        let ctx = test_context();

        let err = router.execute("anything", &ctx).await.unwrap_err();
        assert!(matches!(err, HiveError::NoRouteMatched));
    }

    #[test]
    fn test_empty_router_fails_at_build() {
        let err = Router::builder().build().unwrap_err();
        assert!(matches!(err, HiveError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_conditions_checked_in_declared_order() {
        let router = Router::builder()
            .when_named("broad", RouteCondition::contains("a"), AppendStep::new("-1"))
            .when_named("narrow", RouteCondition::contains("ab"), AppendStep::new("-2"))
            .build()
            .unwrap();
        let ctx = test_context();

        // Both conditions hold; the earlier clause wins.
        let result = router.execute("ab", &ctx).await.unwrap();
        assert_eq!(result.meta_str("router.matched_route"), Some("broad"));
    }

    #[tokio::test]
    async fn test_capture_condition_feeds_routed_step() {
        let router = Router::builder()
            .when(
                RouteCondition::captures(r"#(\d+)", "ticket").unwrap(),
                AppendStep::new(" [routed]"),
            )
            .build()
            .unwrap();
        let ctx = test_context();

        let result = router.execute("escalate #77", &ctx).await.unwrap();
        assert_eq!(result.output, "escalate #77 [routed]");
        assert_eq!(ctx.store().get_str("ticket").await.as_deref(), Some("77"));
    }
}
