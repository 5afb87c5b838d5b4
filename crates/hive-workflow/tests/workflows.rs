//! End-to-end workflow composition tests against the public API, driving
//! the engine through scripted agent runtimes only.

use std::sync::Arc;
use std::time::Duration;

use hive_core::error::HiveError;
use hive_core::types::{SessionId, TokenUsage};
use hive_test_utils::{init_tracing, RecordingHooks, ScriptedRuntime};
use hive_workflow::{
    AgentStep, ContextStore, ErrorPolicy, ExecutionContext, Fallback, Interrupt, Loop,
    MergeStrategy, Orchestration, Parallel, ResumeToken, RouteCondition, Router, StepExt,
    StopCondition, Step,
};

fn fresh_context() -> ExecutionContext {
    init_tracing();
    ExecutionContext::new(Arc::new(ContextStore::new()))
}

/// An agent-backed step that appends a suffix to its input.
fn appender(name: &'static str, suffix: &'static str) -> AgentStep {
    AgentStep::new(Arc::new(ScriptedRuntime::new(name, move |input| {
        format!("{input}{suffix}")
    })))
}

#[tokio::test]
async fn sequential_chain_folds_left_to_right() {
    let pipeline = hive_workflow::chain(vec![
        appender("first", "A").boxed(),
        appender("second", "B").boxed(),
    ]);
    let ctx = fresh_context();

    let result = pipeline.execute("x", &ctx).await.unwrap();
    assert_eq!(result.output, "xAB");
    assert_eq!(result.iteration_count, 2);
}

#[tokio::test]
async fn parallel_concatenation_ignores_completion_order() {
    // Slow child declared first; fast child finishes long before it.
    let slow = AgentStep::new(Arc::new(
        ScriptedRuntime::fixed("slow", "slow output").with_delay(Duration::from_millis(80)),
    ));
    let fast = AgentStep::new(Arc::new(ScriptedRuntime::fixed("fast", "fast output")));

    let parallel = Parallel::builder()
        .step(slow)
        .step(fast)
        .merge(MergeStrategy::Concatenate("\n\n".to_string()))
        .build();
    let ctx = fresh_context();

    let result = parallel.execute("go", &ctx).await.unwrap();
    assert_eq!(result.output, "slow output\n\nfast output");
}

#[tokio::test]
async fn router_fallback_chain_runs_every_otherwise_branch() {
    let router = Router::builder()
        .when(RouteCondition::contains("go"), appender("runner", "-run"))
        .otherwise(appender("b", "B"))
        .otherwise(appender("c", "C"))
        .build()
        .unwrap();
    let ctx = fresh_context();

    let result = router.execute("stop", &ctx).await.unwrap();
    assert_eq!(result.output, "stopBC");
    assert_eq!(result.meta_str("router.matched_route"), Some("fallback"));
}

#[tokio::test]
async fn fallback_engages_backup_and_reports_the_primary_error() {
    let fallback = Fallback::new(
        AgentStep::new(Arc::new(ScriptedRuntime::failing("primary"))),
        AgentStep::new(Arc::new(ScriptedRuntime::echo("backup"))),
        0,
    );
    let ctx = fresh_context();

    let result = fallback.execute("payload", &ctx).await.unwrap();
    assert_eq!(result.output, "payload");
    assert_eq!(result.meta_bool("fallback.used"), Some(true));
    assert!(result
        .meta_str("fallback.primary_error")
        .unwrap()
        .contains("scripted failure"));
}

#[tokio::test]
async fn loop_feeds_output_back_as_input() {
    let looped = Loop::new(appender("plus", "+"), StopCondition::MaxIterations(3));
    let ctx = fresh_context();

    let result = looped.execute("x", &ctx).await.unwrap();
    assert_eq!(result.output, "x+++");
    assert_eq!(result.meta_u64("loop.iteration_count"), Some(3));
}

#[tokio::test]
async fn interrupt_suspends_and_a_token_resumes() {
    // The workflow stops for approval after drafting.
    let orchestration = Orchestration::new(
        "drafting",
        vec![
            appender("draft", " [drafted]").boxed(),
            Interrupt::with_reason(|draft| format!("needs approval: {draft}")).boxed(),
        ],
    );
    let ctx = fresh_context();

    let err = orchestration.run("report", &ctx).await.unwrap_err();
    let HiveError::WorkflowInterrupted { reason } = err else {
        panic!("expected interruption");
    };
    assert_eq!(reason, "needs approval: report [drafted]");

    // The caller captures the remaining work and resumes with new input.
    let token = ResumeToken::new(
        orchestration.id(),
        "post-approval",
        reason,
        appender("publish", " [published]").boxed(),
        ctx,
    );
    let result = token.resume("report [drafted] (approved)").await.unwrap();
    assert_eq!(result.output, "report [drafted] (approved) [published]");
}

#[tokio::test]
async fn tool_activity_and_usage_aggregate_across_a_group() {
    let pipeline = hive_workflow::chain(vec![
        AgentStep::new(Arc::new(ScriptedRuntime::tool_using("researcher"))).boxed(),
        AgentStep::new(Arc::new(ScriptedRuntime::tool_using("writer"))).boxed(),
    ]);
    let ctx = fresh_context();

    let result = pipeline.execute("topic", &ctx).await.unwrap();
    assert_eq!(result.tool_calls.len(), 2);
    assert_eq!(result.tool_results.len(), 2);
    assert_eq!(result.usage, Some(TokenUsage::new(14, 6)));
}

#[tokio::test]
async fn hooks_observe_leaf_and_orchestration_boundaries() {
    let hooks = Arc::new(RecordingHooks::new());
    let orchestration = Orchestration::new(
        "observed",
        vec![AgentStep::new(Arc::new(ScriptedRuntime::echo("leaf"))).boxed()],
    );
    let ctx = fresh_context()
        .with_session(SessionId::from_str("s-42"))
        .with_hooks(hooks.clone());

    orchestration.run("hello", &ctx).await.unwrap();

    let events = hooks.events();
    assert_eq!(
        events,
        vec!["start:observed", "start:leaf", "end:leaf", "end:observed"]
    );
}

#[tokio::test]
async fn mixed_tree_composes_and_stays_deterministic() {
    fn build_tree() -> Orchestration {
        let triage = Router::builder()
            .when_named(
                "question",
                RouteCondition::ends_with("?"),
                appender("answerer", " -> answered"),
            )
            .otherwise(appender("acknowledger", " -> noted"))
            .build()
            .unwrap();

        let reviewers = Parallel::builder()
            .named_step("style", appender("style", " +style"))
            .named_step("facts", appender("facts", " +facts"))
            .merge(MergeStrategy::Concatenate(" | ".to_string()))
            .on_error(ErrorPolicy::ContinueOnPartialFailure)
            .build();

        Orchestration::new(
            "review-flow",
            vec![
                triage.boxed(),
                reviewers.boxed(),
                appender("closer", " [done]").named("closer").boxed(),
            ],
        )
    }

    let tree = build_tree();
    let first = tree.run("is this right?", &fresh_context()).await.unwrap();
    let second = tree.run("is this right?", &fresh_context()).await.unwrap();

    assert_eq!(
        first.output,
        "is this right? -> answered +style | is this right? -> answered +facts [done]"
    );
    // A pure tree re-run against a fresh context is byte-identical.
    assert_eq!(first.output, second.output);
    assert_eq!(first.metadata, second.metadata);
    assert_eq!(
        first.meta_str("orchestration.step_0.router.matched_route"),
        Some("question")
    );
}

#[tokio::test]
async fn cancelling_the_context_stops_the_tree() {
    let pipeline = hive_workflow::chain(vec![AgentStep::new(Arc::new(ScriptedRuntime::sleepy(
        "slow",
        Duration::from_secs(30),
    )))
    .boxed()]);
    let ctx = fresh_context();

    let ctx_for_cancel = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx_for_cancel.cancel();
    });

    let err = pipeline.execute("x", &ctx).await.unwrap_err();
    assert!(matches!(err, HiveError::Cancelled));
}
