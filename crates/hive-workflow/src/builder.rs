//! Plain-function composition sugar.
//!
//! The declarative front-end over the engine: helpers that assemble step
//! variants without adding any execution semantics of their own. Anything
//! expressible here is equally expressible with the type constructors.

use std::sync::Arc;

use crate::fallback::Fallback;
use crate::group::Group;
use crate::parallel::Parallel;
use crate::step::Step;

/// Chain steps into a sequential [`Group`].
pub fn chain(steps: Vec<Arc<dyn Step>>) -> Group {
    Group::new(steps)
}

/// Run `first`, then feed its output into `second`.
pub fn then(first: impl Step, second: impl Step) -> Group {
    Group::new(vec![Arc::new(first) as Arc<dyn Step>, Arc::new(second)])
}

/// Run both steps concurrently against the same input.
pub fn in_parallel(left: impl Step, right: impl Step) -> Parallel {
    Parallel::new(vec![Arc::new(left) as Arc<dyn Step>, Arc::new(right)])
}

/// Guard `primary` with `backup`, no retries.
pub fn fall_back(primary: impl Step, backup: impl Step) -> Fallback {
    Fallback::new(primary, backup, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepExt;
    use crate::testing::{test_context, AppendStep, FailStep};

    #[tokio::test]
    async fn test_then_feeds_output_forward() {
        let pipeline = then(AppendStep::new("A"), AppendStep::new("B"));
        let ctx = test_context();

        let result = pipeline.execute("x", &ctx).await.unwrap();
        assert_eq!(result.output, "xAB");
    }

    #[tokio::test]
    async fn test_chain_builds_a_group() {
        let pipeline = chain(vec![
            AppendStep::new("1").boxed(),
            AppendStep::new("2").boxed(),
            AppendStep::new("3").boxed(),
        ]);
        let ctx = test_context();

        let result = pipeline.execute("", &ctx).await.unwrap();
        assert_eq!(result.output, "123");
        assert_eq!(result.meta_u64("group.total_steps"), Some(3));
    }

    #[tokio::test]
    async fn test_in_parallel_runs_both() {
        let pipeline = in_parallel(AppendStep::new("-l"), AppendStep::new("-r"));
        let ctx = test_context();

        let result = pipeline.execute("v", &ctx).await.unwrap();
        assert_eq!(result.output, "v-l\n\nv-r");
    }

    #[tokio::test]
    async fn test_fall_back_guards_primary() {
        let pipeline = fall_back(FailStep::new("primary"), AppendStep::new("-saved"));
        let ctx = test_context();

        let result = pipeline.execute("x", &ctx).await.unwrap();
        assert_eq!(result.output, "x-saved");
        assert_eq!(result.meta_bool("fallback.used"), Some(true));
    }
}
