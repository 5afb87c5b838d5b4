//! Primary/backup execution with a bounded retry budget.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use hive_core::error::Result;
use hive_core::types::StepResult;

use crate::context::ExecutionContext;
use crate::step::Step;

/// Wraps a primary and a backup step.
///
/// `retries: n` allows n additional primary attempts after the first
/// (n + 1 total), each with the original input. Only when the budget is
/// exhausted does the backup run, also with the original input. A backup
/// failure propagates unmodified; there is no further fallback.
pub struct Fallback {
    primary: Arc<dyn Step>,
    backup: Arc<dyn Step>,
    retries: usize,
}

impl Fallback {
    pub fn new(primary: impl Step, backup: impl Step, retries: usize) -> Self {
        Self {
            primary: Arc::new(primary),
            backup: Arc::new(backup),
            retries,
        }
    }
}

impl Step for Fallback {
    fn name(&self) -> &str {
        "fallback"
    }

    fn execute<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let attempts = self.retries + 1;
            let mut last_error = None;

            for attempt in 0..attempts {
                ctx.ensure_live()?;
                match self.primary.execute(input, ctx).await {
                    Ok(mut result) => {
                        result.set_meta("fallback.used", false);
                        if attempt > 0 {
                            result.set_meta("fallback.retries_before_success", attempt as u64);
                        }
                        return Ok(result);
                    }
                    Err(e) => {
                        warn!(
                            step = %self.primary.name(),
                            attempt = attempt + 1,
                            attempts,
                            error = %e,
                            "Primary step failed"
                        );
                        last_error = Some(e);
                    }
                }
            }

            let primary_error = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "primary never ran".to_string());
            info!(step = %self.backup.name(), "Primary exhausted, running backup");

            let mut result = self.backup.execute(input, ctx).await?;
            result.set_meta("fallback.used", true);
            result.set_meta("fallback.primary_error", primary_error);
            Ok(result)
        })
    }
}
