//! Composable routing predicates.

use futures::future::BoxFuture;
use regex::Regex;

use hive_core::error::{HiveError, Result};

use crate::context::ExecutionContext;

/// Predicate over `(input, context)` used by [`Router`](crate::Router)
/// When clauses.
///
/// Conditions may read the shared context store (and, for captures, write
/// it), so evaluation is async. Combinators compose arbitrarily deep.
#[derive(Debug, Clone)]
pub enum RouteCondition {
    /// Always true.
    Always,
    /// Always false.
    Never,
    /// Input contains the substring.
    Contains(String),
    /// Input length lies within the inclusive range.
    LengthBetween { min: usize, max: usize },
    /// Input ends with the suffix.
    EndsWith(String),
    /// Input matches the pattern.
    Matches(Regex),
    /// Input matches the pattern; the first capture group (or the whole
    /// match) is written into the context store under `key`.
    Captures { pattern: Regex, key: String },
    /// The context store holds the string `value` under `key`.
    ContextEquals { key: String, value: String },
    /// True when every inner condition holds; stops at the first false.
    All(Vec<RouteCondition>),
    /// True when any inner condition holds; stops at the first true.
    Any(Vec<RouteCondition>),
    /// True when exactly `count` inner conditions hold. Every condition is
    /// evaluated; captures fire even past the deciding one.
    Exactly { count: usize, of: Vec<RouteCondition> },
}

impl RouteCondition {
    pub fn contains(substring: impl Into<String>) -> Self {
        Self::Contains(substring.into())
    }

    pub fn length_between(min: usize, max: usize) -> Self {
        Self::LengthBetween { min, max }
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self::EndsWith(suffix.into())
    }

    /// Pattern-match condition. Invalid patterns fail here, before any
    /// routing runs.
    pub fn matches(pattern: &str) -> Result<Self> {
        Ok(Self::Matches(compile(pattern)?))
    }

    /// Pattern-match condition that records what matched.
    pub fn captures(pattern: &str, key: impl Into<String>) -> Result<Self> {
        Ok(Self::Captures {
            pattern: compile(pattern)?,
            key: key.into(),
        })
    }

    pub fn context_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ContextEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Conjunction of two conditions.
    pub fn and(self, other: RouteCondition) -> Self {
        Self::All(vec![self, other])
    }

    /// Disjunction of two conditions.
    pub fn or(self, other: RouteCondition) -> Self {
        Self::Any(vec![self, other])
    }

    pub fn all(conditions: Vec<RouteCondition>) -> Self {
        Self::All(conditions)
    }

    pub fn any(conditions: Vec<RouteCondition>) -> Self {
        Self::Any(conditions)
    }

    pub fn exactly(count: usize, of: Vec<RouteCondition>) -> Self {
        Self::Exactly { count, of }
    }

    /// Evaluate against an input and context.
    pub fn evaluate<'a>(
        &'a self,
        input: &'a str,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self {
                Self::Always => true,
                Self::Never => false,
                Self::Contains(substring) => input.contains(substring.as_str()),
                Self::LengthBetween { min, max } => (*min..=*max).contains(&input.len()),
                Self::EndsWith(suffix) => input.ends_with(suffix.as_str()),
                Self::Matches(pattern) => pattern.is_match(input),
                Self::Captures { pattern, key } => match pattern.captures(input) {
                    Some(caps) => {
                        let matched = caps
                            .get(1)
                            .or_else(|| caps.get(0))
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default();
                        ctx.store().set_str(key.clone(), matched).await;
                        true
                    }
                    None => false,
                },
                Self::ContextEquals { key, value } => ctx
                    .store()
                    .get_str(key)
                    .await
                    .is_some_and(|stored| stored == *value),
                Self::All(conditions) => {
                    for condition in conditions {
                        if !condition.evaluate(input, ctx).await {
                            return false;
                        }
                    }
                    true
                }
                Self::Any(conditions) => {
                    for condition in conditions {
                        if condition.evaluate(input, ctx).await {
                            return true;
                        }
                    }
                    false
                }
                Self::Exactly { count, of } => {
                    let mut matched = 0usize;
                    for condition in of {
                        if condition.evaluate(input, ctx).await {
                            matched += 1;
                        }
                    }
                    matched == *count
                }
            }
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        HiveError::InvalidConfiguration(format!("invalid route pattern '{pattern}': {e}"))
    })
}
