use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool invocation requested by a delegate during a step run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub requested_at: DateTime<Utc>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
            requested_at: Utc::now(),
        }
    }
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Token accounting reported by an agent delegate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Result of executing a step.
///
/// Composites aggregate child results bottom-up: accumulator fields
/// (tool calls, tool results, iteration count, usage) fold across children,
/// while metadata is re-emitted under a namespace owned by the producing
/// composite so nested composites never collide.
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    /// Output text; for composites, the output of the combining policy.
    pub output: String,
    /// Tool invocations accumulated across the subtree.
    pub tool_calls: Vec<ToolCall>,
    /// Tool outcomes accumulated across the subtree.
    pub tool_results: Vec<ToolOutput>,
    /// Units of delegated work performed in the subtree.
    pub iteration_count: usize,
    /// Wall-clock span of this step's execution.
    pub duration: Duration,
    /// Token accounting, when the delegate reports it.
    pub usage: Option<TokenUsage>,
    /// Namespaced side-channel values (insertion order irrelevant).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StepResult {
    /// A leaf result carrying one unit of work.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            iteration_count: 1,
            ..Self::default()
        }
    }

    /// An empty accumulator for composites to fold children into.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach a metadata value, builder-style.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.set_meta(key, value);
        self
    }

    /// Attach token usage, builder-style.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Insert a metadata value.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Read a metadata value as a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Read a metadata value as an unsigned integer.
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64())
    }

    /// Read a metadata value as a boolean.
    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(|v| v.as_bool())
    }

    /// Fold another result's accumulators into this one: tool calls and
    /// results concatenate, iteration counts sum, usage adds.
    pub fn absorb(&mut self, other: &StepResult) {
        self.tool_calls.extend(other.tool_calls.iter().cloned());
        self.tool_results.extend(other.tool_results.iter().cloned());
        self.iteration_count += other.iteration_count;
        if let Some(other_usage) = &other.usage {
            match &mut self.usage {
                Some(usage) => usage.add(other_usage),
                None => self.usage = Some(*other_usage),
            }
        }
    }

    /// Re-emit another result's metadata under a namespace prefix.
    pub fn adopt_metadata(&mut self, prefix: &str, other: &StepResult) {
        for (key, value) in &other.metadata {
            self.metadata.insert(format!("{prefix}.{key}"), value.clone());
        }
    }
}
