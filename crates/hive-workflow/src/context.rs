//! Execution context threaded through the step tree.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use hive_core::error::{HiveError, Result};
use hive_core::hooks::LifecycleHooks;
use hive_core::types::SessionId;

use crate::step::Step;

/// Shared key-value store for passing data between steps.
///
/// Keys are strings; values are JSON for maximum flexibility. The store is
/// created and owned by the caller; the engine only reads and writes it and
/// never assumes exclusive access.
#[derive(Default)]
pub struct ContextStore {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from initial data.
    pub fn from_map(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Get a value by key.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().await.get(key).cloned()
    }

    /// Get a value as a string, if it's a string.
    pub async fn get_str(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .await
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Set a value.
    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().await.insert(key.into(), value);
    }

    /// Set a string value.
    pub async fn set_str(&self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, serde_json::Value::String(value.into())).await;
    }

    /// Copy of the full data map.
    pub async fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().await.clone()
    }
}

/// Back-reference to the orchestration that owns a running tree: its
/// identity plus the table of named steps it can hand work off to.
pub struct OrchestrationRef {
    id: Uuid,
    name: String,
    handoffs: HashMap<String, Arc<dyn Step>>,
}

impl OrchestrationRef {
    pub fn new(id: Uuid, name: impl Into<String>, handoffs: HashMap<String, Arc<dyn Step>>) -> Self {
        Self {
            id,
            name: name.into(),
            handoffs,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a handoff target by name.
    pub fn handoff(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.handoffs.get(name).cloned()
    }

    /// Names of all registered handoff targets.
    pub fn handoff_names(&self) -> Vec<&str> {
        self.handoffs.keys().map(String::as_str).collect()
    }
}

/// Immutable bundle passed down the step tree.
///
/// Cloning is cheap: every field is a shared handle. Steps borrow the
/// context, they never own it.
#[derive(Clone)]
pub struct ExecutionContext {
    store: Arc<ContextStore>,
    session: Option<SessionId>,
    hooks: Option<Arc<dyn LifecycleHooks>>,
    orchestration: Option<Arc<OrchestrationRef>>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self {
            store,
            session: None,
            hooks: None,
            orchestration: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_orchestration(mut self, orchestration: Arc<OrchestrationRef>) -> Self {
        self.orchestration = Some(orchestration);
        self
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn hooks(&self) -> Option<&dyn LifecycleHooks> {
        self.hooks.as_deref()
    }

    pub fn orchestration(&self) -> Option<&OrchestrationRef> {
        self.orchestration.as_deref()
    }

    /// Token observed by every step running under this context.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel this context and every scope derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when this context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Derive a child scope whose token follows this context's cancellation
    /// but can also be cancelled independently.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Fail fast when this scope has already been cancelled.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HiveError::Cancelled)
        } else {
            Ok(())
        }
    }
}
