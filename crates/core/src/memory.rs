//! Message log: the in-process conversation record.
//!
//! One global log holds the user-visible conversation. Named module logs
//! hold auxiliary traces (the engine's tool trace, per-handler traces) and
//! are never folded into the global log. Nothing here is persisted.
//!
//! [`MessageLog`] is a cheap cloneable handle; clones share the same
//! storage. Each collection has its own lock so concurrent conversations
//! can append safely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::message::{Message, Role};

#[derive(Default)]
struct LogInner {
    global: Mutex<Vec<Message>>,
    modules: Mutex<HashMap<String, Vec<Message>>>,
}

/// Shared, internally synchronized message log.
#[derive(Clone, Default)]
pub struct MessageLog {
    inner: Arc<LogInner>,
}

/// A poisoned lock only means another appender panicked mid-push; the
/// vector itself is still valid.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the global log.
    pub fn append_global(&self, role: Role, text: impl Into<String>) {
        lock(&self.inner.global).push(Message::new(role, text));
    }

    /// Append a turn to a module log, creating the module on first use.
    pub fn append_module(&self, module: &str, role: Role, text: impl Into<String>) {
        lock(&self.inner.modules)
            .entry(module.to_string())
            .or_default()
            .push(Message::new(role, text));
    }

    /// Ordered copy of the global log.
    pub fn snapshot_global(&self) -> Vec<Message> {
        lock(&self.inner.global).clone()
    }

    /// Ordered copy of a module log. Unknown modules are empty.
    pub fn module(&self, module: &str) -> Vec<Message> {
        lock(&self.inner.modules)
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of every module that has received a message, sorted.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.modules).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global_len(&self) -> usize {
        lock(&self.inner.global).len()
    }

    pub fn clear_global(&self) {
        lock(&self.inner.global).clear();
    }

    pub fn clear_module(&self, module: &str) {
        lock(&self.inner.modules).remove(module);
    }

    pub fn clear_all(&self) {
        self.clear_global();
        lock(&self.inner.modules).clear();
    }

    /// Messages across the global log and every module.
    pub fn total_message_count(&self) -> usize {
        let modules: usize = lock(&self.inner.modules).values().map(Vec::len).sum();
        self.global_len() + modules
    }
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("global", &self.global_len())
            .field("modules", &self.module_names())
            .finish()
    }
}
