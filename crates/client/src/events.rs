//! Event handlers and their registry.
//!
//! Handlers subscribe by event name; several distinct handlers may share a
//! name, and the same handler instance may not be registered twice under
//! one name. Equality is by handler identity (the allocation behind the
//! `Arc`), never by name, so removal takes the same `Arc` that was
//! registered.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use wiremux_protocol::Message;

use crate::error::HandlerError;

/// A registered callback for one named event.
///
/// `handle` is invoked on its own task per delivery, so implementations
/// may block or panic without affecting the read loop or other handlers.
pub trait EventHandler: Send + Sync {
    /// Event name this handler subscribes to.
    fn name(&self) -> &str;

    /// Invoked with the full event message.
    fn handle(&self, event: Message);
}

/// Closure adapter implementing [`EventHandler`].
pub struct CallbackHandler<F> {
    name: String,
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(Message) + Send + Sync + 'static,
{
    /// Wrap a closure as a handler for `name`.
    ///
    /// Keep the returned `Arc` around: it is the identity needed to
    /// remove the handler again.
    pub fn new(name: impl Into<String>, callback: F) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            callback,
        })
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: Message) {
        (self.callback)(event);
    }
}

/// Identity comparison: same allocation, metadata ignored.
fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Concurrency-safe map from event name to its ordered handler list.
#[derive(Default)]
pub struct EventHandlerRegistry {
    inner: Mutex<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry's exclusion lock.
    ///
    /// Reads through [`EventHandlerRegistry::get`] are snapshots; callers
    /// needing atomicity around get-plus-mutate hold this lock instead.
    pub async fn lock(&self) -> HandlerTable<'_> {
        HandlerTable {
            entries: self.inner.lock().await,
        }
    }

    /// Append `handler` to the list for its name.
    pub async fn add(&self, handler: Arc<dyn EventHandler>) -> Result<(), HandlerError> {
        self.lock().await.add(handler)
    }

    /// Remove the first identity match for `handler` from its named list.
    pub async fn remove(&self, handler: &Arc<dyn EventHandler>) -> Result<(), HandlerError> {
        self.lock().await.remove(handler)
    }

    /// Snapshot of the current list for `name`.
    pub async fn get(&self, name: &str) -> Result<Vec<Arc<dyn EventHandler>>, HandlerError> {
        self.lock().await.get(name).map(<[_]>::to_vec)
    }

    /// Number of handlers registered under `name`.
    pub async fn handler_count(&self, name: &str) -> usize {
        self.lock()
            .await
            .get(name)
            .map(<[_]>::len)
            .unwrap_or_default()
    }
}

/// View of the registry while its lock is held.
pub struct HandlerTable<'a> {
    entries: MutexGuard<'a, HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl HandlerTable<'_> {
    /// Append `handler` under its own name, rejecting an identical
    /// instance that is already registered there.
    pub fn add(&mut self, handler: Arc<dyn EventHandler>) -> Result<(), HandlerError> {
        let name = handler.name().to_string();
        let list = self.entries.entry(name.clone()).or_default();
        if list.iter().any(|existing| same_handler(existing, &handler)) {
            return Err(HandlerError::Duplicate(name));
        }
        list.push(handler);
        Ok(())
    }

    /// Remove the first identity match; an absent handler is an error.
    pub fn remove(&mut self, handler: &Arc<dyn EventHandler>) -> Result<(), HandlerError> {
        let name = handler.name();
        let list = self
            .entries
            .get_mut(name)
            .ok_or_else(|| HandlerError::NotFound(name.to_string()))?;
        let position = list
            .iter()
            .position(|existing| same_handler(existing, handler))
            .ok_or_else(|| HandlerError::NotFound(name.to_string()))?;
        list.remove(position);
        let now_empty = list.is_empty();
        if now_empty {
            self.delete(name);
        }
        Ok(())
    }

    /// Current list for `name`; a name with no handlers left is not kept.
    pub fn get(&self, name: &str) -> Result<&[Arc<dyn EventHandler>], HandlerError> {
        self.entries
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| HandlerError::NoneRegistered(name.to_string()))
    }

    /// Bulk-replace the list for `name`; an empty list clears the entry.
    pub fn set(&mut self, name: impl Into<String>, list: Vec<Arc<dyn EventHandler>>) {
        let name = name.into();
        if list.is_empty() {
            self.entries.remove(&name);
        } else {
            self.entries.insert(name, list);
        }
    }

    /// Drop every handler registered under `name`.
    pub fn delete(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }
}
