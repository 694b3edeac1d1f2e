//! Pending command tracking and reply correlation.
//!
//! Every command in flight is one [`PendingCommand`] owned by the
//! [`CommandRegistry`] until its reply arrives or the entry is discarded.
//! The registry hands out an explicit lock (the [`CommandTable`] guard) so
//! the dispatcher can perform lookup, resolution, and removal as a single
//! atomic unit; nothing else can touch the map while the guard lives.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex, MutexGuard};

use wiremux_protocol::Message;

use crate::error::CommandError;

/// The record tracking one outstanding command awaiting its reply.
///
/// Identifiers are caller-generated, strictly increasing, and never reused
/// while outstanding. The reply slot resolves at most once; dropping the
/// record without resolving cancels the caller's handle.
#[derive(Debug)]
pub struct PendingCommand {
    id: u64,
    method: String,
    params: Option<Value>,
    reply_tx: oneshot::Sender<Message>,
}

impl PendingCommand {
    /// Create a pending record and the handle its caller will await.
    pub fn new(
        id: u64,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> (Self, ReplyHandle) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            Self {
                id,
                method: method.into(),
                params,
                reply_tx,
            },
            ReplyHandle { reply_rx },
        )
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Deliver the reply, consuming the record.
    ///
    /// Returns false when the caller already dropped its handle.
    pub(crate) fn resolve(self, reply: Message) -> bool {
        self.reply_tx.send(reply).is_ok()
    }
}

/// Single-resolution future for one command's reply.
///
/// There is no built-in deadline: a command either completes via its
/// matching reply, via the synthesized transport-failure reply stamped at
/// send time, or never. Callers wanting a timeout wrap `recv()` in
/// `tokio::time::timeout` themselves.
#[derive(Debug)]
pub struct ReplyHandle {
    reply_rx: oneshot::Receiver<Message>,
}

impl ReplyHandle {
    /// Wait for the reply.
    ///
    /// Reports [`CommandError::Cancelled`] when the pending entry was
    /// discarded without ever being resolved.
    pub async fn recv(self) -> Result<Message, CommandError> {
        self.reply_rx.await.map_err(|_| CommandError::Cancelled)
    }

    /// Non-blocking poll of the slot, for callers probing whether the
    /// reply has landed yet.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.reply_rx.try_recv().ok()
    }
}

/// Concurrency-safe map from command identifier to its pending record.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    inner: Mutex<HashMap<u64, PendingCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry's exclusion lock.
    ///
    /// Everything done through the returned table happens in one critical
    /// section; the lock releases when the guard drops.
    pub async fn lock(&self) -> CommandTable<'_> {
        CommandTable {
            entries: self.inner.lock().await,
        }
    }

    /// Insert a pending record (self-locking convenience).
    pub async fn insert(&self, pending: PendingCommand) {
        self.lock().await.set(pending);
    }

    /// Remove a pending record (self-locking convenience). Idempotent.
    pub async fn remove(&self, id: u64) -> bool {
        self.lock().await.delete(id)
    }

    /// Number of commands currently outstanding.
    pub async fn outstanding(&self) -> usize {
        self.lock().await.len()
    }
}

/// View of the registry while its lock is held.
pub struct CommandTable<'a> {
    entries: MutexGuard<'a, HashMap<u64, PendingCommand>>,
}

impl CommandTable<'_> {
    /// Insert or overwrite by identifier.
    ///
    /// Identifier uniqueness while outstanding is the caller's contract;
    /// the table does not enforce it beyond last-write-wins.
    pub fn set(&mut self, pending: PendingCommand) {
        self.entries.insert(pending.id(), pending);
    }

    /// Look up a pending command without removing it.
    pub fn get(&self, id: u64) -> Result<&PendingCommand, CommandError> {
        self.entries.get(&id).ok_or(CommandError::UnknownId(id))
    }

    /// Remove an entry; returns whether one existed. Idempotent.
    pub fn delete(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Resolve the pending command for `id` with `reply` and remove it,
    /// all inside the current critical section.
    ///
    /// Removal and resolution happening under one lock is what makes
    /// resolution exactly-once: a second reply with the same identifier
    /// finds no entry.
    pub fn resolve(&mut self, id: u64, reply: Message) -> Result<(), CommandError> {
        let pending = self
            .entries
            .remove(&id)
            .ok_or(CommandError::UnknownId(id))?;
        if !pending.resolve(reply) {
            tracing::debug!(id, "reply arrived after the caller dropped its handle");
        }
        Ok(())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_delivers_reply_and_removes_entry() {
        let registry = CommandRegistry::new();
        let (pending, handle) = PendingCommand::new(1, "Foo.bar", Some(json!({"x": 1})));
        registry.insert(pending).await;

        {
            let mut table = registry.lock().await;
            table.resolve(1, Message::reply(1, json!({"y": 2}))).unwrap();
            assert!(!table.contains(1));
        }

        let reply = handle.recv().await.unwrap();
        assert_eq!(reply.result, Some(json!({"y": 2})));
        assert!(!reply.is_error());
    }

    #[tokio::test]
    async fn test_second_reply_finds_no_entry() {
        let registry = CommandRegistry::new();
        let (pending, handle) = PendingCommand::new(4, "Foo.bar", None);
        registry.insert(pending).await;

        let mut table = registry.lock().await;
        table.resolve(4, Message::reply(4, json!(1))).unwrap();
        let second = table.resolve(4, Message::reply(4, json!(2)));
        assert!(matches!(second, Err(CommandError::UnknownId(4))));
        drop(table);

        let reply = handle.recv().await.unwrap();
        assert_eq!(reply.result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_get_does_not_remove() {
        let registry = CommandRegistry::new();
        let (pending, _handle) = PendingCommand::new(9, "Foo.bar", None);
        registry.insert(pending).await;

        let table = registry.lock().await;
        assert_eq!(table.get(9).unwrap().method(), "Foo.bar");
        assert!(table.contains(9));
        assert!(matches!(table.get(2), Err(CommandError::UnknownId(2))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_cancels_handle() {
        let registry = CommandRegistry::new();
        let (pending, handle) = PendingCommand::new(3, "Foo.bar", None);
        registry.insert(pending).await;

        assert!(registry.remove(3).await);
        assert!(!registry.remove(3).await);

        assert!(matches!(
            handle.recv().await,
            Err(CommandError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_unresolved_handle_stays_pending() {
        let registry = CommandRegistry::new();
        let (pending, mut handle) = PendingCommand::new(5, "Foo.bar", None);
        registry.insert(pending).await;

        // No reply, no timeout: the slot just stays empty.
        assert!(handle.try_recv().is_none());
        assert_eq!(registry.outstanding().await, 1);
        assert!(handle.try_recv().is_none());
    }
}
