//! Realtime change feed and predicate subscriptions.
//!
//! Stores publish one [`ChangeEvent`] per committed row change. Views do not
//! patch themselves from event payloads: an event either tells them a row
//! left their predicate (remove it locally) or that something may have
//! entered it (re-query). Payloads are treated as untrusted and may fail to
//! decode.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use sf_schemas::{ChangeEvent, ChangeKind, Table};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// In-process fan-out of row changes.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, ev: ChangeEvent) {
        let _ = self.tx.send(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// What a view should do about one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// The row is no longer (or never was) in the view.
    Remove(Uuid),
    /// The row may now belong to the view; re-query.
    PossibleInsert,
}

/// Map an event to a reaction for a view defined by `predicate` over rows `T`.
///
/// - delete → remove;
/// - update whose new image decodes and fails the predicate → remove;
/// - insert, or update that passes or cannot be decoded → possible insert.
pub fn classify<T, P>(ev: &ChangeEvent, predicate: P) -> Reaction
where
    T: DeserializeOwned,
    P: Fn(&T) -> bool,
{
    match ev.kind {
        ChangeKind::Delete => Reaction::Remove(ev.row_id),
        ChangeKind::Insert => Reaction::PossibleInsert,
        ChangeKind::Update => {
            let decoded = ev
                .new
                .as_ref()
                .and_then(|v| serde_json::from_value::<T>(v.clone()).ok());
            match decoded {
                Some(row) if !predicate(&row) => Reaction::Remove(ev.row_id),
                _ => Reaction::PossibleInsert,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_remove(&self, id: Uuid);

    async fn on_possible_insert(&self);
}

/// A live `on_change` registration. Dropping it stops delivery.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Watch `table` for rows of type `T`, reacting through `handler`.
    ///
    /// A receiver that falls behind the feed has lost events it cannot
    /// recover; it falls back to a possible-insert re-query.
    pub fn on_change<T, P, H>(feed: &ChangeFeed, table: Table, predicate: P, handler: Arc<H>) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
        H: ChangeHandler + ?Sized + 'static,
    {
        let mut rx = feed.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.table == table => match classify::<T, _>(&ev, &predicate) {
                        Reaction::Remove(id) => handler.on_remove(id).await,
                        Reaction::PossibleInsert => handler.on_possible_insert().await,
                    },
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(table = table.as_str(), skipped, "change feed lagged");
                        handler.on_possible_insert().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
