//! Live role view over the products table.
//!
//! Holds the rows of one [`ProductView`], kept current by the change feed
//! (push-invalidate, pull-refresh). Admin and finance decisions remove the
//! row locally before the write settles and restore the queue if it fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use sf_catalog::ProductView;
use sf_schemas::{Product, Table};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::WorkflowResult;
use crate::feed::{ChangeFeed, ChangeHandler, Subscription};
use crate::optimistic::OptimisticCommand;
use crate::ports::Backend;

pub struct QueueView {
    view: ProductView,
    backend: Arc<dyn Backend>,
    limit: i64,
    rows: Mutex<Vec<Product>>,
    loading: AtomicBool,
}

impl QueueView {
    pub fn new(view: ProductView, backend: Arc<dyn Backend>, limit: i64) -> Arc<Self> {
        Arc::new(Self {
            view,
            backend,
            limit,
            rows: Mutex::new(Vec::new()),
            loading: AtomicBool::new(false),
        })
    }

    pub fn view(&self) -> ProductView {
        self.view
    }

    /// Initial load. The only point at which the view reports loading.
    pub async fn load(&self) -> WorkflowResult<()> {
        self.loading.store(true, Ordering::SeqCst);
        let res = self.refresh().await;
        self.loading.store(false, Ordering::SeqCst);
        res
    }

    /// Background re-query.
    pub async fn refresh(&self) -> WorkflowResult<()> {
        let filter = self.view.filter().limit(self.limit);
        let fresh = self.backend.list_products(&filter).await?;
        *self.rows.lock().await = fresh;
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn rows(&self) -> Vec<Product> {
        self.rows.lock().await.clone()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.rows.lock().await.iter().any(|p| p.id == id)
    }

    /// Register on the feed. Keep the returned handle alive.
    pub fn subscribe(self: &Arc<Self>, feed: &ChangeFeed) -> Subscription {
        let view = self.view;
        Subscription::on_change::<Product, _, _>(
            feed,
            Table::Products,
            move |p| view.matches(p),
            Arc::clone(self),
        )
    }

    /// Drop `id` from the view now; put that row back if `remote` fails.
    ///
    /// Only the removed row is restored, at its old position or the end, and
    /// only if nothing reinserted it meanwhile. Feed removals that land while
    /// `remote` is pending stay applied.
    pub async fn remove_optimistically<T>(
        &self,
        id: Uuid,
        remote: BoxFuture<'static, WorkflowResult<T>>,
    ) -> WorkflowResult<T> {
        OptimisticCommand::new(
            move |rows: &mut Vec<Product>| {
                let at = rows.iter().position(|p| p.id == id)?;
                Some((at, rows.remove(at)))
            },
            |rows: &mut Vec<Product>, removed| {
                if let Some((at, product)) = removed {
                    if !rows.iter().any(|p| p.id == product.id) {
                        let at = at.min(rows.len());
                        rows.insert(at, product);
                    }
                }
            },
            remote,
        )
        .run(&self.rows)
        .await
    }
}

#[async_trait::async_trait]
impl ChangeHandler for QueueView {
    async fn on_remove(&self, id: Uuid) {
        self.rows.lock().await.retain(|p| p.id != id);
    }

    async fn on_possible_insert(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(view = self.view.as_str(), error = %e, "queue refresh failed");
        }
    }
}
