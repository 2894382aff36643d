//! Read-through cache of the active product catalog.
//!
//! A background feed keeps the cache fresh: it listens on NATS for product
//! change notices when a broker is configured, otherwise it polls the store.
//! Every refresh is republished as a [`CatalogEvent`].

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::aggregates::Product;
use crate::domain::events::CatalogEvent;
use crate::store::{RecordStore, StoreError};

/// Subject the dashboard publishes to after editing products.
pub const PRODUCTS_CHANGED_SUBJECT: &str = "catalog.products.changed";

/// Where change notices come from.
pub enum ChangeSource {
    Nats(async_nats::Subscriber),
    Poll(Duration),
}

pub struct CatalogCache {
    store: Arc<dyn RecordStore>,
    products: RwLock<Arc<Vec<Product>>>,
    updates: broadcast::Sender<CatalogEvent>,
}

impl CatalogCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self { store, products: RwLock::new(Arc::new(Vec::new())), updates }
    }

    pub async fn products(&self) -> Arc<Vec<Product>> { self.products.read().await.clone() }

    pub async fn product(&self, id: i64) -> Option<Product> {
        self.products.read().await.iter().find(|p| p.id == id).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> { self.updates.subscribe() }

    /// Reloads active products and announces the new count.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let products = self.store.active_products().await?;
        let product_count = products.len();
        *self.products.write().await = Arc::new(products);
        debug!(product_count, "Catalog refreshed");
        // no subscribers is fine
        let _ = self.updates.send(CatalogEvent::Updated { product_count });
        Ok(product_count)
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Catalog refresh failed, keeping previous products");
        }
    }

    /// Runs until the change source ends.
    pub fn spawn_feed(self: Arc<Self>, source: ChangeSource) -> JoinHandle<()> {
        tokio::spawn(async move {
            match source {
                ChangeSource::Nats(mut subscriber) => {
                    info!(subject = PRODUCTS_CHANGED_SUBJECT, "Listening for catalog changes");
                    self.refresh_logged().await;
                    while subscriber.next().await.is_some() {
                        self.refresh_logged().await;
                    }
                    warn!("Catalog change subscription closed");
                }
                ChangeSource::Poll(every) => {
                    info!(interval_secs = every.as_secs(), "Polling catalog for changes");
                    let mut interval = tokio::time::interval(every);
                    loop {
                        interval.tick().await;
                        self.refresh_logged().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::sample;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_refresh_loads_active_products() {
        let store = Arc::new(MemoryStore::new().with_products(vec![sample(1, 10), sample(2, 20)]));
        let cache = CatalogCache::new(store);
        assert!(cache.products().await.is_empty());
        assert_eq!(cache.refresh().await.unwrap(), 2);
        assert_eq!(cache.product(2).await.unwrap().price, crate::domain::value_objects::Money::rupees(20));
        assert!(cache.product(9).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_feed_republishes_updates() {
        let store = Arc::new(MemoryStore::new().with_products(vec![sample(1, 10)]));
        let cache = Arc::new(CatalogCache::new(store.clone()));
        let mut rx = cache.subscribe();
        let feed = cache.clone().spawn_feed(ChangeSource::Poll(Duration::from_secs(30)));

        assert_eq!(rx.recv().await.unwrap(), CatalogEvent::Updated { product_count: 1 });
        store.replace_products(vec![sample(1, 10), sample(2, 10), sample(3, 10)]).await;
        assert_eq!(rx.recv().await.unwrap(), CatalogEvent::Updated { product_count: 3 });
        assert_eq!(cache.products().await.len(), 3);
        feed.abort();
    }
}
