use std::collections::HashMap;

use tokio::sync::RwLock;

use kopi_core::domain::product::{ProductId, ProductRecord};
use kopi_core::domain::session::{SessionState, ThreadId};

use super::product::rank_by_term_overlap;
use super::{ProductRepository, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, SessionState>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(thread_id.as_str()).cloned())
    }

    async fn put(&self, thread_id: &ThreadId, state: SessionState) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(thread_id.0.clone(), state);
        Ok(())
    }
}

/// Catalog kept in insertion order so ranking ties resolve the same way as SQL.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<ProductRecord>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.id == id).cloned())
    }

    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|existing| existing.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ProductRecord>, RepositoryError> {
        let products = self.products.read().await;
        Ok(rank_by_term_overlap(query, products.clone(), k))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.products.read().await.len() as u64)
    }
}
