use async_trait::async_trait;
use thiserror::Error;

use kopi_core::domain::product::{ProductId, ProductRecord};
use kopi_core::domain::session::{SessionState, ThreadId};

pub mod memory;
pub mod outlet;
pub mod product;
pub mod session;

pub use memory::{InMemoryProductRepository, InMemorySessionRepository};
pub use outlet::SqlOutletRepository;
pub use product::{rank_by_term_overlap, SqlProductRepository};
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("background task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<ProductRecord>, RepositoryError>;
    async fn save(&self, product: ProductRecord) -> Result<(), RepositoryError>;
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ProductRecord>, RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}

/// Per-thread conversation state. `get` of an unknown thread yields `None`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, RepositoryError>;
    async fn put(&self, thread_id: &ThreadId, state: SessionState) -> Result<(), RepositoryError>;
}
