use chrono::Utc;

use kopi_core::domain::session::{SessionState, ThreadId};

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn get(&self, thread_id: &ThreadId) -> Result<Option<SessionState>, RepositoryError> {
        let state_json: Option<String> =
            sqlx::query_scalar("SELECT state_json FROM chat_sessions WHERE thread_id = ?")
                .bind(thread_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        state_json
            .map(|json| {
                serde_json::from_str::<SessionState>(&json)
                    .map_err(|error| RepositoryError::Decode(error.to_string()))
            })
            .transpose()
    }

    async fn put(&self, thread_id: &ThreadId, state: SessionState) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_string(&state)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO chat_sessions (thread_id, state_json, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
        )
        .bind(thread_id.as_str())
        .bind(state_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kopi_core::domain::message::Message;
    use kopi_core::domain::session::{SessionState, ThreadId};
    use kopi_core::domain::slots::{SlotKey, Slots};

    use super::SqlSessionRepository;
    use crate::repositories::SessionRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn put_then_get_returns_latest_state() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        let repo = SqlSessionRepository::new(pool);
        let thread = ThreadId("thread-1".to_string());

        assert!(repo.get(&thread).await.expect("get").is_none());

        let mut slots = Slots::default();
        slots.set(SlotKey::City, "Kuala Lumpur");
        let mut state = SessionState { messages: Vec::new(), slots };
        state.push(Message::user("outlets in kl"));
        repo.put(&thread, state.clone()).await.expect("first put");

        state.push(Message::assistant("Which outlet in Kuala Lumpur? (e.g., SS2)"));
        repo.put(&thread, state.clone()).await.expect("second put");

        let loaded = repo.get(&thread).await.expect("get").expect("state should exist");
        assert_eq!(loaded, state);
        assert_eq!(loaded.slots.get(SlotKey::City), Some("Kuala Lumpur"));
    }
}
