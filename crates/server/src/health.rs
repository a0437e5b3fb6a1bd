use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use kopi_core::config::LlmProvider;
use kopi_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    llm_provider: LlmProvider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub completion: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, llm_provider: LlmProvider) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, llm_provider })
}

/// Readiness follows the database only. A disabled completion provider is
/// reported but does not degrade the service.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "kopi-server routes mounted".to_string() },
        database,
        completion: completion_check(state.llm_provider),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn completion_check(provider: LlmProvider) -> HealthCheck {
    match provider {
        LlmProvider::Disabled => HealthCheck {
            status: "disabled",
            detail: "outlet lookup and product summaries are unavailable".to_string(),
        },
        provider => HealthCheck {
            status: "ready",
            detail: format!("completion provider `{}` configured", provider.as_str()),
        },
    }
}
