//! Backing services and the chat endpoint, all under `/api/v1`.
//!
//! - `GET  /api/v1/calculator?expr=`  evaluate an arithmetic expression
//! - `GET  /api/v1/products?query=&k=` rank the drinkware catalog
//! - `GET  /api/v1/outlets?query=`    completion-written, guarded outlet lookup
//! - `POST /api/v1/chat`              run one orchestrator turn

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use kopi_agent::{AgentRuntime, LlmClient};
use kopi_db::{DbPool, ProductRepository, SqlOutletRepository, SqlProductRepository};

pub mod calculator;
pub mod chat;
pub mod outlets;
pub mod products;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub products: Arc<dyn ProductRepository>,
    pub outlets: Arc<SqlOutletRepository>,
    pub llm: Option<Arc<dyn LlmClient>>,
}

impl ApiState {
    pub fn new(db_pool: DbPool, runtime: Arc<AgentRuntime>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            runtime,
            products: Arc::new(SqlProductRepository::new(db_pool.clone())),
            outlets: Arc::new(SqlOutletRepository::new(db_pool)),
            llm,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { detail: detail.into() }))
}

/// Missing or malformed query strings answer 400 with the extractor's reason.
fn query_error(rejection: QueryRejection) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/calculator", get(calculator::calculate))
        .route("/api/v1/products", get(products::search))
        .route("/api/v1/outlets", get(outlets::lookup))
        .route("/api/v1/chat", post(chat::chat))
        .with_state(state)
}
