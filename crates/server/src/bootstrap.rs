use std::sync::Arc;

use axum::Router;
use kopi_agent::{client_from_config, AgentRuntime, LlmClient, ToolRegistry};
use kopi_core::config::{AppConfig, ConfigError, LoadOptions};
use kopi_db::{connect_from_config, migrations, DbPool, SqlSessionRepository};
use thiserror::Error;
use tracing::info;

use crate::api::{self, ApiState};
use crate::health;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
    pub llm: Option<Arc<dyn LlmClient>>,
}

impl Application {
    pub fn router(&self) -> Router {
        let state = ApiState::new(self.db_pool.clone(), self.runtime.clone(), self.llm.clone());
        health::router(self.db_pool.clone(), self.config.llm.provider).merge(api::router(state))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        config = %config.redacted_summary(),
        "starting application bootstrap"
    );

    let db_pool = connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "database migrations applied"
    );

    let llm = client_from_config(&config.llm);
    let tools = ToolRegistry::from_config(&config.services);
    info!(
        event_name = "system.bootstrap.orchestrator_ready",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        llm_provider = config.llm.provider.as_str(),
        services_base_url = %config.services.base_url,
        tools = tools.len(),
        "orchestrator wired"
    );

    let sessions = Arc::new(SqlSessionRepository::new(db_pool.clone()));
    let runtime = Arc::new(AgentRuntime::new(sessions, tools, llm.clone()));

    Ok(Application { config, db_pool, runtime, llm })
}
