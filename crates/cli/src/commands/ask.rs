use std::sync::Arc;

use kopi_agent::{client_from_config, AgentRuntime, ToolRegistry};
use kopi_core::config::AppConfig;
use kopi_core::domain::session::ThreadId;
use kopi_core::errors::ApplicationError;
use kopi_db::SqlSessionRepository;
use serde_json::json;
use uuid::Uuid;

use crate::commands::{block_on, load_config, open_database, CommandResult, Failure};

pub fn run(session: &str, message: &str) -> CommandResult {
    match load_config("ask") {
        Ok(config) => run_with_config(&config, session, message),
        Err(failure) => failure,
    }
}

/// Runs one chat turn against the persisted session, calling the configured services.
pub fn run_with_config(config: &AppConfig, session: &str, message: &str) -> CommandResult {
    block_on("ask", async {
        let pool = open_database(config).await?;
        let runtime = AgentRuntime::new(
            Arc::new(SqlSessionRepository::new(pool.clone())),
            ToolRegistry::from_config(&config.services),
            client_from_config(&config.llm),
        );

        let correlation_id = Uuid::new_v4().to_string();
        let turn = runtime
            .handle_message(&ThreadId(session.to_string()), message, &correlation_id)
            .await;
        pool.close().await;

        let outcome = turn.map_err(turn_failure)?;
        let details = json!({
            "session_id": session,
            "intent": outcome.intent,
            "tool": outcome.tool,
            "error": outcome.error,
            "slots": outcome.slots,
        });

        Ok(CommandResult::success_with("ask", outcome.reply, Some(details)))
    })
}

fn turn_failure(error: ApplicationError) -> Failure {
    match error {
        ApplicationError::Domain(domain) => ("invalid_input", domain.to_string(), 2),
        other => ("turn_failed", other.to_string(), 8),
    }
}

#[cfg(test)]
mod tests {
    use kopi_core::config::AppConfig;
    use kopi_core::errors::{ApplicationError, DomainError};
    use serde_json::Value;

    use super::{run_with_config, turn_failure};

    fn config_for(directory: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", directory.path().join("kopi.db").display());
        config
    }

    #[test]
    fn greeting_turn_is_answered_without_services() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = config_for(&directory);

        let result = run_with_config(&config, "cli-1", "hello");
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert_eq!(payload["command"], "ask");
        assert!(payload["message"].as_str().expect("reply").starts_with("Hi!"));
        assert_eq!(payload["details"]["intent"], "chitchat");
        assert!(payload["details"]["tool"].is_null());
    }

    #[test]
    fn outlet_question_without_city_asks_for_one() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = config_for(&directory);

        let first = run_with_config(&config, "cli-2", "Where is your outlet?");
        let first: Value = serde_json::from_str(&first.output).expect("json");
        assert_eq!(first["message"], "Which city do you mean? (e.g., Petaling Jaya)");
        assert_eq!(first["details"]["intent"], "outlet_query");
        assert!(first["details"]["tool"].is_null());

        let second = run_with_config(&config, "cli-2", "Where is your outlet?");
        let second: Value = serde_json::from_str(&second.output).expect("json");
        assert_eq!(second["message"], first["message"]);
    }

    #[test]
    fn empty_message_is_invalid_input() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = config_for(&directory);

        let result = run_with_config(&config, "cli-3", "   ");
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["error_class"], "invalid_input");
    }

    #[test]
    fn persistence_errors_use_their_own_exit_code() {
        let (class, _, code) = turn_failure(ApplicationError::Persistence("disk full".to_string()));
        assert_eq!((class, code), ("turn_failed", 8));

        let (class, _, code) = turn_failure(DomainError::EmptySessionId.into());
        assert_eq!((class, code), ("invalid_input", 2));
    }
}
