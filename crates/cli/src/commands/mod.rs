pub mod check_expiry;
pub mod config;
pub mod doctor;
pub mod export;
pub mod migrate;
pub mod quote;
pub mod seed;

use policydesk_core::config::{AppConfig, LoadOptions};
use policydesk_core::errors::ApplicationError;
use policydesk_db::{connect_with_settings, migrations, DbPool};
use serde::Serialize;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// Failure raised inside a command body: (error class, message, exit code).
pub(crate) type StepError = (&'static str, String, u8);

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, StepError> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

pub(crate) fn application_failure(error: ApplicationError) -> StepError {
    match error {
        ApplicationError::NotFound(message) => ("not_found", message, 7),
        ApplicationError::Forbidden(message) => ("forbidden", message, 8),
        ApplicationError::Domain(error) => ("invalid_request", error.to_string(), 9),
        ApplicationError::InvalidRequest(message) => ("invalid_request", message, 9),
        ApplicationError::Conflict(message) => ("conflict", message, 9),
        ApplicationError::Persistence(message) => ("persistence", message, 10),
        ApplicationError::Integration(message) => ("integration", message, 11),
        ApplicationError::Configuration(message) => ("config_validation", message, 2),
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use policydesk_core::errors::ApplicationError;

    use super::{application_failure, CommandResult};

    #[test]
    fn failure_payload_carries_error_class() {
        let result = CommandResult::failure("quote", "forbidden", "customer `CUS-1`", 8);
        let payload: serde_json::Value =
            serde_json::from_str(&result.output).expect("valid json payload");

        assert_eq!(result.exit_code, 8);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "forbidden");
    }

    #[test]
    fn application_errors_map_to_distinct_exit_codes() {
        let (class, _, code) = application_failure(ApplicationError::NotFound("x".to_string()));
        assert_eq!((class, code), ("not_found", 7));
        let (class, _, code) = application_failure(ApplicationError::Forbidden("x".to_string()));
        assert_eq!((class, code), ("forbidden", 8));
        let (class, _, code) = application_failure(ApplicationError::Persistence("x".to_string()));
        assert_eq!((class, code), ("persistence", 10));
    }
}
