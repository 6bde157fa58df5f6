use std::env;
use std::fs;
use std::path::Path;

use policydesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: Option<&str>| {
        field_source(key_path, env_key, doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string(),
    ];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", Some("POLICYDESK_DATABASE_URL")),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", Some("POLICYDESK_DATABASE_MAX_CONNECTIONS")),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", Some("POLICYDESK_DATABASE_TIMEOUT_SECS")),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", Some("POLICYDESK_SERVER_BIND_ADDRESS")),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", Some("POLICYDESK_SERVER_PORT")),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", Some("POLICYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS")),
    ));

    lines.push(render_line(
        "quoting.mode",
        &format!("{:?}", config.quoting.mode),
        source("quoting.mode", Some("POLICYDESK_QUOTING_MODE")),
    ));
    lines.push(render_line(
        "quoting.per_source_timeout_ms",
        &config
            .quoting
            .per_source_timeout_ms
            .map(|timeout| timeout.to_string())
            .unwrap_or_else(|| "<unset>".to_string()),
        source("quoting.per_source_timeout_ms", Some("POLICYDESK_QUOTING_PER_SOURCE_TIMEOUT_MS")),
    ));
    lines.push(render_line(
        "quoting.seed",
        &config.quoting.seed.map(|seed| seed.to_string()).unwrap_or_else(|| "<unset>".to_string()),
        source("quoting.seed", Some("POLICYDESK_QUOTING_SEED")),
    ));

    let insurers_source = source("quoting.insurers", None);
    for (index, insurer) in config.quoting.insurers.iter().enumerate() {
        let prefix = format!("quoting.insurers[{index}]");
        lines.push(render_line(
            &format!("{prefix}.company_name"),
            &format!("{} ({})", insurer.company_name, insurer.code),
            insurers_source.clone(),
        ));
        lines.push(render_line(
            &format!("{prefix}.endpoint"),
            insurer.endpoint.as_deref().unwrap_or("<unset>"),
            insurers_source.clone(),
        ));

        let api_key_env = insurer.api_key_env_var();
        let api_key = insurer
            .api_key
            .as_ref()
            .map(|key| redact_secret(key.expose_secret()))
            .unwrap_or_else(|| "<unset>".to_string());
        let api_key_source = if env::var_os(&api_key_env).is_some() {
            format!("env ({api_key_env})")
        } else {
            insurers_source.clone()
        };
        lines.push(render_line(&format!("{prefix}.api_key"), &api_key, api_key_source));
    }

    lines.push(render_line(
        "expiry.lead_days",
        &config.expiry.lead_days.to_string(),
        source("expiry.lead_days", Some("POLICYDESK_EXPIRY_LEAD_DAYS")),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("POLICYDESK_LOGGING_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", Some("POLICYDESK_LOGGING_FORMAT")),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most the last four characters of long keys.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn short_secrets_are_fully_redacted() {
        assert_eq!(redact_secret("abc123"), "<redacted>");
        assert_eq!(redact_secret("   "), "<empty>");
    }

    #[test]
    fn long_secrets_keep_only_a_short_tail() {
        assert_eq!(redact_secret("allianz-live-key-9f3a"), "***9f3a");
    }

    #[test]
    fn nested_key_paths_resolve_against_the_file() {
        let doc: Value = "[quoting]\nmode = \"live\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "quoting.mode"));
        assert!(!contains_path(&doc, "quoting.seed"));
    }
}
