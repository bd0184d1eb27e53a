use secrecy::ExposeSecret;
use supportdesk_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];

    lines.push(render_line("database.url", &config.database.url));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
    ));
    lines.push(render_line("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(render_line("llm.provider", &format!("{:?}", config.llm.provider)));
    lines.push(render_line(
        "llm.api_key",
        &config
            .llm
            .api_key
            .as_ref()
            .map(|key| redact_secret(key.expose_secret()))
            .unwrap_or_else(|| "(unset)".to_string()),
    ));
    lines.push(render_line("llm.base_url", &config.llm.base_url));
    lines.push(render_line("llm.model", &config.llm.model));
    lines.push(render_line("llm.embedding_model", &config.llm.embedding_model));
    lines.push(render_line("llm.timeout_secs", &config.llm.timeout_secs.to_string()));

    lines.push(render_line("server.bind_address", &config.server.bind_address));
    lines.push(render_line("server.port", &config.server.port.to_string()));

    lines.push(render_line(
        "auth.agent_secret",
        &config
            .auth
            .agent_secret
            .as_ref()
            .map(|secret| redact_secret(secret.expose_secret()))
            .unwrap_or_else(|| "(unset, agent surface locked)".to_string()),
    ));
    lines.push(render_line(
        "auth.admin_secret",
        &config
            .auth
            .admin_secret
            .as_ref()
            .map(|secret| redact_secret(secret.expose_secret()))
            .unwrap_or_else(|| "(unset, admin surface locked)".to_string()),
    ));

    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact_secret(value: &str) -> String {
    if value.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &value[..4])
}
