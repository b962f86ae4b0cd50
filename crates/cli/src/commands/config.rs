use nestplan_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let lines = vec![
        "effective config (precedence: overrides > env > file > default):".to_string(),
        render_line("database.url", &config.database.url),
        render_line("database.max_connections", &config.database.max_connections.to_string()),
        render_line("database.timeout_secs", &config.database.timeout_secs.to_string()),
        render_line("llm.model", &config.llm.model),
        render_line("llm.api_key", &redact_key(config.llm.api_key.as_ref())),
        render_line("llm.timeout_secs", &config.llm.timeout_secs.to_string()),
        render_line("llm.max_retries", &config.llm.max_retries.to_string()),
        render_line("recipe_api.base_url", &config.recipe_api.base_url),
        render_line("recipe_api.api_key", &redact_key(config.recipe_api.api_key.as_ref())),
        render_line("recipe_api.max_retries", &config.recipe_api.max_retries.to_string()),
        render_line("workflow.step_ceiling", &config.workflow.step_ceiling.to_string()),
        render_line("workflow.candidate_limit", &config.workflow.candidate_limit.to_string()),
        render_line("logging.level", &config.logging.level),
        render_line("logging.format", &format!("{:?}", config.logging.format)),
    ];

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("- {key} = {value}")
}

fn redact_key(key: Option<&SecretString>) -> String {
    let Some(key) = key else {
        return "<unset>".to_string();
    };

    let exposed = key.expose_secret().trim();
    if exposed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = exposed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{redact_key, render_line};
    use secrecy::SecretString;

    #[test]
    fn prefixed_keys_keep_only_the_prefix() {
        let key = SecretString::from("sk-super-secret-value");
        assert_eq!(redact_key(Some(&key)), "sk-***");
    }

    #[test]
    fn unprefixed_keys_are_fully_redacted() {
        let key = SecretString::from("supersecretvalue");
        assert_eq!(redact_key(Some(&key)), "<redacted>");
    }

    #[test]
    fn missing_keys_render_as_unset() {
        assert_eq!(redact_key(None), "<unset>");
        assert_eq!(render_line("llm.api_key", "<unset>"), "- llm.api_key = <unset>");
    }
}
