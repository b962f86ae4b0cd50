use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub recipe_api: RecipeApiConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_secs: u64,
    pub retry_cap_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecipeApiConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub max_retries: u32,
    pub rate_limit_base_secs: u64,
    pub rate_limit_cap_secs: u64,
    pub quota_base_secs: u64,
    pub quota_cap_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Hard ceiling on engine steps per thread; exceeding it is fatal.
    pub step_ceiling: u32,
    pub candidate_limit: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://nestplan.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                timeout_secs: 60,
                max_retries: 3,
                retry_base_secs: 10,
                retry_cap_secs: 60,
            },
            recipe_api: RecipeApiConfig {
                base_url: "https://api.spoonacular.com".to_string(),
                api_key: None,
                max_retries: 3,
                rate_limit_base_secs: 30,
                rate_limit_cap_secs: 60,
                quota_base_secs: 30,
                quota_cap_secs: 240,
            },
            workflow: WorkflowConfig { step_ceiling: 250, candidate_limit: 3 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("nestplan.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_base_secs) = llm.retry_base_secs {
                self.llm.retry_base_secs = retry_base_secs;
            }
            if let Some(retry_cap_secs) = llm.retry_cap_secs {
                self.llm.retry_cap_secs = retry_cap_secs;
            }
        }

        if let Some(recipe_api) = patch.recipe_api {
            if let Some(base_url) = recipe_api.base_url {
                self.recipe_api.base_url = base_url;
            }
            if let Some(api_key_value) = recipe_api.api_key {
                self.recipe_api.api_key = Some(secret_value(api_key_value));
            }
            if let Some(max_retries) = recipe_api.max_retries {
                self.recipe_api.max_retries = max_retries;
            }
            if let Some(rate_limit_base_secs) = recipe_api.rate_limit_base_secs {
                self.recipe_api.rate_limit_base_secs = rate_limit_base_secs;
            }
            if let Some(rate_limit_cap_secs) = recipe_api.rate_limit_cap_secs {
                self.recipe_api.rate_limit_cap_secs = rate_limit_cap_secs;
            }
            if let Some(quota_base_secs) = recipe_api.quota_base_secs {
                self.recipe_api.quota_base_secs = quota_base_secs;
            }
            if let Some(quota_cap_secs) = recipe_api.quota_cap_secs {
                self.recipe_api.quota_cap_secs = quota_cap_secs;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(step_ceiling) = workflow.step_ceiling {
                self.workflow.step_ceiling = step_ceiling;
            }
            if let Some(candidate_limit) = workflow.candidate_limit {
                self.workflow.candidate_limit = candidate_limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NESTPLAN_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("NESTPLAN_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("NESTPLAN_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("NESTPLAN_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("NESTPLAN_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("NESTPLAN_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("NESTPLAN_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("NESTPLAN_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("NESTPLAN_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("NESTPLAN_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("NESTPLAN_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("NESTPLAN_RECIPE_API_BASE_URL") {
            self.recipe_api.base_url = value;
        }
        if let Some(value) = read_env("NESTPLAN_RECIPE_API_KEY") {
            self.recipe_api.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("NESTPLAN_RECIPE_API_MAX_RETRIES") {
            self.recipe_api.max_retries = parse_u32("NESTPLAN_RECIPE_API_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("NESTPLAN_WORKFLOW_STEP_CEILING") {
            self.workflow.step_ceiling = parse_u32("NESTPLAN_WORKFLOW_STEP_CEILING", &value)?;
        }

        let log_level =
            read_env("NESTPLAN_LOGGING_LEVEL").or_else(|| read_env("NESTPLAN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NESTPLAN_LOGGING_FORMAT").or_else(|| read_env("NESTPLAN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_recipe_api(&self.recipe_api)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("nestplan.toml"), PathBuf::from("config/nestplan.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if let Some(api_key) = &llm.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_recipe_api(recipe_api: &RecipeApiConfig) -> Result<(), ConfigError> {
    let base_url = recipe_api.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "recipe_api.base_url must start with http:// or https://".to_string(),
        ));
    }
    if let Some(api_key) = &recipe_api.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "recipe_api.api_key must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.step_ceiling == 0 {
        return Err(ConfigError::Validation(
            "workflow.step_ceiling must be greater than zero".to_string(),
        ));
    }
    if workflow.candidate_limit == 0 {
        return Err(ConfigError::Validation(
            "workflow.candidate_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    recipe_api: Option<RecipeApiPatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_secs: Option<u64>,
    retry_cap_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecipeApiPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    max_retries: Option<u32>,
    rate_limit_base_secs: Option<u64>,
    rate_limit_cap_secs: Option<u64>,
    quota_base_secs: Option<u64>,
    quota_cap_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    step_ceiling: Option<u32>,
    candidate_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_cleanly() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://nestplan.db", "default database url")?;
        ensure(config.workflow.step_ceiling == 250, "default step ceiling")?;
        ensure(config.workflow.candidate_limit == 3, "default candidate limit")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default log format")
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("NESTPLAN_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("nestplan.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[llm]
model = "from-file-model"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.database.url == "sqlite://from-env.db", "env database url should win")?;
            ensure(config.llm.model == "from-file-model", "file llm model should apply")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_vars(&["NESTPLAN_DATABASE_URL"]);
        result
    }

    #[test]
    fn non_sqlite_database_url_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("NESTPLAN_DATABASE_URL", "postgres://nope");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let mentions_url = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("database.url")
            );
            ensure(mentions_url, "validation failure should mention database.url")
        })();

        clear_vars(&["NESTPLAN_DATABASE_URL"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("NESTPLAN_LLM_API_KEY", "sk-secret-llm-key");
        env::set_var("NESTPLAN_RECIPE_API_KEY", "spn-secret-api-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-llm-key"), "debug must not contain llm key")?;
            ensure(!debug.contains("spn-secret-api-key"), "debug must not contain api key")?;
            ensure(
                config
                    .llm
                    .api_key
                    .as_ref()
                    .map(|key| key.expose_secret() == "sk-secret-llm-key")
                    .unwrap_or(false),
                "llm key should still be readable through expose_secret",
            )?;
            Ok(())
        })();

        clear_vars(&["NESTPLAN_LLM_API_KEY", "NESTPLAN_RECIPE_API_KEY"]);
        result
    }

    #[test]
    fn zero_step_ceiling_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("NESTPLAN_WORKFLOW_STEP_CEILING", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let mentions_ceiling = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("step_ceiling")
            );
            ensure(mentions_ceiling, "validation failure should mention step_ceiling")
        })();

        clear_vars(&["NESTPLAN_WORKFLOW_STEP_CEILING"]);
        result
    }
}
