pub mod config;
pub mod doctor;
pub mod migrate;
pub mod status;

use serde::Serialize;

/// Failure classes shared by every subcommand, each bound to its contract
/// exit code so callers can script against either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    ThreadNotFound,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::ConfigValidation => "config_validation",
            FailureClass::RuntimeInit => "runtime_init",
            FailureClass::DbConnectivity => "db_connectivity",
            FailureClass::Migration => "migration",
            FailureClass::ThreadNotFound => "thread_not_found",
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            FailureClass::ConfigValidation => 2,
            FailureClass::RuntimeInit => 3,
            FailureClass::DbConnectivity => 4,
            FailureClass::Migration => 5,
            FailureClass::ThreadNotFound => 6,
        }
    }
}

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

    pub fn failure(command: &str, class: FailureClass, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(class.as_str().to_string()),
            message: message.into(),
        };
        Self { exit_code: class.exit_code(), output: serialize_payload(payload) }
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
    use super::FailureClass;

    #[test]
    fn failure_classes_map_to_stable_exit_codes() {
        let classes = [
            (FailureClass::ConfigValidation, "config_validation", 2),
            (FailureClass::RuntimeInit, "runtime_init", 3),
            (FailureClass::DbConnectivity, "db_connectivity", 4),
            (FailureClass::Migration, "migration", 5),
            (FailureClass::ThreadNotFound, "thread_not_found", 6),
        ];
        for (class, name, code) in classes {
            assert_eq!(class.as_str(), name);
            assert_eq!(class.exit_code(), code);
        }
    }
}
