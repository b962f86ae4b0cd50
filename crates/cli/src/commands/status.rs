use crate::commands::{CommandResult, FailureClass};
use nestplan_core::config::{AppConfig, LoadOptions};
use nestplan_core::workflow::state::WorkflowState;
use nestplan_core::ThreadId;
use nestplan_db::repositories::{CheckpointRepository, SqlCheckpointRepository};
use nestplan_db::{connect_with_config, migrations};

pub fn run(thread_id: &str) -> CommandResult {
    match load_status(thread_id) {
        Ok(message) => CommandResult::success("status", message),
        Err((class, message)) => CommandResult::failure("status", class, message),
    }
}

fn load_status(thread_id: &str) -> Result<String, (FailureClass, String)> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|e| (FailureClass::ConfigValidation, format!("configuration issue: {e}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |e| (FailureClass::RuntimeInit, format!("failed to initialize async runtime: {e}")),
    )?;

    runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|e| (FailureClass::DbConnectivity, e.to_string()))?;
        // The schema may not exist yet on a fresh database; a missing table
        // must read as "no such thread", not a connectivity error.
        migrations::run_pending(&pool)
            .await
            .map_err(|e| (FailureClass::Migration, e.to_string()))?;

        let checkpoints = SqlCheckpointRepository::new(pool);
        let loaded = checkpoints
            .load(&ThreadId(thread_id.to_string()))
            .await
            .map_err(|e| (FailureClass::DbConnectivity, e.to_string()))?;

        match loaded {
            Some(state) => Ok(render_state(&state)),
            None => Err((
                FailureClass::ThreadNotFound,
                format!("no checkpoint found for thread `{thread_id}`"),
            )),
        }
    })
}

fn render_state(state: &WorkflowState) -> String {
    let mut message = format!(
        "thread {}: status={} step={:?} steps_executed={}",
        state.thread_id.0,
        state.status.as_str(),
        state.step,
        state.steps_executed,
    );
    if let Some(hitl_step) = &state.hitl_step_required {
        message.push_str(&format!(" awaiting={hitl_step:?}"));
    }
    if let Some(error_message) = &state.error_message {
        message.push_str(&format!(" error={error_message}"));
    }
    message
}
