use crate::commands::{CommandResult, FailureClass};
use nestplan_core::config::{AppConfig, LoadOptions};
use nestplan_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    match apply_migrations() {
        Ok(summary) => CommandResult::success("migrate", summary),
        Err((class, message)) => CommandResult::failure("migrate", class, message),
    }
}

fn apply_migrations() -> Result<String, (FailureClass, String)> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|e| (FailureClass::ConfigValidation, format!("configuration issue: {e}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |e| (FailureClass::RuntimeInit, format!("failed to initialize async runtime: {e}")),
    )?;

    runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|e| (FailureClass::DbConnectivity, e.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|e| (FailureClass::Migration, e.to_string()))?;
        pool.close().await;
        Ok(format!("applied pending migrations to `{}`", config.database.url))
    })
}
