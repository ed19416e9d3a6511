use anyhow::{Context, Result};

use todoflow::config::Config;

/// Apply the sqlx migrations for both owned databases.
pub async fn migrate(config: Config) -> Result<()> {
    let command_pool = todoflow::create_pool(&config.database.command_url, 1).await?;
    sqlx::migrate!("migrations/command")
        .run(&command_pool)
        .await
        .context("command database migration failed")?;
    tracing::info!(url = %config.database.command_url, "command database migrated");

    let audit_pool = todoflow::create_pool(&config.database.audit_url, 1).await?;
    sqlx::migrate!("migrations/audit")
        .run(&audit_pool)
        .await
        .context("audit database migration failed")?;
    tracing::info!(url = %config.database.audit_url, "audit database migrated");

    Ok(())
}
