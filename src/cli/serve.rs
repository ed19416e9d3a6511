use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::Router;
use clap::ValueEnum;
use tower_http::trace::TraceLayer;

use todoflow::config::Config;
use todoflow_shared::sidecar::{
    self, EventPublisher, InvocationClient, JobsClient, StateClient,
};
use todoflow_shared::IdempotencyGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Service {
    Command,
    Recurring,
    Notification,
    Gateway,
    Audit,
}

impl Service {
    fn name(&self) -> &'static str {
        match self {
            Service::Command => "command-service",
            Service::Recurring => "recurring-service",
            Service::Notification => "notification-service",
            Service::Gateway => "websocket-gateway",
            Service::Audit => "audit-service",
        }
    }

    fn port(&self, config: &Config) -> u16 {
        let ports = &config.server.ports;
        match self {
            Service::Command => ports.command,
            Service::Recurring => ports.recurring,
            Service::Notification => ports.notification,
            Service::Gateway => ports.gateway,
            Service::Audit => ports.audit,
        }
    }
}

pub async fn serve(
    config: Config,
    service: Service,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<()> {
    tracing::info!(service = service.name(), "starting service");

    let host = host_override.unwrap_or_else(|| config.server.host.clone());
    let port = port_override.unwrap_or_else(|| service.port(&config));

    let router = build_router(&config, service).await?;
    let router = router.layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(service = service.name(), %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(service = service.name(), "shut down cleanly");
    Ok(())
}

async fn build_router(config: &Config, service: Service) -> Result<Router> {
    let http = sidecar::http_client().context("failed to build sidecar HTTP client")?;
    let publisher = EventPublisher::new(
        http.clone(),
        &config.sidecar.base_url,
        &config.sidecar.pubsub,
        service.name(),
    );
    let state_client = StateClient::new(
        http.clone(),
        &config.sidecar.base_url,
        &config.sidecar.state_store,
    );
    let idempotency = IdempotencyGuard::new(state_client.clone(), service.name());

    match service {
        Service::Command => {
            require_secret(config)?;
            let write_pool = todoflow::create_write_pool(&config.database.command_url).await?;
            let read_pool = todoflow::create_read_pool(
                &config.database.command_url,
                config.database.max_read_connections,
            )
            .await?;
            ping(&read_pool).await?;

            let state = todoflow_command::AppState {
                read_pool,
                write_pool,
                publisher,
                jobs: JobsClient::new(http, &config.sidecar.base_url),
                idempotency,
                jwt_secret: config.auth.jwt_secret.clone(),
            };
            Ok(todoflow_command::router(state))
        }
        Service::Recurring => {
            require_secret(config)?;
            let invoke = InvocationClient::new(
                http,
                &config.sidecar.base_url,
                &config.sidecar.command_app_id,
            );
            let state = todoflow_recurring::AppState {
                command: todoflow_recurring::CommandClient::new(invoke, &config.auth.jwt_secret),
                publisher,
                idempotency,
            };
            Ok(todoflow_recurring::router(state))
        }
        Service::Notification => {
            let state = todoflow_notification::AppState {
                publisher,
                jobs: JobsClient::new(http, &config.sidecar.base_url),
                idempotency,
            };
            Ok(todoflow_notification::router(state))
        }
        Service::Gateway => {
            let instance =
                std::env::var("HOSTNAME").unwrap_or_else(|_| "gateway-local".to_owned());
            let manager = todoflow_gateway::ConnectionManager::new(state_client, &instance);
            let state = todoflow_gateway::AppState {
                manager: Arc::new(manager),
            };
            Ok(todoflow_gateway::router(state))
        }
        Service::Audit => {
            let write_pool = todoflow::create_write_pool(&config.database.audit_url).await?;
            let read_pool = todoflow::create_read_pool(
                &config.database.audit_url,
                config.database.max_read_connections,
            )
            .await?;
            ping(&read_pool).await?;

            let state = todoflow_audit::AppState {
                read_pool,
                write_pool,
                idempotency,
            };
            Ok(todoflow_audit::router(state))
        }
    }
}

fn require_secret(config: &Config) -> Result<()> {
    if config.auth.jwt_secret.trim().is_empty() {
        bail!("auth.jwt_secret is not configured; refusing to start");
    }
    Ok(())
}

async fn ping(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("database connection validation failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
