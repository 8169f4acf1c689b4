//! Bookie Backend Service
//!
//! Reads one JSON request per line from stdin, `{"actor_id": ..., "command": {...}}`,
//! runs it through the engine and writes one JSON result per line to stdout.

use anyhow::Context;
use bookie_backend::config::AppConfig;
use bookie_backend::database::{create_pool, run_migrations, Database};
use bookie_backend::logging::init_logging;
use bookie_backend::services::{AuditTrailService, LogNotifier};
use bookie_backend::{AppError, Command, CommandOutcome, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Request {
    actor_id: Uuid,
    command: Command,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    status: u16,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response {
    Ok { ok: bool, result: CommandOutcome },
    Err { ok: bool, error: ErrorBody },
}

impl Response {
    fn failure(err: &AppError) -> Self {
        Response::Err {
            ok: false,
            error: ErrorBody {
                kind: err.kind(),
                status: err.status_code(),
                message: err.to_string(),
            },
        }
    }
}

async fn handle_line(engine: &Engine, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed request: {}", e);
            return Response::failure(&AppError::Validation(format!("malformed request: {}", e)));
        }
    };

    let name = request.command.name();
    match engine.execute(request.actor_id, request.command).await {
        Ok(result) => Response::Ok { ok: true, result },
        Err(e) => {
            if e.is_storage_error() {
                error!(actor_id = %request.actor_id, command = name, "Transaction aborted: {}", e);
            } else {
                warn!(actor_id = %request.actor_id, command = name, kind = e.kind(), "Command rejected: {}", e);
            }
            Response::failure(&e)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()
        .map_err(AppError::Config)
        .context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!("Bookie backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.logging.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    Database::new(pool.clone())
        .health_check()
        .await
        .context("Database health check failed")?;
    info!("Max connections: {}", config.database.max_connections);

    run_migrations(&pool, None)
        .await
        .context("Database migration failed")?;

    // =========================================================================
    // ENGINE
    // =========================================================================
    let mut engine = Engine::new(pool, Arc::new(LogNotifier));
    if let Some(dir) = &config.audit_log_dir {
        let audit = AuditTrailService::new(dir).context("Failed to initialize audit trail")?;
        engine = engine.with_audit(audit);
    } else {
        warn!("AUDIT_LOG_DIR not configured - audit trail disabled");
    }

    if let Some(username) = &config.admin_username {
        let admin = engine
            .accounts()
            .bootstrap_admin(username)
            .await
            .context("Failed to bootstrap admin")?;
        info!(user_id = %admin.id, "Admin account: {}", admin.username);
    }

    info!("Ready; reading commands from stdin");

    // =========================================================================
    // COMMAND LOOP
    // =========================================================================
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let line = match line.context("Failed to read stdin")? {
                    Some(line) => line,
                    None => break,
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = handle_line(&engine, &line).await;
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }

    info!("Bookie backend shutdown complete");
    Ok(())
}
