use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "select_winner", "accept_deposit", "refund_bet", etc.
    pub actor_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn new(event_type: impl Into<String>, actor_id: Uuid, details: serde_json::Value) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: event_type.into(),
            actor_id,
            details,
        }
    }
}

/// Audit trail service for settlements, refunds and approvals
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: &Path) -> AppResult<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Config(format!("Failed to create audit log directory: {}", e)))?;

        // Create log file with date
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        // Open file in append mode
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Config(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Append one entry as a JSON line
    pub async fn log(&self, entry: &AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Config(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Config(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }
}
