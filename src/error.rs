use crate::database::DatabaseError;
use crate::models::AccountRef;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Which configured limit rejected an amount or request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "limit", rename_all = "snake_case")]
pub enum LimitViolation {
    /// Amount is smaller than the configured minimum
    BelowMinimum {
        scope: String,
        minimum: Decimal,
        amount: Decimal,
    },
    /// Amount is larger than the configured maximum
    AboveMaximum {
        scope: String,
        maximum: Decimal,
        amount: Decimal,
    },
    /// The option cannot take this much more stake
    OptionCapacity {
        option_id: Uuid,
        remaining: Decimal,
        amount: Decimal,
    },
    /// Too many requests of this kind were opened today
    DailyCount {
        scope: String,
        maximum: i64,
        count: i64,
    },
}

impl std::fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowMinimum { scope, minimum, amount } => {
                write!(f, "{} amount {} is below the minimum of {}", scope, amount, minimum)
            }
            Self::AboveMaximum { scope, maximum, amount } => {
                write!(f, "{} amount {} is above the maximum of {}", scope, amount, maximum)
            }
            Self::OptionCapacity { option_id, remaining, amount } => write!(
                f,
                "option {} has {} stake capacity left, {} requested",
                option_id, remaining, amount
            ),
            Self::DailyCount { scope, maximum, count } => write!(
                f,
                "{} daily limit of {} reached ({} today)",
                scope, maximum, count
            ),
        }
    }
}

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authorization predicate rejected the actor
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The entity is in a state that forbids the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A debit would take the account below zero
    #[error("Insufficient funds on {account}: available {available}, required {required}")]
    InsufficientFunds {
        account: AccountRef,
        available: Decimal,
        required: Decimal,
    },

    /// Amount or request count outside the configured limits
    #[error("Limit exceeded: {0}")]
    LimitExceeded(LimitViolation),

    /// Idempotency guard tripped; nothing was applied
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Storage or transaction infrastructure failure; the caller may retry
    pub fn is_storage_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Sqlx(_))
    }

    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
                | AppError::Sqlx(SqlxError::PoolTimedOut)
                | AppError::Sqlx(SqlxError::Io(_))
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Stable machine-readable code for callers
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Sqlx(_) => "storage_error",
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidState(_) => "invalid_state",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::LimitExceeded(_) => "limit_exceeded",
            AppError::AlreadyProcessed(_) => "already_processed",
            AppError::Serialization(_) => "serialization",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 403,
            AppError::Validation(_) | AppError::Serialization(_) => 400,
            AppError::InvalidState(_) | AppError::AlreadyProcessed(_) => 409,
            AppError::InsufficientFunds { .. } | AppError::LimitExceeded(_) => 422,
            AppError::Database(_) | AppError::Sqlx(_) => 503,
            AppError::Config(_) => 500,
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Validation(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::InvalidState(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") || code.as_deref() == Some("23514") {
                    // Foreign key or check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}
