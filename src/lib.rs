//! Bookie Backend Library
//!
//! Ledger and settlement engine for the Bookie betting platform. The
//! [`ledger`] module is the synchronous core; [`services`] wrap it in
//! Postgres transactions and [`engine::Engine`] dispatches typed
//! [`commands::Command`]s.

pub mod commands;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use commands::{Actor, Command, CommandOutcome};
pub use config::AppConfig;
pub use engine::Engine;
pub use error::{AppError, AppResult};
