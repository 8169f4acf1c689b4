//! Synchronous settlement and balance core.
//!
//! Everything in here operates on an in-memory [`Book`] holding rows that the
//! caller has already locked. Nothing here touches the database; the
//! `services` layer loads a book, runs one operation and persists the
//! book's changes in the same transaction.

pub mod accounts;
pub mod approval;
pub mod book;
pub mod lifecycle;
pub mod limits;
pub mod settlement;

pub use book::{Book, Change};
pub use limits::{AmountLimits, CommissionRates, EngineSettings, RecordLimits};

use crate::error::{AppError, AppResult};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round a computed amount to cents, toward zero
pub fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Validate a caller-supplied money amount: positive, at most two decimals
pub fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::Validation(format!(
            "amount {} has more than two decimal places",
            amount
        )));
    }
    Ok(amount)
}
