use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Whether the bet's option won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BetOutcome {
    Unknown,
    Won,
    Lost,
}

/// Settlement status of a bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Paid,
    Refunded,
}

/// Bet model representing a stake on one option of a question
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub option_id: Uuid,
    pub amount: Decimal, // NUMERIC(20, 2) in database
    pub outcome: BetOutcome,
    pub status: BetStatus,
    pub win_amount: Decimal,
    pub refunded_amount: Decimal,
    /// Bettor balance right after the stake was taken
    pub user_balance: Decimal,
    pub settled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Bet {
    /// Create a new pending Bet
    pub fn new(
        user_id: Uuid,
        question_id: Uuid,
        option_id: Uuid,
        amount: Decimal,
        user_balance: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            question_id,
            option_id,
            amount,
            outcome: BetOutcome::Unknown,
            status: BetStatus::Pending,
            win_amount: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
            user_balance,
            settled_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn is_winner(&self) -> bool {
        self.outcome == BetOutcome::Won
    }

    pub fn is_refunded(&self) -> bool {
        self.status == BetStatus::Refunded
    }
}
