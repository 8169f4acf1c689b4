use super::account::{decode_account, AccountRef};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Why a balance moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    BetPlaced,
    BetWon,
    BetWinReversed,
    BetRefund,
    Commission,
    CommissionReversed,
    DepositAccepted,
    DepositReversed,
    WithdrawEscrow,
    WithdrawReleased,
    TransferEscrow,
    TransferReleased,
}

/// One immutable balance movement. `amount` is signed: credits are positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account: AccountRef,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    /// Bet or transaction record that caused the movement
    pub reference_id: Uuid,
    pub created_at: NaiveDateTime,
}

impl<'r> FromRow<'r, PgRow> for LedgerEntry {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            account: decode_account(row, "user_id", "club_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get("amount")?,
            balance_before: row.try_get("balance_before")?,
            balance_after: row.try_get("balance_after")?,
            reference_id: row.try_get("reference_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
