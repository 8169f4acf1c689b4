use super::account::{decode_account, AccountRef};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    Referral,
    Club,
}

text_enum!(CommissionKind {
    Referral => "referral",
    Club => "club",
});

/// Share of a winning payout paid to a referrer or club.
///
/// Rows are append-only. A reversal is a new row with a negative amount
/// whose `reverses` points at the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub bet_id: Uuid,
    pub beneficiary: AccountRef,
    pub kind: CommissionKind,
    pub amount: Decimal,
    pub reverses: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

impl Commission {
    pub fn new(bet_id: Uuid, beneficiary: AccountRef, kind: CommissionKind, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            bet_id,
            beneficiary,
            kind,
            amount,
            reverses: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Compensating row cancelling this commission
    pub fn reversal(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            bet_id: self.bet_id,
            beneficiary: self.beneficiary,
            kind: self.kind,
            amount: -self.amount,
            reverses: Some(self.id),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for Commission {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            bet_id: row.try_get("bet_id")?,
            beneficiary: decode_account(row, "user_id", "club_id")?,
            kind: row.try_get("kind")?,
            amount: row.try_get("amount")?,
            reverses: row.try_get("reverses")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
