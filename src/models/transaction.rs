use super::account::{decode_account, AccountRef};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Resolution status shared by deposits, withdraws and transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Accepted,
    Cancelled,
}

text_enum!(ApprovalStatus {
    Pending => "pending",
    Accepted => "accepted",
    Cancelled => "cancelled",
});

/// Money coming into an account; credited only on acceptance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub account: AccountRef,
    pub amount: Decimal,
    pub method: Option<String>,
    pub reference: Option<String>,
    /// Set when the deposit is the recipient leg of a transfer
    pub transfer_id: Option<Uuid>,
    pub status: ApprovalStatus,
    pub balance_after: Option<Decimal>,
    pub processed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Deposit {
    pub fn new(
        account: AccountRef,
        amount: Decimal,
        method: Option<String>,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            amount,
            method,
            reference,
            transfer_id: None,
            status: ApprovalStatus::Pending,
            balance_after: None,
            processed_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Internal recipient leg of a transfer
    pub fn for_transfer(transfer: &Transfer) -> Self {
        Self {
            transfer_id: Some(transfer.id),
            ..Self::new(AccountRef::User(transfer.recipient_id), transfer.amount, None, None)
        }
    }

    pub fn is_internal(&self) -> bool {
        self.transfer_id.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for Deposit {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            account: decode_account(row, "user_id", "club_id")?,
            amount: row.try_get("amount")?,
            method: row.try_get("method")?,
            reference: row.try_get("reference")?,
            transfer_id: row.try_get("transfer_id")?,
            status: row.try_get("status")?,
            balance_after: row.try_get("balance_after")?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Money leaving an account; escrowed (debited) when requested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdraw {
    pub id: Uuid,
    pub account: AccountRef,
    pub amount: Decimal,
    pub destination: Option<String>,
    pub status: ApprovalStatus,
    pub balance_after: Option<Decimal>,
    pub processed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Withdraw {
    pub fn new(account: AccountRef, amount: Decimal, destination: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            amount,
            destination,
            status: ApprovalStatus::Pending,
            balance_after: None,
            processed_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Withdraw {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            account: decode_account(row, "user_id", "club_id")?,
            amount: row.try_get("amount")?,
            destination: row.try_get("destination")?,
            status: row.try_get("status")?,
            balance_after: row.try_get("balance_after")?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Account-to-user transfer. The sender is debited when it is requested;
/// the recipient is credited through a linked internal deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub sender: AccountRef,
    pub recipient_id: Uuid,
    pub amount: Decimal,
    pub status: ApprovalStatus,
    pub deposit_id: Option<Uuid>,
    pub processed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Transfer {
    pub fn new(sender: AccountRef, recipient_id: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            recipient_id,
            amount,
            status: ApprovalStatus::Pending,
            deposit_id: None,
            processed_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn recipient(&self) -> AccountRef {
        AccountRef::User(self.recipient_id)
    }
}

impl<'r> FromRow<'r, PgRow> for Transfer {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender: decode_account(row, "sender_user_id", "sender_club_id")?,
            recipient_id: row.try_get("recipient_id")?,
            amount: row.try_get("amount")?,
            status: row.try_get("status")?,
            deposit_id: row.try_get("deposit_id")?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
