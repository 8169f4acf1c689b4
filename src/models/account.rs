//! Balance holders: users and clubs.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Reference to a balance-holding account.
///
/// The derived ordering (users before clubs, then by id) is the lock order
/// used by every unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AccountRef {
    User(Uuid),
    Club(Uuid),
}

impl AccountRef {
    pub fn id(&self) -> Uuid {
        match self {
            AccountRef::User(id) | AccountRef::Club(id) => *id,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AccountRef::User(id) => Some(*id),
            AccountRef::Club(_) => None,
        }
    }

    pub fn club_id(&self) -> Option<Uuid> {
        match self {
            AccountRef::Club(id) => Some(*id),
            AccountRef::User(_) => None,
        }
    }

    /// Build from the `user_id` / `club_id` column pair; exactly one must be set
    pub fn from_columns(user_id: Option<Uuid>, club_id: Option<Uuid>) -> Result<Self, String> {
        match (user_id, club_id) {
            (Some(id), None) => Ok(AccountRef::User(id)),
            (None, Some(id)) => Ok(AccountRef::Club(id)),
            (Some(_), Some(_)) => Err("both user_id and club_id are set".to_string()),
            (None, None) => Err("account reference is missing".to_string()),
        }
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRef::User(id) => write!(f, "user:{}", id),
            AccountRef::Club(id) => write!(f, "club:{}", id),
        }
    }
}

/// Decode an [`AccountRef`] stored as a nullable column pair
pub(crate) fn decode_account(
    row: &PgRow,
    user_column: &str,
    club_column: &str,
) -> Result<AccountRef, sqlx::Error> {
    let user_id: Option<Uuid> = row.try_get(user_column)?;
    let club_id: Option<Uuid> = row.try_get(club_column)?;
    AccountRef::from_columns(user_id, club_id).map_err(|e| sqlx::Error::ColumnDecode {
        index: user_column.to_string(),
        source: e.into(),
    })
}

/// Read access shared by every balance holder.
///
/// Balances are only written by the ledger primitives in `crate::ledger`.
pub trait Account {
    fn account_ref(&self) -> AccountRef;
    fn balance(&self) -> Decimal;
    fn deleted_at(&self) -> Option<NaiveDateTime>;

    fn is_active(&self) -> bool {
        self.deleted_at().is_none()
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub(crate) balance: Decimal,
    pub referrer_id: Option<Uuid>,
    pub club_id: Option<Uuid>,
    pub is_admin: bool,
    pub is_game_editor: bool,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Create a new User with an empty balance
    pub fn new(username: impl Into<String>, referrer_id: Option<Uuid>, club_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            balance: Decimal::ZERO,
            referrer_id,
            club_id,
            is_admin: false,
            is_game_editor: false,
            deleted_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Opening balance for a freshly constructed account (fixtures, imports)
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

impl Account for User {
    fn account_ref(&self) -> AccountRef {
        AccountRef::User(self.id)
    }

    fn balance(&self) -> Decimal {
        self.balance
    }

    fn deleted_at(&self) -> Option<NaiveDateTime> {
        self.deleted_at
    }
}

/// Club account; receives a share of its members' winnings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Option<Uuid>,
    pub(crate) balance: Decimal,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Club {
    pub fn new(name: impl Into<String>, owner_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner_id,
            balance: Decimal::ZERO,
            deleted_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Opening balance for a freshly constructed account (fixtures, imports)
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }
}

impl Account for Club {
    fn account_ref(&self) -> AccountRef {
        AccountRef::Club(self.id)
    }

    fn balance(&self) -> Decimal {
        self.balance
    }

    fn deleted_at(&self) -> Option<NaiveDateTime> {
        self.deleted_at
    }
}
