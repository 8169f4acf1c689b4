//! Domain models for the Bookie backend.
//!
//! Every entity here maps to one table. Status fields are explicit enums
//! stored as TEXT through `#[derive(sqlx::Type)]`.

/// Implements `as_str` and `Display` for a fieldless enum that shows up in
/// log fields and user-facing messages.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod account;
pub mod bet;
pub mod commission;
pub mod journal;
pub mod market;
pub mod notification;
pub mod transaction;

// Re-export all models for convenient access
pub use account::{Account, AccountRef, Club, User};
pub use bet::{Bet, BetOutcome, BetStatus};
pub use commission::{Commission, CommissionKind};
pub use journal::{EntryKind, LedgerEntry};
pub use market::{BetOption, BetQuestion, Match, MatchStatus, NewOption, QuestionStatus};
pub use notification::Notification;
pub use transaction::{ApprovalStatus, Deposit, Transfer, Withdraw};
