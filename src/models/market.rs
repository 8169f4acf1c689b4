use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored lifecycle status of a match. Visibility is tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Live,
    Locked,
    Closed,
}

text_enum!(MatchStatus {
    Live => "live",
    Locked => "locked",
    Closed => "closed",
});

/// Real-world event that groups bet questions
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub game: String,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: MatchStatus,
    pub hidden: bool,
    pub created_at: NaiveDateTime,
}

impl Match {
    pub fn new(
        game: impl Into<String>,
        title: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            game: game.into(),
            title: title.into(),
            start_time,
            end_time,
            status: MatchStatus::Live,
            hidden: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Explicitly locked/closed, or past its scheduled end
    pub fn is_locked(&self, now: NaiveDateTime) -> bool {
        self.status != MatchStatus::Live || self.end_time <= now
    }
}

/// Stored lifecycle status of a bet question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Live,
    Locked,
    Closed,
    Refunded,
}

text_enum!(QuestionStatus {
    Live => "live",
    Locked => "locked",
    Closed => "closed",
    Refunded => "refunded",
});

/// A wagering market under a match
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BetQuestion {
    pub id: Uuid,
    pub match_id: Uuid,
    pub question: String,
    pub end_time: Option<NaiveDateTime>,
    pub status: QuestionStatus,
    pub hidden: bool,
    pub winner_option_id: Option<Uuid>,
    /// Settlement guard; set in the same transaction as the payout
    pub processed: bool,
    pub settled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl BetQuestion {
    pub fn new(match_id: Uuid, question: impl Into<String>, end_time: Option<NaiveDateTime>) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_id,
            question: question.into(),
            end_time,
            status: QuestionStatus::Live,
            hidden: false,
            winner_option_id: None,
            processed: false,
            settled_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Effective lock state, inheriting from the parent match
    pub fn is_locked(&self, parent: &Match, now: NaiveDateTime) -> bool {
        self.status != QuestionStatus::Live
            || self.winner_option_id.is_some()
            || self.end_time.map_or(false, |end| end <= now)
            || parent.is_locked(now)
    }
}

/// One outcome of a bet question
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BetOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub label: String,
    /// Payout multiplier, at least 1
    pub rate: Decimal,
    pub stake_limit: Option<Decimal>,
    pub total_staked: Decimal,
    pub position: i32,
}

impl BetOption {
    /// Stake the option can still take; `None` when unlimited
    pub fn remaining_capacity(&self) -> Option<Decimal> {
        self.stake_limit
            .map(|limit| (limit - self.total_staked).max(Decimal::ZERO))
    }
}

/// Option definition supplied when authoring a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOption {
    pub label: String,
    pub rate: Decimal,
    #[serde(default)]
    pub stake_limit: Option<Decimal>,
}
