//! Typed commands and the authorization rule for each.

use crate::error::{AppError, AppResult};
use crate::ledger::EngineSettings;
use crate::models::{
    Account, AccountRef, Bet, BetOption, BetQuestion, Club, Deposit, LedgerEntry, Match, NewOption,
    Transfer, User, Withdraw,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is issuing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub is_admin: bool,
    pub is_game_editor: bool,
    pub active: bool,
    pub owned_clubs: Vec<Uuid>,
}

impl Actor {
    pub fn from_user(user: &User, owned_clubs: Vec<Uuid>) -> Self {
        Self {
            id: user.id,
            is_admin: user.is_admin,
            is_game_editor: user.is_game_editor,
            active: user.is_active(),
            owned_clubs,
        }
    }

    /// The actor's own balance or a club it owns
    pub fn controls(&self, account: AccountRef) -> bool {
        match account {
            AccountRef::User(id) => id == self.id,
            AccountRef::Club(id) => self.owned_clubs.contains(&id),
        }
    }
}

/// Minimum role a command needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Any active user
    Bettor,
    /// An active user acting on an account it controls
    Controls(AccountRef),
    GameEditor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Market lifecycle
    CreateMatch {
        game: String,
        title: String,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    },
    LockMatch { match_id: Uuid },
    HideMatch { match_id: Uuid },
    UnhideMatch { match_id: Uuid },
    GoLiveMatch { match_id: Uuid },
    EndMatchNow { match_id: Uuid },
    CreateQuestion {
        match_id: Uuid,
        question: String,
        #[serde(default)]
        end_time: Option<NaiveDateTime>,
        options: Vec<NewOption>,
    },
    LockQuestion { question_id: Uuid },
    HideQuestion { question_id: Uuid },
    UnhideQuestion { question_id: Uuid },
    GoLiveQuestion { question_id: Uuid },
    EndQuestionNow { question_id: Uuid },

    // Bets and settlement
    PlaceBet {
        question_id: Uuid,
        option_id: Uuid,
        amount: Decimal,
    },
    SelectWinner { question_id: Uuid, option_id: Uuid },
    UnselectWinner { question_id: Uuid },
    RefundQuestion { question_id: Uuid },
    RefundBet {
        bet_id: Uuid,
        #[serde(default)]
        percent: Option<Decimal>,
    },

    // Approval workflow
    CreateDeposit {
        account: AccountRef,
        amount: Decimal,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        reference: Option<String>,
    },
    AcceptDeposit { deposit_id: Uuid },
    CancelDeposit { deposit_id: Uuid },
    CreateWithdraw {
        account: AccountRef,
        amount: Decimal,
        #[serde(default)]
        destination: Option<String>,
    },
    AcceptWithdraw { withdraw_id: Uuid },
    CancelWithdraw { withdraw_id: Uuid },
    CreateTransfer {
        sender: AccountRef,
        recipient_id: Uuid,
        amount: Decimal,
    },
    AcceptTransfer { transfer_id: Uuid },
    CancelTransfer { transfer_id: Uuid },

    // Accounts and administration
    RegisterUser {
        username: String,
        #[serde(default)]
        referrer_id: Option<Uuid>,
        #[serde(default)]
        club_id: Option<Uuid>,
    },
    CreateClub {
        name: String,
        #[serde(default)]
        owner_id: Option<Uuid>,
    },
    MakeGameEditor { user_id: Uuid },
    RemoveGameEditor { user_id: Uuid },
    SetSetting { key: String, value: String },
    Statement {
        account: AccountRef,
        #[serde(default = "default_statement_limit")]
        limit: i64,
    },
}

fn default_statement_limit() -> i64 {
    50
}

impl Command {
    /// Stable snake_case name, also used as the audit event type
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateMatch { .. } => "create_match",
            Command::LockMatch { .. } => "lock_match",
            Command::HideMatch { .. } => "hide_match",
            Command::UnhideMatch { .. } => "unhide_match",
            Command::GoLiveMatch { .. } => "go_live_match",
            Command::EndMatchNow { .. } => "end_match_now",
            Command::CreateQuestion { .. } => "create_question",
            Command::LockQuestion { .. } => "lock_question",
            Command::HideQuestion { .. } => "hide_question",
            Command::UnhideQuestion { .. } => "unhide_question",
            Command::GoLiveQuestion { .. } => "go_live_question",
            Command::EndQuestionNow { .. } => "end_question_now",
            Command::PlaceBet { .. } => "place_bet",
            Command::SelectWinner { .. } => "select_winner",
            Command::UnselectWinner { .. } => "unselect_winner",
            Command::RefundQuestion { .. } => "refund_question",
            Command::RefundBet { .. } => "refund_bet",
            Command::CreateDeposit { .. } => "create_deposit",
            Command::AcceptDeposit { .. } => "accept_deposit",
            Command::CancelDeposit { .. } => "cancel_deposit",
            Command::CreateWithdraw { .. } => "create_withdraw",
            Command::AcceptWithdraw { .. } => "accept_withdraw",
            Command::CancelWithdraw { .. } => "cancel_withdraw",
            Command::CreateTransfer { .. } => "create_transfer",
            Command::AcceptTransfer { .. } => "accept_transfer",
            Command::CancelTransfer { .. } => "cancel_transfer",
            Command::RegisterUser { .. } => "register_user",
            Command::CreateClub { .. } => "create_club",
            Command::MakeGameEditor { .. } => "make_game_editor",
            Command::RemoveGameEditor { .. } => "remove_game_editor",
            Command::SetSetting { .. } => "set_setting",
            Command::Statement { .. } => "statement",
        }
    }

    pub fn permission(&self) -> Permission {
        match self {
            Command::CreateMatch { .. }
            | Command::LockMatch { .. }
            | Command::HideMatch { .. }
            | Command::UnhideMatch { .. }
            | Command::GoLiveMatch { .. }
            | Command::EndMatchNow { .. }
            | Command::CreateQuestion { .. }
            | Command::LockQuestion { .. }
            | Command::HideQuestion { .. }
            | Command::UnhideQuestion { .. }
            | Command::GoLiveQuestion { .. }
            | Command::EndQuestionNow { .. }
            | Command::SelectWinner { .. }
            | Command::UnselectWinner { .. }
            | Command::RefundQuestion { .. }
            | Command::RefundBet { .. } => Permission::GameEditor,

            Command::PlaceBet { .. } => Permission::Bettor,
            Command::CreateDeposit { account, .. }
            | Command::CreateWithdraw { account, .. }
            | Command::Statement { account, .. } => Permission::Controls(*account),
            Command::CreateTransfer { sender, .. } => Permission::Controls(*sender),

            Command::AcceptDeposit { .. }
            | Command::CancelDeposit { .. }
            | Command::AcceptWithdraw { .. }
            | Command::CancelWithdraw { .. }
            | Command::AcceptTransfer { .. }
            | Command::CancelTransfer { .. }
            | Command::RegisterUser { .. }
            | Command::CreateClub { .. }
            | Command::MakeGameEditor { .. }
            | Command::RemoveGameEditor { .. }
            | Command::SetSetting { .. } => Permission::Admin,
        }
    }

    /// Settlement, refund and approval commands are written to the audit trail
    pub fn is_audited(&self) -> bool {
        matches!(
            self,
            Command::SelectWinner { .. }
                | Command::UnselectWinner { .. }
                | Command::RefundQuestion { .. }
                | Command::RefundBet { .. }
                | Command::AcceptDeposit { .. }
                | Command::CancelDeposit { .. }
                | Command::AcceptWithdraw { .. }
                | Command::CancelWithdraw { .. }
                | Command::AcceptTransfer { .. }
                | Command::CancelTransfer { .. }
                | Command::SetSetting { .. }
        )
    }

    /// Check that `actor` may run this command
    pub fn authorize(&self, actor: &Actor) -> AppResult<()> {
        if !actor.active {
            return Err(AppError::Unauthorized(format!("user {} is deactivated", actor.id)));
        }
        if actor.is_admin {
            return Ok(());
        }

        let allowed = match self.permission() {
            Permission::Bettor => true,
            Permission::Controls(account) => actor.controls(account),
            Permission::GameEditor => actor.is_game_editor,
            Permission::Admin => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "user {} may not run {}",
                actor.id,
                self.name()
            )))
        }
    }
}

/// The entity a command produced or mutated
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entity", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    Match(Match),
    Question(BetQuestion),
    QuestionCreated {
        question: BetQuestion,
        options: Vec<BetOption>,
    },
    Bet(Bet),
    Deposit(Deposit),
    Withdraw(Withdraw),
    Transfer(Transfer),
    User(User),
    Club(Club),
    Settings(EngineSettings),
    Statement(Vec<LedgerEntry>),
}
