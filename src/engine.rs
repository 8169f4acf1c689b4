//! Command dispatch: resolve the actor, authorize, run, audit.

use crate::commands::{Actor, Command, CommandOutcome};
use crate::error::{AppError, AppResult};
use crate::services::{
    AccountService, ApprovalService, AuditLogEntry, AuditTrailService, BettingService,
    MarketService, Notifier, ServiceContext, SettlementService,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Engine {
    ctx: ServiceContext,
    accounts: AccountService,
    markets: MarketService,
    betting: BettingService,
    settlement: SettlementService,
    approvals: ApprovalService,
    audit: Option<AuditTrailService>,
}

impl Engine {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        let ctx = ServiceContext::new(pool, notifier);
        Self {
            accounts: AccountService::new(ctx.clone()),
            markets: MarketService::new(ctx.clone()),
            betting: BettingService::new(ctx.clone()),
            settlement: SettlementService::new(ctx.clone()),
            approvals: ApprovalService::new(ctx.clone()),
            ctx,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditTrailService) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    /// Load the issuing user and the clubs it owns
    pub async fn actor(&self, actor_id: Uuid) -> AppResult<Actor> {
        let user = self.accounts.find_user(actor_id).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unauthorized(format!("unknown actor {}", actor_id)),
            other => other,
        })?;
        let owned_clubs = self.accounts.owned_clubs(actor_id).await?;
        Ok(Actor::from_user(&user, owned_clubs))
    }

    /// Run one command on behalf of `actor_id`
    pub async fn execute(&self, actor_id: Uuid, command: Command) -> AppResult<CommandOutcome> {
        let actor = self.actor(actor_id).await?;
        command.authorize(&actor)?;

        let name = command.name();
        let audited = command.is_audited();
        let details = if audited && self.audit.is_some() {
            Some(serde_json::to_value(&command)?)
        } else {
            None
        };

        let outcome = self.dispatch(&actor, command).await?;
        info!(%actor_id, command = name, "command executed");

        if let (Some(audit), Some(command)) = (&self.audit, details) {
            let details = serde_json::json!({ "command": command, "outcome": &outcome });
            if let Err(e) = audit.log(&AuditLogEntry::new(name, actor_id, details)).await {
                warn!(%actor_id, command = name, error = %e, "failed to write audit entry");
            }
        }

        Ok(outcome)
    }

    async fn dispatch(&self, actor: &Actor, command: Command) -> AppResult<CommandOutcome> {
        use CommandOutcome as Out;

        Ok(match command {
            Command::CreateMatch { game, title, start_time, end_time } => {
                Out::Match(self.markets.create_match(&game, &title, start_time, end_time).await?)
            }
            Command::LockMatch { match_id } => Out::Match(self.markets.lock_match(match_id).await?),
            Command::HideMatch { match_id } => Out::Match(self.markets.hide_match(match_id).await?),
            Command::UnhideMatch { match_id } => Out::Match(self.markets.unhide_match(match_id).await?),
            Command::GoLiveMatch { match_id } => Out::Match(self.markets.go_live_match(match_id).await?),
            Command::EndMatchNow { match_id } => Out::Match(self.markets.end_match_now(match_id).await?),
            Command::CreateQuestion { match_id, question, end_time, options } => {
                let (question, options) = self
                    .markets
                    .create_question(match_id, &question, end_time, &options)
                    .await?;
                Out::QuestionCreated { question, options }
            }
            Command::LockQuestion { question_id } => {
                Out::Question(self.markets.lock_question(question_id).await?)
            }
            Command::HideQuestion { question_id } => {
                Out::Question(self.markets.hide_question(question_id).await?)
            }
            Command::UnhideQuestion { question_id } => {
                Out::Question(self.markets.unhide_question(question_id).await?)
            }
            Command::GoLiveQuestion { question_id } => {
                Out::Question(self.markets.go_live_question(question_id).await?)
            }
            Command::EndQuestionNow { question_id } => {
                Out::Question(self.markets.end_question_now(question_id).await?)
            }

            Command::PlaceBet { question_id, option_id, amount } => Out::Bet(
                self.betting
                    .place_bet(actor.id, question_id, option_id, amount)
                    .await?,
            ),
            Command::SelectWinner { question_id, option_id } => {
                Out::Question(self.settlement.select_winner(question_id, option_id).await?)
            }
            Command::UnselectWinner { question_id } => {
                Out::Question(self.settlement.unselect_winner(question_id).await?)
            }
            Command::RefundQuestion { question_id } => {
                Out::Question(self.settlement.refund_question(question_id).await?)
            }
            Command::RefundBet { bet_id, percent } => {
                Out::Bet(self.settlement.refund_bet(bet_id, percent).await?)
            }

            Command::CreateDeposit { account, amount, method, reference } => Out::Deposit(
                self.approvals
                    .create_deposit(account, amount, method, reference)
                    .await?,
            ),
            Command::AcceptDeposit { deposit_id } => {
                Out::Deposit(self.approvals.accept_deposit(deposit_id).await?)
            }
            Command::CancelDeposit { deposit_id } => {
                Out::Deposit(self.approvals.cancel_deposit(deposit_id).await?)
            }
            Command::CreateWithdraw { account, amount, destination } => Out::Withdraw(
                self.approvals
                    .create_withdraw(account, amount, destination)
                    .await?,
            ),
            Command::AcceptWithdraw { withdraw_id } => {
                Out::Withdraw(self.approvals.accept_withdraw(withdraw_id).await?)
            }
            Command::CancelWithdraw { withdraw_id } => {
                Out::Withdraw(self.approvals.cancel_withdraw(withdraw_id).await?)
            }
            Command::CreateTransfer { sender, recipient_id, amount } => Out::Transfer(
                self.approvals
                    .create_transfer(sender, recipient_id, amount)
                    .await?,
            ),
            Command::AcceptTransfer { transfer_id } => {
                Out::Transfer(self.approvals.accept_transfer(transfer_id).await?)
            }
            Command::CancelTransfer { transfer_id } => {
                Out::Transfer(self.approvals.cancel_transfer(transfer_id).await?)
            }

            Command::RegisterUser { username, referrer_id, club_id } => Out::User(
                self.accounts
                    .register_user(&username, referrer_id, club_id)
                    .await?,
            ),
            Command::CreateClub { name, owner_id } => {
                Out::Club(self.accounts.create_club(&name, owner_id).await?)
            }
            Command::MakeGameEditor { user_id } => {
                Out::User(self.accounts.set_game_editor(user_id, true).await?)
            }
            Command::RemoveGameEditor { user_id } => {
                Out::User(self.accounts.set_game_editor(user_id, false).await?)
            }
            Command::SetSetting { key, value } => {
                Out::Settings(self.ctx.config.set(&key, &value).await?)
            }
            Command::Statement { account, limit } => {
                Out::Statement(self.accounts.statement(account, limit).await?)
            }
        })
    }
}
