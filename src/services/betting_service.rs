use super::ServiceContext;
use crate::error::AppResult;
use crate::ledger::settlement;
use crate::models::{AccountRef, Bet};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Betting service for placing bets
pub struct BettingService {
    ctx: ServiceContext,
}

impl BettingService {
    /// Create a new betting service
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Place a bet. The question, its options and the bettor stay locked
    /// from the checks until commit.
    pub async fn place_bet(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        option_id: Uuid,
        amount: Decimal,
    ) -> AppResult<Bet> {
        let settings = self.ctx.config.settings().await?;

        let mut uow = self.ctx.begin().await?;
        uow.lock_question(question_id, false).await?;
        uow.lock_accounts([AccountRef::User(user_id)]).await?;

        let bet = settlement::place_bet(uow.book_mut(), &settings, user_id, question_id, option_id, amount)?;
        self.ctx.finish(uow).await?;

        info!(
            bet_id = %bet.id,
            %user_id,
            %question_id,
            %option_id,
            %amount,
            balance = %bet.user_balance,
            "bet placed"
        );
        Ok(bet)
    }
}
