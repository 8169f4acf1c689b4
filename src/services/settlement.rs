use super::ServiceContext;
use crate::error::AppResult;
use crate::ledger::settlement;
use crate::models::{Bet, BetQuestion};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Settlement service: winner selection, its reversal and refunds.
///
/// Each call is one unit of work covering the question, all of its bets and
/// every account they pay into, so a failure anywhere leaves nothing applied.
pub struct SettlementService {
    ctx: ServiceContext,
}

impl SettlementService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn select_winner(&self, question_id: Uuid, option_id: Uuid) -> AppResult<BetQuestion> {
        let settings = self.ctx.config.settings().await?;
        info!(%question_id, %option_id, "winner selection initiated");

        let mut uow = self.ctx.begin().await?;
        uow.lock_question(question_id, true).await?;
        uow.lock_settlement_accounts().await?;

        let before = uow.book().total_balance();
        let question = settlement::select_winner(uow.book_mut(), &settings.commission, question_id, option_id)?;
        let paid_out = uow.book().total_balance() - before;
        let bets = uow.book().bets_for_question(question_id).len();
        self.ctx.finish(uow).await?;

        info!(%question_id, %option_id, bets, %paid_out, "question settled");
        Ok(question)
    }

    pub async fn unselect_winner(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_question(question_id, true).await?;
        uow.lock_settlement_accounts().await?;

        let before = uow.book().total_balance();
        let question = settlement::unselect_winner(uow.book_mut(), question_id)?;
        let reclaimed = before - uow.book().total_balance();
        self.ctx.finish(uow).await?;

        info!(%question_id, %reclaimed, "winner unselected");
        Ok(question)
    }

    pub async fn refund_question(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_question(question_id, true).await?;
        uow.lock_settlement_accounts().await?;

        let question = settlement::refund_question(uow.book_mut(), question_id)?;
        self.ctx.finish(uow).await?;

        info!(%question_id, "question refunded");
        Ok(question)
    }

    pub async fn refund_bet(&self, bet_id: Uuid, percent: Option<Decimal>) -> AppResult<Bet> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_bet(bet_id).await?;
        uow.lock_settlement_accounts().await?;

        let bet = settlement::refund_bet(uow.book_mut(), bet_id, percent)?;
        self.ctx.finish(uow).await?;

        info!(%bet_id, refunded = %bet.refunded_amount, "bet refunded");
        Ok(bet)
    }
}
