use super::ServiceContext;
use crate::error::AppResult;
use crate::ledger::lifecycle;
use crate::models::{BetOption, BetQuestion, Match, NewOption};
use chrono::NaiveDateTime;
use tracing::info;
use uuid::Uuid;

/// Match and question lifecycle plus market authoring
pub struct MarketService {
    ctx: ServiceContext,
}

impl MarketService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create_match(
        &self,
        game: &str,
        title: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> AppResult<Match> {
        let mut uow = self.ctx.begin().await?;
        let created = lifecycle::create_match(uow.book_mut(), game, title, start_time, end_time)?;
        self.ctx.finish(uow).await?;

        info!(match_id = %created.id, game, title, "match created");
        Ok(created)
    }

    /// Apply a lifecycle transition to a locked match
    async fn transition_match(
        &self,
        match_id: Uuid,
        action: &'static str,
        apply: impl FnOnce(&mut crate::ledger::Book, Uuid) -> AppResult<Match>,
    ) -> AppResult<Match> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_match(match_id).await?;
        let updated = apply(uow.book_mut(), match_id)?;
        self.ctx.finish(uow).await?;

        info!(%match_id, action, status = %updated.status, hidden = updated.hidden, "match updated");
        Ok(updated)
    }

    pub async fn lock_match(&self, match_id: Uuid) -> AppResult<Match> {
        self.transition_match(match_id, "lock", lifecycle::lock_match).await
    }

    pub async fn hide_match(&self, match_id: Uuid) -> AppResult<Match> {
        self.transition_match(match_id, "hide", |book, id| lifecycle::set_match_hidden(book, id, true))
            .await
    }

    pub async fn unhide_match(&self, match_id: Uuid) -> AppResult<Match> {
        self.transition_match(match_id, "unhide", |book, id| lifecycle::set_match_hidden(book, id, false))
            .await
    }

    pub async fn go_live_match(&self, match_id: Uuid) -> AppResult<Match> {
        self.transition_match(match_id, "go_live", lifecycle::go_live_match).await
    }

    pub async fn end_match_now(&self, match_id: Uuid) -> AppResult<Match> {
        self.transition_match(match_id, "end_now", lifecycle::end_match_now).await
    }

    pub async fn create_question(
        &self,
        match_id: Uuid,
        question: &str,
        end_time: Option<NaiveDateTime>,
        options: &[NewOption],
    ) -> AppResult<(BetQuestion, Vec<BetOption>)> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_match(match_id).await?;
        let (created, options) =
            lifecycle::create_question(uow.book_mut(), match_id, question, end_time, options)?;
        self.ctx.finish(uow).await?;

        info!(question_id = %created.id, %match_id, options = options.len(), "question created");
        Ok((created, options))
    }

    async fn transition_question(
        &self,
        question_id: Uuid,
        action: &'static str,
        apply: impl FnOnce(&mut crate::ledger::Book, Uuid) -> AppResult<BetQuestion>,
    ) -> AppResult<BetQuestion> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_question(question_id, false).await?;
        let updated = apply(uow.book_mut(), question_id)?;
        self.ctx.finish(uow).await?;

        info!(%question_id, action, status = %updated.status, hidden = updated.hidden, "question updated");
        Ok(updated)
    }

    pub async fn lock_question(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        self.transition_question(question_id, "lock", lifecycle::lock_question).await
    }

    pub async fn hide_question(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        self.transition_question(question_id, "hide", |book, id| {
            lifecycle::set_question_hidden(book, id, true)
        })
        .await
    }

    pub async fn unhide_question(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        self.transition_question(question_id, "unhide", |book, id| {
            lifecycle::set_question_hidden(book, id, false)
        })
        .await
    }

    pub async fn go_live_question(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        self.transition_question(question_id, "go_live", lifecycle::go_live_question).await
    }

    pub async fn end_question_now(&self, question_id: Uuid) -> AppResult<BetQuestion> {
        self.transition_question(question_id, "end_now", lifecycle::end_question_now).await
    }
}
