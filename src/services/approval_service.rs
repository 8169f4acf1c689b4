use super::{ServiceContext, UnitOfWork};
use crate::error::{AppError, AppResult};
use crate::ledger::approval;
use crate::models::{AccountRef, Deposit, Transfer, Withdraw};
use crate::repositories::RequestKind;
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Deposit, withdraw and transfer requests with admin approval
pub struct ApprovalService {
    ctx: ServiceContext,
}

/// Start of the current UTC day, the window daily count limits use
fn start_of_day() -> AppResult<NaiveDateTime> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::InvalidState("cannot compute start of day".to_string()))
}

impl ApprovalService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Lock the account, then count what it already opened today
    async fn requests_today(
        &self,
        uow: &mut UnitOfWork,
        kind: RequestKind,
        account: AccountRef,
    ) -> AppResult<i64> {
        uow.lock_accounts([account]).await?;
        uow.count_requests_since(kind, account, start_of_day()?).await
    }

    // =========================================================================
    // Deposits
    // =========================================================================

    pub async fn create_deposit(
        &self,
        account: AccountRef,
        amount: Decimal,
        method: Option<String>,
        reference: Option<String>,
    ) -> AppResult<Deposit> {
        let settings = self.ctx.config.settings().await?;

        let mut uow = self.ctx.begin().await?;
        let today = self.requests_today(&mut uow, RequestKind::Deposit, account).await?;
        let deposit = approval::create_deposit(uow.book_mut(), &settings, account, amount, method, reference, today)?;
        self.ctx.finish(uow).await?;

        info!(deposit_id = %deposit.id, %account, %amount, "deposit requested");
        Ok(deposit)
    }

    pub async fn accept_deposit(&self, deposit_id: Uuid) -> AppResult<Deposit> {
        let mut uow = self.ctx.begin().await?;
        let deposit = uow.lock_deposit(deposit_id).await?;
        uow.lock_accounts([deposit.account]).await?;

        let deposit = approval::accept_deposit(uow.book_mut(), deposit_id)?;
        self.ctx.finish(uow).await?;

        info!(%deposit_id, account = %deposit.account, amount = %deposit.amount, "deposit accepted");
        Ok(deposit)
    }

    pub async fn cancel_deposit(&self, deposit_id: Uuid) -> AppResult<Deposit> {
        let mut uow = self.ctx.begin().await?;
        let deposit = uow.lock_deposit(deposit_id).await?;
        uow.lock_accounts([deposit.account]).await?;

        let deposit = approval::cancel_deposit(uow.book_mut(), deposit_id)?;
        self.ctx.finish(uow).await?;

        info!(%deposit_id, account = %deposit.account, amount = %deposit.amount, "deposit cancelled");
        Ok(deposit)
    }

    // =========================================================================
    // Withdraws
    // =========================================================================

    pub async fn create_withdraw(
        &self,
        account: AccountRef,
        amount: Decimal,
        destination: Option<String>,
    ) -> AppResult<Withdraw> {
        let settings = self.ctx.config.settings().await?;

        let mut uow = self.ctx.begin().await?;
        let today = self.requests_today(&mut uow, RequestKind::Withdraw, account).await?;
        let withdraw = approval::create_withdraw(uow.book_mut(), &settings, account, amount, destination, today)?;
        self.ctx.finish(uow).await?;

        info!(withdraw_id = %withdraw.id, %account, %amount, "withdraw requested");
        Ok(withdraw)
    }

    pub async fn accept_withdraw(&self, withdraw_id: Uuid) -> AppResult<Withdraw> {
        let mut uow = self.ctx.begin().await?;
        let withdraw = uow.lock_withdraw(withdraw_id).await?;
        uow.lock_accounts([withdraw.account]).await?;

        let withdraw = approval::accept_withdraw(uow.book_mut(), withdraw_id)?;
        self.ctx.finish(uow).await?;

        info!(%withdraw_id, account = %withdraw.account, amount = %withdraw.amount, "withdraw accepted");
        Ok(withdraw)
    }

    pub async fn cancel_withdraw(&self, withdraw_id: Uuid) -> AppResult<Withdraw> {
        let mut uow = self.ctx.begin().await?;
        let withdraw = uow.lock_withdraw(withdraw_id).await?;
        uow.lock_accounts([withdraw.account]).await?;

        let withdraw = approval::cancel_withdraw(uow.book_mut(), withdraw_id)?;
        self.ctx.finish(uow).await?;

        info!(%withdraw_id, account = %withdraw.account, amount = %withdraw.amount, "withdraw cancelled");
        Ok(withdraw)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    pub async fn create_transfer(
        &self,
        sender: AccountRef,
        recipient_id: Uuid,
        amount: Decimal,
    ) -> AppResult<Transfer> {
        let settings = self.ctx.config.settings().await?;

        let mut uow = self.ctx.begin().await?;
        uow.lock_accounts([sender, AccountRef::User(recipient_id)]).await?;
        let today = uow
            .count_requests_since(RequestKind::Transfer, sender, start_of_day()?)
            .await?;
        let transfer = approval::create_transfer(uow.book_mut(), &settings, sender, recipient_id, amount, today)?;
        self.ctx.finish(uow).await?;

        info!(transfer_id = %transfer.id, %sender, %recipient_id, %amount, "transfer requested");
        Ok(transfer)
    }

    pub async fn accept_transfer(&self, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut uow = self.ctx.begin().await?;
        let transfer = uow.lock_transfer(transfer_id).await?;
        uow.lock_accounts([transfer.sender, transfer.recipient()]).await?;

        let transfer = approval::accept_transfer(uow.book_mut(), transfer_id)?;
        self.ctx.finish(uow).await?;

        info!(%transfer_id, sender = %transfer.sender, recipient = %transfer.recipient_id, amount = %transfer.amount, "transfer accepted");
        Ok(transfer)
    }

    pub async fn cancel_transfer(&self, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut uow = self.ctx.begin().await?;
        let transfer = uow.lock_transfer(transfer_id).await?;
        uow.lock_accounts([transfer.sender, transfer.recipient()]).await?;

        let transfer = approval::cancel_transfer(uow.book_mut(), transfer_id)?;
        self.ctx.finish(uow).await?;

        info!(%transfer_id, sender = %transfer.sender, recipient = %transfer.recipient_id, amount = %transfer.amount, "transfer cancelled");
        Ok(transfer)
    }
}
