//! Deposit, withdraw and transfer requests and their admin approval.
//!
//! Balance discipline:
//! - deposits credit on acceptance and debit back if an accepted deposit is cancelled
//! - withdraws escrow (debit) on request; cancelling releases the escrow
//! - transfers escrow the sender on request and credit the recipient through
//!   an internal deposit on acceptance
//!
//! Limits are checked when a request is created, never on approval.

use super::{validate_amount, Book, EngineSettings};
use crate::error::{AppError, AppResult};
use crate::models::{AccountRef, ApprovalStatus, Deposit, EntryKind, Transfer, Withdraw};
use rust_decimal::Decimal;
use uuid::Uuid;

fn already(kind: &str, id: Uuid, status: ApprovalStatus) -> AppError {
    AppError::AlreadyProcessed(format!("{} {} is already {}", kind, id, status))
}

// ============================================================================
// Deposits
// ============================================================================

/// `today` is how many deposits the account has opened since midnight UTC
pub fn create_deposit(
    book: &mut Book,
    settings: &EngineSettings,
    account: AccountRef,
    amount: Decimal,
    method: Option<String>,
    reference: Option<String>,
    today: i64,
) -> AppResult<Deposit> {
    let amount = validate_amount(amount)?;
    book.ensure_active(account)?;
    settings.deposit.check("deposit", amount, today)?;

    let deposit = Deposit::new(account, amount, method, reference);
    book.insert_deposit(deposit.clone());
    Ok(deposit)
}

pub fn accept_deposit(book: &mut Book, deposit_id: Uuid) -> AppResult<Deposit> {
    let deposit = book.deposit(deposit_id)?.clone();
    if deposit.is_internal() {
        return Err(AppError::InvalidState(format!(
            "deposit {} belongs to a transfer",
            deposit_id
        )));
    }
    if deposit.status == ApprovalStatus::Accepted {
        return Err(already("deposit", deposit_id, deposit.status));
    }

    let balance = book.credit(deposit.account, deposit.amount, EntryKind::DepositAccepted, deposit.id)?;
    let now = book.now();
    let accepted = book.deposit_mut(deposit_id)?;
    accepted.status = ApprovalStatus::Accepted;
    accepted.balance_after = Some(balance);
    accepted.processed_at = Some(now);
    let accepted = accepted.clone();

    book.notify(
        deposit.account,
        format!("Your deposit of {} was accepted", deposit.amount),
    );
    Ok(accepted)
}

/// Only an accepted deposit has a balance effect to undo
pub fn cancel_deposit(book: &mut Book, deposit_id: Uuid) -> AppResult<Deposit> {
    let deposit = book.deposit(deposit_id)?.clone();
    if deposit.is_internal() {
        return Err(AppError::InvalidState(format!(
            "deposit {} belongs to a transfer",
            deposit_id
        )));
    }
    if deposit.status == ApprovalStatus::Cancelled {
        return Err(already("deposit", deposit_id, deposit.status));
    }

    let mut balance_after = deposit.balance_after;
    if deposit.status == ApprovalStatus::Accepted {
        balance_after = Some(book.debit(
            deposit.account,
            deposit.amount,
            EntryKind::DepositReversed,
            deposit.id,
        )?);
    }

    let now = book.now();
    let cancelled = book.deposit_mut(deposit_id)?;
    cancelled.status = ApprovalStatus::Cancelled;
    cancelled.balance_after = balance_after;
    cancelled.processed_at = Some(now);
    let cancelled = cancelled.clone();

    book.notify(
        deposit.account,
        format!("Your deposit of {} was cancelled", deposit.amount),
    );
    Ok(cancelled)
}

// ============================================================================
// Withdraws
// ============================================================================

pub fn create_withdraw(
    book: &mut Book,
    settings: &EngineSettings,
    account: AccountRef,
    amount: Decimal,
    destination: Option<String>,
    today: i64,
) -> AppResult<Withdraw> {
    let amount = validate_amount(amount)?;
    book.ensure_active(account)?;
    settings.withdraw.check("withdraw", amount, today)?;

    let mut withdraw = Withdraw::new(account, amount, destination);
    withdraw.balance_after = Some(book.debit(account, amount, EntryKind::WithdrawEscrow, withdraw.id)?);
    book.insert_withdraw(withdraw.clone());
    Ok(withdraw)
}

/// A pending withdraw is already escrowed, so accepting it only flips the
/// status. A cancelled one gave its escrow back and is debited again.
pub fn accept_withdraw(book: &mut Book, withdraw_id: Uuid) -> AppResult<Withdraw> {
    let withdraw = book.withdraw(withdraw_id)?.clone();
    let mut balance_after = withdraw.balance_after;
    match withdraw.status {
        ApprovalStatus::Accepted => return Err(already("withdraw", withdraw_id, withdraw.status)),
        ApprovalStatus::Cancelled => {
            balance_after = Some(book.debit(
                withdraw.account,
                withdraw.amount,
                EntryKind::WithdrawEscrow,
                withdraw.id,
            )?);
        }
        ApprovalStatus::Pending => {}
    }

    let now = book.now();
    let accepted = book.withdraw_mut(withdraw_id)?;
    accepted.status = ApprovalStatus::Accepted;
    accepted.balance_after = balance_after;
    accepted.processed_at = Some(now);
    let accepted = accepted.clone();

    book.notify(
        withdraw.account,
        format!("Your withdraw of {} was accepted", withdraw.amount),
    );
    Ok(accepted)
}

pub fn cancel_withdraw(book: &mut Book, withdraw_id: Uuid) -> AppResult<Withdraw> {
    let withdraw = book.withdraw(withdraw_id)?.clone();
    if withdraw.status == ApprovalStatus::Cancelled {
        return Err(already("withdraw", withdraw_id, withdraw.status));
    }

    let balance = book.credit(
        withdraw.account,
        withdraw.amount,
        EntryKind::WithdrawReleased,
        withdraw.id,
    )?;

    let now = book.now();
    let cancelled = book.withdraw_mut(withdraw_id)?;
    cancelled.status = ApprovalStatus::Cancelled;
    cancelled.balance_after = Some(balance);
    cancelled.processed_at = Some(now);
    let cancelled = cancelled.clone();

    book.notify(
        withdraw.account,
        format!("Your withdraw of {} was cancelled and refunded", withdraw.amount),
    );
    Ok(cancelled)
}

// ============================================================================
// Transfers
// ============================================================================

pub fn create_transfer(
    book: &mut Book,
    settings: &EngineSettings,
    sender: AccountRef,
    recipient_id: Uuid,
    amount: Decimal,
    today: i64,
) -> AppResult<Transfer> {
    let amount = validate_amount(amount)?;
    let recipient = AccountRef::User(recipient_id);
    if sender == recipient {
        return Err(AppError::Validation("cannot transfer to the same account".to_string()));
    }
    book.ensure_active(sender)?;
    book.ensure_active(recipient)?;
    settings.transfer.check("transfer", amount, today)?;

    let transfer = Transfer::new(sender, recipient_id, amount);
    book.debit(sender, amount, EntryKind::TransferEscrow, transfer.id)?;
    book.insert_transfer(transfer.clone());
    Ok(transfer)
}

/// Credit the recipient through the transfer's internal deposit,
/// creating it on first acceptance
fn credit_recipient(book: &mut Book, transfer: &Transfer) -> AppResult<Uuid> {
    let now = book.now();
    let deposit_id = match transfer.deposit_id {
        Some(id) => id,
        None => {
            let deposit = Deposit::for_transfer(transfer);
            let id = deposit.id;
            book.insert_deposit(deposit);
            id
        }
    };

    let balance = book.credit(transfer.recipient(), transfer.amount, EntryKind::DepositAccepted, deposit_id)?;
    let deposit = book.deposit_mut(deposit_id)?;
    deposit.status = ApprovalStatus::Accepted;
    deposit.balance_after = Some(balance);
    deposit.processed_at = Some(now);
    Ok(deposit_id)
}

pub fn accept_transfer(book: &mut Book, transfer_id: Uuid) -> AppResult<Transfer> {
    let transfer = book.transfer(transfer_id)?.clone();
    match transfer.status {
        ApprovalStatus::Accepted => return Err(already("transfer", transfer_id, transfer.status)),
        ApprovalStatus::Cancelled => {
            book.debit(transfer.sender, transfer.amount, EntryKind::TransferEscrow, transfer.id)?;
        }
        ApprovalStatus::Pending => {}
    }
    let deposit_id = credit_recipient(book, &transfer)?;

    let now = book.now();
    let accepted = book.transfer_mut(transfer_id)?;
    accepted.status = ApprovalStatus::Accepted;
    accepted.deposit_id = Some(deposit_id);
    accepted.processed_at = Some(now);
    let accepted = accepted.clone();

    book.notify(
        transfer.sender,
        format!("Your transfer of {} was accepted", transfer.amount),
    );
    book.notify(
        transfer.recipient(),
        format!("You received a transfer of {} from {}", transfer.amount, transfer.sender),
    );
    Ok(accepted)
}

/// After cancellation the sender always holds the funds again
pub fn cancel_transfer(book: &mut Book, transfer_id: Uuid) -> AppResult<Transfer> {
    let transfer = book.transfer(transfer_id)?.clone();
    if transfer.status == ApprovalStatus::Cancelled {
        return Err(already("transfer", transfer_id, transfer.status));
    }

    let now = book.now();
    if transfer.status == ApprovalStatus::Accepted {
        let deposit_id = transfer.deposit_id.ok_or_else(|| {
            AppError::InvalidState(format!("accepted transfer {} has no deposit", transfer_id))
        })?;
        let balance = book.debit(transfer.recipient(), transfer.amount, EntryKind::DepositReversed, deposit_id)?;
        let deposit = book.deposit_mut(deposit_id)?;
        deposit.status = ApprovalStatus::Cancelled;
        deposit.balance_after = Some(balance);
        deposit.processed_at = Some(now);
    }
    book.credit(transfer.sender, transfer.amount, EntryKind::TransferReleased, transfer.id)?;

    let cancelled = book.transfer_mut(transfer_id)?;
    cancelled.status = ApprovalStatus::Cancelled;
    cancelled.processed_at = Some(now);
    let cancelled = cancelled.clone();

    book.notify(
        transfer.sender,
        format!("Your transfer of {} was cancelled", transfer.amount),
    );
    book.notify(
        transfer.recipient(),
        format!("A transfer of {} from {} was cancelled", transfer.amount, transfer.sender),
    );
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimitViolation;
    use crate::models::{Club, User};

    fn book_with(balances: &[i64]) -> (Book, Vec<AccountRef>) {
        let mut book = Book::new();
        let accounts = balances
            .iter()
            .map(|balance| {
                let user = User::new("user", None, None).with_balance(Decimal::new(*balance, 0));
                let account = AccountRef::User(user.id);
                book.load_user(user);
                account
            })
            .collect();
        (book, accounts)
    }

    fn bal(book: &Book, account: AccountRef) -> Decimal {
        book.balance(account).unwrap()
    }

    #[test]
    fn test_deposit_credits_once() {
        let (mut book, accounts) = book_with(&[0]);
        let settings = EngineSettings::default();
        let deposit = create_deposit(&mut book, &settings, accounts[0], Decimal::new(500, 0), None, None, 0).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::ZERO);

        let accepted = accept_deposit(&mut book, deposit.id).unwrap();
        assert_eq!(accepted.balance_after, Some(Decimal::new(500, 0)));
        assert!(matches!(accept_deposit(&mut book, deposit.id), Err(AppError::AlreadyProcessed(_))));
        assert_eq!(bal(&book, accounts[0]), Decimal::new(500, 0));
        assert_eq!(book.notifications().len(), 1);
    }

    #[test]
    fn test_cancel_deposit() {
        let (mut book, accounts) = book_with(&[0]);
        let settings = EngineSettings::default();

        let pending = create_deposit(&mut book, &settings, accounts[0], Decimal::new(200, 0), None, None, 0).unwrap();
        cancel_deposit(&mut book, pending.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::ZERO);

        let accepted = create_deposit(&mut book, &settings, accounts[0], Decimal::new(300, 0), None, None, 1).unwrap();
        accept_deposit(&mut book, accepted.id).unwrap();
        cancel_deposit(&mut book, accepted.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::ZERO);
        assert!(matches!(cancel_deposit(&mut book, accepted.id), Err(AppError::AlreadyProcessed(_))));
    }

    #[test]
    fn test_deposit_limits_checked_at_creation() {
        let (mut book, accounts) = book_with(&[0]);
        let settings = EngineSettings::default();
        let err = create_deposit(&mut book, &settings, accounts[0], Decimal::new(50, 0), None, None, 0).unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded(LimitViolation::BelowMinimum { .. })));
        let err = create_deposit(&mut book, &settings, accounts[0], Decimal::new(500, 0), None, None, 5).unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded(LimitViolation::DailyCount { .. })));
    }

    #[test]
    fn test_club_deposit() {
        let mut book = Book::new();
        let club = Club::new("club", None);
        let account = AccountRef::Club(club.id);
        book.load_club(club);
        let deposit = create_deposit(&mut book, &EngineSettings::default(), account, Decimal::new(1000, 0), None, None, 0)
            .unwrap();
        accept_deposit(&mut book, deposit.id).unwrap();
        assert_eq!(bal(&book, account), Decimal::new(1000, 0));
    }

    #[test]
    fn test_withdraw_cancel_restores_balance_either_way() {
        let settings = EngineSettings::default();

        let (mut book, accounts) = book_with(&[500]);
        let w = create_withdraw(&mut book, &settings, accounts[0], Decimal::new(200, 0), None, 0).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(300, 0));
        cancel_withdraw(&mut book, w.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(500, 0));

        let (mut book, accounts) = book_with(&[500]);
        let w = create_withdraw(&mut book, &settings, accounts[0], Decimal::new(200, 0), None, 0).unwrap();
        accept_withdraw(&mut book, w.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(300, 0));
        cancel_withdraw(&mut book, w.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(500, 0));
        assert!(matches!(cancel_withdraw(&mut book, w.id), Err(AppError::AlreadyProcessed(_))));
    }

    #[test]
    fn test_accepting_cancelled_withdraw_debits_again() {
        let (mut book, accounts) = book_with(&[500]);
        let settings = EngineSettings::default();
        let w = create_withdraw(&mut book, &settings, accounts[0], Decimal::new(200, 0), None, 0).unwrap();
        cancel_withdraw(&mut book, w.id).unwrap();
        accept_withdraw(&mut book, w.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(300, 0));
        assert!(matches!(accept_withdraw(&mut book, w.id), Err(AppError::AlreadyProcessed(_))));
    }

    #[test]
    fn test_withdraw_requires_funds() {
        let (mut book, accounts) = book_with(&[150]);
        let err = create_withdraw(&mut book, &EngineSettings::default(), accounts[0], Decimal::new(200, 0), None, 0)
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_transfer_pending_cancel_refunds_sender_only() {
        let (mut book, accounts) = book_with(&[300, 0]);
        let settings = EngineSettings::default();
        let t = create_transfer(&mut book, &settings, accounts[0], accounts[1].id(), Decimal::new(100, 0), 0).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(200, 0));

        cancel_transfer(&mut book, t.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(300, 0));
        assert_eq!(bal(&book, accounts[1]), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_accept_cancel_accept() {
        let (mut book, accounts) = book_with(&[300, 0]);
        let settings = EngineSettings::default();
        let t = create_transfer(&mut book, &settings, accounts[0], accounts[1].id(), Decimal::new(100, 0), 0).unwrap();

        let accepted = accept_transfer(&mut book, t.id).unwrap();
        let deposit_id = accepted.deposit_id.unwrap();
        assert_eq!(bal(&book, accounts[1]), Decimal::new(100, 0));
        assert!(book.deposit(deposit_id).unwrap().is_internal());
        assert!(matches!(accept_deposit(&mut book, deposit_id), Err(AppError::InvalidState(_))));

        cancel_transfer(&mut book, t.id).unwrap();
        assert_eq!(bal(&book, accounts[0]), Decimal::new(300, 0));
        assert_eq!(bal(&book, accounts[1]), Decimal::ZERO);

        let again = accept_transfer(&mut book, t.id).unwrap();
        assert_eq!(again.deposit_id, Some(deposit_id));
        assert_eq!(bal(&book, accounts[0]), Decimal::new(200, 0));
        assert_eq!(bal(&book, accounts[1]), Decimal::new(100, 0));
        assert_eq!(book.total_balance(), Decimal::new(300, 0));
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let (mut book, accounts) = book_with(&[300]);
        let err = create_transfer(&mut book, &EngineSettings::default(), accounts[0], accounts[0].id(), Decimal::new(100, 0), 0)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
