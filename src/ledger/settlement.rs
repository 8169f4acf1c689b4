//! Bet placement and question settlement.
//!
//! The caller must have loaded into the book: the question, its match,
//! options and bets, every bettor, each bettor's referrer and club, and the
//! commission rows of the question's bets.

use super::lifecycle::accepts_bets;
use super::{cents, validate_amount, Book, CommissionRates, EngineSettings};
use crate::error::{AppError, AppResult, LimitViolation};
use crate::models::{
    AccountRef, Bet, BetOutcome, BetQuestion, BetStatus, Commission, CommissionKind, EntryKind,
    QuestionStatus,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Take the stake from the bettor and record a pending bet
pub fn place_bet(
    book: &mut Book,
    settings: &EngineSettings,
    user_id: Uuid,
    question_id: Uuid,
    option_id: Uuid,
    amount: Decimal,
) -> AppResult<Bet> {
    let amount = validate_amount(amount)?;
    let account = AccountRef::User(user_id);
    book.ensure_active(account)?;

    if !accepts_bets(book, question_id)? {
        return Err(AppError::InvalidState(format!(
            "question {} is not accepting bets",
            question_id
        )));
    }

    let option = book.option(option_id)?;
    if option.question_id != question_id {
        return Err(AppError::Validation(format!(
            "option {} does not belong to question {}",
            option_id, question_id
        )));
    }
    let remaining = option.remaining_capacity();

    settings.bet.check("bet", amount)?;
    if let Some(remaining) = remaining {
        if amount > remaining {
            return Err(AppError::LimitExceeded(LimitViolation::OptionCapacity {
                option_id,
                remaining,
                amount,
            }));
        }
    }

    let mut bet = Bet::new(user_id, question_id, option_id, amount, Decimal::ZERO);
    bet.user_balance = book.debit(account, amount, EntryKind::BetPlaced, bet.id)?;
    book.option_mut(option_id)?.total_staked += amount;
    book.insert_bet(bet.clone());

    Ok(bet)
}

/// Resolve a question: pay every bet on the winning option, mark the rest
/// lost. Runs at most once per selection.
pub fn select_winner(
    book: &mut Book,
    rates: &CommissionRates,
    question_id: Uuid,
    option_id: Uuid,
) -> AppResult<BetQuestion> {
    let question = book.question(question_id)?;
    if question.status == QuestionStatus::Refunded {
        return Err(AppError::InvalidState(format!("question {} is refunded", question_id)));
    }
    if question.processed || question.winner_option_id.is_some() {
        return Err(AppError::AlreadyProcessed(format!(
            "question {} is already settled",
            question_id
        )));
    }
    let title = question.question.clone();

    let option = book.option(option_id)?;
    if option.question_id != question_id {
        return Err(AppError::Validation(format!(
            "option {} does not belong to question {}",
            option_id, question_id
        )));
    }
    let rate = option.rate;
    let now = book.now();

    for bet_id in book.bets_for_question(question_id) {
        let bet = book.bet(bet_id)?.clone();
        match bet.status {
            BetStatus::Refunded => continue,
            BetStatus::Paid => {
                return Err(AppError::InvalidState(format!("bet {} is already settled", bet_id)))
            }
            BetStatus::Pending => {}
        }

        if bet.option_id == option_id {
            pay_winner(book, rates, &bet, rate, &title)?;
        } else {
            let lost = book.bet_mut(bet_id)?;
            lost.outcome = BetOutcome::Lost;
            lost.status = BetStatus::Paid;
            lost.win_amount = Decimal::ZERO;
            lost.settled_at = Some(now);
            book.notify(
                AccountRef::User(bet.user_id),
                format!("Your bet of {} on \"{}\" lost", bet.amount, title),
            );
        }
    }

    let q = book.question_mut(question_id)?;
    q.winner_option_id = Some(option_id);
    q.status = QuestionStatus::Closed;
    q.processed = true;
    q.settled_at = Some(now);
    Ok(q.clone())
}

fn pay_winner(
    book: &mut Book,
    rates: &CommissionRates,
    bet: &Bet,
    rate: Decimal,
    title: &str,
) -> AppResult<()> {
    let win_amount = cents(bet.amount * rate * rates.payout_factor());
    let bettor = book.user(bet.user_id)?;
    let referrer_id = bettor.referrer_id;
    let club_id = bettor.club_id;

    book.credit(AccountRef::User(bet.user_id), win_amount, EntryKind::BetWon, bet.id)?;

    if let Some(referrer_id) = referrer_id {
        let share = cents(win_amount * rates.referral);
        pay_commission(book, bet.id, AccountRef::User(referrer_id), CommissionKind::Referral, share)?;
    }
    if let Some(club_id) = club_id {
        let share = cents(win_amount * rates.club);
        pay_commission(book, bet.id, AccountRef::Club(club_id), CommissionKind::Club, share)?;
    }

    let now = book.now();
    let won = book.bet_mut(bet.id)?;
    won.outcome = BetOutcome::Won;
    won.status = BetStatus::Paid;
    won.win_amount = win_amount;
    won.settled_at = Some(now);
    book.notify(
        AccountRef::User(bet.user_id),
        format!("You won {} on \"{}\"", win_amount, title),
    );
    Ok(())
}

fn pay_commission(
    book: &mut Book,
    bet_id: Uuid,
    beneficiary: AccountRef,
    kind: CommissionKind,
    amount: Decimal,
) -> AppResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    book.credit(beneficiary, amount, EntryKind::Commission, bet_id)?;
    book.insert_commission(Commission::new(bet_id, beneficiary, kind, amount));
    book.notify(beneficiary, format!("You received a {} commission of {}", kind, amount));
    Ok(())
}

/// Debit every unreversed commission of the bet and write compensating rows
fn reverse_commissions(book: &mut Book, bet_id: Uuid) -> AppResult<()> {
    for commission in book.active_commissions(bet_id) {
        book.debit(
            commission.beneficiary,
            commission.amount,
            EntryKind::CommissionReversed,
            bet_id,
        )?;
        book.insert_commission(commission.reversal());
    }
    Ok(())
}

/// Undo a winner selection. Payouts and commissions are taken back and the
/// question returns to `locked` so a winner can be chosen again.
pub fn unselect_winner(book: &mut Book, question_id: Uuid) -> AppResult<BetQuestion> {
    let question = book.question(question_id)?;
    if question.winner_option_id.is_none() || !question.processed {
        return Err(AppError::InvalidState(format!(
            "question {} has no selected winner",
            question_id
        )));
    }
    let title = question.question.clone();

    for bet_id in book.bets_for_question(question_id) {
        let bet = book.bet(bet_id)?.clone();
        if bet.is_refunded() {
            continue;
        }

        if bet.is_winner() {
            reverse_commissions(book, bet.id)?;
            book.debit(
                AccountRef::User(bet.user_id),
                bet.win_amount,
                EntryKind::BetWinReversed,
                bet.id,
            )?;
            book.notify(
                AccountRef::User(bet.user_id),
                format!("Your winnings of {} on \"{}\" were reversed", bet.win_amount, title),
            );
        }

        let reset = book.bet_mut(bet_id)?;
        reset.outcome = BetOutcome::Unknown;
        reset.status = BetStatus::Pending;
        reset.win_amount = Decimal::ZERO;
        reset.settled_at = None;
    }

    let q = book.question_mut(question_id)?;
    q.winner_option_id = None;
    q.processed = false;
    q.status = QuestionStatus::Locked;
    q.settled_at = None;
    Ok(q.clone())
}

/// Refund one bet, fully or by `percent` of its stake.
///
/// A won bet first gives back its commissions; the bettor then ends up
/// holding exactly the refund amount from this bet.
pub fn refund_bet(book: &mut Book, bet_id: Uuid, percent: Option<Decimal>) -> AppResult<Bet> {
    let bet = book.bet(bet_id)?.clone();
    if bet.is_refunded() {
        return Err(AppError::AlreadyProcessed(format!("bet {} is already refunded", bet_id)));
    }

    let refund = match percent {
        None => bet.amount,
        Some(p) if p > Decimal::ZERO && p <= Decimal::ONE_HUNDRED => {
            cents(bet.amount * p / Decimal::ONE_HUNDRED)
        }
        Some(p) => {
            return Err(AppError::Validation(format!(
                "refund percent must be in (0, 100], got {}",
                p
            )))
        }
    };

    let account = AccountRef::User(bet.user_id);
    if bet.is_winner() {
        reverse_commissions(book, bet.id)?;
        if bet.win_amount > refund {
            book.debit(account, bet.win_amount - refund, EntryKind::BetWinReversed, bet.id)?;
        } else {
            book.credit(account, refund - bet.win_amount, EntryKind::BetRefund, bet.id)?;
        }
    } else {
        book.credit(account, refund, EntryKind::BetRefund, bet.id)?;
    }

    let option = book.option_mut(bet.option_id)?;
    option.total_staked = (option.total_staked - bet.amount).max(Decimal::ZERO);

    let now = book.now();
    let refunded = book.bet_mut(bet_id)?;
    refunded.status = BetStatus::Refunded;
    refunded.refunded_amount = refund;
    refunded.settled_at = Some(now);
    let refunded = refunded.clone();

    book.notify(account, format!("Your bet of {} was refunded {}", bet.amount, refund));
    Ok(refunded)
}

/// Refund every bet on the question at full stake and close it for good
pub fn refund_question(book: &mut Book, question_id: Uuid) -> AppResult<BetQuestion> {
    let question = book.question(question_id)?;
    if question.status == QuestionStatus::Refunded {
        return Err(AppError::AlreadyProcessed(format!(
            "question {} is already refunded",
            question_id
        )));
    }

    for bet_id in book.bets_for_question(question_id) {
        if !book.bet(bet_id)?.is_refunded() {
            refund_bet(book, bet_id, None)?;
        }
    }

    let now = book.now();
    let q = book.question_mut(question_id)?;
    q.winner_option_id = None;
    q.status = QuestionStatus::Refunded;
    q.processed = true;
    q.settled_at = Some(now);
    Ok(q.clone())
}
