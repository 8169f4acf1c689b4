//! Match and question state transitions, plus market authoring.
//!
//! None of these move money. Each one verifies the target exists, checks
//! the transition is allowed from the current status and updates it.

use super::{validate_amount, Book};
use crate::error::{AppError, AppResult};
use crate::models::{BetOption, BetQuestion, Match, MatchStatus, NewOption, QuestionStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

// ============================================================================
// Matches
// ============================================================================

pub fn create_match(
    book: &mut Book,
    game: &str,
    title: &str,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
) -> AppResult<Match> {
    if game.trim().is_empty() || title.trim().is_empty() {
        return Err(AppError::Validation("match game and title are required".to_string()));
    }
    if end_time <= start_time {
        return Err(AppError::Validation(format!(
            "match end time {} must be after start time {}",
            end_time, start_time
        )));
    }

    let created = Match::new(game.trim(), title.trim(), start_time, end_time);
    book.insert_match(created.clone());
    Ok(created)
}

pub fn lock_match(book: &mut Book, match_id: Uuid) -> AppResult<Match> {
    let m = book.match_mut(match_id)?;
    if m.status == MatchStatus::Closed {
        return Err(AppError::InvalidState(format!("match {} is closed", match_id)));
    }
    m.status = MatchStatus::Locked;
    Ok(m.clone())
}

pub fn set_match_hidden(book: &mut Book, match_id: Uuid, hidden: bool) -> AppResult<Match> {
    let m = book.match_mut(match_id)?;
    m.hidden = hidden;
    Ok(m.clone())
}

/// Clears an explicit lock. A match past its end time stays effectively locked.
pub fn go_live_match(book: &mut Book, match_id: Uuid) -> AppResult<Match> {
    let m = book.match_mut(match_id)?;
    if m.status == MatchStatus::Closed {
        return Err(AppError::InvalidState(format!("match {} is closed", match_id)));
    }
    m.status = MatchStatus::Live;
    Ok(m.clone())
}

/// Force close regardless of the scheduled end time
pub fn end_match_now(book: &mut Book, match_id: Uuid) -> AppResult<Match> {
    let now = book.now();
    let m = book.match_mut(match_id)?;
    if m.status == MatchStatus::Closed {
        return Err(AppError::InvalidState(format!("match {} is already closed", match_id)));
    }
    m.status = MatchStatus::Closed;
    if m.end_time > now {
        m.end_time = now;
    }
    Ok(m.clone())
}

// ============================================================================
// Questions
// ============================================================================

/// Payout rates are stored as NUMERIC(10,4)
pub const RATE_SCALE: u32 = 4;

pub fn create_question(
    book: &mut Book,
    match_id: Uuid,
    text: &str,
    end_time: Option<NaiveDateTime>,
    options: &[NewOption],
) -> AppResult<(BetQuestion, Vec<BetOption>)> {
    let parent = book.match_(match_id)?;
    if parent.status == MatchStatus::Closed {
        return Err(AppError::InvalidState(format!("match {} is closed", match_id)));
    }
    if text.trim().is_empty() {
        return Err(AppError::Validation("question text is required".to_string()));
    }
    if options.len() < 2 {
        return Err(AppError::Validation("a question needs at least two options".to_string()));
    }
    for option in options {
        if option.label.trim().is_empty() {
            return Err(AppError::Validation("option labels must not be empty".to_string()));
        }
        if option.rate < Decimal::ONE {
            return Err(AppError::Validation(format!(
                "option {:?} rate {} is below 1",
                option.label, option.rate
            )));
        }
        if option.rate.normalize().scale() > RATE_SCALE {
            return Err(AppError::Validation(format!(
                "option {:?} rate {} has more than {} decimal places",
                option.label, option.rate, RATE_SCALE
            )));
        }
        if let Some(limit) = option.stake_limit {
            validate_amount(limit)?;
        }
    }

    let question = BetQuestion::new(match_id, text.trim(), end_time);
    let created: Vec<BetOption> = options
        .iter()
        .enumerate()
        .map(|(position, option)| BetOption {
            id: Uuid::new_v4(),
            question_id: question.id,
            label: option.label.trim().to_string(),
            rate: option.rate,
            stake_limit: option.stake_limit,
            total_staked: Decimal::ZERO,
            position: position as i32,
        })
        .collect();

    book.insert_question(question.clone());
    for option in &created {
        book.insert_option(option.clone());
    }
    Ok((question, created))
}

pub fn lock_question(book: &mut Book, question_id: Uuid) -> AppResult<BetQuestion> {
    let q = book.question_mut(question_id)?;
    match q.status {
        QuestionStatus::Closed | QuestionStatus::Refunded => Err(AppError::InvalidState(format!(
            "question {} is {}",
            question_id, q.status
        ))),
        QuestionStatus::Live | QuestionStatus::Locked => {
            q.status = QuestionStatus::Locked;
            Ok(q.clone())
        }
    }
}

pub fn set_question_hidden(book: &mut Book, question_id: Uuid, hidden: bool) -> AppResult<BetQuestion> {
    let q = book.question_mut(question_id)?;
    q.hidden = hidden;
    Ok(q.clone())
}

pub fn go_live_question(book: &mut Book, question_id: Uuid) -> AppResult<BetQuestion> {
    let q = book.question_mut(question_id)?;
    if q.winner_option_id.is_some() || q.status == QuestionStatus::Refunded {
        return Err(AppError::InvalidState(format!(
            "question {} is already resolved",
            question_id
        )));
    }
    q.status = QuestionStatus::Live;
    Ok(q.clone())
}

pub fn end_question_now(book: &mut Book, question_id: Uuid) -> AppResult<BetQuestion> {
    let now = book.now();
    let q = book.question_mut(question_id)?;
    if q.status == QuestionStatus::Refunded {
        return Err(AppError::InvalidState(format!("question {} is refunded", question_id)));
    }
    q.status = QuestionStatus::Closed;
    if q.end_time.map_or(true, |end| end > now) {
        q.end_time = Some(now);
    }
    Ok(q.clone())
}

/// Whether bets may currently be placed on the question
pub fn accepts_bets(book: &Book, question_id: Uuid) -> AppResult<bool> {
    let question = book.question(question_id)?;
    let parent = book.match_(question.match_id)?;
    Ok(!question.is_locked(parent, book.now()))
}
