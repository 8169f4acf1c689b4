mod helpers;

use bookie_backend::error::AppError;
use bookie_backend::ledger::approval::*;
use bookie_backend::ledger::lifecycle::*;
use bookie_backend::ledger::settlement::*;
use bookie_backend::ledger::EngineSettings;
use bookie_backend::models::*;
use helpers::*;
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_simple_payout() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let u1 = add_user(&mut book, "1000", None, None);
    let u2 = add_user(&mut book, "1000", None, None);

    let a = place_bet(&mut book, &settings, u1, question_id, option_a, dec("100")).expect("Failed to place bet");
    let b = place_bet(&mut book, &settings, u2, question_id, option_b, dec("100")).expect("Failed to place bet");
    let u1_before = balance(&book, AccountRef::User(u1));
    let u2_before = balance(&book, AccountRef::User(u2));

    let question = select_winner(&mut book, &settings.commission, question_id, option_a)
        .expect("Failed to select winner");

    assert_eq!(balance(&book, AccountRef::User(u1)) - u1_before, dec("195.00"));
    assert_eq!(balance(&book, AccountRef::User(u2)), u2_before);
    assert_eq!(book.bet(a.id).unwrap().status, BetStatus::Paid);
    assert_eq!(book.bet(a.id).unwrap().win_amount, dec("195.00"));
    assert_eq!(book.bet(b.id).unwrap().status, BetStatus::Paid);
    assert_eq!(book.bet(b.id).unwrap().outcome, BetOutcome::Lost);
    assert_eq!(question.status, QuestionStatus::Closed);
    assert_eq!(question.winner_option_id, Some(option_a));
}

#[test]
fn test_refund_question() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let u1 = add_user(&mut book, "50", None, None);
    let u2 = add_user(&mut book, "80", None, None);

    place_bet(&mut book, &settings, u1, question_id, option_a, dec("50")).expect("Failed to place bet");
    place_bet(&mut book, &settings, u2, question_id, option_b, dec("50")).expect("Failed to place bet");
    assert_eq!(balance(&book, AccountRef::User(u1)), Decimal::ZERO);

    let question = refund_question(&mut book, question_id).expect("Failed to refund question");

    assert_eq!(question.status, QuestionStatus::Refunded);
    assert_eq!(balance(&book, AccountRef::User(u1)), dec("50"));
    assert_eq!(balance(&book, AccountRef::User(u2)), dec("80"));
    for bet_id in book.bets_for_question(question_id) {
        assert_eq!(book.bet(bet_id).unwrap().status, BetStatus::Refunded);
    }

    let err = refund_question(&mut book, question_id).unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
    let err = select_winner(&mut book, &settings.commission, question_id, option_a).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[test]
fn test_refund_settled_question_takes_back_payouts() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let club = add_club(&mut book, "0");
    let referrer = add_user(&mut book, "0", None, None);
    let winner = add_user(&mut book, "100", Some(referrer), Some(club));
    let loser = add_user(&mut book, "100", None, None);

    place_bet(&mut book, &settings, winner, question_id, option_a, dec("100")).unwrap();
    place_bet(&mut book, &settings, loser, question_id, option_b, dec("100")).unwrap();
    select_winner(&mut book, &settings.commission, question_id, option_a).unwrap();

    refund_question(&mut book, question_id).expect("Failed to refund settled question");

    assert_eq!(balance(&book, AccountRef::User(winner)), dec("100"));
    assert_eq!(balance(&book, AccountRef::User(loser)), dec("100"));
    assert_eq!(balance(&book, AccountRef::User(referrer)), Decimal::ZERO);
    assert_eq!(balance(&book, AccountRef::Club(club)), Decimal::ZERO);
}

#[test]
fn test_withdraw_cancel_restores_balance() {
    let settings = EngineSettings::default();

    // Cancel while pending
    let Market { mut book, .. } = market();
    let user = AccountRef::User(add_user(&mut book, "500", None, None));
    let withdraw = create_withdraw(&mut book, &settings, user, dec("200"), None, 0).expect("Failed to create withdraw");
    assert_eq!(balance(&book, user), dec("300"));
    cancel_withdraw(&mut book, withdraw.id).expect("Failed to cancel withdraw");
    assert_eq!(balance(&book, user), dec("500"));

    // Cancel after accept
    let withdraw = create_withdraw(&mut book, &settings, user, dec("200"), None, 1).expect("Failed to create withdraw");
    let accepted = accept_withdraw(&mut book, withdraw.id).expect("Failed to accept withdraw");
    assert_eq!(accepted.status, ApprovalStatus::Accepted);
    assert_eq!(balance(&book, user), dec("300"));
    let cancelled = cancel_withdraw(&mut book, withdraw.id).expect("Failed to cancel withdraw");
    assert_eq!(cancelled.status, ApprovalStatus::Cancelled);
    assert_eq!(balance(&book, user), dec("500"));

    let err = cancel_withdraw(&mut book, withdraw.id).unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
    assert_eq!(balance(&book, user), dec("500"));
}

#[test]
fn test_transfer_pending_cancel_refunds_sender_only() {
    let Market { mut book, .. } = market();
    let settings = EngineSettings::default();
    let sender = AccountRef::User(add_user(&mut book, "300", None, None));
    let recipient_id = add_user(&mut book, "20", None, None);
    let recipient = AccountRef::User(recipient_id);

    let transfer = create_transfer(&mut book, &settings, sender, recipient_id, dec("100"), 0)
        .expect("Failed to create transfer");
    assert_eq!(balance(&book, sender), dec("200"));

    cancel_transfer(&mut book, transfer.id).expect("Failed to cancel transfer");
    assert_eq!(balance(&book, sender), dec("300"));
    assert_eq!(balance(&book, recipient), dec("20"));
}

#[test]
fn test_transfer_accept_cancel_reaccept() {
    let Market { mut book, .. } = market();
    let settings = EngineSettings::default();
    let sender = AccountRef::User(add_user(&mut book, "300", None, None));
    let recipient_id = add_user(&mut book, "0", None, None);
    let recipient = AccountRef::User(recipient_id);

    let transfer = create_transfer(&mut book, &settings, sender, recipient_id, dec("100"), 0).unwrap();
    let accepted = accept_transfer(&mut book, transfer.id).expect("Failed to accept transfer");
    assert_eq!(balance(&book, sender), dec("200"));
    assert_eq!(balance(&book, recipient), dec("100"));
    let deposit_id = accepted.deposit_id.expect("accepted transfer should carry a deposit");
    assert!(book.deposit(deposit_id).unwrap().is_internal());

    let err = accept_transfer(&mut book, transfer.id).unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));

    cancel_transfer(&mut book, transfer.id).expect("Failed to cancel transfer");
    assert_eq!(balance(&book, sender), dec("300"));
    assert_eq!(balance(&book, recipient), Decimal::ZERO);

    let reaccepted = accept_transfer(&mut book, transfer.id).expect("Failed to re-accept transfer");
    assert_eq!(reaccepted.deposit_id, Some(deposit_id));
    assert_eq!(balance(&book, sender), dec("200"));
    assert_eq!(balance(&book, recipient), dec("100"));

    // The internal deposit follows its transfer only
    let err = cancel_deposit(&mut book, deposit_id).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_bet_placement_boundary() {
    let Market { mut book, question_id, option_a, .. } = market();
    let settings = EngineSettings::default();
    let user = add_user(&mut book, "150.25", None, None);

    let err = place_bet(&mut book, &settings, user, question_id, option_a, dec("150.26")).unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));
    assert_eq!(balance(&book, AccountRef::User(user)), dec("150.25"));

    let bet = place_bet(&mut book, &settings, user, question_id, option_a, dec("150.25"))
        .expect("Stake equal to the balance should be accepted");
    assert_eq!(bet.user_balance, Decimal::ZERO);
}

#[test]
fn test_select_winner_is_idempotent() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let referrer = add_user(&mut book, "0", None, None);
    let u1 = add_user(&mut book, "400", Some(referrer), None);
    let u2 = add_user(&mut book, "400", None, None);
    place_bet(&mut book, &settings, u1, question_id, option_a, dec("120")).unwrap();
    place_bet(&mut book, &settings, u2, question_id, option_b, dec("80")).unwrap();

    select_winner(&mut book, &settings.commission, question_id, option_a).unwrap();
    let once: Vec<Decimal> = [u1, u2, referrer]
        .iter()
        .map(|id| balance(&book, AccountRef::User(*id)))
        .collect();
    let journal_len = book.journal().len();

    assert_err!(select_winner(&mut book, &settings.commission, question_id, option_a));
    let twice: Vec<Decimal> = [u1, u2, referrer]
        .iter()
        .map(|id| balance(&book, AccountRef::User(*id)))
        .collect();
    assert_eq!(once, twice);
    assert_eq!(book.journal().len(), journal_len);
}

#[test]
fn test_conservation_across_a_session() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let club = add_club(&mut book, "0");
    let referrer = add_user(&mut book, "0", None, None);
    let u1 = add_user(&mut book, "1000", Some(referrer), Some(club));
    let u2 = add_user(&mut book, "1000", None, None);
    let u3 = add_user(&mut book, "0", None, None);
    let initial = book.total_balance();

    let deposit = create_deposit(&mut book, &settings, AccountRef::User(u3), dec("500"), None, None, 0).unwrap();
    accept_deposit(&mut book, deposit.id).unwrap();
    let withdraw = create_withdraw(&mut book, &settings, AccountRef::User(u2), dec("150"), None, 0).unwrap();
    accept_withdraw(&mut book, withdraw.id).unwrap();
    let transfer = create_transfer(&mut book, &settings, AccountRef::User(u3), u1, dec("75"), 0).unwrap();
    accept_transfer(&mut book, transfer.id).unwrap();

    let mut stakes = Decimal::ZERO;
    for (user, option, amount) in [(u1, option_a, "333.33"), (u2, option_b, "250"), (u3, option_a, "99.99")] {
        place_bet(&mut book, &settings, user, question_id, option, dec(amount)).unwrap();
        stakes += dec(amount);
    }
    select_winner(&mut book, &settings.commission, question_id, option_a).unwrap();

    // What left the house: winnings plus commissions
    let mut paid_out = Decimal::ZERO;
    for bet_id in book.bets_for_question(question_id) {
        paid_out += book.bet(bet_id).unwrap().win_amount;
        for commission in book.commissions_for_bet(bet_id) {
            paid_out += commission.amount;
        }
    }
    let house = stakes - paid_out;

    assert_eq!(book.total_balance() + house, initial + dec("500") - dec("150"));
    // Journal lines add up to the same net movement
    let journal_net: Decimal = book.journal().iter().map(|e| e.amount).sum();
    assert_eq!(journal_net, book.total_balance() - initial);
}

#[test]
fn test_failed_operation_leaves_book_untouched() {
    let Market { mut book, question_id, option_a, .. } = market();
    let settings = EngineSettings::default();
    let referrer = add_user(&mut book, "0", None, None);
    let user = add_user(&mut book, "100", Some(referrer), None);
    place_bet(&mut book, &settings, user, question_id, option_a, dec("100")).unwrap();
    select_winner(&mut book, &settings.commission, question_id, option_a).unwrap();

    // The referrer spends its commission, so the reversal cannot complete
    let commission = balance(&book, AccountRef::User(referrer));
    assert!(commission > Decimal::ZERO);
    book.debit(AccountRef::User(referrer), commission, EntryKind::WithdrawEscrow, question_id)
        .unwrap();
    let before = book.total_balance();
    let journal_len = book.journal().len();

    let err = book
        .transact(|book| unselect_winner(book, question_id))
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));
    assert_eq!(book.total_balance(), before);
    assert_eq!(book.journal().len(), journal_len);
    assert!(book.question(question_id).unwrap().processed);
}

#[test]
fn test_balances_never_go_negative() {
    let Market { mut book, question_id, option_a, .. } = market();
    let settings = EngineSettings::default();
    let user = AccountRef::User(add_user(&mut book, "120", None, None));

    let attempts: Vec<Result<(), AppError>> = vec![
        create_withdraw(&mut book, &settings, user, dec("130"), None, 0).map(|_| ()),
        place_bet(&mut book, &settings, user.id(), question_id, option_a, dec("121")).map(|_| ()),
        create_transfer(&mut book, &settings, user, uuid::Uuid::new_v4(), dec("100"), 0).map(|_| ()),
    ];
    for attempt in attempts {
        assert_err!(attempt);
    }
    assert_eq!(balance(&book, user), dec("120"));
    for entry in book.journal() {
        assert!(entry.balance_after >= Decimal::ZERO);
    }
}

#[test]
fn test_locked_match_blocks_bets() {
    let Market { mut book, match_id, question_id, option_a, .. } = market();
    let settings = EngineSettings::default();
    let user = add_user(&mut book, "500", None, None);

    lock_match(&mut book, match_id).expect("Failed to lock match");
    assert!(!accepts_bets(&book, question_id).unwrap());
    let err = place_bet(&mut book, &settings, user, question_id, option_a, dec("50")).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let reopened = assert_ok!(go_live_match(&mut book, match_id));
    assert_eq!(reopened.status, MatchStatus::Live);
    assert!(accepts_bets(&book, question_id).unwrap());
    assert_ok!(place_bet(&mut book, &settings, user, question_id, option_a, dec("50")));
}

#[test]
fn test_question_past_end_time_blocks_bets() {
    let Market { mut book, match_id, .. } = market();
    let settings = EngineSettings::default();
    let user = add_user(&mut book, "500", None, None);

    let ended = book.now() - chrono::Duration::minutes(1);
    let (question, options) = create_question(&mut book, match_id, "First goal?", Some(ended), &two_way_options())
        .expect("Failed to create question");
    assert_eq!(question.status, QuestionStatus::Live);
    assert_eq!(book.match_(match_id).unwrap().status, MatchStatus::Live);

    assert!(!accepts_bets(&book, question.id).unwrap());
    let err = place_bet(&mut book, &settings, user, question.id, options[0].id, dec("50")).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(balance(&book, AccountRef::User(user)), dec("500"));
}

#[test]
fn test_partial_refund_of_won_bet() {
    let Market { mut book, question_id, option_a, option_b, .. } = market();
    let settings = EngineSettings::default();
    let club = add_club(&mut book, "0");
    let referrer = add_user(&mut book, "0", None, None);
    let winner = add_user(&mut book, "100", Some(referrer), Some(club));
    let loser = add_user(&mut book, "100", None, None);

    let won = place_bet(&mut book, &settings, winner, question_id, option_a, dec("100")).unwrap();
    let lost = place_bet(&mut book, &settings, loser, question_id, option_b, dec("100")).unwrap();
    select_winner(&mut book, &settings.commission, question_id, option_a).unwrap();
    assert!(balance(&book, AccountRef::User(referrer)) > Decimal::ZERO);
    assert!(balance(&book, AccountRef::Club(club)) > Decimal::ZERO);
    let paid: Vec<(Uuid, Decimal)> = book
        .commissions_for_bet(won.id)
        .iter()
        .map(|c| (c.id, c.amount))
        .collect();
    assert_eq!(paid.len(), 2);

    let refunded = refund_bet(&mut book, won.id, Some(dec("50"))).expect("Failed to refund bet");
    assert_eq!(refunded.status, BetStatus::Refunded);
    assert_eq!(refunded.refunded_amount, dec("50.00"));
    assert_eq!(balance(&book, AccountRef::User(winner)), dec("50.00"));
    assert_eq!(balance(&book, AccountRef::User(referrer)), Decimal::ZERO);
    assert_eq!(balance(&book, AccountRef::Club(club)), Decimal::ZERO);

    // Paid commission rows stay as written; reversals are new rows
    for (id, amount) in &paid {
        assert_eq!(book.commission(*id).unwrap().amount, *amount);
    }
    assert_eq!(book.commissions_for_bet(won.id).len(), 4);
    assert!(book.active_commissions(won.id).is_empty());

    let refunded = refund_bet(&mut book, lost.id, Some(dec("50"))).expect("Failed to refund bet");
    assert_eq!(refunded.refunded_amount, dec("50.00"));
    assert_eq!(balance(&book, AccountRef::User(loser)), dec("50.00"));

    let err = refund_bet(&mut book, lost.id, None).unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
    assert_eq!(balance(&book, AccountRef::User(loser)), dec("50.00"));
}
