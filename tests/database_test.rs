mod helpers;

use bookie_backend::commands::{Command, CommandOutcome};
use bookie_backend::error::{AppError, LimitViolation};
use bookie_backend::models::*;
use bookie_backend::services::ConfigService;
use helpers::*;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

// ============================================================================
// Migration Tests
// ============================================================================

#[sqlx::test]
async fn test_migrations_ran(pool: PgPool) {
    let tables = vec![
        "users",
        "clubs",
        "matches",
        "bet_questions",
        "bet_options",
        "bets",
        "deposits",
        "withdraws",
        "transfers",
        "commissions",
        "ledger_entries",
        "settings",
    ];

    for table in tables {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Failed to query information_schema");
        let exists: bool = row.get(0);
        assert!(exists, "Table {} should exist", table);
    }
}

// ============================================================================
// Settings Tests
// ============================================================================

#[sqlx::test]
async fn test_settings_defaults_and_updates(pool: PgPool) {
    let config = ConfigService::new(pool);

    assert_eq!(config.get("bet.min_amount").await.expect("Failed to read setting"), "10");
    assert!(config.get("no.such.key").await.unwrap_err().is_not_found());

    let updated = config.set("bet.min_amount", "25").await.expect("Failed to update setting");
    assert_eq!(updated.bet.min, dec("25"));
    assert_eq!(config.settings().await.unwrap().bet.min, dec("25"));

    let err = config.set("bet.min_amount", "-1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = config.set("bet.colour", "blue").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(config.settings().await.unwrap().bet.min, dec("25"));
}

// ============================================================================
// Settlement Tests
// ============================================================================

#[sqlx::test]
async fn test_bet_and_settle_end_to_end(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let u1 = db.user_with_balance("u1", "1000").await;
    let u2 = db.user_with_balance("u2", "1000").await;
    let (question, options) = db.open_question().await;

    for (user, option) in [(&u1, &options[0]), (&u2, &options[1])] {
        let outcome = db
            .engine
            .execute(
                user.id,
                Command::PlaceBet {
                    question_id: question.id,
                    option_id: option.id,
                    amount: dec("100"),
                },
            )
            .await
            .expect("Failed to place bet");
        assert!(matches!(outcome, CommandOutcome::Bet(_)));
    }
    assert_eq!(db.user_balance(u1.id).await, dec("900"));

    let select = Command::SelectWinner {
        question_id: question.id,
        option_id: options[0].id,
    };
    match db.admin_run(select.clone()).await {
        CommandOutcome::Question(q) => {
            assert_eq!(q.status, QuestionStatus::Closed);
            assert_eq!(q.winner_option_id, Some(options[0].id));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(db.user_balance(u1.id).await, dec("1095.00"));
    assert_eq!(db.user_balance(u2.id).await, dec("900"));

    let err = db.engine.execute(db.admin.id, select).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
    assert_eq!(db.user_balance(u1.id).await, dec("1095.00"));

    match db
        .engine
        .execute(
            u1.id,
            Command::Statement {
                account: AccountRef::User(u1.id),
                limit: 10,
            },
        )
        .await
        .expect("Failed to read statement")
    {
        CommandOutcome::Statement(entries) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].kind, EntryKind::BetWon);
            assert_eq!(entries[0].balance_after, dec("1095.00"));
            assert_eq!(entries[1].kind, EntryKind::BetPlaced);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[sqlx::test]
async fn test_concurrent_bets_cannot_overdraw(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user = db.user_with_balance("racer", "150").await;
    let (question, options) = db.open_question().await;

    let bet = |option_id| {
        db.engine.execute(
            user.id,
            Command::PlaceBet {
                question_id: question.id,
                option_id,
                amount: dec("100"),
            },
        )
    };
    let (first, second) = tokio::join!(bet(options[0].id), bet(options[1].id));

    let results = [first, second];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientFunds { .. }))));
    assert_eq!(db.user_balance(user.id).await, dec("50"));
}

// ============================================================================
// Approval Tests
// ============================================================================

#[sqlx::test]
async fn test_deposit_accept_and_daily_limit(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user = db.user_with_balance("depositor", "0").await;
    let mut notifications = db.hub.subscribe();
    db.admin_run(Command::SetSetting {
        key: "deposit.daily_count".to_string(),
        value: "1".to_string(),
    })
    .await;

    let request = Command::CreateDeposit {
        account: AccountRef::User(user.id),
        amount: dec("250"),
        method: Some("bank".to_string()),
        reference: None,
    };
    let deposit = match db.engine.execute(user.id, request.clone()).await.expect("Failed to create deposit") {
        CommandOutcome::Deposit(deposit) => deposit,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(deposit.status, ApprovalStatus::Pending);
    assert_eq!(db.user_balance(user.id).await, Decimal::ZERO);

    let err = db.engine.execute(user.id, request).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::LimitExceeded(LimitViolation::DailyCount { maximum: 1, .. })
    ));

    // Only admins approve
    let err = db
        .engine
        .execute(user.id, Command::AcceptDeposit { deposit_id: deposit.id })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    db.admin_run(Command::AcceptDeposit { deposit_id: deposit.id }).await;
    assert_eq!(db.user_balance(user.id).await, dec("250"));
    let notification = notifications.recv().await.expect("Failed to receive notification");
    assert_eq!(notification.account, AccountRef::User(user.id));

    let err = db
        .engine
        .execute(db.admin.id, Command::AcceptDeposit { deposit_id: deposit.id })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)));
    assert_eq!(db.user_balance(user.id).await, dec("250"));
}

#[sqlx::test]
async fn test_transfer_round_trip(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let sender = db.user_with_balance("sender", "400").await;
    let recipient = db.user_with_balance("recipient", "0").await;

    let transfer = match db
        .engine
        .execute(
            sender.id,
            Command::CreateTransfer {
                sender: AccountRef::User(sender.id),
                recipient_id: recipient.id,
                amount: dec("150"),
            },
        )
        .await
        .expect("Failed to create transfer")
    {
        CommandOutcome::Transfer(transfer) => transfer,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(db.user_balance(sender.id).await, dec("250"));

    db.admin_run(Command::AcceptTransfer { transfer_id: transfer.id }).await;
    assert_eq!(db.user_balance(recipient.id).await, dec("150"));

    db.admin_run(Command::CancelTransfer { transfer_id: transfer.id }).await;
    assert_eq!(db.user_balance(sender.id).await, dec("400"));
    assert_eq!(db.user_balance(recipient.id).await, Decimal::ZERO);

    let internal: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM deposits WHERE transfer_id = $1 AND status = 'cancelled'",
    )
    .bind(transfer.id)
    .fetch_one(&db.pool)
    .await
    .expect("Failed to count deposits");
    assert_eq!(internal, 1);
}

#[sqlx::test]
async fn test_withdraw_cancel_after_accept(pool: PgPool) {
    let db = TestDatabase::from_pool(pool).await;
    let user = db.user_with_balance("withdrawer", "500").await;

    let withdraw = match db
        .engine
        .execute(
            user.id,
            Command::CreateWithdraw {
                account: AccountRef::User(user.id),
                amount: dec("200"),
                destination: None,
            },
        )
        .await
        .expect("Failed to create withdraw")
    {
        CommandOutcome::Withdraw(withdraw) => withdraw,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(db.user_balance(user.id).await, dec("300"));

    db.admin_run(Command::AcceptWithdraw { withdraw_id: withdraw.id }).await;
    assert_eq!(db.user_balance(user.id).await, dec("300"));
    db.admin_run(Command::CancelWithdraw { withdraw_id: withdraw.id }).await;
    assert_eq!(db.user_balance(user.id).await, dec("500"));
}
