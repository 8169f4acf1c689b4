#![allow(dead_code)]

use bookie_backend::commands::{Command, CommandOutcome};
use bookie_backend::ledger::lifecycle::{create_match, create_question};
use bookie_backend::ledger::Book;
use bookie_backend::models::*;
use bookie_backend::services::NotificationHub;
use bookie_backend::Engine;
use chrono::Duration;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Exact decimal from a literal, e.g. `dec("195.00")`
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("Failed to parse decimal literal")
}

// ============================================================================
// In-memory fixtures
// ============================================================================

/// A live match with one question: option A pays 2.0, option B pays 1.5
pub struct Market {
    pub book: Book,
    pub match_id: Uuid,
    pub question_id: Uuid,
    pub option_a: Uuid,
    pub option_b: Uuid,
}

pub fn two_way_options() -> Vec<NewOption> {
    vec![
        NewOption {
            label: "A".to_string(),
            rate: dec("2.0"),
            stake_limit: None,
        },
        NewOption {
            label: "B".to_string(),
            rate: dec("1.5"),
            stake_limit: None,
        },
    ]
}

pub fn market() -> Market {
    let mut book = Book::new();
    let now = book.now();
    let m = create_match(&mut book, "football", "Home vs Away", now, now + Duration::hours(2))
        .expect("Failed to create match");
    let (q, options) = create_question(&mut book, m.id, "Who wins?", None, &two_way_options())
        .expect("Failed to create question");
    Market {
        book,
        match_id: m.id,
        question_id: q.id,
        option_a: options[0].id,
        option_b: options[1].id,
    }
}

pub fn add_user(book: &mut Book, balance: &str, referrer: Option<Uuid>, club: Option<Uuid>) -> Uuid {
    let user = User::new(format!("user-{}", Uuid::new_v4()), referrer, club).with_balance(dec(balance));
    let id = user.id;
    book.load_user(user);
    id
}

pub fn add_club(book: &mut Book, balance: &str) -> Uuid {
    let club = Club::new("Night Owls", None).with_balance(dec(balance));
    let id = club.id;
    book.load_club(club);
    id
}

pub fn balance(book: &Book, account: AccountRef) -> Decimal {
    book.balance(account).expect("Failed to read balance")
}

// ============================================================================
// Database fixtures
// ============================================================================

pub struct TestDatabase {
    pub pool: PgPool,
    pub engine: Engine,
    pub hub: Arc<NotificationHub>,
    pub admin: User,
}

impl TestDatabase {
    /// Engine over a migrated pool (from `#[sqlx::test]`) with an admin user
    pub async fn from_pool(pool: PgPool) -> Self {
        let hub = Arc::new(NotificationHub::default());
        let engine = Engine::new(pool.clone(), hub.clone());
        let admin = engine
            .accounts()
            .bootstrap_admin("admin")
            .await
            .expect("Failed to bootstrap admin");
        Self { pool, engine, hub, admin }
    }

    /// Run a command as the admin
    pub async fn admin_run(&self, command: Command) -> CommandOutcome {
        self.engine
            .execute(self.admin.id, command)
            .await
            .expect("Admin command failed")
    }

    /// Register a user and give it a starting balance directly in storage
    pub async fn user_with_balance(&self, username: &str, balance: &str) -> User {
        let user = match self
            .admin_run(Command::RegisterUser {
                username: username.to_string(),
                referrer_id: None,
                club_id: None,
            })
            .await
        {
            CommandOutcome::User(user) => user,
            other => panic!("unexpected outcome {:?}", other),
        };
        sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
            .bind(dec(balance))
            .bind(user.id)
            .execute(&self.pool)
            .await
            .expect("Failed to seed balance");
        user
    }

    pub async fn user_balance(&self, user_id: Uuid) -> Decimal {
        sqlx::query_scalar::<_, Decimal>("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read balance")
    }

    /// A live match with a two-option question; returns (question, [A, B])
    pub async fn open_question(&self) -> (BetQuestion, Vec<BetOption>) {
        let now = chrono::Utc::now().naive_utc();
        let m = match self
            .admin_run(Command::CreateMatch {
                game: "football".to_string(),
                title: "Home vs Away".to_string(),
                start_time: now - Duration::minutes(5),
                end_time: now + Duration::hours(2),
            })
            .await
        {
            CommandOutcome::Match(m) => m,
            other => panic!("unexpected outcome {:?}", other),
        };

        match self
            .admin_run(Command::CreateQuestion {
                match_id: m.id,
                question: "Who wins?".to_string(),
                end_time: None,
                options: two_way_options(),
            })
            .await
        {
            CommandOutcome::QuestionCreated { question, options } => (question, options),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
