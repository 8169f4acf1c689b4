//! One Postgres transaction wrapped around one in-memory [`Book`].
//!
//! Rows are locked in a fixed order: match, question, options, bets,
//! transaction records, then accounts (users by id, then clubs by id).
//! Dropping a unit of work without committing rolls everything back.

use crate::error::{AppError, AppResult, RepositoryError};
use crate::ledger::{Book, Change};
use crate::models::{AccountRef, Deposit, Transfer, Withdraw};
use crate::repositories::{
    BetRepository, ClubRepository, JournalRepository, MarketRepository, RequestKind,
    TransactionRepository, UserRepository,
};
use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
    book: Book,
    questions: BTreeSet<Uuid>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> AppResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            tx,
            book: Book::new(),
            questions: BTreeSet::new(),
        })
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut Book {
        &mut self.book
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    // =========================================================================
    // Markets
    // =========================================================================

    pub async fn lock_match(&mut self, match_id: Uuid) -> AppResult<()> {
        let m = MarketRepository::lock_match(&mut self.tx, match_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("match {}", match_id)))?;
        self.book.load_match(m);
        Ok(())
    }

    /// Lock a question with its match and options. With `with_bets` the
    /// question's bets are locked too and its commission rows loaded.
    pub async fn lock_question(&mut self, question_id: Uuid, with_bets: bool) -> AppResult<()> {
        let match_id = MarketRepository::match_id_of_question(&mut self.tx, question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("question {}", question_id)))?;
        self.lock_match(match_id).await?;

        let question = MarketRepository::lock_question(&mut self.tx, question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("question {}", question_id)))?;
        self.book.load_question(question);
        self.questions.insert(question_id);

        for option in MarketRepository::lock_options(&mut self.tx, question_id).await? {
            self.book.load_option(option);
        }

        if with_bets {
            for bet in BetRepository::lock_by_question(&mut self.tx, question_id).await? {
                self.book.load_bet(bet);
            }
            for commission in BetRepository::commissions_for_question(&mut self.tx, question_id).await? {
                self.book.load_commission(commission);
            }
        }
        Ok(())
    }

    /// Lock the question a bet belongs to, with all its bets
    pub async fn lock_bet(&mut self, bet_id: Uuid) -> AppResult<()> {
        let question_id = BetRepository::question_id_of_bet(&mut self.tx, bet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("bet {}", bet_id)))?;
        self.lock_question(question_id, true).await
    }

    // =========================================================================
    // Transaction records
    // =========================================================================

    pub async fn lock_deposit(&mut self, deposit_id: Uuid) -> AppResult<Deposit> {
        let deposit = TransactionRepository::lock_deposit(&mut self.tx, deposit_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("deposit {}", deposit_id)))?;
        self.book.load_deposit(deposit.clone());
        Ok(deposit)
    }

    pub async fn lock_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<Withdraw> {
        let withdraw = TransactionRepository::lock_withdraw(&mut self.tx, withdraw_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("withdraw {}", withdraw_id)))?;
        self.book.load_withdraw(withdraw.clone());
        Ok(withdraw)
    }

    /// Lock a transfer and its internal deposit, if one exists
    pub async fn lock_transfer(&mut self, transfer_id: Uuid) -> AppResult<Transfer> {
        let transfer = TransactionRepository::lock_transfer(&mut self.tx, transfer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transfer {}", transfer_id)))?;
        if let Some(deposit_id) = transfer.deposit_id {
            self.lock_deposit(deposit_id).await?;
        }
        self.book.load_transfer(transfer.clone());
        Ok(transfer)
    }

    /// Requests of `kind` the account opened since `since`
    pub async fn count_requests_since(
        &mut self,
        kind: RequestKind,
        account: AccountRef,
        since: NaiveDateTime,
    ) -> AppResult<i64> {
        Ok(TransactionRepository::count_since(&mut self.tx, kind, account, since).await?)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Lock accounts users first, then clubs, each in ascending id order.
    /// Every requested account must exist.
    pub async fn lock_accounts(&mut self, accounts: impl IntoIterator<Item = AccountRef>) -> AppResult<()> {
        let wanted: BTreeSet<AccountRef> = accounts.into_iter().collect();
        let user_ids: Vec<Uuid> = wanted.iter().filter_map(|a| a.user_id()).collect();
        let club_ids: Vec<Uuid> = wanted.iter().filter_map(|a| a.club_id()).collect();

        for user in UserRepository::lock_many(&mut self.tx, &user_ids).await? {
            self.book.load_user(user);
        }
        for club in ClubRepository::lock_many(&mut self.tx, &club_ids).await? {
            self.book.load_club(club);
        }

        for account in wanted {
            if self.book.balance(account).is_err() {
                return Err(AppError::NotFound(format!("account {}", account)));
            }
        }
        Ok(())
    }

    /// Lock every account settlement of the loaded bets may touch: bettors,
    /// their referrers and clubs, and earlier commission beneficiaries.
    pub async fn lock_settlement_accounts(&mut self) -> AppResult<()> {
        let bettor_ids: Vec<Uuid> = {
            let mut ids: BTreeSet<Uuid> = BTreeSet::new();
            for question in self.loaded_questions() {
                for bet_id in self.book.bets_for_question(question) {
                    ids.insert(self.book.bet(bet_id)?.user_id);
                }
            }
            ids.into_iter().collect()
        };

        // Profiles are read unlocked only to learn who else gets paid
        let bettors = UserRepository::find_many(&mut self.tx, &bettor_ids).await?;
        let mut accounts: BTreeSet<AccountRef> = BTreeSet::new();
        for bettor in &bettors {
            accounts.insert(AccountRef::User(bettor.id));
            if let Some(referrer_id) = bettor.referrer_id {
                accounts.insert(AccountRef::User(referrer_id));
            }
            if let Some(club_id) = bettor.club_id {
                accounts.insert(AccountRef::Club(club_id));
            }
        }
        for question in self.loaded_questions() {
            for bet_id in self.book.bets_for_question(question) {
                for commission in self.book.commissions_for_bet(bet_id) {
                    accounts.insert(commission.beneficiary);
                }
            }
        }

        self.lock_accounts(accounts).await
    }

    fn loaded_questions(&self) -> Vec<Uuid> {
        self.questions.iter().copied().collect()
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Write every changed row and the journal, then commit. Returns the
    /// book so the caller can dispatch its notifications.
    pub async fn commit(mut self) -> AppResult<Book> {
        let changes: Vec<Change> = self.book.changes().collect();
        for change in &changes {
            self.write(*change).await?;
        }
        for entry in self.book.journal() {
            JournalRepository::insert(&mut self.tx, entry)
                .await
                .map_err(RepositoryError::from)?;
        }

        self.tx.commit().await?;
        debug!(rows = changes.len(), journal = self.book.journal().len(), "unit of work committed");
        Ok(self.book)
    }

    async fn write(&mut self, change: Change) -> AppResult<()> {
        let conn: &mut PgConnection = &mut self.tx;
        let book = &self.book;
        let result = match change {
            Change::User(id) => UserRepository::upsert(conn, book.user(id)?).await,
            Change::Club(id) => ClubRepository::upsert(conn, book.club(id)?).await,
            Change::Match(id) => MarketRepository::upsert_match(conn, book.match_(id)?).await,
            Change::Question(id) => MarketRepository::upsert_question(conn, book.question(id)?).await,
            Change::Option(id) => MarketRepository::upsert_option(conn, book.option(id)?).await,
            Change::Transfer(id) => TransactionRepository::upsert_transfer(conn, book.transfer(id)?).await,
            Change::Deposit(id) => TransactionRepository::upsert_deposit(conn, book.deposit(id)?).await,
            Change::Withdraw(id) => TransactionRepository::upsert_withdraw(conn, book.withdraw(id)?).await,
            Change::Bet(id) => BetRepository::upsert(conn, book.bet(id)?).await,
            Change::Commission(id) => BetRepository::insert_commission(conn, book.commission(id)?).await,
        };
        result.map_err(RepositoryError::from)?;
        Ok(())
    }
}
