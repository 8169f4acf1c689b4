use crate::error::{AppError, AppResult};
use crate::models::{
    AccountRef, Bet, BetOption, BetQuestion, Club, Commission, Deposit, EntryKind, LedgerEntry,
    Match, Notification, Transfer, User, Withdraw,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// A row that must be written back when the book is persisted.
///
/// Variant order is the write order, so parents are stored before the rows
/// referencing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Change {
    User(Uuid),
    Club(Uuid),
    Match(Uuid),
    Question(Uuid),
    Option(Uuid),
    Transfer(Uuid),
    Deposit(Uuid),
    Withdraw(Uuid),
    Bet(Uuid),
    Commission(Uuid),
}

impl From<AccountRef> for Change {
    fn from(account: AccountRef) -> Self {
        match account {
            AccountRef::User(id) => Change::User(id),
            AccountRef::Club(id) => Change::Club(id),
        }
    }
}

macro_rules! entity_access {
    // Append-only entities: no mutable accessor
    ($field:ident: $ty:ty, $change:ident, $label:literal,
     $get:ident, $load:ident, $insert:ident) => {
        pub fn $get(&self, id: Uuid) -> AppResult<&$ty> {
            self.$field
                .get(&id)
                .ok_or_else(|| AppError::NotFound(format!(concat!($label, " {}"), id)))
        }

        /// Add a row read from storage
        pub fn $load(&mut self, entity: $ty) {
            self.$field.insert(entity.id, entity);
        }

        /// Add a row created by the running operation
        pub fn $insert(&mut self, entity: $ty) {
            self.changes.insert(Change::$change(entity.id));
            self.$field.insert(entity.id, entity);
        }
    };
    ($field:ident: $ty:ty, $change:ident, $label:literal,
     $get:ident, $get_mut:ident, $load:ident, $insert:ident) => {
        entity_access!($field: $ty, $change, $label, $get, $load, $insert);

        pub fn $get_mut(&mut self, id: Uuid) -> AppResult<&mut $ty> {
            let entity = self
                .$field
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!(concat!($label, " {}"), id)))?;
            self.changes.insert(Change::$change(id));
            Ok(entity)
        }
    };
}

/// In-memory working set for one engine operation.
///
/// Holds the locked rows, the set of rows changed so far, the ledger
/// journal and the notifications to send once the changes are committed.
/// Balances only move through [`Book::credit`] and [`Book::debit`].
#[derive(Debug, Clone)]
pub struct Book {
    now: NaiveDateTime,
    users: BTreeMap<Uuid, User>,
    clubs: BTreeMap<Uuid, Club>,
    matches: HashMap<Uuid, Match>,
    questions: HashMap<Uuid, BetQuestion>,
    options: HashMap<Uuid, BetOption>,
    bets: HashMap<Uuid, Bet>,
    deposits: HashMap<Uuid, Deposit>,
    withdraws: HashMap<Uuid, Withdraw>,
    transfers: HashMap<Uuid, Transfer>,
    commissions: HashMap<Uuid, Commission>,
    changes: BTreeSet<Change>,
    journal: Vec<LedgerEntry>,
    outbox: Vec<Notification>,
}

impl Default for Book {
    fn default() -> Self {
        Self::at(chrono::Utc::now().naive_utc())
    }
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty book whose clock reads `now`
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now,
            users: BTreeMap::new(),
            clubs: BTreeMap::new(),
            matches: HashMap::new(),
            questions: HashMap::new(),
            options: HashMap::new(),
            bets: HashMap::new(),
            deposits: HashMap::new(),
            withdraws: HashMap::new(),
            transfers: HashMap::new(),
            commissions: HashMap::new(),
            changes: BTreeSet::new(),
            journal: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Run `op` all-or-nothing: on error the book is restored to the state
    /// it had before the call.
    pub fn transact<T>(&mut self, op: impl FnOnce(&mut Book) -> AppResult<T>) -> AppResult<T> {
        let snapshot = self.clone();
        let result = op(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    /// Move the clock, for long-lived in-memory books
    pub fn set_now(&mut self, now: NaiveDateTime) {
        self.now = now;
    }

    entity_access!(users: User, User, "user", user, user_mut, load_user, insert_user);
    entity_access!(clubs: Club, Club, "club", club, club_mut, load_club, insert_club);
    entity_access!(matches: Match, Match, "match", match_, match_mut, load_match, insert_match);
    entity_access!(questions: BetQuestion, Question, "question", question, question_mut, load_question, insert_question);
    entity_access!(options: BetOption, Option, "option", option, option_mut, load_option, insert_option);
    entity_access!(bets: Bet, Bet, "bet", bet, bet_mut, load_bet, insert_bet);
    entity_access!(deposits: Deposit, Deposit, "deposit", deposit, deposit_mut, load_deposit, insert_deposit);
    entity_access!(withdraws: Withdraw, Withdraw, "withdraw", withdraw, withdraw_mut, load_withdraw, insert_withdraw);
    entity_access!(transfers: Transfer, Transfer, "transfer", transfer, transfer_mut, load_transfer, insert_transfer);
    entity_access!(commissions: Commission, Commission, "commission", commission, load_commission, insert_commission);

    /// Options of a question in display order
    pub fn options_for_question(&self, question_id: Uuid) -> Vec<&BetOption> {
        let mut options: Vec<&BetOption> = self
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .collect();
        options.sort_by_key(|o| (o.position, o.id));
        options
    }

    /// Ids of the bets on a question, oldest first
    pub fn bets_for_question(&self, question_id: Uuid) -> Vec<Uuid> {
        let mut bets: Vec<&Bet> = self
            .bets
            .values()
            .filter(|b| b.question_id == question_id)
            .collect();
        bets.sort_by_key(|b| (b.created_at, b.id));
        bets.into_iter().map(|b| b.id).collect()
    }

    /// Commissions paid for a bet that have not been reversed yet
    pub fn active_commissions(&self, bet_id: Uuid) -> Vec<Commission> {
        let reversed: BTreeSet<Uuid> = self
            .commissions
            .values()
            .filter_map(|c| c.reverses)
            .collect();
        let mut active: Vec<Commission> = self
            .commissions
            .values()
            .filter(|c| c.bet_id == bet_id && !c.is_reversal() && !reversed.contains(&c.id))
            .cloned()
            .collect();
        active.sort_by_key(|c| (c.created_at, c.id));
        active
    }

    pub fn commissions_for_bet(&self, bet_id: Uuid) -> Vec<&Commission> {
        self.commissions.values().filter(|c| c.bet_id == bet_id).collect()
    }

    // ========================================================================
    // Ledger primitives
    // ========================================================================

    pub fn balance(&self, account: AccountRef) -> AppResult<Decimal> {
        match account {
            AccountRef::User(id) => Ok(self.user(id)?.balance),
            AccountRef::Club(id) => Ok(self.club(id)?.balance),
        }
    }

    /// Fails unless the account exists and is not soft-deleted
    pub fn ensure_active(&self, account: AccountRef) -> AppResult<()> {
        let deleted_at = match account {
            AccountRef::User(id) => self.user(id)?.deleted_at,
            AccountRef::Club(id) => self.club(id)?.deleted_at,
        };
        match deleted_at {
            None => Ok(()),
            Some(_) => Err(AppError::InvalidState(format!("account {} is deactivated", account))),
        }
    }

    /// Add `amount` to the account. Returns the new balance.
    pub fn credit(
        &mut self,
        account: AccountRef,
        amount: Decimal,
        kind: EntryKind,
        reference_id: Uuid,
    ) -> AppResult<Decimal> {
        Self::check_primitive_amount(amount)?;
        if amount.is_zero() {
            return self.balance(account);
        }
        self.post(account, amount, kind, reference_id)
    }

    /// Take `amount` from the account, failing with `InsufficientFunds`
    /// rather than going below zero. Returns the new balance.
    pub fn debit(
        &mut self,
        account: AccountRef,
        amount: Decimal,
        kind: EntryKind,
        reference_id: Uuid,
    ) -> AppResult<Decimal> {
        Self::check_primitive_amount(amount)?;
        if amount.is_zero() {
            return self.balance(account);
        }
        self.post(account, -amount, kind, reference_id)
    }

    fn check_primitive_amount(amount: Decimal) -> AppResult<()> {
        if amount < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "ledger amount must not be negative, got {}",
                amount
            )));
        }
        Ok(())
    }

    fn post(
        &mut self,
        account: AccountRef,
        delta: Decimal,
        kind: EntryKind,
        reference_id: Uuid,
    ) -> AppResult<Decimal> {
        let slot = match account {
            AccountRef::User(id) => {
                &mut self
                    .users
                    .get_mut(&id)
                    .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?
                    .balance
            }
            AccountRef::Club(id) => {
                &mut self
                    .clubs
                    .get_mut(&id)
                    .ok_or_else(|| AppError::NotFound(format!("club {}", id)))?
                    .balance
            }
        };

        let before = *slot;
        let after = before + delta;
        if after < Decimal::ZERO {
            return Err(AppError::InsufficientFunds {
                account,
                available: before,
                required: -delta,
            });
        }
        *slot = after;

        self.changes.insert(Change::from(account));
        self.journal.push(LedgerEntry {
            id: Uuid::new_v4(),
            account,
            kind,
            amount: delta,
            balance_before: before,
            balance_after: after,
            reference_id,
            created_at: self.now,
        });
        Ok(after)
    }

    /// Sum of every balance held in the book
    pub fn total_balance(&self) -> Decimal {
        let users: Decimal = self.users.values().map(|u| u.balance).sum();
        let clubs: Decimal = self.clubs.values().map(|c| c.balance).sum();
        users + clubs
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn notify(&mut self, account: AccountRef, message: impl Into<String>) {
        self.outbox.push(Notification::new(account, message));
    }

    pub fn changes(&self) -> impl Iterator<Item = Change> + '_ {
        self.changes.iter().copied()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty() || !self.journal.is_empty()
    }

    pub fn journal(&self) -> &[LedgerEntry] {
        &self.journal
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.outbox
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }
}
