use super::ServiceContext;
use crate::error::{AppError, AppResult};
use crate::ledger::accounts;
use crate::models::{AccountRef, Club, LedgerEntry, User};
use crate::repositories::{ClubRepository, JournalRepository, UserRepository};
use tracing::info;
use uuid::Uuid;

/// Largest statement page a caller may request
pub const MAX_STATEMENT_ENTRIES: i64 = 500;

/// Account registration, roles and statements
pub struct AccountService {
    ctx: ServiceContext,
    users: UserRepository,
    clubs: ClubRepository,
    journal: JournalRepository,
}

impl AccountService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            users: UserRepository::new(ctx.pool.clone()),
            clubs: ClubRepository::new(ctx.pool.clone()),
            journal: JournalRepository::new(ctx.pool.clone()),
            ctx,
        }
    }

    pub async fn find_user(&self, user_id: Uuid) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    pub async fn find_club(&self, club_id: Uuid) -> AppResult<Club> {
        self.clubs
            .find_by_id(club_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("club {}", club_id)))
    }

    /// Clubs owned by the user
    pub async fn owned_clubs(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .clubs
            .find_by_owner(user_id)
            .await?
            .into_iter()
            .map(|club| club.id)
            .collect())
    }

    pub async fn register_user(
        &self,
        username: &str,
        referrer_id: Option<Uuid>,
        club_id: Option<Uuid>,
    ) -> AppResult<User> {
        if self.users.find_by_username(username.trim()).await?.is_some() {
            return Err(AppError::Validation(format!("username {} is taken", username.trim())));
        }

        let mut uow = self.ctx.begin().await?;
        let related = referrer_id
            .map(AccountRef::User)
            .into_iter()
            .chain(club_id.map(AccountRef::Club));
        uow.lock_accounts(related).await?;
        let user = accounts::register_user(uow.book_mut(), username, referrer_id, club_id)?;
        self.ctx.finish(uow).await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn create_club(&self, name: &str, owner_id: Option<Uuid>) -> AppResult<Club> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_accounts(owner_id.map(AccountRef::User)).await?;
        let club = accounts::create_club(uow.book_mut(), name, owner_id)?;
        self.ctx.finish(uow).await?;

        info!(club_id = %club.id, name = %club.name, "club created");
        Ok(club)
    }

    pub async fn set_game_editor(&self, user_id: Uuid, enabled: bool) -> AppResult<User> {
        let mut uow = self.ctx.begin().await?;
        uow.lock_accounts([AccountRef::User(user_id)]).await?;
        let user = accounts::set_game_editor(uow.book_mut(), user_id, enabled)?;
        self.ctx.finish(uow).await?;

        info!(%user_id, enabled, "game editor role updated");
        Ok(user)
    }

    /// Ensure an admin with this username exists, creating it if needed
    pub async fn bootstrap_admin(&self, username: &str) -> AppResult<User> {
        let existing = self.users.find_by_username(username.trim()).await?;

        let mut uow = self.ctx.begin().await?;
        let user_id = match existing {
            Some(user) if user.is_admin => return Ok(user),
            Some(user) => {
                uow.lock_accounts([AccountRef::User(user.id)]).await?;
                user.id
            }
            None => accounts::register_user(uow.book_mut(), username, None, None)?.id,
        };
        let admin = accounts::grant_admin(uow.book_mut(), user_id)?;
        self.ctx.finish(uow).await?;

        info!(user_id = %admin.id, username = %admin.username, "admin bootstrapped");
        Ok(admin)
    }

    /// Newest journal lines for an account
    pub async fn statement(&self, account: AccountRef, limit: i64) -> AppResult<Vec<LedgerEntry>> {
        if !(1..=MAX_STATEMENT_ENTRIES).contains(&limit) {
            return Err(AppError::Validation(format!(
                "statement limit must be between 1 and {}",
                MAX_STATEMENT_ENTRIES
            )));
        }
        Ok(self.journal.statement(account, limit).await?)
    }
}
