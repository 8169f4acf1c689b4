use crate::models::User;
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, balance, referrer_id, club_id, is_admin, \
                            is_game_editor, deleted_at, created_at";

/// Repository for user data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> SqlxResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Read users without locking them
    pub async fn find_many(conn: &mut PgConnection, ids: &[Uuid]) -> SqlxResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1) ORDER BY id",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(conn)
        .await
    }

    /// Lock users in ascending id order
    pub async fn lock_many(conn: &mut PgConnection, ids: &[Uuid]) -> SqlxResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(conn)
        .await
    }

    /// Insert or update a user row, balance included
    pub async fn upsert(conn: &mut PgConnection, user: &User) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, balance, referrer_id, club_id, is_admin, is_game_editor, deleted_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                balance = EXCLUDED.balance,
                referrer_id = EXCLUDED.referrer_id,
                club_id = EXCLUDED.club_id,
                is_admin = EXCLUDED.is_admin,
                is_game_editor = EXCLUDED.is_game_editor,
                deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.balance)
        .bind(user.referrer_id)
        .bind(user.club_id)
        .bind(user.is_admin)
        .bind(user.is_game_editor)
        .bind(user.deleted_at)
        .bind(user.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
