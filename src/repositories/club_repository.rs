use crate::models::Club;
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const CLUB_COLUMNS: &str = "id, name, owner_id, balance, deleted_at, created_at";

/// Repository for club data access
pub struct ClubRepository {
    pool: PgPool,
}

impl ClubRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a club by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Club>> {
        sqlx::query_as::<_, Club>(&format!("SELECT {} FROM clubs WHERE id = $1", CLUB_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Clubs owned by a user
    pub async fn find_by_owner(&self, owner_id: Uuid) -> SqlxResult<Vec<Club>> {
        sqlx::query_as::<_, Club>(&format!(
            "SELECT {} FROM clubs WHERE owner_id = $1 AND deleted_at IS NULL ORDER BY id",
            CLUB_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Lock clubs in ascending id order
    pub async fn lock_many(conn: &mut PgConnection, ids: &[Uuid]) -> SqlxResult<Vec<Club>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Club>(&format!(
            "SELECT {} FROM clubs WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            CLUB_COLUMNS
        ))
        .bind(ids)
        .fetch_all(conn)
        .await
    }

    pub async fn upsert(conn: &mut PgConnection, club: &Club) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clubs (id, name, owner_id, balance, deleted_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                owner_id = EXCLUDED.owner_id,
                balance = EXCLUDED.balance,
                deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(club.id)
        .bind(&club.name)
        .bind(club.owner_id)
        .bind(club.balance)
        .bind(club.deleted_at)
        .bind(club.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
