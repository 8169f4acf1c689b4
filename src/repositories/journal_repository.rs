use crate::models::{AccountRef, LedgerEntry};
use sqlx::{PgConnection, PgPool, Result as SqlxResult};

/// Append-only ledger journal
pub struct JournalRepository {
    pool: PgPool,
}

impl JournalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest entries for an account
    pub async fn statement(&self, account: AccountRef, limit: i64) -> SqlxResult<Vec<LedgerEntry>> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, club_id, kind, amount, balance_before, balance_after, reference_id, created_at
            FROM ledger_entries
            WHERE user_id IS NOT DISTINCT FROM $1 AND club_id IS NOT DISTINCT FROM $2
            ORDER BY seq DESC
            LIMIT $3
            "#,
        )
        .bind(account.user_id())
        .bind(account.club_id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn insert(conn: &mut PgConnection, entry: &LedgerEntry) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, user_id, club_id, kind, amount, balance_before, balance_after, reference_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.account.user_id())
        .bind(entry.account.club_id())
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(entry.reference_id)
        .bind(entry.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
