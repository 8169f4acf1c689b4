//! Deposits, withdraws and transfers

use crate::models::{AccountRef, Deposit, Transfer, Withdraw};
use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const DEPOSIT_COLUMNS: &str = "id, user_id, club_id, amount, method, reference, transfer_id, \
                               status, balance_after, processed_at, created_at";
const WITHDRAW_COLUMNS: &str = "id, user_id, club_id, amount, destination, status, \
                                balance_after, processed_at, created_at";
const TRANSFER_COLUMNS: &str = "id, sender_user_id, sender_club_id, recipient_id, amount, \
                                status, deposit_id, processed_at, created_at";

/// Which request table a daily count applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Deposit,
    Withdraw,
    Transfer,
}

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_deposit(&self, id: Uuid) -> SqlxResult<Option<Deposit>> {
        sqlx::query_as::<_, Deposit>(&format!("SELECT {} FROM deposits WHERE id = $1", DEPOSIT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_withdraw(&self, id: Uuid) -> SqlxResult<Option<Withdraw>> {
        sqlx::query_as::<_, Withdraw>(&format!("SELECT {} FROM withdraws WHERE id = $1", WITHDRAW_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_transfer(&self, id: Uuid) -> SqlxResult<Option<Transfer>> {
        sqlx::query_as::<_, Transfer>(&format!("SELECT {} FROM transfers WHERE id = $1", TRANSFER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Pending deposits awaiting review, oldest first
    pub async fn pending_deposits(&self) -> SqlxResult<Vec<Deposit>> {
        sqlx::query_as::<_, Deposit>(&format!(
            "SELECT {} FROM deposits WHERE status = 'pending' AND transfer_id IS NULL ORDER BY created_at",
            DEPOSIT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    // =========================================================================
    // Unit of work
    // =========================================================================

    /// Requests the account opened at or after `since`; transfer legs excluded
    pub async fn count_since(
        conn: &mut PgConnection,
        kind: RequestKind,
        account: AccountRef,
        since: NaiveDateTime,
    ) -> SqlxResult<i64> {
        let sql = match kind {
            RequestKind::Deposit => {
                "SELECT COUNT(*) FROM deposits \
                 WHERE user_id IS NOT DISTINCT FROM $1 AND club_id IS NOT DISTINCT FROM $2 \
                 AND transfer_id IS NULL AND created_at >= $3"
            }
            RequestKind::Withdraw => {
                "SELECT COUNT(*) FROM withdraws \
                 WHERE user_id IS NOT DISTINCT FROM $1 AND club_id IS NOT DISTINCT FROM $2 \
                 AND created_at >= $3"
            }
            RequestKind::Transfer => {
                "SELECT COUNT(*) FROM transfers \
                 WHERE sender_user_id IS NOT DISTINCT FROM $1 AND sender_club_id IS NOT DISTINCT FROM $2 \
                 AND created_at >= $3"
            }
        };
        sqlx::query_scalar::<_, i64>(sql)
            .bind(account.user_id())
            .bind(account.club_id())
            .bind(since)
            .fetch_one(conn)
            .await
    }

    pub async fn lock_deposit(conn: &mut PgConnection, id: Uuid) -> SqlxResult<Option<Deposit>> {
        sqlx::query_as::<_, Deposit>(&format!(
            "SELECT {} FROM deposits WHERE id = $1 FOR UPDATE",
            DEPOSIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn lock_withdraw(conn: &mut PgConnection, id: Uuid) -> SqlxResult<Option<Withdraw>> {
        sqlx::query_as::<_, Withdraw>(&format!(
            "SELECT {} FROM withdraws WHERE id = $1 FOR UPDATE",
            WITHDRAW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn lock_transfer(conn: &mut PgConnection, id: Uuid) -> SqlxResult<Option<Transfer>> {
        sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {} FROM transfers WHERE id = $1 FOR UPDATE",
            TRANSFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn upsert_deposit(conn: &mut PgConnection, d: &Deposit) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deposits
                (id, user_id, club_id, amount, method, reference, transfer_id,
                 status, balance_after, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                balance_after = EXCLUDED.balance_after,
                processed_at = EXCLUDED.processed_at
            "#,
        )
        .bind(d.id)
        .bind(d.account.user_id())
        .bind(d.account.club_id())
        .bind(d.amount)
        .bind(&d.method)
        .bind(&d.reference)
        .bind(d.transfer_id)
        .bind(d.status)
        .bind(d.balance_after)
        .bind(d.processed_at)
        .bind(d.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_withdraw(conn: &mut PgConnection, w: &Withdraw) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdraws
                (id, user_id, club_id, amount, destination, status, balance_after, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                balance_after = EXCLUDED.balance_after,
                processed_at = EXCLUDED.processed_at
            "#,
        )
        .bind(w.id)
        .bind(w.account.user_id())
        .bind(w.account.club_id())
        .bind(w.amount)
        .bind(&w.destination)
        .bind(w.status)
        .bind(w.balance_after)
        .bind(w.processed_at)
        .bind(w.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_transfer(conn: &mut PgConnection, t: &Transfer) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfers
                (id, sender_user_id, sender_club_id, recipient_id, amount, status, deposit_id, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                deposit_id = EXCLUDED.deposit_id,
                processed_at = EXCLUDED.processed_at
            "#,
        )
        .bind(t.id)
        .bind(t.sender.user_id())
        .bind(t.sender.club_id())
        .bind(t.recipient_id)
        .bind(t.amount)
        .bind(t.status)
        .bind(t.deposit_id)
        .bind(t.processed_at)
        .bind(t.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
