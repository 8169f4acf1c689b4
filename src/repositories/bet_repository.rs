use crate::models::{Bet, Commission};
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const BET_COLUMNS: &str = "id, user_id, question_id, option_id, amount, outcome, status, \
                           win_amount, refunded_amount, user_balance, settled_at, created_at";
const COMMISSION_COLUMNS: &str = "id, bet_id, user_id, club_id, kind, amount, reverses, created_at";

/// Repository for bet and commission data access
pub struct BetRepository {
    pool: PgPool,
}

impl BetRepository {
    /// Create a new BetRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a bet by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Bet>> {
        sqlx::query_as::<_, Bet>(&format!("SELECT {} FROM bets WHERE id = $1", BET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Bets placed by a user, newest first
    pub async fn find_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<Bet>> {
        sqlx::query_as::<_, Bet>(&format!(
            "SELECT {} FROM bets WHERE user_id = $1 ORDER BY created_at DESC, id",
            BET_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Bets on a question, oldest first
    pub async fn find_by_question(&self, question_id: Uuid) -> SqlxResult<Vec<Bet>> {
        sqlx::query_as::<_, Bet>(&format!(
            "SELECT {} FROM bets WHERE question_id = $1 ORDER BY created_at, id",
            BET_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Commission rows (originals and reversals) for one bet
    pub async fn find_commissions(&self, bet_id: Uuid) -> SqlxResult<Vec<Commission>> {
        sqlx::query_as::<_, Commission>(&format!(
            "SELECT {} FROM commissions WHERE bet_id = $1 ORDER BY created_at, id",
            COMMISSION_COLUMNS
        ))
        .bind(bet_id)
        .fetch_all(&self.pool)
        .await
    }

    // =========================================================================
    // Unit of work
    // =========================================================================

    /// Question of a bet, read without locking
    pub async fn question_id_of_bet(conn: &mut PgConnection, bet_id: Uuid) -> SqlxResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT question_id FROM bets WHERE id = $1")
            .bind(bet_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn lock_by_question(conn: &mut PgConnection, question_id: Uuid) -> SqlxResult<Vec<Bet>> {
        sqlx::query_as::<_, Bet>(&format!(
            "SELECT {} FROM bets WHERE question_id = $1 ORDER BY id FOR UPDATE",
            BET_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(conn)
        .await
    }

    /// Commission rows are append-only, so they are read without locking
    pub async fn commissions_for_question(
        conn: &mut PgConnection,
        question_id: Uuid,
    ) -> SqlxResult<Vec<Commission>> {
        sqlx::query_as::<_, Commission>(&format!(
            "SELECT {} FROM commissions WHERE bet_id IN (SELECT id FROM bets WHERE question_id = $1)",
            COMMISSION_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(conn)
        .await
    }

    pub async fn upsert(conn: &mut PgConnection, bet: &Bet) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bets
                (id, user_id, question_id, option_id, amount, outcome, status,
                 win_amount, refunded_amount, user_balance, settled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                outcome = EXCLUDED.outcome,
                status = EXCLUDED.status,
                win_amount = EXCLUDED.win_amount,
                refunded_amount = EXCLUDED.refunded_amount,
                settled_at = EXCLUDED.settled_at
            "#,
        )
        .bind(bet.id)
        .bind(bet.user_id)
        .bind(bet.question_id)
        .bind(bet.option_id)
        .bind(bet.amount)
        .bind(bet.outcome)
        .bind(bet.status)
        .bind(bet.win_amount)
        .bind(bet.refunded_amount)
        .bind(bet.user_balance)
        .bind(bet.settled_at)
        .bind(bet.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Commissions are never updated; a second insert of the same row is ignored
    pub async fn insert_commission(conn: &mut PgConnection, c: &Commission) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO commissions (id, bet_id, user_id, club_id, kind, amount, reverses, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(c.id)
        .bind(c.bet_id)
        .bind(c.beneficiary.user_id())
        .bind(c.beneficiary.club_id())
        .bind(c.kind)
        .bind(c.amount)
        .bind(c.reverses)
        .bind(c.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
