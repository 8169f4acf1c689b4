//! Matches, bet questions and their options

use crate::models::{BetOption, BetQuestion, Match};
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

const MATCH_COLUMNS: &str = "id, game, title, start_time, end_time, status, hidden, created_at";
const QUESTION_COLUMNS: &str = "id, match_id, question, end_time, status, hidden, \
                                winner_option_id, processed, settled_at, created_at";
const OPTION_COLUMNS: &str = "id, question_id, label, rate, stake_limit, total_staked, position";

pub struct MarketRepository {
    pool: PgPool,
}

impl MarketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_match(&self, id: Uuid) -> SqlxResult<Option<Match>> {
        sqlx::query_as::<_, Match>(&format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_question(&self, id: Uuid) -> SqlxResult<Option<BetQuestion>> {
        sqlx::query_as::<_, BetQuestion>(&format!(
            "SELECT {} FROM bet_questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Questions of a match, oldest first
    pub async fn find_questions_by_match(&self, match_id: Uuid) -> SqlxResult<Vec<BetQuestion>> {
        sqlx::query_as::<_, BetQuestion>(&format!(
            "SELECT {} FROM bet_questions WHERE match_id = $1 ORDER BY created_at, id",
            QUESTION_COLUMNS
        ))
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_options(&self, question_id: Uuid) -> SqlxResult<Vec<BetOption>> {
        sqlx::query_as::<_, BetOption>(&format!(
            "SELECT {} FROM bet_options WHERE question_id = $1 ORDER BY position, id",
            OPTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
    }

    // =========================================================================
    // Locking reads (inside a unit of work)
    // =========================================================================

    pub async fn lock_match(conn: &mut PgConnection, id: Uuid) -> SqlxResult<Option<Match>> {
        sqlx::query_as::<_, Match>(&format!(
            "SELECT {} FROM matches WHERE id = $1 FOR UPDATE",
            MATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Parent match id of a question, read without locking
    pub async fn match_id_of_question(
        conn: &mut PgConnection,
        question_id: Uuid,
    ) -> SqlxResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT match_id FROM bet_questions WHERE id = $1")
            .bind(question_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn lock_question(conn: &mut PgConnection, id: Uuid) -> SqlxResult<Option<BetQuestion>> {
        sqlx::query_as::<_, BetQuestion>(&format!(
            "SELECT {} FROM bet_questions WHERE id = $1 FOR UPDATE",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn lock_options(conn: &mut PgConnection, question_id: Uuid) -> SqlxResult<Vec<BetOption>> {
        sqlx::query_as::<_, BetOption>(&format!(
            "SELECT {} FROM bet_options WHERE question_id = $1 ORDER BY id FOR UPDATE",
            OPTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_all(conn)
        .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn upsert_match(conn: &mut PgConnection, m: &Match) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO matches (id, game, title, start_time, end_time, status, hidden, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                game = EXCLUDED.game,
                title = EXCLUDED.title,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                status = EXCLUDED.status,
                hidden = EXCLUDED.hidden
            "#,
        )
        .bind(m.id)
        .bind(&m.game)
        .bind(&m.title)
        .bind(m.start_time)
        .bind(m.end_time)
        .bind(m.status)
        .bind(m.hidden)
        .bind(m.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_question(conn: &mut PgConnection, q: &BetQuestion) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bet_questions
                (id, match_id, question, end_time, status, hidden, winner_option_id, processed, settled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                question = EXCLUDED.question,
                end_time = EXCLUDED.end_time,
                status = EXCLUDED.status,
                hidden = EXCLUDED.hidden,
                winner_option_id = EXCLUDED.winner_option_id,
                processed = EXCLUDED.processed,
                settled_at = EXCLUDED.settled_at
            "#,
        )
        .bind(q.id)
        .bind(q.match_id)
        .bind(&q.question)
        .bind(q.end_time)
        .bind(q.status)
        .bind(q.hidden)
        .bind(q.winner_option_id)
        .bind(q.processed)
        .bind(q.settled_at)
        .bind(q.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn upsert_option(conn: &mut PgConnection, o: &BetOption) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bet_options (id, question_id, label, rate, stake_limit, total_staked, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                label = EXCLUDED.label,
                rate = EXCLUDED.rate,
                stake_limit = EXCLUDED.stake_limit,
                total_staked = EXCLUDED.total_staked,
                position = EXCLUDED.position
            "#,
        )
        .bind(o.id)
        .bind(o.question_id)
        .bind(&o.label)
        .bind(o.rate)
        .bind(o.stake_limit)
        .bind(o.total_staked)
        .bind(o.position)
        .execute(conn)
        .await?;
        Ok(())
    }
}
