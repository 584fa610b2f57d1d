//! PostgreSQL storage adapter
//!
//! Conditional writes are single `UPDATE ... WHERE <predicate>`
//! statements; `rows_affected == 0` maps to
//! `WriteOutcome::PreconditionFailed`. The status transition table
//! (PENDING -> RESOLVED, PENDING -> VOID) is enforced here, in the
//! predicates, not at call sites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Direction, Guess, GuessStatus, Player};
use crate::error::{GameError, Result};
use crate::game::traits::{GuessStore, PlayerStore, WriteOutcome};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and create a new store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool (zero-cost reuse)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Cheap connectivity probe for the health endpoint
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn guess_from_row(row: &PgRow) -> Result<Guess> {
    let direction: String = row.get("direction");
    let status: String = row.get("status");

    Ok(Guess {
        id: row.get("id"),
        player_id: row.get("player_id"),
        start_value: row.get("start_value"),
        direction: Direction::try_from(direction.as_str()).map_err(GameError::Internal)?,
        status: GuessStatus::try_from(status.as_str()).map_err(GameError::Internal)?,
        created_at: row.get("created_at"),
        resolve_after: row.get("resolve_after"),
        resolved_at: row.get("resolved_at"),
        end_value: row.get("end_value"),
        delta: row.get("delta"),
    })
}

fn player_from_row(row: &PgRow) -> Player {
    Player {
        id: row.get("id"),
        score: row.get("score"),
        pending_guess_id: row.get("pending_guess_id"),
    }
}

#[async_trait]
impl GuessStore for PostgresStore {
    #[instrument(skip(self, guess), fields(guess_id = %guess.id))]
    async fn create(&self, guess: &Guess) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO guesses
                (id, player_id, start_value, direction, status, created_at, resolve_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(guess.id)
        .bind(&guess.player_id)
        .bind(guess.start_value)
        .bind(guess.direction.as_str())
        .bind(guess.status.as_str())
        .bind(guess.created_at)
        .bind(guess.resolve_after)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(GameError::GuessAlreadyExists(guess.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_guess(&self, id: Uuid) -> Result<Option<Guess>> {
        let row = sqlx::query(
            r#"
            SELECT id, player_id, start_value, direction, status,
                   created_at, resolve_after, resolved_at, end_value, delta
            FROM guesses WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| guess_from_row(&r)).transpose()
    }

    async fn resolve(
        &self,
        id: Uuid,
        end_value: Decimal,
        delta: i16,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE guesses
            SET status = 'RESOLVED', end_value = $2, delta = $3, resolved_at = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(end_value)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::PreconditionFailed)
        }
    }

    async fn void_guess(&self, id: Uuid, now: DateTime<Utc>) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE guesses
            SET status = 'VOID', delta = 0, resolved_at = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::PreconditionFailed)
        }
    }

    async fn list_for_player(&self, player_id: &str) -> Result<Vec<Guess>> {
        let rows = sqlx::query(
            r#"
            SELECT id, player_id, start_value, direction, status,
                   created_at, resolve_after, resolved_at, end_value, delta
            FROM guesses
            WHERE player_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(guess_from_row).collect()
    }
}

#[async_trait]
impl PlayerStore for PostgresStore {
    async fn get_or_create(&self, id: &str) -> Result<Player> {
        // Conditional insert; a concurrent create wins harmlessly and the
        // re-read below returns whichever record landed.
        sqlx::query(
            r#"
            INSERT INTO players (id, score, pending_guess_id)
            VALUES ($1, 0, NULL)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id, score, pending_guess_id FROM players WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(player_from_row(&row))
    }

    async fn get_player(&self, id: &str) -> Result<Option<Player>> {
        let row = sqlx::query("SELECT id, score, pending_guess_id FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| player_from_row(&r)))
    }

    async fn lock_pending_guess(&self, player_id: &str, guess_id: Uuid) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE players
            SET pending_guess_id = $2
            WHERE id = $1 AND (pending_guess_id IS NULL OR pending_guess_id = $2)
            "#,
        )
        .bind(player_id)
        .bind(guess_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::PreconditionFailed)
        }
    }

    async fn apply_resolution(
        &self,
        player_id: &str,
        guess_id: Uuid,
        delta: i16,
    ) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE players
            SET score = score + $3, pending_guess_id = NULL
            WHERE id = $1 AND pending_guess_id = $2
            "#,
        )
        .bind(player_id)
        .bind(guess_id)
        .bind(delta as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::PreconditionFailed)
        }
    }
}
