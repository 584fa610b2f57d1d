//! PostgreSQL-backed delayed resolution queue
//!
//! `enqueue` inserts a row that becomes visible after the reveal delay.
//! `receive` claims due rows with `FOR UPDATE SKIP LOCKED` and pushes
//! their visibility forward by the timeout, so a consumer that dies
//! mid-handling gets its messages redelivered: delivery is
//! at-least-once, never at-most-once. `delete` acknowledges.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::game::traits::{QueueConsumer, QueueMessage, ResolutionQueue};

#[derive(Clone)]
pub struct PostgresQueue {
    pool: PgPool,
}

impl PostgresQueue {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResolutionQueue for PostgresQueue {
    async fn enqueue(&self, guess_id: Uuid, delay_secs: u64) -> Result<()> {
        let payload = serde_json::json!({ "guessId": guess_id }).to_string();

        sqlx::query(
            r#"
            INSERT INTO guess_resolution_queue (guess_id, payload, visible_after)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            "#,
        )
        .bind(guess_id)
        .bind(&payload)
        .bind(delay_secs as f64)
        .execute(&self.pool)
        .await?;

        debug!(guess_id = %guess_id, delay_secs, "resolution message enqueued");
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for PostgresQueue {
    async fn receive(
        &self,
        max_messages: i64,
        visibility_timeout_secs: u64,
    ) -> Result<Vec<QueueMessage>> {
        let rows = sqlx::query(
            r#"
            WITH due AS (
                SELECT id FROM guess_resolution_queue
                WHERE visible_after <= NOW()
                ORDER BY visible_after
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE guess_resolution_queue q
            SET visible_after = NOW() + make_interval(secs => $2),
                delivery_count = delivery_count + 1
            FROM due
            WHERE q.id = due.id
            RETURNING q.id, q.payload
            "#,
        )
        .bind(max_messages)
        .bind(visibility_timeout_secs as f64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| QueueMessage {
                receipt: row.get("id"),
                payload: row.get("payload"),
            })
            .collect())
    }

    async fn delete(&self, receipt: i64) -> Result<()> {
        sqlx::query("DELETE FROM guess_resolution_queue WHERE id = $1")
            .bind(receipt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
