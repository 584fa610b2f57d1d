//! Resolution worker: settles guesses delivered by the queue
//!
//! The queue is at-least-once, so every step here is idempotent. A
//! message for an already-settled guess short-circuits before any price
//! fetch or write; a lost conditional write means another worker settled
//! first and its recorded outcome is adopted. The handler never lets an
//! error escape its boundary; whatever happens, the message is
//! acknowledged after the handler returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{compute_delta, GuessStatus};
use crate::error::{GameError, Result};
use crate::game::traits::{GuessStore, PlayerStore, PriceFeed, QueueConsumer, WriteOutcome};

/// Configuration for the resolution worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between queue polls
    pub poll_interval_ms: u64,
    /// Maximum messages to claim per poll
    pub batch_size: i64,
    /// How long a claimed message stays invisible before redelivery
    pub visibility_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 10,
            visibility_timeout_secs: 30,
        }
    }
}

/// Worker statistics
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub messages_processed: u64,
    pub guesses_resolved: u64,
    pub guesses_voided: u64,
    pub messages_skipped: u64,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionPayload {
    guess_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ResolutionWorker {
    guesses: Arc<dyn GuessStore>,
    players: Arc<dyn PlayerStore>,
    feed: Arc<dyn PriceFeed>,
    consumer: Arc<dyn QueueConsumer>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    running: Arc<AtomicBool>,
}

impl ResolutionWorker {
    pub fn new(
        guesses: Arc<dyn GuessStore>,
        players: Arc<dyn PlayerStore>,
        feed: Arc<dyn PriceFeed>,
        consumer: Arc<dyn QueueConsumer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            guesses,
            players,
            feed,
            consumer,
            config,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the polling loop as a background task.
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "resolution worker started (interval: {}ms, batch: {})",
            self.config.poll_interval_ms, self.config.batch_size
        );

        let worker = self.clone();
        tokio::spawn(async move { worker.run().await })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn get_stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }

    async fn run(&self) {
        let mut timer = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;

            if let Err(e) = self.process_batch().await {
                error!("queue poll failed: {e}");
                let mut stats = self.stats.write().await;
                stats.last_error = Some(e.to_string());
            }
        }

        info!("resolution worker stopped");
    }

    /// Claim and handle one batch of due messages. Each message is
    /// handled independently and acknowledged unconditionally after its
    /// handler returns. Returns the number of messages handled.
    pub async fn process_batch(&self) -> Result<usize> {
        let messages = self
            .consumer
            .receive(self.config.batch_size, self.config.visibility_timeout_secs)
            .await?;

        if messages.is_empty() {
            return Ok(0);
        }

        let handled = messages.len();

        for message in messages {
            self.handle_message(&message.payload).await;

            if let Err(e) = self.consumer.delete(message.receipt).await {
                // Redelivery of a handled message is safe; every step is
                // idempotent.
                error!("failed to ack message {}: {e}", message.receipt);
            }
        }

        let mut stats = self.stats.write().await;
        stats.messages_processed += handled as u64;
        stats.last_run = Some(Utc::now());

        Ok(handled)
    }

    /// Handle a single message. Never returns an error: a failure in
    /// settlement falls back to the cleanup path, and cleanup's own
    /// failures are logged and swallowed.
    pub async fn handle_message(&self, payload: &str) {
        let guess_id = match parse_payload(payload) {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping resolution message: {e}");
                let mut stats = self.stats.write().await;
                stats.messages_skipped += 1;
                return;
            }
        };

        if let Err(e) = self.process_guess(guess_id).await {
            error!(guess_id = %guess_id, "error resolving guess: {e}");
            self.cleanup(guess_id).await;
        }
    }

    /// Settle a single guess against the current price.
    async fn process_guess(&self, guess_id: Uuid) -> Result<()> {
        let Some(guess) = self.guesses.get_guess(guess_id).await? else {
            warn!(guess_id = %guess_id, "skipping resolution for unknown guess");
            let mut stats = self.stats.write().await;
            stats.messages_skipped += 1;
            return Ok(());
        };

        if guess.status.is_terminal() {
            // Redelivered duplicate: no price fetch, zero writes.
            debug!(guess_id = %guess_id, status = %guess.status, "guess already settled");
            return Ok(());
        }

        // The queue enforces the reveal delay; a message arriving early
        // is abnormal and goes to the cleanup path instead of a retry.
        let now = Utc::now();
        if !guess.is_due(now) {
            return Err(GameError::ResolutionTooEarly {
                guess_id,
                resolve_after: guess.resolve_after,
            });
        }

        let end_value = match self.feed.current_price().await {
            Ok(price) => price,
            Err(e) => {
                // Unresolvable round, not an error: void and release.
                warn!(guess_id = %guess_id, "price unavailable, voiding guess: {e}");
                self.guesses.void_guess(guess_id, Utc::now()).await?;
                self.players
                    .apply_resolution(&guess.player_id, guess_id, 0)
                    .await?;
                let mut stats = self.stats.write().await;
                stats.guesses_voided += 1;
                return Ok(());
            }
        };

        let delta = compute_delta(guess.direction, guess.start_value, end_value);

        let applied_delta = match self
            .guesses
            .resolve(guess_id, end_value, delta, Utc::now())
            .await?
        {
            WriteOutcome::Applied => delta,
            WriteOutcome::PreconditionFailed => {
                // Lost the settlement race. Adopt whatever the winner
                // recorded so the score effect matches the stored guess.
                debug!(guess_id = %guess_id, "settlement race lost, adopting recorded outcome");
                self.guesses
                    .get_guess(guess_id)
                    .await?
                    .and_then(|g| g.delta)
                    .unwrap_or(0)
            }
        };

        self.players
            .apply_resolution(&guess.player_id, guess_id, applied_delta)
            .await?;

        info!(
            guess_id = %guess_id,
            player_id = %guess.player_id,
            start_value = %guess.start_value,
            end_value = %end_value,
            delta = applied_delta,
            "guess resolved"
        );

        let mut stats = self.stats.write().await;
        stats.guesses_resolved += 1;
        Ok(())
    }

    /// Fallback after any settlement failure: if the guess is still
    /// PENDING, void it and release the player with a zero delta; if it
    /// settled but the player is still locked, apply the recorded delta.
    /// Errors raised here are logged, never re-raised.
    async fn cleanup(&self, guess_id: Uuid) {
        if let Err(e) = self.try_cleanup(guess_id).await {
            error!(guess_id = %guess_id, "cleanup failed: {e}");
            let mut stats = self.stats.write().await;
            stats.last_error = Some(e.to_string());
        }
    }

    async fn try_cleanup(&self, guess_id: Uuid) -> Result<()> {
        let Some(guess) = self.guesses.get_guess(guess_id).await? else {
            return Ok(());
        };

        let mut delta = guess.delta.unwrap_or(0);

        if guess.status == GuessStatus::Pending {
            self.guesses.void_guess(guess_id, Utc::now()).await?;
            delta = 0;
            info!(guess_id = %guess_id, "voided pending guess");
            let mut stats = self.stats.write().await;
            stats.guesses_voided += 1;
        }

        self.players
            .apply_resolution(&guess.player_id, guess_id, delta)
            .await?;
        debug!(player_id = %guess.player_id, "released pending-guess lock");
        Ok(())
    }
}

fn parse_payload(payload: &str) -> Result<Uuid> {
    let parsed: ResolutionPayload = serde_json::from_str(payload)
        .map_err(|e| GameError::MalformedPayload(format!("{payload}: {e}")))?;

    parsed
        .guess_id
        .ok_or_else(|| GameError::MalformedPayload(format!("missing guessId: {payload}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryQueue, MemoryStore, StaticPriceFeed};
    use crate::domain::Direction;
    use crate::game::traits::{GuessStore, PlayerStore, ResolutionQueue};
    use rust_decimal_macros::dec;

    struct Harness {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        feed: Arc<StaticPriceFeed>,
        worker: ResolutionWorker,
    }

    fn harness(price: rust_decimal::Decimal) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let feed = Arc::new(StaticPriceFeed::new(price));
        let worker = ResolutionWorker::new(
            store.clone(),
            store.clone(),
            feed.clone(),
            queue.clone(),
            WorkerConfig {
                poll_interval_ms: 10,
                ..Default::default()
            },
        );
        Harness {
            store,
            queue,
            feed,
            worker,
        }
    }

    /// Insert a due PENDING guess with the player slot locked to it.
    async fn seed_guess(store: &MemoryStore, direction: Direction) -> crate::domain::Guess {
        let guess = crate::domain::Guess::new("p1", direction, dec!(50000), 0);
        store.get_or_create("p1").await.unwrap();
        store.create(&guess).await.unwrap();
        assert!(store
            .lock_pending_guess("p1", guess.id)
            .await
            .unwrap()
            .is_applied());
        guess
    }

    fn payload(id: Uuid) -> String {
        serde_json::json!({ "guessId": id }).to_string()
    }

    #[tokio::test]
    async fn correct_up_guess_scores_plus_one() {
        let h = harness(dec!(55000));
        let guess = seed_guess(&h.store, Direction::Up).await;

        h.worker.handle_message(&payload(guess.id)).await;

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Resolved);
        assert_eq!(settled.delta, Some(1));
        assert_eq!(settled.end_value, Some(dec!(55000)));
        assert!(settled.resolved_at.is_some());

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, 1);
        assert!(player.pending_guess_id.is_none());
    }

    #[tokio::test]
    async fn wrong_down_guess_scores_minus_one() {
        let h = harness(dec!(55000));
        let guess = seed_guess(&h.store, Direction::Down).await;

        h.worker.handle_message(&payload(guess.id)).await;

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.delta, Some(-1));

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, -1);
    }

    #[tokio::test]
    async fn unchanged_price_is_a_push() {
        let h = harness(dec!(50000));
        let guess = seed_guess(&h.store, Direction::Up).await;

        h.worker.handle_message(&payload(guess.id)).await;

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Resolved);
        assert_eq!(settled.delta, Some(0));

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, 0);
        assert!(player.pending_guess_id.is_none());
    }

    #[tokio::test]
    async fn price_failure_voids_and_unlocks_without_scoring() {
        let h = harness(dec!(50000));
        let guess = seed_guess(&h.store, Direction::Up).await;
        h.feed.set_unavailable().await;

        h.worker.handle_message(&payload(guess.id)).await;

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Void);
        assert_eq!(settled.delta, Some(0));
        assert!(settled.end_value.is_none());

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, 0);
        assert!(player.pending_guess_id.is_none());
    }

    #[tokio::test]
    async fn redelivery_of_settled_guess_is_a_no_op() {
        let h = harness(dec!(55000));
        let guess = seed_guess(&h.store, Direction::Up).await;

        h.worker.handle_message(&payload(guess.id)).await;
        let fetches_after_first = h.feed.fetch_count();

        // Redeliver: short-circuits before the price fetch, zero writes.
        h.worker.handle_message(&payload(guess.id)).await;

        assert_eq!(h.feed.fetch_count(), fetches_after_first);

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, 1);

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Resolved);
        assert_eq!(settled.delta, Some(1));
    }

    #[tokio::test]
    async fn premature_delivery_routes_to_void() {
        let h = harness(dec!(55000));
        // Reveal window far in the future
        let guess = crate::domain::Guess::new("p1", Direction::Up, dec!(50000), 3600);
        h.store.get_or_create("p1").await.unwrap();
        h.store.create(&guess).await.unwrap();
        h.store.lock_pending_guess("p1", guess.id).await.unwrap();

        h.worker.handle_message(&payload(guess.id)).await;

        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Void);

        let player = h.store.get_player("p1").await.unwrap().unwrap();
        assert_eq!(player.score, 0);
        assert!(player.pending_guess_id.is_none());
    }

    #[tokio::test]
    async fn malformed_message_does_not_affect_valid_sibling() {
        let h = harness(dec!(55000));
        let guess = seed_guess(&h.store, Direction::Up).await;

        h.queue.enqueue_raw("not json at all").await;
        h.queue.enqueue(guess.id, 0).await.unwrap();

        let handled = h.worker.process_batch().await.unwrap();
        assert_eq!(handled, 2);

        // The malformed message is dropped, the valid one settles, and
        // both are acknowledged.
        let settled = h.store.get_guess(guess.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GuessStatus::Resolved);
        assert_eq!(h.queue.len().await, 0);

        let stats = h.worker.get_stats().await;
        assert_eq!(stats.messages_skipped, 1);
        assert_eq!(stats.guesses_resolved, 1);
    }

    #[tokio::test]
    async fn missing_guess_is_skipped() {
        let h = harness(dec!(55000));
        h.worker.handle_message(&payload(Uuid::new_v4())).await;

        let stats = h.worker.get_stats().await;
        assert_eq!(stats.messages_skipped, 1);
        assert_eq!(stats.guesses_resolved, 0);
    }

    #[tokio::test]
    async fn payload_without_guess_id_is_skipped() {
        let h = harness(dec!(55000));
        h.worker.handle_message("{}").await;
        h.worker.handle_message(r#"{"somethingElse": 1}"#).await;

        let stats = h.worker.get_stats().await;
        assert_eq!(stats.messages_skipped, 2);
    }
}
