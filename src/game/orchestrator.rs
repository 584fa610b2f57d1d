//! "Place a guess" use case
//!
//! Composes the player store, guess store, resolution queue and price
//! feed. The player lock and the queue enqueue are issued concurrently;
//! the guess counts as placed only when both confirm. A partial failure
//! triggers best-effort compensation: void the guess and release the
//! player's slot with a zero delta.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Direction, Guess, Player};
use crate::error::{GameError, Result};
use crate::game::traits::{GuessStore, PlayerStore, PriceFeed, ResolutionQueue, WriteOutcome};

pub struct GuessOrchestrator {
    players: Arc<dyn PlayerStore>,
    guesses: Arc<dyn GuessStore>,
    queue: Arc<dyn ResolutionQueue>,
    feed: Arc<dyn PriceFeed>,
    /// Seconds between placement and earliest allowed settlement
    reveal_window_secs: u64,
}

impl GuessOrchestrator {
    pub fn new(
        players: Arc<dyn PlayerStore>,
        guesses: Arc<dyn GuessStore>,
        queue: Arc<dyn ResolutionQueue>,
        feed: Arc<dyn PriceFeed>,
        reveal_window_secs: u64,
    ) -> Self {
        Self {
            players,
            guesses,
            queue,
            feed,
            reveal_window_secs,
        }
    }

    /// Place a timed up/down guess for a player.
    ///
    /// Fails with `PendingGuessExists` (carrying the holder's guess id)
    /// when the player's slot is occupied; in that case nothing is
    /// created. On partial failure after creation the new guess is
    /// voided and the slot released, and the original failure is
    /// returned.
    pub async fn place_guess(&self, player_id: &str, direction: Direction) -> Result<Guess> {
        let player = self.players.get_or_create(player_id).await?;

        if let Some(pending_guess_id) = player.pending_guess_id {
            return Err(GameError::PendingGuessExists {
                player_id: player_id.to_string(),
                pending_guess_id,
            });
        }

        let start_value = self.feed.current_price().await?;
        let guess = Guess::new(player_id, direction, start_value, self.reveal_window_secs);
        self.guesses.create(&guess).await?;

        // Independent operations: both must confirm before the guess is
        // considered placed.
        let (lock_res, enqueue_res) = tokio::join!(
            self.players.lock_pending_guess(player_id, guess.id),
            self.queue.enqueue(guess.id, self.reveal_window_secs),
        );

        let placed = matches!(&lock_res, Ok(WriteOutcome::Applied)) && enqueue_res.is_ok();

        if !placed {
            warn!(
                player_id,
                guess_id = %guess.id,
                "failed to finalize guess, running compensation"
            );
            self.cleanup_failed_guess(player_id, guess.id).await;

            return Err(match (lock_res, enqueue_res) {
                (Err(e), _) => e,
                (Ok(WriteOutcome::PreconditionFailed), _) => {
                    // A concurrent request won the slot between our read
                    // and the conditional write. Re-read to report the
                    // real holder.
                    let holder = self
                        .players
                        .get_player(player_id)
                        .await
                        .ok()
                        .flatten()
                        .and_then(|p| p.pending_guess_id);
                    match holder {
                        Some(pending_guess_id) => GameError::PendingGuessExists {
                            player_id: player_id.to_string(),
                            pending_guess_id,
                        },
                        None => GameError::Internal(format!(
                            "pending-guess slot contended for player {player_id}"
                        )),
                    }
                }
                (Ok(WriteOutcome::Applied), Err(e)) => e,
                (Ok(WriteOutcome::Applied), Ok(())) => {
                    GameError::Internal("guess placement failed with no failing arm".to_string())
                }
            });
        }

        info!(
            player_id,
            guess_id = %guess.id,
            direction = %direction,
            start_value = %start_value,
            "guess placed"
        );

        // Authoritative snapshot; a worker cannot have touched it before
        // the reveal window, but re-reading keeps the response honest.
        Ok(self.guesses.get_guess(guess.id).await?.unwrap_or(guess))
    }

    /// Compensation for a guess that could not be finalized: void it and
    /// release the player's slot without a score change. Failures here
    /// are logged, never surfaced; the caller reports the original
    /// error. If the lock stuck but the enqueue and this cleanup both
    /// failed, the guess stays PENDING with no scheduled resolution and
    /// needs an out-of-band sweep.
    async fn cleanup_failed_guess(&self, player_id: &str, guess_id: Uuid) {
        if let Err(e) = self.try_cleanup(player_id, guess_id).await {
            error!(
                player_id,
                guess_id = %guess_id,
                "compensation failed: {e}"
            );
        }
    }

    async fn try_cleanup(&self, player_id: &str, guess_id: Uuid) -> Result<()> {
        self.guesses.void_guess(guess_id, chrono::Utc::now()).await?;
        self.players.apply_resolution(player_id, guess_id, 0).await?;
        Ok(())
    }

    /// Create a brand-new player with a random id.
    pub async fn create_player(&self) -> Result<Player> {
        let id = Uuid::new_v4().to_string();
        self.players.get_or_create(&id).await
    }

    pub async fn get_player(&self, player_id: &str) -> Result<Player> {
        self.players.get_or_create(player_id).await
    }

    pub async fn get_guess(&self, guess_id: Uuid) -> Result<Option<Guess>> {
        self.guesses.get_guess(guess_id).await
    }

    pub async fn list_guesses(&self, player_id: &str) -> Result<Vec<Guess>> {
        self.guesses.list_for_player(player_id).await
    }
}
