//! In-memory adapters with the same conditional-write semantics as the
//! Postgres ones. Used by tests and local runs; the CAS behavior is
//! full-fidelity so lifecycle tests exercise the real race rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Guess, GuessStatus, Player};
use crate::error::{GameError, Result};
use crate::game::traits::{
    GuessStore, PlayerStore, PriceFeed, QueueConsumer, QueueMessage, ResolutionQueue, WriteOutcome,
};

/// In-memory player + guess store
#[derive(Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<String, Player>>,
    guesses: RwLock<HashMap<Uuid, Guess>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn guess_count(&self) -> usize {
        self.guesses.read().await.len()
    }
}

#[async_trait]
impl GuessStore for MemoryStore {
    async fn create(&self, guess: &Guess) -> Result<()> {
        let mut guesses = self.guesses.write().await;
        if guesses.contains_key(&guess.id) {
            return Err(GameError::GuessAlreadyExists(guess.id));
        }
        guesses.insert(guess.id, guess.clone());
        Ok(())
    }

    async fn get_guess(&self, id: Uuid) -> Result<Option<Guess>> {
        Ok(self.guesses.read().await.get(&id).cloned())
    }

    async fn resolve(
        &self,
        id: Uuid,
        end_value: Decimal,
        delta: i16,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome> {
        let mut guesses = self.guesses.write().await;
        match guesses.get_mut(&id) {
            Some(guess) if guess.status == GuessStatus::Pending => {
                guess.status = GuessStatus::Resolved;
                guess.end_value = Some(end_value);
                guess.delta = Some(delta);
                guess.resolved_at = Some(now);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::PreconditionFailed),
        }
    }

    async fn void_guess(&self, id: Uuid, now: DateTime<Utc>) -> Result<WriteOutcome> {
        let mut guesses = self.guesses.write().await;
        match guesses.get_mut(&id) {
            Some(guess) if guess.status == GuessStatus::Pending => {
                guess.status = GuessStatus::Void;
                guess.delta = Some(0);
                guess.resolved_at = Some(now);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::PreconditionFailed),
        }
    }

    async fn list_for_player(&self, player_id: &str) -> Result<Vec<Guess>> {
        let guesses = self.guesses.read().await;
        let mut out: Vec<Guess> = guesses
            .values()
            .filter(|g| g.player_id == player_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn get_or_create(&self, id: &str) -> Result<Player> {
        let mut players = self.players.write().await;
        Ok(players
            .entry(id.to_string())
            .or_insert_with(|| Player::new(id))
            .clone())
    }

    async fn get_player(&self, id: &str) -> Result<Option<Player>> {
        Ok(self.players.read().await.get(id).cloned())
    }

    async fn lock_pending_guess(&self, player_id: &str, guess_id: Uuid) -> Result<WriteOutcome> {
        let mut players = self.players.write().await;
        match players.get_mut(player_id) {
            Some(player)
                if player.pending_guess_id.is_none()
                    || player.pending_guess_id == Some(guess_id) =>
            {
                player.pending_guess_id = Some(guess_id);
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::PreconditionFailed),
        }
    }

    async fn apply_resolution(
        &self,
        player_id: &str,
        guess_id: Uuid,
        delta: i16,
    ) -> Result<WriteOutcome> {
        let mut players = self.players.write().await;
        match players.get_mut(player_id) {
            Some(player) if player.pending_guess_id == Some(guess_id) => {
                player.score += delta as i64;
                player.pending_guess_id = None;
                Ok(WriteOutcome::Applied)
            }
            _ => Ok(WriteOutcome::PreconditionFailed),
        }
    }
}

struct QueuedMessage {
    id: i64,
    payload: String,
    visible_after: DateTime<Utc>,
}

/// In-memory delayed queue with visibility-timeout redelivery
#[derive(Default)]
pub struct MemoryQueue {
    messages: RwLock<Vec<QueuedMessage>>,
    next_id: AtomicI64,
    fail_enqueue: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject enqueue failures (for compensation-path tests)
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Enqueue an arbitrary payload, immediately visible
    pub async fn enqueue_raw(&self, payload: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.messages.write().await.push(QueuedMessage {
            id,
            payload: payload.to_string(),
            visible_after: Utc::now(),
        });
    }
}

#[async_trait]
impl ResolutionQueue for MemoryQueue {
    async fn enqueue(&self, guess_id: Uuid, delay_secs: u64) -> Result<()> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(GameError::Internal("enqueue failed (injected)".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.messages.write().await.push(QueuedMessage {
            id,
            payload: serde_json::json!({ "guessId": guess_id }).to_string(),
            visible_after: Utc::now() + Duration::seconds(delay_secs as i64),
        });
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn receive(
        &self,
        max_messages: i64,
        visibility_timeout_secs: u64,
    ) -> Result<Vec<QueueMessage>> {
        let now = Utc::now();
        let mut messages = self.messages.write().await;
        let mut claimed = Vec::new();

        for message in messages.iter_mut() {
            if claimed.len() as i64 >= max_messages {
                break;
            }
            if message.visible_after <= now {
                message.visible_after = now + Duration::seconds(visibility_timeout_secs as i64);
                claimed.push(QueueMessage {
                    receipt: message.id,
                    payload: message.payload.clone(),
                });
            }
        }

        Ok(claimed)
    }

    async fn delete(&self, receipt: i64) -> Result<()> {
        self.messages.write().await.retain(|m| m.id != receipt);
        Ok(())
    }
}

/// Fixed-price feed with failure injection
pub struct StaticPriceFeed {
    price: RwLock<Option<Decimal>>,
    fetches: AtomicU64,
}

impl StaticPriceFeed {
    pub fn new(price: Decimal) -> Self {
        Self {
            price: RwLock::new(Some(price)),
            fetches: AtomicU64::new(0),
        }
    }

    /// A feed that always fails
    pub fn unavailable() -> Self {
        Self {
            price: RwLock::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    pub async fn set_price(&self, price: Decimal) {
        *self.price.write().await = Some(price);
    }

    pub async fn set_unavailable(&self) {
        *self.price.write().await = None;
    }

    /// How many times `current_price` has been called
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn current_price(&self) -> Result<Decimal> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        (*self.price.read().await)
            .ok_or_else(|| GameError::PriceUnavailable("static feed has no price".to_string()))
    }
}
