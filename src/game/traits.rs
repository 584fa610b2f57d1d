//! Store, queue and price-feed seams for the guess lifecycle
//!
//! Every mutation of shared player/guess state goes through a single
//! conditional write. A caller that loses a race observes
//! `WriteOutcome::PreconditionFailed` and must re-read the authoritative
//! record instead of treating the rejection as a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Guess, Player};
use crate::error::Result;

/// Outcome of a conditional (compare-and-swap) write.
///
/// `PreconditionFailed` is not an error: it means a concurrent caller
/// already performed the transition this write was attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The predicate held and the write was applied
    Applied,
    /// The predicate did not hold; nothing was written
    PreconditionFailed,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

/// Conditional-write persistence for guesses.
///
/// Of any number of concurrent `resolve`/`void_guess` calls against the
/// same id, exactly one observes `Applied`. This is the sole mechanism
/// preventing double settlement.
#[async_trait]
pub trait GuessStore: Send + Sync {
    /// Insert-only create. Fails with `GuessAlreadyExists` if the id is
    /// taken (idempotency guard; ids are freshly generated v4 UUIDs).
    async fn create(&self, guess: &Guess) -> Result<()>;

    async fn get_guess(&self, id: Uuid) -> Result<Option<Guess>>;

    /// PENDING -> RESOLVED, setting `end_value`, `delta` and `resolved_at`
    /// atomically with the transition.
    async fn resolve(
        &self,
        id: Uuid,
        end_value: Decimal,
        delta: i16,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome>;

    /// PENDING -> VOID with `delta = 0`. `end_value` stays unset.
    async fn void_guess(&self, id: Uuid, now: DateTime<Utc>) -> Result<WriteOutcome>;

    /// All guesses placed by a player, newest first.
    async fn list_for_player(&self, player_id: &str) -> Result<Vec<Guess>>;
}

/// Conditional-write persistence for players and the single-slot
/// pending-guess lock.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Conditional insert of a zero-score player; on an insert race the
    /// existing record is re-read and returned.
    async fn get_or_create(&self, id: &str) -> Result<Player>;

    async fn get_player(&self, id: &str) -> Result<Option<Player>>;

    /// Point the pending slot at `guess_id`. The predicate accepts an
    /// empty slot or one already holding `guess_id`, so retries are safe.
    /// `PreconditionFailed` means another guess owns the slot.
    async fn lock_pending_guess(&self, player_id: &str, guess_id: Uuid) -> Result<WriteOutcome>;

    /// Atomically add `delta` to the score and clear the pending slot,
    /// conditional on the slot still holding `guess_id`.
    /// `PreconditionFailed` means the effect was already applied, which
    /// makes scoring at-most-once under any redelivery pattern.
    async fn apply_resolution(
        &self,
        player_id: &str,
        guess_id: Uuid,
        delta: i16,
    ) -> Result<WriteOutcome>;
}

/// Live price source for the guessed asset.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current price, or `PriceUnavailable`.
    async fn current_price(&self) -> Result<Decimal>;
}

/// Producer side of the at-least-once resolution queue.
#[async_trait]
pub trait ResolutionQueue: Send + Sync {
    /// Schedule a resolution message for `guess_id`, first visible to
    /// consumers after `delay_secs`.
    async fn enqueue(&self, guess_id: Uuid, delay_secs: u64) -> Result<()>;
}

/// A claimed queue message. The payload is opaque to the queue; the
/// receipt acknowledges this particular delivery.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt: i64,
    pub payload: String,
}

/// Consumer side of the resolution queue.
///
/// `receive` claims due messages and pushes their visibility forward by
/// the timeout, so a crashed consumer's messages come back. `delete`
/// acknowledges a delivery after the handler returns.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    async fn receive(&self, max_messages: i64, visibility_timeout_secs: u64)
        -> Result<Vec<QueueMessage>>;

    async fn delete(&self, receipt: i64) -> Result<()>;
}
