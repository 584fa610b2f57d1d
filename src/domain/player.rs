use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A player and their score.
///
/// `pending_guess_id` is the single-slot lock that limits a player to one
/// outstanding guess at a time. It is set when a guess is finalized for play
/// and cleared atomically with the score update when that guess settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub score: i64,
    pub pending_guess_id: Option<Uuid>,
}

impl Player {
    /// Create a fresh zero-score player with an empty lock
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score: 0,
            pending_guess_id: None,
        }
    }

    pub fn has_pending_guess(&self) -> bool {
        self.pending_guess_id.is_some()
    }
}
