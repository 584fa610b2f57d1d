use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Direction of a guess (price goes UP or DOWN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Direction {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// Guess lifecycle states
///
/// A guess starts PENDING and settles exactly once into one of the two
/// terminal states. The store layer enforces the transition table via its
/// conditional-write predicates; nothing ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GuessStatus {
    /// Created, waiting for the reveal window to elapse
    Pending,
    /// Settled against an observed price
    Resolved,
    /// Settled without an observable outcome (price unavailable, premature
    /// delivery, or compensation)
    Void,
}

impl GuessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuessStatus::Pending => "PENDING",
            GuessStatus::Resolved => "RESOLVED",
            GuessStatus::Void => "VOID",
        }
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: GuessStatus) -> bool {
        use GuessStatus::*;

        matches!((self, target), (Pending, Resolved) | (Pending, Void))
    }

    /// Is this a terminal status?
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuessStatus::Resolved | GuessStatus::Void)
    }
}

impl fmt::Display for GuessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GuessStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(GuessStatus::Pending),
            "RESOLVED" => Ok(GuessStatus::Resolved),
            "VOID" => Ok(GuessStatus::Void),
            _ => Err(format!("Unknown guess status: {}", s)),
        }
    }
}

/// A single timed up/down bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub id: Uuid,
    pub player_id: String,
    /// Price snapshot taken when the guess was placed
    pub start_value: Decimal,
    pub direction: Direction,
    pub status: GuessStatus,
    pub created_at: DateTime<Utc>,
    /// Earliest allowed settlement time (creation + reveal window)
    pub resolve_after: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub end_value: Option<Decimal>,
    pub delta: Option<i16>,
}

impl Guess {
    /// Create a new PENDING guess with a fresh id
    pub fn new(
        player_id: impl Into<String>,
        direction: Direction,
        start_value: Decimal,
        reveal_window_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            player_id: player_id.into(),
            start_value,
            direction,
            status: GuessStatus::Pending,
            created_at: now,
            resolve_after: now + Duration::seconds(reveal_window_secs as i64),
            resolved_at: None,
            end_value: None,
            delta: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }

    /// Can this guess be settled at the given time?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.resolve_after
    }
}

/// Score the observed price movement against the chosen direction.
///
/// Unchanged price is a push (no winner, zero delta); otherwise the player
/// gains a point for a correct call and loses one for a wrong call.
pub fn compute_delta(direction: Direction, start: Decimal, end: Decimal) -> i16 {
    if end == start {
        return 0;
    }
    let up = end > start;
    let won = match direction {
        Direction::Up => up,
        Direction::Down => !up,
    };
    if won {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compute_delta() {
        assert_eq!(compute_delta(Direction::Up, dec!(100), dec!(101)), 1);
        assert_eq!(compute_delta(Direction::Up, dec!(100), dec!(99)), -1);
        assert_eq!(compute_delta(Direction::Down, dec!(100), dec!(99)), 1);
        assert_eq!(compute_delta(Direction::Down, dec!(100), dec!(101)), -1);
    }

    #[test]
    fn test_compute_delta_push() {
        assert_eq!(compute_delta(Direction::Up, dec!(100), dec!(100)), 0);
        assert_eq!(compute_delta(Direction::Down, dec!(100), dec!(100)), 0);
    }

    #[test]
    fn test_valid_transitions() {
        use GuessStatus::*;

        assert!(Pending.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Void));

        // Terminal states never transition
        assert!(!Resolved.can_transition_to(Void));
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Void.can_transition_to(Resolved));
        assert!(!Void.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            GuessStatus::try_from("PENDING").unwrap(),
            GuessStatus::Pending
        );
        assert_eq!(
            GuessStatus::try_from("resolved").unwrap(),
            GuessStatus::Resolved
        );
        assert!(GuessStatus::try_from("SETTLED").is_err());
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!(Direction::try_from("UP").unwrap(), Direction::Up);
        assert_eq!(Direction::try_from("down").unwrap(), Direction::Down);
        assert!(Direction::try_from("SIDEWAYS").is_err());
    }

    #[test]
    fn test_new_guess_is_pending() {
        let guess = Guess::new("p1", Direction::Up, dec!(50000), 60);

        assert_eq!(guess.status, GuessStatus::Pending);
        assert!(!guess.is_settled());
        assert!(guess.delta.is_none());
        assert!(guess.end_value.is_none());
        assert!(guess.resolve_after > guess.created_at);
        assert!(!guess.is_due(guess.created_at));
        assert!(guess.is_due(guess.resolve_after));
    }

    #[test]
    fn test_guess_wire_format_is_camel_case() {
        let guess = Guess::new("p1", Direction::Up, dec!(50000), 60);
        let json = serde_json::to_value(&guess).unwrap();

        assert!(json.get("playerId").is_some());
        assert!(json.get("startValue").is_some());
        assert!(json.get("resolveAfter").is_some());
        assert_eq!(json.get("status").unwrap(), "PENDING");
        assert_eq!(json.get("direction").unwrap(), "UP");
    }
}
