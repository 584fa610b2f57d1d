use thiserror::Error;
use uuid::Uuid;

/// Main error type for the guessing game backend
#[derive(Error, Debug)]
pub enum GameError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Price feed errors
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    // Guess lifecycle errors
    #[error("Guess not found: {0}")]
    GuessNotFound(Uuid),

    #[error("Guess already exists: {0}")]
    GuessAlreadyExists(Uuid),

    #[error("Guess {guess_id} cannot be resolved before {resolve_after}")]
    ResolutionTooEarly {
        guess_id: Uuid,
        resolve_after: chrono::DateTime<chrono::Utc>,
    },

    // Player errors
    #[error("Player {player_id} already has a pending guess: {pending_guess_id}")]
    PendingGuessExists {
        player_id: String,
        pending_guess_id: Uuid,
    },

    // Queue errors
    #[error("Malformed queue payload: {0}")]
    MalformedPayload(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for GameError
pub type Result<T> = std::result::Result<T, GameError>;
