pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod game;

pub use adapters::{
    BinancePriceFeed, MemoryQueue, MemoryStore, PostgresQueue, PostgresStore, StaticPriceFeed,
};
pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use domain::{compute_delta, Direction, Guess, GuessStatus, Player};
pub use error::{GameError, Result};
pub use game::{
    GuessOrchestrator, GuessStore, PlayerStore, PriceFeed, QueueConsumer, ResolutionQueue,
    ResolutionWorker, WorkerConfig, WriteOutcome,
};
