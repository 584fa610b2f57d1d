//! Guess lifecycle core: stores, orchestrator and resolution worker

pub mod orchestrator;
pub mod traits;
pub mod worker;

pub use orchestrator::GuessOrchestrator;
pub use traits::{
    GuessStore, PlayerStore, PriceFeed, QueueConsumer, QueueMessage, ResolutionQueue, WriteOutcome,
};
pub use worker::{ResolutionWorker, WorkerConfig, WorkerStats};
