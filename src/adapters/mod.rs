//! Store, queue and price-feed implementations

pub mod binance;
pub mod memory;
pub mod postgres;
pub mod queue;

pub use binance::BinancePriceFeed;
pub use memory::{MemoryQueue, MemoryStore, StaticPriceFeed};
pub use postgres::PostgresStore;
pub use queue::PostgresQueue;
