//! End-to-end guess lifecycle over the in-memory adapters: orchestrator
//! places the guess, the queue delivers it, the worker settles it.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use bitguess::adapters::{MemoryQueue, MemoryStore, StaticPriceFeed};
use bitguess::domain::{Direction, Guess, GuessStatus};
use bitguess::game::{
    GuessOrchestrator, GuessStore, PlayerStore, ResolutionWorker, WorkerConfig,
};

struct World {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    feed: Arc<StaticPriceFeed>,
    orchestrator: GuessOrchestrator,
    worker: ResolutionWorker,
}

/// Zero reveal window so enqueued messages are immediately due.
fn world(price: rust_decimal::Decimal) -> World {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let feed = Arc::new(StaticPriceFeed::new(price));

    let orchestrator = GuessOrchestrator::new(
        store.clone(),
        store.clone(),
        queue.clone(),
        feed.clone(),
        0,
    );

    let worker = ResolutionWorker::new(
        store.clone(),
        store.clone(),
        feed.clone(),
        queue.clone(),
        WorkerConfig {
            poll_interval_ms: 10,
            batch_size: 10,
            visibility_timeout_secs: 30,
        },
    );

    World {
        store,
        queue,
        feed,
        orchestrator,
        worker,
    }
}

async fn wait_for_settled(store: &MemoryStore, id: uuid::Uuid) -> Guess {
    for _ in 0..200 {
        if let Some(guess) = store.get_guess(id).await.unwrap() {
            if guess.status != GuessStatus::Pending {
                return guess;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("guess {id} never settled");
}

#[tokio::test]
async fn winning_guess_settles_and_scores_once() {
    let w = world(dec!(50000));

    let guess = w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();
    assert_eq!(guess.start_value, dec!(50000));

    // Price moves up before resolution
    w.feed.set_price(dec!(55000)).await;

    let handle = w.worker.start();
    let settled = wait_for_settled(&w.store, guess.id).await;
    w.worker.stop();
    let _ = handle.await;

    assert_eq!(settled.status, GuessStatus::Resolved);
    assert_eq!(settled.end_value, Some(dec!(55000)));
    assert_eq!(settled.delta, Some(1));

    let player = w.store.get_player("p1").await.unwrap().unwrap();
    assert_eq!(player.score, 1);
    assert!(player.pending_guess_id.is_none());

    // The message was acknowledged
    assert!(w.queue.is_empty().await);
}

#[tokio::test]
async fn unchanged_price_settles_as_push() {
    let w = world(dec!(50000));

    let guess = w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();

    let handle = w.worker.start();
    let settled = wait_for_settled(&w.store, guess.id).await;
    w.worker.stop();
    let _ = handle.await;

    assert_eq!(settled.status, GuessStatus::Resolved);
    assert_eq!(settled.delta, Some(0));

    let player = w.store.get_player("p1").await.unwrap().unwrap();
    assert_eq!(player.score, 0);
    assert!(player.pending_guess_id.is_none());
}

#[tokio::test]
async fn price_outage_voids_and_frees_the_player() {
    let w = world(dec!(50000));

    let guess = w.orchestrator.place_guess("p1", Direction::Down).await.unwrap();
    w.feed.set_unavailable().await;

    let handle = w.worker.start();
    let settled = wait_for_settled(&w.store, guess.id).await;
    w.worker.stop();
    let _ = handle.await;

    assert_eq!(settled.status, GuessStatus::Void);
    assert_eq!(settled.delta, Some(0));

    let player = w.store.get_player("p1").await.unwrap().unwrap();
    assert_eq!(player.score, 0);
    assert!(player.pending_guess_id.is_none());

    // The slot is free again
    w.feed.set_price(dec!(50000)).await;
    w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();
}

#[tokio::test]
async fn duplicate_delivery_settles_exactly_once() {
    let w = world(dec!(50000));

    let guess = w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();
    w.feed.set_price(dec!(60000)).await;

    // Simulate at-least-once delivery: a second copy of the same message
    w.queue
        .enqueue_raw(&serde_json::json!({ "guessId": guess.id }).to_string())
        .await;

    let handle = w.worker.start();
    let settled = wait_for_settled(&w.store, guess.id).await;

    // Drain both deliveries
    for _ in 0..200 {
        if w.queue.is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    w.worker.stop();
    let _ = handle.await;

    assert_eq!(settled.status, GuessStatus::Resolved);
    assert!(w.queue.is_empty().await);

    let player = w.store.get_player("p1").await.unwrap().unwrap();
    assert_eq!(player.score, 1, "duplicate delivery must not double-score");
    assert!(player.pending_guess_id.is_none());
}

#[tokio::test]
async fn player_plays_consecutive_rounds() {
    let w = world(dec!(50000));

    // Round 1: win
    let first = w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();
    w.feed.set_price(dec!(51000)).await;

    let handle = w.worker.start();
    wait_for_settled(&w.store, first.id).await;

    // Round 2: lose
    let second = w.orchestrator.place_guess("p1", Direction::Up).await.unwrap();
    assert_eq!(second.start_value, dec!(51000));
    w.feed.set_price(dec!(50500)).await;
    wait_for_settled(&w.store, second.id).await;

    w.worker.stop();
    let _ = handle.await;

    let player = w.store.get_player("p1").await.unwrap().unwrap();
    assert_eq!(player.score, 0);

    let history = w.store.list_for_player("p1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|g| g.status == GuessStatus::Resolved));
}
