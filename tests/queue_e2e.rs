//! Queue producer/consumer and cancellation scenarios.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blocksync::{BlockingQueue, BoundedQueue, Queue};

/// A slow consumer forces a fast producer to block on a small capacity,
/// and every item still arrives in insertion order.
#[test]
fn bounded_producer_consumer_preserves_order() {
    common::init_logging();

    let queue = Arc::new(BoundedQueue::new(3));

    let producer_queue = Arc::clone(&queue);
    let producer = thread::spawn(move || {
        let start = Instant::now();
        for n in 1..=10u32 {
            producer_queue.add(n).expect("add");
            thread::sleep(Duration::from_millis(1));
        }
        start.elapsed()
    });

    let mut received = Vec::new();
    for _ in 0..10 {
        thread::sleep(Duration::from_millis(5));
        received.push(queue.next().expect("next"));
    }

    let producer_elapsed = producer.join().expect("producer panicked");

    assert_eq!(received, (1..=10).collect::<Vec<_>>());
    // Ten unblocked 1 ms-spaced adds would finish in ~10 ms; the small
    // capacity must have parked the producer behind the 5 ms consumer.
    assert!(
        producer_elapsed >= Duration::from_millis(20),
        "producer never blocked: {producer_elapsed:?}"
    );
    assert_eq!(queue.size(), 0);
}

/// Cancellation reaches every blocked consumer, promptly.
#[test]
fn cancel_wakes_all_blocked_consumers() {
    common::init_logging();

    let queue = Arc::new(BlockingQueue::<u32>::new());

    let mut consumers = Vec::new();
    for _ in 0..5 {
        let queue = Arc::clone(&queue);
        consumers.push(thread::spawn(move || queue.next()));
    }

    // Let all five park.
    thread::sleep(Duration::from_millis(50));

    let canceled_at = Instant::now();
    queue.cancel();

    for consumer in consumers {
        let err = consumer
            .join()
            .expect("consumer panicked")
            .expect_err("consumer must observe cancellation");
        assert!(err.is_canceled());
    }
    assert!(
        canceled_at.elapsed() < Duration::from_secs(2),
        "cancellation took too long to propagate"
    );
}

/// With concurrent producers and consumers and no cancellation, the
/// multiset of received items is exactly the multiset sent.
#[test]
fn no_item_is_lost_or_duplicated() {
    common::init_logging();

    const PRODUCERS: u32 = 4;
    const PER_PRODUCER: u32 = 250;

    let queue = Arc::new(BoundedQueue::new(8));

    let mut handles = Vec::new();
    for producer in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for n in 0..PER_PRODUCER {
                queue.add(producer * PER_PRODUCER + n).expect("add");
            }
        }));
    }

    let consumer_queue = Arc::clone(&queue);
    let consumer = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..(PRODUCERS * PER_PRODUCER) {
            seen.push(consumer_queue.next().expect("next"));
        }
        seen
    });

    for handle in handles {
        handle.join().expect("producer panicked");
    }
    let mut seen = consumer.join().expect("consumer panicked");
    seen.sort_unstable();

    assert_eq!(seen, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
}

/// Canceling a bounded queue releases producers parked on `not_full`.
#[test]
fn cancel_releases_blocked_producers() {
    common::init_logging();

    let queue = Arc::new(BoundedQueue::new(1));
    queue.add(0u32).expect("fill");

    let mut producers = Vec::new();
    for n in 1..=3u32 {
        let queue = Arc::clone(&queue);
        producers.push(thread::spawn(move || queue.add(n)));
    }

    thread::sleep(Duration::from_millis(50));
    queue.cancel();

    for producer in producers {
        let err = producer
            .join()
            .expect("producer panicked")
            .expect_err("producer must observe cancellation");
        assert!(err.is_canceled());
    }
}

/// A drain observer parked in `empty()` wakes when consumers catch up.
#[test]
fn empty_observer_sees_the_drain() {
    common::init_logging();

    let queue = Arc::new(BoundedQueue::new(4));
    for n in 0..4u32 {
        queue.add(n).expect("add");
    }

    let observer_queue = Arc::clone(&queue);
    let observer = thread::spawn(move || {
        let start = Instant::now();
        observer_queue.empty().expect("empty");
        start.elapsed()
    });

    thread::sleep(Duration::from_millis(40));
    for _ in 0..4 {
        queue.next().expect("next");
    }

    let waited = observer.join().expect("observer panicked");
    assert!(waited >= Duration::from_millis(30));
    assert_eq!(queue.size(), 0);
}
