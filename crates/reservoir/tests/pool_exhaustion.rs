//! Capacity and blocking behavior: the pool hands out up to `max_size`
//! resources without waiting, and the next acquire parks until a
//! release frees something.

use std::time::Duration;

use reservoir::testing::TestFactory;
use reservoir::{Error, Pool, PoolConfig, Resource};

fn pool_of(max_size: usize) -> (Pool<TestFactory>, TestFactory) {
    let factory = TestFactory::default();
    let pool = Pool::new(
        factory.clone(),
        PoolConfig {
            max_size,
            ..Default::default()
        },
    )
    .unwrap();
    (pool, factory)
}

#[tokio::test(start_paused = true)]
async fn up_to_cap_acquires_succeed_without_waiting() {
    let (pool, factory) = pool_of(3);

    let mut handles = Vec::new();
    for expected in 1..=3 {
        handles.push(pool.acquire().await.unwrap());
        assert_eq!(pool.size(), expected);
    }
    assert_eq!(factory.created(), 3);

    // The fourth caller has to wait; with nobody releasing it gives up.
    let outcome = pool.acquire_timeout(Duration::from_millis(50)).await;
    assert!(matches!(outcome, Err(Error::Unavailable { .. })));
    assert_eq!(pool.size(), 3);

    for handle in handles {
        handle.release().await;
    }
    pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn blocked_acquire_unblocks_on_release() {
    let (pool, factory) = pool_of(1);

    let first = pool.acquire().await.unwrap();
    assert_eq!(pool.size(), 1);

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });

    // Let the waiter reach its park.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.size(), 1);

    first.release().await;
    let handed_off = waiter.await.unwrap().unwrap();
    assert_eq!(pool.size(), 1, "handoff reuses the single slot");
    assert_eq!(factory.created(), 1);

    handed_off.release().await;
    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrowers_stay_within_cap() {
    let (pool, factory) = pool_of(4);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                let handle = pool.acquire().await.unwrap();
                assert!(handle.get().unwrap().is_open());
                tokio::task::yield_now().await;
                handle.release().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(pool.size() <= 4);
    assert!(factory.created() <= 4, "no allocation ever slipped past the cap");
    pool.shutdown().await;
}
