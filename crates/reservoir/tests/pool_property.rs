//! Property tests: across arbitrary acquire/release interleavings the
//! pool never allocates past its cap and its books stay balanced.

use std::time::Duration;

use proptest::prelude::*;
use reservoir::testing::TestFactory;
use reservoir::{Pool, PoolConfig};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn books_balance_under_arbitrary_interleavings(
        max_size in 1usize..6,
        ops in proptest::collection::vec(any::<bool>(), 1..24),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let factory = TestFactory::default();
            let pool = Pool::new(
                factory.clone(),
                PoolConfig {
                    max_size,
                    ..Default::default()
                },
            )
            .unwrap();
            let mut handles = Vec::new();

            for acquire in ops {
                if acquire {
                    // May time out when the pool is exhausted; that is
                    // a legitimate outcome, not a failure.
                    if let Ok(handle) =
                        pool.acquire_timeout(Duration::from_millis(5)).await
                    {
                        handles.push(handle);
                    }
                } else if let Some(handle) = handles.pop() {
                    handle.release().await;
                }

                let stats = pool.stats();
                prop_assert!(pool.size() <= max_size);
                prop_assert_eq!(pool.size(), stats.idle + stats.in_use);
            }

            for handle in handles {
                handle.release().await;
            }
            let stats = pool.stats();
            prop_assert_eq!(stats.in_use, 0);
            prop_assert_eq!(pool.size(), stats.idle);

            pool.shutdown().await;
            prop_assert_eq!(pool.size(), 0);
            prop_assert_eq!(factory.created(), factory.closed());
            Ok(())
        })?;
    }
}

/// Deterministic companion: rapid borrow cycles keep the books exact.
#[tokio::test]
async fn rapid_cycles_preserve_the_invariant() {
    let factory = TestFactory::default();
    let pool = Pool::new(
        factory.clone(),
        PoolConfig {
            max_size: 4,
            ..Default::default()
        },
    )
    .unwrap();

    for _ in 0..40 {
        let handle = pool.acquire().await.unwrap();
        let stats = pool.stats();
        assert_eq!(pool.size(), stats.idle + stats.in_use);
        handle.release().await;
    }

    assert_eq!(pool.size(), 1, "one resource serves a serial caller");
    assert_eq!(factory.created(), 1);
    pool.shutdown().await;
}
