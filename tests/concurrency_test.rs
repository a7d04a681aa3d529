mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{Users, balance, test_service};
use valuta::application::ErrorKind;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_debits_cannot_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let alice = Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    let bob = Users::register(&service, "Bob", "bob@example.com").await?;
    let from = alice.wallets[0].id;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.transfer(from, "bob@example.com", 6000, None).await })
        })
        .collect();

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
                rejections += 1;
            }
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejections, 1);
    assert_eq!(balance(&service, from).await?, 4000);
    assert_eq!(balance(&service, bob.wallets[0].id).await?, 6000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations_conserve_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);
    let alice = Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    let bob = Users::funded(&service, "Bob", "bob@example.com", 10000).await?;
    let (alice_usd, bob_usd) = (alice.wallets[0].id, bob.wallets[0].id);

    // Opposite directions over the same pair of wallets
    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                service.transfer(alice_usd, "bob@example.com", 1500, None).await
            } else {
                service.transfer(bob_usd, "alice@example.com", 700, None).await
            }
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await? {
            assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        }
    }

    let alice_balance = balance(&service, alice_usd).await?;
    let bob_balance = balance(&service, bob_usd).await?;
    assert!(alice_balance >= 0 && bob_balance >= 0);
    assert_eq!(alice_balance + bob_balance, 20000);

    // Every committed transfer left exactly one record on each side
    let alice_records = service.wallet_transactions(alice_usd, None).await?;
    let bob_records = service.wallet_transactions(bob_usd, None).await?;
    assert_eq!(alice_records.len(), bob_records.len());

    Ok(())
}
