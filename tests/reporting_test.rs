mod common;

use anyhow::Result;
use chrono::{Datelike, Utc};
use common::{Users, test_service};
use valuta::application::ErrorKind;
use valuta::io::{DateRange, Exporter};

#[tokio::test]
async fn test_wallet_stats() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    Users::register(&service, "Bob", "bob@example.com").await?;
    let usd = alice.wallets[0].id;

    service.transfer(usd, "bob@example.com", 2500, None).await?;
    service
        .convert(usd, alice.wallets[1].id, 1000)
        .await?;

    let stats = service.wallet_stats(usd).await?;
    assert_eq!(stats.balance, 6500);
    assert_eq!(stats.total_received, 10000);
    assert_eq!(stats.total_sent, 2500);
    assert_eq!(stats.transaction_count, 3);

    Ok(())
}

#[tokio::test]
async fn test_user_summary_and_monthly_report() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    Users::register(&service, "Bob", "bob@example.com").await?;

    service
        .transfer(alice.wallets[0].id, "bob@example.com", 3000, None)
        .await?;
    service
        .convert(alice.wallets[0].id, alice.wallets[1].id, 5000)
        .await?;

    let summary = service.user_summary(alice.user.id).await?;
    assert_eq!(summary.currency, "USD");
    assert_eq!(summary.wallet_count, 2);
    assert_eq!(summary.transaction_count, 4);
    assert_eq!(summary.total_sent, 3000);
    assert_eq!(summary.total_converted, 5000);
    // 10000 seed + 4600 EUR converted back to USD at 0.92
    assert_eq!(summary.total_received, 15000);
    // 2000 USD + 4600 EUR (= 5000 USD)
    assert_eq!(summary.total_balance, 7000);

    let now = Utc::now();
    let report = service
        .monthly_report(alice.user.id, now.year(), now.month())
        .await?;
    assert_eq!(report.transaction_count, 4);
    assert_eq!(report.total_sent, 3000);
    assert_eq!(report.net_flow, report.total_received - report.total_sent);
    assert_eq!(report.type_breakdown["DEPOSIT"], 2);
    assert!(!report.daily.is_empty());

    let invalid = service
        .monthly_report(alice.user.id, now.year(), 13)
        .await
        .unwrap_err();
    assert_eq!(invalid.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_export_transactions_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    service
        .convert(alice.wallets[0].id, alice.wallets[1].id, 1000)
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter
        .export_transactions_csv(alice.user.id, DateRange::default(), &mut buffer)
        .await?;
    assert_eq!(count, 3);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "id,date,type,amount,currency,description,status,payment_ref"
    );
    assert!(lines[1].contains("DEPOSIT,9.20,EUR,Converted from USD,SUCCESS"));
    assert!(lines[3].contains("DEPOSIT,100.00,USD,Seed,SUCCESS"));

    let future_only = DateRange {
        from: Some(Utc::now() + chrono::Duration::days(1)),
        to: None,
    };
    let mut empty = Vec::new();
    let count = exporter
        .export_transactions_csv(alice.user.id, future_only, &mut empty)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn test_export_full_json_snapshot() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Users::funded(&service, "Alice", "alice@example.com", 10000).await?;
    Users::register(&service, "Bob", "bob@example.com").await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service).export_full_json(&mut buffer).await?;

    assert_eq!(snapshot.users.len(), 2);
    assert_eq!(snapshot.wallets.len(), 4);
    assert_eq!(snapshot.transactions.len(), 1);

    let parsed: serde_json::Value = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed["wallets"].as_array().map(Vec::len), Some(4));
    assert_eq!(parsed["transactions"][0]["kind"], "DEPOSIT");

    Ok(())
}
