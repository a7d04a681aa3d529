mod common;

use anyhow::Result;
use common::{Users, balance, test_service};
use valuta::application::{ErrorKind, PaymentConfirmation};
use valuta::domain::{Cents, TransactionType};

#[tokio::test]
async fn test_registration_creates_starter_wallets_in_order() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let registration = service
        .register_user(
            "Alice",
            "  Alice@Example.COM ",
            Some("+1 555 0100".into()),
            Some("US".into()),
        )
        .await?;

    assert_eq!(registration.user.email, "alice@example.com");
    assert_eq!(registration.user.country.as_deref(), Some("US"));
    let codes: Vec<_> = registration
        .wallets
        .iter()
        .map(|w| w.currency.as_str())
        .collect();
    assert_eq!(codes, vec!["USD", "EUR"]);
    assert!(registration.wallets.iter().all(|w| w.balance_cents == 0));

    let dup = service
        .register_user("Other", "alice@example.com", None, None)
        .await
        .unwrap_err();
    assert_eq!(dup.kind(), ErrorKind::EmailAlreadyExists);

    Ok(())
}

#[tokio::test]
async fn test_default_wallet_is_first_created() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::register(&service, "Alice", "alice@example.com").await?;

    service.create_wallet(alice.user.id, "GBP", 0).await?;

    let default = service.default_wallet(alice.user.id).await?.unwrap();
    assert_eq!(default.id, alice.wallets[0].id);

    let codes: Vec<_> = service
        .list_wallets(alice.user.id)
        .await?
        .into_iter()
        .map(|w| w.currency)
        .collect();
    assert_eq!(codes, vec!["USD", "EUR", "GBP"]);

    Ok(())
}

#[tokio::test]
async fn test_create_wallet_rules() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::register(&service, "Alice", "alice@example.com").await?;

    let unsupported = service
        .create_wallet(alice.user.id, "XYZ", 0)
        .await
        .unwrap_err();
    assert_eq!(unsupported.kind(), ErrorKind::UnsupportedCurrency);

    let duplicate = service
        .create_wallet(alice.user.id, "eur", 0)
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::WalletAlreadyExists);

    let negative = service
        .create_wallet(alice.user.id, "GBP", -1)
        .await
        .unwrap_err();
    assert_eq!(negative.kind(), ErrorKind::InvalidAmount);

    let unknown_user = service
        .create_wallet(uuid::Uuid::new_v4(), "GBP", 0)
        .await
        .unwrap_err();
    assert_eq!(unknown_user.kind(), ErrorKind::NotFound);

    let gbp = service.create_wallet(alice.user.id, "gbp", 2500).await?;
    assert_eq!(gbp.currency, "GBP");
    assert_eq!(gbp.symbol, "£");
    assert_eq!(gbp.balance_cents, 2500);

    let history = service.wallet_transactions(gbp.id, None).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "Initial deposit");

    Ok(())
}

#[tokio::test]
async fn test_card_payment_is_credited_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::register(&service, "Alice", "alice@example.com").await?;
    let wallet = alice.wallets[0].id;

    let payment = PaymentConfirmation {
        status: "succeeded".into(),
        amount: 5000,
        payment_reference: "pi_123".into(),
    };

    let receipt = service.confirm_payment(wallet, &payment).await?;
    assert_eq!(receipt.new_balance, 5000);

    let again = service.confirm_payment(wallet, &payment).await.unwrap_err();
    assert_eq!(again.kind(), ErrorKind::DuplicatePayment);

    let other_wallet = service
        .confirm_payment(alice.wallets[1].id, &payment)
        .await
        .unwrap_err();
    assert_eq!(other_wallet.kind(), ErrorKind::DuplicatePayment);

    let history = service.wallet_transactions(wallet, None).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionType::Deposit);
    assert_eq!(history[0].description, "Card Deposit");
    assert_eq!(history[0].payment_ref.as_deref(), Some("pi_123"));
    assert_eq!(balance(&service, wallet).await?, 5000);

    Ok(())
}

#[tokio::test]
async fn test_deposit_past_max_balance_is_invalid_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::funded(&service, "Alice", "alice@example.com", Cents::MAX - 1).await?;
    let usd = alice.wallets[0].id;

    let err = service
        .credit_deposit(usd, 10, "Top up", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    assert_eq!(balance(&service, usd).await?, Cents::MAX - 1);
    assert_eq!(service.wallet_transactions(usd, None).await?.len(), 1);

    let receipt = service.credit_deposit(usd, 1, "Last cent", None).await?;
    assert_eq!(receipt.new_balance, Cents::MAX);

    Ok(())
}

#[tokio::test]
async fn test_unsuccessful_payment_is_not_credited() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::register(&service, "Alice", "alice@example.com").await?;

    let payment = PaymentConfirmation {
        status: "requires_payment_method".into(),
        amount: 5000,
        payment_reference: "pi_456".into(),
    };

    let err = service
        .confirm_payment(alice.wallets[0].id, &payment)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentNotSucceeded);
    assert_eq!(balance(&service, alice.wallets[0].id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_transactions_are_listed_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = Users::register(&service, "Alice", "alice@example.com").await?;
    let (usd, eur) = (alice.wallets[0].id, alice.wallets[1].id);

    service.credit_deposit(usd, 100, "first", None).await?;
    service.credit_deposit(eur, 200, "second", None).await?;
    service.credit_deposit(usd, 300, "third", None).await?;

    let all = service.user_transactions(alice.user.id, None).await?;
    let descriptions: Vec<_> = all.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(descriptions, vec!["third", "second", "first"]);

    let limited = service.user_transactions(alice.user.id, Some(2)).await?;
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].description, "third");

    let usd_only = service.wallet_transactions(usd, None).await?;
    assert_eq!(usd_only.len(), 2);
    assert_eq!(usd_only[1].description, "first");

    Ok(())
}
