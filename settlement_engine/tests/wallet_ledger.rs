use futures_util::future::join_all;
use log::*;
use mkt_common::Money;
use settlement_engine::{
    db_types::{WalletTxStatus, WalletTxType},
    WalletApiError,
};

use crate::support::{m, TestSystem, ALICE, BOB};

mod support;

#[tokio::test]
async fn top_up_debit_and_history() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    let empty = wallets.balance(ALICE).await.unwrap();
    assert_eq!(empty.balance, Money::ZERO);
    assert_eq!(empty.available, Money::ZERO);

    let tx = wallets.top_up(ALICE, m("50.00"), "topup-1").await.unwrap();
    assert_eq!(tx.tx_type, WalletTxType::Credit);
    assert_eq!(tx.status, WalletTxStatus::Succeeded);
    assert_eq!(tx.balance_after, m("50.00"));
    let tx = wallets.debit(ALICE, m("12.34"), "debit-1", "Coffee").await.unwrap();
    assert_eq!(tx.balance_after, m("37.66"));

    let balance = wallets.balance(ALICE).await.unwrap();
    assert_eq!(balance.balance, m("37.66"));
    assert_eq!(balance.available, m("37.66"));
    let history = wallets.history(ALICE).await.unwrap();
    let keys = history.iter().map(|tx| tx.idempotency_key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["topup-1", "debit-1"]);
    assert!(wallets.history(BOB).await.unwrap().is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn replayed_mutations_are_idempotent() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    let first = wallets.top_up(ALICE, m("20.00"), "topup-A").await.unwrap();
    let second = wallets.top_up(ALICE, m("20.00"), "topup-A").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(wallets.balance(ALICE).await.unwrap().balance, m("20.00"));

    let err = wallets.top_up(ALICE, m("25.00"), "topup-A").await.unwrap_err();
    assert!(matches!(err, WalletApiError::Conflict(_)), "{err:?}");
    let err = wallets.top_up(BOB, m("20.00"), "topup-A").await.unwrap_err();
    assert!(matches!(err, WalletApiError::Conflict(_)), "{err:?}");
    assert_eq!(wallets.history(ALICE).await.unwrap().len(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    sys.fund(ALICE, "10.00").await;
    let err = wallets.debit(ALICE, m("10.01"), "too-much", "").await.unwrap_err();
    match err {
        WalletApiError::InsufficientFunds { available, requested } => {
            assert_eq!(available, m("10.00"));
            assert_eq!(requested, m("10.01"));
        },
        e => panic!("Unexpected error: {e:?}"),
    }
    assert_eq!(wallets.balance(ALICE).await.unwrap().balance, m("10.00"));
    assert!(wallets.transaction("too-much").await.unwrap().is_none());

    let err = wallets.debit(ALICE, Money::ZERO, "zero", "").await.unwrap_err();
    assert!(matches!(err, WalletApiError::InvalidAmount(_)));
    let err = wallets.top_up(ALICE, m("-5.00"), "negative").await.unwrap_err();
    assert!(matches!(err, WalletApiError::InvalidAmount(_)));
    sys.tear_down().await;
}

#[tokio::test]
async fn holds_reduce_availability() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    sys.fund(ALICE, "100.00").await;
    wallets.hold(ALICE, m("30.00"), "hold-1", "Deposit guarantee").await.unwrap();
    let balance = wallets.balance(ALICE).await.unwrap();
    assert_eq!(balance.balance, m("100.00"));
    assert_eq!(balance.reserved, m("30.00"));
    assert_eq!(balance.available, m("70.00"));

    let err = wallets.debit(ALICE, m("80.00"), "debit-1", "").await.unwrap_err();
    assert!(matches!(err, WalletApiError::InsufficientFunds { .. }));

    wallets.release_hold(ALICE, m("30.00"), "release-1", "").await.unwrap();
    let balance = wallets.balance(ALICE).await.unwrap();
    assert_eq!(balance.reserved, Money::ZERO);
    assert_eq!(balance.available, m("100.00"));
    wallets.debit(ALICE, m("80.00"), "debit-2", "").await.unwrap();
    assert_eq!(wallets.balance(ALICE).await.unwrap().available, m("20.00"));
    sys.tear_down().await;
}

#[tokio::test]
async fn refunds_credit_the_wallet() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    let tx = wallets.refund(ALICE, m("7.50"), "refund-1", "Damaged goods").await.unwrap();
    assert_eq!(tx.tx_type, WalletTxType::Refund);
    assert_eq!(tx.note.as_deref(), Some("Damaged goods"));
    assert_eq!(wallets.balance(ALICE).await.unwrap().available, m("7.50"));
    sys.tear_down().await;
}

#[tokio::test]
async fn transaction_status_changes_follow_the_lifecycle() {
    let sys = TestSystem::new().await;
    let wallets = &sys.wallets;
    wallets.top_up(ALICE, m("5.00"), "topup-1").await.unwrap();
    let tx = wallets.update_transaction_status("topup-1", WalletTxStatus::Reversed).await.unwrap();
    assert_eq!(tx.status, WalletTxStatus::Reversed);
    let err = wallets.update_transaction_status("topup-1", WalletTxStatus::Succeeded).await.unwrap_err();
    assert!(matches!(err, WalletApiError::Conflict(_)), "{err:?}");
    let err = wallets.update_transaction_status("nope", WalletTxStatus::Failed).await.unwrap_err();
    assert!(matches!(err, WalletApiError::Conflict(_)), "{err:?}");
    sys.tear_down().await;
}

#[tokio::test]
async fn concurrent_debits_never_overdraw() {
    let sys = TestSystem::new().await;
    sys.fund(ALICE, "100.00").await;
    let debits = (0..25).map(|i| {
        let wallets = sys.wallets.clone();
        async move { wallets.debit(ALICE, m("10.00"), &format!("burst-{i}"), "Burst").await }
    });
    let results = join_all(debits).await;
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results.iter().filter(|r| matches!(r, Err(WalletApiError::InsufficientFunds { .. }))).count();
    info!("🚀️ {succeeded} debits succeeded, {rejected} were rejected");
    assert_eq!(succeeded, 10);
    assert_eq!(rejected, 15);
    let balance = sys.wallets.balance(ALICE).await.unwrap();
    assert_eq!(balance.available, Money::ZERO);
    assert_eq!(sys.wallets.history(ALICE).await.unwrap().len(), 11);
    sys.tear_down().await;
}
