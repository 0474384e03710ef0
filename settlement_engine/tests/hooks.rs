use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks},
    settlement_objects::RequestContext,
};

use crate::support::{m, test_config, TestSystem, ALICE, BOB};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }

    /// Handlers run on their own tasks, so give them a moment to catch up.
    pub async fn wait_for(&self, expected: i32) -> i32 {
        for _ in 0..100 {
            if self.count() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.count()
    }
}

#[tokio::test]
async fn confirmed_and_cancelled_orders_are_published() {
    let confirmed = HookCalled::default();
    let cancelled = HookCalled::default();
    let mut hooks = EventHooks::default();
    let c = confirmed.clone();
    hooks.on_order_confirmed(move |ev| {
        info!("🪝️ Order confirmed: #{}", ev.order.id);
        c.called();
        Box::pin(async {})
    });
    let c = cancelled.clone();
    hooks.on_order_cancelled(move |ev| {
        info!("🪝️ Order cancelled: #{}", ev.order.id);
        c.called();
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let sys = TestSystem::with_config(test_config(), producers).await;
    let listing = sys.material("10.00", 10).await;
    let first = sys.buy_material(ALICE, listing.id, 1, "10.00").await;
    let order = sys.pay_and_confirm(&first).await.unwrap().order;
    // Duplicate confirmations are not published again
    sys.pay_and_confirm(&first).await.unwrap();
    let second = sys.buy_material(BOB, listing.id, 2, "20.00").await;
    sys.pay_and_confirm(&second).await.unwrap();
    sys.api.cancel_order(&RequestContext::new(ALICE), order.id).await.unwrap();

    assert_eq!(confirmed.wait_for(2).await, 2);
    assert_eq!(cancelled.wait_for(1).await, 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn outbid_bidders_are_notified() {
    let outbid = Arc::new(Mutex::new(Vec::new()));
    let called = HookCalled::default();
    let mut hooks = EventHooks::default();
    let (list, c) = (outbid.clone(), called.clone());
    hooks.on_bid_superseded(move |ev| {
        let list = list.clone();
        let c = c.clone();
        Box::pin(async move {
            list.lock().unwrap().push((ev.outbid.buyer_id, ev.new_top_bid.buyer_id));
            c.called();
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let sys = TestSystem::with_config(test_config(), producers).await;
    let auction = sys.auction("50.00").await;
    let quote = sys.bid(ALICE, auction.id, "60.00").await.unwrap();
    sys.pay_and_confirm(&quote).await.unwrap();
    let quote = sys.bid(BOB, auction.id, "65.00").await.unwrap();
    sys.pay_and_confirm(&quote).await.unwrap();

    assert_eq!(called.wait_for(1).await, 1);
    assert_eq!(*outbid.lock().unwrap(), vec![(ALICE, BOB)]);
    sys.tear_down().await;
}

#[tokio::test]
async fn reconciliation_is_published_once_per_failure() {
    let called = HookCalled::default();
    let mut hooks = EventHooks::default();
    let c = called.clone();
    hooks.on_reconciliation_required(move |ev| {
        info!("🪝️ Reconciliation required: {} for {}", ev.item.amount, ev.item.reason);
        c.called();
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let sys = TestSystem::with_config(test_config(), producers).await;
    let listing = sys.material("10.00", 1).await;
    let alice = sys.buy_material(ALICE, listing.id, 1, "10.00").await;
    let bob = sys.buy_material(BOB, listing.id, 1, "10.00").await;
    sys.pay_and_confirm(&alice).await.unwrap();
    assert!(sys.pay_and_confirm(&bob).await.is_err());
    assert!(sys.pay_and_confirm(&bob).await.is_err());

    assert_eq!(called.wait_for(1).await, 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(called.count(), 1);
    assert_eq!(sys.gateway.refunds()[0].amount, m("10.00"));
    sys.tear_down().await;
}
