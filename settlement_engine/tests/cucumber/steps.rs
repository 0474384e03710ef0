use chrono::Utc;
use cucumber::{given, then, when};
use futures_util::future::join_all;
use log::*;
use mkt_common::Money;
use settlement_engine::{
    db_types::{NewListing, ProductKind},
    settlement_objects::{PurchaseTarget, QuoteRequest},
    ListingManagement,
};

use crate::{
    cucumber::{user_id, MarketWorld},
    support::{m, TestSystem, SELLER},
};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "a material listing {string} priced at {string} with {int} in stock")]
async fn material_listing(world: &mut MarketWorld, name: String, price: String, stock: i64) {
    let listing = NewListing::new(ProductKind::Material, SELLER, &name, m(&price), stock);
    let listing = world.system().listing(listing).await;
    world.listings.insert(name, listing);
}

#[given(expr = "a rental listing {string} at {string} per month")]
async fn rental_listing(world: &mut MarketWorld, name: String, monthly: String) {
    let listing = NewListing::new(ProductKind::Rental, SELLER, &name, m(&monthly), 1);
    let listing = world.system().listing(listing).await;
    world.listings.insert(name, listing);
}

#[given(expr = "an open auction {string} starting at {string}")]
async fn open_auction(world: &mut MarketWorld, name: String, start_price: String) {
    let listing = world.system().auction(&start_price).await;
    world.listings.insert(name, listing);
}

#[given(expr = "{word} has {string} in their wallet")]
async fn fund_wallet(world: &mut MarketWorld, user: String, amount: String) {
    world.system().fund(user_id(&user), &amount).await;
}

#[when(expr = "{word} asks to buy {int} of {string} paying {string} now")]
async fn quote_material(world: &mut MarketWorld, buyer: String, quantity: i64, name: String, pay: String) {
    let listing_id = world.listing(&name).id;
    let request = QuoteRequest::new(PurchaseTarget::Material { listing_id, quantity }).with_pay_amount(m(&pay));
    let result = world.system().quote(user_id(&buyer), request).await;
    world.record_quote(&buyer, result);
}

#[when(expr = "{word} asks to buy {int} of {string} paying {string} now, {string} of it from their wallet")]
async fn quote_split(world: &mut MarketWorld, buyer: String, quantity: i64, name: String, pay: String, wallet: String) {
    let listing_id = world.listing(&name).id;
    let request = QuoteRequest::new(PurchaseTarget::Material { listing_id, quantity })
        .with_pay_amount(m(&pay))
        .with_wallet_amount(m(&wallet));
    let result = world.system().quote(user_id(&buyer), request).await;
    world.record_quote(&buyer, result);
}

#[when(expr = "{word} asks to rent {string}")]
async fn quote_rental(world: &mut MarketWorld, buyer: String, name: String) {
    let listing_id = world.listing(&name).id;
    let request = QuoteRequest::new(PurchaseTarget::Rental { listing_id });
    let result = world.system().quote(user_id(&buyer), request).await;
    world.record_quote(&buyer, result);
}

#[when(expr = "{word} bids {string} on {string}")]
async fn quote_bid(world: &mut MarketWorld, buyer: String, amount: String, name: String) {
    let listing_id = world.listing(&name).id;
    let result = world.system().bid(user_id(&buyer), listing_id, &amount).await;
    world.record_quote(&buyer, result);
}

#[when(expr = "{word} completes the checkout")]
async fn complete_checkout(world: &mut MarketWorld, buyer: String) {
    let quote = world.quote(&buyer).clone();
    let result = world.system().pay_and_confirm(&quote).await;
    world.record_confirmation(result);
}

#[when(expr = "{word} pays {string} at the checkout")]
async fn pay_checkout_amount(world: &mut MarketWorld, buyer: String, amount: String) {
    let session_id = world.quote(&buyer).session_id.clone().expect("The quote has no checkout session");
    let sys = world.system();
    assert!(sys.gateway.pay_session_with_amount(&session_id, m(&amount).value()));
    let result = sys.api.confirm_session(&session_id, Utc::now()).await;
    world.record_confirmation(result);
}

#[when(expr = "the gateway reports {word}'s checkout again")]
async fn confirm_again(world: &mut MarketWorld, buyer: String) {
    let session_id = world.quote(&buyer).session_id.clone().expect("The quote has no checkout session");
    let result = world.system().api.confirm_session(&session_id, Utc::now()).await;
    world.record_confirmation(result);
}

#[when("everyone pays and their checkouts are confirmed at the same time")]
async fn confirm_concurrently(world: &mut MarketWorld) {
    let sys = world.system();
    let session_ids = world.quotes.values().filter_map(|q| q.session_id.clone()).collect::<Vec<_>>();
    for id in &session_ids {
        assert!(sys.gateway.pay_session(id));
    }
    let results = join_all(session_ids.iter().map(|id| sys.api.confirm_session(id, Utc::now()))).await;
    for result in results {
        world.record_confirmation(result);
    }
}

#[then(expr = "{word}'s quote asks for a deposit of {string}")]
async fn quote_deposit(world: &mut MarketWorld, buyer: String, deposit: String) {
    assert_eq!(world.quote(&buyer).deposit_required, m(&deposit));
}

#[then(expr = "{word}'s quote charges {string} now, {string} of it at the gateway")]
async fn quote_amounts(world: &mut MarketWorld, buyer: String, pay_now: String, gateway: String) {
    let quote = world.quote(&buyer);
    assert_eq!(quote.pay_amount_total, m(&pay_now));
    assert_eq!(quote.gateway_amount, m(&gateway));
}

#[then(expr = "{word}'s order is placed without visiting the gateway")]
async fn settled_from_wallet(world: &mut MarketWorld, buyer: String) {
    let quote = world.quote(&buyer);
    assert!(quote.session_id.is_none());
    let order = quote.order.as_ref().expect("The order was not placed");
    assert_eq!(order.provider, "Wallet");
    assert_eq!(order.provider_payment_id, format!("WALLET-{}", quote.client_order_key));
}

#[then(expr = "the request is refused with {word}")]
async fn request_refused(world: &mut MarketWorld, reason: String) {
    let err = world.last_error.as_deref().expect("The request was not refused");
    assert!(err.contains(&reason), "Expected {reason}, got {err}");
}

#[then("the order is confirmed")]
async fn order_confirmed(world: &mut MarketWorld) {
    let confirmed = world.last_confirmation().as_ref().expect("The order was not confirmed");
    debug!("🚀️ Confirmed order #{}", confirmed.order.id);
}

#[then("the order was already processed")]
async fn already_processed(world: &mut MarketWorld) {
    let confirmed = world.last_confirmation().as_ref().expect("The order was not confirmed");
    assert!(confirmed.already_processed);
}

#[then(expr = "the confirmation fails with {word}")]
async fn confirmation_failed(world: &mut MarketWorld, reason: String) {
    match world.last_confirmation() {
        Ok(confirmed) => panic!("Expected {reason}, but order #{} was placed", confirmed.order.id),
        Err(e) => assert!(e.contains(&reason), "Expected {reason}, got {e}"),
    }
}

#[then(expr = "{word} has {int} order(s)")]
async fn order_count(world: &mut MarketWorld, buyer: String, count: usize) {
    let orders = world.system().api.orders_for_buyer(user_id(&buyer)).await.unwrap();
    assert_eq!(orders.len(), count, "{orders:?}");
}

#[then(expr = "{word}'s order has {string} paid and {string} due")]
async fn order_paid(world: &mut MarketWorld, buyer: String, paid: String, due: String) {
    let orders = world.system().api.orders_for_buyer(user_id(&buyer)).await.unwrap();
    let order = orders.last().expect("No orders found");
    assert_eq!(order.amount_paid, m(&paid));
    assert_eq!(order.balance_due(), m(&due));
}

#[then(expr = "{string} has {int} left in stock")]
async fn stock_left(world: &mut MarketWorld, name: String, stock: i64) {
    let listing = world.listing(&name);
    let listing = world.system().db.fetch_listing(listing.kind, listing.id).await.unwrap().unwrap();
    assert_eq!(listing.stock, stock);
}

#[then(expr = "{word}'s wallet holds {string}")]
async fn wallet_holds(world: &mut MarketWorld, user: String, amount: String) {
    let balance = world.system().wallets.balance(user_id(&user)).await.unwrap();
    assert_eq!(balance.available, m(&amount));
}

#[then(expr = "the gateway refunded {string} in {int} refund(s)")]
async fn refunds_issued(world: &mut MarketWorld, total: String, count: usize) {
    let refunds = world.system().gateway.refunds();
    assert_eq!(refunds.len(), count, "{refunds:?}");
    assert_eq!(refunds.iter().map(|r| r.amount).sum::<Money>(), m(&total));
}

#[then(expr = "the top bid on {string} is {string} by {word}")]
async fn top_bid(world: &mut MarketWorld, name: String, amount: String, bidder: String) {
    let listing_id = world.listing(&name).id;
    let top = world.system().api.top_bid(listing_id).await.unwrap().expect("There are no bids");
    assert_eq!(top.bid_amount, Some(m(&amount)));
    assert_eq!(top.buyer_id, user_id(&bidder));
}

#[then(expr = "the accepted bids on {string} strictly increase")]
async fn accepted_bids_increase(world: &mut MarketWorld, name: String) {
    let listing_id = world.listing(&name).id;
    let orders = world.system().api.orders_for_listing(listing_id).await.unwrap();
    let amounts = orders.iter().map(|o| o.bid_amount.unwrap_or_default()).collect::<Vec<_>>();
    info!("🚀️ Accepted bids: {amounts:?}");
    assert!(amounts.windows(2).all(|w| w[0] < w[1]), "Accepted bids must strictly increase: {amounts:?}");
}

#[then(expr = "every rejected bid was superseded")]
async fn rejected_bids_superseded(world: &mut MarketWorld) {
    for result in &world.confirmations {
        if let Err(e) = result {
            assert!(e.contains("BidSuperseded"), "Unexpected rejection: {e}");
        }
    }
}
