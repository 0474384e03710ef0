#![allow(dead_code)]

use chrono::{Duration, Utc};
use log::*;
use mkt_common::Money;
use settlement_engine::{
    db_types::{Listing, NewListing, ProductKind},
    events::EventProducers,
    settlement_objects::{ConfirmedOrder, PurchaseTarget, Quote, QuoteRequest, RequestContext},
    test_utils::{
        prepare_env::{drop_database, prepare_test_env, random_db_path},
        MockGateway,
    },
    ListingManagement,
    OrderSettlementApi,
    SettlementConfig,
    SettlementError,
    SqliteDatabase,
    WalletApi,
};

pub const SELLER: i64 = 1;
pub const ALICE: i64 = 2;
pub const BOB: i64 = 3;
pub const CAROL: i64 = 4;

pub fn m(s: &str) -> Money {
    s.parse().expect("Not a valid amount")
}

pub fn test_config() -> SettlementConfig {
    SettlementConfig::default().with_intent_secret("settlement-engine-test-secret")
}

pub struct TestSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: MockGateway,
    pub api: OrderSettlementApi<SqliteDatabase, MockGateway>,
    pub wallets: WalletApi<SqliteDatabase>,
}

impl std::fmt::Debug for TestSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSystem ({})", self.db_path)
    }
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_config(test_config(), EventProducers::default()).await
    }

    pub async fn with_config(config: SettlementConfig, producers: EventProducers) -> Self {
        let db_path = random_db_path();
        prepare_test_env(&db_path).await;
        let db = SqliteDatabase::new_with_url(&db_path, 8).await.expect("Error creating connection to database");
        let gateway = MockGateway::new();
        let api = OrderSettlementApi::new(db.clone(), gateway.clone(), config, producers);
        let wallets = WalletApi::new(db.clone());
        Self { db_path, db, gateway, api, wallets }
    }

    pub async fn tear_down(self) {
        let Self { db_path, db, api, wallets, .. } = self;
        drop(api);
        drop(wallets);
        db.pool().close().await;
        drop_database(&db_path).await;
        debug!("🚀️ Removed test database {db_path}");
    }

    pub async fn listing(&self, listing: NewListing) -> Listing {
        self.db.insert_listing(listing).await.expect("Error inserting listing")
    }

    pub async fn material(&self, price: &str, stock: i64) -> Listing {
        self.listing(NewListing::new(ProductKind::Material, SELLER, "Oak planks", m(price), stock)).await
    }

    pub async fn rental(&self, monthly: &str) -> Listing {
        self.listing(NewListing::new(ProductKind::Rental, SELLER, "Excavator", m(monthly), 1)).await
    }

    /// An auction that opened an hour ago and closes in an hour.
    pub async fn auction(&self, start_price: &str) -> Listing {
        let now = Utc::now();
        let listing = NewListing::auction(
            SELLER,
            "Vintage lathe",
            m(start_price),
            now - Duration::hours(1),
            now + Duration::hours(1),
        );
        self.listing(listing).await
    }

    pub async fn fund(&self, user_id: i64, amount: &str) {
        let key = format!("top-up-{user_id}-{amount}-{}", rand::random::<u32>());
        self.wallets.top_up(user_id, m(amount), &key).await.expect("Error topping up wallet");
    }

    pub async fn quote(&self, buyer_id: i64, request: QuoteRequest) -> Result<Quote, SettlementError> {
        self.api.quote(&RequestContext::new(buyer_id), request).await
    }

    pub async fn buy_material(&self, buyer_id: i64, listing_id: i64, quantity: i64, pay: &str) -> Quote {
        let request = QuoteRequest::new(PurchaseTarget::Material { listing_id, quantity }).with_pay_amount(m(pay));
        self.quote(buyer_id, request).await.expect("Error quoting material")
    }

    pub async fn bid(&self, buyer_id: i64, listing_id: i64, amount: &str) -> Result<Quote, SettlementError> {
        self.quote(buyer_id, QuoteRequest::new(PurchaseTarget::AuctionBid { listing_id, bid_amount: m(amount) })).await
    }

    /// Pays the quote's checkout session in full and confirms it.
    pub async fn pay_and_confirm(&self, quote: &Quote) -> Result<ConfirmedOrder, SettlementError> {
        let session_id = quote.session_id.as_deref().expect("Quote has no checkout session");
        assert!(self.gateway.pay_session(session_id));
        self.api.confirm_session(session_id, Utc::now()).await
    }
}
