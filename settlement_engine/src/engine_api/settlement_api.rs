use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use mkt_common::Money;

use crate::{
    bidding,
    config::SettlementConfig,
    db::traits::{MaterializeOutcome, SettlementDatabase, SettlementDbError},
    db_types::{Listing, ListingStatus, NewOrder, NewReconciliationItem, Order, ProductKind, ReconciliationReason},
    engine_api::{
        errors::{SettlementError, ValidationError},
        settlement_objects::{ConfirmedOrder, Confirmation, PurchaseTarget, Quote, QuoteRequest, RequestContext},
    },
    events::{BidSupersededEvent, EventProducers, OrderConfirmedEvent},
    gateway::{CheckoutGateway, CheckoutRequest, SessionStatus},
    helpers::{new_client_order_key, wallet_payment_id, IntentSigner, PaymentIntent},
    pricing,
    split_planner::{self, PaymentMode},
};

/// The provider recorded against orders paid entirely from the wallet.
pub const WALLET_PROVIDER: &str = "Wallet";

/// `OrderSettlementApi` is the top-level settlement state machine.
///
/// A purchase goes through these states:
///
/// ```text
///   Quoted --(wallet covers it)--------------------------------------> Materialized
///   Quoted --(gateway portion)--> AwaitingGatewayPayment --confirm--> Materialized
///                                                          \--------> Rejected / PaymentMismatch / Superseded
/// ```
///
/// Nothing is persisted until an order is materialized. Confirmation may arrive through the buyer's redirect, the
/// gateway webhook, or both, in any order. Both paths call [`Self::confirm_session`], which is idempotent on the client
/// order key.
pub struct OrderSettlementApi<B, G> {
    pub(crate) db: B,
    pub(crate) gateway: G,
    pub(crate) config: SettlementConfig,
    signer: IntentSigner,
    pub(crate) producers: EventProducers,
}

impl<B, G> Debug for OrderSettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderSettlementApi")
    }
}

impl<B, G> OrderSettlementApi<B, G> {
    pub fn new(db: B, gateway: G, config: SettlementConfig, producers: EventProducers) -> Self {
        let signer = IntentSigner::new(config.intent_secret.clone());
        Self { db, gateway, config, signer, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

impl<B, G> OrderSettlementApi<B, G>
where
    B: SettlementDatabase,
    G: CheckoutGateway,
{
    /// Prices a purchase, plans the wallet/gateway split and starts payment.
    ///
    /// * If the wallet covers the whole amount due, the order is settled immediately and returned in [`Quote::order`].
    /// * Otherwise a checkout session for the gateway portion is opened, carrying the signed payment intent, and the
    ///   buyer should be sent to [`Quote::redirect_url`].
    ///
    /// Validation failures have no side effects.
    pub async fn quote(&self, ctx: &RequestContext, request: QuoteRequest) -> Result<Quote, SettlementError> {
        let target = request.target;
        let (kind, listing_id) = (target.kind(), target.listing_id());
        if target.quantity() <= 0 {
            return Err(ValidationError::InvalidQuantity(target.quantity()).into());
        }
        let listing = self
            .db
            .fetch_listing(kind, listing_id)
            .await?
            .ok_or(ValidationError::ListingNotFound(kind, listing_id))?;
        self.validate_target(ctx, &listing, &target).await?;
        let pricing = pricing::quote(&listing, target.quantity(), target.bid_amount(), &self.config.pricing)
            .map_err(ValidationError::from)?;
        let pay_amount_total = pricing.payable(request.pay_amount);
        let available = match request.mode {
            PaymentMode::Split => self.db.get_available(ctx.buyer_id).await?.available,
            PaymentMode::GatewayOnly => Money::ZERO,
        };
        let split = split_planner::plan(pay_amount_total, request.wallet_amount, request.mode, available);
        let intent = PaymentIntent {
            user_id: ctx.buyer_id,
            target_kind: kind,
            target_id: listing_id,
            quantity: pricing.quantity,
            bid_amount: target.bid_amount(),
            wallet_amount: split.wallet_amount,
            gateway_amount: split.gateway_amount,
            pay_amount_total,
            deposit_required: pricing.deposit_required,
            total: pricing.total,
            client_order_key: new_client_order_key(),
        };
        let mut quote = Quote {
            kind,
            listing_id,
            total: pricing.total,
            deposit_required: pricing.deposit_required,
            pay_amount_total,
            wallet_amount: split.wallet_amount,
            gateway_amount: split.gateway_amount,
            client_order_key: intent.client_order_key.clone(),
            session_id: None,
            redirect_url: None,
            order: None,
        };
        if split.is_wallet_only() {
            debug!(
                "🧾️ The wallet of user #{} covers {pay_amount_total} for {kind} #{listing_id}. Settling immediately.",
                ctx.buyer_id
            );
            let payment_id = wallet_payment_id(&intent.client_order_key);
            let order = new_order(&intent, pay_amount_total, WALLET_PROVIDER, payment_id, &self.config, ctx.now);
            let confirmed = self.materialize(order, ctx.now).await?;
            quote.order = Some(confirmed.order);
            return Ok(quote);
        }
        let request = CheckoutRequest {
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
            product_name: format!("{kind}: {}", listing.title),
            amount_minor_units: split.gateway_amount.value(),
            currency: self.config.currency.clone(),
            client_reference: intent.client_order_key.clone(),
            metadata: intent.to_metadata(&self.signer)?,
        };
        let session = self.gateway.open_checkout_session(request).await?;
        info!(
            "💳️ Opened checkout session {} for {} of {pay_amount_total} ({kind} #{listing_id}, user #{})",
            session.session_id, split.gateway_amount, ctx.buyer_id
        );
        quote.session_id = Some(session.session_id);
        quote.redirect_url = Some(session.redirect_url);
        Ok(quote)
    }

    async fn validate_target(
        &self,
        ctx: &RequestContext,
        listing: &Listing,
        target: &PurchaseTarget,
    ) -> Result<(), SettlementError> {
        let result = match target {
            PurchaseTarget::AuctionBid { bid_amount, .. } => {
                let bids = self.db.fetch_orders_for_listing(listing.id).await?;
                bidding::validate_bid(listing, ctx.buyer_id, *bid_amount, bidding::top_bid(&bids), ctx.now)
                    .map_err(ValidationError::from)
            },
            _ if listing.owner_id == ctx.buyer_id => Err(ValidationError::SelfOrderForbidden),
            _ if listing.status != ListingStatus::Available => Err(ValidationError::ListingUnavailable(listing.id)),
            _ if listing.kind.is_stocked() && listing.stock < target.quantity() => Err(ValidationError::OutOfStock {
                listing_id: listing.id,
                requested: target.quantity(),
                available: listing.stock,
            }),
            _ => Ok(()),
        };
        if let Err(e) = &result {
            debug!("🧾️ Rejected {} request by user #{}: {e}", listing.kind, ctx.buyer_id);
        }
        Ok(result?)
    }

    /// Confirms a checkout session and materializes its order. Safe to call any number of times, from the redirect
    /// and the webhook alike: only the first successful call creates the order, the rest return it with
    /// `already_processed` set.
    ///
    /// Once the gateway reports the session as paid, any failure to create the order (amount mismatch, superseded
    /// bid, sold out, auction closed) queues the captured amount for reconciliation and, if configured, refunds it.
    /// From then on the session is settled by reconciliation: later confirmations never create the order, even if
    /// stock or funds have come back in the meantime.
    pub async fn confirm_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmedOrder, SettlementError> {
        let session = self.gateway.session_status(session_id).await?;
        if !session.payment_status.is_paid() {
            warn!("💳️ Checkout session {session_id} is '{}'. No order will be created.", session.payment_status);
            return Err(SettlementError::PaymentNotCompleted(session_id.to_string()));
        }
        let intent = match PaymentIntent::from_metadata(&session.metadata, &self.signer) {
            Ok(intent) => intent,
            Err(e) => {
                let reason = e.to_string();
                let error = SettlementError::PaymentAmountMismatch { session_id: session_id.to_string(), reason };
                return Err(self.reject_paid_session(&session, None, error).await);
            },
        };
        let paid_now = match check_payment(&session, &intent) {
            Ok(paid) => paid,
            Err(reason) => {
                let error = SettlementError::PaymentAmountMismatch { session_id: session_id.to_string(), reason };
                return Err(self.reject_paid_session(&session, Some(&intent), error).await);
            },
        };
        let payment_id = session.payment_intent_id.clone().unwrap_or_else(|| session.session_id.clone());
        let order = new_order(&intent, paid_now, self.gateway.provider_name(), payment_id, &self.config, now);
        match self.materialize(order, now).await {
            Ok(confirmed) => Ok(confirmed),
            Err(e) if e.is_post_payment_failure() => {
                Err(self.reject_paid_session(&session, Some(&intent), e).await)
            },
            Err(e) => Err(e),
        }
    }

    /// [`Self::confirm_session`] for controllers: never fails, and summarises the outcome.
    pub async fn confirm(&self, session_id: &str, now: DateTime<Utc>) -> Confirmation {
        match self.confirm_session(session_id, now).await {
            Ok(confirmed) => confirmed.into(),
            Err(e) => Confirmation { success: false, order_id: None, message: e.to_string() },
        }
    }

    async fn materialize(&self, order: NewOrder, now: DateTime<Utc>) -> Result<ConfirmedOrder, SettlementError> {
        let listing_id = order.listing_id;
        let outcome = self.db.materialize_order(order, now).await.map_err(|e| match e {
            SettlementDbError::Rejected(r) => SettlementError::from_rejection(listing_id, r),
            e => e.into(),
        })?;
        match outcome {
            MaterializeOutcome::Inserted { order, outbid } => {
                info!(
                    "🧾️ {} order #{} placed by user #{}. {} paid now ({} wallet, {} gateway)",
                    order.kind, order.id, order.buyer_id, order.amount_paid, order.wallet_amount, order.gateway_amount
                );
                self.call_order_confirmed_hook(&order).await;
                if let Some(outbid) = outbid {
                    info!(
                        "🔨️ Bid #{} of {:?} on listing #{listing_id} was outbid by #{}",
                        outbid.id, outbid.bid_amount, order.id
                    );
                    self.call_bid_superseded_hook(outbid, &order).await;
                }
                Ok(ConfirmedOrder { order, already_processed: false })
            },
            MaterializeOutcome::AlreadyExists(order) => {
                info!("🧾️ Order #{} for {} was already placed", order.id, order.client_order_key);
                Ok(ConfirmedOrder { order, already_processed: true })
            },
        }
    }

    /// Logs the failure, queues the session for reconciliation, and hands the error back.
    async fn reject_paid_session(
        &self,
        session: &SessionStatus,
        intent: Option<&PaymentIntent>,
        error: SettlementError,
    ) -> SettlementError {
        match &error {
            SettlementError::PaymentAmountMismatch { .. } => {
                warn!("💳️ Paid session {} cannot be settled. {error}", session.session_id)
            },
            _ => error!("🧾️ Paid session {} cannot be settled. {error}", session.session_id),
        }
        let amount = session
            .amount_total
            .map(Money::from_minor_units)
            .or_else(|| intent.map(|i| i.gateway_amount))
            .unwrap_or_default();
        let item = NewReconciliationItem {
            session_id: session.session_id.clone(),
            client_order_key: intent.map(|i| i.client_order_key.clone()),
            user_id: intent.map(|i| i.user_id),
            provider_payment_id: session.payment_intent_id.clone(),
            amount,
            reason: error.reconciliation_reason().unwrap_or(ReconciliationReason::PaymentAmountMismatch),
            note: Some(error.to_string()),
        };
        if let Err(e) = self.queue_for_reconciliation(item).await {
            error!(
                "🧾️ Could not queue session {} for reconciliation. {e}. This payment needs manual attention.",
                session.session_id
            );
        }
        error
    }

    async fn call_order_confirmed_hook(&self, order: &Order) {
        for emitter in &self.producers.order_confirmed_producer {
            debug!("📬️ Notifying order confirmed hook subscribers");
            emitter.publish_event(OrderConfirmedEvent::new(order.clone())).await;
        }
    }

    async fn call_bid_superseded_hook(&self, outbid: Order, new_top_bid: &Order) {
        for emitter in &self.producers.bid_superseded_producer {
            debug!("📬️ Notifying bid superseded hook subscribers");
            emitter.publish_event(BidSupersededEvent::new(outbid.clone(), new_top_bid.clone())).await;
        }
    }
}

/// Checks the captured payment against the intent, and returns the amount paid now.
fn check_payment(session: &SessionStatus, intent: &PaymentIntent) -> Result<Money, String> {
    if let Some(captured) = session.amount_total {
        let captured = Money::from_minor_units(captured);
        if captured != intent.gateway_amount {
            return Err(format!("The gateway captured {captured}, but {} was expected", intent.gateway_amount));
        }
    }
    if intent.wallet_amount.is_negative() || intent.gateway_amount.is_negative() {
        return Err("Payment portions cannot be negative".to_string());
    }
    let paid = intent.wallet_amount + intent.gateway_amount;
    match intent.target_kind {
        ProductKind::Rental | ProductKind::AuctionBid => {
            if paid != intent.pay_amount_total {
                return Err(format!("{paid} was paid, but exactly {} is due", intent.pay_amount_total));
            }
            if intent.pay_amount_total != intent.deposit_required {
                return Err(format!(
                    "{} is due, but the deposit is {}",
                    intent.pay_amount_total, intent.deposit_required
                ));
            }
            Ok(paid)
        },
        ProductKind::Material | ProductKind::Machine => {
            if intent.deposit_required > intent.pay_amount_total || intent.pay_amount_total > intent.total {
                return Err(format!(
                    "{} is outside the payable range of {} to {}",
                    intent.pay_amount_total, intent.deposit_required, intent.total
                ));
            }
            Ok(paid.clamp_between(intent.deposit_required, intent.pay_amount_total))
        },
    }
}

fn new_order<S: Into<String>>(
    intent: &PaymentIntent,
    amount_paid: Money,
    provider: &str,
    provider_payment_id: S,
    config: &SettlementConfig,
    now: DateTime<Utc>,
) -> NewOrder {
    let quantity = intent.quantity.max(1);
    NewOrder {
        kind: intent.target_kind,
        buyer_id: intent.user_id,
        listing_id: intent.target_id,
        quantity,
        unit_price: Money::from_minor_units(intent.total.value() / quantity),
        bid_amount: intent.bid_amount,
        total_price: intent.total,
        deposit_required: intent.deposit_required,
        amount_paid,
        wallet_amount: intent.wallet_amount,
        gateway_amount: intent.gateway_amount,
        provider: provider.to_string(),
        provider_payment_id: provider_payment_id.into(),
        client_order_key: intent.client_order_key.clone(),
        cancel_until: now + config.cancel_window,
        created_at: now,
    }
}
