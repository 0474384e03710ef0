use log::*;
use mkt_common::Money;

use crate::{
    db::traits::SettlementDatabase,
    db_types::{NewReconciliationItem, Order, OrderStatusType, ProductKind, ReconciliationReason},
    engine_api::{
        errors::{SettlementError, ValidationError},
        settlement_api::OrderSettlementApi,
        settlement_objects::{AuctionResult, RequestContext},
    },
    events::OrderCancelledEvent,
    gateway::CheckoutGateway,
};

impl<B, G> OrderSettlementApi<B, G>
where
    B: SettlementDatabase,
    G: CheckoutGateway,
{
    /// The buyer cancels their own order.
    ///
    /// Only `Pending` and `Confirmed` orders can be cancelled, and only until the order's cancellation deadline. The
    /// wallet-funded portion goes straight back to the wallet. The gateway-funded portion is queued for a refund.
    pub async fn cancel_order(&self, ctx: &RequestContext, order_id: i64) -> Result<Order, SettlementError> {
        let order = self.order_by_id(order_id).await?;
        if order.buyer_id != ctx.buyer_id {
            debug!("🧾️ User #{} tried to cancel order #{order_id}, which is not theirs", ctx.buyer_id);
            return Err(ValidationError::NotOrderOwner(order_id).into());
        }
        if !order.status.is_cancellable() {
            return Err(SettlementError::OrderModificationForbidden {
                from: order.status,
                to: OrderStatusType::Cancelled,
            });
        }
        if ctx.now > order.cancel_until {
            return Err(SettlementError::CancellationWindowClosed(order_id));
        }
        self.cancel(order).await
    }

    /// Moves an order along its lifecycle, e.g. when the seller ships it. Cancelling through here has the same money
    /// effects as [`Self::cancel_order`], without the buyer and deadline checks.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, SettlementError> {
        let order = self.order_by_id(order_id).await?;
        if order.status == new_status {
            return Err(SettlementError::OrderModificationNoOp(order_id));
        }
        if !order.status.can_transition_to(new_status) {
            warn!("🧾️ Order #{order_id} cannot change from {} to {new_status}", order.status);
            return Err(SettlementError::OrderModificationForbidden { from: order.status, to: new_status });
        }
        if new_status == OrderStatusType::Cancelled {
            return self.cancel(order).await;
        }
        let updated = self.db.update_order_status(order_id, order.status, new_status).await?;
        info!("🧾️ Order #{order_id} changed from {} to {new_status}", order.status);
        Ok(updated)
    }

    async fn cancel(&self, order: Order) -> Result<Order, SettlementError> {
        let cancelled = self.db.cancel_order(order.id).await?;
        let order = cancelled.order;
        info!(
            "🧾️ Order #{} was cancelled. {} returned to the wallet of user #{}",
            order.id,
            cancelled.wallet_refund.as_ref().map(|tx| tx.amount).unwrap_or(Money::ZERO),
            order.buyer_id
        );
        if order.gateway_amount.is_positive() {
            let item = NewReconciliationItem {
                session_id: format!("order:{}", order.id),
                client_order_key: Some(order.client_order_key.clone()),
                user_id: Some(order.buyer_id),
                provider_payment_id: Some(order.provider_payment_id.clone()),
                amount: order.gateway_amount,
                reason: ReconciliationReason::BuyerCancelled,
                note: Some(format!("Order #{} was cancelled", order.id)),
            };
            if let Err(e) = self.queue_for_reconciliation(item).await {
                error!(
                    "🧾️ Could not queue the gateway refund for cancelled order #{}. {e}. This payment needs manual \
                     attention.",
                    order.id
                );
            }
        }
        self.call_order_cancelled_hook(&order).await;
        Ok(order)
    }

    /// Closes an auction to further bids and reports the winning bid, if there is one.
    pub async fn close_auction(&self, listing_id: i64) -> Result<AuctionResult, SettlementError> {
        self.db.close_listing(ProductKind::AuctionBid, listing_id).await?;
        let winning_bid = self.db.fetch_top_bid(listing_id).await?;
        match &winning_bid {
            Some(bid) => info!(
                "🔨️ Auction #{listing_id} closed. Order #{} by user #{} wins with {:?}",
                bid.id, bid.buyer_id, bid.bid_amount
            ),
            None => info!("🔨️ Auction #{listing_id} closed without bids"),
        }
        Ok(AuctionResult { listing_id, winning_bid })
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Order, SettlementError> {
        self.db.fetch_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))
    }

    pub async fn order_by_client_key(&self, client_order_key: &str) -> Result<Option<Order>, SettlementError> {
        Ok(self.db.fetch_order_by_client_key(client_order_key).await?)
    }

    pub async fn orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, SettlementError> {
        Ok(self.db.fetch_orders_for_buyer(buyer_id).await?)
    }

    pub async fn orders_for_listing(&self, listing_id: i64) -> Result<Vec<Order>, SettlementError> {
        Ok(self.db.fetch_orders_for_listing(listing_id).await?)
    }

    /// The current top bid on an auction listing.
    pub async fn top_bid(&self, listing_id: i64) -> Result<Option<Order>, SettlementError> {
        Ok(self.db.fetch_top_bid(listing_id).await?)
    }

    async fn call_order_cancelled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_cancelled_producer {
            debug!("📬️ Notifying order cancelled hook subscribers");
            emitter.publish_event(OrderCancelledEvent::new(order.clone())).await;
        }
    }
}
