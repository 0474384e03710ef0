use log::*;

use crate::{
    db::traits::{InsertReconciliationResult, RefundClaim, SettlementDatabase},
    db_types::{NewReconciliationItem, ReconciliationItem, ReconciliationStatus},
    engine_api::{errors::SettlementError, settlement_api::OrderSettlementApi},
    events::ReconciliationRequiredEvent,
    gateway::CheckoutGateway,
    helpers::gateway_refund_key,
};

impl<B, G> OrderSettlementApi<B, G>
where
    B: SettlementDatabase,
    G: CheckoutGateway,
{
    /// Queues a captured payment that no order accounts for.
    ///
    /// Queueing the same session and reason again returns the existing item, so retried confirmations never refund
    /// twice. Subscribers are only notified the first time. If auto-refunds are enabled, open items are refunded
    /// straight away.
    pub(crate) async fn queue_for_reconciliation(
        &self,
        item: NewReconciliationItem,
    ) -> Result<ReconciliationItem, SettlementError> {
        let item = match self.db.insert_reconciliation_item(item).await? {
            InsertReconciliationResult::Inserted(item) => {
                warn!(
                    "🧾️ {} for session {} was queued for reconciliation ({}). Item #{}",
                    item.amount, item.session_id, item.reason, item.id
                );
                self.call_reconciliation_required_hook(&item).await;
                item
            },
            InsertReconciliationResult::AlreadyExists(item) => {
                debug!("🧾️ Session {} is already queued for reconciliation as item #{}", item.session_id, item.id);
                item
            },
        };
        if self.config.auto_refund && item.status == ReconciliationStatus::Open {
            return Ok(self.attempt_refund(item).await);
        }
        Ok(item)
    }

    /// Tries to refund an open item through the gateway. Failures are recorded against the item, which stays open.
    ///
    /// The item is claimed first, so concurrent callers (the redirect racing the webhook, or a retry) never refund the
    /// same payment twice. If an order turns out to exist for the payment, the item is resolved instead.
    async fn attempt_refund(&self, item: ReconciliationItem) -> ReconciliationItem {
        let item = match self.db.claim_reconciliation_refund(item.id).await {
            Ok(RefundClaim::Claimed(item)) => item,
            Ok(RefundClaim::Settled { item, order }) => {
                warn!(
                    "🧾️ Order #{} accounts for the payment in reconciliation item #{}. Resolved without a refund.",
                    order.id, item.id
                );
                return item;
            },
            Ok(RefundClaim::Unavailable(item)) => {
                debug!("🧾️ Reconciliation item #{} is {}. Leaving it alone.", item.id, item.status);
                return item;
            },
            Err(e) => {
                error!("🧾️ Could not claim reconciliation item #{} for a refund. {e}", item.id);
                return item;
            },
        };
        let idempotency_key = gateway_refund_key(item.id);
        let result = match &item.provider_payment_id {
            Some(_) if !item.amount.is_positive() => Err(format!("There is nothing to refund ({})", item.amount)),
            Some(payment_id) => {
                self.gateway.refund(payment_id, item.amount, &idempotency_key).await.map_err(|e| e.to_string())
            },
            None => Err("The gateway did not report a payment id, so the payment cannot be refunded".to_string()),
        };
        let updated = match result {
            Ok(receipt) => {
                info!(
                    "💳️ Refunded {} for reconciliation item #{} (refund {})",
                    receipt.amount, item.id, receipt.refund_id
                );
                self.db.mark_reconciliation_refunded(item.id, &receipt.refund_id).await
            },
            Err(reason) => {
                warn!("💳️ Could not refund reconciliation item #{}. {reason}", item.id);
                self.db.record_reconciliation_failure(item.id, &reason).await
            },
        };
        match updated {
            Ok(updated) => updated,
            Err(e) => {
                // TODO: sweep items stuck in Refunding back to Open; the gateway key makes a second attempt safe
                error!("🧾️ Could not update reconciliation item #{}. It stays {}. {e}", item.id, item.status);
                item
            },
        }
    }

    /// Retries the refund of every open item, whether or not auto-refunds are enabled. Returns the items as they
    /// stand afterwards.
    pub async fn retry_open_reconciliations(&self) -> Result<Vec<ReconciliationItem>, SettlementError> {
        let items = self.db.fetch_open_reconciliation_items().await?;
        info!("🧾️ Retrying {} open reconciliation items", items.len());
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            result.push(self.attempt_refund(item).await);
        }
        Ok(result)
    }

    /// Closes an item by hand, e.g. after the buyer was refunded outside the gateway.
    pub async fn resolve_reconciliation(&self, id: i64, note: &str) -> Result<ReconciliationItem, SettlementError> {
        let item = self.db.resolve_reconciliation_item(id, note).await?;
        if item.status == ReconciliationStatus::Resolved {
            info!("🧾️ Reconciliation item #{id} was resolved. {note}");
        } else {
            warn!("🧾️ Reconciliation item #{id} is {} and could not be resolved", item.status);
        }
        Ok(item)
    }

    pub async fn fetch_open_reconciliations(&self) -> Result<Vec<ReconciliationItem>, SettlementError> {
        Ok(self.db.fetch_open_reconciliation_items().await?)
    }

    pub async fn fetch_reconciliation(&self, id: i64) -> Result<ReconciliationItem, SettlementError> {
        self.db.fetch_reconciliation_item(id).await?.ok_or(SettlementError::ReconciliationItemNotFound(id))
    }

    async fn call_reconciliation_required_hook(&self, item: &ReconciliationItem) {
        for emitter in &self.producers.reconciliation_required_producer {
            debug!("📬️ Notifying reconciliation required hook subscribers");
            emitter.publish_event(ReconciliationRequiredEvent::new(item.clone())).await;
        }
    }
}
