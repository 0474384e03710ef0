use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BidSupersededEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderCancelledEvent,
    OrderConfirmedEvent,
    ReconciliationRequiredEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_confirmed_producer: Vec<EventProducer<OrderConfirmedEvent>>,
    pub bid_superseded_producer: Vec<EventProducer<BidSupersededEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub reconciliation_required_producer: Vec<EventProducer<ReconciliationRequiredEvent>>,
}

pub struct EventHandlers {
    pub on_order_confirmed: Option<EventHandler<OrderConfirmedEvent>>,
    pub on_bid_superseded: Option<EventHandler<BidSupersededEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_reconciliation_required: Option<EventHandler<ReconciliationRequiredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_confirmed: hooks.on_order_confirmed.map(|f| EventHandler::new(buffer_size, f)),
            on_bid_superseded: hooks.on_bid_superseded.map(|f| EventHandler::new(buffer_size, f)),
            on_order_cancelled: hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f)),
            on_reconciliation_required: hooks.on_reconciliation_required.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_confirmed {
            result.order_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bid_superseded {
            result.bid_superseded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_reconciliation_required {
            result.reconciliation_required_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns every registered handler onto the runtime.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_confirmed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_bid_superseded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_cancelled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_reconciliation_required {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_confirmed: Option<Handler<OrderConfirmedEvent>>,
    pub on_bid_superseded: Option<Handler<BidSupersededEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_reconciliation_required: Option<Handler<ReconciliationRequiredEvent>>,
}

impl EventHooks {
    pub fn on_order_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderConfirmedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_bid_superseded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidSupersededEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_bid_superseded = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_reconciliation_required<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReconciliationRequiredEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_reconciliation_required = Some(Arc::new(f));
        self
    }
}
