//! Event Bus: a one-way publication channel from the execution simulator to
//! the quoting engine. Grounded in the bounded `ArrayQueue<Fill>`
//! (`execution::simulated`), widened to carry both fill and cancel events
//! so neither side owns the other.

use super::types::CancelReason;
use crate::types::{OrderId, Side};
use crossbeam::queue::ArrayQueue;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub enum Event {
    Fill {
        order_id: OrderId,
        side: Side,
        fill_qty: Decimal,
        remaining_qty: Decimal,
        price: Decimal,
        fee: Decimal,
        timestamp: Instant,
    },
    Cancel {
        order_id: OrderId,
        side: Side,
        reason: CancelReason,
        timestamp: Instant,
    },
}

/// A cloneable handle onto a shared bounded queue. Cloning yields another
/// handle to the *same* underlying queue (shared `Arc`), not a fresh one;
/// publishers and the subscriber share one channel without either owning the
/// other.
#[derive(Clone)]
pub struct EventBus {
    queue: Arc<ArrayQueue<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self { queue: Arc::new(ArrayQueue::new(capacity)) }
    }

    pub fn publish(&self, event: Event) {
        if self.queue.push(event).is_err() {
            warn!("event bus full, dropping event");
        }
    }

    /// Pops every event currently queued into a local buffer, then returns
    /// it. Collecting before dispatch means a handler that submits new
    /// orders cannot re-enter the simulator mid-drain.
    pub fn drain(&self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.queue.pop() {
            events.push(event);
        }
        events
    }
}
