//! Pending events ordered by delivery time.

use std::collections::{BinaryHeap, HashSet};

use crate::event::{Event, EventData, EventId, Id};
use crate::log::log_rejected_event;

/// Delays down to `-EPSILON` are rounding noise and are clamped to zero.
pub const EPSILON: f64 = 1e-12;

pub(crate) struct EventQueue {
    clock: f64,
    pending: BinaryHeap<Event>,
    cancelled: HashSet<EventId>,
    next_id: EventId,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            clock: 0.,
            pending: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn push<T: EventData>(&mut self, data: T, src: Id, dst: Id, delay: f64) -> EventId {
        let event = Event {
            id: self.next_id,
            time: self.clock + delay.max(0.),
            src,
            dst,
            data: Box::new(data),
        };
        if delay < -EPSILON {
            log_rejected_event(&event, delay);
            panic!("can't emit an event {} s in the past", -delay);
        }
        self.next_id += 1;
        self.pending.push(event);
        self.next_id - 1
    }

    fn drop_cancelled(&mut self) {
        while let Some(id) = self.pending.peek().map(|e| e.id) {
            if !self.cancelled.remove(&id) {
                break;
            }
            self.pending.pop();
        }
    }

    /// Removes the earliest event and moves the clock to its time.
    pub fn pop(&mut self) -> Option<Event> {
        self.drop_cancelled();
        let event = self.pending.pop()?;
        self.clock = event.time;
        Some(event)
    }

    pub fn next_time(&mut self) -> Option<f64> {
        self.drop_cancelled();
        self.pending.peek().map(|e| e.time)
    }

    pub fn cancel_where<F: Fn(&Event) -> bool>(&mut self, pred: F) {
        let ids = self.pending.iter().filter(|e| pred(e)).map(|e| e.id).collect::<Vec<_>>();
        self.cancelled.extend(ids);
    }

    pub fn created(&self) -> u64 {
        self.next_id
    }
}
