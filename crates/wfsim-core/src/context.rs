//! Component-side access to the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventData, EventId, Id};
use crate::queue::EventQueue;

/// Handle through which a component reads the clock and emits events.
pub struct SimulationContext {
    id: Id,
    name: String,
    queue: Rc<RefCell<EventQueue>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: String, queue: Rc<RefCell<EventQueue>>) -> Self {
        Self { id, name, queue }
    }

    /// Identifier of the component owning this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of the component owning this context, also used as its log target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.queue.borrow().time()
    }

    /// Emits an event to component `dst`, delivered `delay` seconds from now.
    ///
    /// Panics if `delay` is negative.
    pub fn emit<T: EventData>(&mut self, data: T, dst: Id, delay: f64) -> EventId {
        self.queue.borrow_mut().push(data, self.id, dst, delay)
    }

    /// Emits an event to the owning component itself.
    pub fn emit_self<T: EventData>(&mut self, data: T, delay: f64) -> EventId {
        self.queue.borrow_mut().push(data, self.id, self.id, delay)
    }

    /// Cancels every pending event sent by or to the owning component.
    pub fn cancel_own_events(&mut self) {
        let id = self.id;
        self.queue
            .borrow_mut()
            .cancel_where(|event| event.src == id || event.dst == id);
    }
}
