//! Simulation setup and stepping.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::SimulationContext;
use crate::event::Id;
use crate::handler::EventHandler;
use crate::log::{log_delivered_event, log_undelivered_event};
use crate::queue::EventQueue;

struct Component {
    name: String,
    handler: Option<Rc<RefCell<dyn EventHandler>>>,
}

/// Owner of the clock, the event queue and the registered components.
///
/// Components are addressed by [`Id`], assigned in registration order. A simulation is confined to
/// the thread that created it; independent simulations may run on different threads.
pub struct Simulation {
    queue: Rc<RefCell<EventQueue>>,
    components: Vec<Component>,
    ids: HashMap<String, Id>,
}

impl Simulation {
    /// Creates an empty simulation at time zero.
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(EventQueue::new())),
            components: Vec::new(),
            ids: HashMap::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.components.len() as Id;
        self.components.push(Component {
            name: name.to_owned(),
            handler: None,
        });
        self.ids.insert(name.to_owned(), id);
        id
    }

    /// Creates a context for the component with the given name, registering the name if needed.
    pub fn create_context<S: AsRef<str>>(&mut self, name: S) -> SimulationContext {
        let id = self.register(name.as_ref());
        SimulationContext::new(id, name.as_ref().to_owned(), self.queue.clone())
    }

    /// Sets the handler receiving events of the named component and returns its id.
    pub fn add_handler<S: AsRef<str>>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id {
        let id = self.register(name.as_ref());
        self.components[id as usize].handler = Some(handler);
        id
    }

    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.ids.get(name).copied()
    }

    fn name(&self, id: Id) -> &str {
        self.components.get(id as usize).map_or("unknown", |c| c.name.as_str())
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.queue.borrow().time()
    }

    /// Number of events emitted so far, cancelled ones included.
    pub fn event_count(&self) -> u64 {
        self.queue.borrow().created()
    }

    /// Delivers the earliest pending event. Returns `false` if there was none.
    pub fn step(&mut self) -> bool {
        let next = self.queue.borrow_mut().pop();
        let event = match next {
            Some(event) => event,
            None => return false,
        };
        log_delivered_event(&event, self.name(event.src), self.name(event.dst));
        let handler = self
            .components
            .get(event.dst as usize)
            .and_then(|c| c.handler.clone());
        match handler {
            Some(handler) => handler.borrow_mut().on(event),
            None => log_undelivered_event(&event),
        }
        true
    }

    /// Delivers events until none are left.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers events while `pred` holds.
    ///
    /// Returns `true` if the predicate stopped the loop and `false` if the events ran out.
    pub fn step_while<F: FnMut() -> bool>(&mut self, mut pred: F) -> bool {
        while pred() {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Delivers every event due within `duration` seconds from now.
    ///
    /// Returns whether later events are still pending.
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end = self.time() + duration;
        loop {
            let next = self.queue.borrow_mut().next_time();
            match next {
                Some(time) if time <= end => {
                    self.step();
                }
                Some(_) => return true,
                None => return false,
            }
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
