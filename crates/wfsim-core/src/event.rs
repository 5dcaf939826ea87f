//! Simulation events and component identifiers.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

/// Identifier of a simulation component, assigned sequentially on registration.
pub type Id = u32;

/// Identifier of an event, unique within a simulation and increasing in emission order.
pub type EventId = u64;

/// Payload of an event.
///
/// Implemented automatically for every `Serialize + 'static` type, so that any serializable struct
/// can be sent between components and dumped to the log.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// An event scheduled for delivery to a component.
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Delivery time.
    pub time: f64,
    /// Component that emitted the event.
    pub src: Id,
    /// Component the event is delivered to.
    pub dst: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// Reversed so that BinaryHeap pops the earliest event first, with the lowest id among equal times.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
