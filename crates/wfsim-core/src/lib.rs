#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod context;
pub mod event;
pub mod handler;
pub mod log;
mod queue;
pub mod simulation;

pub use colored;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId, Id};
pub use handler::EventHandler;
pub use queue::EPSILON;
pub use simulation::Simulation;
