//! Event handling.

use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    fn on(&mut self, event: Event);
}

/// Dispatches an event on the type of its payload.
///
/// Each arm names a payload struct and destructures it. Arms need not be exhaustive: a payload that
/// matches none of them is logged as unhandled at `ERROR` level.
///
/// # Examples
///
/// ```rust
/// use serde::Serialize;
/// use wfsim_core::{cast, Event, EventHandler};
///
/// #[derive(Clone, Serialize)]
/// pub struct Arrived {
///     count: u32,
/// }
///
/// #[derive(Clone, Serialize)]
/// pub struct Left {}
///
/// pub struct Counter {
///     inside: u32,
/// }
///
/// impl EventHandler for Counter {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             Arrived { count } => {
///                 self.inside += count;
///             }
///             Left {} => {
///                 self.inside -= 1;
///             }
///         })
///     }
/// }
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
