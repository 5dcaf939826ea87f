//! Logging with simulation time and component name.
//!
//! Every message is written as `[time LEVEL component] message` with the component name as the log
//! target, so output can be filtered per component (`RUST_LOG=scheduler=debug`). Level labels are
//! colored when stderr is a terminal.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::Level::Trace;
use log::{error, log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

/// Colors the label if stderr is a terminal.
pub fn paint(label: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        label.color(color)
    } else {
        label.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $($arg:tt)+) => {
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::paint($label, $crate::colored::Color::$color),
            $ctx.name(),
            format_args!($($arg)+)
        )
    };
}

/// Logs a message at the info level.
///
/// # Examples
///
/// ```rust
/// use wfsim_core::{log_info, Simulation, SimulationContext};
///
/// struct Worker {
///     ctx: SimulationContext,
/// }
///
/// let mut sim = Simulation::new();
/// let worker = Worker { ctx: sim.create_context("worker") };
/// log_info!(worker.ctx, "started with {} slots", 4);
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(info, "INFO", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(warn, "WARN", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_at!(error, "ERROR", Red, $ctx, $($arg)+));
}

fn describe(event: &Event) -> serde_json::Value {
    json!({
        "id": event.id,
        "type": type_name(&event.data).unwrap_or("unknown"),
        "data": event.data,
        "src": event.src,
        "dst": event.dst,
    })
}

fn kernel_error(time: f64, what: &str, event: &Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {}: {}",
        time,
        paint("ERROR", Color::Red),
        what,
        describe(event)
    );
}

pub(crate) fn log_delivered_event(event: &Event, src: &str, dst: &str) {
    if log_enabled!(Trace) {
        trace!(
            target: dst,
            "[{:.3} {} {}] {} from {}",
            event.time,
            paint("EVENT", Color::BrightBlack),
            dst,
            describe(event),
            src
        );
    }
}

/// Reports an event whose payload type the destination does not handle.
///
/// Called by [`cast!`](crate::cast!) when no arm matches.
pub fn log_unhandled_event(event: Event) {
    kernel_error(event.time, "unhandled event", &event);
}

pub(crate) fn log_undelivered_event(event: &Event) {
    kernel_error(event.time, "no handler for event", event);
}

pub(crate) fn log_rejected_event(event: &Event, delay: f64) {
    kernel_error(event.time, &format!("event with negative delay {}", delay), event);
}
