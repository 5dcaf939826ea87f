//! Policy implementations.

pub mod elop;
pub mod heft;
pub mod lottery;
pub mod round_robin;
pub mod simple;
