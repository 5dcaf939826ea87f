#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event_log;
pub mod events;
pub mod experiment;
pub mod job;
pub mod monitor;
pub mod node;
pub mod policies;
pub mod policy;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod workload;
