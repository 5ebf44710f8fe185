//! FinanceBot Agent
//!
//! Bootstraps a voice session against the external voice bridge and runs the
//! advisor's conversation loop. The `agent` binary is a thin wrapper around
//! this library.

pub mod bridge;
pub mod config;
pub mod cycle;
pub mod protocol;
pub mod session;
pub mod tools;
