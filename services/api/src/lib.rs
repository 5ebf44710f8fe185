//! FinanceBot API Library Crate
//!
//! Application state, configuration, handlers and routing for the HTTP
//! service that issues room tokens and exposes the per-call metrics log. The
//! `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
