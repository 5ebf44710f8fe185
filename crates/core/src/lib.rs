//! FinanceBot Core
//!
//! Domain logic shared by the voice agent and the HTTP service: the loan
//! calculator and its MCP tool server, the LLM client, per-turn latency
//! correlation and its CSV log, LiveKit token issuing, and the seam to the
//! external voice runtime.

pub mod advisor;
pub mod llm_client;
pub mod loan;
pub mod metrics;
pub mod metrics_log;
pub mod session;
pub mod token;
