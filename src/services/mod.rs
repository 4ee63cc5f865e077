//! Core services: decision making, snapshot bookkeeping and execution

pub mod context_builder;
pub mod coordinator;
pub mod debounce;
pub mod decision;
pub mod format;
pub mod notification;
pub mod orchestrator;
pub mod pipeline;
pub mod rate_limiter;
pub mod signals;
