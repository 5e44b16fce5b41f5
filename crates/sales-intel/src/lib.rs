//! Account prioritization: score customers, allocate a fixed budget of sales actions, summarize
//! the allocation, and brief account executives before their calls.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
