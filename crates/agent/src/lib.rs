//! The agent decision loop.
//!
//! One `process()` call drives a full model/tool round-trip cycle:
//! ask the model, execute whatever tools it requests, feed results back,
//! repeat until the model answers in plain text or the turn ceiling hits.

pub mod loop_runner;

pub use loop_runner::AgentLoop;
