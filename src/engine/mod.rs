// src/engine/mod.rs

//! Orchestration engine.
//!
//! Ties the pipeline together: validate a workflow, schedule it against the
//! agent pool, then hand the schedule to the executor. Errors that occur
//! before execution starts come back as [`OrchestratorError`]; once
//! execution has started the caller always receives a `WorkflowResult`.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorError};
