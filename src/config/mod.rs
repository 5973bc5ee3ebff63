// src/config/mod.rs

//! Workflow file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workflow file from disk and build a `Workflow` (`loader.rs`).
//! - Check file-level invariants like retry bounds (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{build_workflow, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ExecutorSection, RawWorkflowFile, RetrySection, TaskConfig, WorkflowFile, WorkflowSection,
};
