// src/types.rs

//! Small shared aliases used across the crate.

use std::future::Future;
use std::pin::Pin;

/// Identifier of a task inside a workflow (e.g. `"build"`).
pub type TaskId = String;

/// Identifier of an agent registered with an [`AgentPool`](crate::pool::AgentPool).
pub type AgentId = String;

/// A capability tag such as `"rust"` or `"review"`.
pub type Capability = String;

/// Boxed, sendable future used at the trait seams that must stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
