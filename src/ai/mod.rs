//! LLM-backed task breakdown.
//!
//! The pipeline, leaf first:
//!
//! - [`prompt`]: builds the system + user messages for a task name.
//! - [`client`]: sends them to the completion endpoint and classifies failures.
//! - [`parser`]: turns the free-text answer into [`SubtaskCandidate`]s.
//! - [`sanitize`]: trims, caps and deduplicates candidates.
//! - [`breakdown`]: [`TaskBreakdown`] ties it together and stores the result
//!   as child tasks in one transaction.

pub mod breakdown;
pub mod client;
mod error;
pub mod parser;
pub mod prompt;
pub mod sanitize;
mod types;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Priority, Task};

pub use breakdown::TaskBreakdown;
pub use client::{create_provider, CompletionClient, CompletionProvider, UnconfiguredProvider};
pub use error::{AiError, BreakdownError};
pub use types::{ChatMessage, CompletionOptions, Role};

/// Tag added to every task created by a breakdown.
pub const PROVENANCE_TAG: &str = "ai-generated";

/// A parsed subtask proposal, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskCandidate {
    pub name: String,
    pub priority: Priority,
}

impl SubtaskCandidate {
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// One breakdown invocation.
#[derive(Debug, Clone)]
pub struct DecompositionRequest {
    pub task_id: Uuid,
    pub user_id: String,
    /// Applied to every subtask instead of the inferred priorities.
    pub priority_override: Option<Priority>,
}

/// The task that was broken down and the subtasks created for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub original_task: Task,
    pub subtasks: Vec<Task>,
}
