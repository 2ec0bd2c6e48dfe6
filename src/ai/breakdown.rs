//! Breaking a stored task down into child tasks.

use std::sync::Arc;

use super::client::CompletionProvider;
use super::error::{AiError, BreakdownError};
use super::parser::parse_subtasks;
use super::prompt::build_prompt;
use super::sanitize::sanitize;
use super::types::CompletionOptions;
use super::{DecompositionRequest, DecompositionResult, SubtaskCandidate, PROVENANCE_TAG};
use crate::db::TaskStore;
use crate::models::{NewTask, Priority, Task};

/// Runs the breakdown pipeline against a task store and a completion provider.
///
/// Holds no per-call state; one instance serves concurrent requests.
#[derive(Clone)]
pub struct TaskBreakdown {
    store: Arc<dyn TaskStore>,
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl TaskBreakdown {
    pub fn new(store: Arc<dyn TaskStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            store,
            provider,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Break the task `request.task_id` down into subtasks and store them.
    ///
    /// An empty model answer is a normal outcome: the result then has no
    /// subtasks and nothing is written. Otherwise all subtasks are created in
    /// one transaction. The parent task is never modified.
    pub async fn decompose(
        &self,
        request: DecompositionRequest,
    ) -> Result<DecompositionResult, BreakdownError> {
        let parent = self
            .store
            .find_task(request.task_id, &request.user_id)
            .map_err(BreakdownError::Persistence)?
            .ok_or(BreakdownError::NotFound)?;

        let candidates = self.generate_candidates(&parent.name).await?;
        tracing::debug!(task_id = %parent.id, count = candidates.len(), "Parsed subtask candidates");

        if candidates.is_empty() {
            tracing::info!(task_id = %parent.id, "Breakdown produced no subtasks");
            return Ok(DecompositionResult {
                original_task: parent,
                subtasks: Vec::new(),
            });
        }

        let records = plan_subtasks(&parent, &candidates, request.priority_override);

        tracing::debug!(task_id = %parent.id, count = records.len(), "Committing subtasks");
        let subtasks = self.store.create_tasks(records).map_err(|e| {
            tracing::error!(task_id = %parent.id, "Failed to save subtasks: {:#}", e);
            BreakdownError::Persistence(e)
        })?;

        tracing::info!(
            task_id = %parent.id,
            count = subtasks.len(),
            "Task broken down into subtasks"
        );

        Ok(DecompositionResult {
            original_task: parent,
            subtasks,
        })
    }

    /// Prompt, call, parse and sanitize, without touching storage.
    ///
    /// A malformed completion response counts as "no subtasks".
    pub async fn generate_candidates(
        &self,
        task_name: &str,
    ) -> Result<Vec<SubtaskCandidate>, BreakdownError> {
        let messages = build_prompt(task_name)?;
        tracing::debug!("Prompt built");

        let raw = match self.provider.complete(&messages, self.options).await {
            Ok(raw) => raw,
            Err(AiError::MalformedResponse(reason)) => {
                tracing::warn!("Treating malformed completion response as empty: {}", reason);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(chars = raw.chars().count(), "Completion received");

        Ok(sanitize(parse_subtasks(&raw)))
    }
}

/// Child task records for `candidates` under `parent`.
///
/// Children take the parent's owner, category and creation time, and its
/// tags plus [`PROVENANCE_TAG`]. A priority override applies to all of them.
pub fn plan_subtasks(
    parent: &Task,
    candidates: &[SubtaskCandidate],
    priority_override: Option<Priority>,
) -> Vec<NewTask> {
    let tags = inherited_tags(&parent.tags);

    candidates
        .iter()
        .map(|candidate| NewTask {
            user_id: parent.user_id.clone(),
            name: candidate.name.clone(),
            priority: priority_override.unwrap_or(candidate.priority),
            category: parent.category.clone(),
            tags: tags.clone(),
            parent_task_id: Some(parent.id),
            created_at: parent.created_at,
        })
        .collect()
}

/// Parent tags followed by the provenance marker, without duplicates.
fn inherited_tags(parent_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(parent_tags.len() + 1);
    for tag in parent_tags
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(PROVENANCE_TAG))
    {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
