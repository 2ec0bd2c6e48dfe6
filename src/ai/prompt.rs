//! Prompt for the breakdown request.

use super::types::ChatMessage;
use super::AiError;

/// Longest subtask name the model is asked to produce. The sanitizer enforces it.
pub const MAX_SUBTASK_NAME_CHARS: usize = 100;

const SYSTEM_PROMPT: &str = "You are an assistant that breaks a task down into logical, actionable subtasks. \
Return between 2 and 7 clear, specific subtasks that together accomplish the main task. \
Put each subtask on its own line in the format: SUBTASK_NAME | PRIORITY \
where PRIORITY is one of: high, medium, low. \
Choose the priority from how important and urgent the subtask is for finishing the main task. \
Each subtask must be short (at most 100 characters) and start with an action verb. \
Do not number the lines and do not add any explanations, headings or other text. \
Example line: Gather requirements | high";

/// Build the two-message prompt for `task_name`.
///
/// Deterministic: the same name always yields the same messages. Blank names
/// are rejected here so no request is ever sent for them.
pub fn build_prompt(task_name: &str) -> Result<Vec<ChatMessage>, AiError> {
    let name = task_name.trim();
    if name.is_empty() {
        return Err(AiError::InvalidInput(
            "Task name cannot be empty".to_string(),
        ));
    }

    Ok(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Break this task down into subtasks with priorities: {}",
            name
        )),
    ])
}
