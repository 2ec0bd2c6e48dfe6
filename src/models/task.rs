use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A user-authored unit of work.
///
/// Tasks form a shallow tree through `parent_task_id`: a breakdown attaches its
/// generated subtasks to the task it was run on. The parent, when present,
/// always belongs to the same user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    /// Owner of the task. Identity is supplied by the caller, not managed here.
    pub user_id: String,
    pub name: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Task this one was broken out of, if any.
    pub parent_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How urgent a task is.
///
/// Serialized lowercase. Deserialization accepts any casing since clients
/// routinely send `"High"` or `"HIGH"`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Priority::from_str(&raw).ok_or_else(|| {
            serde::de::Error::unknown_variant(&raw, &["low", "medium", "high"])
        })
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a task through the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskInput {
    pub name: String,
    #[serde(default)]
    pub is_completed: Option<bool>,
    /// Defaults to `Medium`.
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Must reference a task owned by the same user.
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    /// Explicit creation time. Defaults to now.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for updating a task. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
}

/// A fully resolved task row, ready to insert.
///
/// Unlike [`CreateTaskInput`] nothing is defaulted by the store: the caller
/// decides owner, priority and timestamp. Used for batch inserts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub user_id: String,
    pub name: String,
    pub priority: Priority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub parent_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!(Priority::from_str("HIGH"), Some(Priority::High));
        assert_eq!(Priority::from_str(" Low "), Some(Priority::Low));
        assert_eq!(Priority::from_str("urgent"), None);
    }

    #[test]
    fn priority_deserializes_mixed_case_and_serializes_lowercase() {
        let p: Priority = serde_json::from_str("\"High\"").unwrap();
        assert_eq!(p, Priority::High);
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"high\"");
        assert!(serde_json::from_str::<Priority>("\"asap\"").is_err());
    }

    #[test]
    fn create_input_fields_are_optional_except_name() {
        let input: CreateTaskInput = serde_json::from_str(r#"{"name":"Write report"}"#).unwrap();
        assert_eq!(input.name, "Write report");
        assert!(input.priority.is_none());
        assert!(input.tags.is_none());
    }
}
