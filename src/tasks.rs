//! Task board of the repository page.

use serde::{Deserialize, Serialize};

use crate::editor::InstanceIdGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => anyhow::bail!("Invalid priority '{}'. Valid values: low, medium, high", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssigneeKind {
    Contributor,
    Group,
    Public,
    #[default]
    Unassigned,
}

impl std::fmt::Display for AssigneeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssigneeKind::Contributor => write!(f, "contributor"),
            AssigneeKind::Group => write!(f, "group"),
            AssigneeKind::Public => write!(f, "public"),
            AssigneeKind::Unassigned => write!(f, "unassigned"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assignee {
    #[serde(rename = "type")]
    pub kind: AssigneeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Assignee {
    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn new(kind: AssigneeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: None,
            name: Some(name.into()),
        }
    }

    /// `Unassigned`, or `"{kind} - {name}"`.
    pub fn label(&self) -> String {
        match self.kind {
            AssigneeKind::Unassigned => "Unassigned".to_string(),
            kind => format!("{} - {}", kind, self.name.as_deref().unwrap_or_default()),
        }
    }
}

/// A task before it has been filed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_to: Assignee,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(flatten)]
    pub draft: TaskDraft,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    ids: InstanceIdGenerator,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, draft: TaskDraft) -> &Task {
        self.create_at(draft, chrono::Utc::now().timestamp_millis())
    }

    pub fn create_at(&mut self, draft: TaskDraft, now_ms: i64) -> &Task {
        let id = self.ids.next_at(now_ms);
        self.tasks.push(Task {
            id,
            draft,
            created_at: now_ms,
        });
        tracing::debug!(tasks = self.tasks.len(), "Created task");
        &self.tasks[self.tasks.len() - 1]
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.draft.status == status)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.into(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn test_create_assigns_unique_ids_in_same_millisecond() {
        let mut board = TaskBoard::new();
        let a = board.create_at(draft("wire sensor"), 1_000).id.clone();
        let b = board.create_at(draft("flash esp32"), 1_000).id.clone();
        assert_ne!(a, b);
        assert_eq!(board.tasks().len(), 2);
        assert_eq!(board.tasks()[0].draft.title, "wire sensor");
    }

    #[test]
    fn test_assignment_label() {
        assert_eq!(Assignee::unassigned().label(), "Unassigned");
        assert_eq!(
            Assignee::new(AssigneeKind::Group, "hardware").label(),
            "group - hardware"
        );
    }

    #[test]
    fn test_task_wire_shape() {
        let mut board = TaskBoard::new();
        let mut d = draft("Calibrate camera");
        d.status = TaskStatus::InProgress;
        d.priority = TaskPriority::High;
        let task = board.create_at(d, 42);
        let json = serde_json::to_value(task).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["assignedTo"]["type"], "unassigned");
        assert_eq!(json["createdAt"], 42);
    }

    #[test]
    fn test_filter_by_status() {
        let mut board = TaskBoard::new();
        board.create_at(draft("a"), 1);
        let mut done = draft("b");
        done.status = TaskStatus::Completed;
        board.create_at(done, 2);
        assert_eq!(board.with_status(TaskStatus::Completed).count(), 1);
        assert_eq!(board.with_status(TaskStatus::Todo).count(), 1);
    }
}
