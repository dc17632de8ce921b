use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_date_serde;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort weight: High > Medium > Low.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Repeat {
    #[default]
    Never,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repeat {
    #[must_use]
    pub fn is_recurring(self) -> bool {
        self != Repeat::Never
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date_serde::option"
    )]
    pub due_date: Option<DateTime<Utc>>,

    pub priority: Priority,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub repeat: Repeat,

    #[serde(default)]
    pub completed: bool,

    #[serde(with = "iso_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub sort_order: i64,
}

/// Caller-supplied fields of a task about to be created. Identity,
/// creation time and manual position are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub labels: Vec<String>,
    pub repeat: Repeat,
    pub completed: bool,
}

/// Partial update merged into an existing task. `None` leaves a field as
/// is; the nested options on `description` and `due_date` distinguish
/// "clear" (`Some(None)`) from "keep" (`None`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub labels: Option<Vec<String>>,
    pub repeat: Option<Repeat>,
    pub completed: Option<bool>,
    pub sort_order: Option<i64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl TaskPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch into `task`. A title that trims to nothing is
    /// ignored so the stored title never becomes blank. Returns `false`
    /// when such a title was dropped.
    pub(crate) fn apply(self, task: &mut Task) -> bool {
        let mut title_ok = true;
        if let Some(title) = self.title {
            match normalize_title(&title) {
                Some(title) => task.title = title,
                None => title_ok = false,
            }
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date.map(stored_precision);
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(labels) = self.labels {
            task.labels = normalize_labels(labels);
        }
        if let Some(repeat) = self.repeat {
            task.repeat = repeat;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(sort_order) = self.sort_order {
            task.sort_order = sort_order;
        }
        title_ok
    }
}

impl Task {
    /// Builds a task from a draft whose title has already been validated.
    pub(crate) fn from_draft(
        draft: TaskDraft,
        title: String,
        now: DateTime<Utc>,
        sort_order: i64,
    ) -> Self {
        Self {
            id: new_task_id(),
            title,
            description: draft.description,
            due_date: draft.due_date.map(stored_precision),
            priority: draft.priority,
            labels: normalize_labels(draft.labels),
            repeat: draft.repeat,
            completed: draft.completed,
            created_at: now,
            sort_order,
        }
    }

    /// Whether completing this task spawns a follow-up occurrence.
    #[must_use]
    pub fn recurs(&self) -> bool {
        self.repeat.is_recurring() && self.due_date.is_some()
    }

    /// Next occurrence of a recurring task: same fields, fresh identity,
    /// not completed, due at `next_due`.
    #[must_use]
    pub fn next_occurrence(&self, next_due: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_task_id(),
            completed: false,
            due_date: Some(next_due),
            created_at: now,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Timestamps are stored with millisecond precision; anything finer is
/// dropped on the way in so memory and storage agree.
fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(3)
}

pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed title, or `None` when nothing is left.
#[must_use]
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Labels behave as a set: trimmed, blanks dropped, first occurrence wins.
#[must_use]
pub fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() || out.iter().any(|l| l == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
