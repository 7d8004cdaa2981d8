use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque task identifier assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Stable identity of the user whose tasks are being managed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Due-date bucket of an active task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Today,
    Backlog,
    Postponed,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Today, Category::Backlog, Category::Postponed];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Today => "today",
            Category::Backlog => "backlog",
            Category::Postponed => "postponed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Category::Today),
            "backlog" => Ok(Category::Backlog),
            "postponed" => Ok(Category::Postponed),
            other => Err(format!(
                "invalid category '{}' (expected today, backlog or postponed)",
                other
            )),
        }
    }
}

/// An ordering partition: one per active category, plus the single
/// completed list shared by all categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Active(Category),
    Completed,
}

impl Partition {
    /// The partition a task currently sorts in
    pub fn of(task: &Task) -> Partition {
        if task.completed {
            Partition::Completed
        } else {
            Partition::Active(task.category)
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Active(c) => c.fmt(f),
            Partition::Completed => f.write_str("completed"),
        }
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("completed") || s.eq_ignore_ascii_case("done") {
            return Ok(Partition::Completed);
        }
        s.parse::<Category>().map(Partition::Active)
    }
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    pub order: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// The parent task blocking this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<TaskId>,
}

impl Task {
    /// Materialize a task from creation fields and the store-assigned id.
    pub fn from_new(id: TaskId, fields: NewTask) -> Self {
        Task {
            id,
            text: fields.text,
            completed: fields.completed,
            timestamp: fields.timestamp,
            order: fields.order,
            description: fields.description,
            category: fields.category,
            due_date: fields.due_date,
            blocked_by: fields.blocked_by,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        patch.description.apply_to(&mut self.description);
        patch.due_date.apply_to(&mut self.due_date);
        patch.blocked_by.apply_to(&mut self.blocked_by);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }
}

/// Fields for a task that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub timestamp: i64,
    pub order: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<TaskId>,
}

/// Three-way update for an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T: Clone> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *slot = None,
            Patch::Set(v) => *slot = Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

/// A partial update to a stored task. Untouched fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub order: Option<f64>,
    pub category: Option<Category>,
    pub description: Patch<String>,
    pub due_date: Patch<NaiveDate>,
    pub blocked_by: Patch<TaskId>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.completed.is_none()
            && self.order.is_none()
            && self.category.is_none()
            && self.description.is_keep()
            && self.due_date.is_keep()
            && self.blocked_by.is_keep()
    }

    /// Move to `category` at `order`
    pub fn placement(category: Category, order: f64) -> Self {
        TaskPatch {
            category: Some(category),
            order: Some(order),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            id: TaskId::new("t1"),
            text: "Buy milk #errand".into(),
            completed: false,
            timestamp: 1_700_000_000_000,
            order: 0.0,
            description: None,
            category: Category::Backlog,
            due_date: None,
            blocked_by: None,
        }
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut task = sample();
        task.due_date = NaiveDate::from_ymd_opt(2025, 5, 14);
        task.blocked_by = Some(TaskId::new("t0"));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["dueDate"], "2025-05-14");
        assert_eq!(json["blockedBy"], "t0");
        assert_eq!(json["category"], "backlog");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn deserializes_minimal_document() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t9","text":"x","timestamp":5,"order":-1.5,"category":"today"}"#,
        )
        .unwrap();
        assert!(!task.completed);
        assert_eq!(task.order, -1.5);
        assert_eq!(task.due_date, None);
        assert_eq!(task.blocked_by, None);
    }

    #[test]
    fn apply_patch_sets_and_clears() {
        let mut task = sample();
        task.blocked_by = Some(TaskId::new("t0"));
        let patch = TaskPatch {
            text: Some("Buy oat milk".into()),
            description: Patch::Set("2 litres".into()),
            blocked_by: Patch::Clear,
            ..Default::default()
        };
        task.apply(&patch);
        assert_eq!(task.text, "Buy oat milk");
        assert_eq!(task.description.as_deref(), Some("2 litres"));
        assert_eq!(task.blocked_by, None);
        assert_eq!(task.category, Category::Backlog);
    }

    #[test]
    fn empty_patch_is_noop() {
        let mut task = sample();
        let before = task.clone();
        assert!(TaskPatch::default().is_empty());
        task.apply(&TaskPatch::default());
        assert_eq!(task, before);
    }

    #[test]
    fn parse_partition() {
        assert_eq!("today".parse::<Partition>(), Ok(Partition::Active(Category::Today)));
        assert_eq!("Completed".parse::<Partition>(), Ok(Partition::Completed));
        assert!("someday".parse::<Partition>().is_err());
    }
}
