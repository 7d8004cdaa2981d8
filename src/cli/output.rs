use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::model::notification::Notification;
use crate::model::task::{Category, Task, TaskId};
use crate::ops::hierarchy::Row;
use crate::ops::tags::extract_tags;
use crate::util::unicode::truncate_to_width;

/// Task text is cut to this many cells in list views
const TEXT_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskJson {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub category: Category,
    pub order: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct SectionJson {
    pub name: String,
    pub tasks: Vec<TaskJson>,
}

/// Result of a write command
#[derive(Serialize)]
pub struct MutationJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
    pub notifications: Vec<Notification>,
}

#[derive(Serialize)]
pub struct TagJson {
    pub tag: String,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.to_string(),
        text: task.text.clone(),
        completed: task.completed,
        category: task.category,
        order: task.order,
        due_date: task.due_date,
        description: task.description.clone(),
        blocked_by: task.blocked_by.as_ref().map(|id| id.to_string()),
        tags: extract_tags(&task.text),
        children: Vec::new(),
    }
}

pub fn row_to_json(row: &Row<'_>) -> TaskJson {
    let mut json = task_to_json(row.task());
    json.children = row.children().iter().map(|c| task_to_json(c)).collect();
    json
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// One-line summary: `[ ] t3   Buy milk  (due 2025-05-10)`
pub fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {:<4} {}",
        mark,
        task.id.as_str(),
        truncate_to_width(&task.text, TEXT_WIDTH)
    );
    if let Some(due) = task.due_date {
        if !task.completed && due < today {
            line.push_str(&format!("  (overdue {})", due));
        } else {
            line.push_str(&format!("  (due {})", due));
        }
    }
    line
}

/// Rows of a category view, children indented under their parent
pub fn format_rows(rows: &[Row<'_>], today: NaiveDate) -> Vec<String> {
    let mut lines = Vec::new();
    for row in rows {
        lines.push(format_task_line(row.task(), today));
        for child in row.children() {
            lines.push(format!("  ↳ {}", format_task_line(child, today)));
        }
    }
    lines
}

pub fn format_section_header(name: &str, count: usize) -> String {
    format!("== {} ({}) ==", name, count)
}

/// Detailed task view
pub fn format_task_detail(
    task: &Task,
    blocker: Option<&Task>,
    blocking: &[&Task],
    today: NaiveDate,
) -> Vec<String> {
    let mut lines = vec![format_task_line(task, today)];

    let status = if task.completed {
        "completed".to_string()
    } else {
        task.category.to_string()
    };
    lines.push(format!("status: {}", status));
    if let Some(due) = task.due_date {
        lines.push(format!("due: {}", due));
    }
    match (&task.blocked_by, blocker) {
        (Some(_), Some(parent)) => {
            lines.push(format!("blocked by: {} \"{}\"", parent.id, parent.text))
        }
        (Some(id), None) => lines.push(format!("blocked by: {} (inactive)", id)),
        (None, _) => {}
    }
    if !blocking.is_empty() {
        let ids: Vec<&str> = blocking.iter().map(|t| t.id.as_str()).collect();
        lines.push(format!("blocking: {}", ids.join(", ")));
    }
    let tags = extract_tags(&task.text);
    if !tags.is_empty() {
        let tags: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
        lines.push(format!("tags: {}", tags.join(" ")));
    }
    if let Some(created) = DateTime::<Utc>::from_timestamp_millis(task.timestamp) {
        lines.push(format!("created: {}", created.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(desc) = &task.description {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

pub fn format_notification(notification: &Notification) -> String {
    format!("» {}", notification)
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Parse a due date: `YYYY-MM-DD`, `today`, `tomorrow` or `+N` days.
pub fn parse_due(s: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let s = s.trim();
    let out_of_range = || format!("due date out of range: '{}'", s);
    match s {
        "today" => return Ok(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)).ok_or_else(out_of_range),
        _ => {}
    }
    if let Some(n) = s.strip_prefix('+') {
        let days: u64 = n
            .parse()
            .map_err(|_| format!("invalid day offset '{}' (expected +N)", s))?;
        return today.checked_add_days(Days::new(days)).ok_or_else(out_of_range);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        format!(
            "invalid due date '{}' (expected YYYY-MM-DD, today, tomorrow or +N)",
            s
        )
    })
}

/// Accept `t3` or a bare `3`.
pub fn parse_task_id(s: &str) -> TaskId {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        TaskId::new(format!("t{}", s))
    } else {
        TaskId::new(s)
    }
}
