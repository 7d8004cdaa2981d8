use chrono::NaiveDate;

use crate::model::notification::Notification;
use crate::model::task::{Category, NewTask, Partition, Patch, Task, TaskId, TaskPatch};
use crate::ops::classify::classify;
use crate::ops::hierarchy::{children_of, organize};
use crate::ops::order::{follow_orders, order_at_index, partition_orders, top_order, top_run};

/// Error type for task operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("a task cannot block itself")]
    SelfBlock,
    #[error("blocker not found: {0}")]
    BlockerNotFound(TaskId),
    #[error("{0} is blocked by another task and cannot block others")]
    BlockerIsBlocked(TaskId),
    #[error("{0} is completed and cannot block other tasks")]
    BlockerCompleted(TaskId),
    #[error("{0} blocks other tasks and cannot be blocked itself")]
    HasDependents(TaskId),
    #[error("invalid move: {0}")]
    InvalidMove(String),
}

/// One write against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create(NewTask),
    Patch { id: TaskId, patch: TaskPatch },
    Delete(TaskId),
}

/// Concrete updates computed for one intent.
///
/// `changes` are written one by one, in order; `batch` is written afterwards
/// as a single multi-task patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub changes: Vec<Change>,
    pub batch: Vec<(TaskId, TaskPatch)>,
    /// Hold the batch back for the cascade delay (completion animation)
    pub delay_batch: bool,
    pub notification: Option<Notification>,
}

impl Plan {
    fn patch(id: &TaskId, patch: TaskPatch) -> Self {
        Plan {
            changes: vec![Change::Patch {
                id: id.clone(),
                patch,
            }],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.batch.is_empty()
    }

    /// Number of tasks touched
    pub fn len(&self) -> usize {
        self.changes.len() + self.batch.len()
    }

    /// Apply `changes` to an in-memory list. Created tasks get ids from
    /// `assign_id`; the ids are returned in creation order.
    pub fn apply_changes(
        &self,
        tasks: &mut Vec<Task>,
        mut assign_id: impl FnMut() -> TaskId,
    ) -> Vec<TaskId> {
        let mut created = Vec::new();
        for change in &self.changes {
            match change {
                Change::Create(fields) => {
                    let id = assign_id();
                    tasks.push(Task::from_new(id.clone(), fields.clone()));
                    created.push(id);
                }
                Change::Patch { id, patch } => apply_patch(tasks, id, patch),
                Change::Delete(id) => tasks.retain(|t| &t.id != id),
            }
        }
        created
    }

    /// Apply `batch` to an in-memory list.
    pub fn apply_batch(&self, tasks: &mut [Task]) {
        for (id, patch) in &self.batch {
            apply_patch(tasks, id, patch);
        }
    }
}

/// A single-field edit from the UI
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEdit {
    Text(String),
    Description(Option<String>),
    DueDate(Option<NaiveDate>),
    BlockedBy(Option<TaskId>),
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Add a task at the top of the category its due date selects.
pub fn add_task(
    tasks: &[Task],
    text: &str,
    due_date: Option<NaiveDate>,
    description: Option<String>,
    today: NaiveDate,
    now_ms: i64,
) -> Result<Plan, TaskError> {
    let text = validate_text(text)?;
    let category = classify(due_date, today);
    let order = top_order(partition_orders(tasks, Partition::Active(category), &[]));
    let fields = NewTask {
        text,
        completed: false,
        timestamp: now_ms,
        order,
        description: description.filter(|d| !d.trim().is_empty()),
        category,
        due_date,
        blocked_by: None,
    };
    Ok(Plan {
        changes: vec![Change::Create(fields)],
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// Dispatch a single-field edit.
pub fn edit_task(
    tasks: &[Task],
    id: &TaskId,
    edit: TaskEdit,
    today: NaiveDate,
) -> Result<Plan, TaskError> {
    match edit {
        TaskEdit::Text(text) => edit_text(tasks, id, &text),
        TaskEdit::Description(desc) => edit_description(tasks, id, desc),
        TaskEdit::DueDate(due) => edit_due_date(tasks, id, due, today),
        TaskEdit::BlockedBy(Some(parent)) => set_blocked_by(tasks, id, &parent),
        TaskEdit::BlockedBy(None) => clear_blocked_by(tasks, id),
    }
}

pub fn edit_text(tasks: &[Task], id: &TaskId, text: &str) -> Result<Plan, TaskError> {
    let text = validate_text(text)?;
    find_task(tasks, id)?;
    Ok(Plan::patch(
        id,
        TaskPatch {
            text: Some(text),
            ..Default::default()
        },
    ))
}

/// Set or clear the description. A blank description clears it.
pub fn edit_description(
    tasks: &[Task],
    id: &TaskId,
    description: Option<String>,
) -> Result<Plan, TaskError> {
    find_task(tasks, id)?;
    let description = description.filter(|d| !d.trim().is_empty());
    Ok(Plan::patch(
        id,
        TaskPatch {
            description: description.into(),
            ..Default::default()
        },
    ))
}

/// Change the due date and reclassify. A task that lands in a new category
/// goes to the top of it.
pub fn edit_due_date(
    tasks: &[Task],
    id: &TaskId,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<Plan, TaskError> {
    let task = find_task(tasks, id)?;
    let category = classify(due_date, today);
    let mut patch = TaskPatch {
        due_date: due_date.into(),
        ..Default::default()
    };
    if category != task.category {
        patch.category = Some(category);
        if !task.completed {
            patch.order = Some(top_order(partition_orders(
                tasks,
                Partition::Active(category),
                &[id],
            )));
        }
    }
    Ok(Plan::patch(id, patch))
}

/// Make `parent_id` block `id`. The task joins the parent's category at the
/// top.
pub fn set_blocked_by(tasks: &[Task], id: &TaskId, parent_id: &TaskId) -> Result<Plan, TaskError> {
    let task = find_task(tasks, id)?;
    if id == parent_id {
        return Err(TaskError::SelfBlock);
    }
    let parent = tasks
        .iter()
        .find(|t| &t.id == parent_id)
        .ok_or_else(|| TaskError::BlockerNotFound(parent_id.clone()))?;
    if parent.completed {
        return Err(TaskError::BlockerCompleted(parent_id.clone()));
    }
    if parent.blocked_by.is_some() {
        return Err(TaskError::BlockerIsBlocked(parent_id.clone()));
    }
    if !children_of(tasks, id).is_empty() {
        return Err(TaskError::HasDependents(id.clone()));
    }

    let mut patch = TaskPatch {
        blocked_by: Patch::Set(parent_id.clone()),
        category: Some(parent.category),
        ..Default::default()
    };
    if !task.completed {
        patch.order = Some(top_order(partition_orders(
            tasks,
            Partition::Active(parent.category),
            &[id],
        )));
    }
    Ok(Plan::patch(id, patch))
}

/// Remove the blocker. The task stays where it is.
pub fn clear_blocked_by(tasks: &[Task], id: &TaskId) -> Result<Plan, TaskError> {
    find_task(tasks, id)?;
    Ok(Plan::patch(
        id,
        TaskPatch {
            blocked_by: Patch::Clear,
            ..Default::default()
        },
    ))
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Flip completion.
///
/// Completing moves the task to the top of the completed list and releases
/// its active children into the backlog. Reopening reclassifies from the
/// due date.
pub fn toggle_complete(tasks: &[Task], id: &TaskId, today: NaiveDate) -> Result<Plan, TaskError> {
    let task = find_task(tasks, id)?;
    if task.completed {
        let category = classify(task.due_date, today);
        let order = top_order(partition_orders(tasks, Partition::Active(category), &[id]));
        return Ok(Plan::patch(
            id,
            TaskPatch {
                completed: Some(false),
                category: Some(category),
                order: Some(order),
                ..Default::default()
            },
        ));
    }

    let order = top_order(partition_orders(tasks, Partition::Completed, &[id]));
    let mut plan = Plan::patch(
        id,
        TaskPatch {
            completed: Some(true),
            order: Some(order),
            ..Default::default()
        },
    );

    let children = children_of(tasks, id);
    if !children.is_empty() {
        let mut exclude: Vec<&TaskId> = children.iter().map(|c| &c.id).collect();
        exclude.push(id);
        let orders = top_run(
            partition_orders(tasks, Partition::Active(Category::Backlog), &exclude),
            children.len(),
        );
        plan.batch = children
            .iter()
            .zip(orders)
            .map(|(child, order)| {
                let mut patch = TaskPatch::placement(Category::Backlog, order);
                patch.blocked_by = Patch::Clear;
                (child.id.clone(), patch)
            })
            .collect();
        plan.delay_batch = true;
        plan.notification = Some(Notification::ChildrenUnblocked {
            count: children.len(),
            parent_text: task.text.clone(),
        });
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

/// Delete a task and unblock everything it was blocking.
pub fn delete_task(tasks: &[Task], id: &TaskId) -> Result<Plan, TaskError> {
    find_task(tasks, id)?;
    let batch = tasks
        .iter()
        .filter(|t| t.blocked_by.as_ref() == Some(id) && &t.id != id)
        .map(|t| {
            (
                t.id.clone(),
                TaskPatch {
                    blocked_by: Patch::Clear,
                    ..Default::default()
                },
            )
        })
        .collect();
    Ok(Plan {
        changes: vec![Change::Delete(id.clone())],
        batch,
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Drag and drop
// ---------------------------------------------------------------------------

/// Drop a task at `index` among the top-level rows of `target`.
///
/// Active children follow their parent into the target category and sit
/// right after it.
pub fn move_task(
    tasks: &[Task],
    id: &TaskId,
    target: Partition,
    index: usize,
) -> Result<Plan, TaskError> {
    let task = find_task(tasks, id)?;
    match (task.completed, target) {
        (true, Partition::Completed) => {
            let siblings = partition_orders(tasks, Partition::Completed, &[id]);
            let order = order_at_index(&siblings, index);
            Ok(Plan::patch(
                id,
                TaskPatch {
                    order: Some(order),
                    ..Default::default()
                },
            ))
        }
        (true, Partition::Active(_)) => Err(TaskError::InvalidMove(format!(
            "{} is completed; reopen it before moving it to {}",
            id, target
        ))),
        (false, Partition::Completed) => Err(TaskError::InvalidMove(format!(
            "{} is not completed; complete it instead of moving it",
            id
        ))),
        (false, Partition::Active(category)) => {
            let siblings: Vec<f64> = organize(tasks, category)
                .top_level()
                .into_iter()
                .filter(|t| &t.id != id)
                .map(|t| t.order)
                .collect();
            let order = order_at_index(&siblings, index);
            let next = if index < siblings.len() {
                Some(siblings[index])
            } else {
                None
            };

            let mut plan = Plan::patch(id, TaskPatch::placement(category, order));
            let children = children_of(tasks, id);
            plan.batch = children
                .iter()
                .zip(follow_orders(order, next, children.len()))
                .map(|(child, order)| (child.id.clone(), TaskPatch::placement(category, order)))
                .collect();
            Ok(plan)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Find a task by id.
pub fn find_task<'a>(tasks: &'a [Task], id: &TaskId) -> Result<&'a Task, TaskError> {
    tasks
        .iter()
        .find(|t| &t.id == id)
        .ok_or_else(|| TaskError::NotFound(id.clone()))
}

/// Apply a patch to the task with `id`, if present.
pub fn apply_patch(tasks: &mut [Task], id: &TaskId, patch: &TaskPatch) {
    if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
        task.apply(patch);
    }
}

fn validate_text(text: &str) -> Result<String, TaskError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TaskError::EmptyText);
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
