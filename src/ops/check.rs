use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::task::{Category, Partition, Task, TaskId};
use crate::ops::classify::classify;
use crate::ops::hierarchy::effective_parent;

/// Structured result from `tf check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A referential problem that should be fixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// `blockedBy` names a task that does not exist
    #[serde(rename = "dangling_blocker")]
    DanglingBlocker { task_id: TaskId, blocked_by: TaskId },
    /// A task blocks itself
    #[serde(rename = "self_block")]
    SelfBlock { task_id: TaskId },
    /// The blocker is itself blocked (more than one level deep)
    #[serde(rename = "blocker_chain")]
    BlockerChain { task_id: TaskId, blocked_by: TaskId },
    /// A task with blank text
    #[serde(rename = "empty_text")]
    EmptyText { task_id: TaskId },
}

/// A non-critical inconsistency that the next write or migration repairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// An active task still blocked by a completed one
    #[serde(rename = "blocked_by_completed")]
    BlockedByCompleted { task_id: TaskId, blocked_by: TaskId },
    /// Stored category disagrees with the due date
    #[serde(rename = "stale_category")]
    StaleCategory {
        task_id: TaskId,
        category: Category,
        expected: Category,
    },
    /// Several tasks share one order value within a partition
    #[serde(rename = "duplicate_order")]
    DuplicateOrder {
        partition: String,
        order: f64,
        task_ids: Vec<TaskId>,
    },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a task set and return structured results.
///
/// This is a read-only operation.
///
/// Checks performed:
/// 1. Every `blockedBy` resolves, is not the task itself, and is one level deep
/// 2. No blank task text
/// 3. Warnings for completed blockers, stale categories and order collisions
pub fn check_tasks(tasks: &[Task], today: NaiveDate) -> CheckResult {
    let mut result = CheckResult::default();
    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();

    for task in tasks {
        check_task(task, tasks, &by_id, today, &mut result);
    }
    check_orders(tasks, &mut result);

    result.valid = result.errors.is_empty();
    result
}

fn check_task(
    task: &Task,
    tasks: &[Task],
    by_id: &HashMap<&TaskId, &Task>,
    today: NaiveDate,
    result: &mut CheckResult,
) {
    if task.text.trim().is_empty() {
        result.errors.push(CheckError::EmptyText {
            task_id: task.id.clone(),
        });
    }

    if let Some(parent_id) = &task.blocked_by {
        match by_id.get(parent_id) {
            _ if parent_id == &task.id => result.errors.push(CheckError::SelfBlock {
                task_id: task.id.clone(),
            }),
            None => result.errors.push(CheckError::DanglingBlocker {
                task_id: task.id.clone(),
                blocked_by: parent_id.clone(),
            }),
            Some(parent) if parent.blocked_by.is_some() => {
                result.errors.push(CheckError::BlockerChain {
                    task_id: task.id.clone(),
                    blocked_by: parent_id.clone(),
                })
            }
            Some(parent) if parent.completed && !task.completed => {
                result.warnings.push(CheckWarning::BlockedByCompleted {
                    task_id: task.id.clone(),
                    blocked_by: parent_id.clone(),
                })
            }
            Some(_) => {}
        }
    }

    // Children take their parent's category, so only free tasks are held to
    // their due date.
    if !task.completed && effective_parent(tasks, task).is_none() {
        let expected = classify(task.due_date, today);
        if expected != task.category {
            result.warnings.push(CheckWarning::StaleCategory {
                task_id: task.id.clone(),
                category: task.category,
                expected,
            });
        }
    }
}

fn check_orders(tasks: &[Task], result: &mut CheckResult) {
    let mut groups: BTreeMap<(String, u64), Vec<TaskId>> = BTreeMap::new();
    for task in tasks {
        let key = (Partition::of(task).to_string(), task.order.to_bits());
        groups.entry(key).or_default().push(task.id.clone());
    }
    for ((partition, bits), task_ids) in groups {
        if task_ids.len() > 1 {
            result.warnings.push(CheckWarning::DuplicateOrder {
                partition,
                order: f64::from_bits(bits),
                task_ids,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
