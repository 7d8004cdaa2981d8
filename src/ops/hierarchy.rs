use std::collections::HashMap;

use serde::Serialize;

use crate::model::task::{Category, Task, TaskId};
use crate::ops::classify::{compare_tasks, sort_tasks};

/// A parent task with the active tasks it blocks.
#[derive(Debug, Clone, Serialize)]
pub struct Hierarchy<'a> {
    pub parent: &'a Task,
    pub children: Vec<&'a Task>,
}

/// One top-level line of a category view.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Standalone(&'a Task),
    Group(&'a Hierarchy<'a>),
}

impl<'a> Row<'a> {
    pub fn task(&self) -> &'a Task {
        match self {
            Row::Standalone(t) => t,
            Row::Group(h) => h.parent,
        }
    }

    pub fn children(&self) -> &[&'a Task] {
        match self {
            Row::Standalone(_) => &[],
            Row::Group(h) => &h.children,
        }
    }
}

/// Display grouping of one category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Organized<'a> {
    pub hierarchies: Vec<Hierarchy<'a>>,
    pub standalone: Vec<&'a Task>,
}

impl<'a> Organized<'a> {
    /// Groups and standalone tasks merged by each top-level task's own order.
    pub fn rows(&self) -> Vec<Row<'_>> {
        let mut rows: Vec<Row<'_>> = self
            .hierarchies
            .iter()
            .map(|h| Row::Group(h))
            .chain(self.standalone.iter().map(|t| Row::Standalone(*t)))
            .collect();
        rows.sort_by(|a, b| compare_tasks(a.task(), b.task()));
        rows
    }

    /// Top-level tasks in display order
    pub fn top_level(&self) -> Vec<&'a Task> {
        let mut tasks: Vec<&'a Task> = self
            .hierarchies
            .iter()
            .map(|h| h.parent)
            .chain(self.standalone.iter().copied())
            .collect();
        sort_tasks(&mut tasks);
        tasks
    }

    pub fn is_empty(&self) -> bool {
        self.hierarchies.is_empty() && self.standalone.is_empty()
    }

    /// Number of tasks shown, children included
    pub fn len(&self) -> usize {
        self.standalone.len()
            + self
                .hierarchies
                .iter()
                .map(|h| 1 + h.children.len())
                .sum::<usize>()
    }
}

/// The live parent of `task`, if its `blocked_by` still names one.
///
/// A reference to a missing, completed or itself-blocked task does not
/// count: the task is then treated as unblocked.
pub fn effective_parent<'a>(tasks: &'a [Task], task: &Task) -> Option<&'a Task> {
    let parent_id = task.blocked_by.as_ref()?;
    if parent_id == &task.id {
        return None;
    }
    tasks
        .iter()
        .find(|t| &t.id == parent_id)
        .filter(|p| !p.completed && p.blocked_by.is_none())
}

/// Partition the active tasks of `category` into parent groups and
/// standalone tasks.
///
/// Children are grouped under their parent whatever their own category is.
/// A task whose parent cannot be resolved is standalone if its own category
/// matches.
pub fn organize(tasks: &[Task], category: Category) -> Organized<'_> {
    let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();

    let mut children: HashMap<&TaskId, Vec<&Task>> = HashMap::new();
    let mut tops: Vec<&Task> = Vec::new();
    for task in tasks.iter().filter(|t| !t.completed) {
        match live_parent_id(&by_id, task) {
            Some(pid) => children.entry(pid).or_default().push(task),
            None if task.category == category => tops.push(task),
            None => {}
        }
    }
    sort_tasks(&mut tops);

    let mut organized = Organized::default();
    for parent in tops {
        match children.remove(&parent.id) {
            Some(mut kids) => {
                sort_tasks(&mut kids);
                organized.hierarchies.push(Hierarchy {
                    parent,
                    children: kids,
                });
            }
            None => organized.standalone.push(parent),
        }
    }
    organized
}

fn live_parent_id<'a>(by_id: &HashMap<&TaskId, &Task>, task: &'a Task) -> Option<&'a TaskId> {
    let pid = task.blocked_by.as_ref()?;
    if pid == &task.id {
        return None;
    }
    let parent = by_id.get(pid)?;
    (!parent.completed && parent.blocked_by.is_none()).then_some(pid)
}

/// Active tasks blocked by `parent_id`, in display order.
pub fn children_of<'a>(tasks: &'a [Task], parent_id: &TaskId) -> Vec<&'a Task> {
    let mut kids: Vec<&Task> = tasks
        .iter()
        .filter(|t| !t.completed && t.blocked_by.as_ref() == Some(parent_id) && &t.id != parent_id)
        .collect();
    sort_tasks(&mut kids);
    kids
}

/// Tasks that may be chosen as the blocker of `task_id`.
///
/// Excludes the task itself, completed tasks, tasks that are already blocked
/// (no chains) and tasks blocked by `task_id` (no two-cycles).
pub fn blocker_candidates<'a>(tasks: &'a [Task], task_id: &TaskId) -> Vec<&'a Task> {
    let mut candidates: Vec<&Task> = tasks
        .iter()
        .filter(|t| &t.id != task_id && !t.completed && !t.is_blocked())
        .collect();
    sort_tasks(&mut candidates);
    candidates
}

/// The unified completed list, in display order.
pub fn completed(tasks: &[Task]) -> Vec<&Task> {
    let mut done: Vec<&Task> = tasks.iter().filter(|t| t.completed).collect();
    sort_tasks(&mut done);
    done
}
