use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::notification::Notification;
use crate::model::task::{Category, Partition, Task, TaskId, TaskPatch};
use crate::ops::classify::{classify, sort_tasks};
use crate::ops::order::{partition_orders, top_run};
use crate::ops::task_ops::Plan;

/// Postponed tasks whose due date has arrived, in display order.
pub fn find_due_today(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let mut due: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            !t.completed
                && t.category == Category::Postponed
                && classify(t.due_date, today) == Category::Today
        })
        .collect();
    sort_tasks(&mut due);
    due
}

/// Batch that promotes every due postponed task into today.
///
/// Each due task is followed by the postponed children it blocks, and the
/// whole group lands on top of today keeping that relative order. Returns
/// `None` when nothing is due, so a second pass on the same day is a no-op.
pub fn plan_migration(tasks: &[Task], today: NaiveDate) -> Option<Plan> {
    let due = find_due_today(tasks, today);
    if due.is_empty() {
        return None;
    }

    let due_ids: HashSet<&TaskId> = due.iter().map(|t| &t.id).collect();
    let mut seen: HashSet<&TaskId> = HashSet::new();
    let mut moving: Vec<&Task> = Vec::new();
    for &parent in &due {
        // A due child moves with its due parent
        let follows_due_parent = parent
            .blocked_by
            .as_ref()
            .is_some_and(|pid| pid != &parent.id && due_ids.contains(pid));
        if follows_due_parent || !seen.insert(&parent.id) {
            continue;
        }
        moving.push(parent);
        let mut children: Vec<&Task> = tasks
            .iter()
            .filter(|t| {
                !t.completed
                    && t.category == Category::Postponed
                    && t.blocked_by.as_ref() == Some(&parent.id)
                    && t.id != parent.id
            })
            .collect();
        sort_tasks(&mut children);
        for child in children {
            if seen.insert(&child.id) {
                moving.push(child);
            }
        }
    }

    let exclude: Vec<&TaskId> = moving.iter().map(|t| &t.id).collect();
    let orders = top_run(
        partition_orders(tasks, Partition::Active(Category::Today), &exclude),
        moving.len(),
    );
    let batch: Vec<(TaskId, TaskPatch)> = moving
        .iter()
        .zip(orders)
        .map(|(t, order)| (t.id.clone(), TaskPatch::placement(Category::Today, order)))
        .collect();

    Some(Plan {
        notification: Some(Notification::MovedToToday { count: batch.len() }),
        batch,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn task(id: &str, category: Category, due: Option<NaiveDate>, order: f64) -> Task {
        Task {
            id: TaskId::new(id),
            text: id.to_string(),
            completed: false,
            timestamp: 0,
            order,
            description: None,
            category,
            due_date: due,
            blocked_by: None,
        }
    }

    fn sample() -> Vec<Task> {
        let tomorrow = today().succ_opt();
        let mut child = task("child", Category::Postponed, tomorrow, 0.5);
        child.blocked_by = Some(TaskId::new("due1"));
        let mut finished = task("finished", Category::Postponed, Some(today()), 9.0);
        finished.completed = true;
        vec![
            task("t", Category::Today, Some(today()), 0.0),
            task("due2", Category::Postponed, today().pred_opt(), 3.0),
            task("due1", Category::Postponed, Some(today()), 1.0),
            task("later", Category::Postponed, tomorrow, 2.0),
            child,
            finished,
        ]
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn finds_only_active_postponed_tasks_that_are_due() {
        let tasks = sample();
        assert_eq!(ids(&find_due_today(&tasks, today())), vec!["due1", "due2"]);
    }

    #[test]
    fn plan_keeps_parent_then_children_order() {
        let tasks = sample();
        let plan = plan_migration(&tasks, today()).unwrap();
        let moved: Vec<&str> = plan.batch.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(moved, vec!["due1", "child", "due2"]);
        let orders: Vec<f64> = plan.batch.iter().filter_map(|(_, p)| p.order).collect();
        // today holds t at 0.0
        assert_eq!(orders, vec![-3.0, -2.0, -1.0]);
        assert!(
            plan.batch
                .iter()
                .all(|(_, p)| p.category == Some(Category::Today))
        );
        assert_eq!(
            plan.notification,
            Some(Notification::MovedToToday { count: 3 })
        );
    }

    #[test]
    fn due_child_sorting_first_still_follows_its_parent() {
        let mut child = task("c", Category::Postponed, Some(today()), 1.0);
        child.blocked_by = Some(TaskId::new("p"));
        let tasks = vec![task("p", Category::Postponed, Some(today()), 2.0), child];
        let plan = plan_migration(&tasks, today()).unwrap();
        let moved: Vec<&str> = plan.batch.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(moved, vec!["p", "c"]);
        assert_eq!(
            plan.notification,
            Some(Notification::MovedToToday { count: 2 })
        );
    }

    #[test]
    fn second_pass_is_a_noop() {
        let mut tasks = sample();
        let plan = plan_migration(&tasks, today()).unwrap();
        plan.apply_batch(&mut tasks);
        assert!(plan_migration(&tasks, today()).is_none());
    }

    #[test]
    fn nothing_due_yields_none() {
        let tasks = sample();
        let yesterday = today().pred_opt().and_then(|d| d.pred_opt()).unwrap();
        assert!(plan_migration(&tasks, yesterday).is_none());
    }
}
