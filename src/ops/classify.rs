use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::model::task::{Category, Task};

/// Bucket for a due date relative to `today`.
///
/// No date is backlog; today or anything overdue is today; a future date is
/// postponed. Only calendar dates are compared.
pub fn classify(due: Option<NaiveDate>, today: NaiveDate) -> Category {
    match due {
        None => Category::Backlog,
        Some(d) if d <= today => Category::Today,
        Some(_) => Category::Postponed,
    }
}

/// Display comparator: ascending order, newest first among equal orders.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    a.order
        .total_cmp(&b.order)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}

/// Sort task references in display order.
pub fn sort_tasks(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| compare_tasks(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskId;
    use chrono::Days;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: &str, order: f64, timestamp: i64) -> Task {
        Task {
            id: TaskId::new(id),
            text: id.to_string(),
            completed: false,
            timestamp,
            order,
            description: None,
            category: Category::Backlog,
            due_date: None,
            blocked_by: None,
        }
    }

    #[test]
    fn no_date_is_backlog() {
        assert_eq!(classify(None, day(2025, 6, 1)), Category::Backlog);
    }

    #[test]
    fn today_and_overdue_are_today() {
        let today = day(2025, 6, 1);
        assert_eq!(classify(Some(today), today), Category::Today);
        assert_eq!(
            classify(today.checked_sub_days(Days::new(3)), today),
            Category::Today
        );
    }

    #[test]
    fn future_is_postponed() {
        let today = day(2025, 6, 1);
        assert_eq!(
            classify(today.checked_add_days(Days::new(1)), today),
            Category::Postponed
        );
    }

    #[test]
    fn classification_is_stable() {
        let today = day(2025, 12, 31);
        for offset in -5i64..5 {
            let due = today + chrono::Duration::days(offset);
            let first = classify(Some(due), today);
            assert_eq!(first, classify(Some(due), today));
        }
    }

    #[test]
    fn comparator_orders_ascending_then_newest_first() {
        let a = task("a", 1.0, 100);
        let b = task("b", 0.0, 100);
        let c = task("c", 1.0, 200);
        let mut tasks = vec![&a, &b, &c];
        sort_tasks(&mut tasks);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
