//! Fractional sort keys.
//!
//! Orders are plain `f64`s compared within one partition. Inserting between
//! two neighbors takes their midpoint, so a move never renumbers siblings.
//! Repeated midpoint insertion at the same spot loses precision eventually;
//! that is accepted at human scale.

use crate::model::task::{Partition, Task, TaskId};
use crate::ops::classify::compare_tasks;

/// Gap between a parent and its first follower when nothing sorts after it
const FOLLOW_OFFSET: f64 = 0.1;
/// Gap between consecutive followers when nothing sorts after the parent
const FOLLOW_STEP: f64 = 0.01;

/// Order that sorts before every existing one (`0` for an empty partition)
pub fn top_order<I: IntoIterator<Item = f64>>(orders: I) -> f64 {
    orders
        .into_iter()
        .reduce(f64::min)
        .map_or(0.0, |min| min - 1.0)
}

/// Order that sorts after every existing one (`0` for an empty partition)
pub fn bottom_order<I: IntoIterator<Item = f64>>(orders: I) -> f64 {
    orders
        .into_iter()
        .reduce(f64::max)
        .map_or(0.0, |max| max + 1.0)
}

/// Midpoint of two neighboring orders
pub fn between(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Order for landing at `index` in `sorted`, a partition already in
/// display order that does not contain the task being placed.
pub fn order_at_index(sorted: &[f64], index: usize) -> f64 {
    if index == 0 || sorted.is_empty() {
        return top_order(sorted.iter().copied());
    }
    if index >= sorted.len() {
        return bottom_order(sorted.iter().copied());
    }
    between(sorted[index - 1], sorted[index])
}

/// `n` ascending orders that all sort before the existing ones, so a group
/// placed at the top keeps its relative order.
pub fn top_run<I: IntoIterator<Item = f64>>(orders: I, n: usize) -> Vec<f64> {
    let first = top_order(orders) - n.saturating_sub(1) as f64;
    (0..n).map(|i| first + i as f64).collect()
}

/// Orders for `n` children placed right after a parent at `parent`.
///
/// With a following sibling at `next` the children split the gap evenly;
/// otherwise they trail the parent by small fixed steps.
pub fn follow_orders(parent: f64, next: Option<f64>, n: usize) -> Vec<f64> {
    match next {
        Some(next) if next > parent => {
            let step = (next - parent) / (n + 1) as f64;
            (0..n).map(|i| parent + step * (i + 1) as f64).collect()
        }
        _ => (0..n)
            .map(|i| parent + FOLLOW_OFFSET + FOLLOW_STEP * i as f64)
            .collect(),
    }
}

/// Orders of the tasks in `partition`, skipping `exclude`, in display order.
pub fn partition_orders(tasks: &[Task], partition: Partition, exclude: &[&TaskId]) -> Vec<f64> {
    let mut members: Vec<&Task> = tasks
        .iter()
        .filter(|t| Partition::of(t) == partition && !exclude.contains(&&t.id))
        .collect();
    members.sort_by(|a, b| compare_tasks(a, b));
    members.iter().map(|t| t.order).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_of_empty_is_zero() {
        assert_eq!(top_order(std::iter::empty()), 0.0);
        assert_eq!(bottom_order(std::iter::empty()), 0.0);
    }

    #[test]
    fn repeated_top_insertion_strictly_decreases() {
        let mut orders: Vec<f64> = Vec::new();
        let mut last = f64::INFINITY;
        for _ in 0..10 {
            let next = top_order(orders.iter().copied());
            assert!(next < last);
            last = next;
            orders.push(next);
        }
        assert_eq!(last, -9.0);
    }

    #[test]
    fn bottom_follows_max() {
        assert_eq!(bottom_order([3.0, -1.0, 2.5]), 4.0);
    }

    #[test]
    fn between_is_strictly_inside() {
        let pairs = [(0.0, 1.0), (-3.0, -2.5), (1.0, 1.0000001), (-10.0, 40.0)];
        for (a, b) in pairs {
            let m = between(a, b);
            assert!(a < m && m < b, "{} not strictly between {} and {}", m, a, b);
        }
    }

    #[test]
    fn index_edges_behave_like_top_and_bottom() {
        let sorted = [-2.0, 0.0, 5.0];
        assert_eq!(order_at_index(&sorted, 0), -3.0);
        assert_eq!(order_at_index(&sorted, 1), -1.0);
        assert_eq!(order_at_index(&sorted, 2), 2.5);
        assert_eq!(order_at_index(&sorted, 3), 6.0);
        assert_eq!(order_at_index(&sorted, 99), 6.0);
        assert_eq!(order_at_index(&[], 4), 0.0);
    }

    #[test]
    fn top_run_preserves_relative_order() {
        assert_eq!(top_run([4.0, 7.0], 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(top_run(std::iter::empty(), 2), vec![-1.0, 0.0]);
        assert!(top_run([1.0], 0).is_empty());
    }

    #[test]
    fn followers_fit_before_next_sibling() {
        let orders = follow_orders(1.0, Some(2.0), 3);
        assert_eq!(orders, vec![1.25, 1.5, 1.75]);
        let tail = follow_orders(1.0, None, 2);
        assert!((tail[0] - 1.1).abs() < 1e-9);
        assert!((tail[1] - 1.11).abs() < 1e-9);
    }
}
