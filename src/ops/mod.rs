pub mod check;
pub mod classify;
pub mod hierarchy;
pub mod migrate;
pub mod order;
pub mod tags;
pub mod task_ops;
