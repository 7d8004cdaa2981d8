use std::fmt;

use serde::{Deserialize, Serialize};

/// User-facing event raised by a cascading mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Postponed tasks whose date arrived were moved into today
    MovedToToday { count: usize },
    /// Completing a parent released its blocked children into the backlog
    ChildrenUnblocked {
        count: usize,
        #[serde(rename = "parentText")]
        parent_text: String,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::MovedToToday { count: 1 } => write!(f, "moved 1 task to today"),
            Notification::MovedToToday { count } => write!(f, "moved {} tasks to today", count),
            Notification::ChildrenUnblocked { count, parent_text } => {
                let noun = if *count == 1 { "task" } else { "tasks" };
                write!(
                    f,
                    "completed \"{}\": {} blocked {} moved to backlog",
                    parent_text, count, noun
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let moved = serde_json::to_string(&Notification::MovedToToday { count: 2 }).unwrap();
        assert_eq!(moved, r#"{"type":"moved-to-today","count":2}"#);

        let unblocked = serde_json::to_string(&Notification::ChildrenUnblocked {
            count: 1,
            parent_text: "Ship it".into(),
        })
        .unwrap();
        assert_eq!(
            unblocked,
            r#"{"type":"children-unblocked","count":1,"parentText":"Ship it"}"#
        );
    }

    #[test]
    fn display_pluralizes() {
        assert_eq!(
            Notification::MovedToToday { count: 1 }.to_string(),
            "moved 1 task to today"
        );
        assert_eq!(
            Notification::ChildrenUnblocked {
                count: 3,
                parent_text: "B".into()
            }
            .to_string(),
            "completed \"B\": 3 blocked tasks moved to backlog"
        );
    }
}
