use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::model::task::Task;

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)#([\p{L}\p{N}_-]+)").unwrap_or_else(|e| panic!("hashtag regex: {}", e))
});

/// Hashtags embedded in task text, lowercased, without the `#`, in order of
/// first appearance.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for cap in HASHTAG.captures_iter(text) {
        let tag = cap[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Whether `task` carries `tag` (with or without the leading `#`).
pub fn has_tag(task: &Task, tag: &str) -> bool {
    let wanted = tag.trim_start_matches('#').to_lowercase();
    extract_tags(&task.text).iter().any(|t| *t == wanted)
}

/// Count how many tasks use each tag, most used first.
pub fn tag_counts<'a, I: IntoIterator<Item = &'a Task>>(tasks: I) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for task in tasks {
        for tag in extract_tags(&task.text) {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{Category, TaskId};

    fn task(text: &str) -> Task {
        Task {
            id: TaskId::new("x"),
            text: text.to_string(),
            completed: false,
            timestamp: 0,
            order: 0.0,
            description: None,
            category: Category::Backlog,
            due_date: None,
            blocked_by: None,
        }
    }

    #[test]
    fn extracts_tags_in_order() {
        assert_eq!(
            extract_tags("#home fix sink #Urgent then #home again"),
            vec!["home", "urgent"]
        );
    }

    #[test]
    fn ignores_mid_word_hashes() {
        assert!(extract_tags("issue#42 and C# notes").is_empty());
    }

    #[test]
    fn has_tag_accepts_prefix() {
        let t = task("Water plants #garden");
        assert!(has_tag(&t, "#garden"));
        assert!(has_tag(&t, "Garden"));
        assert!(!has_tag(&t, "home"));
    }

    #[test]
    fn counts_sorted_by_use() {
        let tasks = vec![task("a #x #y"), task("b #y"), task("c #z #y")];
        let counts = tag_counts(&tasks);
        let pairs: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(pairs, vec![("y", 3), ("x", 1), ("z", 1)]);
    }
}
