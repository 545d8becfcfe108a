// src/novelty.rs
//! "Is this post new?" decisions. Pure functions, no I/O.

use crate::checkpoint::Checkpoint;
use crate::fetch::types::ContentItem;

/// Whether `candidate` should be reported as a new post.
///
/// - Nothing recorded yet: never new, so a fresh start does not replay the backlog.
/// - Same id as the last seen post: not new.
/// - Different id: new unless it is older than the last seen post
///   (a late-arriving older item is not a discovery).
pub fn is_new(checkpoint: &Checkpoint, candidate: &ContentItem) -> bool {
    let Some(last_id) = checkpoint.last_seen_id.as_deref() else {
        return false;
    };
    if candidate.id == last_id {
        return false;
    }
    checkpoint
        .last_seen_timestamp
        .map_or(true, |ts| candidate.created_at_ms >= ts)
}

/// Newest item by `created_at_ms`; on ties the earliest in list order wins.
pub fn select_candidate(items: &[ContentItem]) -> Option<&ContentItem> {
    items.iter().fold(None, |best: Option<&ContentItem>, it| match best {
        Some(b) if b.created_at_ms >= it.created_at_ms => Some(b),
        _ => Some(it),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, created: i64) -> ContentItem {
        ContentItem {
            id: id.into(),
            secondary_id: id.into(),
            title: None,
            summary: None,
            created_at_ms: created,
            updated_at_ms: created,
            author_name: None,
        }
    }

    fn cp(id: Option<&str>, ts: Option<i64>) -> Checkpoint {
        Checkpoint {
            last_seen_id: id.map(str::to_string),
            last_seen_timestamp: ts,
            last_checked_at_ms: 0,
        }
    }

    #[test]
    fn never_new_without_history() {
        for c in [item("a", 0), item("b", i64::MAX), item("", -5)] {
            assert!(!is_new(&cp(None, None), &c));
            assert!(!is_new(&cp(None, Some(10)), &c));
        }
    }

    #[test]
    fn same_id_is_never_new() {
        for ts in [0, 50, 51, 10_000] {
            assert!(!is_new(&cp(Some("a"), Some(50)), &item("a", ts)));
        }
    }

    #[test]
    fn different_id_at_or_after_marker_is_new() {
        assert!(is_new(&cp(Some("a"), Some(50)), &item("b", 50)));
        assert!(is_new(&cp(Some("a"), Some(50)), &item("b", 51)));
        assert!(is_new(&cp(Some("a"), None), &item("b", -1)));
    }

    #[test]
    fn older_item_with_new_id_is_ignored() {
        assert!(!is_new(&cp(Some("a"), Some(50)), &item("late", 49)));
    }

    #[test]
    fn candidate_is_newest_first_on_ties() {
        let v = vec![item("x", 100), item("y", 200), item("z", 200), item("w", 150)];
        assert_eq!(select_candidate(&v).unwrap().id, "y");
        assert!(select_candidate(&[]).is_none());
    }
}
