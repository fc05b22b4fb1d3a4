//! Folding a reordered slice of the task list back into the canonical sequence.
//!
//! A reorder surface only ever shows a filtered or grouped slice of the list. Reordering the
//! slice changes the relative order of the tasks in it and never the relative order of the
//! tasks outside it.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::identity::{IdentityKey, identity_key};
use crate::task::Task;

/// Where the tasks that were not part of the reordered slice end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplicePolicy {
    /// Reordered tasks first, untouched tasks after them in their original relative order.
    #[default]
    Front,
    /// Untouched tasks keep their absolute index; the reordered tasks refill the slots they
    /// occupied before, in their new order.
    Interleave,
}

impl FromStr for SplicePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "splice" => Ok(SplicePolicy::Front),
            "interleave" => Ok(SplicePolicy::Interleave),
            other => Err(anyhow!(
                "invalid reorder.splice '{other}' (expected front or interleave)"
            )),
        }
    }
}

pub fn reconcile(canonical: &[Task], reordered: &[Task]) -> Vec<Task> {
    reconcile_with(canonical, reordered, SplicePolicy::Front)
}

/// Builds the new canonical sequence after `reordered` (a permutation of some subset of
/// `canonical`, by value) was put in a new order.
///
/// Duplicate identity keys are matched in document order: the n-th occurrence of a key in
/// `reordered` takes the n-th occurrence in `canonical`. A task with no remaining match is
/// kept as given.
#[tracing::instrument(skip_all, fields(canonical = canonical.len(), reordered = reordered.len(), policy = ?policy))]
pub fn reconcile_with(
    canonical: &[Task],
    reordered: &[Task],
    policy: SplicePolicy,
) -> Vec<Task> {
    let mut slots: HashMap<IdentityKey, VecDeque<usize>> = HashMap::with_capacity(canonical.len());
    for (idx, task) in canonical.iter().enumerate() {
        slots.entry(identity_key(task)).or_default().push_back(idx);
    }

    let mut consumed = vec![false; canonical.len()];
    let mut touched = Vec::with_capacity(reordered.len());
    for task in reordered {
        let key = identity_key(task);
        match slots.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(idx) => {
                consumed[idx] = true;
                touched.push(canonical[idx].clone());
            }
            None => {
                warn!(key = %key, "reordered task has no match in the canonical list; keeping it as given");
                touched.push(task.clone());
            }
        }
    }

    let untouched = canonical
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .count();
    debug!(touched = touched.len(), untouched, "reconciled reorder");

    match policy {
        SplicePolicy::Front => {
            let mut out = touched;
            out.extend(
                canonical
                    .iter()
                    .zip(&consumed)
                    .filter(|(_, used)| !**used)
                    .map(|(task, _)| task.clone()),
            );
            out
        }
        SplicePolicy::Interleave => {
            let mut refill = touched.into_iter();
            let mut out = Vec::with_capacity(canonical.len());
            for (task, used) in canonical.iter().zip(&consumed) {
                if *used {
                    if let Some(next) = refill.next() {
                        out.push(next);
                    }
                } else {
                    out.push(task.clone());
                }
            }
            out.extend(refill);
            out
        }
    }
}

/// Moves the item at `from` to index `to`, shifting the items between them. Indices are
/// 0-based; an out-of-range index leaves the list as it was and returns `false`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{SplicePolicy, move_item, reconcile, reconcile_with};
    use crate::identity::identity_key;
    use crate::task::{Priority, Task};

    fn named(names: &[&str]) -> Vec<Task> {
        names.iter().map(|name| Task::new(*name)).collect()
    }

    fn descriptions(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.description.as_str()).collect()
    }

    #[test]
    fn reordered_subset_moves_to_the_front() {
        let canonical = named(&["a", "b", "c", "d"]);
        let subset = named(&["c", "a"]);

        let out = reconcile(&canonical, &subset);
        assert_eq!(descriptions(&out), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn interleave_keeps_untouched_tasks_in_place() {
        let canonical = named(&["a", "b", "c", "d"]);
        let subset = named(&["c", "a"]);

        let out = reconcile_with(&canonical, &subset, SplicePolicy::Interleave);
        assert_eq!(descriptions(&out), vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn canonical_objects_are_returned_not_the_reordered_copies() {
        let canonical = vec![
            Task::new("a").with_due("2026-01-01"),
            Task::new("b"),
        ];
        // Same identity key, stale due date.
        let subset = vec![Task::new("b"), Task::new("a").with_due("2025-12-31")];

        let out = reconcile(&canonical, &subset);
        assert_eq!(out[1].due.as_deref(), Some("2026-01-01"));
    }

    #[test]
    fn duplicates_are_matched_in_document_order() {
        let canonical = vec![
            Task::new("dup").with_due("first"),
            Task::new("x"),
            Task::new("dup").with_due("second"),
        ];
        let subset = vec![Task::new("x"), Task::new("dup"), Task::new("dup")];

        let out = reconcile(&canonical, &subset);
        let dues: Vec<_> = out.iter().map(|task| task.due.as_deref()).collect();
        assert_eq!(dues, vec![None, Some("first"), Some("second")]);
        assert_eq!(out.len(), canonical.len());
    }

    #[test]
    fn unknown_tasks_are_kept_as_given() {
        let canonical = named(&["a", "b"]);
        let subset = named(&["ghost", "b"]);

        let out = reconcile(&canonical, &subset);
        assert_eq!(descriptions(&out), vec!["ghost", "b", "a"]);
    }

    #[test]
    fn same_description_different_priority_are_distinct() {
        let canonical = vec![
            Task::new("call").with_priority(Priority::Urgent),
            Task::new("call").with_priority(Priority::Later),
        ];
        let subset = vec![canonical[1].clone(), canonical[0].clone()];

        let out = reconcile(&canonical, &subset);
        assert_eq!(out[0].priority, Priority::Later);
        assert_eq!(out[1].priority, Priority::Urgent);
    }

    #[test]
    fn every_subset_and_order_yields_a_permutation() {
        let canonical = named(&["a", "b", "c", "d", "e"]);

        for mask in 0u32..(1 << canonical.len()) {
            let mut subset: Vec<Task> = canonical
                .iter()
                .enumerate()
                .filter(|(idx, _)| mask & (1u32 << *idx) != 0)
                .map(|(_, task)| task.clone())
                .collect();
            subset.reverse();

            for policy in [SplicePolicy::Front, SplicePolicy::Interleave] {
                let out = reconcile_with(&canonical, &subset, policy);

                let mut sorted = descriptions(&out);
                sorted.sort_unstable();
                assert_eq!(sorted, descriptions(&canonical), "mask {mask:b}");

                let keys: Vec<_> = subset.iter().map(identity_key).collect();
                let touched: Vec<_> = out
                    .iter()
                    .map(identity_key)
                    .filter(|key| keys.contains(key))
                    .collect();
                assert_eq!(touched, keys, "mask {mask:b}");

                let rest: Vec<_> = out
                    .iter()
                    .filter(|task| !keys.contains(&identity_key(task)))
                    .map(|task| task.description.as_str())
                    .collect();
                let expected_rest: Vec<_> = canonical
                    .iter()
                    .filter(|task| !keys.contains(&identity_key(task)))
                    .map(|task| task.description.as_str())
                    .collect();
                assert_eq!(rest, expected_rest, "mask {mask:b}");
            }
        }
    }

    #[test]
    fn move_item_matches_array_move() {
        let mut items = vec!["a", "b", "c", "d"];
        assert!(move_item(&mut items, 0, 2));
        assert_eq!(items, vec!["b", "c", "a", "d"]);

        assert!(move_item(&mut items, 3, 0));
        assert_eq!(items, vec!["d", "b", "c", "a"]);

        assert!(!move_item(&mut items, 4, 0));
        assert_eq!(items, vec!["d", "b", "c", "a"]);
    }
}
