//! Matching the same task across two orderings of the canonical sequence.
//!
//! Backend records have no identifier, so a task is recognised by its content: description,
//! category and priority. Two tasks that agree on all three are indistinguishable here, even
//! when their due dates or recurrence differ; reconciliation resolves such ties by document
//! order. Records that do carry an `id` are matched by it instead.

use std::fmt;

use uuid::Uuid;

use crate::task::Task;

/// Joins the fields of a composite key. U+001F (unit separator) never shows up in typed
/// descriptions or category names.
pub const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Stable(Uuid),
    Composite(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Stable(id) => write!(f, "id:{id}"),
            IdentityKey::Composite(key) => {
                f.write_str(&key.replace(KEY_SEPARATOR, " | "))
            }
        }
    }
}

/// `description`, `category` and `priority` joined by [`KEY_SEPARATOR`]; absent fields
/// contribute an empty string.
pub fn composite_key(task: &Task) -> String {
    let category = task.category.as_deref().unwrap_or_default();
    let priority = task.priority.as_str();

    let mut key =
        String::with_capacity(task.description.len() + category.len() + priority.len() + 2);
    key.push_str(&task.description);
    key.push(KEY_SEPARATOR);
    key.push_str(category);
    key.push(KEY_SEPARATOR);
    key.push_str(priority);
    key
}

pub fn identity_key(task: &Task) -> IdentityKey {
    match task.id {
        Some(id) => IdentityKey::Stable(id),
        None => IdentityKey::Composite(composite_key(task)),
    }
}
