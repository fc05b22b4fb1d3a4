//! Render-ready lists derived from the canonical sequence. Nothing here mutates task state.

use std::fmt;

use chrono::NaiveDate;
use tracing::trace;

use crate::category_order::{live_categories, merge};
use crate::task::{Priority, Task};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskFilter {
    #[default]
    All,
    Category(String),
    Priority(Priority),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Category(category) => task.category_name() == category.as_str(),
            TaskFilter::Priority(priority) => task.priority.normalized() == *priority,
        }
    }

    /// Parses one filter term: `cat:<name>`, `category:<name>`, `prio:<p>` or
    /// `priority:<p>`. An empty value selects everything. Returns `Ok(None)` for tokens
    /// that are not filter terms.
    pub fn parse_term(term: &str) -> anyhow::Result<Option<Self>> {
        let Some((key, value)) = term.split_once(':') else {
            return Ok(None);
        };

        let filter = match key {
            "cat" | "category" => {
                let value = value.trim();
                if value.is_empty() {
                    TaskFilter::All
                } else {
                    TaskFilter::Category(value.to_string())
                }
            }
            "prio" | "priority" => {
                if value.trim().is_empty() {
                    TaskFilter::All
                } else {
                    TaskFilter::Priority(value.parse()?)
                }
            }
            _ => return Ok(None),
        };
        trace!(term, ?filter, "parsed filter term");
        Ok(Some(filter))
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFilter::All => f.write_str("all"),
            TaskFilter::Category(category) => write!(f, "category {category}"),
            TaskFilter::Priority(Priority::None) => f.write_str("no priority"),
            TaskFilter::Priority(priority) => write!(f, "priority {priority}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Active,
    Done,
    Categories,
}

/// A task together with its 1-based position in the canonical sequence, which is how the
/// task service addresses it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Positioned<'a> {
    pub position: usize,
    pub task: &'a Task,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup<'a> {
    pub name: String,
    pub tasks: Vec<Positioned<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComposedView<'a> {
    Active(Vec<Positioned<'a>>),
    Done(&'a [Task]),
    Categories(Vec<CategoryGroup<'a>>),
}

pub fn positioned(tasks: &[Task]) -> impl Iterator<Item = Positioned<'_>> {
    tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| Positioned { position: idx + 1, task })
}

pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<Positioned<'a>> {
    positioned(tasks)
        .filter(|entry| filter.matches(entry.task))
        .collect()
}

/// Partitions `tasks` by display category, groups ordered by the stored order merged with
/// the live categories.
pub fn group_by_category<'a>(tasks: &'a [Task], stored_order: &[String]) -> Vec<CategoryGroup<'a>> {
    let order = merge(stored_order, &live_categories(tasks));
    order
        .into_iter()
        .map(|name| {
            let tasks = positioned(tasks)
                .filter(|entry| entry.task.category_name() == name)
                .collect();
            CategoryGroup { name, tasks }
        })
        .collect()
}

pub fn compose<'a>(
    tasks: &'a [Task],
    done: &'a [Task],
    stored_order: &[String],
    filter: &TaskFilter,
    mode: ViewMode,
) -> ComposedView<'a> {
    match mode {
        ViewMode::Active => ComposedView::Active(filter_tasks(tasks, filter)),
        ViewMode::Done => ComposedView::Done(done),
        ViewMode::Categories => ComposedView::Categories(group_by_category(tasks, stored_order)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub active: usize,
    pub urgent: usize,
    pub today: usize,
    pub overdue: usize,
    pub completed: usize,
}

pub fn stats(tasks: &[Task], done: &[Task], today: NaiveDate) -> Stats {
    Stats {
        active: tasks.len(),
        urgent: tasks.iter().filter(|t| t.priority.normalized() == Priority::Urgent).count(),
        today: tasks.iter().filter(|t| t.priority.normalized() == Priority::Today).count(),
        overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        completed: done.len(),
    }
}
