//! Optimistic mutation of the task list.
//!
//! [`AppState`] holds everything the views are computed from and exposes one entry point per
//! transition. [`Controller`] applies those transitions around calls to the task service:
//! local state changes first, then the request goes out, and a failure resynchronises from
//! the service instead of trying to undo the local change by hand.

use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiError, TaskApi};
use crate::category_order::{CategoryOrderStore, live_categories, merge};
use crate::input::QuickEntry;
use crate::reconcile::{SplicePolicy, move_item, reconcile_with};
use crate::task::Task;
use crate::view::{ComposedView, TaskFilter, ViewMode, compose, filter_tasks};
use crate::wire::{CreateTask, TaskPatch};

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("no task at position {position} (the list has {len})")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("nothing to add: the task description is empty")]
    EmptyInput,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A reorder that has been applied locally and still has to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReorder {
    pub seq: u64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderSettlement {
    Confirmed,
    /// The service refused the order; the active list has to be refetched. `superseded`
    /// counts the local mutations made after this reorder whose effect the refetch drops.
    Resync { superseded: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    tasks: Vec<Task>,
    done: Vec<Task>,
    category_order: Vec<String>,
    notice: Option<String>,
    seq: u64,
}

impl AppState {
    pub fn new(category_order: Vec<String>) -> Self {
        Self {
            category_order,
            ..Self::default()
        }
    }

    /// The canonical sequence, or its optimistic successor while a mutation is in flight.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn done(&self) -> &[Task] {
        &self.done
    }

    /// The category order as stored, stale entries included.
    pub fn category_order(&self) -> &[String] {
        &self.category_order
    }

    /// Stored order merged with the categories of the current tasks.
    pub fn categories(&self) -> Vec<String> {
        merge(&self.category_order, &live_categories(&self.tasks))
    }

    /// Last user-visible failure message.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Sequence number of the latest optimistic mutation.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn replace_done(&mut self, done: Vec<Task>) {
        self.done = done;
    }

    pub fn set_category_order(&mut self, order: Vec<String>) {
        self.category_order = order;
    }

    pub fn record_failure(&mut self, action: &str, err: &ApiError) {
        let message = format!("Failed to {action}: {err}");
        warn!(action, error = %err, "mutation failed");
        self.notice = Some(message);
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn index_of(&self, position: usize) -> Result<usize, MutationError> {
        if position == 0 || position > self.tasks.len() {
            return Err(MutationError::PositionOutOfRange {
                position,
                len: self.tasks.len(),
            });
        }
        Ok(position - 1)
    }

    pub fn apply_update(&mut self, position: usize, patch: &TaskPatch) -> Result<u64, MutationError> {
        let idx = self.index_of(position)?;
        patch.apply_to(&mut self.tasks[idx]);
        Ok(self.next_seq())
    }

    /// Replaces the optimistic record with the service's echo of it.
    pub fn confirm_update(&mut self, position: usize, task: Task) {
        match self.index_of(position) {
            Ok(idx) => self.tasks[idx] = task,
            Err(err) => debug!(error = %err, "update echo no longer has a slot"),
        }
    }

    pub fn apply_delete(&mut self, position: usize) -> Result<Task, MutationError> {
        let idx = self.index_of(position)?;
        let removed = self.tasks.remove(idx);
        self.next_seq();
        Ok(removed)
    }

    pub fn apply_mark_done(&mut self, position: usize) -> Result<u64, MutationError> {
        let idx = self.index_of(position)?;
        let task = self.tasks.remove(idx);
        self.done.push(task);
        Ok(self.next_seq())
    }

    /// Folds `reordered` into the task list and applies the result. `None` when the order
    /// would not change, which includes an empty list.
    pub fn begin_reorder(&mut self, reordered: &[Task], policy: SplicePolicy) -> Option<PendingReorder> {
        if self.tasks.is_empty() {
            return None;
        }

        let next = reconcile_with(&self.tasks, reordered, policy);
        if next == self.tasks {
            debug!("reorder leaves the list unchanged");
            return None;
        }

        self.tasks = next.clone();
        let seq = self.next_seq();
        debug!(seq, count = next.len(), "applied optimistic reorder");
        Some(PendingReorder { seq, tasks: next })
    }

    pub fn settle_reorder(
        &mut self,
        pending: &PendingReorder,
        outcome: &Result<(), ApiError>,
    ) -> ReorderSettlement {
        match outcome {
            Ok(()) => ReorderSettlement::Confirmed,
            Err(err) => {
                self.record_failure("reorder tasks", err);
                let superseded = self.seq.saturating_sub(pending.seq);
                if superseded > 0 {
                    warn!(
                        seq = pending.seq,
                        superseded, "late reorder failure; resync drops later local changes"
                    );
                }
                ReorderSettlement::Resync { superseded }
            }
        }
    }
}

pub struct Controller<A, S> {
    api: A,
    store: S,
    state: AppState,
    policy: SplicePolicy,
}

impl<A: TaskApi, S: CategoryOrderStore> Controller<A, S> {
    pub fn new(api: A, store: S, policy: SplicePolicy) -> Self {
        let order = store.load();
        debug!(categories = order.len(), ?policy, "loaded category order");
        Self {
            api,
            store,
            state: AppState::new(order),
            policy,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.state.take_notice()
    }

    pub fn view(&self, filter: &TaskFilter, mode: ViewMode) -> ComposedView<'_> {
        compose(
            self.state.tasks(),
            self.state.done(),
            self.state.category_order(),
            filter,
            mode,
        )
    }

    #[instrument(skip(self))]
    pub fn refresh(&mut self) -> Result<(), ApiError> {
        self.refresh_tasks()?;
        self.refresh_done()
    }

    pub fn refresh_tasks(&mut self) -> Result<(), ApiError> {
        let tasks = self.api.list_tasks()?;
        self.state.replace_tasks(tasks);
        Ok(())
    }

    pub fn refresh_done(&mut self) -> Result<(), ApiError> {
        let done = self.api.list_done()?;
        self.state.replace_done(done);
        Ok(())
    }

    fn resync_tasks(&mut self) {
        if let Err(err) = self.refresh_tasks() {
            error!(error = %err, "failed to refetch active tasks");
        }
    }

    fn resync_done(&mut self) {
        if let Err(err) = self.refresh_done() {
            error!(error = %err, "failed to refetch completed tasks");
        }
    }

    /// Creates a task and refetches the list, so parsing and defaults stay the service's.
    #[instrument(skip(self, request), fields(summary = %request.summary()))]
    pub fn add(&mut self, request: &CreateTask) -> Result<Task, MutationError> {
        match self.api.create(request) {
            Ok(task) => {
                info!(description = %task.description, "task created");
                self.resync_tasks();
                Ok(task)
            }
            Err(err) => {
                self.state.record_failure("add task", &err);
                Err(err.into())
            }
        }
    }

    pub fn add_quick(&mut self, entry: &QuickEntry) -> Result<Task, MutationError> {
        let request = entry.to_request().ok_or(MutationError::EmptyInput)?;
        self.add(&request)
    }

    #[instrument(skip(self, patch))]
    pub fn update(&mut self, position: usize, patch: &TaskPatch) -> Result<(), MutationError> {
        let seq = self.state.apply_update(position, patch)?;
        debug!(seq, "applied optimistic update");

        match self.api.update(position, patch) {
            Ok(task) => {
                self.state.confirm_update(position, task);
                Ok(())
            }
            Err(err) => {
                self.state.record_failure("update task", &err);
                self.resync_tasks();
                Err(err.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, position: usize) -> Result<(), MutationError> {
        let removed = self.state.apply_delete(position)?;
        debug!(description = %removed.description, "applied optimistic delete");

        if let Err(err) = self.api.delete(position) {
            self.state.record_failure("delete task", &err);
            self.resync_tasks();
            return Err(err.into());
        }
        Ok(())
    }

    /// Moves the task to the completed list; both lists are refetched either way.
    #[instrument(skip(self))]
    pub fn mark_done(&mut self, position: usize) -> Result<(), MutationError> {
        self.state.apply_mark_done(position)?;

        let outcome = self.api.mark_done(position);
        if let Err(err) = &outcome {
            self.state.record_failure("mark task done", err);
        }
        self.resync_tasks();
        self.resync_done();
        outcome.map_err(MutationError::from)
    }

    pub fn begin_reorder(&mut self, reordered: &[Task]) -> Option<PendingReorder> {
        self.state.begin_reorder(reordered, self.policy)
    }

    /// Sends a reorder started with [`Controller::begin_reorder`]. On failure the local order
    /// is discarded in favour of a refetch.
    #[instrument(skip(self, pending), fields(seq = pending.seq))]
    pub fn send_reorder(&mut self, pending: PendingReorder) -> Result<(), MutationError> {
        let outcome = self.api.reorder(&pending.tasks);
        match self.state.settle_reorder(&pending, &outcome) {
            ReorderSettlement::Confirmed => {
                debug!("reorder accepted");
            }
            ReorderSettlement::Resync { .. } => self.resync_tasks(),
        }
        outcome.map_err(MutationError::from)
    }

    /// Applies a new order for a slice of the list. Returns `false` when nothing changed and
    /// no request was sent.
    pub fn reorder(&mut self, reordered: &[Task]) -> Result<bool, MutationError> {
        match self.begin_reorder(reordered) {
            Some(pending) => self.send_reorder(pending).map(|()| true),
            None => Ok(false),
        }
    }

    /// Drag-end of the filtered list: moves view slot `from` to slot `to` (both 1-based
    /// within the view) and reorders.
    #[instrument(skip(self))]
    pub fn move_in_view(&mut self, filter: &TaskFilter, from: usize, to: usize) -> Result<bool, MutationError> {
        let mut slice: Vec<Task> = filter_tasks(self.state.tasks(), filter)
            .into_iter()
            .map(|entry| entry.task.clone())
            .collect();

        let len = slice.len();
        let moved = from > 0 && to > 0 && move_item(&mut slice, from - 1, to - 1);
        if !moved {
            let position = if from == 0 || from > len { from } else { to };
            return Err(MutationError::PositionOutOfRange { position, len });
        }

        self.reorder(&slice)
    }

    pub fn set_category_order(&mut self, order: Vec<String>) {
        self.store.save(&order);
        self.state.set_category_order(order);
    }

    /// Drag-end of the category sections: moves section `from` to `to` (1-based) in the
    /// displayed order and stores the whole displayed order.
    #[instrument(skip(self))]
    pub fn move_category(&mut self, from: usize, to: usize) -> Result<Vec<String>, MutationError> {
        let mut order = self.state.categories();
        let len = order.len();
        let moved = from > 0 && to > 0 && move_item(&mut order, from - 1, to - 1);
        if !moved {
            let position = if from == 0 || from > len { from } else { to };
            return Err(MutationError::PositionOutOfRange { position, len });
        }

        info!(order = ?order, "category order changed");
        self.set_category_order(order.clone());
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, MutationError, ReorderSettlement};
    use crate::api::ApiError;
    use crate::reconcile::SplicePolicy;
    use crate::task::{Priority, Task};
    use crate::wire::TaskPatch;

    fn state_with(names: &[&str]) -> AppState {
        let mut state = AppState::new(Vec::new());
        state.replace_tasks(names.iter().map(|name| Task::new(*name)).collect());
        state
    }

    fn descriptions(state: &AppState) -> Vec<&str> {
        state.tasks().iter().map(|t| t.description.as_str()).collect()
    }

    fn rejected() -> ApiError {
        ApiError::Rejected {
            status: 500,
            message: "disk full".to_string(),
        }
    }

    #[test]
    fn reorder_is_applied_before_it_is_sent() {
        let mut state = state_with(&["a", "b", "c", "d"]);

        let pending = state
            .begin_reorder(&[Task::new("c"), Task::new("a")], SplicePolicy::Front)
            .expect("order changes");
        assert_eq!(descriptions(&state), vec!["c", "a", "b", "d"]);
        assert_eq!(pending.tasks, state.tasks());
        assert_eq!(pending.seq, 1);

        assert_eq!(state.settle_reorder(&pending, &Ok(())), ReorderSettlement::Confirmed);
        assert_eq!(state.notice(), None);
    }

    #[test]
    fn unchanged_or_empty_reorder_is_skipped() {
        let mut state = state_with(&["a", "b"]);
        assert!(state.begin_reorder(&[Task::new("a")], SplicePolicy::Front).is_none());
        assert_eq!(state.seq(), 0);

        let mut empty = AppState::default();
        assert!(empty.begin_reorder(&[], SplicePolicy::Front).is_none());
    }

    #[test]
    fn late_failure_reports_superseded_gestures() {
        let mut state = state_with(&["a", "b", "c"]);

        let first = state
            .begin_reorder(&[Task::new("c")], SplicePolicy::Front)
            .expect("first gesture");
        let second = state
            .begin_reorder(&[Task::new("b"), Task::new("c")], SplicePolicy::Front)
            .expect("second gesture");
        assert_eq!(descriptions(&state), vec!["b", "c", "a"]);
        assert_eq!(second.seq, 2);

        let settlement = state.settle_reorder(&first, &Err(rejected()));
        assert_eq!(settlement, ReorderSettlement::Resync { superseded: 1 });
        assert_eq!(state.take_notice().as_deref(), Some("Failed to reorder tasks: disk full"));
    }

    #[test]
    fn update_delete_and_done_address_by_position() {
        let mut state = state_with(&["a", "b", "c"]);

        let patch = TaskPatch {
            priority: Some(Priority::Urgent),
            ..TaskPatch::default()
        };
        state.apply_update(2, &patch).expect("update");
        assert_eq!(state.tasks()[1].priority, Priority::Urgent);

        let removed = state.apply_delete(1).expect("delete");
        assert_eq!(removed.description, "a");
        assert_eq!(descriptions(&state), vec!["b", "c"]);

        state.apply_mark_done(2).expect("done");
        assert_eq!(descriptions(&state), vec!["b"]);
        assert_eq!(state.done()[0].description, "c");
        assert_eq!(state.seq(), 3);
    }

    #[test]
    fn out_of_range_positions_are_rejected_without_changes() {
        let mut state = state_with(&["a"]);

        for position in [0, 2] {
            let err = state.apply_delete(position).expect_err("out of range");
            assert!(matches!(
                err,
                MutationError::PositionOutOfRange { len: 1, .. }
            ));
        }
        assert_eq!(descriptions(&state), vec!["a"]);
        assert_eq!(state.seq(), 0);
    }

    #[test]
    fn categories_merge_stored_order_with_live_ones() {
        let mut state = AppState::new(vec!["work".to_string(), "old".to_string()]);
        state.replace_tasks(vec![
            Task::new("a").with_category("home"),
            Task::new("b").with_category("work"),
        ]);

        assert_eq!(state.categories(), vec!["work".to_string(), "home".to_string()]);
        assert_eq!(state.category_order().len(), 2);
    }
}
