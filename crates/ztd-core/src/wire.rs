//! Request and response bodies of the task service.

use serde::{Deserialize, Serialize};

use crate::task::{Priority, Recurrence, Task};

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CreateTask {
    /// Free text for the backend's parser, e.g. `email boss @work !urgent ~daily ^tomorrow`.
    Input { input: String },
    Structured(NewTask),
}

impl CreateTask {
    pub fn input(text: impl Into<String>) -> Self {
        CreateTask::Input { input: text.into() }
    }

    pub fn summary(&self) -> &str {
        match self {
            CreateTask::Input { input } => input,
            CreateTask::Structured(task) => &task.description,
        }
    }
}

/// Structured creation. The backend strips every field, so absent values go out as `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewTask {
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub recurring: Recurrence,
    pub due: String,
}

/// Body of `PUT /tasks/{position}`. Only present fields are changed; an empty string clears
/// a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    /// The local, optimistic version of the update. The backend may normalise the due date;
    /// its echo replaces this result once it arrives.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(category) = &self.category {
            task.category = (!category.is_empty()).then(|| category.clone());
        }
        if let Some(priority) = &self.priority {
            task.priority = priority.clone();
        }
        if let Some(recurring) = &self.recurring {
            task.recurring = recurring.clone();
        }
        if let Some(due) = &self.due {
            task.due = (!due.is_empty()).then(|| due.clone());
        }
    }
}

/// Body of `POST /tasks/reorder`.
#[derive(Debug, Serialize)]
pub struct ReorderRequest<'a> {
    pub tasks: &'a [Task],
}

/// Error payload of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
