use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::task::Task;
use crate::wire::{CreateTask, ErrorBody, ReorderRequest, TaskPatch};

pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never reached the service or was never answered.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    /// Non-2xx response; `message` is the service's `{error}` text when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The task service, addressed the way its REST contract does: the active list is ordered,
/// and single tasks are named by their 1-based position in it.
pub trait TaskApi {
    fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;

    fn list_done(&self) -> Result<Vec<Task>, ApiError>;

    fn create(&self, request: &CreateTask) -> Result<Task, ApiError>;

    fn update(&self, position: usize, patch: &TaskPatch) -> Result<Task, ApiError>;

    fn delete(&self, position: usize) -> Result<(), ApiError>;

    fn mark_done(&self, position: usize) -> Result<(), ApiError>;

    /// Replaces the stored order with `tasks`.
    fn reorder(&self, tasks: &[Task]) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        debug!(base_url = %base_url, ?timeout, "configured task service client");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().map_err(|err| ApiError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("Server error: {}", status.as_u16()));
        warn!(url, status = status.as_u16(), message = %message, "task service rejected request");
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
        response.json::<T>().map_err(|err| ApiError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

impl TaskApi for HttpTaskApi {
    #[instrument(skip(self))]
    fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let url = self.url("/tasks");
        let response = self.send(&url, self.client.get(&url))?;
        let tasks: Vec<Task> = Self::decode(&url, response)?;
        debug!(count = tasks.len(), "fetched active tasks");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    fn list_done(&self) -> Result<Vec<Task>, ApiError> {
        let url = self.url("/tasks/done");
        let response = self.send(&url, self.client.get(&url))?;
        let tasks: Vec<Task> = Self::decode(&url, response)?;
        debug!(count = tasks.len(), "fetched completed tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, request), fields(summary = %request.summary()))]
    fn create(&self, request: &CreateTask) -> Result<Task, ApiError> {
        let url = self.url("/tasks");
        let response = self.send(&url, self.client.post(&url).json(request))?;
        Self::decode(&url, response)
    }

    #[instrument(skip(self, patch))]
    fn update(&self, position: usize, patch: &TaskPatch) -> Result<Task, ApiError> {
        let url = self.url(&format!("/tasks/{position}"));
        let response = self.send(&url, self.client.put(&url).json(patch))?;
        Self::decode(&url, response)
    }

    #[instrument(skip(self))]
    fn delete(&self, position: usize) -> Result<(), ApiError> {
        let url = self.url(&format!("/tasks/{position}"));
        self.send(&url, self.client.delete(&url))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn mark_done(&self, position: usize) -> Result<(), ApiError> {
        let url = self.url(&format!("/tasks/{position}/done"));
        self.send(&url, self.client.post(&url))?;
        Ok(())
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    fn reorder(&self, tasks: &[Task]) -> Result<(), ApiError> {
        let url = self.url("/tasks/reorder");
        let body = ReorderRequest { tasks };
        self.send(&url, self.client.post(&url).json(&body))?;
        Ok(())
    }
}
