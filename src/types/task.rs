//! Types and utilities for task-augmented requests and responses

use std::ops::{Deref, DerefMut};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use chrono::{DateTime, Utc};
use serde_json::Value;
use crate::{
    types::{Cursor, IntoResponse, Page, RequestId, Response},
    error::{Error, ErrorCode}
};

pub(crate) const RELATED_TASK_KEY: &str = "io.modelcontextprotocol/related-task";

/// List of commands for Tasks
pub mod commands {
    /// Command name that returns a list of tasks that are currently known to the receiver.
    pub const LIST: &str = "tasks/list";

    /// Command name that cancels a task on the receiver.
    pub const CANCEL: &str = "tasks/cancel";

    /// Command name that returns the result of a task.
    pub const RESULT: &str = "tasks/result";

    /// Command name that returns the status of a task.
    pub const GET: &str = "tasks/get";

    /// Notification name that notifies the requestor about the status of a task.
    pub const STATUS: &str = "notifications/tasks/status";
}

/// Represents the status of a task.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Task has been received but work has not started yet.
    #[default]
    #[serde(rename = "submitted")]
    Submitted,

    /// Task is currently running.
    #[serde(rename = "working")]
    Working,

    /// Task requires an input to proceed.
    #[serde(rename = "input_required")]
    InputRequired,

    /// Task has completed successfully.
    #[serde(rename = "completed")]
    Completed,

    /// Task has failed.
    #[serde(rename = "failed")]
    Failed,

    /// Task has been cancelled.
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for `completed`, `failed` and `cancelled`.
    /// No status or result change is permitted once a task is terminal.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Represents a task. Tasks are durable state machines that carry information
/// about the underlying execution state of the request they wrap, and are intended for requestor
/// polling and deferred result retrieval.
///
/// Each task is uniquely identifiable by a receiver-generated **task ID**.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// The task identifier.
    #[serde(rename = "taskId")]
    pub id: String,

    /// ISO 8601 timestamp when the task was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// ISO 8601 timestamp when the task was last updated.
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: DateTime<Utc>,

    /// Time To Live: actual retention duration from creation in milliseconds, `None` for unlimited.
    pub ttl: Option<u64>,

    /// Current task state.
    pub status: TaskStatus,

    /// Optional human-readable message describing the current task state.
    /// This can provide context for any status, including
    /// - Reasons for `cancelled` status
    /// - Summaries for `completed` status
    /// - Diagnostic information for `failed` status (e.g., error details, what went wrong)
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_msg: Option<String>,

    /// Suggested polling interval in milliseconds.
    #[serde(rename = "pollInterval", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

/// Represents metadata for augmenting a request with a task execution.
/// Included as the top-level `task` field of the request parameters.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Time To Live: requested duration in milliseconds to retain the task from creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Requested polling interval in milliseconds.
    // `pollFrequency` is the earlier spelling of this field
    #[serde(rename = "pollInterval", alias = "pollFrequency", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

/// Represents metadata for associating messages with a task.
/// Included in the `_meta` field under the key `io.modelcontextprotocol/related-task`.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RelatedTaskMetadata {
    /// The task identifier this message is associated with.
    #[serde(rename = "taskId")]
    pub id: String,
}

/// Represents the immediate response to a task-augmented request.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResult {
    /// Newly created task information
    pub task: Task,

    /// Metadata reserved by MCP for protocol-level metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Represents a request to retrieve a list of tasks.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksRequestParams {
    /// An opaque token representing the current pagination position.
    /// If provided, the receiver should return results starting after this cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// Represents the response to a `tasks/list` request.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResult {
    /// A list of tasks known to the receiver.
    pub tasks: Vec<Task>,

    /// An opaque token representing the pagination position after the last returned result.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// Represents a request to retrieve the state of a task.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskRequestParams {
    /// The task identifier to retrieve the state for.
    #[serde(rename = "taskId")]
    pub id: String
}

/// Represents a request to retrieve the result of a completed task.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskPayloadRequestParams {
    /// The task identifier to retrieve the result for.
    #[serde(rename = "taskId")]
    pub id: String
}

/// Represents a request to cancel a task.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskRequestParams {
    /// The task identifier to cancel.
    #[serde(rename = "taskId")]
    pub id: String
}

/// Represents the response to a `tasks/result` request.
/// The inner `Value` matches the result type of the original request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload(pub Value);

impl Deref for TaskPayload {
    type Target = Value;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TaskPayload {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Default for Task {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Task {
    /// Creates a new [`Task`] in `submitted` status with unlimited TTL.
    #[inline]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            last_updated_at: now,
            ttl: None,
            status: TaskStatus::Submitted,
            status_msg: None,
            poll_interval: None,
        }
    }

    /// Creates a new [`Task`] from the requested augmentation metadata.
    #[inline]
    pub fn from_metadata(meta: &TaskMetadata) -> Self {
        let mut task = Self::new();
        task.ttl = meta.ttl;
        task.poll_interval = meta.poll_interval;
        task
    }

    /// Moves the task into `status`.
    ///
    /// Transitions out of a terminal state are forbidden and return `InvalidRequest`.
    pub fn transition(&mut self, status: TaskStatus, msg: Option<&str>) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Task {} is already {:?} and cannot change status", self.id, self.status)));
        }
        self.status = status;
        self.status_msg = msg.map(Into::into);
        self.last_updated_at = Utc::now();
        Ok(())
    }
}

impl TaskPayload {
    /// Unwraps the inner `Value`.
    #[inline]
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Unwraps the inner `T`
    #[inline]
    pub fn to<T: DeserializeOwned>(self) -> Result<T, Error> {
        serde_json::from_value::<T>(self.0)
            .map_err(Error::from)
    }
}

impl<T: Into<String>> From<T> for RelatedTaskMetadata {
    #[inline]
    fn from(value: T) -> Self {
        Self { id: value.into() }
    }
}

impl CreateTaskResult {
    /// Creates a new [`CreateTaskResult`]
    pub fn new(task: Task) -> Self {
        Self { task, meta: None }
    }
}

impl IntoResponse for Task {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}

impl IntoResponse for TaskPayload {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        self.0.into_response(req_id)
    }
}

impl IntoResponse for CreateTaskResult {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}

impl IntoResponse for ListTasksResult {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}

impl From<Vec<Task>> for ListTasksResult {
    #[inline]
    fn from(tasks: Vec<Task>) -> Self {
        Self {
            next_cursor: None,
            tasks
        }
    }
}

impl From<Page<'_, Task>> for ListTasksResult {
    #[inline]
    fn from(page: Page<'_, Task>) -> Self {
        Self {
            next_cursor: page.next_cursor,
            tasks: page.items.to_vec()
        }
    }
}
