//! Task-based execution: the "call now, fetch later" pattern
//!
//! A request augmented with task metadata is promoted to a durable [`Task`]
//! held in a [`TaskStore`]. The requestor polls `tasks/get`, blocks on
//! `tasks/result` and cancels via `tasks/cancel`; the engine moves the task
//! through **submitted → working ↔ input_required → {completed, failed,
//! cancelled}** and emits a `notifications/tasks/status` per transition.

use async_trait::async_trait;
use serde_json::Value;
use crate::error::Error;
use crate::types::{
    Cursor, ListTasksResult, Request, RequestId, Task, TaskMetadata, TaskStatus
};

pub use store::InMemoryTaskStore;
pub(crate) use controller::TaskController;

pub mod store;
mod controller;

/// Durable storage of task state, results and per-task pagination.
///
/// Implementations MUST keep per-task operations atomic: a status write
/// re-reads the stored status and rejects transitions out of a terminal
/// state. They MAY partition tasks by `session_id` for multi-tenant
/// deployments; single-tenant stores are free to ignore it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Creates a new task for `original_request`.
    ///
    /// The store generates the task ID and `created_at`, and MAY clamp the
    /// requested TTL to a configured maximum; the effective value is the one
    /// returned in the task record.
    async fn create_task(
        &self,
        params: &TaskMetadata,
        request_id: &RequestId,
        original_request: &Request,
        session_id: Option<&str>,
    ) -> Result<Task, Error>;

    /// Reads a task snapshot; `None` when the task does not exist
    async fn get_task(
        &self,
        task_id: &str,
        session_id: Option<&str>,
    ) -> Result<Option<Task>, Error>;

    /// Stores the task result, transitioning into the terminal `status` of
    /// the caller's choice (`completed` or `failed`)
    async fn store_task_result(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Value,
        session_id: Option<&str>,
    ) -> Result<Task, Error>;

    /// Retrieves the stored result of a task
    async fn get_task_result(
        &self,
        task_id: &str,
        session_id: Option<&str>,
    ) -> Result<Value, Error>;

    /// Updates a task's status.
    ///
    /// MUST reject transitions from terminal states.
    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        status_message: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Task, Error>;

    /// Pages through tasks using an opaque cursor
    async fn list_tasks(
        &self,
        cursor: Option<Cursor>,
        session_id: Option<&str>,
    ) -> Result<ListTasksResult, Error>;

    /// Removes a task from the store
    async fn delete_task(
        &self,
        task_id: &str,
        session_id: Option<&str>,
    ) -> Result<(), Error>;
}
