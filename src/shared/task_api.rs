//! Utilities and types for following task-augmented requests

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use crate::engine::{options::RequestOptions, Engine};
use crate::error::{Error, ErrorCode};
use crate::shared::Either;
use crate::types::{
    task::{commands, CancelTaskRequestParams, GetTaskPayloadRequestParams, GetTaskRequestParams, ListTasksRequestParams},
    CreateTaskResult, Cursor, ListTasksResult, Task, TaskStatus
};

const DEFAULT_POLL_INTERVAL: u64 = 5000; // 5 seconds

// tasks/result legitimately blocks until the task turns terminal, which can
// take far longer than an ordinary request
const RESULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// A trait for requestor types that can follow a remote task
pub trait TaskApi {
    /// Retrieves a task snapshot from the receiving peer
    fn get_task(&self, id: &str) -> impl Future<Output = Result<Task, Error>> + Send;

    /// Retrieves the task result. If the task is not terminal yet, blocks
    /// until it completes or is cancelled.
    fn get_task_result<T: DeserializeOwned>(&self, id: &str) -> impl Future<Output = Result<T, Error>> + Send;

    /// Cancels a task running on the receiving peer
    fn cancel_task(&self, id: &str) -> impl Future<Output = Result<Task, Error>> + Send;

    /// Retrieves a page of tasks from the receiving peer
    fn list_tasks(&self, cursor: Option<Cursor>) -> impl Future<Output = Result<ListTasksResult, Error>> + Send;
}

impl TaskApi for Engine {
    fn get_task(&self, id: &str) -> impl Future<Output = Result<Task, Error>> + Send {
        let params = GetTaskRequestParams { id: id.into() };
        async move {
            self.request(
                commands::GET,
                serde_json::to_value(params).ok(),
                RequestOptions::new())
                .await
        }
    }

    fn get_task_result<T: DeserializeOwned>(&self, id: &str) -> impl Future<Output = Result<T, Error>> + Send {
        let params = GetTaskPayloadRequestParams { id: id.into() };
        async move {
            self.request(
                commands::RESULT,
                serde_json::to_value(params).ok(),
                RequestOptions::new().with_timeout(RESULT_TIMEOUT))
                .await
        }
    }

    fn cancel_task(&self, id: &str) -> impl Future<Output = Result<Task, Error>> + Send {
        let params = CancelTaskRequestParams { id: id.into() };
        async move {
            self.request(
                commands::CANCEL,
                serde_json::to_value(params).ok(),
                RequestOptions::new())
                .await
        }
    }

    fn list_tasks(&self, cursor: Option<Cursor>) -> impl Future<Output = Result<ListTasksResult, Error>> + Send {
        let params = ListTasksRequestParams { cursor };
        async move {
            self.request(
                commands::LIST,
                serde_json::to_value(params).ok(),
                RequestOptions::new())
                .await
        }
    }
}

/// Follows a task-augmented request to its value.
///
/// A direct result is returned as-is. A task record is polled with
/// `tasks/get` at the task's suggested cadence; once the task needs input
/// or turns terminal the payload is fetched through `tasks/result`, which
/// blocks for completion and receives queued side-channel messages. A task
/// that outlives its TTL is cancelled.
///
/// `on_status` fires for every observed snapshot.
pub async fn wait_to_completion<A, T, F>(
    api: &A,
    outcome: Either<CreateTaskResult, T>,
    mut on_status: F,
) -> Result<T, Error>
where
    A: TaskApi + Sync,
    T: DeserializeOwned,
    F: FnMut(&Task) + Send,
{
    let mut task = match outcome {
        Either::Right(result) => return Ok(result),
        Either::Left(ack) => ack.task,
    };

    let mut elapsed: u64 = 0;
    loop {
        on_status(&task);
        match task.status {
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::InputRequired => {
                // for a non-terminal task this blocks until it turns
                // terminal, delivering side-channel requests meanwhile
                return api.get_task_result(&task.id).await;
            }
            TaskStatus::Cancelled => {
                return Err(Error::new(ErrorCode::InvalidRequest, "Task was cancelled"));
            }
            TaskStatus::Submitted | TaskStatus::Working => {
                if let Some(ttl) = task.ttl {
                    if elapsed >= ttl {
                        #[cfg(feature = "tracing")]
                        tracing::trace!(logger = "tyne", "Task TTL expired. Cancelling task.");

                        let _ = api.cancel_task(&task.id).await?;
                        return Err(Error::new(
                            ErrorCode::InvalidRequest,
                            "Task was cancelled: TTL expired"));
                    }
                }

                let poll = task.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
                tokio::time::sleep(Duration::from_millis(poll)).await;
                elapsed += poll;

                task = api.get_task(&task.id).await?;
            }
        }
    }
}
