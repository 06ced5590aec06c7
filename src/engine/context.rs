//! Request-scoped context handed to inbound request handlers

use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use crate::engine::Engine;
use crate::engine::options::{NotificationOptions, RequestOptions};
use crate::error::Error;
use crate::transport::TransportSender;
use crate::types::{
    elicitation::{self, ElicitRequestParams, ElicitResult},
    sampling::{self, CreateMessageRequestParams, CreateMessageResult},
    Cursor, ListTasksResult, ProgressToken, RelatedTaskMetadata, Request,
    RequestId, Task, TaskMetadata, TaskStatus
};

/// Represents the context of one inbound request: its cancellation scope,
/// the transport it arrived on, and the task it belongs to, if any.
///
/// Every request or notification sent through the context of a task-bound
/// request is automatically tagged with the owning task, so the requestor
/// can always trace a side-channel message back to its task.
#[derive(Clone)]
pub struct Context {
    pub(crate) engine: Engine,
    pub(crate) req_id: RequestId,
    pub(crate) token: CancellationToken,
    pub(crate) sender: Arc<dyn TransportSender>,
    pub(crate) task: Option<RelatedTaskMetadata>,
    pub(crate) progress_token: Option<ProgressToken>,
}

impl Context {
    /// The ID of the request this context belongs to
    #[inline]
    pub fn id(&self) -> &RequestId {
        &self.req_id
    }

    /// The task this request belongs to, if any
    #[inline]
    pub fn task(&self) -> Option<&RelatedTaskMetadata> {
        self.task.as_ref()
    }

    /// The engine that dispatched this request
    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a [`Future`] that gets fulfilled when the request is cancelled.
    ///
    /// Cancellation is cooperative: long-running handlers should observe this
    /// signal and return promptly.
    #[inline]
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Returns `true` once the request has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sends a request to the remote peer from within this handler.
    ///
    /// When the handler runs on behalf of a task, the request is tagged with
    /// the owning task and delivered through the requestor's blocked
    /// `tasks/result` call, in issuance order.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        mut options: RequestOptions,
    ) -> Result<T, Error> {
        match &self.task {
            Some(related) if self.engine.is_task_tracked(&related.id) => {
                self.engine
                    .send_queued_request(&related.id, method, params, options)
                    .await?
                    .into_result()
            }
            _ => {
                if options.related_task.is_none() {
                    options.related_task = self.task.clone();
                }
                self.engine
                    .send_request(method, params, options)
                    .await?
                    .into_result()
            }
        }
    }

    /// Sends a notification to the remote peer, tagged with the owning task
    /// when this handler runs on behalf of one
    pub async fn notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), Error> {
        let mut options = NotificationOptions::new()
            .with_related_request(self.req_id.clone());
        options.related_task = self.task.clone();
        self.engine.notification(method, params, options).await
    }

    /// Reports progress of this request, echoing the requestor's progress token.
    ///
    /// Does nothing when the request carried no token.
    pub async fn progress(&self, progress: f64, total: Option<f64>) -> Result<(), Error> {
        let Some(token) = &self.progress_token else {
            return Ok(());
        };
        let params = token.notify(progress, total);
        self.engine
            .notification(
                crate::types::notification::commands::PROGRESS,
                serde_json::to_value(params).ok(),
                NotificationOptions::new().with_related_request(self.req_id.clone()))
            .await
    }

    /// Sends an elicitation request to the remote peer.
    ///
    /// A task-bound handler is moved to `input_required` for the duration of
    /// the request and back to `working` on its resolution.
    pub async fn elicit(&self, params: ElicitRequestParams) -> Result<ElicitResult, Error> {
        self.side_channel(elicitation::commands::CREATE, params).await
    }

    /// Sends a sampling request to the remote peer.
    ///
    /// A task-bound handler is moved to `input_required` for the duration of
    /// the request and back to `working` on its resolution.
    pub async fn sample(&self, params: CreateMessageRequestParams) -> Result<CreateMessageResult, Error> {
        self.side_channel(sampling::commands::CREATE, params).await
    }

    async fn side_channel<P, T>(&self, method: &str, params: P) -> Result<T, Error>
    where
        P: serde::Serialize,
        T: DeserializeOwned,
    {
        let task_id = self.task.as_ref().map(|related| related.id.clone());

        if let Some(id) = &task_id {
            self.engine
                .update_task_status(id, TaskStatus::InputRequired, None)
                .await?;
        }

        let result = self
            .request(method, serde_json::to_value(params).ok(), RequestOptions::new())
            .await;

        if let (Some(id), Ok(_)) = (&task_id, &result) {
            self.engine
                .update_task_status(id, TaskStatus::Working, None)
                .await?;
        }
        result
    }

    /// Creates a task for `original_request` without going through
    /// the engine's automatic promotion
    pub async fn create_task(
        &self,
        params: &TaskMetadata,
        original_request: &Request,
    ) -> Result<Task, Error> {
        self.engine.create_task(params, original_request).await
    }

    /// Reads a task snapshot
    pub async fn get_task(&self, task_id: &str) -> Result<Task, Error> {
        self.engine.get_task(task_id).await
    }

    /// Moves a task into `status`, notifying the remote peer
    pub async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: Option<&str>,
    ) -> Result<Task, Error> {
        self.engine.update_task_status(task_id, status, message).await
    }

    /// Stores the task result, transitioning into the terminal `status`
    pub async fn store_task_result(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Value,
    ) -> Result<Task, Error> {
        self.engine.store_task_result(task_id, status, result).await
    }

    /// Retrieves the stored result of a task
    pub async fn get_task_result(&self, task_id: &str) -> Result<Value, Error> {
        self.engine.get_task_result(task_id).await
    }

    /// Pages through the tasks known to the local store
    pub async fn list_tasks(&self, cursor: Option<Cursor>) -> Result<ListTasksResult, Error> {
        self.engine.list_local_tasks(cursor).await
    }

    /// Cancels a task, dropping its queued side-channel messages
    pub async fn cancel_task(&self, task_id: &str, reason: &str) -> Result<Task, Error> {
        self.engine.cancel_task(task_id, reason).await
    }
}
