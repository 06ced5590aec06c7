//! Utilities for tracking outbound requests

use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::{oneshot, Notify};
use crate::error::{Error, ErrorCode};
use crate::types::{
    notification::ProgressNotificationParams,
    ProgressToken, RequestId, Response
};

pub(crate) use crate::types::progress::ProgressHandler as ProgressCallback;

/// Represents a pending outbound request
pub(crate) struct RequestHandle {
    sender: oneshot::Sender<Response>,
    progress: Option<ProgressCallback>,
    progress_signal: Arc<Notify>,
    task_id: Option<String>,
}

/// Represents a request tracking "queue" that holds the resolvers of requests
/// awaiting responses, keyed by request ID.
#[derive(Default, Clone)]
pub(crate) struct RequestQueue {
    pending: Arc<DashMap<RequestId, RequestHandle>>
}

impl RequestHandle {
    /// Resolves the pending request with a [`Response`]
    pub(crate) fn send(self, resp: Response) {
        match self.sender.send(resp) {
            Ok(_) => (),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    logger = "tyne",
                    "A response arrived after the waiter was dropped: {:?}", _err.id);
            }
        };
    }

    /// Returns the ID of the task this request was promoted to, if any
    pub(crate) fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }
}

impl RequestQueue {
    /// Registers a pending request and returns the response receiver together
    /// with the signal fired whenever a progress notification is routed to it.
    pub(crate) fn push(
        &self,
        id: &RequestId,
        progress: Option<ProgressCallback>,
    ) -> (oneshot::Receiver<Response>, Arc<Notify>) {
        let (sender, receiver) = oneshot::channel();
        let progress_signal = Arc::new(Notify::new());

        self.pending.insert(id.clone(), RequestHandle {
            sender,
            progress,
            progress_signal: progress_signal.clone(),
            task_id: None,
        });

        (receiver, progress_signal)
    }

    /// Binds the pending request to a task so a cancelled task can fail its side channels
    pub(crate) fn bind_task(&self, id: &RequestId, task_id: &str) {
        if let Some(mut handle) = self.pending.get_mut(id) {
            handle.task_id = Some(task_id.into());
        }
    }

    /// Pops the [`RequestHandle`] by [`RequestId`] and removes it from the queue
    #[inline]
    pub(crate) fn pop(&self, id: &RequestId) -> Option<RequestHandle> {
        self.pending
            .remove(id)
            .map(|(_, handle)| handle)
    }

    /// Takes a [`Response`] and completes the request if it is still pending.
    ///
    /// Returns `false` when no waiter is registered for the response ID.
    pub(crate) fn complete(&self, resp: Response) -> bool {
        match self.pop(&resp.id) {
            Some(handle) => {
                handle.send(resp);
                true
            }
            None => false,
        }
    }

    /// Routes a progress notification to the waiter registered with the token.
    ///
    /// Fires the progress callback and pokes the timeout reset signal.
    /// Returns `false` when no waiter is registered for the token.
    pub(crate) fn notify_progress(&self, params: ProgressNotificationParams) -> bool {
        let id = match &params.progress_token {
            ProgressToken::Number(n) => RequestId::Number(*n),
            ProgressToken::String(s) => RequestId::String(s.clone()),
        };
        match self.pending.get(&id) {
            Some(handle) => {
                if let Some(callback) = &handle.progress {
                    callback(params);
                }
                // notify_one stores a permit, so a reset between two waiter
                // polls is never lost
                handle.progress_signal.notify_one();
                true
            }
            None => false,
        }
    }

    /// Completes every pending request with `ConnectionClosed`.
    ///
    /// Each waiter is signalled exactly once; the queue is left empty.
    pub(crate) fn drain(&self) {
        let ids = self
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();

        for id in ids {
            if let Some(handle) = self.pop(&id) {
                handle.send(Response::error(
                    id,
                    Error::new(ErrorCode::ConnectionClosed, "Connection closed")));
            }
        }
    }

    /// Returns the number of requests awaiting responses
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
