//! Session-side bookkeeping for live tasks

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use crate::error::{Error, ErrorCode};
use crate::tasks::TaskStore;
use crate::types::Message;

/// Tracks the tasks created on this session: their cancellation tokens,
/// status wakeup signals and the queue of side-channel messages awaiting
/// delivery through a blocked `tasks/result` call.
///
/// Durable state lives in the [`TaskStore`]; everything here dies with the
/// session.
pub(crate) struct TaskController {
    store: Arc<dyn TaskStore>,
    entries: DashMap<String, Arc<TaskEntry>>,
}

/// Per-task session state
pub(crate) struct TaskEntry {
    token: CancellationToken,
    signal: Notify,
    outbox: Mutex<VecDeque<Message>>,
    transition_lock: tokio::sync::Mutex<()>,
}

impl TaskController {
    /// Creates a new controller over `store`
    pub(crate) fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    /// The underlying durable store
    #[inline]
    pub(crate) fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Starts tracking a freshly created task
    pub(crate) fn register(&self, task_id: &str) -> Arc<TaskEntry> {
        let entry = Arc::new(TaskEntry {
            token: CancellationToken::new(),
            signal: Notify::new(),
            outbox: Mutex::new(VecDeque::new()),
            transition_lock: tokio::sync::Mutex::new(()),
        });
        self.entries.insert(task_id.into(), entry.clone());
        entry
    }

    /// Returns the session entry of a task, if this session created it
    pub(crate) fn entry(&self, task_id: &str) -> Option<Arc<TaskEntry>> {
        self.entries
            .get(task_id)
            .map(|entry| entry.value().clone())
    }

    /// Queues a side-channel message for delivery through the task's
    /// blocked `tasks/result` call
    pub(crate) fn queue_message(&self, task_id: &str, msg: Message) -> Result<(), Error> {
        let entry = self
            .entry(task_id)
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidParams,
                format!("Could not find task with id: {task_id}")))?;

        if entry.token.is_cancelled() {
            return Err(Error::new(
                ErrorCode::RequestCancelled,
                "Task has been cancelled"));
        }

        entry.outbox
            .lock()
            .unwrap()
            .push_back(msg);
        entry.signal.notify_waiters();
        Ok(())
    }

    /// Cancels the task's session scope and drops any queued,
    /// undelivered side-channel messages
    pub(crate) fn cancel(&self, task_id: &str) {
        if let Some(entry) = self.entry(task_id) {
            entry.token.cancel();
            entry.outbox
                .lock()
                .unwrap()
                .clear();
            entry.signal.notify_waiters();
        }
    }

    /// Stops tracking a task
    pub(crate) fn remove(&self, task_id: &str) {
        self.entries.remove(task_id);
    }

    /// Clears per-session delivery state; the store is left untouched
    pub(crate) fn on_close(&self) {
        for entry in self.entries.iter() {
            entry.outbox
                .lock()
                .unwrap()
                .clear();
            entry.signal.notify_waiters();
        }
    }
}

impl TaskEntry {
    /// The task's cancellation token
    #[inline]
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fired on every status transition and queued message
    #[inline]
    pub(crate) fn signal(&self) -> &Notify {
        &self.signal
    }

    /// Serializes store transition + status notification pairs
    #[inline]
    pub(crate) fn transition_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.transition_lock
    }

    /// Pops the next queued side-channel message
    pub(crate) fn pop_message(&self) -> Option<Message> {
        self.outbox
            .lock()
            .unwrap()
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::InMemoryTaskStore;
    use crate::types::notification::Notification;

    fn controller() -> TaskController {
        TaskController::new(Arc::new(InMemoryTaskStore::new()))
    }

    #[test]
    fn it_registers_and_finds_entry() {
        let controller = controller();
        controller.register("t-1");

        assert!(controller.entry("t-1").is_some());
        assert!(controller.entry("t-2").is_none());
    }

    #[test]
    fn it_queues_and_pops_messages_in_order() {
        let controller = controller();
        let entry = controller.register("t-1");

        for i in 0..3 {
            let msg = Notification::new("test", Some(serde_json::json!({ "i": i })));
            controller.queue_message("t-1", msg.into()).unwrap();
        }

        for i in 0..3 {
            let Some(Message::Notification(n)) = entry.pop_message() else {
                panic!("expected a queued notification")
            };
            assert_eq!(n.params.unwrap()["i"], i);
        }
        assert!(entry.pop_message().is_none());
    }

    #[test]
    fn it_rejects_queueing_for_unknown_task() {
        let controller = controller();

        let result = controller.queue_message("t-1", Notification::new("test", None).into());
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn it_drops_queued_messages_on_cancel() {
        let controller = controller();
        let entry = controller.register("t-1");

        controller.queue_message("t-1", Notification::new("test", None).into()).unwrap();
        controller.cancel("t-1");

        assert!(entry.token().is_cancelled());
        assert!(entry.pop_message().is_none());

        // a cancelled task accepts no further messages
        let result = controller.queue_message("t-1", Notification::new("test", None).into());
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::RequestCancelled);
    }

    #[test]
    fn it_clears_outboxes_on_close() {
        let controller = controller();
        let entry = controller.register("t-1");

        controller.queue_message("t-1", Notification::new("test", None).into()).unwrap();
        controller.on_close();

        assert!(entry.pop_message().is_none());
        // the task itself is not cancelled: it outlives the session
        assert!(!entry.token().is_cancelled());
    }
}
