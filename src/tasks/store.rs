//! In-memory [`TaskStore`] implementation

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Mutex;
use crate::error::{Error, ErrorCode};
use crate::tasks::TaskStore;
use crate::types::{
    Cursor, ListTasksResult, Pagination, Request, RequestId,
    Task, TaskMetadata, TaskStatus
};

const DEFAULT_PAGE_SIZE: usize = 10;

/// A single-process [`TaskStore`] backed by a concurrent map.
///
/// Tasks expire lazily: an entry whose TTL has elapsed is dropped the next
/// time it is read or listed, regardless of its status.
#[derive(Default)]
pub struct InMemoryTaskStore {
    entries: DashMap<String, StoredTask>,
    // creation order, for stable cursor pagination
    order: Mutex<Vec<String>>,
    max_ttl: Option<u64>,
    page_size: Option<usize>,
}

struct StoredTask {
    task: Task,
    result: Option<Value>,
}

impl InMemoryTaskStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every requested TTL at `max_ttl` milliseconds.
    /// The clamped value is the one echoed in the task record.
    pub fn with_max_ttl(mut self, max_ttl: u64) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    /// Sets the page size used by `tasks/list`
    ///
    /// Default: 10
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn expired(task: &Task) -> bool {
        match task.ttl {
            None => false,
            Some(ttl) => {
                let age = Utc::now() - task.created_at;
                age > TimeDelta::milliseconds(ttl as i64)
            }
        }
    }

    fn drop_entry(&self, task_id: &str) {
        self.entries.remove(task_id);
        let mut order = self.order.lock().unwrap();
        order.retain(|id| id != task_id);
    }

    fn not_found(task_id: &str) -> Error {
        Error::new(
            ErrorCode::InvalidParams,
            format!("Could not find task with id: {task_id}"))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(
        &self,
        params: &TaskMetadata,
        _request_id: &RequestId,
        _original_request: &Request,
        _session_id: Option<&str>,
    ) -> Result<Task, Error> {
        let mut task = Task::from_metadata(params);
        if let Some(max_ttl) = self.max_ttl {
            task.ttl = Some(task.ttl.map_or(max_ttl, |ttl| ttl.min(max_ttl)));
        }

        self.order
            .lock()
            .unwrap()
            .push(task.id.clone());
        self.entries.insert(task.id.clone(), StoredTask {
            task: task.clone(),
            result: None,
        });

        Ok(task)
    }

    async fn get_task(
        &self,
        task_id: &str,
        _session_id: Option<&str>,
    ) -> Result<Option<Task>, Error> {
        let task = match self.entries.get(task_id) {
            None => return Ok(None),
            Some(entry) => entry.task.clone(),
        };
        if Self::expired(&task) {
            self.drop_entry(task_id);
            return Ok(None);
        }
        Ok(Some(task))
    }

    async fn store_task_result(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Value,
        _session_id: Option<&str>,
    ) -> Result<Task, Error> {
        let mut entry = self.entries
            .get_mut(task_id)
            .ok_or_else(|| Self::not_found(task_id))?;

        entry.task.transition(status, None)?;
        entry.result = Some(result);
        Ok(entry.task.clone())
    }

    async fn get_task_result(
        &self,
        task_id: &str,
        _session_id: Option<&str>,
    ) -> Result<Value, Error> {
        let entry = self.entries
            .get(task_id)
            .ok_or_else(|| Self::not_found(task_id))?;

        entry.result
            .clone()
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidRequest,
                format!("Task {task_id} has no stored result")))
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        status_message: Option<&str>,
        _session_id: Option<&str>,
    ) -> Result<Task, Error> {
        let mut entry = self.entries
            .get_mut(task_id)
            .ok_or_else(|| Self::not_found(task_id))?;

        // transition() re-checks the stored status under the entry lock,
        // which keeps terminal states write-once
        entry.task.transition(status, status_message)?;
        Ok(entry.task.clone())
    }

    async fn list_tasks(
        &self,
        cursor: Option<Cursor>,
        _session_id: Option<&str>,
    ) -> Result<ListTasksResult, Error> {
        let ids = self.order.lock().unwrap().clone();

        let mut tasks = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(entry) = self.entries.get(id) {
                if Self::expired(&entry.task) {
                    continue;
                }
                tasks.push(entry.task.clone());
            }
        }

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        Ok(tasks.paginate(cursor, page_size).into())
    }

    async fn delete_task(
        &self,
        task_id: &str,
        _session_id: Option<&str>,
    ) -> Result<(), Error> {
        if self.entries.get(task_id).is_none() {
            return Err(Self::not_found(task_id));
        }
        self.drop_entry(task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> Request {
        Request::new(1, "tools/call", Some(json!({ "name": "slow" })))
    }

    async fn create(store: &InMemoryTaskStore, meta: TaskMetadata) -> Task {
        store
            .create_task(&meta, &RequestId::Number(1), &request(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn it_creates_and_reads_task() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        assert_eq!(task.status, TaskStatus::Submitted);

        let read = store.get_task(&task.id, None).await.unwrap().unwrap();
        assert_eq!(read.id, task.id);
        assert_eq!(read.status, TaskStatus::Submitted);
    }

    #[tokio::test]
    async fn it_returns_none_for_unknown_task() {
        let store = InMemoryTaskStore::new();

        let read = store.get_task("missing", None).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn it_clamps_requested_ttl() {
        let store = InMemoryTaskStore::new().with_max_ttl(60_000);

        let capped = create(&store, TaskMetadata { ttl: Some(120_000), poll_interval: None }).await;
        assert_eq!(capped.ttl, Some(60_000));

        let small = create(&store, TaskMetadata { ttl: Some(5_000), poll_interval: None }).await;
        assert_eq!(small.ttl, Some(5_000));

        // unlimited requests are capped too
        let unlimited = create(&store, TaskMetadata::default()).await;
        assert_eq!(unlimited.ttl, Some(60_000));
    }

    #[tokio::test]
    async fn it_updates_status_and_rejects_terminal_transitions() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        let task = store
            .update_task_status(&task.id, TaskStatus::Working, None, None)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Working);

        store
            .update_task_status(&task.id, TaskStatus::Cancelled, Some("stop"), None)
            .await
            .unwrap();

        let result = store
            .update_task_status(&task.id, TaskStatus::Working, None, None)
            .await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn it_stores_and_reads_result() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        let task = store
            .store_task_result(&task.id, TaskStatus::Completed, json!({ "ok": true }), None)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        let result = store.get_task_result(&task.id, None).await.unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn it_rejects_result_for_terminal_task() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        store
            .store_task_result(&task.id, TaskStatus::Completed, json!({}), None)
            .await
            .unwrap();

        let result = store
            .store_task_result(&task.id, TaskStatus::Failed, json!({}), None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn it_errors_on_missing_result() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        let result = store.get_task_result(&task.id, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn it_paginates_in_creation_order() {
        let store = InMemoryTaskStore::new().with_page_size(2);

        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(create(&store, TaskMetadata::default()).await.id);
        }

        let mut listed = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.list_tasks(cursor, None).await.unwrap();
            listed.extend(page.tasks.into_iter().map(|t| t.id));
            cursor = page.next_cursor;
            if cursor.is_none() { break; }
        }

        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn it_deletes_task() {
        let store = InMemoryTaskStore::new();
        let task = create(&store, TaskMetadata::default()).await;

        store.delete_task(&task.id, None).await.unwrap();

        assert!(store.get_task(&task.id, None).await.unwrap().is_none());
        assert!(store.delete_task(&task.id, None).await.is_err());
    }

    #[tokio::test]
    async fn it_drops_expired_task_on_read() {
        let store = InMemoryTaskStore::new();
        let mut task = create(&store, TaskMetadata { ttl: Some(10), poll_interval: None }).await;

        // age the stored record past its TTL
        task.created_at = Utc::now() - TimeDelta::milliseconds(50);
        store.entries.get_mut(&task.id).unwrap().task.created_at = task.created_at;

        let read = store.get_task(&task.id, None).await.unwrap();
        assert!(read.is_none());

        let listed = store.list_tasks(None, None).await.unwrap();
        assert!(listed.tasks.is_empty());
    }
}
