//! Utilities for Notifications

use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use crate::types::{JSONRPC_VERSION, RequestId};
use crate::types::task::{RelatedTaskMetadata, RELATED_TASK_KEY};

pub use progress::ProgressNotificationParams;

pub mod progress;

const META_KEY: &str = "_meta";

/// List of built-in notification commands
pub mod commands {
    /// Notification name sent after a successful initialization handshake.
    pub const INITIALIZED: &str = "notifications/initialized";

    /// Notification name that cancels an in-flight request.
    pub const CANCELLED: &str = "notifications/cancelled";

    /// Notification name that reports progress of a long-running request.
    pub const PROGRESS: &str = "notifications/progress";
}

/// A notification which does not expect a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Name of the notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Parameters of the `notifications/cancelled` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledNotificationParams {
    /// The ID of the request being cancelled.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// An optional human-readable reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Notification {
    /// Creates a new [`Notification`]
    #[inline]
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params
        }
    }

    /// Creates a `notifications/cancelled` notification for the request with `id`
    pub fn cancelled(id: &RequestId, reason: Option<&str>) -> Self {
        let params = CancelledNotificationParams {
            request_id: id.clone(),
            reason: reason.map(Into::into),
        };
        Self::new(commands::CANCELLED, serde_json::to_value(params).ok())
    }

    /// Reads the related-task tag from the notification `_meta`, if present
    pub fn related_task(&self) -> Option<RelatedTaskMetadata> {
        self.params
            .as_ref()?
            .get(META_KEY)?
            .get(RELATED_TASK_KEY)
            .and_then(|tag| serde_json::from_value(tag.clone()).ok())
    }

    /// Stamps the related-task tag into `params._meta`, keeping all existing keys
    pub fn with_related_task(mut self, related: &RelatedTaskMetadata) -> Self {
        let Ok(value) = serde_json::to_value(related) else {
            return self;
        };
        if !matches!(self.params, Some(Value::Object(_))) {
            self.params = Some(Value::Object(Map::new()));
        }
        if let Some(Value::Object(ref mut params)) = self.params {
            let meta = params
                .entry(META_KEY)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(meta) = meta.as_object_mut() {
                meta.insert(RELATED_TASK_KEY.into(), value);
            }
        }
        self
    }
}
