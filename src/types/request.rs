//! Represents a request from the remote MCP peer

use std::fmt;
use serde::{Serialize, Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use crate::error::{Error, ErrorCode};
use crate::types::{
    JSONRPC_VERSION,
    ProgressToken,
    task::{RelatedTaskMetadata, TaskMetadata, RELATED_TASK_KEY},
};

const META_KEY: &str = "_meta";
const TASK_KEY: &str = "task";
const PROGRESS_TOKEN_KEY: &str = "progressToken";

/// A unique identifier for a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl Default for RequestId {
    #[inline]
    fn default() -> RequestId {
        Self::String("(no id)".into())
    }
}

impl fmt::Display for RequestId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(num) => write!(f, "{num}"),
            RequestId::String(str) => write!(f, "{str}"),
        }
    }
}

impl From<i64> for RequestId {
    #[inline]
    fn from(num: i64) -> Self {
        Self::Number(num)
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(str: &str) -> Self {
        Self::String(str.into())
    }
}

/// Engine-level annotations carried in the reserved `_meta` object of request params.
///
/// Keys the engine does not understand are preserved in `extra` so that
/// augmentation never drops caller-provided metadata.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RequestParamsMeta {
    /// An opaque token the receiving peer echoes in progress notifications.
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,

    /// Marks the message as belonging to an existing task.
    #[serde(rename = "io.modelcontextprotocol/related-task", skip_serializing_if = "Option::is_none")]
    pub related_task: Option<RelatedTaskMetadata>,

    /// Any other metadata keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A request in the JSON-RPC protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Request identifier. Must be a string or number and unique within the session.
    pub id: RequestId,

    /// Name of the method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a new [`Request`]
    #[inline]
    pub fn new(id: impl Into<RequestId>, method: &str, params: Option<impl Serialize>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: id.into(),
            method: method.into(),
            params: params.and_then(|p| serde_json::to_value(p).ok()),
        }
    }

    /// Deserializes request params into `T`
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let params = self
            .params
            .clone()
            .unwrap_or(Value::Null);
        serde_json::from_value(params)
            .map_err(|err| Error::new(ErrorCode::InvalidParams, err))
    }

    /// Reads the `_meta` object of the request params, if present
    pub fn meta(&self) -> Option<RequestParamsMeta> {
        self.params
            .as_ref()?
            .get(META_KEY)
            .and_then(|meta| serde_json::from_value(meta.clone()).ok())
    }

    /// Reads the task augmentation metadata from the request params, if present
    pub fn task_metadata(&self) -> Option<TaskMetadata> {
        self.params
            .as_ref()?
            .get(TASK_KEY)
            .and_then(|task| serde_json::from_value(task.clone()).ok())
    }

    /// Reads the related-task tag from the request `_meta`, if present
    pub fn related_task(&self) -> Option<RelatedTaskMetadata> {
        self.meta()?.related_task
    }

    /// Stamps a progress token into `params._meta`, keeping all existing keys
    pub fn with_progress_token(mut self, token: ProgressToken) -> Self {
        if let Ok(value) = serde_json::to_value(token) {
            self.insert_meta(PROGRESS_TOKEN_KEY, value);
        }
        self
    }

    /// Stamps the related-task tag into `params._meta`, keeping all existing keys
    pub fn with_related_task(mut self, related: &RelatedTaskMetadata) -> Self {
        if let Ok(value) = serde_json::to_value(related) {
            self.insert_meta(RELATED_TASK_KEY, value);
        }
        self
    }

    /// Adds the top-level `task` augmentation field to the request params
    pub fn with_task(mut self, task: &TaskMetadata) -> Self {
        if let Ok(value) = serde_json::to_value(task) {
            self.params_object().insert(TASK_KEY.into(), value);
        }
        self
    }

    /// Inserts a key into `params._meta`, creating the objects on the way if needed
    fn insert_meta(&mut self, key: &str, value: Value) {
        let params = self.params_object();
        let meta = params
            .entry(META_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert(key.into(), value);
        }
    }

    /// Returns params as a mutable JSON object, replacing non-object params
    fn params_object(&mut self) -> &mut Map<String, Value> {
        if !matches!(self.params, Some(Value::Object(_))) {
            self.params = Some(Value::Object(Map::new()));
        }
        match self.params {
            Some(Value::Object(ref mut map)) => map,
            _ => unreachable!(),
        }
    }
}
