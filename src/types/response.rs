//! Represents a response to an MCP request

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
pub use error_details::ErrorDetails;
pub use into_response::IntoResponse;
use crate::types::{RequestId, JSONRPC_VERSION, task::RELATED_TASK_KEY, RelatedTaskMetadata};

pub mod error_details;
pub mod into_response;

const META_KEY: &str = "_meta";

/// A response message in the JSON-RPC protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC protocol version.
    ///
    /// > Note: always 2.0.
    pub jsonrpc: String,

    /// Request identifier matching the original request.
    #[serde(default)]
    pub id: RequestId,

    /// The result of the method invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl Response {
    /// Creates a successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a dummy successful response
    pub fn empty(id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(json!({})),
            error: None,
        }
    }

    /// Creates an error response
    pub fn error(id: RequestId, error: Error) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Replaces the response id
    pub fn set_id(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    /// Stamps the related-task tag into `result._meta`, keeping all existing keys
    pub fn with_related_task(mut self, related: &RelatedTaskMetadata) -> Self {
        let Ok(value) = serde_json::to_value(related) else {
            return self;
        };
        if !matches!(self.result, Some(Value::Object(_))) && self.result.is_some() {
            return self;
        }
        let result = self
            .result
            .get_or_insert_with(|| Value::Object(Map::new()));
        if let Some(result) = result.as_object_mut() {
            let meta = result
                .entry(META_KEY)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(meta) = meta.as_object_mut() {
                meta.insert(RELATED_TASK_KEY.into(), value);
            }
        }
        self
    }

    /// Unwraps the [`Response`] into either result of `T` or [`Error`]
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, Error> {
        match self.result {
            Some(result) => serde_json::from_value::<T>(result)
                .map_err(Into::into),
            None => {
                let error = self.error
                    .unwrap_or_default()
                    .into();
                Err(error)
            }
        }
    }
}
