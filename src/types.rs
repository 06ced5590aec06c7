//! Types used by the MCP protocol
//!
//! See the [specification](https://github.com/modelcontextprotocol/specification) for details

use serde::{Deserialize, Deserializer, Serialize};
use serde::de::Error as DeError;
use crate::SDK_NAME;
use crate::types::notification::Notification;

pub use helpers::Meta;
pub use request::{Request, RequestId, RequestParamsMeta};
pub use response::{IntoResponse, Response};
pub use cursor::{Cursor, Page, Pagination};
pub use progress::{ProgressHandler, ProgressToken};
pub use capabilities::{
    ClientCapabilities,
    ServerCapabilities,
    ElicitationCapability,
    SamplingCapability,
    LoggingCapability,
    TasksCapability,
};
pub use task::{
    Task,
    TaskStatus,
    TaskMetadata,
    TaskPayload,
    RelatedTaskMetadata,
    CreateTaskResult,
    ListTasksResult,
};
pub use elicitation::{
    ElicitRequestParams,
    ElicitationAction,
    ElicitResult,
};
pub use sampling::{
    CreateMessageRequestParams,
    CreateMessageResult,
    SamplingMessage,
    Role,
};
pub use schema::{
    Schema,
    StringSchema,
    NumberSchema,
    BooleanSchema,
    EnumSchema,
};

pub mod request;
pub mod response;
pub mod notification;
pub mod cursor;
pub mod progress;
pub mod capabilities;
pub mod task;
pub mod elicitation;
pub mod sampling;
pub mod schema;
pub(crate) mod helpers;

pub(super) const JSONRPC_VERSION: &str = "2.0";

/// List of built-in commands supported by the protocol engine
pub mod commands {
    /// Command name for the initialization request
    pub const INIT: &str = "initialize";

    /// Command name for the ping request
    pub const PING: &str = "ping";
}

/// Represents a JSON RPC message that could be either [`Request`] or [`Response`] or [`Notification`]
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Message {
    /// See [`Request`]
    Request(Request),

    /// See [`Response`]
    Response(Response),

    /// See [`Notification`]
    Notification(Notification),
}

// Classification follows JSON-RPC 2.0: a request has both `id` and `method`,
// a notification has `method` without `id`, a response has `id` with either
// `result` or `error`. Anything else is malformed and rejected here so the
// receive loop can surface it through the error sink.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Message, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| D::Error::custom("message must be a JSON object"))?;

        let has_id = obj.contains_key("id");
        let msg = if obj.contains_key("method") {
            if has_id {
                Message::Request(serde_json::from_value(value).map_err(D::Error::custom)?)
            } else {
                Message::Notification(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
        } else if has_id && (obj.contains_key("result") || obj.contains_key("error")) {
            Message::Response(serde_json::from_value(value).map_err(D::Error::custom)?)
        } else {
            return Err(D::Error::custom(
                "message is neither a request, a response nor a notification"));
        };
        Ok(msg)
    }
}

impl From<Request> for Message {
    #[inline]
    fn from(req: Request) -> Self {
        Message::Request(req)
    }
}

impl From<Response> for Message {
    #[inline]
    fn from(resp: Response) -> Self {
        Message::Response(resp)
    }
}

impl From<Notification> for Message {
    #[inline]
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}

impl Message {
    /// Returns `true` if the current message is [`Request`]
    #[inline]
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    /// Returns `true` if the current message is [`Response`]
    #[inline]
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    /// Returns `true` if the current message is [`Notification`]
    #[inline]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }

    /// Returns the method name for requests and notifications
    #[inline]
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(req) => Some(&req.method),
            Message::Notification(notification) => Some(&notification.method),
            Message::Response(_) => None,
        }
    }

    /// Returns the [`Message`] ID for requests and responses
    #[inline]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(req) => Some(&req.id),
            Message::Response(resp) => Some(&resp.id),
            Message::Notification(_) => None,
        }
    }
}

/// Parameters for an initialization request sent to the receiving peer.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequestParams {
    /// The version of the Model Context Protocol that the requestor wants to use.
    #[serde(rename = "protocolVersion")]
    pub protocol_ver: String,

    /// The requestor's capabilities.
    pub capabilities: Option<ClientCapabilities>,

    /// Information about the requestor's implementation.
    #[serde(rename = "clientInfo")]
    pub client_info: Option<Implementation>,
}

/// Result of the initialization request.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The version of the Model Context Protocol that the receiver agreed on.
    #[serde(rename = "protocolVersion")]
    pub protocol_ver: String,

    /// The receiver's capabilities.
    pub capabilities: ServerCapabilities,

    /// Information about the receiver's implementation.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,

    /// Optional instructions for using the receiving peer and its features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>
}

/// Describes the name and version of an MCP implementation.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation.
    pub name: String,

    /// Version of the implementation.
    pub version: String,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: SDK_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into()
        }
    }
}

impl IntoResponse for InitializeResult {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn it_classifies_request() {
        let msg: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "method": "ping"
        })).unwrap();

        assert!(msg.is_request());
        assert_eq!(msg.method(), Some("ping"));
        assert_eq!(msg.id(), Some(&RequestId::Number(1)));
    }

    #[test]
    fn it_classifies_string_id_request() {
        let msg: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": "req-1", "method": "tools/call", "params": { "name": "echo" }
        })).unwrap();

        assert!(msg.is_request());
        assert_eq!(msg.id(), Some(&RequestId::String("req-1".into())));
    }

    #[test]
    fn it_classifies_notification() {
        let msg: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        })).unwrap();

        assert!(msg.is_notification());
        assert!(msg.id().is_none());
    }

    #[test]
    fn it_classifies_success_response() {
        let msg: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 42, "result": {}
        })).unwrap();

        assert!(msg.is_response());
    }

    #[test]
    fn it_classifies_error_response() {
        let msg: Message = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 42, "error": { "code": -32601, "message": "Method not found" }
        })).unwrap();

        let Message::Response(resp) = msg else { panic!("expected a response") };
        assert!(resp.error.is_some());
    }

    #[test]
    fn it_rejects_malformed_message() {
        let result: Result<Message, _> = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 42
        }));

        assert!(result.is_err());
    }

    #[test]
    fn it_rejects_non_object_message() {
        let result: Result<Message, _> = serde_json::from_value(json!([1, 2, 3]));

        assert!(result.is_err());
    }

    #[test]
    fn it_does_roundtrip_for_every_envelope() {
        let messages = [
            json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }),
            json!({ "jsonrpc": "2.0", "id": "a", "method": "tasks/get", "params": { "taskId": "t" } }),
            json!({ "jsonrpc": "2.0", "method": "notifications/progress", "params": { "progressToken": 1, "progress": 0.5 } }),
            json!({ "jsonrpc": "2.0", "id": 2, "result": { "ok": true } }),
            json!({ "jsonrpc": "2.0", "id": 3, "error": { "code": -32000, "message": "Connection closed" } }),
        ];

        for original in messages {
            let msg: Message = serde_json::from_value(original.clone()).unwrap();
            let encoded = serde_json::to_value(&msg).unwrap();
            let reparsed: Message = serde_json::from_value(encoded).unwrap();

            assert_eq!(
                serde_json::to_value(&msg).unwrap(),
                serde_json::to_value(&reparsed).unwrap());
        }
    }
}
