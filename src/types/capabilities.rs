//! Types that describe the capabilities of both MCP peers

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Represents the capabilities that a client may support.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,

    /// Present if the client supports sampling requests from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,

    /// Present if the client supports elicitation requests from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,

    /// Present if the client supports task-augmented requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapability>,
}

/// Represents the capabilities that a server may support.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,

    /// Present if the server supports sending log messages to the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,

    /// Present if the server supports task-augmented requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapability>,
}

/// Represents the sampling capability configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct SamplingCapability {
    // Currently empty in the spec, but may be extended in the future
}

/// Represents the elicitation capability configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationCapability {
    // Currently empty in the spec, but may be extended in the future
}

/// Represents the logging capability configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct LoggingCapability {
    // Currently empty in the spec, but may be extended in the future
}

/// Represents the tasks capability configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct TasksCapability {
    /// Method names that may be augmented with task execution.
    /// `None` means any request method may be task-augmented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<String>>,
}

impl TasksCapability {
    /// Restricts task augmentation to the given request methods
    pub fn with_requests<T>(mut self, methods: T) -> Self
    where
        T: IntoIterator<Item = &'static str>
    {
        self.requests = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Returns `true` if requests with `method` may be task-augmented
    pub fn supports(&self, method: &str) -> bool {
        match &self.requests {
            None => true,
            Some(methods) => methods.iter().any(|m| m == method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_supports_any_method_by_default() {
        let tasks = TasksCapability::default();

        assert!(tasks.supports("tools/call"));
        assert!(tasks.supports("anything/else"));
    }

    #[test]
    fn it_restricts_task_augmented_methods() {
        let tasks = TasksCapability::default()
            .with_requests(["tools/call"]);

        assert!(tasks.supports("tools/call"));
        assert!(!tasks.supports("prompts/get"));
    }

    #[test]
    fn it_skips_absent_capabilities_in_json() {
        let caps = ClientCapabilities::default();
        let json = serde_json::to_value(&caps).unwrap();

        assert_eq!(json, serde_json::json!({}));
    }
}
