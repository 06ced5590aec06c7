//! Utilities for tracking operation's progress

use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::types::RequestId;
use crate::types::notification::ProgressNotificationParams;

/// A callback invoked for every progress notification routed to a pending request
pub type ProgressHandler = Arc<
    dyn Fn(ProgressNotificationParams)
    + Send
    + Sync
>;

/// Represents a progress token, which can be either an integer or a string.
///
/// The engine stamps the originating request ID as the token so that
/// inbound progress notifications route back to the request's callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    String(String),
}

impl fmt::Display for ProgressToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::Number(n) => write!(f, "{n}"),
            ProgressToken::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&RequestId> for ProgressToken {
    #[inline]
    fn from(id: &RequestId) -> Self {
        match id {
            RequestId::Number(n) => ProgressToken::Number(*n),
            RequestId::String(s) => ProgressToken::String(s.clone()),
        }
    }
}

impl From<i64> for ProgressToken {
    #[inline]
    fn from(n: i64) -> Self {
        ProgressToken::Number(n)
    }
}

impl ProgressToken {
    /// Creates the params of a progress notification carrying this token
    pub fn notify(&self, progress: f64, total: Option<f64>) -> ProgressNotificationParams {
        ProgressNotificationParams {
            progress_token: self.clone(),
            progress,
            total,
            message: None,
        }
    }
}
