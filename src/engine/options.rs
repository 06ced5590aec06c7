//! Protocol engine configuration options

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use crate::PROTOCOL_VERSIONS;
use crate::engine::gate::{PeerCapabilities, Side};
use crate::error::Error;
use crate::tasks::TaskStore;
use crate::types::{
    ClientCapabilities, Implementation, ProgressHandler, RelatedTaskMetadata,
    RequestId, ServerCapabilities, TaskMetadata
};

const DEFAULT_REQUEST_TIMEOUT: u64 = 60; // 60 seconds
const DEFAULT_TASK_POLL_INTERVAL: u64 = 5000; // 5 seconds

/// A sink for errors that have no response channel: malformed frames,
/// progress for unknown tokens, responses for unknown IDs, notification
/// handler failures
pub type ErrorSink = Arc<
    dyn Fn(&Error)
    + Send
    + Sync
>;

/// Represents the protocol engine configuration options
pub struct EngineOptions {
    /// Information about the local implementation
    pub(crate) implementation: Implementation,

    /// Default timeout applied to outbound requests
    pub(crate) timeout: Duration,

    /// When set, unknown remote capabilities fail at send time instead of
    /// deferring to the remote's error response
    pub(crate) strict_capabilities: bool,

    /// Notification methods collapsed to one send per cooperative tick
    pub(crate) debounced_notification_methods: Vec<String>,

    /// Durable storage enabling task-based execution
    pub(crate) task_store: Option<Arc<dyn TaskStore>>,

    /// Suggested polling cadence for task status, when a task does not
    /// carry its own
    pub(crate) task_poll_interval: Duration,

    /// Capabilities declared when this engine plays the client side
    pub(crate) client_capabilities: ClientCapabilities,

    /// Capabilities declared when this engine plays the server side
    pub(crate) server_capabilities: ServerCapabilities,

    /// Receives errors that have no response channel
    pub(crate) error_sink: Option<ErrorSink>,

    /// An MCP version this engine insists on
    protocol_ver: Option<&'static str>,
}

impl Debug for EngineOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("implementation", &self.implementation)
            .field("timeout", &self.timeout)
            .field("strict_capabilities", &self.strict_capabilities)
            .field("debounced_notification_methods", &self.debounced_notification_methods)
            .field("task_store", &self.task_store.is_some())
            .field("task_poll_interval", &self.task_poll_interval)
            .field("protocol_ver", &self.protocol_ver)
            .finish()
    }
}

impl Default for EngineOptions {
    #[inline]
    fn default() -> Self {
        Self {
            implementation: Default::default(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            strict_capabilities: false,
            debounced_notification_methods: Vec::new(),
            task_store: None,
            task_poll_interval: Duration::from_millis(DEFAULT_TASK_POLL_INTERVAL),
            client_capabilities: Default::default(),
            server_capabilities: Default::default(),
            error_sink: None,
            protocol_ver: None,
        }
    }
}

impl EngineOptions {
    /// Specifies the local implementation name
    pub fn with_name(mut self, name: &str) -> Self {
        self.implementation.name = name.into();
        self
    }

    /// Specifies the local implementation version
    pub fn with_version(mut self, ver: &str) -> Self {
        self.implementation.version = ver.into();
        self
    }

    /// Specifies the Model Context Protocol version
    ///
    /// Default: last available protocol version
    pub fn with_mcp_version(mut self, ver: &'static str) -> Self {
        self.protocol_ver = Some(ver);
        self
    }

    /// Specifies the default outbound request timeout
    ///
    /// Default: 60 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turns unknown remote capabilities into synchronous failures at send time
    ///
    /// Default: _false_
    pub fn with_strict_capabilities(mut self) -> Self {
        self.strict_capabilities = true;
        self
    }

    /// Configures the notification methods that collapse to a single send
    /// per cooperative tick
    pub fn with_debounced_notifications<T>(mut self, methods: T) -> Self
    where
        T: IntoIterator<Item = &'static str>
    {
        self.debounced_notification_methods = methods
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    /// Enables task-based execution backed by `store`
    pub fn with_task_store(mut self, store: impl TaskStore + 'static) -> Self {
        self.task_store = Some(Arc::new(store));
        self
    }

    /// Specifies the fallback polling cadence suggested to task requestors
    ///
    /// Default: 5000 ms
    pub fn with_task_poll_interval(mut self, interval: Duration) -> Self {
        self.task_poll_interval = interval;
        self
    }

    /// Configures the capabilities declared on the client side
    pub fn with_client_capabilities<F>(mut self, config: F) -> Self
    where
        F: FnOnce(ClientCapabilities) -> ClientCapabilities
    {
        self.client_capabilities = config(self.client_capabilities);
        self
    }

    /// Configures the capabilities declared on the server side
    pub fn with_server_capabilities<F>(mut self, config: F) -> Self
    where
        F: FnOnce(ServerCapabilities) -> ServerCapabilities
    {
        self.server_capabilities = config(self.server_capabilities);
        self
    }

    /// Registers the sink receiving errors that have no response channel
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static
    {
        self.error_sink = Some(Arc::new(handler));
        self
    }

    /// Returns the Model Context Protocol version this engine offers
    #[inline]
    pub(crate) fn protocol_ver(&self) -> &'static str {
        match self.protocol_ver {
            Some(ver) => ver,
            None => PROTOCOL_VERSIONS.last().unwrap()
        }
    }

    /// The local capability declaration for `side`.
    ///
    /// A configured task store implies the tasks capability unless one was
    /// declared explicitly.
    pub(crate) fn local_capabilities(&self, side: Side) -> PeerCapabilities {
        match side {
            Side::Client => {
                let mut caps = self.client_capabilities.clone();
                if self.task_store.is_some() && caps.tasks.is_none() {
                    caps.tasks = Some(Default::default());
                }
                PeerCapabilities::Client(caps)
            }
            Side::Server => {
                let mut caps = self.server_capabilities.clone();
                if self.task_store.is_some() && caps.tasks.is_none() {
                    caps.tasks = Some(Default::default());
                }
                PeerCapabilities::Server(caps)
            }
        }
    }
}

/// Per-request options for the outbound path
#[derive(Default, Clone)]
pub struct RequestOptions {
    /// Overrides the engine's default timeout
    pub(crate) timeout: Option<Duration>,

    /// Rearms the timeout whenever a progress notification arrives
    pub(crate) reset_timeout_on_progress: bool,

    /// Hard ceiling on the cumulative wait, regardless of progress
    pub(crate) max_total_timeout: Option<Duration>,

    /// Progress callback; also stamps `progressToken` into the request
    pub(crate) on_progress: Option<ProgressHandler>,

    /// Caller-side abort handle
    pub(crate) token: Option<CancellationToken>,

    /// Promotes the request to a server-side task
    pub(crate) task: Option<TaskMetadata>,

    /// Tags the request as belonging to an existing task
    pub(crate) related_task: Option<RelatedTaskMetadata>,
}

impl Debug for RequestOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("reset_timeout_on_progress", &self.reset_timeout_on_progress)
            .field("max_total_timeout", &self.max_total_timeout)
            .field("on_progress", &self.on_progress.is_some())
            .field("token", &self.token.is_some())
            .field("task", &self.task)
            .field("related_task", &self.related_task)
            .finish()
    }
}

impl RequestOptions {
    /// Creates default request options
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the engine's default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rearms the timeout on every progress notification
    pub fn with_reset_timeout_on_progress(mut self) -> Self {
        self.reset_timeout_on_progress = true;
        self
    }

    /// Bounds the cumulative wait even when progress keeps arriving
    pub fn with_max_total_timeout(mut self, max: Duration) -> Self {
        self.max_total_timeout = Some(max);
        self
    }

    /// Registers a progress callback; the request is stamped with a
    /// progress token equal to its ID
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(crate::types::notification::ProgressNotificationParams) + Send + Sync + 'static
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Attaches a caller-side abort handle
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Promotes the request to a task on the receiving peer
    pub fn with_task(mut self, task: TaskMetadata) -> Self {
        self.task = Some(task);
        self
    }

    /// Tags the request as belonging to an existing task
    pub fn with_related_task(mut self, related: impl Into<RelatedTaskMetadata>) -> Self {
        self.related_task = Some(related.into());
        self
    }
}

/// Per-notification options for the outbound path
#[derive(Default, Debug, Clone)]
pub struct NotificationOptions {
    /// The inbound request this notification relates to
    pub(crate) related_request: Option<RequestId>,

    /// Tags the notification as belonging to an existing task
    pub(crate) related_task: Option<RelatedTaskMetadata>,
}

impl NotificationOptions {
    /// Creates default notification options
    pub fn new() -> Self {
        Self::default()
    }

    /// Relates the notification to an inbound request
    pub fn with_related_request(mut self, id: RequestId) -> Self {
        self.related_request = Some(id);
        self
    }

    /// Tags the notification as belonging to an existing task
    pub fn with_related_task(mut self, related: impl Into<RelatedTaskMetadata>) -> Self {
        self.related_task = Some(related.into());
        self
    }
}
