//! The protocol engine: owns a transport, frames JSON-RPC messages on top
//! of it, correlates requests with responses and dispatches handlers
//!
//! One [`Engine`] drives one logical session from either [`Side`]. Outbound
//! requests flow through the capability gate, receive a correlator-assigned
//! ID and a registered waiter; inbound messages are classified and routed:
//! responses resolve waiters, progress notifications fire callbacks and
//! rearm timeouts, requests dispatch to handlers in a fresh cancellation
//! scope. A configured [`TaskStore`](crate::tasks::TaskStore) additionally
//! enables task-based execution with the built-in `tasks/*` methods.

use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;

use crate::PROTOCOL_VERSIONS;
use crate::error::{Error, ErrorCode};
use crate::shared::{
    task_api, DebouncedNotifications, Either, RequestQueue, TimeoutWindow
};
use crate::tasks::TaskController;
use crate::transport::{Transport, TransportReceiver, TransportSender};
use crate::types::{
    commands,
    notification::{self, CancelledNotificationParams, Notification, ProgressNotificationParams},
    task::{self, CancelTaskRequestParams, GetTaskPayloadRequestParams, GetTaskRequestParams, ListTasksRequestParams},
    CreateTaskResult, InitializeRequestParams, InitializeResult, IntoResponse,
    ListTasksResult, Message, ProgressToken, RelatedTaskMetadata, Request,
    RequestId, Response, Task, TaskMetadata, TaskStatus,
};
use self::gate::{CapabilityGate, PeerCapabilities};
use self::handler::{
    FromHandlerParams, GenericHandler, Handler, HandlerParams,
    IntoHandlerResult, NotificationHandler, RequestFunc, RequestHandler,
};
use self::options::{EngineOptions, NotificationOptions, RequestOptions};

pub use context::Context;
pub use gate::Side;

pub mod context;
pub mod handler;
pub mod options;
pub(crate) mod gate;

type RequestHandlers = DashMap<String, RequestHandler<Response>>;
type NotificationHandlers = DashMap<String, NotificationHandler>;

/// Represents the protocol engine driving one MCP session.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    options: EngineOptions,
    gate: CapabilityGate,
    handlers: RequestHandlers,
    notification_handlers: NotificationHandlers,
    fallback: RwLock<Option<RequestHandler<Response>>>,
    notification_fallback: RwLock<Option<NotificationHandler>>,
    pending: RequestQueue,
    inflight: DashMap<RequestId, InflightRequest>,
    debounce: DebouncedNotifications,
    counter: AtomicI64,
    sender: RwLock<Option<Arc<dyn TransportSender>>>,
    session: RwLock<Option<Session>>,
    session_seq: AtomicU64,
    tasks: Option<TaskController>,
}

/// State kept per in-flight inbound request
struct InflightRequest {
    token: CancellationToken,
}

/// One connected transport
struct Session {
    id: u64,
    token: CancellationToken,
}

impl Engine {
    /// Initializes a new engine playing the given [`Side`] with default options
    pub fn new(side: Side) -> Self {
        Self::with_options(side, |options| options)
    }

    /// Initializes a new engine playing the given [`Side`]
    ///
    /// # Example
    /// ```no_run
    /// use tyne::{Engine, Side};
    ///
    /// let engine = Engine::with_options(Side::Client, |options| options
    ///     .with_name("my-client")
    ///     .with_strict_capabilities());
    /// ```
    pub fn with_options<F>(side: Side, config: F) -> Self
    where
        F: FnOnce(EngineOptions) -> EngineOptions
    {
        let options = config(EngineOptions::default());
        let gate = CapabilityGate::new(
            side,
            options.strict_capabilities,
            options.local_capabilities(side));
        let debounce = DebouncedNotifications::new(
            options.debounced_notification_methods.iter().cloned());
        let tasks = options.task_store.clone().map(TaskController::new);

        let engine = Self {
            inner: Arc::new(EngineInner {
                options,
                gate,
                handlers: DashMap::new(),
                notification_handlers: DashMap::new(),
                fallback: RwLock::new(None),
                notification_fallback: RwLock::new(None),
                pending: RequestQueue::default(),
                inflight: DashMap::new(),
                debounce,
                counter: AtomicI64::new(1),
                sender: RwLock::new(None),
                session: RwLock::new(None),
                session_seq: AtomicU64::new(1),
                tasks,
            })
        };
        engine.install_builtin_handlers(side);
        engine
    }

    fn install_builtin_handlers(&self, side: Side) {
        self.map_handler(commands::PING, Self::ping_handler);

        if side == Side::Server {
            self.map_handler(commands::INIT, Self::init_handler);
        }

        if self.inner.tasks.is_some() {
            self.map_handler(task::commands::GET, Self::tasks_get);
            self.map_handler(task::commands::RESULT, Self::tasks_result);
            self.map_handler(task::commands::LIST, Self::tasks_list);
            self.map_handler(task::commands::CANCEL, Self::tasks_cancel);
        }
    }

    /// Maps an inbound request method to a handler function.
    ///
    /// Installation is a replace operation: mapping a method twice keeps
    /// the latest handler.
    ///
    /// # Panics
    /// Panics when the local capability declaration does not cover handling
    /// `name`, so a mis-declared engine fails at startup instead of at the
    /// first inbound request.
    ///
    /// # Example
    /// ```no_run
    /// use tyne::{Engine, Side};
    ///
    /// let engine = Engine::new(Side::Server);
    /// engine.map_handler("echo", |req: tyne::types::Request| async move {
    ///     req.params.unwrap_or_default()
    /// });
    /// ```
    pub fn map_handler<F, R, Args>(&self, name: &str, handler: F)
    where
        F: GenericHandler<Args, Output = R>,
        R: IntoResponse + Send + 'static,
        Args: FromHandlerParams + Send + Sync + 'static,
    {
        if let Err(err) = self.inner.gate.assert_request_handler_capability(name) {
            panic!("Cannot register a request handler for {name}: {err}");
        }
        self.inner.handlers.insert(name.into(), RequestFunc::new(handler));
    }

    /// Maps every request method without a dedicated handler to `handler`
    /// instead of the default `MethodNotFound` response
    pub fn map_fallback_handler<F, R, Args>(&self, handler: F)
    where
        F: GenericHandler<Args, Output = R>,
        R: IntoResponse + Send + 'static,
        Args: FromHandlerParams + Send + Sync + 'static,
    {
        *self.inner.fallback.write().unwrap() = Some(RequestFunc::new(handler));
    }

    /// Maps an inbound notification method to a handler function.
    ///
    /// Handler failures are routed to the error sink; notifications have no
    /// response channel.
    pub fn map_notification_handler<F, Fut, R>(&self, name: &str, handler: F)
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        let handler: NotificationHandler = Arc::new(move |notification| {
            let fut = handler(notification);
            Box::pin(async move { fut.await.into_result() })
        });
        self.inner.notification_handlers.insert(name.into(), handler);
    }

    /// Maps every notification method without a dedicated handler to
    /// `handler` instead of silently dropping it
    pub fn map_fallback_notification_handler<F, Fut, R>(&self, handler: F)
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        let handler: NotificationHandler = Arc::new(move |notification| {
            let fut = handler(notification);
            Box::pin(async move { fut.await.into_result() })
        });
        *self.inner.notification_fallback.write().unwrap() = Some(handler);
    }

    /// Connects the engine to a transport and starts dispatching.
    ///
    /// Connecting while a session is live swaps the transport: pending
    /// outbound requests survive, and responses to requests dispatched on
    /// the old transport still go back through it.
    pub fn connect(&self, transport: impl Transport) -> Result<(), Error> {
        let mut transport = transport;
        transport.start();
        let (sender, receiver) = Box::new(transport).split();

        let id = self.inner.session_seq.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut session = self.inner.session.write().unwrap();
            if let Some(old) = session.replace(Session { id, token: token.clone() }) {
                old.token.cancel();
            }
        }
        *self.inner.sender.write().unwrap() = Some(sender);
        self.spawn_recv_loop(receiver, id, token);
        Ok(())
    }

    /// Ends the session: the transport is released, every pending outbound
    /// waiter is completed with `ConnectionClosed`, in-flight inbound
    /// cancellation scopes fire, and coalesced notifications are dropped.
    pub async fn close(&self) -> Result<(), Error> {
        let session = self.inner.session.write().unwrap().take();
        if let Some(session) = session {
            session.token.cancel();
        }
        *self.inner.sender.write().unwrap() = None;
        self.handle_close();
        Ok(())
    }

    /// Performs the initialization handshake with the remote peer.
    ///
    /// Sends `initialize` with the local declaration, records the remote
    /// capability set for the gate and confirms with
    /// `notifications/initialized`. Client side only.
    pub async fn initialize(&self) -> Result<InitializeResult, Error> {
        if self.inner.gate.side() != Side::Client {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                "Only the client side initiates the handshake"));
        }
        let PeerCapabilities::Client(capabilities) =
            self.inner.options.local_capabilities(Side::Client) else {
                return Err(ErrorCode::InternalError.into());
            };

        let params = InitializeRequestParams {
            protocol_ver: self.inner.options.protocol_ver().into(),
            capabilities: Some(capabilities),
            client_info: Some(self.inner.options.implementation.clone()),
        };
        let result: InitializeResult = self
            .request(commands::INIT, serde_json::to_value(params).ok(), RequestOptions::new())
            .await?;

        if !PROTOCOL_VERSIONS.contains(&result.protocol_ver.as_str()) {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Remote peer negotiated an unsupported protocol version: {}", result.protocol_ver)));
        }

        self.inner.gate.set_remote(PeerCapabilities::Server(result.capabilities.clone()));
        self.notification(notification::commands::INITIALIZED, None, NotificationOptions::new())
            .await?;
        Ok(result)
    }

    /// Pings the remote peer
    pub async fn ping(&self) -> Result<(), Error> {
        let _: Value = self
            .request(commands::PING, None, RequestOptions::new())
            .await?;
        Ok(())
    }

    /// Sends a request and deserializes the result into `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, Error> {
        self.send_request(method, params, options)
            .await?
            .into_result()
    }

    /// Sends a task-augmented request and follows the task to completion.
    ///
    /// When the remote peer answers with the result directly, it is returned
    /// as-is; when it answers with a task record, the engine polls
    /// `tasks/get` and fetches the payload through `tasks/result` once the
    /// task needs input or turns terminal.
    pub async fn request_task<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        task: TaskMetadata,
    ) -> Result<T, Error> {
        self.request_task_with_status(method, params, task, |_| {}).await
    }

    /// Same as [`request_task`](Self::request_task), additionally invoking
    /// `on_status` for every observed task snapshot
    pub async fn request_task_with_status<T, F>(
        &self,
        method: &str,
        params: Option<Value>,
        task: TaskMetadata,
        on_status: F,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        F: FnMut(&Task) + Send,
    {
        let resp = self
            .send_request(method, params, RequestOptions::new().with_task(task))
            .await?;
        let outcome = resp.into_result::<Either<CreateTaskResult, T>>()?;
        task_api::wait_to_completion(self, outcome, on_status).await
    }

    /// Sends a request and returns the raw [`Response`].
    ///
    /// The central outbound primitive: gates the method, allocates an ID,
    /// augments `_meta`, registers the waiter and enforces the timeout
    /// window until the response, the deadline or a cancellation wins.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        self.inner.gate.assert_capability_for_method(method)?;
        if options.task.is_some() {
            self.inner.gate.assert_task_capability(method)?;
        }

        let id = self.next_id();
        let mut req = Request::new(id.clone(), method, params);
        if options.on_progress.is_some() {
            req = req.with_progress_token(ProgressToken::from(&id));
        }
        if let Some(task) = &options.task {
            req = req.with_task(task);
        }
        if let Some(related) = &options.related_task {
            req = req.with_related_task(related);
        }

        let (rx, progress_signal) = self.inner.pending.push(&id, options.on_progress.clone());
        let Some(sender) = self.current_sender() else {
            self.inner.pending.pop(&id);
            return Err(Error::new(ErrorCode::ConnectionClosed, "Not connected"));
        };
        if let Err(err) = sender.send(req.into()).await {
            self.inner.pending.pop(&id);
            return Err(err);
        }

        let timeout = options.timeout.unwrap_or(self.inner.options.timeout);
        let mut window = TimeoutWindow::new(
            timeout,
            options.max_total_timeout,
            options.reset_timeout_on_progress);
        let cancel = options.token.clone().unwrap_or_default();

        tokio::pin!(rx);
        loop {
            tokio::select! {
                resp = &mut rx => {
                    return resp.map_err(|_| Error::new(
                        ErrorCode::ConnectionClosed,
                        "Response channel closed"));
                }
                _ = progress_signal.notified() => {
                    if let Err(err) = window.on_progress() {
                        self.abandon_request(&id, "Maximum total timeout exceeded").await;
                        return Err(err);
                    }
                }
                _ = sleep_until(window.deadline()) => {
                    self.abandon_request(&id, "Request timed out").await;
                    return Err(window.expired());
                }
                _ = cancel.cancelled() => {
                    self.abandon_request(&id, "Request cancelled by caller").await;
                    return Err(Error::new(ErrorCode::RequestCancelled, "Request cancelled"));
                }
            }
        }
    }

    /// Sends a notification to the remote peer.
    ///
    /// A parameterless notification whose method is configured for
    /// debouncing collapses to a single send per cooperative tick.
    pub async fn notification(
        &self,
        method: &str,
        params: Option<Value>,
        options: NotificationOptions,
    ) -> Result<(), Error> {
        self.inner.gate.assert_notification_capability(method)?;

        let mut notification = Notification::new(method, params);
        if let Some(related) = &options.related_task {
            notification = notification.with_related_task(related);
        }

        if self.inner.debounce.is_debouncable(&notification, options.related_request.as_ref()) {
            if !self.inner.debounce.try_schedule(method) {
                // a flush for this method is already scheduled in this tick
                return Ok(());
            }
            let engine = self.clone();
            let method = method.to_string();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                engine.inner.debounce.release(&method);
                if let Some(sender) = engine.current_sender() {
                    if let Err(err) = sender.send(notification.into()).await {
                        engine.report(&err);
                    }
                }
            });
            return Ok(());
        }

        let sender = self
            .current_sender()
            .ok_or_else(|| Error::new(ErrorCode::ConnectionClosed, "Not connected"))?;
        sender.send(notification.into()).await
    }

    /// Returns the next outbound [`RequestId`]
    #[inline]
    fn next_id(&self) -> RequestId {
        let id = self.inner.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::Number(id)
    }

    #[inline]
    fn current_sender(&self) -> Option<Arc<dyn TransportSender>> {
        self.inner.sender.read().unwrap().clone()
    }

    fn tasks(&self) -> Result<&TaskController, Error> {
        self.inner.tasks
            .as_ref()
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidRequest,
                "No task store is configured"))
    }

    /// Routes an error without a response channel to the configured sink
    pub(crate) fn report(&self, _err: &Error) {
        #[cfg(feature = "tracing")]
        tracing::error!(logger = "tyne", "{_err}");

        if let Some(sink) = &self.inner.options.error_sink {
            sink(_err);
        }
    }

    /// Removes the waiter and tells the peer the request is gone
    async fn abandon_request(&self, id: &RequestId, reason: &str) {
        self.inner.pending.pop(id);
        if let Some(sender) = self.current_sender() {
            let _ = sender
                .send(Notification::cancelled(id, Some(reason)).into())
                .await;
        }
    }

    fn spawn_recv_loop(
        &self,
        mut receiver: Box<dyn TransportReceiver>,
        session_id: u64,
        token: CancellationToken,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // the session was closed or the transport swapped out;
                    // close() does its own cleanup
                    _ = token.cancelled() => return,
                    msg = receiver.recv() => match msg {
                        Ok(Message::Request(req)) => engine.handle_request(req),
                        Ok(Message::Response(resp)) => engine.handle_response(resp),
                        Ok(Message::Notification(notification)) => engine.handle_notification(notification).await,
                        Err(err) => {
                            if err.code() == ErrorCode::ConnectionClosed {
                                break;
                            }
                            // malformed frame; the session keeps running
                            engine.report(&err);
                        }
                    }
                }
            }

            // transport-side close: tear down only while still current
            let still_current = {
                let mut session = engine.inner.session.write().unwrap();
                match session.as_ref() {
                    Some(current) if current.id == session_id => {
                        *session = None;
                        true
                    }
                    _ => false,
                }
            };
            if still_current {
                *engine.inner.sender.write().unwrap() = None;
                engine.handle_close();
            }
        });
    }

    fn handle_request(&self, req: Request) {
        // capture the sender so a mid-handler transport swap still routes
        // the response to the peer that asked
        let Some(sender) = self.current_sender() else {
            return;
        };
        let engine = self.clone();
        tokio::spawn(async move {
            engine.dispatch_request(req, sender).await;
        });
    }

    async fn dispatch_request(&self, req: Request, sender: Arc<dyn TransportSender>) {
        let req_id = req.id.clone();
        let token = CancellationToken::new();
        self.inner.inflight.insert(req_id.clone(), InflightRequest {
            token: token.clone(),
        });

        let result = self.dispatch_request_inner(req, sender.clone(), token.clone()).await;
        self.inner.inflight.remove(&req_id);

        let resp = match result {
            Ok(Some(resp)) => resp,
            // cancelled, or the task path already acknowledged
            Ok(None) => return,
            Err(err) => Response::error(req_id, err),
        };
        if token.is_cancelled() {
            return;
        }
        if let Err(err) = sender.send(resp.into()).await {
            self.report(&err);
        }
    }

    async fn dispatch_request_inner(
        &self,
        req: Request,
        sender: Arc<dyn TransportSender>,
        token: CancellationToken,
    ) -> Result<Option<Response>, Error> {
        #[cfg(feature = "tracing")]
        tracing::trace!(logger = "tyne", "Received request: {} ({})", req.method, req.id);

        let progress_token = req.meta().and_then(|meta| meta.progress_token);

        // promotion: a request carrying task metadata becomes a durable task
        if let Some(task_meta) = req.task_metadata() {
            if let Some(controller) = self.inner.tasks.as_ref() {
                self.inner.gate.assert_task_handler_capability(&req.method)?;
                let Some(handler) = self.find_handler(&req.method) else {
                    return Ok(Some(Response::error(
                        req.id.clone(),
                        ErrorCode::MethodNotFound.into())));
                };

                let task = controller
                    .store()
                    .create_task(&task_meta, &req.id, &req, None)
                    .await?;
                controller.register(&task.id);

                // the direct response acknowledges creation; the payload is
                // fetched later through tasks/result
                let ack = CreateTaskResult::new(task.clone()).into_response(req.id.clone());
                sender.send(ack.into()).await?;

                let ctx = Context {
                    engine: self.clone(),
                    req_id: req.id.clone(),
                    token,
                    sender,
                    task: Some(RelatedTaskMetadata::from(task.id.clone())),
                    progress_token,
                };
                self.run_task_handler(handler, ctx, req, task).await;
                return Ok(None);
            }
        }

        let ctx = Context {
            engine: self.clone(),
            req_id: req.id.clone(),
            token: token.clone(),
            sender,
            task: req.related_task(),
            progress_token,
        };
        self.call_handler(ctx, req, &token).await
    }

    fn find_handler(&self, method: &str) -> Option<RequestHandler<Response>> {
        self.inner.handlers
            .get(method)
            .map(|handler| handler.value().clone())
            .or_else(|| self.inner.fallback.read().unwrap().clone())
    }

    async fn call_handler(
        &self,
        ctx: Context,
        req: Request,
        token: &CancellationToken,
    ) -> Result<Option<Response>, Error> {
        let req_id = req.id.clone();
        let Some(handler) = self.find_handler(&req.method) else {
            return Ok(Some(Response::error(req_id, ErrorCode::MethodNotFound.into())));
        };

        tokio::select! {
            resp = handler.call(HandlerParams { ctx, req }) => {
                Ok(Some(resp.unwrap_or_else(|err| Response::error(req_id, err))))
            }
            // a cancelled request gets no response
            _ = token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    logger = "tyne",
                    "The request with ID: {} has been cancelled", req_id);
                Ok(None)
            }
        }
    }

    /// Runs the handler body of a promoted request, moving the task through
    /// its lifecycle and storing the outcome
    async fn run_task_handler(
        &self,
        handler: RequestHandler<Response>,
        ctx: Context,
        req: Request,
        task: Task,
    ) {
        let Some(entry) = self.inner.tasks.as_ref().and_then(|tasks| tasks.entry(&task.id)) else {
            return;
        };

        // submitted -> working as the handler body begins
        if let Err(err) = self.update_task_status(&task.id, TaskStatus::Working, None).await {
            let _ = self
                .update_task_status(&task.id, TaskStatus::Failed, Some(&err.to_string()))
                .await;
            return;
        }

        let _req_id = req.id.clone();
        tokio::select! {
            resp = handler.call(HandlerParams { ctx: ctx.clone(), req }) => {
                let outcome = match resp {
                    Ok(resp) if resp.error.is_none() => self
                        .store_task_result(
                            &task.id,
                            TaskStatus::Completed,
                            resp.result.unwrap_or_else(|| json!({})))
                        .await,
                    Ok(resp) => {
                        let message = resp.error
                            .map(|details| details.message)
                            .unwrap_or_default();
                        self.fail_task(&task.id, &message).await
                    }
                    Err(err) => self.fail_task(&task.id, &err.to_string()).await,
                };
                if let Err(err) = outcome {
                    self.report(&err);
                }
            }
            // the task was cancelled via tasks/cancel; the store transition
            // already happened
            _ = entry.token().cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(logger = "tyne", "Task {} cancelled mid-handler", task.id);
            }
            // the originating request was cancelled; take the task with it
            _ = ctx.token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    logger = "tyne",
                    "The task-bound request with ID: {} has been cancelled", _req_id);
                let _ = self.cancel_task(&task.id, "Request cancelled").await;
            }
        }
    }

    fn handle_response(&self, resp: Response) {
        let id = resp.id.clone();
        if !self.inner.pending.complete(resp) {
            // late responses for cancelled requests land here too
            self.report(&Error::new(
                ErrorCode::InvalidParams,
                format!("Received a response for an unknown request ID: {id}")));
        }
    }

    /// Routes an inbound notification.
    ///
    /// User handlers run on the dispatch thread, so notifications for one
    /// session never reorder; blocking work inside them must be offloaded.
    async fn handle_notification(&self, notification: Notification) {
        match notification.method.as_str() {
            notification::commands::CANCELLED => {
                let params = notification.params.unwrap_or(Value::Null);
                match serde_json::from_value::<CancelledNotificationParams>(params) {
                    Ok(params) => {
                        if let Some(inflight) = self.inner.inflight.get(&params.request_id) {
                            inflight.token.cancel();
                        }
                    }
                    Err(err) => self.report(&Error::new(ErrorCode::InvalidParams, err)),
                }
            }
            notification::commands::PROGRESS => {
                let params = notification.params.unwrap_or(Value::Null);
                match serde_json::from_value::<ProgressNotificationParams>(params) {
                    Ok(params) => {
                        if !self.inner.pending.notify_progress(params) {
                            self.report(&Error::new(
                                ErrorCode::InvalidParams,
                                "Received progress for an unknown token"));
                        }
                    }
                    Err(err) => self.report(&Error::new(ErrorCode::InvalidParams, err)),
                }
            }
            method => {
                let handler = self.inner.notification_handlers
                    .get(method)
                    .map(|handler| handler.value().clone())
                    .or_else(|| self.inner.notification_fallback.read().unwrap().clone());
                let Some(handler) = handler else {
                    // unsubscribed notifications are dropped
                    #[cfg(feature = "tracing")]
                    tracing::trace!(logger = "tyne", "Dropped notification: {method}");
                    return;
                };
                if let Err(err) = handler(notification).await {
                    self.report(&err);
                }
            }
        }
    }

    /// Clears all session-scoped state exactly once per close
    fn handle_close(&self) {
        self.inner.pending.drain();
        self.inner.debounce.clear();
        for inflight in self.inner.inflight.iter() {
            inflight.token.cancel();
        }
        self.inner.inflight.clear();
        if let Some(tasks) = &self.inner.tasks {
            tasks.on_close();
        }
    }

    // -- task facade -------------------------------------------------------

    /// Returns `true` when this session tracks delivery state for the task
    pub(crate) fn is_task_tracked(&self, task_id: &str) -> bool {
        self.inner.tasks
            .as_ref()
            .is_some_and(|tasks| tasks.entry(task_id).is_some())
    }

    /// Creates a task for `original_request` and starts tracking it
    pub(crate) async fn create_task(
        &self,
        params: &TaskMetadata,
        original_request: &Request,
    ) -> Result<Task, Error> {
        let controller = self.tasks()?;
        let task = controller
            .store()
            .create_task(params, &original_request.id, original_request, None)
            .await?;
        controller.register(&task.id);
        Ok(task)
    }

    /// Reads a task snapshot from the local store
    pub(crate) async fn get_task(&self, task_id: &str) -> Result<Task, Error> {
        self.tasks()?
            .store()
            .get_task(task_id, None)
            .await?
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidParams,
                format!("Could not find task with id: {task_id}")))
    }

    /// Moves a task into `status` and notifies the remote peer.
    ///
    /// Transitions for one task are serialized, so `notifications/tasks/status`
    /// always arrives in transition order.
    pub(crate) async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: Option<&str>,
    ) -> Result<Task, Error> {
        let controller = self.tasks()?;
        let entry = controller.entry(task_id);
        let _guard = match &entry {
            Some(entry) => Some(entry.transition_lock().lock().await),
            None => None,
        };

        let task = controller
            .store()
            .update_task_status(task_id, status, message, None)
            .await?;
        if let Some(entry) = &entry {
            entry.signal().notify_waiters();
        }
        self.emit_task_status(&task).await;
        Ok(task)
    }

    /// Stores the task result under the terminal `status` and notifies the
    /// remote peer
    pub(crate) async fn store_task_result(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Value,
    ) -> Result<Task, Error> {
        let controller = self.tasks()?;
        let entry = controller.entry(task_id);
        let _guard = match &entry {
            Some(entry) => Some(entry.transition_lock().lock().await),
            None => None,
        };

        let task = controller
            .store()
            .store_task_result(task_id, status, result, None)
            .await?;
        if let Some(entry) = &entry {
            entry.signal().notify_waiters();
        }
        self.emit_task_status(&task).await;
        Ok(task)
    }

    /// Marks the task failed, storing the error-shaped payload
    pub(crate) async fn fail_task(&self, task_id: &str, message: &str) -> Result<Task, Error> {
        self.store_task_result(
            task_id,
            TaskStatus::Failed,
            json!({
                "isError": true,
                "content": [{ "type": "text", "text": message }]
            }))
            .await
    }

    /// Retrieves the stored result of a task
    pub(crate) async fn get_task_result(&self, task_id: &str) -> Result<Value, Error> {
        self.tasks()?
            .store()
            .get_task_result(task_id, None)
            .await
    }

    /// Pages through the tasks known to the local store
    pub(crate) async fn list_local_tasks(
        &self,
        cursor: Option<crate::types::Cursor>,
    ) -> Result<ListTasksResult, Error> {
        self.tasks()?
            .store()
            .list_tasks(cursor, None)
            .await
    }

    /// Cancels a task: transitions the store record, fires the task's
    /// cancellation scope and drops queued side-channel messages
    pub(crate) async fn cancel_task(&self, task_id: &str, reason: &str) -> Result<Task, Error> {
        let task = self
            .update_task_status(task_id, TaskStatus::Cancelled, Some(reason))
            .await?;
        self.tasks()?.cancel(task_id);
        Ok(task)
    }

    /// Queues a side-channel request for delivery through the task's blocked
    /// `tasks/result` call and awaits its response
    pub(crate) async fn send_queued_request(
        &self,
        task_id: &str,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let controller = self.tasks()?;
        let entry = controller
            .entry(task_id)
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidParams,
                format!("Could not find task with id: {task_id}")))?;

        let id = self.next_id();
        let mut req = Request::new(id.clone(), method, params);
        if options.on_progress.is_some() {
            req = req.with_progress_token(ProgressToken::from(&id));
        }
        req = req.with_related_task(&RelatedTaskMetadata::from(task_id));

        let (rx, _) = self.inner.pending.push(&id, options.on_progress.clone());
        self.inner.pending.bind_task(&id, task_id);
        if let Err(err) = controller.queue_message(task_id, req.into()) {
            self.inner.pending.pop(&id);
            return Err(err);
        }

        tokio::select! {
            resp = rx => resp.map_err(|_| Error::new(
                ErrorCode::ConnectionClosed,
                "Response channel closed")),
            _ = entry.token().cancelled() => {
                self.inner.pending.pop(&id);
                Err(Error::new(ErrorCode::RequestCancelled, "Task has been cancelled"))
            }
        }
    }

    async fn emit_task_status(&self, task: &Task) {
        if let Err(err) = self.inner.gate.assert_notification_capability(task::commands::STATUS) {
            self.report(&err);
            return;
        }
        let Ok(params) = serde_json::to_value(task) else {
            return;
        };
        let notification = Notification::new(task::commands::STATUS, Some(params))
            .with_related_task(&RelatedTaskMetadata::from(task.id.clone()));

        let Some(sender) = self.current_sender() else {
            return;
        };
        if let Err(err) = sender.send(notification.into()).await {
            self.report(&err);
        }
    }

    /// Blocks until the task turns terminal, delivering queued side-channel
    /// messages to the requestor while it waits
    async fn wait_task_result(&self, ctx: &Context, task_id: &str) -> Result<Response, Error> {
        let controller = self.tasks()?;
        let entry = controller.entry(task_id);
        let default_poll = self.inner.options.task_poll_interval;

        loop {
            // register for wakeups before reading, so a transition between
            // the read and the wait is never lost
            let notified = entry.as_ref().map(|entry| {
                let mut notified = Box::pin(entry.signal().notified());
                notified.as_mut().enable();
                notified
            });

            let task = self.get_task(task_id).await?;
            if task.status == TaskStatus::Cancelled {
                return Err(Error::new(ErrorCode::InvalidRequest, "Task has been cancelled"));
            }
            if task.status.is_terminal() {
                let result = self.get_task_result(task_id).await?;
                return Ok(Response::success(RequestId::default(), result)
                    .with_related_task(&RelatedTaskMetadata::from(task_id)));
            }

            // continuous delivery: queued side-channel requests flow to the
            // blocked requestor in issuance order
            if let Some(entry) = &entry {
                while let Some(msg) = entry.pop_message() {
                    ctx.sender.send(msg).await?;
                }
            }

            let poll = task.poll_interval
                .map(Duration::from_millis)
                .unwrap_or(default_poll);
            match notified {
                Some(mut notified) => tokio::select! {
                    _ = ctx.cancelled() => return Err(ErrorCode::RequestCancelled.into()),
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(poll) => {}
                },
                None => tokio::select! {
                    _ = ctx.cancelled() => return Err(ErrorCode::RequestCancelled.into()),
                    _ = tokio::time::sleep(poll) => {}
                },
            }
        }
    }

    // -- built-in handlers -------------------------------------------------

    /// Ping request handler
    async fn ping_handler() {}

    /// Initialization handshake handler
    async fn init_handler(
        ctx: Context,
        params: InitializeRequestParams,
    ) -> Result<InitializeResult, Error> {
        let engine = ctx.engine();
        if let Some(capabilities) = params.capabilities {
            engine.inner.gate.set_remote(PeerCapabilities::Client(capabilities));
        }

        let protocol_ver = if PROTOCOL_VERSIONS.contains(&params.protocol_ver.as_str()) {
            params.protocol_ver
        } else {
            engine.inner.options.protocol_ver().into()
        };
        let PeerCapabilities::Server(capabilities) =
            engine.inner.options.local_capabilities(Side::Server) else {
                return Err(ErrorCode::InternalError.into());
            };

        Ok(InitializeResult {
            protocol_ver,
            capabilities,
            server_info: engine.inner.options.implementation.clone(),
            instructions: None,
        })
    }

    /// `tasks/get` handler: an idempotent, side-effect-free snapshot read
    async fn tasks_get(ctx: Context, params: GetTaskRequestParams) -> Result<Task, Error> {
        ctx.engine().get_task(&params.id).await
    }

    /// `tasks/result` handler: blocks until the task turns terminal
    async fn tasks_result(
        ctx: Context,
        params: GetTaskPayloadRequestParams,
    ) -> Result<Response, Error> {
        let engine = ctx.engine().clone();
        engine.wait_task_result(&ctx, &params.id).await
    }

    /// `tasks/list` handler
    async fn tasks_list(
        ctx: Context,
        params: ListTasksRequestParams,
    ) -> Result<ListTasksResult, Error> {
        ctx.engine().list_local_tasks(params.cursor).await
    }

    /// `tasks/cancel` handler
    async fn tasks_cancel(ctx: Context, params: CancelTaskRequestParams) -> Result<Task, Error> {
        ctx.engine()
            .cancel_task(&params.id, "Client cancelled task execution.")
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;
    use super::*;
    use crate::tasks::InMemoryTaskStore;
    use crate::transport::pipe::Pipe;
    use crate::types::{
        elicitation::{ElicitRequestParams, ElicitResult, ElicitationAction},
        ClientCapabilities
    };

    fn connect(server: &Engine, client: &Engine) {
        let (left, right) = Pipe::new();
        client.connect(left).unwrap();
        server.connect(right).unwrap();
    }

    fn task_server() -> Engine {
        Engine::with_options(Side::Server, |options| options
            .with_task_store(InMemoryTaskStore::new()))
    }

    fn elicitation_client() -> Engine {
        Engine::with_options(Side::Client, |options| options
            .with_client_capabilities(|caps| ClientCapabilities {
                elicitation: Some(Default::default()),
                ..caps
            }))
    }

    fn accept_with_name(name: &str) -> ElicitResult {
        ElicitResult {
            action: ElicitationAction::Accept,
            content: Some(HashMap::from([
                ("userName".to_string(), json!(name))
            ])),
        }
    }

    #[tokio::test]
    async fn it_round_trips_ping_with_incrementing_ids() {
        let server = Engine::new(Side::Server);
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let resp = client
            .send_request(commands::PING, None, RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(resp.id, RequestId::Number(1));
        assert_eq!(resp.result, Some(json!({})));

        let resp = client
            .send_request(commands::PING, None, RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(resp.id, RequestId::Number(2));
    }

    #[tokio::test]
    async fn it_answers_unknown_method_with_method_not_found() {
        let server = Engine::new(Side::Server);
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result = client
            .request::<Value>("no/such/method", None, RequestOptions::new())
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::MethodNotFound);
    }

    #[tokio::test]
    async fn it_dispatches_to_fallback_handler() {
        let server = Engine::new(Side::Server);
        server.map_fallback_handler(|req: Request| async move {
            json!({ "method": req.method })
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result: Value = client
            .request("no/such/method", None, RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(result["method"], "no/such/method");
    }

    #[tokio::test]
    async fn it_initializes_session() {
        let server = task_server();
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result = client.initialize().await.unwrap();

        assert!(crate::PROTOCOL_VERSIONS.contains(&result.protocol_ver.as_str()));
        assert!(result.capabilities.tasks.is_some());
    }

    #[tokio::test]
    async fn it_enforces_strict_capabilities_after_handshake() {
        let server = Engine::new(Side::Server);
        let client = Engine::with_options(Side::Client, |options| options
            .with_strict_capabilities());
        connect(&server, &client);

        client.initialize().await.unwrap();

        // the server declared no tasks capability
        let result = client
            .request::<Task>("tasks/get", Some(json!({ "taskId": "t" })), RequestOptions::new())
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn it_preserves_caller_meta_on_the_wire() {
        let server = Engine::new(Side::Server);
        server.map_handler("echo-meta", |req: Request| async move {
            req.params.unwrap_or_default()["_meta"].clone()
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let echoed: Value = client
            .request(
                "echo-meta",
                Some(json!({ "_meta": { "vendor/custom": 7 } })),
                RequestOptions::new().with_progress(|_| {}))
            .await
            .unwrap();

        assert_eq!(echoed["vendor/custom"], 7);
        // the engine-written token coexists with the caller's keys
        assert_eq!(echoed["progressToken"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_quiet_requests() {
        let server = Engine::new(Side::Server);
        server.map_handler("slow", |ctx: Context| async move {
            ctx.cancelled().await;
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result = client
            .request::<Value>(
                "slow",
                None,
                RequestOptions::new().with_timeout(Duration::from_millis(1000)))
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::RequestTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn it_fails_immediately_with_zero_timeout() {
        let server = Engine::new(Side::Server);
        server.map_handler("slow", |ctx: Context| async move {
            ctx.cancelled().await;
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result = client
            .request::<Value>("slow", None, RequestOptions::new().with_timeout(Duration::ZERO))
            .await;

        assert_eq!(result.unwrap_err().code(), ErrorCode::RequestTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn it_resets_timeout_on_progress() {
        let server = Engine::new(Side::Server);
        server.map_handler("slow", |ctx: Context| async move {
            sleep(Duration::from_millis(800)).await;
            ctx.progress(50.0, Some(100.0)).await?;
            sleep(Duration::from_millis(900)).await;
            Ok::<_, Error>(json!({ "ok": true }))
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let progress = observed.clone();
        let result: Value = client
            .request(
                "slow",
                None,
                RequestOptions::new()
                    .with_timeout(Duration::from_millis(1000))
                    .with_reset_timeout_on_progress()
                    .with_progress(move |params| {
                        progress.lock().unwrap().push((params.progress, params.total));
                    }))
            .await
            .unwrap();

        // the handler took 1700 ms against a 1000 ms window, admitted by the
        // reset at 800 ms
        assert_eq!(result["ok"], true);
        assert_eq!(*observed.lock().unwrap(), vec![(50.0, Some(100.0))]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_enforces_max_total_timeout() {
        let server = Engine::new(Side::Server);
        server.map_handler("dribble", |ctx: Context| async move {
            for i in 0..2 {
                sleep(Duration::from_millis(80)).await;
                ctx.progress(i as f64, None).await?;
            }
            ctx.cancelled().await;
            Ok::<_, Error>(json!({}))
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let result = client
            .request::<Value>(
                "dribble",
                None,
                RequestOptions::new()
                    .with_timeout(Duration::from_millis(1000))
                    .with_reset_timeout_on_progress()
                    .with_max_total_timeout(Duration::from_millis(150)))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequestTimeout);

        let data = err.data().expect("the ceiling error carries data");
        assert_eq!(data["maxTotalTimeout"], 150);
        assert!(data["totalElapsed"].as_u64().unwrap() >= 160);
    }

    #[tokio::test(start_paused = true)]
    async fn it_cancels_request_from_caller_side() {
        let server = Engine::new(Side::Server);
        server.map_handler("hang", |ctx: Context| async move {
            ctx.cancelled().await;
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let token = CancellationToken::new();
        let abort = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            abort.cancel();
        });

        let result = client
            .request::<Value>("hang", None, RequestOptions::new().with_token(token))
            .await;

        assert_eq!(result.unwrap_err().code(), ErrorCode::RequestCancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn it_sends_no_response_for_cancelled_inbound_request() {
        let unknown = Arc::new(AtomicUsize::new(0));
        let sink = unknown.clone();

        let server = Engine::new(Side::Server);
        server.map_handler("hang", |ctx: Context| async move {
            ctx.cancelled().await;
        });
        let client = Engine::with_options(Side::Client, move |options| options
            .with_error_handler(move |_| { sink.fetch_add(1, Ordering::SeqCst); }));
        connect(&server, &client);

        let token = CancellationToken::new();
        let abort = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            abort.cancel();
        });
        let _ = client
            .request::<Value>("hang", None, RequestOptions::new().with_token(token))
            .await;

        // the handler returns once its scope aborts, yet no response may
        // arrive for the cancelled request
        sleep(Duration::from_millis(100)).await;
        assert_eq!(unknown.load(Ordering::SeqCst), 0);

        // the session keeps working
        client.ping().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn it_coalesces_debounced_notifications() {
        let server = Engine::with_options(Side::Server, |options| options
            .with_debounced_notifications(["test/changed"]));
        let client = Engine::new(Side::Client);

        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        client.map_notification_handler("test/changed", move |_| {
            let seen = seen.clone();
            async move { seen.fetch_add(1, Ordering::SeqCst); }
        });
        connect(&server, &client);

        for _ in 0..3 {
            server
                .notification("test/changed", None, NotificationOptions::new())
                .await
                .unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn it_sends_parameterized_notifications_in_order() {
        let server = Engine::with_options(Side::Server, |options| options
            .with_debounced_notifications(["test/changed"]));
        let client = Engine::new(Side::Client);

        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = order.clone();
        client.map_notification_handler("test/changed", move |notification: Notification| {
            let seen = seen.clone();
            async move {
                let i = notification.params.unwrap_or_default()["i"].as_i64().unwrap();
                seen.lock().unwrap().push(i);
            }
        });
        connect(&server, &client);

        for i in 1..=3 {
            server
                .notification("test/changed", Some(json!({ "i": i })), NotificationOptions::new())
                .await
                .unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn it_reports_progress_for_unknown_token() {
        let errors = Arc::new(AtomicUsize::new(0));
        let sink = errors.clone();

        let server = Engine::new(Side::Server);
        let client = Engine::with_options(Side::Client, move |options| options
            .with_error_handler(move |_| { sink.fetch_add(1, Ordering::SeqCst); }));
        connect(&server, &client);

        server
            .notification(
                notification::commands::PROGRESS,
                Some(json!({ "progressToken": 999, "progress": 1.0 })),
                NotificationOptions::new())
            .await
            .unwrap();
        tokio::task::yield_now().await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        // the session survives
        client.ping().await.unwrap();
    }

    #[tokio::test]
    async fn it_reports_response_for_unknown_id() {
        let errors = Arc::new(AtomicUsize::new(0));
        let sink = errors.clone();

        let client = Engine::with_options(Side::Client, move |options| options
            .with_error_handler(move |_| { sink.fetch_add(1, Ordering::SeqCst); }));

        let (local, remote) = Pipe::new();
        client.connect(local).unwrap();
        let (peer_tx, _peer_rx) = Box::new(remote).split();

        peer_tx
            .send(Response::success(RequestId::Number(99), json!({})).into())
            .await
            .unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn it_completes_pending_waiters_on_close() {
        let server = Engine::new(Side::Server);
        server.map_handler("hang", |ctx: Context| async move {
            ctx.cancelled().await;
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let requestor = client.clone();
        let pending = tokio::spawn(async move {
            requestor
                .request::<Value>("hang", None, RequestOptions::new())
                .await
        });

        sleep(Duration::from_millis(20)).await;
        client.close().await.unwrap();

        let result = pending.await.unwrap();
        assert_eq!(result.unwrap_err().code(), ErrorCode::ConnectionClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn it_answers_through_the_transport_that_asked() {
        let server = Engine::new(Side::Server);
        server.map_handler("slow", |_ctx: Context| async move {
            sleep(Duration::from_millis(100)).await;
            json!({ "ok": true })
        });
        let client = Engine::new(Side::Client);

        let (left, right) = Pipe::new();
        client.connect(left).unwrap();
        server.connect(right).unwrap();

        let requestor = client.clone();
        let pending = tokio::spawn(async move {
            requestor
                .request::<Value>("slow", None, RequestOptions::new())
                .await
        });

        // swap the server onto another transport mid-handler
        sleep(Duration::from_millis(20)).await;
        let (_other, swapped) = Pipe::new();
        server.connect(swapped).unwrap();

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn it_runs_task_with_elicitation_to_completion() {
        let server = task_server();
        server.map_handler("input-task", |ctx: Context| async move {
            let params = ElicitRequestParams::new("What is your name?")
                .with_required("userName", "string");
            let answer = ctx.elicit(params).await?;
            let name = answer
                .value("userName")
                .and_then(|v| v.as_str())
                .unwrap_or("stranger")
                .to_string();
            Ok::<_, Error>(json!({
                "content": [{ "type": "text", "text": format!("Hello, {name}!") }]
            }))
        });

        let client = elicitation_client();
        client.map_handler("elicitation/create", |_params: ElicitRequestParams| async move {
            accept_with_name("Alice")
        });

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = statuses.clone();
        client.map_notification_handler(task::commands::STATUS, move |notification: Notification| {
            let seen = seen.clone();
            async move {
                let status = notification.params.unwrap_or_default()["status"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(status);
            }
        });
        connect(&server, &client);

        let result: Value = client
            .request_task(
                "input-task",
                None,
                TaskMetadata { ttl: Some(60_000), poll_interval: Some(100) })
            .await
            .unwrap();

        assert_eq!(result["content"][0]["text"], "Hello, Alice!");

        sleep(Duration::from_millis(50)).await;
        assert_eq!(
            *statuses.lock().unwrap(),
            vec!["working", "input_required", "working", "completed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_drops_side_channel_queue_on_cancellation() {
        let server = task_server();
        server.map_handler("queue-task", |ctx: Context| async move {
            // issue side-channel requests without awaiting their results
            for prompt in ["one", "two"] {
                let side = ctx.clone();
                tokio::spawn(async move {
                    let _ = side.elicit(ElicitRequestParams::new(prompt)).await;
                });
            }
            ctx.cancelled().await;
            Ok::<_, Error>(json!({}))
        });

        let elicitations = Arc::new(AtomicUsize::new(0));
        let seen = elicitations.clone();
        let client = elicitation_client();
        client.map_handler("elicitation/create", move |_params: ElicitRequestParams| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                accept_with_name("nobody")
            }
        });
        connect(&server, &client);

        let resp = client
            .send_request(
                "queue-task",
                None,
                RequestOptions::new().with_task(TaskMetadata {
                    ttl: None,
                    poll_interval: Some(100)
                }))
            .await
            .unwrap();
        let ack: CreateTaskResult = resp.into_result().unwrap();
        let task_id = ack.task.id;

        // let the handler queue its elicitations, then cancel before any
        // tasks/result call could deliver them
        sleep(Duration::from_millis(50)).await;
        let cancelled: Task = client
            .request(
                task::commands::CANCEL,
                Some(json!({ "taskId": &task_id })),
                RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);

        for _ in 0..2 {
            let result = client
                .request::<Value>(
                    task::commands::RESULT,
                    Some(json!({ "taskId": &task_id })),
                    RequestOptions::new())
                .await;
            assert!(result.is_err());
        }

        // a cancelled task delivers zero further messages
        assert_eq!(elicitations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn it_rejects_cancel_of_terminal_task() {
        let server = task_server();
        server.map_handler("quick-task", || async move {
            json!({ "content": [] })
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let resp = client
            .send_request(
                "quick-task",
                None,
                RequestOptions::new().with_task(TaskMetadata {
                    ttl: None,
                    poll_interval: Some(50)
                }))
            .await
            .unwrap();
        let ack: CreateTaskResult = resp.into_result().unwrap();

        // wait for the handler to finish and store the result
        sleep(Duration::from_millis(200)).await;

        let result = client
            .request::<Task>(
                task::commands::CANCEL,
                Some(json!({ "taskId": ack.task.id })),
                RequestOptions::new())
            .await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test(start_paused = true)]
    async fn it_serves_task_snapshots_idempotently() {
        let server = task_server();
        server.map_handler("hold-task", |ctx: Context| async move {
            ctx.cancelled().await;
            Ok::<_, Error>(json!({}))
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        let resp = client
            .send_request(
                "hold-task",
                None,
                RequestOptions::new().with_task(TaskMetadata {
                    ttl: None,
                    poll_interval: Some(100)
                }))
            .await
            .unwrap();
        let ack: CreateTaskResult = resp.into_result().unwrap();
        let task_id = ack.task.id;

        sleep(Duration::from_millis(20)).await;
        let first: Task = client
            .request(
                task::commands::GET,
                Some(json!({ "taskId": &task_id })),
                RequestOptions::new())
            .await
            .unwrap();
        let second: Task = client
            .request(
                task::commands::GET,
                Some(json!({ "taskId": &task_id })),
                RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.last_updated_at, second.last_updated_at);

        let unknown = client
            .request::<Task>(
                task::commands::GET,
                Some(json!({ "taskId": "missing" })),
                RequestOptions::new())
            .await;
        assert_eq!(unknown.unwrap_err().code(), ErrorCode::InvalidParams);
    }

    #[tokio::test(start_paused = true)]
    async fn it_lists_tasks_with_pagination() {
        let server = task_server();
        server.map_handler("hold-task", |ctx: Context| async move {
            ctx.cancelled().await;
            Ok::<_, Error>(json!({}))
        });
        let client = Engine::new(Side::Client);
        connect(&server, &client);

        for _ in 0..3 {
            let _ = client
                .send_request(
                    "hold-task",
                    None,
                    RequestOptions::new().with_task(TaskMetadata {
                        ttl: None,
                        poll_interval: Some(100)
                    }))
                .await
                .unwrap();
        }

        let listed: ListTasksResult = client
            .request(task::commands::LIST, Some(json!({})), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(listed.tasks.len(), 3);
        assert!(listed.next_cursor.is_none());

        // an invalid cursor is rejected as InvalidParams
        let invalid = client
            .request::<ListTasksResult>(
                task::commands::LIST,
                Some(json!({ "cursor": "not-a-cursor!!" })),
                RequestOptions::new())
            .await;
        assert_eq!(invalid.unwrap_err().code(), ErrorCode::InvalidParams);
    }
}
