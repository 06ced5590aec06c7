//! Shared utilities for both sides of a session

pub(crate) use request_queue::RequestQueue;
pub(crate) use timeout::TimeoutWindow;
pub(crate) use debounce::DebouncedNotifications;

pub use either::Either;

pub mod task_api;
mod request_queue;
mod timeout;
mod debounce;
mod either;
