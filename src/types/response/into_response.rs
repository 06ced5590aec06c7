//! Tools for converting any type into an MCP response

use serde::Serialize;
use crate::error::{Error, ErrorCode};
use crate::types::{RequestId, Response};

/// A trait for converting any return type into an MCP response
pub trait IntoResponse {
    /// Converts a type into an MCP response
    fn into_response(self, req_id: RequestId) -> Response;
}

impl IntoResponse for Response {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        self.set_id(req_id)
    }
}

impl IntoResponse for &'static str {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        let result = serde_json::json!({ "result": self });
        Response::success(req_id, result)
    }
}

impl IntoResponse for Error {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        Response::error(req_id, self)
    }
}

impl IntoResponse for ErrorCode {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        Response::error(req_id, self.into())
    }
}

impl IntoResponse for serde_json::Value {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        Response::success(req_id, self)
    }
}

impl IntoResponse for () {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        Response::empty(req_id)
    }
}

impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: IntoResponse
{
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match self {
            Ok(value) => value.into_response(req_id),
            Err(err) => err.into_response(req_id),
        }
    }
}

macro_rules! impl_into_response {
    { $($type:ident),* $(,)? } => {
        $(impl IntoResponse for $type {
            #[inline]
            fn into_response(self, req_id: RequestId) -> Response {
                let result = serde_json::json!({ "result": self });
                Response::success(req_id, result)
            }
        })*
    };
}

impl_into_response! {
    String, bool,
    i32, i64, u32, u64,
    f32, f64,
}

/// A typed wrapper converted via plain serialization, without the `result` envelope
#[derive(Debug, Serialize)]
pub struct Typed<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Typed<T> {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self.0) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}
