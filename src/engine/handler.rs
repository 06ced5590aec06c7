//! Handler machinery for inbound requests and notifications

use std::future::Future;
use std::sync::Arc;
use futures_util::future::BoxFuture;
use crate::error::{Error, ErrorCode};
use crate::engine::Context;
use crate::types::{
    notification::Notification,
    task::{
        CancelTaskRequestParams, GetTaskPayloadRequestParams,
        GetTaskRequestParams, ListTasksRequestParams
    },
    elicitation::ElicitRequestParams,
    sampling::CreateMessageRequestParams,
    InitializeRequestParams, IntoResponse, Meta, RelatedTaskMetadata,
    Request, RequestId, Response
};

/// Represents a registered request handler
pub(crate) type RequestHandler<T> = Arc<
    dyn Handler<T>
    + Send
    + Sync
>;

/// Represents a registered notification handler
pub(crate) type NotificationHandler = Arc<
    dyn Fn(Notification) -> BoxFuture<'static, Result<(), Error>>
    + Send
    + Sync
>;

/// Parameters handed to a request handler: the request itself plus its
/// request-scoped [`Context`]
pub struct HandlerParams {
    pub(crate) ctx: Context,
    pub(crate) req: Request,
}

/// Represents a Request -> Response handler
pub(crate) trait Handler<T: IntoResponse> {
    fn call(&self, params: HandlerParams) -> BoxFuture<'_, Result<T, Error>>;
}

/// Represents an extractor trait from handler parameters
pub trait FromHandlerParams: Sized {
    /// Extracts `Self` from the handler parameters
    fn from_params(params: &HandlerParams) -> Result<Self, Error>;
}

/// Represents a generic handler
pub trait GenericHandler<Args>: Clone + Send + Sync + 'static  {
    /// Output type
    type Output;
    /// Output future
    type Future: Future<Output = Self::Output> + Send;

    /// Calls the handler
    fn call(&self, args: Args) -> Self::Future;
}

/// Converts notification handler outputs into a uniform result
pub trait IntoHandlerResult {
    /// Converts `self` into a handler result
    fn into_result(self) -> Result<(), Error>;
}

impl IntoHandlerResult for () {
    #[inline]
    fn into_result(self) -> Result<(), Error> {
        Ok(())
    }
}

impl IntoHandlerResult for Result<(), Error> {
    #[inline]
    fn into_result(self) -> Result<(), Error> {
        self
    }
}

pub(crate) struct RequestFunc<F, R, Args>
where
    F: GenericHandler<Args, Output = R>,
    R: IntoResponse,
    Args: FromHandlerParams,
{
    func: F,
    _marker: std::marker::PhantomData<Args>,
}

impl<F, R, Args> RequestFunc<F, R, Args>
where
    F: GenericHandler<Args, Output = R>,
    R: IntoResponse,
    Args: FromHandlerParams
{
    pub(crate) fn new(func: F) -> Arc<Self> {
        let func = Self { func, _marker: std::marker::PhantomData };
        Arc::new(func)
    }
}

impl<F, R, Args> Handler<Response> for RequestFunc<F, R, Args>
where
    F: GenericHandler<Args, Output = R>,
    R: IntoResponse,
    Args: FromHandlerParams + Send + Sync
{
    #[inline]
    fn call(&self, params: HandlerParams) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(async move {
            let id = params.req.id.clone();
            let args = Args::from_params(&params)?;
            Ok(self.func
                .call(args)
                .await
                .into_response(id))
        })
    }
}

impl FromHandlerParams for () {
    fn from_params(_: &HandlerParams) -> Result<Self, Error> {
        Ok(())
    }
}

impl FromHandlerParams for RequestId {
    fn from_params(params: &HandlerParams) -> Result<Self, Error> {
        Ok(params.req.id.clone())
    }
}

impl FromHandlerParams for Request {
    #[inline]
    fn from_params(params: &HandlerParams) -> Result<Self, Error> {
        Ok(params.req.clone())
    }
}

impl FromHandlerParams for Context {
    #[inline]
    fn from_params(params: &HandlerParams) -> Result<Self, Error> {
        Ok(params.ctx.clone())
    }
}

impl FromHandlerParams for Meta<RelatedTaskMetadata> {
    fn from_params(params: &HandlerParams) -> Result<Self, Error> {
        params.req
            .related_task()
            .map(Meta)
            .ok_or_else(|| Error::new(
                ErrorCode::InvalidParams,
                "Request carries no related-task metadata"))
    }
}

impl<T: FromHandlerParams> FromHandlerParams for Option<T> {
    #[inline]
    fn from_params(params: &HandlerParams) -> Result<Self, Error> {
        Ok(T::from_params(params).ok())
    }
}

macro_rules! impl_from_handler_params {
    ($($type:ty),* $(,)?) => {
        $(impl FromHandlerParams for $type {
            #[inline]
            fn from_params(params: &HandlerParams) -> Result<Self, Error> {
                params.req.params()
            }
        })*
    };
}

impl_from_handler_params! {
    InitializeRequestParams,
    ListTasksRequestParams,
    GetTaskRequestParams,
    GetTaskPayloadRequestParams,
    CancelTaskRequestParams,
    ElicitRequestParams,
    CreateMessageRequestParams,
}

macro_rules! impl_from_handler_params_for_tuple {
    ($($T: ident),*) => {
        impl<$($T: FromHandlerParams),+> FromHandlerParams for ($($T,)+) {
            #[inline]
            fn from_params(params: &HandlerParams) -> Result<Self, Error> {
                let args = ($(
                    $T::from_params(params)?,
                )*);
                Ok(args)
            }
        }
    };
}

impl_from_handler_params_for_tuple! { T1 }
impl_from_handler_params_for_tuple! { T1, T2 }
impl_from_handler_params_for_tuple! { T1, T2, T3 }
impl_from_handler_params_for_tuple! { T1, T2, T3, T4 }
impl_from_handler_params_for_tuple! { T1, T2, T3, T4, T5 }

macro_rules! impl_generic_handler ({ $($param:ident)* } => {
    impl<Func, Fut: Send, $($param,)*> GenericHandler<($($param,)*)> for Func
    where
        Func: Fn($($param),*) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future + 'static,
    {
        type Output = Fut::Output;
        type Future = Fut;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Self::Future {
            (self)($($param,)*)
        }
    }
});

impl_generic_handler! {}
impl_generic_handler! { T1 }
impl_generic_handler! { T1 T2 }
impl_generic_handler! { T1 T2 T3 }
impl_generic_handler! { T1 T2 T3 T4 }
impl_generic_handler! { T1 T2 T3 T4 T5 }
