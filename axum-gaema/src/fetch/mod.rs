mod reqwest_rpc;

use std::{borrow::Cow, error::Error, fmt::Display, pin::Pin, sync::Arc};

use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header::CONTENT_TYPE},
};
use url::form_urlencoded;

pub use reqwest_rpc::{ReqwestRpc, default_reqwest_client};

use crate::{
    callback::{AsyncCallback, CallbackOutcome},
    error::BoxError,
};

/// An outbound request. `payload` is the request body.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub payload: Option<Bytes>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            payload: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            headers: HeaderMap::new(),
            payload: Some(body.into()),
        }
    }

    /// A url-encoded form POST.
    pub fn form<'a>(
        url: impl Into<String>,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        Self::post(url, body).header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        )
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// What the platform hands back for a completed call.
#[derive(Clone, Debug)]
pub struct RpcResult {
    pub status_code: u16,
    pub content: Bytes,
}

/// The call never produced a response.
#[derive(Debug)]
pub struct FetchError(BoxError);

impl FetchError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download error: {}", self.0)
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// The transport primitive outbound HTTP goes through.
pub trait FetchRpc: Send + Sync + 'static {
    fn make_fetch_call(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<RpcResult, FetchError>> + Send;
}

trait DynFetchRpc: Send + Sync + 'static {
    fn make_fetch_call_boxed<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RpcResult, FetchError>> + Send + 'a>>;
}

impl<T> DynFetchRpc for T
where
    T: FetchRpc,
{
    fn make_fetch_call_boxed<'a>(
        &'a self,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RpcResult, FetchError>> + Send + 'a>> {
        Box::pin(self.make_fetch_call(request))
    }
}

/// Normalized response. `error` is `None` exactly for 2xx codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub code: u16,
    pub body: Bytes,
    pub error: Option<String>,
}

impl FetchResponse {
    pub fn from_rpc(result: RpcResult) -> Self {
        let code = result.status_code;
        let error = if (200..300).contains(&code) {
            None
        } else {
            Some(format!("Error {code}"))
        };

        Self {
            code,
            body: result.content,
            error,
        }
    }

    /// Stand-in used when the transport itself failed.
    pub fn not_found() -> Self {
        Self {
            code: 404,
            body: Bytes::from_static(b"404 Not Found"),
            error: Some("Error 404".to_owned()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Outbound HTTP for the identity providers. Transport failures never
/// escape; they turn into [`FetchResponse::not_found`].
#[derive(Clone)]
pub struct AsyncHttpClient(Arc<dyn DynFetchRpc>);

impl AsyncHttpClient {
    pub fn new<R: FetchRpc>(rpc: R) -> Self {
        Self(Arc::new(rpc))
    }

    pub async fn fetch(&self, request: FetchRequest) -> FetchResponse {
        tracing::debug!(url = %request.url, method = %request.method, "fetching");

        match self.0.make_fetch_call_boxed(request).await {
            Ok(result) => FetchResponse::from_rpc(result),
            Err(e) => {
                tracing::warn!("fetch failed: {e}");
                FetchResponse::not_found()
            }
        }
    }

    /// Fetches, then hands the response to `callback` if there is one.
    pub async fn fetch_with(
        &self,
        request: FetchRequest,
        callback: Option<&AsyncCallback<FetchResponse>>,
    ) -> Option<CallbackOutcome> {
        let response = self.fetch(request).await;
        match callback {
            Some(callback) => Some(callback.invoke(response).await),
            None => None,
        }
    }
}

impl Default for AsyncHttpClient {
    fn default() -> Self {
        Self::new(ReqwestRpc::default())
    }
}
