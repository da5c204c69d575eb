#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use axum::{
    body::{Body, Bytes},
    http::{Request, header::COOKIE, header::SET_COOKIE},
    response::Response,
};
use axum_gaema::{
    error::BoxError,
    fetch::{FetchError, FetchRequest, FetchRpc, RpcResult},
    providers::{OAuth1Signer, OAuth1Token},
    session::{SessionData, SessionId, SessionStore},
};

/// Answers outbound fetches with canned responses, in order.
#[derive(Clone, Default)]
pub struct TestRpc {
    responses: Arc<Mutex<VecDeque<(u16, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestRpc {
    pub fn respond(self, code: u16, body: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back((code, body.into()));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl FetchRpc for TestRpc {
    async fn make_fetch_call(&self, request: FetchRequest) -> Result<RpcResult, FetchError> {
        self.requests.lock().unwrap().push(request.url);
        let (status_code, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::new("connection refused"))?;

        Ok(RpcResult {
            status_code,
            content: Bytes::from(body),
        })
    }
}

/// Puts the parameters in the query string instead of signing anything.
pub struct PlainSigner;

impl OAuth1Signer for PlainSigner {
    fn signed_url(
        &self,
        _method: &axum::http::Method,
        url: &str,
        params: &[(&str, &str)],
        consumer: &OAuth1Token,
        _token: Option<&OAuth1Token>,
    ) -> Result<String, BoxError> {
        let mut query = vec![("oauth_consumer_key", consumer.key.as_str())];
        query.extend_from_slice(params);
        Ok(format!("{url}?{}", serde_urlencoded::to_string(query)?))
    }
}

/// A session store whose backend is unreachable.
pub struct BrokenStore;

impl SessionStore for BrokenStore {
    type Error = io::Error;

    async fn load_session(&self, _id: &SessionId) -> Result<Option<SessionData>, io::Error> {
        Err(io::Error::other("backend down"))
    }

    async fn store_session(&self, _id: &SessionId, _data: SessionData) -> Result<(), io::Error> {
        Err(io::Error::other("backend down"))
    }

    async fn remove_session(&self, _id: &SessionId) -> Result<Option<SessionData>, io::Error> {
        Err(io::Error::other("backend down"))
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn get_with_cookies(uri: &str, cookies: &str) -> Request<Body> {
    Request::get(uri)
        .header(COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

pub fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

/// Turns the `Set-Cookie` headers of a response into a `Cookie` header,
/// leaving out cookies that were removed.
pub fn cookie_header(res: &Response) -> String {
    set_cookies(res)
        .iter()
        .filter(|c| !c.contains("; Max-Age=0"))
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(res: &Response) -> &str {
    res.headers()["location"].to_str().unwrap()
}

pub async fn body_string(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
