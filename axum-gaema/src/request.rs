use std::{collections::HashMap, convert::Infallible};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Uri, header::HOST, request::Parts},
};
use url::form_urlencoded;

use crate::error::AuthError;

static FORWARDED_PROTO: &str = "x-forwarded-proto";

/// The view of an incoming request the identity providers work against.
#[derive(Clone, Debug, Default)]
pub struct RequestAdapter {
    /// GET parameters, every value kept in arrival order.
    pub arguments: HashMap<String, Vec<String>>,
    pub host: String,
    pub path: String,
    scheme: String,
    query: Option<String>,
}

impl RequestAdapter {
    pub fn new(uri: &Uri, headers: &HeaderMap) -> Self {
        let mut arguments: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(query) = uri.query() {
            for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                arguments
                    .entry(name.into_owned())
                    .or_default()
                    .push(value.into_owned());
            }
        }

        let host = headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let scheme = headers
            .get(FORWARDED_PROTO)
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.scheme_str())
            .unwrap_or("http")
            .to_owned();

        Self {
            arguments,
            host,
            path: uri.path().to_owned(),
            scheme,
            query: uri.query().map(str::to_owned),
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(&parts.uri, &parts.headers)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The URL the browser used for this request, query string included.
    pub fn full_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.callback_url()),
            None => self.callback_url(),
        }
    }

    /// Path and query string, without scheme and host.
    pub fn local_url(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// The current URL without its query string.
    pub fn callback_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// `scheme://host/`, used as the OpenID realm.
    pub fn base_url(&self) -> String {
        format!("{}://{}/", self.scheme, self.host)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// The last value supplied for `name`.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Returns the GET argument `name`.
    ///
    /// Without a default the argument is required and its absence is an
    /// [`AuthError::MissingArgument`]. When the argument was given more than
    /// once, the last value wins. `strip` trims surrounding whitespace off a
    /// supplied value; a default is returned as is.
    pub fn get_argument(
        &self,
        name: &str,
        default: Option<&str>,
        strip: bool,
    ) -> Result<String, AuthError> {
        match (self.argument(name), default) {
            (Some(value), _) if strip => Ok(value.trim().to_owned()),
            (Some(value), _) => Ok(value.to_owned()),
            (None, Some(default)) => Ok(default.to_owned()),
            (None, None) => Err(AuthError::MissingArgument(name.to_owned())),
        }
    }
}

impl<S> FromRequestParts<S> for RequestAdapter
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestAdapter::from_parts(parts))
    }
}
