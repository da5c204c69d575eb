mod signed;

use std::convert::Infallible;

use axum::{
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponseParts, ResponseParts},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use cookie_monster::{Cookie, Expires};
pub use cookie_monster::{CookieJar, SameSite};

pub(crate) use signed::CookieSigner;

use crate::error::AuthError;

/// Attributes for [`set_cookie`]. The path defaults to `/`, cookies are
/// `HttpOnly` with `SameSite=Lax` unless told otherwise.
#[derive(Clone, Debug)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub expires_days: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            domain: None,
            expires: None,
            path: Some("/".to_owned()),
            expires_days: None,
            http_only: true,
            secure: false,
            // must be sent on the top-level redirect back from the provider
            same_site: Some(SameSite::Lax),
        }
    }
}

impl CookieOptions {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn no_path(mut self) -> Self {
        self.path = None;
        self
    }

    /// Ignored when an explicit expiry is set. A date past what chrono can
    /// represent leaves the cookie without an expiry.
    pub fn expires_days(mut self, days: i64) -> Self {
        self.expires_days = Some(days);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        match (self.expires, self.expires_days) {
            (Some(expires), _) => Some(expires),
            (None, Some(days)) => {
                TimeDelta::try_days(days).and_then(|days| Utc::now().checked_add_signed(days))
            }
            (None, None) => None,
        }
    }
}

/// One `Set-Cookie` header, with the value already base64 encoded.
#[derive(Clone, Debug, PartialEq)]
pub struct SetCookie(Cookie);

/// Builds the `Set-Cookie` header storing `value` under `name`.
pub fn set_cookie(name: impl Into<String>, value: &str, options: CookieOptions) -> SetCookie {
    let mut cookie = Cookie::build(name.into(), encode_value(value))
        .set_http_only(options.http_only)
        .set_secure(options.secure)
        .same_site(options.same_site);

    if let Some(expires) = options.expiry() {
        cookie = cookie.expires(expires);
    }
    if let Some(path) = options.path.filter(|p| !p.is_empty()) {
        cookie = cookie.path(path);
    }
    if let Some(domain) = options.domain.filter(|d| !d.is_empty()) {
        cookie = cookie.domain(domain);
    }

    SetCookie(cookie.build())
}

impl SetCookie {
    /// Expires the cookie in the browser.
    pub fn removal(name: impl Into<String>, path: Option<&str>) -> Self {
        let mut cookie = Cookie::build(name.into(), "")
            .max_age_secs(0)
            .expires(Expires::Remove);
        if let Some(path) = path {
            cookie = cookie.path(path.to_owned());
        }
        SetCookie(cookie.build())
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn encoded_value(&self) -> &str {
        self.0.value()
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.0.expires_chrono()
    }

    pub fn http_only(&self) -> bool {
        self.0.http_only()
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.0.same_site()
    }

    /// `<name>=<base64>[; Domain=<domain>][; Path=<path>]` followed by the
    /// flags and `Expires`, as written by cookie-monster.
    pub fn header_value(&self) -> Result<String, cookie_monster::Error> {
        self.0.serialize()
    }
}

impl IntoResponseParts for SetCookie {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let header = self
            .header_value()
            .map_err(|e| e.to_string())
            .and_then(|v| HeaderValue::from_str(&v).map_err(|e| e.to_string()));

        match header {
            Ok(value) => {
                res.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("dropping cookie {}: {e}", self.name()),
        }
        Ok(res)
    }
}

pub fn encode_value(value: &str) -> String {
    BASE64_STANDARD.encode(value)
}

pub fn decode_value(name: &str, raw: &str) -> Result<String, AuthError> {
    let bytes = BASE64_STANDARD
        .decode(raw)
        .map_err(|_| AuthError::InvalidCookie(name.to_owned()))?;

    String::from_utf8(bytes).map_err(|_| AuthError::InvalidCookie(name.to_owned()))
}

/// Reads and decodes cookie `name`, falling back to `default` when the
/// browser didn't send it.
pub fn get_cookie(
    jar: &CookieJar,
    name: &str,
    default: Option<&str>,
) -> Result<Option<String>, AuthError> {
    match jar.get(name) {
        Some(cookie) => decode_value(name, cookie.value()).map(Some),
        None => Ok(default.map(str::to_owned)),
    }
}
