use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};

use crate::{
    callback::AsyncCallback,
    context::GaemaContext,
    cookie::{self, CookieJar, CookieOptions, SetCookie},
    error::{AuthError, BoxError},
    fetch::AsyncHttpClient,
    outcome::Outcome,
    providers::AuthUser,
    request::RequestAdapter,
    settings::AuthSettings,
};

/// Everything an auth flow needs for one request: the request view, the
/// cookies the browser sent and the cookies queued for the response.
///
/// Return it as part of the response so the queued cookies get written.
pub struct AuthScope {
    ctx: GaemaContext,
    pub request: RequestAdapter,
    cookies: CookieJar,
    override_cookies: Vec<SetCookie>,
}

impl AuthScope {
    pub fn new(ctx: GaemaContext, parts: &Parts) -> Self {
        Self {
            ctx,
            request: RequestAdapter::from_parts(parts),
            cookies: CookieJar::from_headers(&parts.headers),
            override_cookies: Vec::new(),
        }
    }

    pub fn context(&self) -> &GaemaContext {
        &self.ctx
    }

    pub fn settings(&self) -> &AuthSettings {
        self.ctx.settings()
    }

    pub fn http(&self) -> &AsyncHttpClient {
        self.ctx.http()
    }

    pub fn require_setting(&self, name: &str, feature: &str) -> Result<&str, AuthError> {
        self.ctx.settings().require_setting(name, feature)
    }

    pub fn get_argument(
        &self,
        name: &str,
        default: Option<&str>,
        strip: bool,
    ) -> Result<String, AuthError> {
        self.request.get_argument(name, default, strip)
    }

    /// Reads a cookie the browser sent, base64 decoded.
    pub fn get_cookie(&self, name: &str, default: Option<&str>) -> Result<Option<String>, AuthError> {
        cookie::get_cookie(&self.cookies, name, default)
    }

    /// Queues a cookie for the response.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: &str, options: CookieOptions) {
        self.override_cookies
            .push(cookie::set_cookie(name, value, options));
    }

    pub fn clear_cookie(&mut self, name: impl Into<String>) {
        self.override_cookies.push(SetCookie::removal(name, Some("/")));
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn override_cookies(&self) -> &[SetCookie] {
        &self.override_cookies
    }

    pub fn redirect<T>(&self, url: impl Into<String>) -> Outcome<T> {
        Outcome::redirect(url)
    }

    pub fn async_callback<T, F, Fut, E>(&self, callback: Option<F>) -> Option<AsyncCallback<T>>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        AsyncCallback::wrap(callback)
    }

    /// The marker stored for `service`, if the visitor is logged in there.
    pub async fn current_user(&self, service: &str) -> Result<Option<AuthUser>, AuthError> {
        self.ctx.current_user(&self.cookies, service).await
    }

    pub async fn set_user(&mut self, service: &str, user: &AuthUser) -> Result<(), AuthError> {
        let cookies = self
            .ctx
            .markers()
            .persist(&self.cookies, service, user)
            .await?;
        self.override_cookies.extend(cookies);
        Ok(())
    }

    pub async fn clear_user(&mut self, service: &str) -> Result<(), AuthError> {
        let cookies = self.ctx.markers().clear(&self.cookies, service).await?;
        self.override_cookies.extend(cookies);
        Ok(())
    }

    /// Consumes the next-url cookie for `service`. Anything but a local
    /// absolute path falls back to `/`.
    pub fn take_next_url(&mut self, service: &str) -> String {
        let key = self.ctx.next_url_key(service);
        let next = match self.get_cookie(&key, None) {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!("ignoring next url: {e}");
                None
            }
        };

        if next.is_some() {
            self.clear_cookie(key);
        }

        match next {
            Some(next) if is_local_path(&next) => next,
            _ => "/".to_owned(),
        }
    }
}

pub(crate) fn is_local_path(url: &str) -> bool {
    url.starts_with('/') && !url.starts_with("//") && !url.contains('\\')
}

impl IntoResponseParts for AuthScope {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.override_cookies {
            res = cookie.into_response_parts(res)?;
        }
        Ok(res)
    }
}

impl<S> FromRequestParts<S> for AuthScope
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(ctx) = parts.extensions.get::<GaemaContext>().cloned() else {
            tracing::debug!("no GaemaContext in request extensions");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        };

        Ok(AuthScope::new(ctx, parts))
    }
}
