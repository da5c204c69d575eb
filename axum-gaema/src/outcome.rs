use axum::response::{IntoResponse, Redirect, Response};

/// Result of an auth step: keep going with a value, or send the browser
/// somewhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Continue(T),
    Redirect(String),
}

impl<T> Outcome<T> {
    pub fn redirect(url: impl Into<String>) -> Self {
        Outcome::Redirect(url.into())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirect(_))
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Outcome::Redirect(url) => Some(url),
            Outcome::Continue(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Continue(value) => Outcome::Continue(f(value)),
            Outcome::Redirect(url) => Outcome::Redirect(url),
        }
    }
}

impl<T: IntoResponse> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Outcome::Continue(value) => value.into_response(),
            Outcome::Redirect(url) => Redirect::to(&url).into_response(),
        }
    }
}
