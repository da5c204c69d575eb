use std::{error::Error, fmt::Display};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum AuthError {
    /// A required GET argument was not supplied.
    MissingArgument(String),
    MissingSetting {
        name: String,
        feature: String,
    },
    UnknownService(String),
    /// The marker backend failed while looking up or persisting a user.
    Storage(BoxError),
    /// The identity provider answered with something we can't use.
    Provider(String),
    InvalidCookie(String),
    /// The provider flow finished without a user.
    Unauthenticated(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingArgument(_) | AuthError::InvalidCookie(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownService(_) => StatusCode::NOT_FOUND,
            AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::MissingSetting { .. } | AuthError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub(crate) fn storage(err: impl Into<BoxError>) -> Self {
        AuthError::Storage(err.into())
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingArgument(name) => write!(f, "Missing request argument {name}"),
            AuthError::MissingSetting { name, feature } => write!(
                f,
                "You must define the \"{name}\" setting in your application to use {feature}"
            ),
            AuthError::UnknownService(name) => write!(f, "unknown service: {name}"),
            AuthError::Storage(source) => {
                write!(f, "Getting gaema_user failed, reason: {source}")
            }
            AuthError::Provider(msg) => write!(f, "identity provider error: {msg}"),
            AuthError::InvalidCookie(name) => write!(f, "cookie {name} could not be decoded"),
            AuthError::Unauthenticated(service) => {
                write!(f, "authentication with {service} failed")
            }
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Storage(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::debug!("request failed: {self}");
        }
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug)]
pub enum GaemaBuilderError {
    InvalidServiceName(String),
    DuplicateService(String),
    UnknownValidService(String),
    InvalidUrlPrefix(String),
    InvalidCookiePrefix(String),
}

impl Error for GaemaBuilderError {}

impl Display for GaemaBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GaemaBuilderError::InvalidServiceName(name) => write!(
                f,
                "service name {name:?} may only contain ascii letters, digits and underscores"
            ),
            GaemaBuilderError::DuplicateService(name) => {
                write!(f, "service {name} is registered twice")
            }
            GaemaBuilderError::UnknownValidService(name) => {
                write!(f, "valid service {name} has no registered provider")
            }
            GaemaBuilderError::InvalidUrlPrefix(prefix) => {
                write!(f, "url prefix {prefix:?} must start with '/' and not end with one")
            }
            GaemaBuilderError::InvalidCookiePrefix(prefix) => write!(
                f,
                "cookie prefix {prefix:?} may only contain ascii letters, digits and underscores"
            ),
        }
    }
}

#[cfg(test)]
mod error {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::AuthError;

    #[test]
    fn status_codes() {
        let res = AuthError::MissingArgument("openid.mode".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = AuthError::storage("backend down").into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = AuthError::UnknownService("myspace".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn messages() {
        let err = AuthError::MissingSetting {
            name: "twitter_consumer_key".into(),
            feature: "Twitter OAuth".into(),
        };
        assert_eq!(
            err.to_string(),
            "You must define the \"twitter_consumer_key\" setting in your application to use Twitter OAuth"
        );

        let err = AuthError::storage("backend down");
        assert_eq!(
            err.to_string(),
            "Getting gaema_user failed, reason: backend down"
        );
    }
}
