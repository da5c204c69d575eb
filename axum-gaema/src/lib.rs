//! Third-party login for axum applications.
//!
//! A [`GaemaContext`] holds the provider credentials and the registered
//! [`IdentityProvider`]s. Layering it onto a router mounts the login routes;
//! [`GaemaContext::login_required`] builds a layer that only lets visitors
//! through once they logged in with one of the given services.

pub mod callback;
pub mod context;
pub mod cookie;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod marker;
pub mod outcome;
pub mod providers;
pub mod request;
pub mod router_ext;
pub mod scope;
pub mod session;
pub mod settings;
pub mod urls;
pub mod views;

pub(crate) mod utils;

pub use context::{GaemaContext, GaemaContextBuilder};
pub use error::{AuthError, GaemaBuilderError};
pub use gate::{GaemaUser, LoginRequired, MarketplaceLoginRequired};
pub use marker::MarkerStorage;
pub use outcome::Outcome;
pub use providers::{AuthUser, IdentityProvider};
pub use router_ext::{AuthInjector, RouterExt};
pub use scope::AuthScope;
