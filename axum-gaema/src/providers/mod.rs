mod facebook;
mod google;
mod oauth1;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use facebook::Facebook;
pub use google::GoogleOpenId;
pub use oauth1::{OAuth1Endpoints, OAuth1Provider, OAuth1Signer, OAuth1Token};

use crate::{
    error::AuthError, outcome::Outcome, request::RequestAdapter, scope::AuthScope,
    settings::AuthSettings,
};

pub mod services {
    pub const GOOGLE: &str = "google";
    pub const FACEBOOK: &str = "facebook";
    pub const TWITTER: &str = "twitter";
    pub const FRIENDFEED: &str = "friendfeed";
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub service: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub locale: Option<String>,
    pub username: Option<String>,
    pub access_token: Option<AccessToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub key: String,
    pub secret: Option<String>,
}

/// A third-party login service.
///
/// Starting a login redirects the browser to the provider; the provider
/// sends the browser back to the same route carrying arguments for which
/// [`IdentityProvider::is_callback`] is true, and the flow finishes with
/// [`IdentityProvider::get_authenticated_user`].
pub trait IdentityProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Human readable name used in configuration errors.
    fn feature(&self) -> &str {
        self.name()
    }

    /// Settings that must be present before the provider is used.
    fn required_settings(&self) -> &[&'static str] {
        &[]
    }

    fn is_callback(&self, request: &RequestAdapter) -> bool;

    fn authenticate_redirect(
        &self,
        scope: &mut AuthScope,
    ) -> impl Future<Output = Result<Outcome<()>, AuthError>> + Send;

    /// `Ok(None)` when the provider turned the visitor down.
    fn get_authenticated_user(
        &self,
        scope: &mut AuthScope,
    ) -> impl Future<Output = Result<Option<AuthUser>, AuthError>> + Send;
}

trait DynIdentityProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn feature(&self) -> &str;

    fn required_settings(&self) -> &[&'static str];

    fn is_callback(&self, request: &RequestAdapter) -> bool;

    fn authenticate_redirect_boxed<'a>(
        &'a self,
        scope: &'a mut AuthScope,
    ) -> BoxFuture<'a, Result<Outcome<()>, AuthError>>;

    fn get_authenticated_user_boxed<'a>(
        &'a self,
        scope: &'a mut AuthScope,
    ) -> BoxFuture<'a, Result<Option<AuthUser>, AuthError>>;
}

impl<T> DynIdentityProvider for T
where
    T: IdentityProvider,
{
    fn name(&self) -> &str {
        IdentityProvider::name(self)
    }

    fn feature(&self) -> &str {
        IdentityProvider::feature(self)
    }

    fn required_settings(&self) -> &[&'static str] {
        IdentityProvider::required_settings(self)
    }

    fn is_callback(&self, request: &RequestAdapter) -> bool {
        IdentityProvider::is_callback(self, request)
    }

    fn authenticate_redirect_boxed<'a>(
        &'a self,
        scope: &'a mut AuthScope,
    ) -> BoxFuture<'a, Result<Outcome<()>, AuthError>> {
        Box::pin(self.authenticate_redirect(scope))
    }

    fn get_authenticated_user_boxed<'a>(
        &'a self,
        scope: &'a mut AuthScope,
    ) -> BoxFuture<'a, Result<Option<AuthUser>, AuthError>> {
        Box::pin(self.get_authenticated_user(scope))
    }
}

#[derive(Clone)]
pub struct ErasedProvider(Arc<dyn DynIdentityProvider>);

impl ErasedProvider {
    pub fn new<P: IdentityProvider>(provider: P) -> Self {
        Self(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn feature(&self) -> &str {
        self.0.feature()
    }

    pub fn required_settings(&self) -> &[&'static str] {
        self.0.required_settings()
    }

    pub fn check_settings(&self, settings: &AuthSettings) -> Result<(), AuthError> {
        for name in self.required_settings() {
            settings.require_setting(name, self.feature())?;
        }
        Ok(())
    }

    pub fn is_callback(&self, request: &RequestAdapter) -> bool {
        self.0.is_callback(request)
    }

    pub async fn authenticate_redirect(
        &self,
        scope: &mut AuthScope,
    ) -> Result<Outcome<()>, AuthError> {
        self.0.authenticate_redirect_boxed(scope).await
    }

    pub async fn get_authenticated_user(
        &self,
        scope: &mut AuthScope,
    ) -> Result<Option<AuthUser>, AuthError> {
        self.0.get_authenticated_user_boxed(scope).await
    }
}
