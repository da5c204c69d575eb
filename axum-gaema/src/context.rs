use std::{borrow::Cow, collections::HashSet, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::{
    callback::AsyncCallback,
    cookie::{CookieJar, CookieSigner},
    error::{AuthError, BoxError, GaemaBuilderError},
    fetch::{AsyncHttpClient, FetchRpc},
    gate::{LoginRequired, MarketplaceLoginRequired},
    marker::{MarkerStorage, Markers},
    providers::{AuthUser, ErasedProvider, GoogleOpenId, IdentityProvider},
    session::{DEFAULT_SESSION_COOKIE_NAME, ErasedStore, MemStore, SessionBackend, SessionStore},
    settings::AuthSettings,
    utils::{get_env, is_domain, is_word},
};

pub const DEFAULT_URL_PREFIX: &str = "/gaema";
pub const DEFAULT_MARKER_PREFIX: &str = "gaema_user";
pub const DEFAULT_NEXT_URL_PREFIX: &str = "gaema_next_url";

/// Configuration shared by the login gate, the views and the URL helpers.
#[derive(Clone)]
pub struct GaemaContext(Arc<GaemaContextInner>);

struct GaemaContextInner {
    settings: AuthSettings,
    providers: Vec<ErasedProvider>,
    valid_services: Vec<String>,
    markers: Markers,
    http: AsyncHttpClient,
    url_prefix: Cow<'static, str>,
    next_url_prefix: Cow<'static, str>,
    on_login: Option<AsyncCallback<AuthUser>>,
}

impl GaemaContext {
    pub fn builder() -> GaemaContextBuilder {
        GaemaContextBuilder::new()
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.0.settings
    }

    pub fn http(&self) -> &AsyncHttpClient {
        &self.0.http
    }

    /// The provider registered for `service`, as long as the service is
    /// one of the valid ones.
    pub fn provider(&self, service: &str) -> Result<&ErasedProvider, AuthError> {
        if !self.is_valid_service(service) {
            return Err(AuthError::UnknownService(service.to_owned()));
        }

        self.0
            .providers
            .iter()
            .find(|p| p.name() == service)
            .ok_or_else(|| AuthError::UnknownService(service.to_owned()))
    }

    /// Google Apps login for `domain`.
    pub fn marketplace_provider(&self, domain: &str) -> Result<ErasedProvider, AuthError> {
        if !is_domain(domain) {
            return Err(AuthError::UnknownService(domain.to_owned()));
        }
        Ok(ErasedProvider::new(GoogleOpenId::apps(domain)))
    }

    /// Valid services in the order they were configured.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.0.valid_services.iter().map(String::as_str)
    }

    pub fn is_valid_service(&self, service: &str) -> bool {
        self.0.valid_services.iter().any(|s| s == service)
    }

    pub fn storage(&self) -> MarkerStorage {
        self.0.markers.storage()
    }

    pub(crate) fn markers(&self) -> &Markers {
        &self.0.markers
    }

    pub fn url_prefix(&self) -> &str {
        &self.0.url_prefix
    }

    pub fn marker_key(&self, service: &str) -> String {
        self.0.markers.key(service)
    }

    pub fn next_url_key(&self, service: &str) -> String {
        format!("{}_{service}", self.0.next_url_prefix)
    }

    /// Looks up the marker for `service` in the cookies or the session the
    /// browser sent.
    pub async fn current_user(
        &self,
        jar: &CookieJar,
        service: &str,
    ) -> Result<Option<AuthUser>, AuthError> {
        self.0.markers.lookup(jar, service).await
    }

    pub fn on_login(&self) -> Option<&AsyncCallback<AuthUser>> {
        self.0.on_login.as_ref()
    }

    /// A layer letting requests through only when the visitor is logged in
    /// with one of `services`.
    pub fn login_required<I, T>(&self, services: I) -> LoginRequired
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        LoginRequired::new(self.clone(), services)
    }

    /// A layer for routes carrying a `{domain_name}` path segment, letting
    /// requests through only when the visitor is logged in to that Google
    /// Apps domain.
    pub fn marketplace_login_required(&self) -> MarketplaceLoginRequired {
        MarketplaceLoginRequired::new(self.clone())
    }
}

impl<S> FromRequestParts<S> for GaemaContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<GaemaContext>().cloned().ok_or_else(|| {
            tracing::debug!("no GaemaContext in request extensions");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

pub struct GaemaContextBuilder {
    settings: AuthSettings,
    providers: Vec<ErasedProvider>,
    valid_services: Option<Vec<String>>,
    storage: MarkerStorage,
    secret_key: Option<Vec<u8>>,
    url_prefix: Cow<'static, str>,
    session_store: Option<ErasedStore>,
    session_cookie_name: Cow<'static, str>,
    http: Option<AsyncHttpClient>,
    on_login: Option<AsyncCallback<AuthUser>>,
    marker_prefix: Cow<'static, str>,
    next_url_prefix: Cow<'static, str>,
}

impl GaemaContextBuilder {
    pub fn new() -> Self {
        Self {
            settings: AuthSettings::new(),
            providers: Vec::new(),
            valid_services: None,
            storage: MarkerStorage::default(),
            secret_key: None,
            url_prefix: Cow::Borrowed(DEFAULT_URL_PREFIX),
            session_store: None,
            session_cookie_name: Cow::Borrowed(DEFAULT_SESSION_COOKIE_NAME),
            http: None,
            on_login: None,
            marker_prefix: Cow::Borrowed(DEFAULT_MARKER_PREFIX),
            next_url_prefix: Cow::Borrowed(DEFAULT_NEXT_URL_PREFIX),
        }
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings = self.settings.set(name, value);
        self
    }

    pub fn setting_env(mut self, name: impl Into<String>, env_name: &str) -> Self {
        self.settings = self.settings.set_env(name, env_name);
        self
    }

    pub fn settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn provider<P: IdentityProvider>(mut self, provider: P) -> Self {
        self.providers.push(ErasedProvider::new(provider));
        self
    }

    /// Restricts login to these services. Defaults to every registered
    /// provider.
    pub fn valid_services<I, T>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.valid_services = Some(services.into_iter().map(Into::into).collect());
        self
    }

    pub fn storage(mut self, storage: MarkerStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn cookie_storage(self) -> Self {
        self.storage(MarkerStorage::Cookie)
    }

    /// The default
    pub fn session_storage(self) -> Self {
        self.storage(MarkerStorage::Session)
    }

    /// Key for signing marker cookies. A random key is used when unset, so
    /// cookie markers don't survive a restart.
    pub fn secret_key(mut self, secret: impl AsRef<[u8]>) -> Self {
        self.secret_key = Some(secret.as_ref().to_vec());
        self
    }

    pub fn secret_key_env(self, name: &str) -> Self {
        self.secret_key(get_env(name))
    }

    /// Where the login routes are mounted. An empty prefix mounts them at
    /// the root.
    pub fn url_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn session_store<S: SessionStore>(mut self, store: S) -> Self {
        self.session_store = Some(ErasedStore::new(store));
        self
    }

    pub fn session_cookie_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.session_cookie_name = name.into();
        self
    }

    pub fn rpc<R: FetchRpc>(mut self, rpc: R) -> Self {
        self.http = Some(AsyncHttpClient::new(rpc));
        self
    }

    pub fn http_client(mut self, http: AsyncHttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Called with the user after every successful login. Failures are
    /// logged and don't affect the response.
    pub fn on_login<F, Fut, E>(mut self, callback: F) -> Self
    where
        F: Fn(AuthUser) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on_login = Some(AsyncCallback::new(callback));
        self
    }

    pub fn marker_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.marker_prefix = prefix.into();
        self
    }

    pub fn next_url_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.next_url_prefix = prefix.into();
        self
    }

    pub fn build(self) -> GaemaContext {
        self.try_build().unwrap()
    }

    pub fn try_build(self) -> Result<GaemaContext, GaemaBuilderError> {
        let mut registered = HashSet::new();
        for provider in &self.providers {
            let name = provider.name();
            if !is_word(name) {
                return Err(GaemaBuilderError::InvalidServiceName(name.to_owned()));
            }
            if !registered.insert(name.to_owned()) {
                return Err(GaemaBuilderError::DuplicateService(name.to_owned()));
            }
        }

        let valid_services = match self.valid_services {
            Some(services) => {
                if let Some(unknown) = services.iter().find(|s| !registered.contains(*s)) {
                    return Err(GaemaBuilderError::UnknownValidService(unknown.clone()));
                }
                services
            }
            None => self
                .providers
                .iter()
                .map(|p| p.name().to_owned())
                .collect(),
        };

        let prefix = &self.url_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(GaemaBuilderError::InvalidUrlPrefix(prefix.to_string()));
        }

        for cookie_prefix in [&self.marker_prefix, &self.next_url_prefix] {
            if !is_word(cookie_prefix) {
                return Err(GaemaBuilderError::InvalidCookiePrefix(
                    cookie_prefix.to_string(),
                ));
            }
        }

        let signer = match &self.secret_key {
            Some(secret) => CookieSigner::new(secret),
            None => CookieSigner::random(),
        };

        let session = SessionBackend::new(
            self.session_store
                .unwrap_or_else(|| ErasedStore::new(MemStore::new())),
            self.session_cookie_name,
        );

        Ok(GaemaContext(Arc::new(GaemaContextInner {
            settings: self.settings,
            providers: self.providers,
            valid_services,
            markers: Markers::new(self.storage, self.marker_prefix, signer, session),
            http: self.http.unwrap_or_default(),
            url_prefix: self.url_prefix,
            next_url_prefix: self.next_url_prefix,
            on_login: self.on_login,
        })))
    }
}

impl Default for GaemaContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod context {
    use crate::{
        error::{AuthError, GaemaBuilderError},
        marker::MarkerStorage,
        providers::{Facebook, GoogleOpenId},
    };

    use super::GaemaContext;

    #[test]
    fn defaults() {
        let ctx = GaemaContext::builder()
            .provider(GoogleOpenId::new())
            .provider(Facebook::new())
            .build();

        assert_eq!(ctx.url_prefix(), "/gaema");
        assert_eq!(ctx.storage(), MarkerStorage::Session);
        assert_eq!(ctx.services().collect::<Vec<_>>(), ["google", "facebook"]);
        assert_eq!(ctx.marker_key("google"), "gaema_user_google");
        assert_eq!(ctx.next_url_key("google"), "gaema_next_url_google");
    }

    #[test]
    fn valid_services_restrict_providers() {
        let ctx = GaemaContext::builder()
            .provider(GoogleOpenId::new())
            .provider(Facebook::new())
            .valid_services(["facebook"])
            .build();

        assert!(ctx.provider("facebook").is_ok());
        assert!(matches!(
            ctx.provider("google"),
            Err(AuthError::UnknownService(name)) if name == "google"
        ));
        assert!(matches!(
            ctx.provider("myspace"),
            Err(AuthError::UnknownService(_))
        ));
    }

    #[test]
    fn builder_validation() {
        let err = GaemaContext::builder()
            .provider(GoogleOpenId::new())
            .provider(GoogleOpenId::new())
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(err, GaemaBuilderError::DuplicateService(_)));

        let err = GaemaContext::builder()
            .provider(GoogleOpenId::new())
            .valid_services(["twitter"])
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(err, GaemaBuilderError::UnknownValidService(s) if s == "twitter"));

        let err = GaemaContext::builder()
            .url_prefix("/auth/")
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(err, GaemaBuilderError::InvalidUrlPrefix(_)));

        let err = GaemaContext::builder()
            .provider(GoogleOpenId::apps("example.com"))
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(err, GaemaBuilderError::InvalidServiceName(_)));

        let err = GaemaContext::builder()
            .marker_prefix("user marker")
            .try_build()
            .err()
            .unwrap();
        assert!(matches!(err, GaemaBuilderError::InvalidCookiePrefix(_)));

        assert!(GaemaContext::builder().url_prefix("").try_build().is_ok());
    }

    #[test]
    fn marketplace_domains() {
        let ctx = GaemaContext::builder().build();

        let provider = ctx.marketplace_provider("example.com").unwrap();
        assert_eq!(provider.name(), "example.com");
        assert!(ctx.marketplace_provider("../etc").is_err());
    }
}
