use std::borrow::Cow;

use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse as _, TokenUrl, basic::BasicClient,
    reqwest::Client as HttpClient,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use crate::{
    cookie::CookieOptions,
    error::AuthError,
    fetch::{FetchRequest, default_reqwest_client},
    outcome::Outcome,
    providers::{AccessToken, AuthUser, IdentityProvider, services},
    request::RequestAdapter,
    scope::AuthScope,
    settings::{FACEBOOK_API_KEY, FACEBOOK_SECRET},
};

pub const AUTH_URL: &str = "https://www.facebook.com/dialog/oauth";
pub const TOKEN_URL: &str = "https://graph.facebook.com/oauth/access_token";
pub const GRAPH_URL: &str = "https://graph.facebook.com";

const STATE_COOKIE: &str = "_oauth_state_facebook";
const PROFILE_FIELDS: &str = "id,name,first_name,last_name,locale,email";
const FEATURE: &str = "Facebook Connect";

type FacebookClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Facebook login through the OAuth2 authorization code flow.
pub struct Facebook {
    scopes: Vec<Scope>,
    auth_url: String,
    token_url: String,
    graph_url: String,
    http_client: HttpClient,
}

#[derive(Deserialize)]
struct FacebookProfile {
    id: String,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    locale: Option<String>,
    email: Option<String>,
}

impl Facebook {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            auth_url: AUTH_URL.to_owned(),
            token_url: TOKEN_URL.to_owned(),
            graph_url: GRAPH_URL.to_owned(),
            http_client: default_reqwest_client(),
        }
    }

    pub fn scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| Scope::new(s.to_string())).collect();
        self
    }

    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn graph_url(mut self, graph_url: impl Into<String>) -> Self {
        self.graph_url = graph_url.into();
        self
    }

    pub fn http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = http_client;
        self
    }

    fn client(&self, scope: &AuthScope) -> Result<FacebookClient, AuthError> {
        let client_id = scope.require_setting(FACEBOOK_API_KEY, FEATURE)?;
        let client_secret = scope.require_setting(FACEBOOK_SECRET, FEATURE)?;

        let auth_url = AuthUrl::new(self.auth_url.clone())
            .map_err(|e| AuthError::Provider(format!("invalid authorization url: {e}")))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| AuthError::Provider(format!("invalid token url: {e}")))?;

        Ok(BasicClient::new(ClientId::new(client_id.to_owned()))
            .set_client_secret(ClientSecret::new(client_secret.to_owned()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url))
    }

    fn redirect_url(request: &RequestAdapter) -> Result<RedirectUrl, AuthError> {
        RedirectUrl::new(request.callback_url())
            .map_err(|e| AuthError::Provider(format!("invalid redirect url: {e}")))
    }

    fn profile_url(&self, access_token: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("fields", PROFILE_FIELDS)
            .append_pair("access_token", access_token)
            .finish();
        format!("{}/me?{query}", self.graph_url)
    }
}

impl Default for Facebook {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for Facebook {
    fn name(&self) -> &str {
        services::FACEBOOK
    }

    fn feature(&self) -> &str {
        FEATURE
    }

    fn required_settings(&self) -> &[&'static str] {
        &[FACEBOOK_API_KEY, FACEBOOK_SECRET]
    }

    fn is_callback(&self, request: &RequestAdapter) -> bool {
        request.has_argument("code") || request.has_argument("error")
    }

    async fn authenticate_redirect(&self, scope: &mut AuthScope) -> Result<Outcome<()>, AuthError> {
        let client = self.client(scope)?;
        let redirect_url = Self::redirect_url(&scope.request)?;

        let (url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.clone())
            .set_redirect_uri(Cow::Owned(redirect_url))
            .url();

        scope.set_cookie(STATE_COOKIE, csrf_token.secret(), CookieOptions::default());

        tracing::debug!("starting facebook login");
        Ok(scope.redirect(url.as_str()))
    }

    async fn get_authenticated_user(
        &self,
        scope: &mut AuthScope,
    ) -> Result<Option<AuthUser>, AuthError> {
        if let Some(error) = scope.request.argument("error") {
            tracing::debug!("facebook login denied: {error}");
            return Ok(None);
        }

        let code = scope.get_argument("code", None, true)?;
        let state = scope.get_argument("state", None, true)?;

        let stored = scope.get_cookie(STATE_COOKIE, None)?;
        scope.clear_cookie(STATE_COOKIE);

        let Some(stored) = stored else {
            tracing::warn!("missing OAuth state cookie");
            return Ok(None);
        };

        if !bool::from(stored.as_bytes().ct_eq(state.as_bytes())) {
            tracing::warn!("OAuth state does not match cookie");
            return Ok(None);
        }

        let client = self.client(scope)?;
        let redirect_url = Self::redirect_url(&scope.request)?;

        tracing::debug!("exchanging facebook code for an access token");
        let token_response = match client
            .exchange_code(AuthorizationCode::new(code))
            .set_redirect_uri(Cow::Owned(redirect_url))
            .request_async(&self.http_client)
            .await
        {
            Ok(res) => res,
            Err(e) => {
                tracing::warn!("failed to exchange code for access token: {e}");
                return Ok(None);
            }
        };
        let access_token = token_response.access_token().secret().clone();

        let response = scope
            .http()
            .fetch(FetchRequest::get(self.profile_url(&access_token)))
            .await;
        if let Some(error) = &response.error {
            tracing::warn!("could not fetch facebook profile: {error}");
            return Ok(None);
        }

        let profile: FacebookProfile = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::Provider(format!("invalid facebook profile: {e}")))?;

        Ok(Some(AuthUser {
            service: services::FACEBOOK.to_owned(),
            id: Some(profile.id),
            name: profile.name,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            locale: profile.locale,
            username: None,
            access_token: Some(AccessToken {
                key: access_token,
                secret: None,
            }),
        }))
    }
}

#[cfg(test)]
mod facebook {
    use super::Facebook;

    #[test]
    fn profile_url() {
        let url = Facebook::new()
            .graph_url("http://graph.test")
            .profile_url("to ken");
        assert_eq!(
            url,
            "http://graph.test/me?fields=id%2Cname%2Cfirst_name%2Clast_name%2Clocale%2Cemail&access_token=to+ken"
        );
    }
}
