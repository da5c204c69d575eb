use std::{collections::HashMap, sync::Arc};

use axum::http::Method;
use base64::{Engine, prelude::BASE64_STANDARD};
use serde_json::Value;
use url::form_urlencoded;

use crate::{
    cookie::CookieOptions,
    error::{AuthError, BoxError},
    fetch::{FetchRequest, FetchResponse},
    outcome::Outcome,
    providers::{AccessToken, AuthUser, IdentityProvider, services},
    request::RequestAdapter,
    scope::AuthScope,
    settings::{
        FRIENDFEED_CONSUMER_KEY, FRIENDFEED_CONSUMER_SECRET, TWITTER_CONSUMER_KEY,
        TWITTER_CONSUMER_SECRET,
    },
};

const REQUEST_TOKEN_COOKIE: &str = "_oauth_request_token";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuth1Token {
    pub key: String,
    pub secret: String,
}

/// Produces signed OAuth 1.0a request URLs.
pub trait OAuth1Signer: Send + Sync + 'static {
    /// Returns `url` carrying `params`, the `oauth_*` protocol parameters and
    /// the signature.
    fn signed_url(
        &self,
        method: &Method,
        url: &str,
        params: &[(&str, &str)],
        consumer: &OAuth1Token,
        token: Option<&OAuth1Token>,
    ) -> Result<String, BoxError>;
}

#[derive(Clone, Debug)]
pub struct OAuth1Endpoints {
    pub request_token_url: String,
    pub access_token_url: String,
    pub authorize_url: String,
    pub api_url: String,
}

const TWITTER_SETTINGS: [&str; 2] = [TWITTER_CONSUMER_KEY, TWITTER_CONSUMER_SECRET];
const FRIENDFEED_SETTINGS: [&str; 2] = [FRIENDFEED_CONSUMER_KEY, FRIENDFEED_CONSUMER_SECRET];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OAuth1Service {
    Twitter,
    FriendFeed,
}

impl OAuth1Service {
    fn name(self) -> &'static str {
        match self {
            OAuth1Service::Twitter => services::TWITTER,
            OAuth1Service::FriendFeed => services::FRIENDFEED,
        }
    }

    fn feature(self) -> &'static str {
        match self {
            OAuth1Service::Twitter => "Twitter OAuth",
            OAuth1Service::FriendFeed => "FriendFeed OAuth",
        }
    }

    /// Consumer key and secret setting names, in that order.
    fn settings(self) -> &'static [&'static str; 2] {
        match self {
            OAuth1Service::Twitter => &TWITTER_SETTINGS,
            OAuth1Service::FriendFeed => &FRIENDFEED_SETTINGS,
        }
    }
}

/// Twitter and FriendFeed login over OAuth 1.0a.
pub struct OAuth1Provider {
    service: OAuth1Service,
    endpoints: OAuth1Endpoints,
    signer: Arc<dyn OAuth1Signer>,
}

impl OAuth1Provider {
    pub fn twitter<S: OAuth1Signer>(signer: S) -> Self {
        Self {
            service: OAuth1Service::Twitter,
            endpoints: OAuth1Endpoints {
                request_token_url: "https://api.twitter.com/oauth/request_token".into(),
                access_token_url: "https://api.twitter.com/oauth/access_token".into(),
                authorize_url: "https://api.twitter.com/oauth/authenticate".into(),
                api_url: "https://api.twitter.com/1.1".into(),
            },
            signer: Arc::new(signer),
        }
    }

    pub fn friendfeed<S: OAuth1Signer>(signer: S) -> Self {
        Self {
            service: OAuth1Service::FriendFeed,
            endpoints: OAuth1Endpoints {
                request_token_url: "https://friendfeed.com/account/oauth/request_token".into(),
                access_token_url: "https://friendfeed.com/account/oauth/access_token".into(),
                authorize_url: "https://friendfeed.com/account/oauth/authorize".into(),
                api_url: "https://friendfeed-api.com/v2".into(),
            },
            signer: Arc::new(signer),
        }
    }

    pub fn endpoints(mut self, endpoints: OAuth1Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn consumer_token(&self, scope: &AuthScope) -> Result<OAuth1Token, AuthError> {
        let [key_setting, secret_setting] = *self.service.settings();
        let feature = self.service.feature();

        Ok(OAuth1Token {
            key: scope.require_setting(key_setting, feature)?.to_owned(),
            secret: scope.require_setting(secret_setting, feature)?.to_owned(),
        })
    }

    fn sign(
        &self,
        url: &str,
        params: &[(&str, &str)],
        consumer: &OAuth1Token,
        token: Option<&OAuth1Token>,
    ) -> Result<String, AuthError> {
        self.signer
            .signed_url(&Method::GET, url, params, consumer, token)
            .map_err(|e| AuthError::Provider(format!("could not sign request: {e}")))
    }

    fn profile_url(&self, extra: &HashMap<String, String>) -> String {
        match self.service {
            OAuth1Service::Twitter => {
                format!("{}/account/verify_credentials.json", self.endpoints.api_url)
            }
            OAuth1Service::FriendFeed => {
                let username = extra.get("username").map(String::as_str).unwrap_or("me");
                format!("{}/feedinfo/{username}", self.endpoints.api_url)
            }
        }
    }

    fn user_from_profile(
        &self,
        profile: &Value,
        extra: &HashMap<String, String>,
        access_token: OAuth1Token,
    ) -> AuthUser {
        let field = |name: &str| profile.get(name).and_then(Value::as_str).map(str::to_owned);

        let (id, username, locale) = match self.service {
            OAuth1Service::Twitter => (
                field("id_str").or_else(|| extra.get("user_id").cloned()),
                field("screen_name").or_else(|| extra.get("screen_name").cloned()),
                field("lang"),
            ),
            OAuth1Service::FriendFeed => (
                field("id"),
                field("id").or_else(|| extra.get("username").cloned()),
                None,
            ),
        };

        AuthUser {
            service: self.service.name().to_owned(),
            id,
            name: field("name"),
            username,
            locale,
            access_token: Some(AccessToken {
                key: access_token.key,
                secret: Some(access_token.secret),
            }),
            ..Default::default()
        }
    }

    async fn fetch_signed(
        &self,
        scope: &AuthScope,
        url: &str,
        params: &[(&str, &str)],
        consumer: &OAuth1Token,
        token: Option<&OAuth1Token>,
    ) -> Result<FetchResponse, AuthError> {
        let url = self.sign(url, params, consumer, token)?;
        Ok(scope.http().fetch(FetchRequest::get(url)).await)
    }
}

/// Splits an `oauth_token=..&oauth_token_secret=..` body into the token and
/// whatever else the provider sent along.
fn parse_token(body: &str) -> Option<(OAuth1Token, HashMap<String, String>)> {
    let mut fields: HashMap<String, String> = form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();

    let key = fields.remove("oauth_token")?;
    let secret = fields.remove("oauth_token_secret")?;
    Some((OAuth1Token { key, secret }, fields))
}

fn encode_request_token(token: &OAuth1Token) -> String {
    format!(
        "{}|{}",
        BASE64_STANDARD.encode(&token.key),
        BASE64_STANDARD.encode(&token.secret)
    )
}

fn decode_request_token(value: &str) -> Option<OAuth1Token> {
    let (key, secret) = value.split_once('|')?;
    let key = String::from_utf8(BASE64_STANDARD.decode(key).ok()?).ok()?;
    let secret = String::from_utf8(BASE64_STANDARD.decode(secret).ok()?).ok()?;
    Some(OAuth1Token { key, secret })
}

impl IdentityProvider for OAuth1Provider {
    fn name(&self) -> &str {
        self.service.name()
    }

    fn feature(&self) -> &str {
        self.service.feature()
    }

    fn required_settings(&self) -> &[&'static str] {
        self.service.settings()
    }

    fn is_callback(&self, request: &RequestAdapter) -> bool {
        request.has_argument("oauth_token")
    }

    async fn authenticate_redirect(&self, scope: &mut AuthScope) -> Result<Outcome<()>, AuthError> {
        let consumer = self.consumer_token(scope)?;
        let callback_url = scope.request.callback_url();

        let response = self
            .fetch_signed(
                scope,
                &self.endpoints.request_token_url,
                &[("oauth_callback", &callback_url)],
                &consumer,
                None,
            )
            .await?;

        if let Some(error) = &response.error {
            return Err(AuthError::Provider(format!(
                "could not get OAuth request token: {error}"
            )));
        }

        let Some((request_token, _)) = parse_token(&response.text()) else {
            return Err(AuthError::Provider("malformed OAuth request token".into()));
        };

        scope.set_cookie(
            REQUEST_TOKEN_COOKIE,
            &encode_request_token(&request_token),
            CookieOptions::default(),
        );

        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("oauth_token", &request_token.key);
        if self.service == OAuth1Service::FriendFeed {
            query.append_pair("oauth_callback", &callback_url);
        }

        tracing::debug!("starting {} login", self.service.name());
        Ok(scope.redirect(format!(
            "{}?{}",
            self.endpoints.authorize_url,
            query.finish()
        )))
    }

    async fn get_authenticated_user(
        &self,
        scope: &mut AuthScope,
    ) -> Result<Option<AuthUser>, AuthError> {
        let request_key = scope.get_argument("oauth_token", None, true)?;

        let cookie = scope.get_cookie(REQUEST_TOKEN_COOKIE, None)?;
        scope.clear_cookie(REQUEST_TOKEN_COOKIE);

        let Some(request_token) = cookie.as_deref().and_then(decode_request_token) else {
            tracing::warn!("Missing OAuth request token cookie");
            return Ok(None);
        };

        if request_token.key != request_key {
            tracing::warn!("Request token does not match cookie");
            return Ok(None);
        }

        let consumer = self.consumer_token(scope)?;
        let verifier = scope.request.argument("oauth_verifier").map(str::to_owned);
        let params: Vec<(&str, &str)> = verifier
            .as_deref()
            .map(|v| ("oauth_verifier", v))
            .into_iter()
            .collect();

        let response = self
            .fetch_signed(
                scope,
                &self.endpoints.access_token_url,
                &params,
                &consumer,
                Some(&request_token),
            )
            .await?;
        if let Some(error) = &response.error {
            tracing::warn!("Could not fetch access token: {error}");
            return Ok(None);
        }

        let Some((access_token, extra)) = parse_token(&response.text()) else {
            tracing::warn!("Malformed access token response");
            return Ok(None);
        };

        let response = self
            .fetch_signed(
                scope,
                &self.profile_url(&extra),
                &[],
                &consumer,
                Some(&access_token),
            )
            .await?;
        if let Some(error) = &response.error {
            tracing::warn!("Could not fetch user profile: {error}");
            return Ok(None);
        }

        let profile: Value = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::Provider(format!("invalid profile response: {e}")))?;

        Ok(Some(self.user_from_profile(&profile, &extra, access_token)))
    }
}
