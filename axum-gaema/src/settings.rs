use std::collections::HashMap;

use crate::{error::AuthError, utils::get_env};

pub const GOOGLE_CONSUMER_KEY: &str = "google_consumer_key";
pub const GOOGLE_CONSUMER_SECRET: &str = "google_consumer_secret";
pub const TWITTER_CONSUMER_KEY: &str = "twitter_consumer_key";
pub const TWITTER_CONSUMER_SECRET: &str = "twitter_consumer_secret";
pub const FRIENDFEED_CONSUMER_KEY: &str = "friendfeed_consumer_key";
pub const FRIENDFEED_CONSUMER_SECRET: &str = "friendfeed_consumer_secret";
pub const FACEBOOK_API_KEY: &str = "facebook_api_key";
pub const FACEBOOK_SECRET: &str = "facebook_secret";

/// Provider credentials, supplied once when the context is built.
#[derive(Clone, Debug, Default)]
pub struct AuthSettings {
    values: HashMap<String, String>,
}

impl AuthSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set_env(self, name: impl Into<String>, env_name: &str) -> Self {
        self.set(name, get_env(env_name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fails unless `name` is set to a non-empty value.
    pub fn require_setting(&self, name: &str, feature: &str) -> Result<&str, AuthError> {
        match self.get(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(AuthError::MissingSetting {
                name: name.to_string(),
                feature: feature.to_string(),
            }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for AuthSettings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
