use std::borrow::Cow;

use crate::{
    cookie::{CookieJar, CookieOptions, CookieSigner, SetCookie, get_cookie, set_cookie},
    error::AuthError,
    providers::AuthUser,
    session::SessionBackend,
};

/// Where the "logged in" marker for a service is kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarkerStorage {
    /// A signed cookie per service.
    Cookie,
    /// An entry in the server-side session.
    #[default]
    Session,
}

#[derive(Clone)]
pub(crate) struct Markers {
    storage: MarkerStorage,
    prefix: Cow<'static, str>,
    signer: CookieSigner,
    session: SessionBackend,
}

impl Markers {
    pub fn new(
        storage: MarkerStorage,
        prefix: Cow<'static, str>,
        signer: CookieSigner,
        session: SessionBackend,
    ) -> Self {
        Self {
            storage,
            prefix,
            signer,
            session,
        }
    }

    pub fn storage(&self) -> MarkerStorage {
        self.storage
    }

    /// `<prefix>_<service>`
    pub fn key(&self, service: &str) -> String {
        format!("{}_{service}", self.prefix)
    }

    pub async fn lookup(
        &self,
        jar: &CookieJar,
        service: &str,
    ) -> Result<Option<AuthUser>, AuthError> {
        let key = self.key(service);

        let payload = match self.storage {
            MarkerStorage::Cookie => {
                let value = match get_cookie(jar, &key, None) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!("ignoring marker cookie: {e}");
                        None
                    }
                };
                value.and_then(|v| self.signer.verify(&v).map(str::to_owned))
            }
            MarkerStorage::Session => self.session.get(jar, &key).await?,
        };

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::debug!("discarding unreadable marker for {service}: {e}");
                Ok(None)
            }
        }
    }

    /// Stores the marker, returning the cookies the browser has to receive.
    pub async fn persist(
        &self,
        jar: &CookieJar,
        service: &str,
        user: &AuthUser,
    ) -> Result<Vec<SetCookie>, AuthError> {
        let key = self.key(service);
        let payload = serde_json::to_string(user).map_err(AuthError::storage)?;

        match self.storage {
            MarkerStorage::Cookie => {
                let value = self.signer.sign(&payload);
                Ok(vec![set_cookie(key, &value, CookieOptions::default())])
            }
            MarkerStorage::Session => {
                let cookie = self.session.insert(jar, &key, payload).await?;
                Ok(vec![cookie])
            }
        }
    }

    pub async fn clear(&self, jar: &CookieJar, service: &str) -> Result<Vec<SetCookie>, AuthError> {
        let key = self.key(service);

        match self.storage {
            MarkerStorage::Cookie => Ok(vec![SetCookie::removal(key, Some("/"))]),
            MarkerStorage::Session => {
                self.session.remove(jar, &key).await?;
                Ok(Vec::new())
            }
        }
    }
}
