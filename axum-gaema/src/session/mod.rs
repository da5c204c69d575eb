mod id;
mod store;

use std::borrow::Cow;

pub use id::SessionId;
pub(crate) use store::ErasedStore;
pub use store::{MemStore, SessionData, SessionStore};

use crate::{
    cookie::{CookieJar, CookieOptions, SetCookie, get_cookie, set_cookie},
    error::AuthError,
};

pub(crate) static DEFAULT_SESSION_COOKIE_NAME: &str = "gaema-session";

/// Session storage as seen by the marker code: a session id cookie pointing
/// into a [`SessionStore`].
#[derive(Clone)]
pub(crate) struct SessionBackend {
    store: ErasedStore,
    cookie_name: Cow<'static, str>,
}

impl SessionBackend {
    pub fn new(store: ErasedStore, cookie_name: Cow<'static, str>) -> Self {
        Self { store, cookie_name }
    }

    pub fn session_id(&self, jar: &CookieJar) -> Option<SessionId> {
        // an undecodable session cookie is the same as no session
        get_cookie(jar, &self.cookie_name, None)
            .ok()
            .flatten()
            .filter(|id| !id.is_empty())
            .map(SessionId::from)
    }

    pub async fn get(&self, jar: &CookieJar, key: &str) -> Result<Option<String>, AuthError> {
        let Some(id) = self.session_id(jar) else {
            return Ok(None);
        };

        let data = self.store.load(&id).await.map_err(AuthError::Storage)?;
        Ok(data.and_then(|mut data| data.remove(key)))
    }

    /// Stores `value` under `key` in a session with a freshly minted id and
    /// returns its cookie. Entries of the browser's current session move
    /// over and the old id stops resolving. An id the store doesn't know is
    /// never adopted.
    pub async fn insert(
        &self,
        jar: &CookieJar,
        key: &str,
        value: String,
    ) -> Result<SetCookie, AuthError> {
        let previous = match self.session_id(jar) {
            Some(id) => {
                let data = self.store.load(&id).await.map_err(AuthError::Storage)?;
                data.map(|data| (id, data))
            }
            None => None,
        };

        let (old_id, mut data) = match previous {
            Some((id, data)) => (Some(id), data),
            None => (None, SessionData::default()),
        };
        data.insert(key.to_owned(), value);

        let id = SessionId::new();
        self.store.store(&id, data).await.map_err(AuthError::Storage)?;

        if let Some(old_id) = old_id {
            self.store.remove(&old_id).await.map_err(AuthError::Storage)?;
            tracing::debug!("rotated session id");
        }

        Ok(set_cookie(
            self.cookie_name.clone(),
            id.as_str(),
            CookieOptions::default(),
        ))
    }

    pub async fn remove(&self, jar: &CookieJar, key: &str) -> Result<(), AuthError> {
        let Some(id) = self.session_id(jar) else {
            return Ok(());
        };

        let Some(mut data) = self.store.load(&id).await.map_err(AuthError::Storage)? else {
            return Ok(());
        };

        if data.remove(key).is_some() {
            if data.is_empty() {
                self.store.remove(&id).await.map_err(AuthError::Storage)?;
            } else {
                self.store.store(&id, data).await.map_err(AuthError::Storage)?;
            }
        }
        Ok(())
    }
}
