use std::{collections::HashMap, convert::Infallible, sync::Arc};

use tokio::sync::RwLock;

use crate::session::{SessionData, SessionId, SessionStore};

pub struct MemStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionData>>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemStore {
    fn clone(&self) -> Self {
        MemStore {
            inner: self.inner.clone(),
        }
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()).into(),
        }
    }
}

impl SessionStore for MemStore {
    type Error = Infallible;

    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionData>, Infallible> {
        let lock = self.inner.read().await;
        Ok(lock.get(id).cloned())
    }

    async fn store_session(&self, id: &SessionId, data: SessionData) -> Result<(), Infallible> {
        let mut lock = self.inner.write().await;
        lock.insert(id.clone(), data);
        Ok(())
    }

    async fn remove_session(&self, id: &SessionId) -> Result<Option<SessionData>, Infallible> {
        let mut lock = self.inner.write().await;
        Ok(lock.remove(id))
    }
}
