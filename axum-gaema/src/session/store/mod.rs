mod memory;

use std::{collections::HashMap, sync::Arc};

use futures_util::future::BoxFuture;
pub use memory::MemStore;

use crate::{error::BoxError, session::SessionId};

/// Key/value data kept for one browser session.
pub type SessionData = HashMap<String, String>;

/// Where session-backed markers live. Persistence itself is up to the
/// implementor.
pub trait SessionStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionData>, Self::Error>> + Send;

    fn store_session(
        &self,
        id: &SessionId,
        data: SessionData,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn remove_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionData>, Self::Error>> + Send;
}

trait DynSessionStore: Send + Sync + 'static {
    fn load_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionData>, BoxError>>;

    fn store_boxed<'a>(
        &'a self,
        id: &'a SessionId,
        data: SessionData,
    ) -> BoxFuture<'a, Result<(), BoxError>>;

    fn remove_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionData>, BoxError>>;
}

impl<T> DynSessionStore for T
where
    T: SessionStore,
{
    fn load_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionData>, BoxError>> {
        Box::pin(async move { self.load_session(id).await.map_err(Into::into) })
    }

    fn store_boxed<'a>(
        &'a self,
        id: &'a SessionId,
        data: SessionData,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move { self.store_session(id, data).await.map_err(Into::into) })
    }

    fn remove_boxed<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionData>, BoxError>> {
        Box::pin(async move { self.remove_session(id).await.map_err(Into::into) })
    }
}

#[derive(Clone)]
pub(crate) struct ErasedStore(Arc<dyn DynSessionStore>);

impl ErasedStore {
    pub fn new<S: SessionStore>(store: S) -> Self {
        Self(Arc::new(store))
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, BoxError> {
        self.0.load_boxed(id).await
    }

    pub async fn store(&self, id: &SessionId, data: SessionData) -> Result<(), BoxError> {
        self.0.store_boxed(id, data).await
    }

    pub async fn remove(&self, id: &SessionId) -> Result<Option<SessionData>, BoxError> {
        self.0.remove_boxed(id).await
    }
}
