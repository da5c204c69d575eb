use std::{panic::AssertUnwindSafe, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};

use crate::error::BoxError;

type CallbackFn<T> = dyn Fn(T) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// A callback whose failures are logged instead of handed back to whoever
/// invoked it. Both returned errors and panics count as failures.
pub struct AsyncCallback<T>(Arc<CallbackFn<T>>);

impl<T> Clone for AsyncCallback<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Completed,
    Failed,
    Panicked,
}

impl<T: Send + 'static> AsyncCallback<T> {
    pub fn new<F, Fut, E>(callback: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self(Arc::new(move |arg| {
            let fut = callback(arg);
            Box::pin(async move { fut.await.map_err(Into::into) })
        }))
    }

    /// A missing callback stays missing.
    pub fn wrap<F, Fut, E>(callback: Option<F>) -> Option<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        callback.map(Self::new)
    }

    /// Binds `bound` ahead of the argument passed on invocation.
    pub fn partial<B, F, Fut, E>(callback: F, bound: B) -> Self
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(B, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(move |arg| callback(bound.clone(), arg))
    }

    pub async fn invoke(&self, arg: T) -> CallbackOutcome {
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.0)(arg))) {
            Ok(fut) => fut,
            Err(_) => {
                tracing::error!("Exception during callback: callback panicked");
                return CallbackOutcome::Panicked;
            }
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => CallbackOutcome::Completed,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Exception during callback");
                CallbackOutcome::Failed
            }
            Err(_) => {
                tracing::error!("Exception during callback: callback panicked");
                CallbackOutcome::Panicked
            }
        }
    }
}
