use axum::{Router, routing::MethodRouter};

use crate::{context::GaemaContext, gate::LoginRequired};

/// Something that can be layered onto a router: the [`GaemaContext`] mounts
/// the login routes, the login gates wrap handlers.
pub trait AuthInjector<I> {
    fn inject_into(self, inject: I) -> I;
}

impl<T, I> AuthInjector<I> for &T
where
    T: AuthInjector<I> + Clone,
{
    fn inject_into(self, router: I) -> I {
        <T as AuthInjector<I>>::inject_into(self.clone(), router)
    }
}

pub trait RouterExt: Sized {
    fn with_auth<I: Sized>(self, auth: I) -> Self
    where
        I: AuthInjector<Self>;

    /// Shorthand for `with_auth(ctx.login_required(services))`.
    fn login_required<I, T>(self, ctx: &GaemaContext, services: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
        LoginRequired: AuthInjector<Self>,
    {
        self.with_auth(ctx.login_required(services))
    }
}

impl<S> RouterExt for Router<S>
where
    S: Send + Sync + Clone + 'static,
{
    fn with_auth<I>(self, auth: I) -> Router<S>
    where
        I: AuthInjector<Router<S>>,
    {
        auth.inject_into(self)
    }
}

impl<S, E> RouterExt for MethodRouter<S, E>
where
    S: Send + Sync + Clone + 'static,
{
    fn with_auth<I>(self, auth: I) -> MethodRouter<S, E>
    where
        I: AuthInjector<MethodRouter<S, E>>,
    {
        auth.inject_into(self)
    }
}
