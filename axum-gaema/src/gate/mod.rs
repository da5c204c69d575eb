mod marketplace;

use std::{
    convert::Infallible,
    ops::Deref,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    Router,
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::MethodRouter,
};
use tower::{Layer, Service};

pub use marketplace::{MarketplaceLoginRequired, MarketplaceLoginRequiredService};

use crate::{
    context::GaemaContext, cookie::CookieJar, outcome::Outcome, providers::AuthUser,
    router_ext::AuthInjector, urls::select_service_path,
};

/// The logged in visitor, put in the request extensions by the login gates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaemaUser {
    /// The service (or Google Apps domain) the marker was found for.
    pub service: String,
    pub user: AuthUser,
}

impl Deref for GaemaUser {
    type Target = AuthUser;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S> FromRequestParts<S> for GaemaUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GaemaUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Lets a request through when the visitor holds a marker for any of the
/// services; otherwise redirects to the service selection page listing all
/// of them.
#[derive(Clone)]
pub struct LoginRequired {
    ctx: GaemaContext,
    services: Arc<[String]>,
}

impl LoginRequired {
    pub(crate) fn new<I, T>(ctx: GaemaContext, services: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ctx,
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Where the browser goes when no marker was found.
    pub fn select_service_url(&self) -> String {
        select_service_path(&self.ctx, &self.services)
    }

    async fn check(&self, mut req: Request) -> Result<Request, axum::response::Response> {
        let jar = CookieJar::from_headers(req.headers());

        for service in self.services.iter() {
            match self.ctx.current_user(&jar, service).await {
                Ok(Some(user)) => {
                    tracing::debug!("visitor is logged in with {service}");
                    req.extensions_mut().insert(GaemaUser {
                        service: service.clone(),
                        user,
                    });
                    req.extensions_mut().insert(self.ctx.clone());
                    return Ok(req);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("looking up the {service} marker failed: {e}");
                    return Err(e.into_response());
                }
            }
        }

        tracing::debug!("no marker found, sending visitor to service selection");
        Err(Outcome::<()>::redirect(self.select_service_url()).into_response())
    }
}

pub struct LoginRequiredService<SERV> {
    gate: LoginRequired,
    rest: SERV,
}

impl<SERV> Clone for LoginRequiredService<SERV>
where
    SERV: Clone,
{
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            rest: self.rest.clone(),
        }
    }
}

impl<SERV> Service<Request> for LoginRequiredService<SERV>
where
    SERV: Service<Request, Error = Infallible> + Clone + Send + 'static,
    <SERV as Service<Request>>::Response: IntoResponse,
    <SERV as Service<Request>>::Future: Send,
{
    type Response = axum::response::Response;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.rest.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut this = self.clone();
        Box::pin(async move {
            match this.gate.check(req).await {
                Ok(req) => this.rest.call(req).await.map(|e| e.into_response()),
                Err(res) => Ok(res),
            }
        })
    }
}

impl<SERV> Layer<SERV> for LoginRequired {
    type Service = LoginRequiredService<SERV>;

    fn layer(&self, inner: SERV) -> Self::Service {
        LoginRequiredService {
            gate: self.clone(),
            rest: inner,
        }
    }
}

impl<S> AuthInjector<Router<S>> for LoginRequired
where
    S: Send + Sync + Clone + 'static,
{
    fn inject_into(self, router: Router<S>) -> Router<S> {
        router.route_layer(self)
    }
}

impl<S> AuthInjector<MethodRouter<S, Infallible>> for LoginRequired
where
    S: Send + Sync + Clone + 'static,
{
    fn inject_into(self, router: MethodRouter<S, Infallible>) -> MethodRouter<S, Infallible> {
        router.layer(self)
    }
}
