use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    Router,
    extract::{FromRequestParts, RawPathParams, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use tower::{Layer, Service};

use crate::{
    context::GaemaContext, gate::GaemaUser, outcome::Outcome, router_ext::AuthInjector,
    scope::AuthScope, urls::create_marketplace_login_url,
};

const DOMAIN_PARAM: &str = "domain_name";

/// Login gate for routes with a `{domain_name}` segment: the visitor needs a
/// marker for that Google Apps domain. Without one, the browser is sent to
/// the marketplace login for the domain and comes back here afterwards.
#[derive(Clone)]
pub struct MarketplaceLoginRequired {
    ctx: GaemaContext,
}

impl MarketplaceLoginRequired {
    pub(crate) fn new(ctx: GaemaContext) -> Self {
        Self { ctx }
    }

    async fn check(&self, req: Request) -> Result<Request, Response> {
        let (mut parts, body) = req.into_parts();

        let domain = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .find(|(name, _)| *name == DOMAIN_PARAM)
                .map(|(_, value)| value.to_owned()),
            Err(e) => {
                tracing::debug!("could not read path params: {e}");
                None
            }
        };

        let Some(domain) = domain else {
            tracing::error!("marketplace login gate used on a route without {{{DOMAIN_PARAM}}}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        };

        let mut scope = AuthScope::new(self.ctx.clone(), &parts);
        match scope.current_user(&domain).await {
            Ok(Some(user)) => {
                parts.extensions.insert(GaemaUser {
                    service: domain,
                    user,
                });
                parts.extensions.insert(self.ctx.clone());
                Ok(Request::from_parts(parts, body))
            }
            Ok(None) => {
                let next_url = scope.request.local_url();
                let login_url = create_marketplace_login_url(&mut scope, &domain, &next_url);
                tracing::debug!("no marker for {domain}, sending visitor to {login_url}");
                Err((scope, Outcome::<()>::redirect(login_url)).into_response())
            }
            Err(e) => {
                tracing::error!("looking up the {domain} marker failed: {e}");
                Err(e.into_response())
            }
        }
    }
}

pub struct MarketplaceLoginRequiredService<SERV> {
    gate: MarketplaceLoginRequired,
    rest: SERV,
}

impl<SERV> Clone for MarketplaceLoginRequiredService<SERV>
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

impl<SERV> Service<Request> for MarketplaceLoginRequiredService<SERV>
where
    SERV: Service<Request, Error = Infallible> + Clone + Send + 'static,
    <SERV as Service<Request>>::Response: IntoResponse,
    <SERV as Service<Request>>::Future: Send,
{
    type Response = Response;

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

impl<SERV> Layer<SERV> for MarketplaceLoginRequired {
    type Service = MarketplaceLoginRequiredService<SERV>;

    fn layer(&self, inner: SERV) -> Self::Service {
        MarketplaceLoginRequiredService {
            gate: self.clone(),
            rest: inner,
        }
    }
}

impl<S> AuthInjector<Router<S>> for MarketplaceLoginRequired
where
    S: Send + Sync + Clone + 'static,
{
    fn inject_into(self, router: Router<S>) -> Router<S> {
        router.route_layer(self)
    }
}

impl<S> AuthInjector<MethodRouter<S, Infallible>> for MarketplaceLoginRequired
where
    S: Send + Sync + Clone + 'static,
{
    fn inject_into(self, router: MethodRouter<S, Infallible>) -> MethodRouter<S, Infallible> {
        router.layer(self)
    }
}
