use axum::{
    Extension, Router,
    extract::Path,
    response::{Html, IntoResponse, Response},
    routing::get,
};

use crate::{
    context::GaemaContext,
    error::AuthError,
    outcome::Outcome,
    providers::ErasedProvider,
    router_ext::AuthInjector,
    scope::{AuthScope, is_local_path},
    urls::{create_login_url, login_path},
};

/// Runs one step of a provider flow on the login route: start it, or finish
/// it when the provider sent the browser back.
async fn login_flow(
    scope: &mut AuthScope,
    provider: &ErasedProvider,
) -> Result<Outcome<()>, AuthError> {
    provider.check_settings(scope.settings())?;

    if !provider.is_callback(&scope.request) {
        return provider.authenticate_redirect(scope).await;
    }

    let Some(user) = provider.get_authenticated_user(scope).await? else {
        tracing::debug!("{} did not authenticate the visitor", provider.name());
        return Err(AuthError::Unauthenticated(provider.name().to_owned()));
    };

    let service = provider.name();
    scope.set_user(service, &user).await?;
    tracing::debug!("visitor logged in with {service}");

    if let Some(on_login) = scope.context().on_login().cloned() {
        on_login.invoke(user).await;
    }

    let next_url = scope.take_next_url(service);
    Ok(scope.redirect(next_url))
}

async fn logout_flow(scope: &mut AuthScope, service: &str) -> Result<Outcome<()>, AuthError> {
    scope.clear_user(service).await?;
    tracing::debug!("visitor logged out of {service}");

    let next_url = scope.take_next_url(service);
    Ok(scope.redirect(next_url))
}

fn respond(scope: AuthScope, result: Result<Outcome<()>, AuthError>) -> Response {
    match result {
        Ok(outcome) => (scope, outcome).into_response(),
        Err(e) => (scope, e).into_response(),
    }
}

pub async fn login(mut scope: AuthScope, Path(service): Path<String>) -> Response {
    let provider = match scope.context().provider(&service) {
        Ok(provider) => provider.clone(),
        Err(e) => return e.into_response(),
    };

    let result = login_flow(&mut scope, &provider).await;
    respond(scope, result)
}

pub async fn logout(mut scope: AuthScope, Path(service): Path<String>) -> Response {
    if let Err(e) = scope.context().provider(&service) {
        return e.into_response();
    }

    let result = logout_flow(&mut scope, &service).await;
    respond(scope, result)
}

pub async fn marketplace_login(mut scope: AuthScope, Path(domain): Path<String>) -> Response {
    let provider = match scope.context().marketplace_provider(&domain) {
        Ok(provider) => provider,
        Err(e) => return e.into_response(),
    };

    let result = login_flow(&mut scope, &provider).await;
    respond(scope, result)
}

pub async fn marketplace_logout(mut scope: AuthScope, Path(domain): Path<String>) -> Response {
    if let Err(e) = scope.context().marketplace_provider(&domain) {
        return e.into_response();
    }

    let result = logout_flow(&mut scope, &domain).await;
    respond(scope, result)
}

/// Lists a login link for every valid service among `a|b|c`. A local
/// `next_url` argument is remembered for each of them.
pub async fn select_service(mut scope: AuthScope, Path(targets): Path<String>) -> Response {
    let services: Vec<String> = targets
        .split('|')
        .filter(|s| scope.context().is_valid_service(s))
        .map(str::to_owned)
        .collect();

    if services.is_empty() {
        return AuthError::UnknownService(targets).into_response();
    }

    let next_url = scope
        .request
        .argument("next_url")
        .filter(|url| is_local_path(url))
        .map(str::to_owned);

    let mut html = String::from("<ul>\n");
    for service in &services {
        let url = match &next_url {
            Some(next_url) => create_login_url(&mut scope, service, next_url),
            None => login_path(scope.context(), service),
        };
        html.push_str(&format!(
            "  <li><a href=\"{url}\">Sign in with {service}</a></li>\n"
        ));
    }
    html.push_str("</ul>\n");

    (scope, Html(html)).into_response()
}

/// The five login routes under the configured url prefix.
pub fn routes<S>(ctx: &GaemaContext) -> Router<S>
where
    S: Send + Sync + Clone + 'static,
{
    let prefix = ctx.url_prefix();
    Router::new()
        .route(&format!("{prefix}/login/{{service}}"), get(login))
        .route(&format!("{prefix}/logout/{{service}}"), get(logout))
        .route(
            &format!("{prefix}/marketplace_login/a/{{domain}}"),
            get(marketplace_login),
        )
        .route(
            &format!("{prefix}/marketplace_logout/{{domain}}"),
            get(marketplace_logout),
        )
        .route(
            &format!("{prefix}/select_service/{{targets}}"),
            get(select_service),
        )
}

/// Mounts the login routes and makes the context available to every route
/// registered so far, so handlers can extract [`AuthScope`].
impl<S> AuthInjector<Router<S>> for GaemaContext
where
    S: Send + Sync + Clone + 'static,
{
    fn inject_into(self, router: Router<S>) -> Router<S> {
        router.merge(routes(&self)).layer(Extension(self))
    }
}
