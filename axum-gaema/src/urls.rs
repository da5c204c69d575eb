//! Paths of the login routes, and helpers that remember where to send the
//! browser once the login or logout is done.

use crate::{context::GaemaContext, cookie::CookieOptions, scope::AuthScope};

pub fn login_path(ctx: &GaemaContext, service: &str) -> String {
    format!("{}/login/{service}", ctx.url_prefix())
}

pub fn logout_path(ctx: &GaemaContext, service: &str) -> String {
    format!("{}/logout/{service}", ctx.url_prefix())
}

pub fn marketplace_login_path(ctx: &GaemaContext, domain: &str) -> String {
    format!("{}/marketplace_login/a/{domain}", ctx.url_prefix())
}

pub fn marketplace_logout_path(ctx: &GaemaContext, domain: &str) -> String {
    format!("{}/marketplace_logout/{domain}", ctx.url_prefix())
}

/// `targets` keep their order, joined with `|`.
pub fn select_service_path<T: AsRef<str>>(ctx: &GaemaContext, targets: &[T]) -> String {
    let targets = targets
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("|");
    format!("{}/select_service/{targets}", ctx.url_prefix())
}

fn remember_next_url(scope: &mut AuthScope, key: &str, next_url: &str) {
    let key = scope.context().next_url_key(key);
    scope.set_cookie(key, next_url, CookieOptions::default());
}

pub fn create_login_url(scope: &mut AuthScope, service: &str, next_url: &str) -> String {
    remember_next_url(scope, service, next_url);
    login_path(scope.context(), service)
}

pub fn create_logout_url(scope: &mut AuthScope, service: &str, next_url: &str) -> String {
    remember_next_url(scope, service, next_url);
    logout_path(scope.context(), service)
}

pub fn create_marketplace_login_url(scope: &mut AuthScope, domain: &str, next_url: &str) -> String {
    remember_next_url(scope, domain, next_url);
    marketplace_login_path(scope.context(), domain)
}

pub fn create_marketplace_logout_url(
    scope: &mut AuthScope,
    domain: &str,
    next_url: &str,
) -> String {
    remember_next_url(scope, domain, next_url);
    marketplace_logout_path(scope.context(), domain)
}
