mod common;

use axum::{Router, extract::Path, http::StatusCode, routing::get};
use axum_gaema::{GaemaContext, GaemaUser, RouterExt, cookie::encode_value};
use tower::ServiceExt;

use common::{
    BrokenStore, TestRpc, body_string, cookie_header, get_with_cookies, location, set_cookies,
};

async fn home(Path(domain_name): Path<String>, user: GaemaUser) -> String {
    format!("{domain_name}: {}", user.email.clone().unwrap_or_default())
}

fn app(ctx: &GaemaContext) -> Router {
    Router::new()
        .route("/a/{domain_name}/home", get(home))
        .with_auth(ctx.marketplace_login_required())
        .with_auth(ctx.clone())
}

#[tokio::test]
async fn redirects_to_domain_login() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder().build();

    let res = app(&ctx)
        .oneshot(common::get("/a/example.com/home?tab=1"))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/gaema/marketplace_login/a/example.com");
    assert_eq!(
        set_cookies(&res),
        [format!(
            "gaema_next_url_example.com={}; Path=/; HttpOnly; SameSite=Lax",
            encode_value("/a/example.com/home?tab=1")
        )]
    );
    Ok(())
}

#[tokio::test]
async fn domain_login_round_trip() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .cookie_storage()
        .rpc(TestRpc::default().respond(200, "is_valid:true"))
        .build();

    let res = app(&ctx)
        .oneshot(common::get("http://localhost/gaema/marketplace_login/a/example.com"))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(location(&res).starts_with("https://www.google.com/a/example.com/o8/ud?be=o8&"));

    let query = serde_urlencoded::to_string([
        ("openid.mode", "id_res"),
        ("openid.ns.ext1", "http://openid.net/srv/ax/1.0"),
        ("openid.ext1.type.email", "http://axschema.org/contact/email"),
        ("openid.ext1.value.email", "alice@example.com"),
    ])?;
    let next = format!("gaema_next_url_example.com={}", encode_value("/a/example.com/home"));
    let res = app(&ctx)
        .oneshot(get_with_cookies(
            &format!("http://localhost/gaema/marketplace_login/a/example.com?{query}"),
            &next,
        ))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/a/example.com/home");

    let cookies = cookie_header(&res);
    let res = app(&ctx)
        .oneshot(get_with_cookies("/a/example.com/home", &cookies))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "example.com: alice@example.com");

    // the marker is per domain
    let res = app(&ctx)
        .oneshot(get_with_cookies("/a/other.org/home", &cookies))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn storage_failure() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder().session_store(BrokenStore).build();

    let cookie = format!("gaema-session={}", encode_value("some-session"));
    let res = app(&ctx)
        .oneshot(get_with_cookies("/a/example.com/home", &cookie))
        .await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(res).await,
        "Getting gaema_user failed, reason: backend down"
    );
    Ok(())
}

#[tokio::test]
async fn route_without_domain_param() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder().build();
    let app = Router::new()
        .route("/home", get(|user: GaemaUser| async move { user.service.clone() }))
        .with_auth(ctx.marketplace_login_required())
        .with_auth(ctx.clone());

    let res = app.oneshot(common::get("/home")).await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&res).is_empty());
    Ok(())
}
