mod common;

use std::{
    io,
    sync::{Arc, Mutex},
};

use axum::{Router, http::StatusCode, routing::get};
use axum_gaema::{
    AuthUser, GaemaContext, GaemaUser, RouterExt,
    cookie::encode_value,
    providers::GoogleOpenId,
};
use tower::ServiceExt;

use common::{
    BrokenStore, TestRpc, body_string, cookie_header, get_with_cookies, location, set_cookies,
};

async fn whoami(user: GaemaUser) -> String {
    format!("{} via {}", user.email.clone().unwrap_or_default(), user.service)
}

fn google_callback() -> String {
    let query = serde_urlencoded::to_string([
        ("openid.mode", "id_res"),
        ("openid.claimed_id", "https://www.google.com/accounts/o8/id?id=bob"),
        ("openid.ns.ax", "http://openid.net/srv/ax/1.0"),
        ("openid.ax.type.email", "http://axschema.org/contact/email"),
        ("openid.ax.value.email", "bob@example.com"),
    ])
    .unwrap();
    format!("http://localhost/gaema/login/google?{query}")
}

fn app(ctx: &GaemaContext) -> Router {
    Router::new()
        .route("/private", get(whoami))
        .login_required(ctx, ["twitter", "google"])
        .route("/public", get(|| async { "hello" }))
        .with_auth(ctx.clone())
}

#[tokio::test]
async fn redirects_to_service_selection() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder().provider(GoogleOpenId::new()).build();

    let res = app(&ctx).oneshot(common::get("/private")).await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/gaema/select_service/twitter|google");

    let res = app(&ctx).oneshot(common::get("/public")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn google_login_with_cookie_markers() -> anyhow::Result<()> {
    let rpc = TestRpc::default().respond(200, "ns:http://specs.openid.net/auth/2.0\nis_valid:true\n");
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .cookie_storage()
        .secret_key("an unguessable secret")
        .rpc(rpc.clone())
        .build();

    let res = app(&ctx).oneshot(common::get(&google_callback())).await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert_eq!(rpc.requested_urls(), ["https://www.google.com/accounts/o8/ud"]);

    let cookies = cookie_header(&res);
    assert!(cookies.starts_with("gaema_user_google="));
    assert!(
        set_cookies(&res)
            .iter()
            .all(|c| c.contains("; HttpOnly; SameSite=Lax"))
    );

    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &cookies))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "bob@example.com via google");
    Ok(())
}

#[tokio::test]
async fn google_login_with_session_markers() -> anyhow::Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<AuthUser>::new()));
    let on_login_seen = seen.clone();

    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .rpc(TestRpc::default().respond(200, "is_valid:true"))
        .on_login(move |user: AuthUser| {
            let seen = on_login_seen.clone();
            async move {
                seen.lock().unwrap().push(user);
                Ok::<_, io::Error>(())
            }
        })
        .build();

    let next = format!("gaema_next_url_google={}", encode_value("/account"));
    let res = app(&ctx)
        .oneshot(get_with_cookies(&google_callback(), &next))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/account");

    let cookies = cookie_header(&res);
    assert!(cookies.starts_with("gaema-session="));
    let session_cookie = set_cookies(&res)
        .into_iter()
        .find(|c| c.starts_with("gaema-session="))
        .expect("session cookie");
    assert!(session_cookie.ends_with("; Path=/; HttpOnly; SameSite=Lax"));
    assert!(
        set_cookies(&res)
            .iter()
            .any(|c| c.starts_with("gaema_next_url_google=;"))
    );

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].email.as_deref(), Some("bob@example.com"));
    }

    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &cookies))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn planted_session_id_is_replaced_on_login() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .rpc(TestRpc::default().respond(200, "is_valid:true"))
        .build();

    let planted = format!("gaema-session={}", encode_value("attacker-chosen-id"));
    let res = app(&ctx)
        .oneshot(get_with_cookies(&google_callback(), &planted))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let issued = cookie_header(&res);
    assert!(issued.starts_with("gaema-session="));
    assert_ne!(issued, planted);

    // the id chosen by someone else doesn't carry the login
    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &planted))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &issued))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn second_login_rotates_session() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .rpc(
            TestRpc::default()
                .respond(200, "is_valid:true")
                .respond(200, "is_valid:true"),
        )
        .build();

    let res = app(&ctx).oneshot(common::get(&google_callback())).await?;
    let first = cookie_header(&res);

    let res = app(&ctx)
        .oneshot(get_with_cookies(&google_callback(), &first))
        .await?;
    let second = cookie_header(&res);
    assert!(second.starts_with("gaema-session="));
    assert_ne!(first, second);

    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &first))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &second))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rejected_openid_response() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .rpc(TestRpc::default().respond(200, "is_valid:false"))
        .build();

    let res = app(&ctx).oneshot(common::get(&google_callback())).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&res).is_empty());
    Ok(())
}

#[tokio::test]
async fn storage_failure() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .session_store(BrokenStore)
        .build();

    let cookie = format!("gaema-session={}", encode_value("some-session"));
    let res = app(&ctx)
        .oneshot(get_with_cookies("/private", &cookie))
        .await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(res).await,
        "Getting gaema_user failed, reason: backend down"
    );

    // without a session there is nothing to look up
    let res = app(&ctx).oneshot(common::get("/private")).await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    Ok(())
}

#[tokio::test]
async fn logout() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .cookie_storage()
        .rpc(TestRpc::default().respond(200, "is_valid:true"))
        .build();

    let res = app(&ctx).oneshot(common::get(&google_callback())).await?;
    let cookies = format!(
        "{}; gaema_next_url_google={}",
        cookie_header(&res),
        encode_value("/bye")
    );

    let res = app(&ctx)
        .oneshot(get_with_cookies("/gaema/logout/google", &cookies))
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/bye");

    let removed = set_cookies(&res);
    assert!(removed.contains(
        &"gaema_user_google=; Max-Age=0; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_owned()
    ));
    assert_eq!(cookie_header(&res), "");
    Ok(())
}

#[tokio::test]
async fn external_next_url_is_ignored() -> anyhow::Result<()> {
    let ctx = GaemaContext::builder()
        .provider(GoogleOpenId::new())
        .cookie_storage()
        .build();

    let cookie = format!("gaema_next_url_google={}", encode_value("https://evil.test/"));
    let res = app(&ctx)
        .oneshot(get_with_cookies("/gaema/logout/google", &cookie))
        .await?;
    assert_eq!(location(&res), "/");
    Ok(())
}
