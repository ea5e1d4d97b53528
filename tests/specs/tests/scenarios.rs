// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: browser → BFF → fake backend, all over TCP.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::StatusCode;

use shortbff::client::{ClientError, RequestConfig};
use shortbff::transport::proxy::HOP_BY_HOP;
use shortbff_specs::BffHarness;

// -- Session lifecycle --------------------------------------------------------

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    bff.login(&browser).await?;

    let resp = browser.get(bff.url("/api/bff/shortcuts/xyz")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    bff.backend.expire_access_tokens();
    bff.advance(61);

    let resp = browser.get(bff.url("/api/bff/shortcuts/xyz")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["id"], "xyz");
    assert_eq!(bff.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_proxied_calls_share_one_refresh() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    bff.backend.set_refresh_delay(Duration::from_millis(150));
    let browser = bff.browser();
    bff.login(&browser).await?;
    bff.advance(61);

    let calls = (0..12).map(|i| browser.get(bff.url(&format!("/api/bff/shortcuts/s{i}"))).send());
    for resp in join_all(calls).await {
        assert_eq!(resp?.status(), StatusCode::OK);
    }
    assert_eq!(bff.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn expired_refresh_token_signs_out_without_network_call() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    bff.backend.set_refresh_ttl(30);
    let browser = bff.browser();
    bff.login(&browser).await?;

    bff.advance(31);
    let resp = browser.get(bff.url("/api/auth/session")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["code"], "SESSION_EXPIRED");
    assert_eq!(bff.backend.refresh_calls(), 0);
    assert!(bff.state.sessions.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_forces_sign_out() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    bff.login(&browser).await?;

    bff.backend.fail_refresh(true);
    bff.advance(55);
    let resp = browser.get(bff.url("/api/bff/echo/after")).send().await?;
    // Forwarded unauthenticated; the cookie is cleared on the way back.
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("Max-Age=0"));
    assert!(cleared);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["authenticated"], false);
    assert!(bff.state.sessions.is_empty().await);

    let resp = browser.get(bff.url("/api/auth/session")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(bff.backend.refresh_calls(), 1);
    Ok(())
}

// -- Proxy semantics ----------------------------------------------------------

#[tokio::test]
async fn backend_not_found_is_relayed_unchanged() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    bff.login(&browser).await?;

    let resp = browser.get(bff.url("/api/bff/shortcuts/abc123")).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(
        body,
        serde_json::json!({ "error": "NotFoundError", "message": "Shortcut abc123 not found" })
    );
    Ok(())
}

#[tokio::test]
async fn repeated_query_keys_keep_order() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();

    let resp = browser.get(bff.url("/api/bff/echo/search?a=1&a=2&b=x")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let seen = bff.backend.last_seen().ok_or_else(|| anyhow::anyhow!("nothing forwarded"))?;
    assert_eq!(seen.path, "/api/v1/echo/search");
    assert_eq!(seen.query.as_deref(), Some("a=1&a=2&b=x"));
    Ok(())
}

#[tokio::test]
async fn hop_by_hop_headers_do_not_cross() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();

    let resp = browser
        .get(bff.url("/api/bff/echo/headers"))
        .header("keep-alive", "timeout=5")
        .header("proxy-authorization", "Basic Zm9vOmJhcg==")
        .header("proxy-authenticate", "Basic")
        .header("te", "trailers")
        .header("trailers", "x-checksum")
        .header("accept-encoding", "gzip")
        .header("x-custom", "kept")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Relayed response: the backend's hop-by-hop headers are gone.
    for name in ["keep-alive", "proxy-authenticate", "trailers", "content-length"] {
        assert!(!resp.headers().contains_key(name), "{name} relayed to browser");
    }
    assert_eq!(resp.headers().get("x-backend").map(|v| v.as_bytes()), Some(&b"fake"[..]));

    // Forwarded request: only the backend leg's own host header remains.
    let seen = bff.backend.last_seen().ok_or_else(|| anyhow::anyhow!("nothing forwarded"))?;
    for name in HOP_BY_HOP.iter().filter(|n| **n != "host") {
        assert!(!seen.headers.contains_key(*name), "{name} forwarded to backend");
    }
    let host = seen.headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(bff.backend.url().ends_with(host));
    assert_eq!(seen.headers.get("accept-encoding").map(|v| v.as_bytes()), Some(&b"identity"[..]));
    assert_eq!(seen.headers.get("x-custom").map(|v| v.as_bytes()), Some(&b"kept"[..]));
    Ok(())
}

#[tokio::test]
async fn access_token_never_reaches_the_browser() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    let login_body = bff.login(&browser).await?;

    let resp = browser.get(bff.url("/api/bff/echo/me")).send().await?;
    let headers = format!("{:?}", resp.headers());
    let body = resp.text().await?;
    let session = browser.get(bff.url("/api/auth/session")).send().await?.text().await?;

    let seen = bff.backend.last_seen().ok_or_else(|| anyhow::anyhow!("nothing forwarded"))?;
    let auth = seen.headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default();
    let token = auth.strip_prefix("Bearer ").unwrap_or_default();
    assert!(bff.backend.access_token_valid(token));

    for visible in [login_body.to_string(), headers, body, session] {
        assert!(!visible.contains(token), "access token leaked: {visible}");
    }
    Ok(())
}

#[tokio::test]
async fn request_body_is_streamed_through() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    let payload = vec![b'x'; 2 * 1024 * 1024];

    let resp = browser
        .put(bff.url("/api/bff/echo/upload"))
        .header("content-type", "application/octet-stream")
        .body(payload.clone())
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["bodyLen"], payload.len());

    let seen = bff.backend.last_seen().ok_or_else(|| anyhow::anyhow!("nothing forwarded"))?;
    assert_eq!(seen.body.len(), payload.len());
    Ok(())
}

#[tokio::test]
async fn long_download_outlives_request_timeout() -> anyhow::Result<()> {
    use shortbff::test_support::{SLOW_CHUNKS, SLOW_CHUNK_GAP};

    let bff = BffHarness::start_with(|c| c.request_timeout_ms = 300).await?;
    let browser = bff.browser();

    let started = std::time::Instant::now();
    let resp = browser.get(bff.url("/api/bff/slow")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await?;
    let expected: String = (0..SLOW_CHUNKS).map(|i| format!("chunk-{i}\n")).collect();
    assert_eq!(body, expected);
    assert!(started.elapsed() >= SLOW_CHUNK_GAP * u32::from(SLOW_CHUNKS));
    assert!(started.elapsed() > Duration::from_millis(300));
    Ok(())
}

#[tokio::test]
async fn redirects_are_relayed_not_followed() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();

    let resp = browser.get(bff.url("/api/bff/redirect")).send().await?;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("location").map(|v| v.as_bytes()),
        Some(&b"/api/v1/echo/after-redirect"[..])
    );
    assert!(bff.backend.seen().is_empty());
    Ok(())
}

#[tokio::test]
async fn oauth2_passthrough_skips_credentials() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();
    bff.login(&browser).await?;

    let resp = browser
        .get(bff.url("/api/oauth2/authorize/github?state=s1&scope=a&scope=b"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let seen = bff.backend.last_seen().ok_or_else(|| anyhow::anyhow!("nothing forwarded"))?;
    assert_eq!(seen.path, "/oauth2/authorize/github");
    assert_eq!(seen.query.as_deref(), Some("state=s1&scope=a&scope=b"));
    assert!(!seen.headers.contains_key("authorization"));
    Ok(())
}

#[tokio::test]
async fn anonymous_calls_are_forwarded_unauthenticated() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let browser = bff.browser();

    let resp = browser.get(bff.url("/api/bff/shortcuts/xyz")).send().await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "UnauthorizedError");
    Ok(())
}

// -- Client pipeline ----------------------------------------------------------

#[tokio::test]
async fn client_recovers_from_backend_side_expiry() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let client = bff.authenticated_client();
    let login = RequestConfig::post("/api/auth/login").json(&serde_json::json!({
        "email": shortbff::test_support::TEST_EMAIL,
        "password": shortbff::test_support::TEST_PASSWORD,
    }))?;
    client.request(login).await?;

    // The BFF still believes the token is fresh; the backend disagrees.
    bff.backend.expire_access_tokens();
    let resp = client.request(RequestConfig::get("/api/bff/shortcuts/xyz")).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(bff.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn client_does_not_retry_twice() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let client = bff.authenticated_client();
    let login = RequestConfig::post("/api/auth/login").json(&serde_json::json!({
        "email": shortbff::test_support::TEST_EMAIL,
        "password": shortbff::test_support::TEST_PASSWORD,
    }))?;
    client.request(login).await?;

    let err = client.request(RequestConfig::get("/api/bff/unauthorized")).await;
    assert!(matches!(err, Err(ClientError::Unauthorized)));
    assert_eq!(bff.backend.seen().len(), 2);
    assert_eq!(bff.backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn client_does_not_resubmit_rejected_sign_in() -> anyhow::Result<()> {
    let bff = BffHarness::start().await?;
    let client = bff.authenticated_client();
    let login = RequestConfig::post("/api/auth/login").json(&serde_json::json!({
        "email": shortbff::test_support::TEST_EMAIL,
        "password": shortbff::test_support::TEST_PASSWORD,
    }))?;
    client.request(login).await?;
    let logins = bff.backend.login_calls();

    let wrong = RequestConfig::post("/api/auth/login").json(&serde_json::json!({
        "email": shortbff::test_support::TEST_EMAIL,
        "password": "wrong",
    }))?;
    match client.request(wrong).await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 401);
            let envelope: serde_json::Value = serde_json::from_str(&body)?;
            assert_eq!(envelope["code"], "INVALID_CREDENTIALS");
        }
        other => anyhow::bail!("expected a 401 envelope, got {other:?}"),
    }
    assert_eq!(bff.backend.login_calls(), logins + 1);
    assert_eq!(bff.backend.refresh_calls(), 0);

    // The live session is untouched.
    let resp = client.request(RequestConfig::get("/api/auth/session")).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn client_surfaces_proxy_failures_without_retry() -> anyhow::Result<()> {
    let bff = BffHarness::start_with(|c| c.backend_url = "http://127.0.0.1:1".into()).await?;
    let client = bff.authenticated_client();

    let err = client.request(RequestConfig::get("/api/bff/shortcuts")).await;
    match err {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 500);
            let envelope: serde_json::Value = serde_json::from_str(&body)?;
            assert_eq!(envelope["code"], "BFF_PROXY_ERROR");
            assert_eq!(envelope["path"], "/shortcuts");
        }
        other => anyhow::bail!("expected a 500 envelope, got {other:?}"),
    }
    Ok(())
}
