// system-tests/tests/suites/session_client.rs
// ============================================================================
// Module: Session Client Tests
// Description: End-to-end coverage of the session handshake and POST flow.
// Purpose: Ensure token pickup, expiry recovery, and failure inversion work.
// Dependencies: system-tests helpers
// ============================================================================

//! ## Overview
//! End-to-end coverage of the session handshake and POST flow.
//! Purpose: Ensure token pickup, expiry recovery, and failure inversion work.
//! Invariants:
//! - Expiry recovery re-runs the handshake exactly once per POST.
//! - A missing bypass password fails before any request is sent.

use forum_e2e_client::HarnessError;
use forum_e2e_client::HarnessSettings;
use forum_e2e_client::PostOptions;
use forum_e2e_client::SessionClient;
use helpers::env;
use helpers::forum_stub::STUB_TEST_PASSWORD;
use helpers::forum_stub::spawn_forum_stub;
use helpers::logging;
use helpers::stub_settings;
use serde_json::json;

use crate::helpers;

#[tokio::test(flavor = "multi_thread")]
async fn handshake_collects_token_and_cookies() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;
    client.init_session().await?;

    let session = client.session().ok_or("session missing after handshake")?;
    if session.xsrf_token != "token-1" {
        return Err(format!("unexpected token: {}", session.xsrf_token).into());
    }
    if !session.cookie_header.contains("XSRF-TOKEN=token-1") {
        return Err("cookie header missing anti-forgery cookie".into());
    }
    if !session.cookie_header.contains("stubSession=session-cookie") {
        return Err("cookie header missing session cookie".into());
    }
    if stub.handshake_count() != 1 {
        return Err("handshake should run exactly once".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn post_attaches_session_headers_and_password() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;
    client.init_session().await?;

    let url = client.origin_url("/-/play-time");
    let payload = json!({ "seconds": 60 });
    client.post(&url, &payload, &PostOptions::default()).await?;

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no post recorded")?;
    if post.path != "/-/play-time" {
        return Err(format!("unexpected path: {}", post.path).into());
    }
    if !post.query.contains(&format!("e2eTestPassword={STUB_TEST_PASSWORD}")) {
        return Err("bypass password missing from query".into());
    }
    if post.xsrf_token.as_deref() != Some("token-1") {
        return Err("anti-forgery header missing or wrong".into());
    }
    if !post.cookie.as_deref().unwrap_or_default().contains("stubSession=session-cookie") {
        return Err("cookie header not forwarded".into());
    }
    if post.body != payload {
        return Err("payload was not forwarded verbatim".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_token_is_refreshed_and_retried_once() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;
    client.init_session().await?;
    stub.expire_next_posts(1);

    let url = client.origin_url("/-/skip-rate-limits");
    client.post(&url, &json!({ "siteId": 1 }), &PostOptions::default()).await?;

    if stub.handshake_count() != 2 {
        return Err("expiry should trigger exactly one extra handshake".into());
    }
    let posts = stub.recorded_posts();
    if posts.len() != 2 {
        return Err(format!("expected 2 posts, saw {}", posts.len()).into());
    }
    if posts[0].xsrf_token.as_deref() != Some("token-1") {
        return Err("first attempt should carry the original token".into());
    }
    if posts[1].xsrf_token.as_deref() != Some("token-2") {
        return Err("retry should carry the refreshed token".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn second_consecutive_expiry_is_terminal() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;
    client.init_session().await?;
    stub.expire_next_posts(2);

    let url = client.origin_url("/-/skip-rate-limits");
    let result = client.post(&url, &json!({ "siteId": 1 }), &PostOptions::default()).await;
    match result {
        Err(HarnessError::RequestFailed {
            method, status, ..
        }) => {
            if method != "POST" || status.as_u16() != 403 {
                return Err("wrong failure details for the second expiry".into());
            }
        }
        Err(_) => return Err("wrong error kind for the second expiry".into()),
        Ok(_) => return Err("second expiry must not succeed".into()),
    }
    if stub.handshake_count() != 2 {
        return Err("refresh must not run a second time".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn expect_failure_inverts_the_outcome() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;

    // Wrong password: the stub rejects, the options accept the rejection.
    let wrong = HarnessSettings::new(stub.origin())?.with_test_password("not-the-password");
    let mut failing_client = SessionClient::new(wrong)?;
    let url = failing_client.origin_url("/-/play-time");
    let options = PostOptions::default().expecting_failure();
    let response = failing_client.post(&url, &json!({ "seconds": 1 }), &options).await?;
    if response.status.as_u16() != 403 {
        return Err("expected the stub's rejection status".into());
    }

    // Right password: success becomes the failure case.
    let mut passing_client = SessionClient::new(stub_settings(stub.origin())?)?;
    passing_client.init_session().await?;
    let url = passing_client.origin_url("/-/play-time");
    let result = passing_client.post(&url, &json!({ "seconds": 1 }), &options).await;
    match result {
        Err(HarnessError::UnexpectedSuccess {
            ..
        }) => Ok(()),
        Err(_) => Err("wrong error kind for an inverted success".into()),
        Ok(_) => Err("success must be rejected when failure is expected".into()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_password_fails_before_sending() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(HarnessSettings::new(stub.origin())?)?;
    let url = client.origin_url("/-/play-time");

    let result = client.post(&url, &json!({ "seconds": 1 }), &PostOptions::default()).await;
    if !matches!(result, Err(HarnessError::MissingTestPassword)) {
        return Err("expected the missing-password error".into());
    }
    if !stub.recorded_posts().is_empty() {
        return Err("nothing should reach the server without a password".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn settings_load_reads_the_environment() -> Result<(), Box<dyn std::error::Error>> {
    env::set_var("FORUM_E2E_ORIGIN", "http://e2e-test.localhost");
    env::set_var("FORUM_E2E_TEST_PASSWORD", "from-env");
    env::set_var("FORUM_E2E_TIMEOUT_SEC", "7");
    env::set_var("FORUM_E2E_POLL_INTERVAL_MS", "125");
    env::set_var("FORUM_E2E_VERBOSE", "true");

    let loaded = HarnessSettings::load();

    env::remove_var("FORUM_E2E_ORIGIN");
    env::remove_var("FORUM_E2E_TEST_PASSWORD");
    env::remove_var("FORUM_E2E_TIMEOUT_SEC");
    env::remove_var("FORUM_E2E_POLL_INTERVAL_MS");
    env::remove_var("FORUM_E2E_VERBOSE");

    let settings = loaded?;
    if settings.origin != "http://e2e-test.localhost" {
        return Err("origin not read from env".into());
    }
    if settings.e2e_test_password.as_deref() != Some("from-env") {
        return Err("password not read from env".into());
    }
    if settings.poll.timeout.as_secs() != 7 || settings.poll.interval.as_millis() != 125 {
        return Err("poll bounds not read from env".into());
    }
    if !settings.verbose {
        return Err("verbose flag not read from env".into());
    }
    Ok(())
}
