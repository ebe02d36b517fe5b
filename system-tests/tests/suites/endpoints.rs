// system-tests/tests/suites/endpoints.rs
// ============================================================================
// Module: Endpoint Wrapper Tests
// Description: End-to-end coverage of the typed test-control endpoints.
// Purpose: Ensure wrappers send the right requests and validate responses.
// Dependencies: system-tests helpers
// ============================================================================

//! ## Overview
//! End-to-end coverage of the typed test-control endpoints.
//! Purpose: Ensure wrappers send the right requests and validate responses.
//! Invariants:
//! - Site imports are marked deletable before they leave the harness.
//! - Wrappers reject responses missing their contract fields.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use forum_e2e_client::HarnessError;
use forum_e2e_client::SessionClient;
use forum_e2e_client::TestCounters;
use helpers::forum_stub::ForumStubHandle;
use helpers::forum_stub::spawn_forum_stub;
use helpers::logging;
use helpers::stub_settings;
use serde_json::json;

use crate::helpers;

async fn ready_client(stub: &ForumStubHandle) -> Result<SessionClient, Box<dyn std::error::Error>>
{
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;
    client.init_session().await?;
    Ok(client)
}

#[tokio::test(flavor = "multi_thread")]
async fn site_imports_are_marked_deletable() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    stub.set_import_response(json!({ "id": 7, "origin": "http://site-7.localhost" }));
    let mut client = ready_client(&stub).await?;

    let site = client.import_site_json(&json!({ "meta": { "name": "demo-site" } })).await?;
    if site.id != 7 || site.origin.as_deref() != Some("http://site-7.localhost") {
        return Err("import response not decoded".into());
    }

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no import recorded")?;
    if post.path != "/-/import-site-json" {
        return Err("wrong import path".into());
    }
    if !post.query.contains("deleteOldSite=true") {
        return Err("old-site deletion flag missing".into());
    }
    if post.body.get("isTestSiteOkDelete") != Some(&json!(true)) {
        return Err("import payload must be marked deletable".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_site_imports_pin_the_meta_fields() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = ready_client(&stub).await?;

    client
        .import_test_site_json(&json!({ "meta": { "name": "demo-site", "nextPageId": 3 } }), false)
        .await?;

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no import recorded")?;
    if post.path != "/-/import-test-site-json" {
        return Err("wrong import path".into());
    }
    if post.query.contains("deleteOldSite") {
        return Err("deletion must be opt-in for test-site imports".into());
    }
    let meta = post.body.get("meta").ok_or("meta missing from payload")?;
    if meta.get("nextPageId") != Some(&json!(100)) || meta.get("version") != Some(&json!(1)) {
        return Err("meta fields must be pinned before import".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn an_import_response_without_an_id_is_rejected() -> Result<(), Box<dyn std::error::Error>>
{
    logging::init();
    let stub = spawn_forum_stub()?;
    stub.set_import_response(json!({ "ok": true }));
    let mut client = ready_client(&stub).await?;

    let result = client.import_site_json(&json!({})).await;
    match result {
        Err(HarnessError::ApiContract {
            missing_field, ..
        }) => {
            if missing_field != "id" {
                return Err("wrong missing field reported".into());
            }
            Ok(())
        }
        Err(_) => Err("wrong error kind for a contract violation".into()),
        Ok(_) => Err("an id-less import response must be rejected".into()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn clock_advances_convert_to_seconds() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = ready_client(&stub).await?;

    client.play_time_minutes(2).await?;
    client.play_time_hours(1).await?;
    client.play_time_days(3).await?;

    let seconds: Vec<_> = stub
        .recorded_posts()
        .iter()
        .map(|post| post.body.get("seconds").cloned())
        .collect();
    if seconds != vec![Some(json!(120)), Some(json!(3600)), Some(json!(259_200))] {
        return Err("clock advances must convert to whole seconds".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_posts_carry_their_payloads() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = ready_client(&stub).await?;

    client.skip_rate_limits(5).await?;
    client.delete_redis_key("theme-cache").await?;
    client.delete_old_test_site("e2e-test-site").await?;

    let posts = stub.recorded_posts();
    if posts.len() != 3 {
        return Err("expected three maintenance posts".into());
    }
    if posts[0].body != json!({ "siteId": 5 }) {
        return Err("rate-limit payload is wrong".into());
    }
    if posts[1].body != json!({ "key": "theme-cache" }) {
        return Err("cache-key payload is wrong".into());
    }
    if posts[2].body != json!({ "localHostname": "e2e-test-site" }) {
        return Err("site-deletion payload is wrong".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sso_upserts_authenticate_with_the_api_key() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;

    let secret = client
        .upsert_user_get_login_secret(
            &json!({ "ssoId": "sso-1", "username": "jan" }),
            None,
            "publicSecretAbc",
        )
        .await?;
    if secret != "stub-login-secret" {
        return Err("login secret not extracted".into());
    }

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no upsert recorded")?;
    let authorization = post.authorization.as_deref().ok_or("authorization header missing")?;
    let encoded = authorization.strip_prefix("Basic ").ok_or("not basic auth")?;
    let decoded = String::from_utf8(BASE64.decode(encoded)?)?;
    if decoded != "forumUserId=2:publicSecretAbc" {
        return Err("credential must name the system bot by default".into());
    }
    if post.xsrf_token.is_some() || post.cookie.is_some() {
        return Err("api-key requests must not carry session headers".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn sso_requester_can_be_overridden() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;

    client
        .upsert_user_get_login_secret(&json!({ "ssoId": "sso-2" }), Some(99), "s3cr3t")
        .await?;

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no upsert recorded")?;
    let authorization = post.authorization.as_deref().ok_or("authorization header missing")?;
    let encoded = authorization.strip_prefix("Basic ").ok_or("not basic auth")?;
    if String::from_utf8(BASE64.decode(encoded)?)? != "forumUserId=99:s3cr3t" {
        return Err("requester override not applied".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn simple_upserts_return_the_raw_response() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;

    let response = client
        .upsert_simple(&json!({ "categories": [{ "slug": "ideas" }] }), None, "s3cr3t")
        .await?;
    if !response.status.is_success() {
        return Err("upsert should succeed against the stub".into());
    }

    let posts = stub.recorded_posts();
    let post = posts.first().ok_or("no upsert recorded")?;
    if post.path != "/-/v0/upsert-simple" {
        return Err("wrong upsert path".into());
    }
    if post.authorization.is_none() {
        return Err("simple upserts must authenticate with the api key".into());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn an_upsert_without_a_login_secret_is_rejected() -> Result<(), Box<dyn std::error::Error>>
{
    logging::init();
    let stub = spawn_forum_stub()?;
    stub.set_sso_response(json!({ "userId": 42 }));
    let mut client = SessionClient::new(stub_settings(stub.origin())?)?;

    let result =
        client.upsert_user_get_login_secret(&json!({ "ssoId": "sso-3" }), None, "s").await;
    match result {
        Err(HarnessError::ApiContract {
            missing_field, ..
        }) => {
            if missing_field != "loginSecret" {
                return Err("wrong missing field reported".into());
            }
            Ok(())
        }
        Err(_) => Err("wrong error kind for a contract violation".into()),
        Ok(_) => Err("a secret-less upsert response must be rejected".into()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn counters_and_user_lists_decode() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let stub = spawn_forum_stub()?;
    stub.set_counters(json!({
        "numReportedSpamFalsePositives": 3,
        "numReportedSpamFalseNegatives": 1,
    }));
    stub.set_list_users_response(json!({ "users": [{ "username": "jan" }] }));
    let client = SessionClient::new(stub_settings(stub.origin())?)?;

    let counters = client.test_counters().await?;
    let expected = TestCounters {
        num_reported_spam_false_positives: 3,
        num_reported_spam_false_negatives: 1,
    };
    if counters != expected {
        return Err("counters not decoded".into());
    }

    let users = client.list_users("ja").await?;
    if users != json!({ "users": [{ "username": "jan" }] }) {
        return Err("user list not decoded".into());
    }
    Ok(())
}
