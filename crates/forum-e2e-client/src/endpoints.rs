// crates/forum-e2e-client/src/endpoints.rs
// ============================================================================
// Module: Endpoint Wrappers
// Description: Typed request builders for the server's test-control endpoints.
// Purpose: Translate typed requests into SessionClient calls and validate
//          each endpoint's response contract.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Thin wrappers over [`SessionClient::get`]/[`SessionClient::post`] for the
//! test-control endpoints: site provisioning, rate-limit bypass, virtual
//! clock, cache-key deletion, counters, and the API-key-authenticated v0
//! operations. Each wrapper validates its own required response fields and
//! raises [`HarnessError::ApiContract`] otherwise.

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::client::SessionClient;
use crate::error::HarnessError;
use crate::response::ServerResponse;
use crate::response::truncate_for_display;
use crate::session::PostOptions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User id of the built-in system bot, the default API requester.
pub const SYSBOT_USER_ID: i64 = 2;

// ============================================================================
// SECTION: Response Types
// ============================================================================

/// Id and address of an imported site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteIdAddress {
    /// Id of the imported site.
    pub id: i64,
    /// Origin the site is reachable at, when the server reports one.
    #[serde(default)]
    pub origin: Option<String>,
}

/// Server-side test counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCounters {
    /// Spam reports the server classified as false positives.
    pub num_reported_spam_false_positives: i64,
    /// Spam reports the server classified as false negatives.
    pub num_reported_spam_false_negatives: i64,
}

// ============================================================================
// SECTION: Site Provisioning
// ============================================================================

impl SessionClient {
    /// Imports site data via the endpoint that also works in prod mode.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ApiContract`] when the response has no site
    /// id, plus the usual request errors.
    pub async fn import_site_json(&mut self, site: &Value) -> Result<SiteIdAddress, HarnessError> {
        let url = self.origin_url("/-/import-site-json?deleteOldSite=true");
        self.import_site(&url, site.clone()).await
    }

    /// Imports test-site data.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ApiContract`] when the response has no site
    /// id, plus the usual request errors.
    pub async fn import_test_site_json(
        &mut self,
        site: &Value,
        delete_old_site: bool,
    ) -> Result<SiteIdAddress, HarnessError> {
        let mut site = site.clone();
        if let Some(meta) = site.get_mut("meta").and_then(Value::as_object_mut) {
            meta.insert("nextPageId".to_string(), json!(100)); // for now
            meta.insert("version".to_string(), json!(1)); // for now
        }
        let suffix = if delete_old_site { "?deleteOldSite=true" } else { "" };
        let url = self.origin_url(&format!("/-/import-test-site-json{suffix}"));
        self.import_site(&url, site).await
    }

    /// Shared import flow: mark the payload deletable, POST, validate the id.
    async fn import_site(
        &mut self,
        url: &str,
        mut site: Value,
    ) -> Result<SiteIdAddress, HarnessError> {
        if let Some(map) = site.as_object_mut() {
            map.insert("isTestSiteOkDelete".to_string(), json!(true));
        }
        let response = self.post(url, &site, &PostOptions::default()).await?;
        let body_json = response.json()?;
        if body_json.get("id").is_none() {
            return Err(HarnessError::ApiContract {
                url: url.to_string(),
                missing_field: "id".to_string(),
            });
        }
        serde_json::from_value(body_json).map_err(|err| HarnessError::BodyParse {
            detail: err.to_string(),
            body: truncate_for_display(&response.body),
        })
    }

    /// Deletes an old test site by its local hostname.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn delete_old_test_site(&mut self, local_hostname: &str) -> Result<(), HarnessError> {
        let url = self.origin_url("/-/delete-test-site");
        self.post(&url, &json!({ "localHostname": local_hostname }), &PostOptions::default())
            .await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Test Controls
// ============================================================================

impl SessionClient {
    /// Disables rate limiting for a site.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn skip_rate_limits(&mut self, site_id: i64) -> Result<(), HarnessError> {
        let url = self.origin_url("/-/skip-rate-limits");
        self.post(&url, &json!({ "siteId": site_id }), &PostOptions::default()).await?;
        Ok(())
    }

    /// Advances the server's virtual clock by whole seconds.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn play_time_seconds(&mut self, seconds: i64) -> Result<(), HarnessError> {
        let url = self.origin_url("/-/play-time");
        self.post(&url, &json!({ "seconds": seconds }), &PostOptions::default()).await?;
        Ok(())
    }

    /// Advances the server's virtual clock by whole minutes.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn play_time_minutes(&mut self, minutes: i64) -> Result<(), HarnessError> {
        self.play_time_seconds(minutes * 60).await
    }

    /// Advances the server's virtual clock by whole hours.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn play_time_hours(&mut self, hours: i64) -> Result<(), HarnessError> {
        self.play_time_seconds(hours * 3600).await
    }

    /// Advances the server's virtual clock by whole days.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn play_time_days(&mut self, days: i64) -> Result<(), HarnessError> {
        self.play_time_seconds(days * 3600 * 24).await
    }

    /// Deletes one cache key on the server.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn delete_redis_key(&mut self, key: &str) -> Result<(), HarnessError> {
        let url = self.origin_url("/-/delete-redis-key");
        self.post(&url, &json!({ "key": key }), &PostOptions::default()).await?;
        Ok(())
    }

    /// Fetches the server-side test counters.
    ///
    /// # Errors
    ///
    /// Returns the usual request and parse errors.
    pub async fn test_counters(&self) -> Result<TestCounters, HarnessError> {
        let url = self.origin_url("/-/test-counters");
        let response = self.get(&url).await?;
        response.json_as()
    }
}

// ============================================================================
// SECTION: API v0
// ============================================================================

impl SessionClient {
    /// Upserts a user over single sign-on and returns a one-time login secret.
    ///
    /// Authenticates with the API key; the requester defaults to
    /// [`SYSBOT_USER_ID`].
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ApiContract`] when the response carries no
    /// `loginSecret`, plus the usual request errors.
    pub async fn upsert_user_get_login_secret(
        &mut self,
        external_user: &Value,
        requester_id: Option<i64>,
        api_secret: &str,
    ) -> Result<String, HarnessError> {
        let url = self.origin_url("/-/v0/sso-upsert-user-generate-login-secret");
        let options =
            PostOptions::api_key(requester_id.unwrap_or(SYSBOT_USER_ID), api_secret);
        let response = self.post(&url, external_user, &options).await?;
        let body_json = response.json()?;
        let secret = body_json
            .get("loginSecret")
            .and_then(Value::as_str)
            .ok_or_else(|| HarnessError::ApiContract {
                url: url.clone(),
                missing_field: "loginSecret".to_string(),
            })?
            .to_string();
        debug!(
            "Now you can try: {}?oneTimeSecret={secret}&thenGoTo=/",
            self.origin_url("/-/v0/login-with-secret")
        );
        Ok(secret)
    }

    /// Upserts pages, categories, and similar things in one call.
    ///
    /// Returns the raw response so negative-path callers can inspect the
    /// body; combine with [`PostOptions::expecting_failure`] via
    /// [`SessionClient::post`] directly for requests that should fail.
    ///
    /// # Errors
    ///
    /// Returns the usual request errors.
    pub async fn upsert_simple(
        &mut self,
        data: &Value,
        requester_id: Option<i64>,
        api_secret: &str,
    ) -> Result<ServerResponse, HarnessError> {
        let url = self.origin_url("/-/v0/upsert-simple");
        let options =
            PostOptions::api_key(requester_id.unwrap_or(SYSBOT_USER_ID), api_secret);
        self.post(&url, data, &options).await
    }

    /// Lists users whose usernames start with a prefix.
    ///
    /// # Errors
    ///
    /// Returns the usual request and parse errors.
    pub async fn list_users(&self, username_prefix: &str) -> Result<Value, HarnessError> {
        let url = self.origin_url(&format!("/-/v0/list-users?usernamePrefix={username_prefix}"));
        let response = self.get(&url).await?;
        response.json()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
