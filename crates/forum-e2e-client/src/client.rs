// crates/forum-e2e-client/src/client.rs
// ============================================================================
// Module: Session Client
// Description: Authenticated HTTP exchanges against the server under test.
// Purpose: Own the session and repair it transparently when the token expires.
// Dependencies: reqwest, tokio, tracing
// ============================================================================

//! ## Overview
//! Issues GET/POST requests against one origin. The client owns at most one
//! live [`Session`]; the only mutation path is expiry recovery, which
//! replaces the session wholesale and retries the request exactly once.
//! Every write request is logged as a copy-pasteable `curl` command so a
//! failed run can be replayed by hand.
//!
//! Invariants:
//! - Token refresh runs at most once per `post` call; a second consecutive
//!   expiry propagates as [`HarnessError::RequestFailed`].
//! - The shared bypass password is checked before any request is sent.

use std::time::Duration;

use tracing::debug;
use tracing::info;

use crate::error::HarnessError;
use crate::response::ServerResponse;
use crate::response::truncate_for_display;
use crate::session::AuthStrategy;
use crate::session::PostOptions;
use crate::session::Session;
use crate::settings::HarnessSettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Marker substring in a failure body meaning the anti-forgery token expired.
pub const XSRF_EXPIRED_MARKER: &str = "XSRF_TOKEN_EXPIRED_";

/// Query parameter carrying the shared bypass password.
const TEST_PASSWORD_PARAM: &str = "e2eTestPassword";

/// Per-request transport timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// SECTION: Client
// ============================================================================

/// Session-aware HTTP client for one origin.
///
/// # Invariants
/// - `session` is `None` until [`SessionClient::init_session`] succeeds and
///   is only ever replaced as a whole value afterwards.
#[derive(Debug)]
pub struct SessionClient {
    /// Harness configuration, including the origin and shared secrets.
    settings: HarnessSettings,
    /// Underlying HTTP transport.
    http: reqwest::Client,
    /// Current authenticated session, if any.
    session: Option<Session>,
}

impl SessionClient {
    /// Builds a client for the origin in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Http`] when the transport cannot be built.
    pub fn new(settings: HarnessSettings) -> Result<Self, HarnessError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            settings,
            http,
            session: None,
        })
    }

    /// Returns the harness settings.
    #[must_use]
    pub const fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Returns the current session, if a handshake has succeeded.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Joins a path onto the configured origin.
    #[must_use]
    pub fn origin_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.origin.trim_end_matches('/'))
    }

    /// Runs the session handshake: an unauthenticated GET to the origin.
    ///
    /// Reads the `Set-Cookie` response headers and replaces the current
    /// session with a fresh token/cookie pair.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AuthHandshake`] when the handshake status is
    /// not success or the token cookie is absent.
    pub async fn init_session(&mut self) -> Result<(), HarnessError> {
        let origin = self.settings.origin.clone();
        debug!("GET {origin} (session handshake)");
        let response = self.http.get(&origin).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HarnessError::AuthHandshake {
                origin,
                detail: format!("handshake returned status {status}"),
            });
        }
        let session = Session::from_set_cookie_headers(&origin, response.headers())?;
        self.session = Some(session);
        Ok(())
    }

    /// Issues an authenticated GET.
    ///
    /// Appends the shared bypass password and attaches the session headers
    /// when a session exists. GETs never trigger expiry recovery.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingTestPassword`] when the password is not
    /// configured and [`HarnessError::RequestFailed`] on a non-success status.
    pub async fn get(&self, url: &str) -> Result<ServerResponse, HarnessError> {
        let full_url = self.url_with_password(url)?;
        debug!("GET {url}");
        let mut request = self.http.get(&full_url);
        for (name, value) in self.session_headers() {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(HarnessError::RequestFailed {
                method: "GET",
                url: url.to_string(),
                status,
                body: truncate_for_display(&body),
            });
        }
        Ok(ServerResponse {
            status,
            headers,
            body,
        })
    }

    /// Issues an authenticated POST with a JSON payload.
    ///
    /// Authentication follows `options.auth`: the session cookie/token pair
    /// by default, or Basic auth for API-key requests (session headers are
    /// omitted then). When the response carries the expiry marker and
    /// `options.retry_if_expired` is set, the handshake is re-run and the
    /// request retried exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::RequestFailed`] on a non-success status (or a
    /// second consecutive expiry), [`HarnessError::UnexpectedSuccess`] when
    /// `options.expect_failure` is set and the status is success, and
    /// [`HarnessError::UnsafeHeaderValue`] when a header value cannot be
    /// rendered into the diagnostic `curl` command.
    pub async fn post(
        &mut self,
        url: &str,
        payload: &serde_json::Value,
        options: &PostOptions,
    ) -> Result<ServerResponse, HarnessError> {
        let full_url = self.url_with_password(url)?;
        let body_text = serde_json::to_string(payload).map_err(|err| HarnessError::BodyParse {
            detail: format!("payload serialization failed: {err}"),
            body: String::new(),
        })?;
        let mut retry_allowed = options.retry_if_expired;
        loop {
            let headers = self.auth_headers(&options.auth);
            debug!("POST {url}");
            debug!("{}", render_curl_command(url, &headers, &body_text, self.settings.verbose)?);
            let mut request = self.http.post(&full_url).json(payload);
            for (name, value) in &headers {
                request = request.header(*name, value.as_str());
            }
            let response = request.send().await?;
            let status = response.status();
            let response_headers = response.headers().clone();
            let body = response.text().await?;

            // The token expires if the virtual clock is advanced too far.
            if !status.is_success() && body.contains(XSRF_EXPIRED_MARKER) && retry_allowed {
                retry_allowed = false;
                info!("anti-forgery token expired; getting a new one and retrying once");
                self.init_session().await?;
                continue;
            }

            if options.expect_failure {
                if status.is_success() {
                    return Err(HarnessError::UnexpectedSuccess {
                        url: url.to_string(),
                        status,
                    });
                }
            } else if !status.is_success() {
                return Err(HarnessError::RequestFailed {
                    method: "POST",
                    url: url.to_string(),
                    status,
                    body: truncate_for_display(&body),
                });
            }

            return Ok(ServerResponse {
                status,
                headers: response_headers,
                body,
            });
        }
    }

    /// Appends the bypass-password query parameter to a URL.
    fn url_with_password(&self, url: &str) -> Result<String, HarnessError> {
        let password = self
            .settings
            .e2e_test_password
            .as_deref()
            .ok_or(HarnessError::MissingTestPassword)?;
        Ok(append_query_param(url, TEST_PASSWORD_PARAM, password))
    }

    /// Returns the session cookie/token headers, when a session exists.
    fn session_headers(&self) -> Vec<(&'static str, String)> {
        self.session.as_ref().map_or_else(Vec::new, |session| {
            vec![
                ("X-XSRF-TOKEN", session.xsrf_token.clone()),
                ("Cookie", session.cookie_header.clone()),
            ]
        })
    }

    /// Builds the auth headers for one POST per the selected strategy.
    fn auth_headers(&self, auth: &AuthStrategy) -> Vec<(&'static str, String)> {
        match auth {
            AuthStrategy::Cookie => self.session_headers(),
            AuthStrategy::ApiKey {
                requester_id,
                secret,
            } => vec![(
                "Authorization",
                AuthStrategy::basic_auth_value(*requester_id, secret),
            )],
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Appends one query parameter, picking `?` or `&` as needed.
fn append_query_param(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{name}={value}")
}

/// Renders a POST as a copy-pasteable `curl` command for offline replay.
///
/// The body is truncated past [`crate::response::BODY_PREVIEW_LIMIT`] unless
/// `verbose` is set (a truncated rendering is no longer copy-pasteable, but
/// keeps logs readable).
///
/// # Errors
///
/// Returns [`HarnessError::UnsafeHeaderValue`] when a header value contains a
/// single quote, which would break out of the quoted rendering.
fn render_curl_command(
    url: &str,
    headers: &[(&'static str, String)],
    body_text: &str,
    verbose: bool,
) -> Result<String, HarnessError> {
    let mut header_lines = vec!["-H 'Content-Type: application/json'".to_string()];
    for (name, value) in headers {
        if value.contains('\'') {
            return Err(HarnessError::UnsafeHeaderValue {
                name: (*name).to_string(),
            });
        }
        header_lines.push(format!("-H '{name}: {value}'"));
    }
    let escaped = body_text.replace('\'', "'\\''");
    let data_text = if verbose {
        escaped
    } else {
        truncate_for_display(&escaped)
    };
    Ok(format!(
        "curl  \\\n    -X POST  \\\n    {}  \\\n    -d '{data_text}'  \\\n    {url}",
        header_lines.join("  \\\n    ")
    ))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
