// crates/forum-e2e-client/src/session.rs
// ============================================================================
// Module: Session and Auth Strategy
// Description: Authenticated-session value and per-request auth selection.
// Purpose: Model the anti-forgery token + cookie pair and how requests sign.
// Dependencies: reqwest, base64
// ============================================================================

//! ## Overview
//! A [`Session`] is an immutable value object built from the handshake
//! response; the owning client replaces it wholesale on refresh and never
//! mutates it in place. [`AuthStrategy`] picks how a request authenticates:
//! the cookie/token pair, or Basic authentication with an API requester
//! identity and shared secret. The two are mutually exclusive per request
//! and always selected explicitly, never inferred from optional fields.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::HeaderMap;
use reqwest::header::SET_COOKIE;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name of the anti-forgery token cookie set by the session handshake.
pub const XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Username prefix the server expects inside the Basic auth credential.
const BASIC_AUTH_USER_PREFIX: &str = "forumUserId=";

// ============================================================================
// SECTION: Session
// ============================================================================

/// One authenticated session against the server under test.
///
/// # Invariants
/// - Both fields are non-empty once the session is built.
/// - Exactly one live `Session` exists per owning client; refresh replaces
///   the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Anti-forgery token sent back in the `X-XSRF-TOKEN` header.
    pub xsrf_token: String,
    /// Cookie header value echoing every handshake cookie.
    pub cookie_header: String,
}

impl Session {
    /// Builds a session from the handshake response headers.
    ///
    /// Every `Set-Cookie` value contributes its `name=value` pair to the
    /// cookie header; the token is taken from the [`XSRF_COOKIE_NAME`] cookie.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AuthHandshake`] when no anti-forgery token
    /// cookie is present.
    pub fn from_set_cookie_headers(origin: &str, headers: &HeaderMap) -> Result<Self, HarnessError> {
        let mut cookie_header = String::new();
        let mut xsrf_token = String::new();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(cookie) = value.to_str() else {
                continue;
            };
            // A Set-Cookie header value looks like "name=value; options".
            let name_value = cookie.split(';').next().unwrap_or(cookie).trim();
            let Some((name, value)) = name_value.split_once('=') else {
                continue;
            };
            cookie_header.push_str(name_value);
            cookie_header.push_str("; ");
            if name == XSRF_COOKIE_NAME {
                xsrf_token = value.to_string();
            }
        }
        if xsrf_token.is_empty() {
            return Err(HarnessError::AuthHandshake {
                origin: origin.to_string(),
                detail: format!("no {XSRF_COOKIE_NAME} cookie in handshake response"),
            });
        }
        Ok(Self {
            xsrf_token,
            cookie_header,
        })
    }
}

// ============================================================================
// SECTION: Auth Strategy
// ============================================================================

/// How one request authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Cookie plus anti-forgery token from the current session (the default).
    Cookie,
    /// Basic authentication with an API requester identity and shared secret.
    ApiKey {
        /// User id of the requester the call acts as.
        requester_id: i64,
        /// Shared API secret.
        secret: String,
    },
}

impl AuthStrategy {
    /// Renders the `Authorization` header value for API-key auth.
    #[must_use]
    pub fn basic_auth_value(requester_id: i64, secret: &str) -> String {
        let credential = format!("{BASIC_AUTH_USER_PREFIX}{requester_id}:{secret}");
        format!("Basic {}", BASE64.encode(credential))
    }
}

// ============================================================================
// SECTION: Post Options
// ============================================================================

/// Recognized options for one POST request.
///
/// Replaces a loosely-typed options bag: every option has a stated default
/// and a single effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOptions {
    /// Authentication strategy; defaults to [`AuthStrategy::Cookie`].
    pub auth: AuthStrategy,
    /// Re-run the handshake and retry once when the token expired
    /// (default `true`). The retry itself always runs with this unset.
    pub retry_if_expired: bool,
    /// Treat a success status as the failure case (default `false`), for
    /// negative-path tests.
    pub expect_failure: bool,
}

impl Default for PostOptions {
    fn default() -> Self {
        Self {
            auth: AuthStrategy::Cookie,
            retry_if_expired: true,
            expect_failure: false,
        }
    }
}

impl PostOptions {
    /// Options for an API-key-authenticated request.
    #[must_use]
    pub fn api_key(requester_id: i64, secret: impl Into<String>) -> Self {
        Self {
            auth: AuthStrategy::ApiKey {
                requester_id,
                secret: secret.into(),
            },
            ..Self::default()
        }
    }

    /// Marks the request as one that should fail.
    #[must_use]
    pub const fn expecting_failure(mut self) -> Self {
        self.expect_failure = true;
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
