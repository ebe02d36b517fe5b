// crates/forum-e2e-client/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy for the e2e harness client.
// Purpose: Give every failure enough context to diagnose without re-running.
// Dependencies: thiserror, reqwest
// ============================================================================

//! ## Overview
//! The harness is fail-fast throughout: every variant here is terminal for
//! the running scenario. Variants carry the URL, status, and a truncated body
//! where available so a failed run can be diagnosed from its log alone.
//!
//! Invariants:
//! - Variants are stable for test assertions and error mapping.
//! - Response bodies embedded in messages are truncated, never unbounded.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the e2e harness client.
///
/// # Invariants
/// - Every variant is terminal; the only recovery path in the crate is the
///   single bounded token-refresh retry inside `SessionClient::post`.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The session handshake returned a non-success status or no token.
    #[error("session handshake with {origin} failed: {detail}")]
    AuthHandshake {
        /// Origin the handshake was sent to.
        origin: String,
        /// What went wrong (status or missing cookie).
        detail: String,
    },

    /// The shared e2e test password is not configured.
    #[error("no e2e test password configured; cannot reach test endpoints")]
    MissingTestPassword,

    /// Harness settings were missing or invalid.
    #[error("invalid harness settings: {detail}")]
    Settings {
        /// What was missing or malformed.
        detail: String,
    },

    /// A header value contains a single quote and cannot be rendered safely.
    #[error("header {name} contains a single quote; refusing to render request")]
    UnsafeHeaderValue {
        /// Name of the offending header.
        name: String,
    },

    /// A request came back with a non-success status outside expiry recovery.
    #[error("{method} {url} failed with status {status}: {body}")]
    RequestFailed {
        /// HTTP method of the failed request.
        method: &'static str,
        /// Request URL without the bypass-password parameter.
        url: String,
        /// Response status code.
        status: StatusCode,
        /// Truncated response body.
        body: String,
    },

    /// A request expected to fail came back with a success status.
    #[error("POST {url} should have failed but returned status {status}")]
    UnexpectedSuccess {
        /// Request URL without the bypass-password parameter.
        url: String,
        /// Response status code.
        status: StatusCode,
    },

    /// A response body could not be parsed as JSON.
    #[error("error parsing response json: {detail}; body: {body}")]
    BodyParse {
        /// Parser error description.
        detail: String,
        /// Raw (truncated) response body for diagnosis.
        body: String,
    },

    /// A polling loop exhausted its attempt budget without a match.
    #[error("timed out waiting for {what} after {attempts} attempts; last observation: {last_observation}")]
    PollTimeout {
        /// Description of the condition being waited for.
        what: String,
        /// Number of predicate invocations made.
        attempts: u64,
        /// The most recent non-matching observation.
        last_observation: String,
    },

    /// Email polling exhausted its budget without a full pattern match.
    #[error("never got any email to {address} matching {unmatched:?} ({attempts} attempts)")]
    NoMatchingEmail {
        /// Recipient address that was polled.
        address: String,
        /// Patterns that never matched the latest email body.
        unmatched: Vec<String>,
        /// Number of poll attempts made.
        attempts: u64,
    },

    /// The server reported so many recent emails that counting is unreliable.
    #[error("too many emails sent to {address} ({count}); the recent-email window is bounded")]
    TooManyEmails {
        /// Recipient address that was counted.
        address: String,
        /// Number of recent emails the server reported.
        count: usize,
    },

    /// An email matched but the expected link pattern was absent from its body.
    #[error("no link matching {pattern} in the email sent to {address}")]
    LinkNotFound {
        /// Link pattern that was expected in the body.
        pattern: String,
        /// Recipient address of the matched email.
        address: String,
    },

    /// An endpoint response is missing a field its contract requires.
    #[error("response from {url} is missing required field {missing_field}")]
    ApiContract {
        /// Endpoint URL.
        url: String,
        /// Name of the missing field.
        missing_field: String,
    },

    /// Transport-level HTTP failure.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}
