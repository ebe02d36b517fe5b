// crates/forum-e2e-client/src/lib.rs
// ============================================================================
// Module: Forum E2E Client Library
// Description: Session-aware HTTP client and polling primitives for e2e tests.
// Purpose: Drive a forum server under test and observe its async side effects.
// Dependencies: reqwest, tokio, serde, thiserror
// ============================================================================

//! ## Overview
//! This crate talks to the forum server being tested; it does not start any
//! server itself. It owns the authenticated session (anti-forgery token plus
//! cookies), repairs that session when the token expires, and exposes a
//! bounded polling primitive used to wait for asynchronous side effects such
//! as notification emails.
//!
//! Invariants:
//! - Every retry is bounded: token refresh happens at most once per request,
//!   and polling never exceeds its attempt budget.
//! - Errors are terminal for the running scenario; nothing is silently
//!   recovered except the single token-refresh retry.
//!
//! Security posture: server responses are untrusted test data; bodies are
//! truncated before they reach logs or error messages.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod email;
pub mod endpoints;
pub mod error;
pub mod poll;
pub mod response;
pub mod session;
pub mod settings;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use client::SessionClient;
pub use email::EmailClient;
pub use email::EmailMatch;
pub use email::EmailRecord;
pub use endpoints::SYSBOT_USER_ID;
pub use endpoints::SiteIdAddress;
pub use endpoints::TestCounters;
pub use error::HarnessError;
pub use poll::PollConfig;
pub use poll::PollStatus;
pub use poll::poll_until;
pub use response::ServerResponse;
pub use session::AuthStrategy;
pub use session::PostOptions;
pub use session::Session;
pub use settings::HarnessSettings;
