// crates/forum-e2e-client/src/response.rs
// ============================================================================
// Module: Server Response
// Description: Immutable result of one HTTP exchange with a deferred parse.
// Purpose: Keep raw bodies around for diagnosis; parse JSON only on demand.
// Dependencies: reqwest, serde_json
// ============================================================================

//! ## Overview
//! A [`ServerResponse`] is a per-exchange value object: status, headers, and
//! the raw body text. JSON parsing is deferred to [`ServerResponse::json`]
//! and fails loudly with the raw body attached, never returning a silent
//! null. Nothing here is cached or reused across requests.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Body length kept in error messages before truncation.
pub const BODY_PREVIEW_LIMIT: usize = 1000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct ServerResponse {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body text.
    pub body: String,
}

impl ServerResponse {
    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BodyParse`] with the raw (truncated) body when
    /// the body is not valid JSON.
    pub fn json(&self) -> Result<Value, HarnessError> {
        serde_json::from_str(&self.body).map_err(|err| HarnessError::BodyParse {
            detail: err.to_string(),
            body: truncate_for_display(&self.body),
        })
    }

    /// Parses the body as JSON and decodes it into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BodyParse`] when the body is not valid JSON or
    /// does not match the expected shape.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, HarnessError> {
        serde_json::from_str(&self.body).map_err(|err| HarnessError::BodyParse {
            detail: err.to_string(),
            body: truncate_for_display(&self.body),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Truncates a body for logs and error messages.
#[must_use]
pub fn truncate_for_display(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n       ...", &body[..end])
}

// ============================================================================
// SECTION: Tests
// ============================================================================
