// crates/forum-e2e-client/src/settings.rs
// ============================================================================
// Module: Harness Settings
// Description: Environment-backed configuration for the e2e harness.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std, url
// ============================================================================

//! ## Overview
//! Harness settings are read from `FORUM_E2E_*` environment variables and
//! mapped into a small typed structure. Environment values are parsed with
//! strict UTF-8 enforcement to avoid silent misconfiguration; invalid values
//! fail closed. Tests construct [`HarnessSettings`] directly instead.

use std::time::Duration;

use url::Url;

use crate::error::HarnessError;
use crate::poll::PollConfig;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Origin of the server under test, e.g. `http://e2e-test.localhost`.
    Origin,
    /// Shared bypass password appended to every request.
    TestPassword,
    /// Shared API secret for API-key-authenticated endpoints.
    ApiSecret,
    /// Poll timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Poll interval override in milliseconds (positive integer).
    PollIntervalMs,
    /// Log full request bodies instead of truncating (`true`/`false`, `1`/`0`).
    Verbose,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "FORUM_E2E_ORIGIN",
            Self::TestPassword => "FORUM_E2E_TEST_PASSWORD",
            Self::ApiSecret => "FORUM_E2E_API_SECRET",
            Self::TimeoutSeconds => "FORUM_E2E_TIMEOUT_SEC",
            Self::PollIntervalMs => "FORUM_E2E_POLL_INTERVAL_MS",
            Self::Verbose => "FORUM_E2E_VERBOSE",
        }
    }
}

// ============================================================================
// SECTION: Settings Type
// ============================================================================

/// Typed harness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    /// Origin of the server under test.
    pub origin: String,
    /// Shared bypass password; requests fail fast when this is `None`.
    pub e2e_test_password: Option<String>,
    /// Shared API secret used by API-key-authenticated endpoint wrappers.
    pub api_secret: Option<String>,
    /// Default bounds for polling loops.
    pub poll: PollConfig,
    /// When set, request bodies are logged in full instead of truncated.
    pub verbose: bool,
}

impl HarnessSettings {
    /// Builds settings for the given origin with defaults everywhere else.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] when the origin is not a valid URL.
    pub fn new(origin: impl Into<String>) -> Result<Self, HarnessError> {
        let origin = origin.into();
        validate_origin(&origin)?;
        Ok(Self {
            origin,
            e2e_test_password: None,
            api_secret: None,
            poll: PollConfig::default(),
            verbose: false,
        })
    }

    /// Loads settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] when the origin is absent or any
    /// value is empty, not valid UTF-8, or fails validation.
    pub fn load() -> Result<Self, HarnessError> {
        let origin = read_env_nonempty(HarnessEnv::Origin.as_str())?.ok_or_else(|| {
            HarnessError::Settings {
                detail: format!("{} must be set", HarnessEnv::Origin.as_str()),
            }
        })?;
        validate_origin(&origin)?;
        let e2e_test_password = read_env_nonempty(HarnessEnv::TestPassword.as_str())?;
        let api_secret = read_env_nonempty(HarnessEnv::ApiSecret.as_str())?;
        let timeout = read_env_nonempty(HarnessEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_positive_secs(HarnessEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        let interval = read_env_nonempty(HarnessEnv::PollIntervalMs.as_str())?
            .map(|value| parse_positive_millis(HarnessEnv::PollIntervalMs.as_str(), &value))
            .transpose()?;
        let defaults = PollConfig::default();
        let poll = PollConfig::new(
            timeout.unwrap_or(defaults.timeout),
            interval.unwrap_or(defaults.interval),
        )?;
        let verbose = parse_bool_env(
            HarnessEnv::Verbose.as_str(),
            read_env_nonempty(HarnessEnv::Verbose.as_str())?,
        )?;
        Ok(Self {
            origin,
            e2e_test_password,
            api_secret,
            poll,
            verbose,
        })
    }

    /// Sets the bypass password.
    #[must_use]
    pub fn with_test_password(mut self, password: impl Into<String>) -> Self {
        self.e2e_test_password = Some(password.into());
        self
    }

    /// Sets the shared API secret.
    #[must_use]
    pub fn with_api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    /// Sets the default polling bounds.
    #[must_use]
    pub const fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Checks that the origin parses as an absolute URL.
fn validate_origin(origin: &str) -> Result<(), HarnessError> {
    Url::parse(origin).map_err(|err| HarnessError::Settings {
        detail: format!("origin {origin} is not a valid URL: {err}"),
    })?;
    Ok(())
}

/// Reads an environment variable and enforces UTF-8 validity.
fn read_env_strict(name: &str) -> Result<Option<String>, HarnessError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| HarnessError::Settings {
            detail: format!("{name} must be valid UTF-8"),
        })
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, HarnessError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(HarnessError::Settings {
            detail: format!("{name} must not be empty"),
        }),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive duration in whole seconds.
fn parse_positive_secs(name: &str, raw: &str) -> Result<Duration, HarnessError> {
    parse_positive_u64(name, raw, "seconds").map(Duration::from_secs)
}

/// Parses a positive duration in whole milliseconds.
fn parse_positive_millis(name: &str, raw: &str) -> Result<Duration, HarnessError> {
    parse_positive_u64(name, raw, "milliseconds").map(Duration::from_millis)
}

/// Parses a positive integer with a unit for error messages.
fn parse_positive_u64(name: &str, raw: &str, unit: &str) -> Result<u64, HarnessError> {
    let value: u64 = raw.trim().parse().map_err(|_| HarnessError::Settings {
        detail: format!("{name} must be a positive integer number of {unit}"),
    })?;
    if value == 0 {
        return Err(HarnessError::Settings {
            detail: format!("{name} must be greater than zero"),
        });
    }
    Ok(value)
}

/// Parses a boolean environment variable, defaulting to `false` when unset.
fn parse_bool_env(name: &str, raw: Option<String>) -> Result<bool, HarnessError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(HarnessError::Settings {
        detail: format!("{name} must be 1, 0, true, or false"),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
