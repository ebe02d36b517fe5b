// crates/forum-e2e-client/src/email.rs
// ============================================================================
// Module: Email Matcher
// Description: Polls the server's test-email endpoints and matches bodies.
// Purpose: Confirm a message satisfying textual requirements was delivered.
// Dependencies: forum-e2e-client core, regex, serde
// ============================================================================

//! ## Overview
//! Confirms that an email matching a set of literal substrings was delivered
//! to an address within a timeout, by polling the server's recent-email
//! endpoint through [`poll_until`].
//!
//! Matching policy: **all** patterns must be found in the body of the single
//! most-recently-arrived message; earlier messages are never inspected. When
//! a side effect triggers two messages in quick succession, a pattern meant
//! for the first can therefore never match once the second becomes the last
//! one. That is a stated policy of this harness, not an accident.

use std::sync::Mutex;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::client::SessionClient;
use crate::error::HarnessError;
use crate::poll::PollConfig;
use crate::poll::PollStatus;
use crate::poll::poll_until;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// The recent-email endpoint returns a bounded window; at this many entries
/// the count is no longer reliable.
pub const MAX_RELIABLE_EMAILS: usize = 14;

/// Link pattern for password-reset emails.
pub const RESET_PASSWORD_LINK: &str = r#"https?://[^"']*/-/reset-password"#;

/// Link pattern for invite-acceptance emails.
pub const ACCEPT_INVITE_LINK: &str = r#"https?://[^"']*/-/accept-invite"#;

/// Link pattern for one-time-login emails.
pub const ONE_TIME_LOGIN_LINK: &str = r#"https?://[^"']+/-/v0/login-with-secret"#;

/// Link pattern for address-verification emails.
pub const CONFIRM_ADDRESS_LINK: &str = r#"https?://[^"']*/-/confirm-email-address"#;

/// Link pattern for unsubscription emails.
pub const UNSUBSCRIBE_LINK: &str = r#"https?://[^"']*/-/unsubscribe"#;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One message delivered by the server under test.
///
/// # Invariants
/// - The server returns records in arrival-time ascending order; the last
///   element of the list is the most recent message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    /// Message subject.
    pub subject: String,
    /// HTML body text the patterns are matched against.
    pub body_html_text: String,
    /// Recipient address.
    #[serde(default)]
    pub sent_to: String,
}

/// Outcome of a successful pattern match against the latest email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMatch {
    /// The email every pattern matched.
    pub email: EmailRecord,
    /// Matched substrings, in the order the patterns were given.
    pub matching_strings: Vec<String>,
}

/// Summary of all emails sent for one site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailsSentSummary {
    /// Total number of emails sent.
    pub num: u64,
    /// Recipient addresses in arrival-time ascending order.
    pub addrs_by_time_asc: Vec<String>,
}

// ============================================================================
// SECTION: Email Client
// ============================================================================

/// Polls and matches the test emails the server has sent.
#[derive(Debug)]
pub struct EmailClient<'a> {
    /// Client for the server under test; email reads are GETs only.
    server: &'a SessionClient,
    /// Bounds for the polling loops.
    poll: PollConfig,
}

impl<'a> EmailClient<'a> {
    /// Builds an email client using the server's default poll bounds.
    #[must_use]
    pub fn new(server: &'a SessionClient) -> Self {
        let poll = server.settings().poll;
        Self {
            server,
            poll,
        }
    }

    /// Builds an email client with explicit poll bounds.
    #[must_use]
    pub const fn with_poll_config(server: &'a SessionClient, poll: PollConfig) -> Self {
        Self {
            server,
            poll,
        }
    }

    /// Fetches the bounded recent-email window for an address.
    async fn fetch_emails(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<Vec<EmailRecord>, HarnessError> {
        let url = self
            .server
            .origin_url(&format!("/-/last-e2e-test-email?sentTo={address}&siteId={site_id}"));
        let response = self.server.get(&url).await?;
        response.json_as()
    }

    /// Returns the most recent email sent to `address`, without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the fetch or parse fails; an empty inbox
    /// is `Ok(None)`, not an error.
    pub async fn last_email_sent_to(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<Option<EmailRecord>, HarnessError> {
        let emails = self.fetch_emails(site_id, address).await?;
        Ok(emails.into_iter().next_back())
    }

    /// Waits until at least one email was sent to `address`, then returns the
    /// most recent one.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::PollTimeout`] when no email arrives in time.
    pub async fn wait_for_last_email_sent_to(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<EmailRecord, HarnessError> {
        poll_until(&self.poll, &format!("an email to {address}"), || {
            let this = self;
            async move {
                let emails = this.fetch_emails(site_id, address).await?;
                Ok(emails.into_iter().next_back().map_or_else(
                    || PollStatus::NotYet(format!("no emails sent to {address} yet")),
                    PollStatus::Match,
                ))
            }
        })
        .await
    }

    /// Waits until the latest email to `address` contains every pattern.
    ///
    /// Patterns are literal substrings (regex-escaped before matching, so
    /// path separators cannot break the match). An empty pattern list matches
    /// the latest email unconditionally once one exists.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoMatchingEmail`] naming the unmatched
    /// patterns when the attempt budget runs out.
    pub async fn wait_until_last_email_matches(
        &self,
        site_id: i64,
        address: &str,
        patterns: &[&str],
    ) -> Result<EmailMatch, HarnessError> {
        let regexes = compile_literal_patterns(patterns)?;
        let last_misses: Mutex<Vec<String>> =
            Mutex::new(patterns.iter().map(ToString::to_string).collect());
        let result = poll_until(
            &self.poll,
            &format!("an email to {address} matching [{}]", patterns.join(", ")),
            || {
                let this = self;
                let regexes = &regexes;
                let last_misses = &last_misses;
                async move {
                    let emails = this.fetch_emails(site_id, address).await?;
                    let Some(email) = emails.into_iter().next_back() else {
                        return Ok(PollStatus::NotYet(format!("no emails sent to {address} yet")));
                    };
                    let (matching_strings, misses) =
                        match_patterns(regexes, &email.body_html_text);
                    if let Ok(mut guard) = last_misses.lock() {
                        guard.clone_from(&misses);
                    }
                    if misses.is_empty() {
                        return Ok(PollStatus::Match(EmailMatch {
                            email,
                            matching_strings,
                        }));
                    }
                    Ok(PollStatus::NotYet(format!(
                        "last email to {address} is still '{}'; unmatched: [{}]",
                        email.subject,
                        misses.join(", ")
                    )))
                }
            },
        )
        .await;
        match result {
            Ok(matched) => Ok(matched),
            Err(HarnessError::PollTimeout {
                attempts, ..
            }) => {
                let unmatched =
                    last_misses.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
                Err(HarnessError::NoMatchingEmail {
                    address: address.to_string(),
                    unmatched,
                    attempts,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Checks, without waiting, whether the latest email to `address`
    /// contains every pattern.
    ///
    /// A point-in-time read: `Ok(None)` means no email has arrived yet or the
    /// latest one misses at least one pattern. Callers that can tolerate
    /// delivery lag use [`Self::wait_until_last_email_matches`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the fetch, parse, or pattern compilation
    /// fails.
    pub async fn last_email_matches(
        &self,
        site_id: i64,
        address: &str,
        patterns: &[&str],
    ) -> Result<Option<EmailMatch>, HarnessError> {
        let regexes = compile_literal_patterns(patterns)?;
        let emails = self.fetch_emails(site_id, address).await?;
        let Some(email) = emails.into_iter().next_back() else {
            return Ok(None);
        };
        let (matching_strings, misses) = match_patterns(&regexes, &email.body_html_text);
        if !misses.is_empty() {
            return Ok(None);
        }
        Ok(Some(EmailMatch {
            email,
            matching_strings,
        }))
    }

    /// Counts the recent emails sent to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::TooManyEmails`] when the count reaches
    /// [`MAX_RELIABLE_EMAILS`], since the endpoint's window is bounded and
    /// higher counts are unreliable.
    pub async fn count_sent_to(&self, site_id: i64, address: &str) -> Result<usize, HarnessError> {
        let emails = self.fetch_emails(site_id, address).await?;
        if emails.len() >= MAX_RELIABLE_EMAILS {
            return Err(HarnessError::TooManyEmails {
                address: address.to_string(),
                count: emails.len(),
            });
        }
        Ok(emails.len())
    }

    /// Returns the number of emails sent for a site and their recipients.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the fetch or parse fails.
    pub async fn num_emails_sent(&self, site_id: i64) -> Result<EmailsSentSummary, HarnessError> {
        let url = self.server.origin_url(&format!("/-/num-e2e-test-emails-sent?siteId={site_id}"));
        let response = self.server.get(&url).await?;
        response.json_as()
    }

    /// Waits for a password-reset email and extracts its reset link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LinkNotFound`] when the matched email body
    /// carries no reset link, and the usual match/poll errors otherwise.
    pub async fn wait_for_reset_password_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let matched =
            self.wait_until_last_email_matches(site_id, address, &["reset-password"]).await?;
        find_link(RESET_PASSWORD_LINK, &matched.email.body_html_text, address)
    }

    /// Waits for an invite email and extracts its acceptance link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LinkNotFound`] when the matched email body
    /// carries no invite link, and the usual match/poll errors otherwise.
    pub async fn wait_for_invite_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let matched = self
            .wait_until_last_email_matches(site_id, address, &["invites you to join"])
            .await?;
        find_link(ACCEPT_INVITE_LINK, &matched.email.body_html_text, address)
    }

    /// Waits for a one-time-login email and extracts its login link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LinkNotFound`] when the matched email body
    /// carries no login link, and the usual match/poll errors otherwise.
    pub async fn wait_for_one_time_login_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let matched =
            self.wait_until_last_email_matches(site_id, address, &["login-with-secret"]).await?;
        find_link(ONE_TIME_LOGIN_LINK, &matched.email.body_html_text, address)
    }

    /// Waits for an address-verification email and extracts its confirm link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LinkNotFound`] when the matched email body
    /// carries no confirm link, and the usual match/poll errors otherwise.
    pub async fn wait_for_email_verification_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let matched = self
            .wait_until_last_email_matches(site_id, address, &["confirm-email-address"])
            .await?;
        find_link(CONFIRM_ADDRESS_LINK, &matched.email.body_html_text, address)
    }

    /// Waits for an email to arrive and extracts its unsubscription link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::LinkNotFound`] when the latest email carries
    /// no unsubscription link, and poll/fetch errors otherwise.
    pub async fn unsubscribe_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let email = self.wait_for_last_email_sent_to(site_id, address).await?;
        find_link(UNSUBSCRIBE_LINK, &email.body_html_text, address)
    }

    /// Extracts the unsubscription link from the latest email to `address`,
    /// without waiting.
    ///
    /// `Ok(None)` means no email has arrived yet or the latest one carries no
    /// unsubscription link.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the fetch or parse fails.
    pub async fn any_unsubscribe_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<Option<String>, HarnessError> {
        let regex = compile_link_pattern(UNSUBSCRIBE_LINK)?;
        let emails = self.fetch_emails(site_id, address).await?;
        Ok(emails
            .into_iter()
            .next_back()
            .and_then(|email| regex.find(&email.body_html_text).map(|m| m.as_str().to_string())))
    }

    /// Polls until the latest email to `address` contains an unsubscription
    /// link, tolerating unrelated emails arriving first.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::PollTimeout`] when no such link shows up in
    /// time.
    pub async fn wait_for_unsubscribe_link(
        &self,
        site_id: i64,
        address: &str,
    ) -> Result<String, HarnessError> {
        let regex = compile_link_pattern(UNSUBSCRIBE_LINK)?;
        poll_until(&self.poll, &format!("an unsubscription link emailed to {address}"), || {
            let this = self;
            let regex = &regex;
            async move {
                let emails = this.fetch_emails(site_id, address).await?;
                let Some(email) = emails.into_iter().next_back() else {
                    return Ok(PollStatus::NotYet(format!("no emails sent to {address} yet")));
                };
                Ok(regex.find(&email.body_html_text).map_or_else(
                    || {
                        PollStatus::NotYet(format!(
                            "last email to {address} ('{}') has no unsubscription link",
                            email.subject
                        ))
                    },
                    |found| PollStatus::Match(found.as_str().to_string()),
                ))
            }
        })
        .await
    }
}

// ============================================================================
// SECTION: Matching Helpers
// ============================================================================

/// Compiles literal substring patterns into regexes.
fn compile_literal_patterns(patterns: &[&str]) -> Result<Vec<Regex>, HarnessError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&regex::escape(pattern)).map_err(|err| HarnessError::Settings {
                detail: format!("pattern '{pattern}' did not compile: {err}"),
            })
        })
        .collect()
}

/// Compiles one of the link-pattern constants.
///
/// The pattern is extended to swallow the rest of the URL (query string and
/// all) up to the closing attribute quote, so the extracted link is usable
/// as-is.
fn compile_link_pattern(pattern: &str) -> Result<Regex, HarnessError> {
    Regex::new(&format!(r#"{pattern}[^"']*"#)).map_err(|err| HarnessError::Settings {
        detail: format!("link pattern '{pattern}' did not compile: {err}"),
    })
}

/// Matches every regex against a body, keeping input order.
///
/// Returns the matched substrings and the original pattern text of every
/// regex that found nothing.
fn match_patterns(regexes: &[Regex], body: &str) -> (Vec<String>, Vec<String>) {
    let mut matching_strings = Vec::new();
    let mut misses = Vec::new();
    for regex in regexes {
        match regex.find(body) {
            Some(found) => matching_strings.push(found.as_str().to_string()),
            None => misses.push(unescape_pattern(regex.as_str())),
        }
    }
    (matching_strings, misses)
}

/// Recovers the literal pattern text from an escaped regex source.
fn unescape_pattern(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Finds the first link matching `pattern` in an email body.
fn find_link(pattern: &str, body: &str, address: &str) -> Result<String, HarnessError> {
    let regex = compile_link_pattern(pattern)?;
    regex.find(body).map(|found| found.as_str().to_string()).ok_or_else(|| {
        HarnessError::LinkNotFound {
            pattern: pattern.to_string(),
            address: address.to_string(),
        }
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
