//! # Signed-Session Verifier
//!
//! Validates an opaque `&`-joined, URL-encoded payload against the shared
//! issuer secret and produces an authenticated identity context.
//!
//! The check chain is fixed and order-sensitive:
//!
//! 1. parse pairs (blank values kept, last occurrence of a key wins)
//! 2. pop `hash`; absent means [`AuthError::MissingHash`]
//! 3. derive `secret_key = HMAC-SHA256(key = issuer secret, msg = "WebAppData")`
//! 4. canonical check-string: remaining pairs sorted byte-wise by key,
//!    `key=value` each, newline-joined, no trailing newline
//! 5. `HMAC-SHA256(key = secret_key, msg = check-string)` as lowercase hex
//! 6. constant-time compare against the submitted hash; mismatch means
//!    [`AuthError::BadSignature`]
//! 7. `auth_date` present and integral, else [`AuthError::MissingTimestamp`]
//! 8. older than 24 h means [`AuthError::Expired`]
//! 9. `user` JSON with integer `id`, else [`AuthError::MalformedUser`]
//! 10. optional `chat` JSON; malformed chat is logged and ignored
//!
//! Verification is a pure function of (input, secret, current time): no side
//! effects, no shared state, safe to call from any number of tasks.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::errors::AuthError;
use crate::FRESHNESS_WINDOW_SECS;

type HmacSha256 = Hmac<Sha256>;

/// Identity carried inside the signed payload's `user` field.
///
/// Only `id` is validated; the name/locale fields are passed through
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Originating-chat context. Advisory only, never security-relevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// The authenticated context produced by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSession {
    pub query_id: Option<String>,
    pub user: SessionUser,
    pub chat: Option<ChatContext>,
    pub chat_type: Option<String>,
    pub chat_instance: Option<String>,
    pub start_param: Option<String>,
    /// Verified issuance time (Unix seconds).
    pub auth_date: i64,
    /// The original raw string, kept for auditing. Never log it in full;
    /// use [`SignedSession::fingerprint`] instead.
    pub raw: String,
}

impl SignedSession {
    /// Loggable summary of the raw payload: its length and a signature
    /// prefix, nothing else.
    pub fn fingerprint(&self) -> String {
        let sig_prefix = self
            .raw
            .split('&')
            .find_map(|pair| pair.strip_prefix("hash="))
            .map(|h| &h[..h.len().min(8)])
            .unwrap_or("");
        format!("len={} sig={}", self.raw.len(), sig_prefix)
    }
}

/// Verify a signed payload and extract the identity context it carries.
///
/// `now_unix` is the server's UTC clock; no client-supplied clock is
/// trusted. Re-running with the same inputs yields the same result.
pub fn verify_init_data(
    raw: &str,
    issuer_secret: &str,
    now_unix: i64,
) -> Result<SignedSession, AuthError> {
    let mut data = parse_pairs(raw);

    let submitted_hash = match data.remove("hash") {
        Some(h) if !h.is_empty() => h,
        _ => return Err(AuthError::MissingHash),
    };

    if issuer_secret.is_empty() {
        return Err(AuthError::SecretMissing);
    }

    let secret_key = hmac_sha256(issuer_secret.as_bytes(), b"WebAppData")?;
    let check_string = data
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");
    let computed = hex::encode(hmac_sha256(&secret_key, check_string.as_bytes())?);

    let signature_ok: bool = computed
        .as_bytes()
        .ct_eq(submitted_hash.as_bytes())
        .into();
    if !signature_ok {
        return Err(AuthError::BadSignature);
    }

    let auth_date = data
        .get("auth_date")
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AuthError::MissingTimestamp)?;
    if now_unix - auth_date > FRESHNESS_WINDOW_SECS {
        return Err(AuthError::Expired);
    }

    let user: SessionUser = data
        .get("user")
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MalformedUser)
        .and_then(|v| serde_json::from_str(v).map_err(|_| AuthError::MalformedUser))?;

    let chat = data.get("chat").and_then(|v| {
        serde_json::from_str::<ChatContext>(v)
            .map_err(|err| {
                debug!(error = %err, "ignoring malformed chat context");
            })
            .ok()
    });

    Ok(SignedSession {
        query_id: data.get("query_id").cloned(),
        user,
        chat,
        chat_type: data.get("chat_type").cloned(),
        chat_instance: data.get("chat_instance").cloned(),
        start_param: data.get("start_param").cloned(),
        auth_date,
        raw: raw.to_string(),
    })
}

/// Parse the query string into key/value pairs, keeping blank values and only
/// the last occurrence of a repeated key. `BTreeMap` gives the byte-wise
/// key order the check-string needs.
fn parse_pairs(raw: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(percent_decode(key), percent_decode(value));
    }
    out
}

/// Query-string decoding: `+` means space, then percent-unescape. An
/// undecodable component is kept as-is rather than rejected; the signature
/// check will fail on anything that was actually tampered with.
fn percent_decode(component: &str) -> String {
    let plus_decoded = component.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::SecretMissing)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "123456:test-issuer-secret";

    /// Build a signed payload the way the trusted issuer would.
    fn sign_payload(pairs: &[(&str, &str)], secret: &str) -> String {
        let mut sorted: Vec<(&str, &str)> = pairs.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let check_string = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let secret_key = hmac_sha256(secret.as_bytes(), b"WebAppData").unwrap();
        let hash = hex::encode(hmac_sha256(&secret_key, check_string.as_bytes()).unwrap());

        let mut encoded: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect();
        encoded.push(format!("hash={hash}"));
        encoded.join("&")
    }

    fn fresh_now(auth_date: i64) -> i64 {
        auth_date + 60
    }

    #[test]
    fn valid_payload_verifies_and_is_idempotent() {
        let raw = sign_payload(
            &[
                ("auth_date", "1700000000"),
                ("query_id", "AAH"),
                ("user", r#"{"id":42,"first_name":"Ann","username":"ann"}"#),
            ],
            SECRET,
        );
        let now = fresh_now(1_700_000_000);

        let first = verify_init_data(&raw, SECRET, now).unwrap();
        let second = verify_init_data(&raw, SECRET, now).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.user.id, 42);
        assert_eq!(first.user.username.as_deref(), Some("ann"));
        assert_eq!(first.query_id.as_deref(), Some("AAH"));
        assert_eq!(first.auth_date, 1_700_000_000);
        assert!(first.chat.is_none());
    }

    #[test]
    fn documented_minimal_example() {
        // user=%7B%22id%22%3A42%7D&auth_date=1700000000&hash=<validhex>
        let raw = sign_payload(
            &[("user", r#"{"id":42}"#), ("auth_date", "1700000000")],
            SECRET,
        );
        assert!(raw.contains("user=%7B%22id%22%3A42%7D"));
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        assert_eq!(session.user.id, 42);
        assert!(session.chat.is_none());
    }

    #[test]
    fn single_character_tamper_invalidates_signature() {
        let raw = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"id":42}"#)],
            SECRET,
        );
        let now = fresh_now(1_700_000_000);

        // Flip one character of the auth_date value.
        let tampered = raw.replacen("1700000000", "1700000001", 1);
        assert_ne!(raw, tampered);
        assert_eq!(
            verify_init_data(&tampered, SECRET, now),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn wrong_secret_is_a_bad_signature() {
        let raw = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"id":42}"#)],
            SECRET,
        );
        assert_eq!(
            verify_init_data(&raw, "other-secret", fresh_now(1_700_000_000)),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn freshness_window_boundaries() {
        let auth_date = 1_700_000_000;
        let raw = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"id":42}"#)],
            SECRET,
        );

        // 24h minus one second: still fresh.
        let just_inside = auth_date + FRESHNESS_WINDOW_SECS - 1;
        assert!(verify_init_data(&raw, SECRET, just_inside).is_ok());

        // Exactly 24h: still accepted (strict greater-than).
        assert!(verify_init_data(&raw, SECRET, auth_date + FRESHNESS_WINDOW_SECS).is_ok());

        // 24h plus one second: expired.
        let just_outside = auth_date + FRESHNESS_WINDOW_SECS + 1;
        assert_eq!(
            verify_init_data(&raw, SECRET, just_outside),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn missing_hash_is_reported_first() {
        assert_eq!(
            verify_init_data("user=%7B%22id%22%3A42%7D&auth_date=1", SECRET, 100),
            Err(AuthError::MissingHash)
        );
        assert_eq!(verify_init_data("", SECRET, 100), Err(AuthError::MissingHash));
    }

    #[test]
    fn bad_signature_takes_precedence_over_malformed_user() {
        // Invalid user JSON *and* a garbage hash: the signature check comes
        // first in the chain.
        let raw = "user=notjson&auth_date=1700000000&hash=deadbeef";
        assert_eq!(
            verify_init_data(raw, SECRET, fresh_now(1_700_000_000)),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn malformed_user_with_valid_signature() {
        let raw = sign_payload(&[("auth_date", "1700000000"), ("user", "notjson")], SECRET);
        assert_eq!(
            verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)),
            Err(AuthError::MalformedUser)
        );

        // Present but without an integer id.
        let raw = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"name":"x"}"#)],
            SECRET,
        );
        assert_eq!(
            verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)),
            Err(AuthError::MalformedUser)
        );
    }

    #[test]
    fn missing_auth_date_beats_user_parse() {
        let raw = sign_payload(&[("user", "notjson")], SECRET);
        assert_eq!(
            verify_init_data(&raw, SECRET, 100),
            Err(AuthError::MissingTimestamp)
        );
    }

    #[test]
    fn malformed_chat_is_tolerated() {
        let raw = sign_payload(
            &[
                ("auth_date", "1700000000"),
                ("chat", "{{not-json"),
                ("user", r#"{"id":7}"#),
            ],
            SECRET,
        );
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        assert_eq!(session.user.id, 7);
        assert!(session.chat.is_none());
    }

    #[test]
    fn well_formed_chat_is_extracted() {
        let raw = sign_payload(
            &[
                ("auth_date", "1700000000"),
                ("chat", r#"{"id":-100123,"type":"channel","title":"News"}"#),
                ("chat_type", "channel"),
                ("start_param", "run_my-test"),
                ("user", r#"{"id":7}"#),
            ],
            SECRET,
        );
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        let chat = session.chat.unwrap();
        assert_eq!(chat.id, -100_123);
        assert_eq!(chat.kind.as_deref(), Some("channel"));
        assert_eq!(session.chat_type.as_deref(), Some("channel"));
        assert_eq!(session.start_param.as_deref(), Some("run_my-test"));
    }

    #[test]
    fn repeated_key_keeps_last_occurrence() {
        // Signed over the *last* value; the parser must agree.
        let signed = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"id":9}"#)],
            SECRET,
        );
        let raw = format!("auth_date=1&{signed}");
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        assert_eq!(session.auth_date, 1_700_000_000);
    }

    #[test]
    fn blank_values_participate_in_the_check_string() {
        let raw = sign_payload(
            &[
                ("auth_date", "1700000000"),
                ("start_param", ""),
                ("user", r#"{"id":1}"#),
            ],
            SECRET,
        );
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        assert_eq!(session.start_param.as_deref(), Some(""));
    }

    #[test]
    fn empty_secret_is_a_server_side_error() {
        let raw = sign_payload(&[("auth_date", "1"), ("user", r#"{"id":1}"#)], SECRET);
        assert_eq!(verify_init_data(&raw, "", 100), Err(AuthError::SecretMissing));
    }

    #[test]
    fn fingerprint_never_exposes_the_full_payload() {
        let raw = sign_payload(
            &[("auth_date", "1700000000"), ("user", r#"{"id":42}"#)],
            SECRET,
        );
        let session = verify_init_data(&raw, SECRET, fresh_now(1_700_000_000)).unwrap();
        let fp = session.fingerprint();
        assert!(fp.starts_with(&format!("len={}", raw.len())));
        // Only 8 chars of the 64-char signature appear.
        assert!(fp.len() < 30);
    }
}
