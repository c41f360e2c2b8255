//! # Auth Errors
//!
//! Failure kinds of the signed-session verifier. The caller maps these to
//! outward signals (401/400/500-equivalent); the verifier itself never
//! reveals which internal check failed to untrusted parties.

use thiserror::Error;

/// Errors produced while verifying a signed session.
///
/// The order of checks is fixed: hash presence, signature, `auth_date`
/// presence, freshness, then user parse. Consumers rely on that order for
/// consistent error reporting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The payload carries no `hash` field (or an empty one).
    #[error("missing hash field")]
    MissingHash,

    /// The computed digest does not match the submitted one.
    #[error("invalid signature")]
    BadSignature,

    /// `auth_date` is absent or not a Unix timestamp.
    #[error("missing or invalid auth_date")]
    MissingTimestamp,

    /// The payload is older than the freshness window.
    #[error("signed session expired")]
    Expired,

    /// `user` is absent, not JSON, or lacks an integer `id`.
    #[error("missing or malformed user payload")]
    MalformedUser,

    /// The shared issuer secret is not configured on this server.
    #[error("issuer secret not configured")]
    SecretMissing,
}
