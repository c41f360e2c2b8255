//! # Session Auth
//!
//! The authentication core of the platform.
//!
//! ## Architecture
//!
//! - **`verify`**: the signed-session verifier, a pure function that decides
//!   whether an opaque client-submitted string was produced by the trusted
//!   issuer within the freshness window, and extracts the identity it carries.
//! - **`admin`**: the "is this identity a platform administrator" membership
//!   test, layered on top of (not inside) the verifier.
//! - **`password`**: PBKDF2-HMAC-SHA256 credential hashing for admin accounts.
//! - **`token`**: URL-safe random bearer tokens for admin sessions.
//!
//! ## Security Notes
//!
//! - Signature comparison uses `subtle::ConstantTimeEq`; a standard string
//!   comparison would leak partial-match timing.
//! - The raw signed string is never logged in full; only its length and a
//!   signature prefix (see [`verify::SignedSession::fingerprint`]).

pub mod admin;
pub mod errors;
pub mod password;
pub mod token;
pub mod verify;

pub use admin::is_platform_admin;
pub use errors::AuthError;
pub use password::{hash_password, verify_password};
pub use token::mint_token;
pub use verify::{verify_init_data, ChatContext, SessionUser, SignedSession};

/// Fixed freshness window for signed sessions: 24 hours, in seconds.
pub const FRESHNESS_WINDOW_SECS: i64 = 24 * 60 * 60;
