//! # Bearer Tokens
//!
//! Random 32-byte URL-safe tokens for admin sessions, stored server-side
//! with a 7-day expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Default token lifetime in days.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Mint a fresh URL-safe bearer token from 32 random bytes.
pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = mint_token();
        let b = mint_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars, no padding.
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
