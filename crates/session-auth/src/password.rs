//! # Admin Password Hashing
//!
//! PBKDF2-HMAC-SHA256 with 100 000 iterations and a random 16-byte salt,
//! stored as `salt$hexdigest`. The derived length is one SHA-256 block
//! (32 bytes), so the PBKDF2 loop is a single block computation.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Iteration count; fixed for interoperability with existing hashes.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

/// Hash a password for storage. Output format: `salt$hexdigest`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    let digest = pbkdf2_sha256(password.as_bytes(), salt_hex.as_bytes(), PBKDF2_ITERATIONS);
    format!("{salt_hex}${}", hex::encode(digest))
}

/// Check a raw password against a stored `salt$hexdigest` value.
///
/// Returns false for malformed stored values rather than erroring; a broken
/// row must never authenticate.
pub fn verify_password(raw: &str, stored: &str) -> bool {
    let Some((salt, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let computed = pbkdf2_sha256(raw.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS);
    let computed_hex = hex::encode(computed);
    computed_hex.as_bytes().ct_eq(digest_hex.as_bytes()).into()
}

/// Single-block PBKDF2 (RFC 2898): U1 = PRF(P, S || INT(1)),
/// U_j = PRF(P, U_{j-1}), T = U1 xor ... xor Uc.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut block = [0u8; DIGEST_LEN];
    let mut u = prf(password, &[salt, &1u32.to_be_bytes()]);
    block.copy_from_slice(&u);
    for _ in 1..iterations {
        u = prf(password, &[&u]);
        for (b, x) in block.iter_mut().zip(u.iter()) {
            *b ^= x;
        }
    }
    block
}

fn prf(key: &[u8], parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
