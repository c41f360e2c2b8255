//! Platform-administrator check: pure membership of the verified user id in
//! the statically configured allow-list. Layered on top of the verifier,
//! never inside it.

/// Whether a verified user id belongs to the configured allow-list.
pub fn is_platform_admin(user_id: i64, allow_list: &[i64]) -> bool {
    allow_list.contains(&user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        let allow = [42, 1001];
        assert!(is_platform_admin(42, &allow));
        assert!(!is_platform_admin(43, &allow));
        assert!(!is_platform_admin(42, &[]));
    }
}
