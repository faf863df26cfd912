//! Admin authentication
//!
//! The platform has a single shared organizer password, nothing more. The
//! password itself is never retained; only its Blake3 hash is, and
//! verification compares hashes in constant time.

use subtle::ConstantTimeEq;

/// Default demo password, overridable at construction
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Verifier for the shared admin password
#[derive(Clone)]
pub struct AdminAuth {
    password_hash: [u8; 32],
}

impl AdminAuth {
    /// Verifier for a specific password
    pub fn new(password: &str) -> Self {
        Self {
            password_hash: blake3::hash(password.as_bytes()).into(),
        }
    }

    /// Verifier with the demo default password
    pub fn with_default_password() -> Self {
        Self::new(DEFAULT_ADMIN_PASSWORD)
    }

    /// Check a password attempt in constant time
    pub fn verify(&self, attempt: &str) -> bool {
        let attempt_hash: [u8; 32] = blake3::hash(attempt.as_bytes()).into();
        attempt_hash.ct_eq(&self.password_hash).into()
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminAuth(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_correct_password() {
        let auth = AdminAuth::new("s3cret");
        assert!(auth.verify("s3cret"));
        assert!(!auth.verify("s3cret "));
        assert!(!auth.verify(""));
    }

    #[test]
    fn test_default_password() {
        let auth = AdminAuth::with_default_password();
        assert!(auth.verify("admin123"));
        assert!(!auth.verify("admin124"));
    }
}
