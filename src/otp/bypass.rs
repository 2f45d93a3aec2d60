//! Development override for code verification.

use secrecy::{ExposeSecret, SecretString};

pub trait BypassPolicy: Send + Sync {
    /// True when `code` should pass verification regardless of the stored hash and expiry.
    fn allows(&self, code: &str) -> bool;
}

/// Production default.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledBypass;

impl BypassPolicy for DisabledBypass {
    fn allows(&self, _code: &str) -> bool {
        false
    }
}

/// Accepts one configured master code.
pub struct MasterCodeBypass {
    code: SecretString,
}

impl MasterCodeBypass {
    #[must_use]
    pub fn new(code: SecretString) -> Self {
        Self { code }
    }
}

impl BypassPolicy for MasterCodeBypass {
    fn allows(&self, code: &str) -> bool {
        let expected = self.code.expose_secret();
        !expected.is_empty() && expected == code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_allows() {
        assert!(!DisabledBypass.allows("000000"));
    }

    #[test]
    fn master_code_matches_exactly() {
        let bypass = MasterCodeBypass::new(SecretString::from("000000"));
        assert!(bypass.allows("000000"));
        assert!(!bypass.allows("000001"));
        assert!(!bypass.allows(""));
    }

    #[test]
    fn empty_master_code_is_inert() {
        let bypass = MasterCodeBypass::new(SecretString::from(""));
        assert!(!bypass.allows(""));
    }
}
