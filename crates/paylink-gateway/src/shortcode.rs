//! Opaque short codes for routes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Length of a generated short code.
pub const SHORT_CODE_LEN: usize = 10;

/// Collision retries before giving up on an insert.
pub const MAX_GENERATION_ATTEMPTS: usize = 8;

/// Generate a random code from the URL-safe base64 alphabet.
///
/// Uses `rand::fill`, which draws from the OS CSPRNG.
pub fn generate() -> String {
    let mut bytes = [0u8; 8];
    rand::fill(&mut bytes);
    let mut code = URL_SAFE_NO_PAD.encode(bytes);
    code.truncate(SHORT_CODE_LEN);
    code
}

/// Whether `code` could have been produced by [`generate`].
pub fn is_well_formed(code: &str) -> bool {
    code.len() == SHORT_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_are_well_formed() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), SHORT_CODE_LEN);
            assert!(is_well_formed(&code), "{code}");
        }
    }

    #[test]
    fn test_generated_codes_are_distinct() {
        let codes: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed("has/slash!"));
        assert!(is_well_formed("Ab3_-xYz09"));
    }
}
