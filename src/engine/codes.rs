//! One-time handoff codes: short human-typeable secrets, stored only as a
//! salted SHA-256 hash. The pickup and delivery codes of an offer are
//! independent secrets with independent salts.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// No 0/O, 1/I/L: every character survives being read out over a phone.
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const SALT_LEN: usize = 16;

pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill(&mut salt);
    hex::encode(salt)
}

pub fn hash(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.trim().to_ascii_uppercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a submitted code against the stored hash.
pub fn verify(submitted: &str, salt: &str, stored_hash: &str) -> bool {
    let computed = hash(submitted, salt);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_typeable() {
        let code = generate();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        for ambiguous in ['0', 'O', '1', 'I', 'L'] {
            assert!(!code.contains(ambiguous));
        }
    }

    #[test]
    fn correct_code_verifies() {
        let code = generate();
        let salt = generate_salt();
        let stored = hash(&code, &salt);
        assert!(verify(&code, &salt, &stored));
    }

    #[test]
    fn verification_is_case_and_whitespace_tolerant() {
        let salt = generate_salt();
        let stored = hash("AB23CD", &salt);
        assert!(verify(" ab23cd ", &salt, &stored));
    }

    #[test]
    fn wrong_code_or_wrong_salt_fails() {
        let salt = generate_salt();
        let stored = hash("AB23CD", &salt);
        assert!(!verify("AB23CE", &salt, &stored));
        assert!(!verify("AB23CD", &generate_salt(), &stored));
    }

    #[test]
    fn same_code_different_salts_hash_differently() {
        let code = generate();
        assert_ne!(
            hash(&code, &generate_salt()),
            hash(&code, &generate_salt())
        );
    }
}
