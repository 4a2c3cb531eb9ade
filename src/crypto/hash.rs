use sha3::{Digest, Sha3_256};

/// Computes the SHA3-256 digest of raw bytes
pub fn sha3_256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Hex digest of an opaque token, the only form in which tokens are stored
pub fn token_digest(token: &str) -> String {
    hex::encode(sha3_256(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_matches_empty_string_vector() {
        let digest = hex::encode(sha3_256(b""));
        assert_eq!(
            digest,
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn token_digest_is_stable_and_distinct() {
        let a = token_digest("token-a");
        assert_eq!(a, token_digest("token-a"));
        assert_ne!(a, token_digest("token-b"));
        assert_eq!(a.len(), 64);
    }
}
