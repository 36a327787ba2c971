use sha2::{Digest, Sha256};

/// Digest function used to fingerprint serialized commands.
///
/// Swappable so tests can use a transparent strategy and future algorithm
/// changes stay local to one binding site.
pub trait FingerprintStrategy: Send + Sync {
    /// Returns a deterministic hex digest of the payload.
    fn digest(&self, payload: &str) -> String;
}

/// Default strategy: SHA-256, lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprint;

impl FingerprintStrategy for Sha256Fingerprint {
    fn digest(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_sha256_vectors() {
        let strategy = Sha256Fingerprint;
        assert_eq!(
            strategy.digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            strategy.digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_stable_and_input_sensitive() {
        let strategy = Sha256Fingerprint;
        let a = strategy.digest("{\"queue\":\"Q1\",\"messages\":3}");
        let b = strategy.digest("{\"queue\":\"Q1\",\"messages\":3}");
        let c = strategy.digest("{\"queue\":\"Q1\",\"messages\":5}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
