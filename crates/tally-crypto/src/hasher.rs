/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag (e.g. `"tally-entry-v1"`) that is
/// prepended to every hash computation, so an entry and a request body with
/// identical bytes never share a digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for ledger entries.
    pub const ENTRY: Self = Self {
        domain: "tally-entry-v1",
    };
    /// Hasher for idempotency request fingerprints.
    pub const REQUEST: Self = Self {
        domain: "tally-request-v1",
    };

    /// Start an incremental hash with the domain prefix already applied.
    pub fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = self.start();
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHasher::ENTRY.hash(b"x"), ContentHasher::ENTRY.hash(b"x"));
    }

    #[test]
    fn domains_separate_digests() {
        let data = b"same content";
        assert_ne!(ContentHasher::ENTRY.hash(data), ContentHasher::REQUEST.hash(data));
    }

    #[test]
    fn start_matches_one_shot_hash() {
        let mut hasher = ContentHasher::REQUEST.start();
        hasher.update(b"body");
        assert_eq!(*hasher.finalize().as_bytes(), ContentHasher::REQUEST.hash(b"body"));
    }
}
