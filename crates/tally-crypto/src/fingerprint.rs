use tally_types::RequestFingerprint;

use crate::canonical::CanonicalEncoder;
use crate::hasher::ContentHasher;

/// Fingerprint a write request from its method, path, and body bytes.
///
/// The method is upper-cased before hashing; the path and body are hashed
/// exactly as given.
pub fn fingerprint_request(method: &str, path: &str, body: &[u8]) -> RequestFingerprint {
    let mut enc = CanonicalEncoder::new(ContentHasher::REQUEST.start());
    enc.str(Some(method.to_ascii_uppercase().as_str()))
        .str(Some(path))
        .bytes(Some(blake3::hash(body).as_bytes().as_slice()));
    RequestFingerprint(enc.finish())
}
