use sha2::{Digest, Sha256};

/// Content digest used for transaction ids, block hashes and the PoW search.
///
/// Implementations must be deterministic: the same bytes always map to the
/// same lowercase hex string, since stored hashes are recomputed on
/// validation.
pub trait ContentHasher: Send + Sync {
    fn digest_hex(&self, data: &[u8]) -> String;
}

/// SHA-256, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn digest_hex(&self, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

/// Raw SHA-256 digest, for callers that need bytes rather than hex
/// (e.g. an ECDSA message).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Prefix every wallet address carries.
pub const ADDRESS_PREFIX: &str = "PSIT_";

/// Prefix plus 32 characters.
pub const ADDRESS_LEN: usize = 37;

/// Derive an address from a serialized public key.
pub fn address_from_pubkey(pubkey: &[u8]) -> String {
    let digest = hex::encode(sha256(pubkey));
    format!("{ADDRESS_PREFIX}{}", &digest[..ADDRESS_LEN - ADDRESS_PREFIX.len()])
}

/// Format check only: prefix and length.
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with(ADDRESS_PREFIX) && address.len() == ADDRESS_LEN
}
