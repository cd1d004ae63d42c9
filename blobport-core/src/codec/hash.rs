use sha2::{Digest, Sha256};

/// Compute the SHA256 hex digest of a buffer.
///
/// Used to derive content-addressed identifiers; the service never checks
/// stored bytes against it.
pub fn buffer_to_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Incremental size and SHA256 accumulator fed one chunk at a time.
#[derive(Clone, Default)]
pub struct ContentDigest {
    hasher: Sha256,
    size: u64,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> (u64, String) {
        (self.size, hex::encode(self.hasher.finalize()))
    }
}
