//! Synthetic evidence for benchmark calls.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::ledger::{Evidence, StorageModel};

/// Random-byte source for payloads and content hashes. Seeded runs are
/// reproducible.
#[derive(Debug)]
pub struct PayloadGenerator {
    rng: Mutex<StdRng>,
}

impl PayloadGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn random_bytes(&self, size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; size];
        self.rng.lock().fill_bytes(&mut bytes);
        bytes
    }

    /// `size` random bytes, base64-encoded.
    pub fn inline_payload(&self, size: usize) -> String {
        STANDARD.encode(self.random_bytes(size))
    }

    /// SHA-256 hex digest of fresh random bytes, standing in for the hash of
    /// an off-chain document.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.random_bytes(32));
        hex::encode(hasher.finalize())
    }

    /// Evidence for the given model. `size` only applies to naive payloads.
    pub fn evidence(&self, model: StorageModel, size: usize) -> Evidence {
        match model {
            StorageModel::Lightweight => Evidence::OffChainHash(self.content_hash()),
            StorageModel::Naive => Evidence::InlinePayload(self.inline_payload(size)),
        }
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}
