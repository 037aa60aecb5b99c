use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{GENESIS_ADDRESS, GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH, MiningLimits};
use crate::crypto::ContentHasher;
use crate::error::MiningError;
use crate::transaction::{Transaction, TxBody};
use crate::wallet::SignaturePolicy;

/// How many nonces to try between deadline/cancellation checks.
const CHECK_INTERVAL: u64 = 1024;

/// An ordered batch of transactions sealed behind a proof-of-work nonce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64, // Unix millis (UTC)
    /// Order is part of the hash and of the audit trail.
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,   // Proof-of-Work nonce
    pub hash: String, // Cached hash of the block
}

impl Block {
    /// Create the genesis block: zero previous hash, one system transaction.
    pub fn genesis(hasher: &dyn ContentHasher) -> Self {
        let mut tx = Transaction::mint(
            GENESIS_ADDRESS.into(),
            0,
            TxBody::Genesis {
                message: GENESIS_MESSAGE.to_string(),
            },
        );
        tx.rehash(hasher);
        Self::new(hasher, GENESIS_PREVIOUS_HASH.to_string(), vec![tx])
    }

    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(
        hasher: &dyn ContentHasher,
        previous_hash: String,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self::new_with_timestamp(
            hasher,
            previous_hash,
            transactions,
            Utc::now().timestamp_millis(),
        )
    }

    pub fn new_with_timestamp(
        hasher: &dyn ContentHasher,
        previous_hash: String,
        transactions: Vec<Transaction>,
        timestamp: i64,
    ) -> Self {
        let mut block = Self {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash(hasher);
        block
    }

    /// Hash of previous hash, timestamp, transactions (as JSON, in order) and
    /// nonce. The `hash` field itself is excluded.
    pub fn calculate_hash(&self, hasher: &dyn ContentHasher) -> String {
        let txs_json = serde_json::to_string(&self.transactions).expect("serialize txs");
        let preimage = format!(
            "{}:{}:{}:{}",
            self.previous_hash, self.timestamp, txs_json, self.nonce
        );
        hasher.digest_hex(preimage.as_bytes())
    }

    /// Search for a nonce whose hash starts with `difficulty` hex zeros.
    ///
    /// The search starts at nonce 0 and stops early when `limits` are hit or
    /// `cancel` is raised; in that case the block is left unsealed and must
    /// not be appended. Returns the number of hashes computed.
    pub fn mine(
        &mut self,
        difficulty: u32,
        hasher: &dyn ContentHasher,
        limits: &MiningLimits,
        cancel: &AtomicBool,
    ) -> Result<u64, MiningError> {
        let started = Instant::now();
        self.nonce = 0;
        let mut attempts: u64 = 0;
        loop {
            self.hash = self.calculate_hash(hasher);
            attempts += 1;
            if meets_difficulty(&self.hash, difficulty) {
                debug!(
                    "PoW found nonce={} after {} attempts ({} ms)",
                    self.nonce,
                    attempts,
                    started.elapsed().as_millis()
                );
                return Ok(attempts);
            }
            if limits.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(MiningError::Timeout { attempts });
            }
            if attempts % CHECK_INTERVAL == 0 {
                if cancel.load(Ordering::Relaxed) {
                    return Err(MiningError::Cancelled { attempts });
                }
                if limits
                    .max_duration
                    .is_some_and(|max| started.elapsed() >= max)
                {
                    return Err(MiningError::Timeout { attempts });
                }
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Cached hash matches content. (Does NOT check PoW or linkage.)
    pub fn has_valid_hash(&self, hasher: &dyn ContentHasher) -> bool {
        self.hash == self.calculate_hash(hasher)
    }

    pub fn has_valid_transactions(&self, policy: &dyn SignaturePolicy) -> bool {
        self.transactions
            .iter()
            .all(|tx| tx.is_system() || policy.accepts(tx))
    }
}

/// First `difficulty` hex characters are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.chars().take(difficulty).all(|c| c == '0')
}
