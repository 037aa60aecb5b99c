pub mod block;
pub mod handle;
pub mod model;
pub mod notify;
pub mod stats;
pub mod storage;

pub use block::{Block, meets_difficulty};
pub use handle::LedgerHandle;
pub use model::{AddressEntry, Ledger, LedgerBuilder, ProblemRef, Snapshot};
pub use notify::{AdminNotification, AdminNotifier, NotificationLog};
pub use stats::{ChainStats, Difficulty, ProblemStats, UserStats};
pub use storage::{FileStore, MemoryStore, SnapshotStore};

use std::time::Duration;

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Difficulty bounds (keep low, mining blocks the caller)
pub const DIFF_MAX: u32 = 6;

/// Paid to the miner of every block.
pub const DEFAULT_MINING_REWARD: u64 = 10;

/// Well-known key the ledger snapshot lives under.
pub const DEFAULT_SNAPSHOT_KEY: &str = "psitCoinBlockchain";

pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_ADDRESS: &str = "PSIT_SYSTEM";
pub const GENESIS_MESSAGE: &str =
    "PSIT Coin Genesis Block - Empowering Education Through Blockchain";

/// Caps for a single PoW search. `None` means no cap on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningLimits {
    pub max_attempts: Option<u64>,
    pub max_duration: Option<Duration>,
}

impl MiningLimits {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            max_duration: None,
        }
    }
}

impl Default for MiningLimits {
    fn default() -> Self {
        Self {
            max_attempts: Some(50_000_000),
            max_duration: Some(Duration::from_secs(30)),
        }
    }
}
