//! Single-process reward ledger: hash-linked blocks sealed by proof of work,
//! replay-derived balances, declarative reward contracts and per-learner
//! progress (achievements and streaks).

pub mod blockchain;
pub mod clock;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod progress;
pub mod session;
pub mod transaction;
pub mod wallet;

pub use blockchain::{Block, Ledger, LedgerHandle, MiningLimits};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use contract::{Contract, Event, EventKind, RuleEngine};
pub use error::{LedgerError, MiningError, PersistenceError, ValidationError};
pub use session::{RewardSession, SolveOutcome};
pub use transaction::{Address, Transaction, TxBody, TxKind};
pub use wallet::{SignaturePolicy, Wallet};
