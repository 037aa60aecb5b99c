use thiserror::Error;

/// Reasons a transaction is refused at queue time. A rejected transaction is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction must include from and to address")]
    MissingAddress,

    #[error("no signature in this transaction")]
    MissingSignature,

    #[error("insufficient balance: {address} holds {balance}, needs {amount}")]
    InsufficientBalance {
        address: String,
        balance: i128,
        amount: u64,
    },
}

/// Outcome of a bounded proof-of-work search that did not produce a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("mining gave up after {attempts} attempts")]
    Timeout { attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("a mining run is already in flight for this ledger")]
    AlreadyInFlight,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Errors of the combined ledger operations (queue, then mine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Mining(#[from] MiningError),
}
