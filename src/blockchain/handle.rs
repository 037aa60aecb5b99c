use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::{Block, Ledger};
use crate::error::MiningError;
use crate::transaction::Address;

/// Shared handle that lets a caller mine on a worker thread.
///
/// At most one mining run is in flight per ledger; the ledger lock is held for
/// the whole search, so readers wait until the block is sealed.
#[derive(Clone)]
pub struct LedgerHandle {
    ledger: Arc<Mutex<Ledger>>,
    mining: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

/// Clears the in-flight flag even if the worker panics.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LedgerHandle {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            mining: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Lock the ledger for reads or synchronous writes.
    pub fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic mid-mine leaves the ledger untouched (the block is only
        // appended on success), so a poisoned lock is still consistent.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::Acquire)
    }

    /// Start mining the pending pool on a worker thread.
    ///
    /// Fails with `AlreadyInFlight` if another run has not finished yet.
    pub fn spawn_mine(
        &self,
        miner: Address,
    ) -> Result<JoinHandle<Result<Block, MiningError>>, MiningError> {
        if self
            .mining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("mine requested for {miner} while another run is in flight");
            return Err(MiningError::AlreadyInFlight);
        }
        self.cancel.store(false, Ordering::Release);

        let ledger = Arc::clone(&self.ledger);
        let cancel = Arc::clone(&self.cancel);
        let guard = InFlight(Arc::clone(&self.mining));

        Ok(thread::spawn(move || {
            let _guard = guard;
            let mut ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
            debug!("worker mining {} pending txs", ledger.pending().len());
            ledger
                .mine_pending_transactions_with_cancel(&miner, &cancel)
                .cloned()
        }))
    }

    /// Ask the running search to stop; it returns `MiningError::Cancelled`.
    pub fn cancel_mining(&self) {
        self.cancel.store(true, Ordering::Release);
    }
}
