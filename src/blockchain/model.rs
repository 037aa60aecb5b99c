use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::notify::{AdminNotification, AdminNotifier, NotificationLog};
use super::stats::{ChainStats, Difficulty, ProblemStats, UserStats};
use super::storage::{MemoryStore, SnapshotStore};
use super::{Block, DIFF_MAX, GENESIS_PREVIOUS_HASH};
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::crypto::{ContentHasher, Sha256Hasher};
use crate::error::{MiningError, PersistenceError, ValidationError};
use crate::transaction::{
    Address, ProblemDetails, PurchaseDetails, Transaction, TransactionDetails, TxBody, TxKind,
};
use crate::wallet::{PresenceOnly, SignaturePolicy, Wallet};

/// Everything the ledger persists, stored as one JSON document under
/// `LedgerConfig::snapshot_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub admin_addresses: Vec<Address>,
}

/// A committed transaction together with the block that holds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressEntry {
    pub transaction: TransactionDetails,
    pub block_hash: String,
    pub block_timestamp: i64,
}

/// Problem reference passed to `award_coins_for_problem`.
#[derive(Debug, Clone, Default)]
pub struct ProblemRef {
    pub id: String,
    pub title: String,
    pub platform: String,
}

/// Hash-linked chain of blocks plus the pool of unconfirmed transactions.
///
/// One `Ledger` has one mutator: every state change takes `&mut self`. Wrap it
/// in a [`super::LedgerHandle`] to mine off the caller's thread.
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    admin_addresses: Vec<Address>,
    config: LedgerConfig,
    hasher: Arc<dyn ContentHasher>,
    signatures: Arc<dyn SignaturePolicy>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn AdminNotifier>,
    clock: Arc<dyn Clock>,
    /// Last persist failed; the next state change retries.
    dirty: bool,
}

/// Assembles a [`Ledger`] from its collaborators and loads its snapshot.
pub struct LedgerBuilder {
    config: LedgerConfig,
    hasher: Arc<dyn ContentHasher>,
    signatures: Arc<dyn SignaturePolicy>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn AdminNotifier>,
    clock: Arc<dyn Clock>,
}

impl LedgerBuilder {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            hasher: Arc::new(Sha256Hasher),
            signatures: Arc::new(PresenceOnly),
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(NotificationLog::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn signature_policy(mut self, policy: Arc<dyn SignaturePolicy>) -> Self {
        self.signatures = policy;
        self
    }

    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn AdminNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Stamps problem completions and admin notifications.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the ledger and load whatever snapshot the store holds.
    pub fn build(self) -> Ledger {
        let genesis = Block::genesis(self.hasher.as_ref());
        let mut ledger = Ledger {
            chain: vec![genesis],
            pending: Vec::new(),
            admin_addresses: Vec::new(),
            config: self.config,
            hasher: self.hasher,
            signatures: self.signatures,
            store: self.store,
            notifier: self.notifier,
            clock: self.clock,
            dirty: false,
        };
        ledger.load_from_store();
        ledger
    }
}

impl Ledger {
    /// Fresh in-memory ledger with default collaborators.
    pub fn new(config: LedgerConfig) -> Self {
        LedgerBuilder::new(config).build()
    }

    pub fn builder(config: LedgerConfig) -> LedgerBuilder {
        LedgerBuilder::new(config)
    }

    /* -------------------- Chain access -------------------- */

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn admin_addresses(&self) -> &[Address] {
        &self.admin_addresses
    }

    /// Return the last block in the chain.
    pub fn latest_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger always holds at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: u32) {
        // NOTE: Changing difficulty affects future blocks only.
        self.config.difficulty = difficulty.min(DIFF_MAX);
    }

    pub fn mining_reward(&self) -> u64 {
        self.config.mining_reward
    }

    pub fn hasher(&self) -> &dyn ContentHasher {
        self.hasher.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Committed transactions in chain order, then the pending pool.
    pub fn all_transactions(&self) -> impl Iterator<Item = &Transaction> + Clone {
        self.chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(self.pending.iter())
    }

    /* -------------------- Transactions -------------------- */

    /// Validate and queue a transaction.
    ///
    /// System transactions (`from == None`) skip the signature and balance
    /// checks. A rejected transaction leaves the pool untouched.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ValidationError> {
        self.admit(tx).map(|_| ())
    }

    /// Queue `tx` under an id computed by this ledger's hasher.
    fn admit(&mut self, mut tx: Transaction) -> Result<&Transaction, ValidationError> {
        if tx.to.is_empty() || tx.from.as_ref().is_some_and(Address::is_empty) {
            warn!("TX {} rejected: missing address", tx.id);
            return Err(ValidationError::MissingAddress);
        }

        if let Some(from) = &tx.from {
            if !self.signatures.accepts(&tx) {
                warn!("TX {} rejected: missing signature", tx.id);
                return Err(ValidationError::MissingSignature);
            }
            let balance = self.balance_of(from);
            if balance < i128::from(tx.amount) {
                warn!(
                    "TX {} rejected: {} has {} < {}",
                    tx.id, from, balance, tx.amount
                );
                return Err(ValidationError::InsufficientBalance {
                    address: from.to_string(),
                    balance,
                    amount: tx.amount,
                });
            }
        }

        tx.rehash(self.hasher.as_ref());
        let is_reward = tx.kind() == TxKind::Reward;
        let details = is_reward.then(|| tx.details());
        debug!(
            "TX {} ({:?}) accepted into pool (size: {} -> {})",
            tx.id,
            tx.kind(),
            self.pending.len(),
            self.pending.len() + 1
        );
        self.pending.push(tx);

        if let Some(details) = details {
            self.notify_admins(details);
        }
        Ok(&self.pending[self.pending.len() - 1])
    }

    /// Pay a problem reward; unknown difficulty labels pay the easy rate.
    pub fn award_coins_for_problem(
        &mut self,
        address: &Address,
        difficulty: &str,
        problem: &ProblemRef,
    ) -> Result<Transaction, ValidationError> {
        let amount = Difficulty::parse(difficulty)
            .unwrap_or(Difficulty::Easy)
            .reward_amount();
        let tx = Transaction::mint(
            address.clone(),
            amount,
            TxBody::Reward(ProblemDetails {
                problem_id: problem.id.clone(),
                problem_title: problem.title.clone(),
                difficulty: difficulty.to_string(),
                platform: problem.platform.clone(),
                completed_at: self.clock.now(),
            }),
        );
        Ok(self.admit(tx)?.clone())
    }

    /// Signed spend from `wallet` to a vendor.
    pub fn process_purchase(
        &mut self,
        wallet: &Wallet,
        vendor: &Address,
        amount: u64,
        details: PurchaseDetails,
    ) -> Result<Transaction, ValidationError> {
        let mut tx = Transaction::new(
            Some(wallet.address().clone()),
            vendor.clone(),
            amount,
            TxBody::Purchase(details),
        );
        wallet.sign(&mut tx);
        Ok(self.admit(tx)?.clone())
    }

    /* -------------------- Mining -------------------- */

    /// Seal the whole pending pool (plus the miner's reward) into one block.
    pub fn mine_pending_transactions(&mut self, miner: &Address) -> Result<&Block, MiningError> {
        self.mine_pending_transactions_with_cancel(miner, &AtomicBool::new(false))
    }

    /// Like `mine_pending_transactions`, but stops when `cancel` is raised.
    ///
    /// On error nothing changes: the reward is not queued and the pool keeps
    /// its transactions.
    pub fn mine_pending_transactions_with_cancel(
        &mut self,
        miner: &Address,
        cancel: &AtomicBool,
    ) -> Result<&Block, MiningError> {
        let mut reward = Transaction::mint(
            miner.clone(),
            self.config.mining_reward,
            TxBody::MiningReward {
                block_number: self.chain.len() as u64,
            },
        );
        reward.rehash(self.hasher.as_ref());

        let mut txs = Vec::with_capacity(self.pending.len() + 1);
        txs.extend(self.pending.iter().cloned());
        txs.push(reward);

        let prev_hash = self.latest_block().hash.clone();
        let mut block = Block::new(self.hasher.as_ref(), prev_hash, txs);
        let attempts = block.mine(
            self.config.difficulty,
            self.hasher.as_ref(),
            &self.config.mining_limits,
            cancel,
        )?;

        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, txs={}, attempts={})",
            self.chain.len(),
            block.hash,
            block.nonce,
            block.transactions.len(),
            attempts
        );
        self.chain.push(block);
        self.pending.clear();
        self.persist();

        Ok(self.latest_block())
    }

    /* -------------------- Queries -------------------- */

    /// Replay over chain and pending pool: received minus sent.
    pub fn balance_of(&self, address: &Address) -> i128 {
        self.all_transactions().fold(0i128, |balance, tx| {
            let mut b = balance;
            if tx.from.as_ref() == Some(address) {
                b -= i128::from(tx.amount);
            }
            if tx.to == *address {
                b += i128::from(tx.amount);
            }
            b
        })
    }

    /// Committed transactions touching `address`, most recent first.
    pub fn transactions_for_address(&self, address: &Address) -> Vec<AddressEntry> {
        let mut entries: Vec<AddressEntry> = self
            .chain
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .filter(|tx| tx.involves(address))
                    .map(move |tx| AddressEntry {
                        transaction: tx.details(),
                        block_hash: block.hash.clone(),
                        block_timestamp: block.timestamp,
                    })
            })
            .collect();
        entries.reverse();
        entries
    }

    pub fn problem_stats(&self, address: &Address) -> ProblemStats {
        ProblemStats::derive(self.all_transactions(), address)
    }

    pub fn user_stats(&self, address: &Address) -> UserStats {
        UserStats::derive(self.all_transactions(), address, self.balance_of(address))
    }

    pub fn chain_stats(&self) -> ChainStats {
        let mut total_transactions = 0;
        let mut total_rewards_distributed = 0u128;
        let mut total_purchases = 0u128;
        for tx in self.chain.iter().flat_map(|b| b.transactions.iter()) {
            total_transactions += 1;
            match tx.kind() {
                TxKind::Reward => total_rewards_distributed += u128::from(tx.amount),
                TxKind::Purchase => total_purchases += u128::from(tx.amount),
                _ => {}
            }
        }
        ChainStats {
            block_count: self.chain.len(),
            total_transactions,
            pending_transactions: self.pending.len(),
            total_rewards_distributed,
            total_purchases,
            difficulty: self.config.difficulty,
            is_valid: self.is_chain_valid(),
        }
    }

    /// Validate the chain: embedded transactions, stored hashes and linkage.
    /// Stops at the first violation; nothing is repaired.
    pub fn is_chain_valid(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || genesis.transactions.len() != 1
            || !genesis.transactions[0].is_system()
        {
            return false;
        }

        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let prev = &self.chain[i - 1];

            if !current.has_valid_transactions(self.signatures.as_ref()) {
                debug!("chain invalid at block {i}: bad transaction");
                return false;
            }

            if !current.has_valid_hash(self.hasher.as_ref()) {
                debug!("chain invalid at block {i}: hash mismatch");
                return false;
            }

            if current.previous_hash != prev.hash {
                debug!("chain invalid at block {i}: broken linkage");
                return false;
            }
        }

        true
    }

    /* -------------------- Admins -------------------- */

    pub fn register_admin(&mut self, admin: Address) {
        if !self.admin_addresses.contains(&admin) {
            info!("registered admin {admin}");
            self.admin_addresses.push(admin);
            self.persist();
        }
    }

    fn notify_admins(&self, transaction: TransactionDetails) {
        self.notifier.notify(AdminNotification {
            admins: self.admin_addresses.clone(),
            transaction,
            timestamp: self.clock.now(),
        });
    }

    /* -------------------- Persistence -------------------- */

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            chain: self.chain.clone(),
            pending_transactions: self.pending.clone(),
            admin_addresses: self.admin_addresses.clone(),
        }
    }

    /// Save the full snapshot, reporting failure to the caller.
    pub fn try_persist(&mut self) -> Result<(), PersistenceError> {
        let data = serde_json::to_string(&self.snapshot())?;
        self.store.save(&self.config.snapshot_key, &data)?;
        self.dirty = false;
        Ok(())
    }

    /// Best-effort save: failures are logged and retried on the next persist.
    pub fn persist(&mut self) {
        if let Err(e) = self.try_persist() {
            warn!("persist failed, continuing in memory: {e}");
            self.dirty = true;
        }
    }

    fn load_from_store(&mut self) {
        let key = self.config.snapshot_key.clone();
        let data = match self.store.load(&key) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(e) => {
                warn!("could not read snapshot {key}: {e}");
                return;
            }
        };
        let snapshot: Snapshot = match serde_json::from_str(&data) {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring unreadable snapshot {key}: {e}");
                return;
            }
        };
        self.restore(snapshot);
    }

    /// Replace state with a snapshot. Stored hashes and signatures are taken
    /// verbatim; use `is_chain_valid` to check them.
    pub fn restore(&mut self, snapshot: Snapshot) {
        // A genesis-only snapshot carries nothing worth keeping.
        if snapshot.chain.len() > 1 {
            self.chain = snapshot.chain;
        }
        self.pending = snapshot.pending_transactions;
        self.admin_addresses = snapshot.admin_addresses;
        debug!(
            "restored ledger: {} blocks, {} pending, {} admins",
            self.chain.len(),
            self.pending.len(),
            self.admin_addresses.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MiningLimits;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::sync::atomic::Ordering;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::default())
    }

    fn reward(to: &str, amount: u64) -> Transaction {
        Transaction::mint(
            to.into(),
            amount,
            TxBody::Reward(ProblemDetails {
                problem_id: "p1".into(),
                problem_title: "Two Sum".into(),
                difficulty: "easy".into(),
                platform: "leetcode".into(),
                completed_at: Utc::now(),
            }),
        )
    }

    fn transfer(from: &str, to: &str, amount: u64) -> Transaction {
        let mut tx = Transaction::new(
            Some(from.into()),
            to.into(),
            amount,
            TxBody::Transfer { memo: None },
        );
        tx.signature = Some("signed".into());
        tx
    }

    /// Store whose writes fail while `fail` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            self.inner.load(key)
        }

        fn save(&self, key: &str, data: &str) -> Result<(), PersistenceError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(PersistenceError::Unavailable("disk full".into()));
            }
            self.inner.save(key, data)
        }
    }

    #[test]
    fn new_ledger_starts_with_valid_genesis() {
        let l = ledger();
        assert_eq!(l.len(), 1);
        assert_eq!(l.latest_block().previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(l.latest_block().transactions[0].from.is_none());
        assert!(l.is_chain_valid());
    }

    #[test]
    fn mint_then_mine_pays_reward_and_mining_reward() {
        let mut l = ledger();
        l.add_transaction(reward("A", 10)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        assert_eq!(l.balance_of(&"A".into()), 20);
        assert!(l.pending().is_empty());
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn overdraft_is_rejected_and_pool_unchanged() {
        let mut l = ledger();
        l.add_transaction(reward("X", 1)).unwrap();
        let before = l.pending().to_vec();

        let err = l.add_transaction(transfer("A", "B", 5)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientBalance { balance: 0, amount: 5, .. }
        ));
        assert_eq!(l.pending(), before.as_slice());
    }

    #[test]
    fn unsigned_transfer_is_rejected() {
        let mut l = ledger();
        l.add_transaction(reward("A", 50)).unwrap();
        let mut tx = transfer("A", "B", 5);
        tx.signature = None;
        assert_eq!(l.add_transaction(tx), Err(ValidationError::MissingSignature));
    }

    #[test]
    fn missing_address_is_rejected() {
        let mut l = ledger();
        assert_eq!(
            l.add_transaction(reward("", 5)),
            Err(ValidationError::MissingAddress)
        );
        assert_eq!(
            l.add_transaction(transfer(" ", "B", 0)),
            Err(ValidationError::MissingAddress)
        );
    }

    #[test]
    fn pending_funds_are_spendable() {
        let mut l = ledger();
        l.add_transaction(reward("A", 10)).unwrap();
        l.add_transaction(transfer("A", "B", 7)).unwrap();
        assert_eq!(l.balance_of(&"A".into()), 3);
        assert_eq!(l.balance_of(&"B".into()), 7);
        // The second spend would overdraw once the first is counted.
        assert!(l.add_transaction(transfer("A", "B", 4)).is_err());
    }

    #[test]
    fn mined_chain_links_and_hashes() {
        let mut l = ledger();
        for i in 0..3 {
            l.add_transaction(reward("A", 10 + i)).unwrap();
            l.mine_pending_transactions(&"M".into()).unwrap();
        }
        let chain = l.chain();
        for n in 1..chain.len() {
            assert_eq!(chain[n].previous_hash, chain[n - 1].hash);
            assert_eq!(chain[n].hash, chain[n].calculate_hash(l.hasher()));
            assert!(chain[n].hash.starts_with("00"));
        }
        assert!(l.is_chain_valid());
    }

    #[test]
    fn tampering_is_detected_not_repaired() {
        let mut l = ledger();
        l.add_transaction(reward("A", 10)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        l.add_transaction(reward("A", 10)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        assert!(l.is_chain_valid());

        l.chain[1].transactions[0].amount = 1_000;
        assert!(!l.is_chain_valid());
        // Still tampered afterwards.
        assert_eq!(l.chain[1].transactions[0].amount, 1_000);

        // Re-sealing the tampered block breaks the next link instead.
        let rehash = l.chain[1].calculate_hash(l.hasher());
        l.chain[1].hash = rehash;
        assert!(!l.is_chain_valid());
    }

    #[test]
    fn unsigned_committed_transaction_invalidates_chain() {
        let mut l = ledger();
        l.add_transaction(reward("A", 10)).unwrap();
        l.add_transaction(transfer("A", "B", 5)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        assert!(l.is_chain_valid());

        l.chain[1].transactions[1].signature = None;
        let rehash = l.chain[1].calculate_hash(l.hasher());
        l.chain[1].hash = rehash;
        assert!(!l.is_chain_valid());
    }

    #[test]
    fn balances_conserve_minted_value() {
        let mut l = ledger();
        l.add_transaction(reward("A", 40)).unwrap();
        l.add_transaction(transfer("A", "B", 15)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();
        l.add_transaction(transfer("B", "C", 5)).unwrap();
        l.add_transaction(transfer("M", "A", 3)).unwrap();

        let mut addresses = BTreeSet::new();
        let mut minted: i128 = 0;
        for tx in l.all_transactions() {
            addresses.insert(tx.to.clone());
            if let Some(from) = &tx.from {
                addresses.insert(from.clone());
            } else {
                minted += i128::from(tx.amount);
            }
        }
        let total: i128 = addresses.iter().map(|a| l.balance_of(a)).sum();
        assert_eq!(total, minted);
        assert_eq!(l.balance_of(&"A".into()), 28);
        assert_eq!(l.balance_of(&"B".into()), 10);
        assert_eq!(l.balance_of(&"C".into()), 5);
        assert_eq!(l.balance_of(&"M".into()), 7);
    }

    #[test]
    fn award_maps_difficulty_case_insensitively() {
        let mut l = ledger();
        let who: Address = "A".into();
        let p = ProblemRef::default();
        assert_eq!(l.award_coins_for_problem(&who, "easy", &p).unwrap().amount, 10);
        assert_eq!(l.award_coins_for_problem(&who, "MEDIUM", &p).unwrap().amount, 25);
        assert_eq!(l.award_coins_for_problem(&who, "Hard", &p).unwrap().amount, 50);
        assert_eq!(l.award_coins_for_problem(&who, "nightmare", &p).unwrap().amount, 10);
        assert_eq!(l.balance_of(&who), 95);
        assert_eq!(l.problem_stats(&who).total, 4);
    }

    #[test]
    fn reward_transactions_notify_admins() {
        let log = Arc::new(NotificationLog::new());
        let mut l = Ledger::builder(LedgerConfig::default())
            .notifier(log.clone())
            .build();
        l.register_admin("ADMIN".into());
        l.register_admin("ADMIN".into());
        assert_eq!(l.admin_addresses().len(), 1);

        l.add_transaction(reward("A", 10)).unwrap();
        l.add_transaction(Transaction::mint(
            "A".into(),
            5,
            TxBody::DailyBonus {
                date: Utc::now().date_naive(),
            },
        ))
        .unwrap();

        let recent = log.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].transaction.kind, TxKind::Reward);
        assert_eq!(recent[0].admins, vec![Address::from("ADMIN")]);
    }

    #[test]
    fn failed_mining_leaves_pool_untouched() {
        let cfg = LedgerConfig {
            difficulty: 6,
            mining_limits: MiningLimits {
                max_attempts: Some(5),
                max_duration: None,
            },
            ..LedgerConfig::default()
        };
        let mut l = Ledger::new(cfg);
        l.add_transaction(reward("A", 10)).unwrap();
        let before = l.pending().to_vec();

        let err = l.mine_pending_transactions(&"A".into()).unwrap_err();
        assert!(matches!(err, MiningError::Timeout { attempts: 5 }));
        assert_eq!(l.pending(), before.as_slice());
        assert_eq!(l.len(), 1);
        assert_eq!(l.balance_of(&"A".into()), 10);
    }

    #[test]
    fn history_is_most_recent_first_with_block_info() {
        let mut l = ledger();
        l.add_transaction(reward("A", 1)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();
        l.add_transaction(reward("A", 2)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();
        // Pending entries are not part of the history.
        l.add_transaction(reward("A", 3)).unwrap();

        let history = l.transactions_for_address(&"A".into());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction.amount, 2);
        assert_eq!(history[0].block_hash, l.chain()[2].hash);
        assert_eq!(history[1].transaction.amount, 1);
        assert_eq!(history[1].block_timestamp, l.chain()[1].timestamp);
    }

    #[test]
    fn persist_then_reload_reproduces_balances() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let mut l = Ledger::builder(LedgerConfig::default())
            .store(store.clone())
            .build();
        l.register_admin("ADMIN".into());
        l.add_transaction(reward("A", 30)).unwrap();
        l.add_transaction(transfer("A", "B", 12)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();
        l.add_transaction(transfer("B", "C", 2)).unwrap();
        l.persist();

        let reloaded = Ledger::builder(LedgerConfig::default())
            .store(store)
            .build();
        for who in ["A", "B", "C", "M", "nobody"] {
            let addr: Address = who.into();
            assert_eq!(reloaded.balance_of(&addr), l.balance_of(&addr), "{who}");
        }
        assert_eq!(reloaded.chain(), l.chain());
        assert_eq!(reloaded.pending().len(), 1);
        assert_eq!(reloaded.admin_addresses(), l.admin_addresses());
        assert!(reloaded.is_chain_valid());
    }

    #[test]
    fn loaded_hashes_are_trusted_until_validated() {
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
        let mut l = Ledger::builder(LedgerConfig::default())
            .store(store.clone())
            .build();
        l.add_transaction(reward("A", 30)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();

        let mut snapshot = l.snapshot();
        snapshot.chain[1].transactions[0].amount = 3_000;
        store
            .save(DEFAULT_KEY, &serde_json::to_string(&snapshot).unwrap())
            .unwrap();

        let reloaded = Ledger::builder(LedgerConfig::default())
            .store(store)
            .build();
        assert_eq!(reloaded.balance_of(&"A".into()), 3_000);
        assert!(!reloaded.is_chain_valid());
    }

    const DEFAULT_KEY: &str = crate::blockchain::DEFAULT_SNAPSHOT_KEY;

    #[test]
    fn persistence_failure_is_absorbed_and_retried() {
        let store = Arc::new(FlakyStore::default());
        let mut l = Ledger::builder(LedgerConfig::default())
            .store(store.clone())
            .build();

        store.fail.store(true, Ordering::Relaxed);
        l.add_transaction(reward("A", 10)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        assert!(l.is_dirty());
        assert_eq!(l.balance_of(&"A".into()), 20);
        assert!(store.load(DEFAULT_KEY).unwrap().is_none());

        store.fail.store(false, Ordering::Relaxed);
        l.mine_pending_transactions(&"A".into()).unwrap();
        assert!(!l.is_dirty());
        let saved: Snapshot =
            serde_json::from_str(&store.load(DEFAULT_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved.chain.len(), 3);
    }

    #[test]
    fn unreadable_snapshot_falls_back_to_fresh_ledger() {
        let store = Arc::new(MemoryStore::new());
        store.save(DEFAULT_KEY, "{not json").unwrap();
        let l = Ledger::builder(LedgerConfig::default())
            .store(store)
            .build();
        assert_eq!(l.len(), 1);
        assert!(l.is_chain_valid());
    }

    #[test]
    fn purchase_is_signed_and_debited() {
        let wallet = Wallet::generate();
        let mut l = ledger();
        l.add_transaction(reward(wallet.address().as_str(), 20)).unwrap();
        let tx = l
            .process_purchase(
                &wallet,
                &"CAFETERIA".into(),
                8,
                PurchaseDetails {
                    item: "sandwich".into(),
                    quantity: 1,
                },
            )
            .unwrap();
        assert!(wallet.verify(&tx));
        assert_eq!(l.balance_of(wallet.address()), 12);
        let stats = l.user_stats(wallet.address());
        assert_eq!(stats.total_spent, 8);
        assert_eq!(stats.total_earned, 20);
    }

    #[test]
    fn chain_stats_summarise_committed_blocks() {
        let mut l = ledger();
        l.add_transaction(reward("A", 10)).unwrap();
        l.mine_pending_transactions(&"A".into()).unwrap();
        l.add_transaction(reward("A", 25)).unwrap();

        let stats = l.chain_stats();
        assert_eq!(stats.block_count, 2);
        // genesis + reward + mining reward
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.total_rewards_distributed, 10);
        assert!(stats.is_valid);
    }

    #[test]
    fn totals_do_not_overflow_on_large_amounts() {
        let mut l = ledger();
        l.add_transaction(reward("A", u64::MAX)).unwrap();
        l.add_transaction(reward("A", u64::MAX)).unwrap();
        l.mine_pending_transactions(&"M".into()).unwrap();

        let twice = 2 * u128::from(u64::MAX);
        let stats = l.chain_stats();
        assert_eq!(stats.total_rewards_distributed, twice);
        assert!(stats.is_valid);

        let user = l.user_stats(&"A".into());
        assert_eq!(user.total_earned, twice);
        assert_eq!(user.balance, twice as i128);
        assert_eq!(l.balance_of(&"A".into()), twice as i128);
    }

    struct PrefixedHasher;

    impl ContentHasher for PrefixedHasher {
        fn digest_hex(&self, data: &[u8]) -> String {
            format!("00{}", Sha256Hasher.digest_hex(data))
        }
    }

    #[test]
    fn admitted_transactions_are_identified_by_the_ledger_hasher() {
        let mut l = Ledger::builder(LedgerConfig::default())
            .hasher(Arc::new(PrefixedHasher))
            .build();
        let genesis_tx = &l.latest_block().transactions[0];
        assert_eq!(genesis_tx.id, genesis_tx.calculate_hash(&PrefixedHasher));

        let tx = reward("A", 10);
        let sha_id = tx.id.clone();
        l.add_transaction(tx).unwrap();
        let awarded = l
            .award_coins_for_problem(&"A".into(), "medium", &ProblemRef::default())
            .unwrap();

        assert_ne!(l.pending()[0].id, sha_id);
        for tx in l.pending() {
            assert!(tx.id.starts_with("00"));
            assert_eq!(tx.id, tx.calculate_hash(&PrefixedHasher));
        }
        assert_eq!(awarded.id, l.pending()[1].id);

        let block = l.mine_pending_transactions(&"M".into()).unwrap();
        let mining_reward = block.transactions.last().unwrap();
        assert_eq!(mining_reward.id, mining_reward.calculate_hash(&PrefixedHasher));
        assert!(l.is_chain_valid());
    }

    #[test]
    fn problem_completion_time_comes_from_the_ledger_clock() {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap();
        let mut l = Ledger::builder(LedgerConfig::default())
            .clock(Arc::new(ManualClock::new(at)))
            .build();
        let tx = l
            .award_coins_for_problem(&"A".into(), "easy", &ProblemRef::default())
            .unwrap();
        match tx.body {
            TxBody::Reward(details) => assert_eq!(details.completed_at, at),
            other => panic!("unexpected body {other:?}"),
        }
    }
}
