//! Statistics derived from ledger contents by replay.
//!
//! `ProblemStats::derive` is the single definition of "problems solved": the
//! ledger's user stats, the achievement tracker and the `problem_count` rule
//! condition all go through it.

use serde::{Deserialize, Serialize};

use crate::transaction::{Address, Transaction, TxBody, TxKind};

/// Problem difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Case-insensitive; unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Coins paid for solving a problem of this tier.
    pub fn reward_amount(self) -> u64 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 25,
            Difficulty::Hard => 50,
        }
    }

    /// Scale applied to contract rewards.
    pub fn contract_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.5,
            Difficulty::Hard => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Problems solved, counted from `reward` transactions paid to an address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProblemStats {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
    /// Every reward transaction, including ones with an unrecognised
    /// difficulty label.
    pub total: u64,
}

impl ProblemStats {
    pub fn derive<'a>(
        transactions: impl IntoIterator<Item = &'a Transaction>,
        address: &Address,
    ) -> Self {
        let mut stats = Self::default();
        for tx in transactions {
            if tx.to != *address {
                continue;
            }
            let TxBody::Reward(details) = &tx.body else {
                continue;
            };
            stats.total += 1;
            match Difficulty::parse(&details.difficulty) {
                Some(Difficulty::Easy) => stats.easy += 1,
                Some(Difficulty::Medium) => stats.medium += 1,
                Some(Difficulty::Hard) => stats.hard += 1,
                None => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub balance: i128,
    pub total_earned: u128,
    pub total_spent: u128,
    pub problems_solved: ProblemStats,
    pub transaction_count: usize,
}

impl UserStats {
    pub fn derive<'a, I>(transactions: I, address: &Address, balance: i128) -> Self
    where
        I: IntoIterator<Item = &'a Transaction> + Clone,
    {
        let mut total_earned = 0u128;
        let mut total_spent = 0u128;
        let mut transaction_count = 0usize;
        for tx in transactions.clone() {
            if !tx.involves(address) {
                continue;
            }
            transaction_count += 1;
            match tx.kind() {
                TxKind::Reward if tx.to == *address => total_earned += u128::from(tx.amount),
                TxKind::Purchase if tx.from.as_ref() == Some(address) => {
                    total_spent += u128::from(tx.amount)
                }
                _ => {}
            }
        }
        Self {
            balance,
            total_earned,
            total_spent,
            problems_solved: ProblemStats::derive(transactions, address),
            transaction_count,
        }
    }
}

/// Whole-chain summary (committed blocks only, plus the pending count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub block_count: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub total_rewards_distributed: u128,
    pub total_purchases: u128,
    pub difficulty: u32,
    pub is_valid: bool,
}
