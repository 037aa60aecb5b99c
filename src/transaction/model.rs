use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{ContentHasher, Sha256Hasher};
use crate::progress::AchievementId;

/// Opaque account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    Reward,
    Purchase,
    AchievementReward,
    AchievementUnlock,
    ContractReward,
    DailyBonus,
    MiningReward,
    Genesis,
}

/// Problem a `reward` transaction pays out for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub problem_id: String,
    pub problem_title: String,
    /// Difficulty label as reported by the caller; compared case-insensitively.
    pub difficulty: String,
    pub platform: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseDetails {
    pub item: String,
    pub quantity: u32,
}

/// Kind-specific metadata. The variant *is* the transaction kind, so kind and
/// metadata cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "metadata", rename_all = "snake_case")]
pub enum TxBody {
    Transfer {
        memo: Option<String>,
    },
    Reward(ProblemDetails),
    Purchase(PurchaseDetails),
    AchievementReward {
        achievement_id: AchievementId,
        achievement_name: String,
    },
    AchievementUnlock {
        achievement_id: AchievementId,
        achievement_name: String,
        unlocked_at: i64,
    },
    ContractReward {
        contract_id: String,
        rule_id: String,
        original_amount: u64,
        bonus_amount: i128,
    },
    DailyBonus {
        date: NaiveDate,
    },
    MiningReward {
        block_number: u64,
    },
    Genesis {
        message: String,
    },
}

impl TxBody {
    pub fn kind(&self) -> TxKind {
        match self {
            TxBody::Transfer { .. } => TxKind::Transfer,
            TxBody::Reward(_) => TxKind::Reward,
            TxBody::Purchase(_) => TxKind::Purchase,
            TxBody::AchievementReward { .. } => TxKind::AchievementReward,
            TxBody::AchievementUnlock { .. } => TxKind::AchievementUnlock,
            TxBody::ContractReward { .. } => TxKind::ContractReward,
            TxBody::DailyBonus { .. } => TxKind::DailyBonus,
            TxBody::MiningReward { .. } => TxKind::MiningReward,
            TxBody::Genesis { .. } => TxKind::Genesis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content hash over everything except the signature.
    pub id: String,
    /// `None` is the system: it mints value and needs no balance.
    pub from: Option<Address>,
    pub to: Address,
    pub amount: u64,
    pub body: TxBody,
    /// Unix millis (UTC).
    pub created_at: i64,
    pub signature: Option<String>,
}

/// Field order here is the canonical order; changing it changes every hash.
#[derive(Serialize)]
struct SigningView<'a> {
    from: &'a Option<Address>,
    to: &'a Address,
    amount: u64,
    body: &'a TxBody,
    created_at: i64,
}

impl Transaction {
    /// Build an unsigned transaction stamped with the current time.
    pub fn new(from: Option<Address>, to: Address, amount: u64, body: TxBody) -> Self {
        Self::new_at(from, to, amount, body, Utc::now().timestamp_millis())
    }

    /// The id is a SHA-256 content hash until a ledger admits the
    /// transaction and rehashes it with its own hasher.
    pub fn new_at(
        from: Option<Address>,
        to: Address,
        amount: u64,
        body: TxBody,
        created_at: i64,
    ) -> Self {
        let mut tx = Self {
            id: String::new(),
            from,
            to,
            amount,
            body,
            created_at,
            signature: None,
        };
        tx.id = tx.calculate_hash(&Sha256Hasher);
        tx
    }

    /// Value minted by the system.
    pub fn mint(to: Address, amount: u64, body: TxBody) -> Self {
        Self::new(None, to, amount, body)
    }

    pub fn kind(&self) -> TxKind {
        self.body.kind()
    }

    pub fn is_system(&self) -> bool {
        self.from.is_none()
    }

    pub fn involves(&self, address: &Address) -> bool {
        self.to == *address || self.from.as_ref() == Some(address)
    }

    /// Canonical bytes covered by the id and by signatures.
    pub fn signing_payload(&self) -> Vec<u8> {
        let view = SigningView {
            from: &self.from,
            to: &self.to,
            amount: self.amount,
            body: &self.body,
            created_at: self.created_at,
        };
        serde_json::to_vec(&view).expect("serialize signing payload")
    }

    pub fn calculate_hash(&self, hasher: &dyn ContentHasher) -> String {
        hasher.digest_hex(&self.signing_payload())
    }

    /// Recompute the id with `hasher`. Signatures cover the payload, not the
    /// id, so they stay valid.
    pub fn rehash(&mut self, hasher: &dyn ContentHasher) {
        self.id = self.calculate_hash(hasher);
    }

    pub fn has_signature(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Display-oriented view; the system sender is shown as `SYSTEM`.
    pub fn details(&self) -> TransactionDetails {
        TransactionDetails {
            hash: self.id.clone(),
            from: self
                .from
                .as_ref()
                .map_or_else(|| "SYSTEM".to_string(), |a| a.to_string()),
            to: self.to.to_string(),
            amount: self.amount,
            kind: self.kind(),
            body: self.body.clone(),
            timestamp: DateTime::<Utc>::from_timestamp_millis(self.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionDetails {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub kind: TxKind,
    pub body: TxBody,
    pub timestamp: Option<DateTime<Utc>>,
}
