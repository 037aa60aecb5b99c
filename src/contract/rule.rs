use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blockchain::Difficulty;
use crate::progress::AchievementId;
use crate::transaction::Address;

/// What happened. Contracts are evaluated against one event at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProblemSolved,
    DailyLogin,
    CourseCompleted,
    Purchase,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub difficulty: Option<Difficulty>,
    pub user_address: Option<Address>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            difficulty: None,
            user_address: None,
        }
    }

    pub fn problem_solved(difficulty: Difficulty) -> Self {
        Self {
            kind: EventKind::ProblemSolved,
            difficulty: Some(difficulty),
            user_address: None,
        }
    }

    pub fn for_user(mut self, address: Address) -> Self {
        self.user_address = Some(address);
        self
    }
}

/// A rule fires only when every one of its conditions holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Condition {
    EventType(EventKind),
    ProblemDifficulty(Difficulty),
    /// Problems solved (reward transactions) at least this many.
    ProblemCount(u64),
    /// Current balance at least this much.
    Balance(u64),
    /// Current streak at least this many days.
    Streak(u32),
    /// Inclusive hour range (UTC) at evaluation time.
    TimeOfDay { start: u32, end: u32 },
    /// Days counted from Sunday = 0, at evaluation time.
    DayOfWeek(Vec<u32>),
    Achievement(AchievementId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Mint `amount`, scaled by event difficulty and the user's multiplier.
    Reward { amount: u64 },
    UnlockAchievement { achievement_id: AchievementId },
    /// Replaces any multiplier the user already has.
    ApplyMultiplier { multiplier: f64, duration_ms: u64 },
    Notify { message: String },
}

/// How often a rule may fire for the same address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    #[default]
    Always,
    /// Milestones: the first satisfying event fires it, later ones don't.
    OncePerAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub repeat: RepeatPolicy,
    pub created_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Self {
            id: format!("rule_{}", Uuid::new_v4().simple()),
            name: name.into(),
            conditions,
            actions,
            repeat: RepeatPolicy::Always,
            created_at: Utc::now(),
        }
    }

    /// Replace the generated id. Firing records on the ledger name rules by
    /// id, so rules that must be recognised after a reload need a fixed one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn once_per_address(mut self) -> Self {
        self.repeat = RepeatPolicy::OncePerAddress;
        self
    }

    /// The policy the engine enforces. A `problem_count` threshold stays
    /// satisfied after it is crossed, so such rules fire once per address.
    pub fn repeat_policy(&self) -> RepeatPolicy {
        if self
            .conditions
            .iter()
            .any(|c| matches!(c, Condition::ProblemCount(_)))
        {
            RepeatPolicy::OncePerAddress
        } else {
            self.repeat
        }
    }
}
