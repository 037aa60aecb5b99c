use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::rule::{Action, Condition, Event, RepeatPolicy, Rule};
use crate::blockchain::{Difficulty, Ledger};
use crate::clock::Clock;
use crate::progress::{AchievementId, AchievementTracker, StreakTracker};
use crate::transaction::{Address, Transaction, TxBody};

/// Temporary reward scale for one address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Multiplier {
    pub value: f64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotification {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// What one action did. Failed actions become `Skipped` and the rest of the
/// rule still runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutcome {
    Reward {
        amount: u64,
    },
    Achievement {
        achievement_id: AchievementId,
        newly_unlocked: bool,
    },
    Multiplier {
        value: f64,
    },
    Notification {
        message: String,
    },
    Skipped {
        action: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub rule_name: String,
    pub actions: Vec<ActionOutcome>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractExecution {
    pub contract_id: String,
    pub contract_name: String,
    pub rules: Vec<RuleOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub rule_count: usize,
    pub execution_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Per-address multipliers and notification logs written by rule actions.
#[derive(Debug, Default)]
pub struct RuleState {
    multipliers: HashMap<Address, Multiplier>,
    notifications: HashMap<Address, Vec<UserNotification>>,
}

impl RuleState {
    /// The live multiplier for `address`, or 1.0 once it has expired.
    pub fn multiplier(&self, address: &Address, now: DateTime<Utc>) -> f64 {
        self.active_multiplier(address, now).map_or(1.0, |m| m.value)
    }

    pub fn active_multiplier(&self, address: &Address, now: DateTime<Utc>) -> Option<Multiplier> {
        self.multipliers
            .get(address)
            .filter(|m| m.expires_at > now)
            .copied()
    }

    /// Multipliers don't stack: a new one replaces the old.
    pub fn apply_multiplier(&mut self, address: &Address, multiplier: Multiplier) {
        self.multipliers.insert(address.clone(), multiplier);
    }

    pub fn notify(&mut self, address: &Address, message: String, now: DateTime<Utc>) {
        self.notifications
            .entry(address.clone())
            .or_default()
            .push(UserNotification {
                message,
                timestamp: now,
                read: false,
            });
    }

    pub fn notifications(&self, address: &Address) -> &[UserNotification] {
        self.notifications
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unread_count(&self, address: &Address) -> usize {
        self.notifications(address).iter().filter(|n| !n.read).count()
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_read(&mut self, address: &Address) -> usize {
        let Some(log) = self.notifications.get_mut(address) else {
            return 0;
        };
        let mut flipped = 0;
        for n in log.iter_mut().filter(|n| !n.read) {
            n.read = true;
            flipped += 1;
        }
        flipped
    }
}

/// Everything a rule may read or write while it runs.
pub struct RuleContext<'a> {
    pub ledger: &'a mut Ledger,
    pub achievements: &'a mut AchievementTracker,
    pub streaks: &'a StreakTracker,
    pub state: &'a mut RuleState,
    /// Wall-clock time of evaluation; time conditions read this, not the
    /// time the event happened.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub creator: Address,
    rules: Vec<Rule>,
    active: bool,
    execution_count: u64,
    created_at: DateTime<Utc>,
    fired: HashSet<(String, Address)>,
}

impl Contract {
    pub fn new(id: impl Into<String>, name: impl Into<String>, creator: Address) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            creator,
            rules: Vec::new(),
            active: true,
            execution_count: 0,
            created_at: Utc::now(),
            fired: HashSet::new(),
        }
    }

    /// Append a rule; rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Rule) -> &Rule {
        debug!("contract {}: rule {} ({}) added", self.id, rule.id, rule.name);
        self.rules.push(rule);
        &self.rules[self.rules.len() - 1]
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Record that `rule_id` already fired for `address`. Returns false when
    /// no once-per-address rule has that id.
    pub fn mark_fired(&mut self, rule_id: &str, address: &Address) -> bool {
        let known = self
            .rules
            .iter()
            .any(|r| r.id == rule_id && r.repeat_policy() == RepeatPolicy::OncePerAddress);
        if known {
            self.fired.insert((rule_id.to_string(), address.clone()));
        }
        known
    }

    pub fn summary(&self) -> ContractSummary {
        ContractSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            active: self.active,
            rule_count: self.rules.len(),
            execution_count: self.execution_count,
            created_at: self.created_at,
        }
    }

    /// Run every satisfied rule against `event`.
    ///
    /// Returns `None` when the contract is inactive, the event names no
    /// user, or no rule fired. A rule whose actions were all skipped still
    /// counts as fired.
    pub fn execute(&mut self, event: &Event, ctx: &mut RuleContext<'_>) -> Option<Vec<RuleOutcome>> {
        if !self.active {
            return None;
        }
        let user = event.user_address.as_ref()?;

        let mut results = Vec::new();
        for rule in &self.rules {
            let once = rule.repeat_policy() == RepeatPolicy::OncePerAddress;
            if once && self.fired.contains(&(rule.id.clone(), user.clone())) {
                continue;
            }
            if !rule
                .conditions
                .iter()
                .all(|c| condition_holds(c, event, user, &*ctx))
            {
                continue;
            }

            let actions = rule
                .actions
                .iter()
                .map(|a| run_action(a, &self.id, &rule.id, event, user, &mut *ctx))
                .collect();
            self.execution_count += 1;
            if once {
                self.fired.insert((rule.id.clone(), user.clone()));
            }

            info!("contract {} rule '{}' fired for {user}", self.id, rule.name);
            results.push(RuleOutcome {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                actions,
                timestamp: ctx.now,
            });
        }

        (!results.is_empty()).then_some(results)
    }
}

fn condition_holds(condition: &Condition, event: &Event, user: &Address, ctx: &RuleContext<'_>) -> bool {
    match condition {
        Condition::EventType(kind) => event.kind == *kind,
        Condition::ProblemDifficulty(difficulty) => event.difficulty == Some(*difficulty),
        Condition::ProblemCount(min) => ctx.ledger.problem_stats(user).total >= *min,
        Condition::Balance(min) => ctx.ledger.balance_of(user) >= i128::from(*min),
        Condition::Streak(min) => ctx.streaks.current_streak(user) >= *min,
        Condition::TimeOfDay { start, end } => (*start..=*end).contains(&ctx.now.hour()),
        Condition::DayOfWeek(days) => days.contains(&ctx.now.weekday().num_days_from_sunday()),
        Condition::Achievement(id) => ctx.achievements.has(user, *id),
    }
}

/// `floor(base × difficulty multiplier × user multiplier)`
fn scaled_reward(base: u64, difficulty: Option<Difficulty>, user_multiplier: f64) -> u64 {
    let difficulty_multiplier = difficulty.map_or(1.0, Difficulty::contract_multiplier);
    (base as f64 * difficulty_multiplier * user_multiplier).floor() as u64
}

fn skipped(contract_id: &str, action: &'static str, reason: String) -> ActionOutcome {
    warn!("contract {contract_id}: {action} action skipped: {reason}");
    ActionOutcome::Skipped { action, reason }
}

fn run_action(
    action: &Action,
    contract_id: &str,
    rule_id: &str,
    event: &Event,
    user: &Address,
    ctx: &mut RuleContext<'_>,
) -> ActionOutcome {
    match action {
        Action::Reward { amount } => {
            let paid = scaled_reward(
                *amount,
                event.difficulty,
                ctx.state.multiplier(user, ctx.now),
            );
            let tx = Transaction::mint(
                user.clone(),
                paid,
                TxBody::ContractReward {
                    contract_id: contract_id.to_string(),
                    rule_id: rule_id.to_string(),
                    original_amount: *amount,
                    bonus_amount: i128::from(paid) - i128::from(*amount),
                },
            );
            match ctx.ledger.add_transaction(tx) {
                Ok(()) => ActionOutcome::Reward { amount: paid },
                Err(e) => skipped(contract_id, "reward", e.to_string()),
            }
        }
        Action::UnlockAchievement { achievement_id } => {
            match ctx
                .achievements
                .record_unlock(user, *achievement_id, ctx.ledger)
            {
                Ok(newly_unlocked) => ActionOutcome::Achievement {
                    achievement_id: *achievement_id,
                    newly_unlocked,
                },
                Err(e) => skipped(contract_id, "unlock_achievement", e.to_string()),
            }
        }
        Action::ApplyMultiplier {
            multiplier,
            duration_ms,
        } => {
            if !multiplier.is_finite() || *multiplier <= 0.0 {
                return skipped(
                    contract_id,
                    "apply_multiplier",
                    format!("invalid multiplier {multiplier}"),
                );
            }
            let expires_at = i64::try_from(*duration_ms)
                .ok()
                .and_then(|ms| ctx.now.checked_add_signed(Duration::milliseconds(ms)));
            let Some(expires_at) = expires_at else {
                return skipped(
                    contract_id,
                    "apply_multiplier",
                    format!("duration {duration_ms}ms out of range"),
                );
            };
            ctx.state.apply_multiplier(
                user,
                Multiplier {
                    value: *multiplier,
                    expires_at,
                },
            );
            ActionOutcome::Multiplier { value: *multiplier }
        }
        Action::Notify { message } => {
            ctx.state.notify(user, message.clone(), ctx.now);
            ActionOutcome::Notification {
                message: message.clone(),
            }
        }
    }
}

/// Owns the registered contracts and the per-user state their actions write.
pub struct RuleEngine {
    contracts: Vec<Contract>,
    state: RuleState,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            contracts: Vec::new(),
            state: RuleState::default(),
            clock,
        }
    }

    /// An engine preloaded with the built-in contracts.
    pub fn with_default_contracts(clock: Arc<dyn Clock>) -> Self {
        let mut engine = Self::new(clock);
        for contract in super::defaults::default_contracts() {
            engine.register(contract);
        }
        engine
    }

    /// Add a contract, replacing any registered under the same id.
    pub fn register(&mut self, contract: Contract) {
        if let Some(existing) = self.contracts.iter_mut().find(|c| c.id == contract.id) {
            warn!("contract {} replaced", contract.id);
            *existing = contract;
        } else {
            debug!("contract {} registered", contract.id);
            self.contracts.push(contract);
        }
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn contract(&self, id: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn contract_mut(&mut self, id: &str) -> Option<&mut Contract> {
        self.contracts.iter_mut().find(|c| c.id == id)
    }

    pub fn summaries(&self) -> Vec<ContractSummary> {
        self.contracts.iter().map(Contract::summary).collect()
    }

    /// Rebuild once-per-address firing records from the contract rewards on
    /// `ledger`. Returns how many were recognised.
    pub fn restore(&mut self, ledger: &Ledger) -> usize {
        let mut restored = 0;
        for tx in ledger.all_transactions() {
            let TxBody::ContractReward {
                contract_id,
                rule_id,
                ..
            } = &tx.body
            else {
                continue;
            };
            if let Some(contract) = self.contract_mut(contract_id) {
                if contract.mark_fired(rule_id, &tx.to) {
                    restored += 1;
                }
            }
        }
        debug!("restored {restored} rule firing record(s)");
        restored
    }

    /// Evaluate every contract, in registration order, against `event`.
    ///
    /// Returns `None` if nothing fired.
    pub fn execute(
        &mut self,
        event: &Event,
        ledger: &mut Ledger,
        achievements: &mut AchievementTracker,
        streaks: &StreakTracker,
    ) -> Option<Vec<ContractExecution>> {
        if event.user_address.is_none() {
            warn!("event {:?} has no user address, ignored", event.kind);
            return None;
        }

        let mut ctx = RuleContext {
            ledger,
            achievements,
            streaks,
            state: &mut self.state,
            now: self.clock.now(),
        };
        let mut fired = Vec::new();
        for contract in &mut self.contracts {
            if let Some(rules) = contract.execute(event, &mut ctx) {
                fired.push(ContractExecution {
                    contract_id: contract.id.clone(),
                    contract_name: contract.name.clone(),
                    rules,
                });
            }
        }
        (!fired.is_empty()).then_some(fired)
    }

    pub fn multiplier(&self, address: &Address) -> f64 {
        self.state.multiplier(address, self.clock.now())
    }

    pub fn active_multiplier(&self, address: &Address) -> Option<Multiplier> {
        self.state.active_multiplier(address, self.clock.now())
    }

    pub fn notifications(&self, address: &Address) -> &[UserNotification] {
        self.state.notifications(address)
    }

    pub fn unread_notifications(&self, address: &Address) -> usize {
        self.state.unread_count(address)
    }

    pub fn mark_notifications_read(&mut self, address: &Address) -> usize {
        self.state.mark_read(address)
    }
}
