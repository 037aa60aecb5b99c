use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::{Ledger, ProblemStats};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::transaction::{Address, Transaction, TxBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    #[serde(rename = "first_10")]
    First10,
    HalfCentury,
    Century,
    WeekWarrior,
    MonthMaster,
    EasyExpert,
    MediumMaster,
    HardHero,
    SpeedDemon,
    NightOwl,
    EarlyBird,
    WeekendWarrior,
    CourseComplete,
    AllCourses,
    Helpful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// When an achievement is earned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "threshold")]
pub enum Requirement {
    TotalProblems(u64),
    EasyProblems(u64),
    MediumProblems(u64),
    HardProblems(u64),
    /// Granted from outside (contracts, course or social features); never
    /// derived from ledger stats.
    Granted,
}

impl Requirement {
    /// Current value and target for stat-based requirements.
    fn measure(self, stats: &ProblemStats) -> Option<(u64, u64)> {
        match self {
            Requirement::TotalProblems(t) => Some((stats.total, t)),
            Requirement::EasyProblems(t) => Some((stats.easy, t)),
            Requirement::MediumProblems(t) => Some((stats.medium, t)),
            Requirement::HardProblems(t) => Some((stats.hard, t)),
            Requirement::Granted => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub reward: u64,
    pub requirement: Requirement,
}

impl AchievementId {
    pub const ALL: [AchievementId; 15] = [
        AchievementId::First10,
        AchievementId::HalfCentury,
        AchievementId::Century,
        AchievementId::WeekWarrior,
        AchievementId::MonthMaster,
        AchievementId::EasyExpert,
        AchievementId::MediumMaster,
        AchievementId::HardHero,
        AchievementId::SpeedDemon,
        AchievementId::NightOwl,
        AchievementId::EarlyBird,
        AchievementId::WeekendWarrior,
        AchievementId::CourseComplete,
        AchievementId::AllCourses,
        AchievementId::Helpful,
    ];

    pub fn definition(self) -> AchievementDefinition {
        use AchievementId::*;
        use Rarity::*;
        use Requirement::*;

        let (name, description, rarity, reward, requirement) = match self {
            First10 => ("Getting Started", "Solved your first 10 problems", Common, 100, TotalProblems(10)),
            HalfCentury => ("Half Century", "Solved 50 problems", Rare, 500, TotalProblems(50)),
            Century => ("Century", "Solved 100 problems", Epic, 1000, TotalProblems(100)),
            WeekWarrior => ("Week Warrior", "7-day solving streak", Rare, 150, Granted),
            MonthMaster => ("Month Master", "30-day solving streak", Epic, 1000, Granted),
            EasyExpert => ("Easy Expert", "Solved 20 easy problems", Common, 50, EasyProblems(20)),
            MediumMaster => ("Medium Master", "Solved 20 medium problems", Rare, 200, MediumProblems(20)),
            HardHero => ("Hard Hero", "Solved 20 hard problems", Epic, 500, HardProblems(20)),
            SpeedDemon => ("Speed Demon", "Solved a problem in under 5 minutes", Rare, 100, Granted),
            NightOwl => ("Night Owl", "Solved 10 problems after midnight", Rare, 150, Granted),
            EarlyBird => ("Early Bird", "Solved 10 problems before 6 AM", Rare, 150, Granted),
            WeekendWarrior => ("Weekend Warrior", "Solved 20 problems on weekends", Common, 100, Granted),
            CourseComplete => ("Course Graduate", "Completed your first course", Common, 200, Granted),
            AllCourses => ("Master Scholar", "Completed all available courses", Legendary, 2000, Granted),
            Helpful => ("Helpful Hand", "Helped 10 other students", Rare, 300, Granted),
        };
        AchievementDefinition {
            id: self,
            name,
            description,
            rarity,
            reward,
            requirement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub id: AchievementId,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockedAchievement {
    pub definition: AchievementDefinition,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementProgress {
    pub id: AchievementId,
    pub name: &'static str,
    pub current: u64,
    pub target: u64,
    pub percentage: f64,
    pub unlocked: bool,
}

/// Per-address unlocked sets. Each achievement is held at most once.
pub struct AchievementTracker {
    unlocked: HashMap<Address, Vec<UnlockRecord>>,
    clock: Arc<dyn Clock>,
}

impl AchievementTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            unlocked: HashMap::new(),
            clock,
        }
    }

    /// Rebuild the unlocked sets from the audit transactions on `ledger`.
    pub fn from_ledger(clock: Arc<dyn Clock>, ledger: &Ledger) -> Self {
        let mut tracker = Self::new(clock);
        for tx in ledger.all_transactions() {
            let TxBody::AchievementUnlock {
                achievement_id,
                unlocked_at,
                ..
            } = tx.body
            else {
                continue;
            };
            if tracker.has(&tx.to, achievement_id) {
                continue;
            }
            let unlocked_at =
                DateTime::from_timestamp_millis(unlocked_at).unwrap_or_else(|| tracker.clock.now());
            tracker
                .unlocked
                .entry(tx.to.clone())
                .or_default()
                .push(UnlockRecord {
                    id: achievement_id,
                    unlocked_at,
                });
        }
        tracker
    }

    pub fn has(&self, address: &Address, id: AchievementId) -> bool {
        self.unlocked
            .get(address)
            .is_some_and(|records| records.iter().any(|r| r.id == id))
    }

    /// Record an achievement without paying for it. Returns `false` if the
    /// address already held it.
    pub fn grant(&mut self, address: &Address, id: AchievementId) -> bool {
        if self.has(address, id) {
            return false;
        }
        let unlocked_at = self.clock.now();
        self.unlocked
            .entry(address.clone())
            .or_default()
            .push(UnlockRecord { id, unlocked_at });
        true
    }

    /// Record an achievement and queue its reward plus a zero-amount audit
    /// transaction. Returns `Ok(false)` and mints nothing if already held.
    pub fn unlock(
        &mut self,
        address: &Address,
        id: AchievementId,
        ledger: &mut Ledger,
    ) -> Result<bool, ValidationError> {
        if address.is_empty() {
            return Err(ValidationError::MissingAddress);
        }
        if self.has(address, id) {
            return Ok(false);
        }

        let def = id.definition();
        if def.reward > 0 {
            ledger.add_transaction(Transaction::mint(
                address.clone(),
                def.reward,
                TxBody::AchievementReward {
                    achievement_id: id,
                    achievement_name: def.name.to_string(),
                },
            ))?;
        }
        self.mint_audit(address, id, ledger)?;
        self.grant(address, id);

        info!("{address} unlocked {:?} (+{})", id, def.reward);
        Ok(true)
    }

    /// Like [`unlock`](Self::unlock) but pays nothing: only the audit
    /// transaction is queued. Contracts use this because their own reward
    /// action pays.
    pub fn record_unlock(
        &mut self,
        address: &Address,
        id: AchievementId,
        ledger: &mut Ledger,
    ) -> Result<bool, ValidationError> {
        if address.is_empty() {
            return Err(ValidationError::MissingAddress);
        }
        if self.has(address, id) {
            return Ok(false);
        }
        self.mint_audit(address, id, ledger)?;
        self.grant(address, id);
        info!("{address} unlocked {:?} by contract", id);
        Ok(true)
    }

    fn mint_audit(
        &self,
        address: &Address,
        id: AchievementId,
        ledger: &mut Ledger,
    ) -> Result<(), ValidationError> {
        ledger.add_transaction(Transaction::mint(
            address.clone(),
            0,
            TxBody::AchievementUnlock {
                achievement_id: id,
                achievement_name: id.definition().name.to_string(),
                unlocked_at: self.clock.now().timestamp_millis(),
            },
        ))
    }

    /// Unlock every stat-based achievement the address now qualifies for.
    /// Returns the newly unlocked ids, in catalog order.
    pub fn check_achievements(
        &mut self,
        address: &Address,
        ledger: &mut Ledger,
    ) -> Result<Vec<AchievementId>, ValidationError> {
        let stats = ledger.problem_stats(address);
        let mut newly = Vec::new();
        for id in AchievementId::ALL {
            let Some((current, target)) = id.definition().requirement.measure(&stats) else {
                continue;
            };
            if current >= target && self.unlock(address, id, ledger)? {
                newly.push(id);
            }
        }
        Ok(newly)
    }

    pub fn user_achievements(&self, address: &Address) -> Vec<UnlockedAchievement> {
        self.unlocked
            .get(address)
            .map(|records| {
                records
                    .iter()
                    .map(|r| UnlockedAchievement {
                        definition: r.id.definition(),
                        unlocked_at: r.unlocked_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Progress toward every stat-based achievement.
    pub fn achievement_progress(&self, address: &Address, ledger: &Ledger) -> Vec<AchievementProgress> {
        let stats = ledger.problem_stats(address);
        AchievementId::ALL
            .into_iter()
            .filter_map(|id| {
                let def = id.definition();
                let (current, target) = def.requirement.measure(&stats)?;
                Some(AchievementProgress {
                    id,
                    name: def.name,
                    current,
                    target,
                    percentage: (current as f64 / target as f64 * 100.0).min(100.0),
                    unlocked: self.has(address, id),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ProblemRef;
    use crate::clock::SystemClock;
    use crate::config::LedgerConfig;
    use crate::transaction::TxKind;

    fn setup() -> (AchievementTracker, Ledger) {
        (
            AchievementTracker::new(Arc::new(SystemClock)),
            Ledger::new(LedgerConfig::default()),
        )
    }

    fn solve(ledger: &mut Ledger, who: &Address, difficulty: &str, n: usize) {
        for _ in 0..n {
            ledger
                .award_coins_for_problem(who, difficulty, &ProblemRef::default())
                .unwrap();
        }
    }

    #[test]
    fn catalog_is_complete() {
        assert_eq!(AchievementId::ALL.len(), 15);
        assert_eq!(AchievementId::First10.definition().reward, 100);
        assert_eq!(AchievementId::AllCourses.definition().rarity, Rarity::Legendary);
    }

    #[test]
    fn unlocking_twice_mints_once() {
        let (mut tracker, mut ledger) = setup();
        let who: Address = "A".into();

        assert!(tracker.unlock(&who, AchievementId::Helpful, &mut ledger).unwrap());
        assert!(!tracker.unlock(&who, AchievementId::Helpful, &mut ledger).unwrap());

        assert_eq!(tracker.user_achievements(&who).len(), 1);
        assert_eq!(ledger.balance_of(&who), 300);
        let kinds: Vec<TxKind> = ledger.pending().iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec![TxKind::AchievementReward, TxKind::AchievementUnlock]);
        assert_eq!(ledger.pending()[1].amount, 0);
    }

    #[test]
    fn grant_records_without_paying() {
        let (mut tracker, ledger) = setup();
        let who: Address = "A".into();
        assert!(tracker.grant(&who, AchievementId::WeekWarrior));
        assert!(!tracker.grant(&who, AchievementId::WeekWarrior));
        assert!(tracker.has(&who, AchievementId::WeekWarrior));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn check_unlocks_at_threshold_only_once() {
        let (mut tracker, mut ledger) = setup();
        let who: Address = "A".into();

        solve(&mut ledger, &who, "easy", 9);
        assert!(tracker.check_achievements(&who, &mut ledger).unwrap().is_empty());

        solve(&mut ledger, &who, "easy", 1);
        assert_eq!(
            tracker.check_achievements(&who, &mut ledger).unwrap(),
            vec![AchievementId::First10]
        );
        assert!(tracker.check_achievements(&who, &mut ledger).unwrap().is_empty());

        solve(&mut ledger, &who, "EASY", 10);
        assert_eq!(
            tracker.check_achievements(&who, &mut ledger).unwrap(),
            vec![AchievementId::EasyExpert]
        );
        // 20 easy rewards of 10 each, plus First10 and EasyExpert.
        assert_eq!(ledger.balance_of(&who), 200 + 100 + 50);
    }

    #[test]
    fn progress_reports_stat_based_achievements() {
        let (mut tracker, mut ledger) = setup();
        let who: Address = "A".into();
        solve(&mut ledger, &who, "hard", 5);
        tracker.check_achievements(&who, &mut ledger).unwrap();

        let progress = tracker.achievement_progress(&who, &ledger);
        assert_eq!(progress.len(), 6);
        let hard = progress
            .iter()
            .find(|p| p.id == AchievementId::HardHero)
            .unwrap();
        assert_eq!((hard.current, hard.target), (5, 20));
        assert!((hard.percentage - 25.0).abs() < f64::EPSILON);
        assert!(!hard.unlocked);
    }

    #[test]
    fn contract_unlock_queues_only_the_audit() {
        let (mut tracker, mut ledger) = setup();
        let who: Address = "A".into();
        assert!(tracker.record_unlock(&who, AchievementId::WeekWarrior, &mut ledger).unwrap());
        assert!(!tracker.record_unlock(&who, AchievementId::WeekWarrior, &mut ledger).unwrap());

        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.pending()[0].kind(), TxKind::AchievementUnlock);
        assert_eq!(ledger.balance_of(&who), 0);
    }

    #[test]
    fn unlocked_sets_rebuild_from_the_ledger() {
        let (mut tracker, mut ledger) = setup();
        let who: Address = "A".into();
        solve(&mut ledger, &who, "easy", 20);
        tracker.check_achievements(&who, &mut ledger).unwrap();
        tracker.record_unlock(&who, AchievementId::WeekWarrior, &mut ledger).unwrap();
        ledger.mine_pending_transactions(&"M".into()).unwrap();
        let balance = ledger.balance_of(&who);

        let mut rebuilt = AchievementTracker::from_ledger(Arc::new(SystemClock), &ledger);
        let mut ids: Vec<_> = rebuilt
            .user_achievements(&who)
            .iter()
            .map(|a| a.definition.id)
            .collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![
                AchievementId::First10,
                AchievementId::WeekWarrior,
                AchievementId::EasyExpert
            ]
        );

        solve(&mut ledger, &who, "easy", 1);
        assert!(rebuilt.check_achievements(&who, &mut ledger).unwrap().is_empty());
        assert_eq!(ledger.balance_of(&who), balance + 10);
    }

    #[test]
    fn empty_address_is_rejected_before_recording() {
        let (mut tracker, mut ledger) = setup();
        let nobody: Address = "".into();
        assert_eq!(
            tracker.unlock(&nobody, AchievementId::Century, &mut ledger),
            Err(ValidationError::MissingAddress)
        );
        assert!(!tracker.has(&nobody, AchievementId::Century));
    }
}
