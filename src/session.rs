//! One learner-facing session: a ledger plus the rule engine and progress
//! trackers that react to it.

use log::info;
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::{Block, Difficulty, Ledger, ProblemRef};
use crate::clock::Clock;
use crate::contract::{ContractExecution, Event, EventKind, RuleEngine};
use crate::error::LedgerError;
use crate::progress::{AchievementId, AchievementTracker, DailyBonus, Streak, StreakTracker};
use crate::transaction::{Address, Transaction};

/// Everything that happened because a problem was solved.
#[derive(Debug, Clone, Serialize)]
pub struct SolveOutcome {
    pub reward: Transaction,
    pub streak: Streak,
    pub streak_multiplier: f64,
    pub contracts: Option<Vec<ContractExecution>>,
    pub achievements: Vec<AchievementId>,
    pub block_hash: String,
    pub balance: i128,
}

pub struct RewardSession {
    ledger: Ledger,
    rules: RuleEngine,
    achievements: AchievementTracker,
    streaks: StreakTracker,
}

impl RewardSession {
    /// A session over `ledger` with the built-in contracts registered.
    ///
    /// Unlocked achievements, streaks, daily claims and once-per-address
    /// rule firings are rebuilt from the transactions already on `ledger`.
    pub fn new(ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        let mut rules = RuleEngine::with_default_contracts(clock.clone());
        rules.restore(&ledger);
        Self {
            achievements: AchievementTracker::from_ledger(clock.clone(), &ledger),
            streaks: StreakTracker::from_ledger(clock, &ledger),
            rules,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleEngine {
        &mut self.rules
    }

    pub fn achievements(&self) -> &AchievementTracker {
        &self.achievements
    }

    pub fn streaks(&self) -> &StreakTracker {
        &self.streaks
    }

    /// Pay for a solved problem and seal the result.
    ///
    /// Queues the base reward, records the day in the streak, runs the
    /// contracts, unlocks newly earned achievements and mines everything
    /// into one block with `user` as the miner. If mining fails the queued
    /// transactions stay pending for the next mine.
    pub fn solve_problem(
        &mut self,
        user: &Address,
        difficulty: &str,
        problem: &ProblemRef,
    ) -> Result<SolveOutcome, LedgerError> {
        let reward = self
            .ledger
            .award_coins_for_problem(user, difficulty, problem)?;
        let streak = self.streaks.update_streak(user);

        let mut event = Event::new(EventKind::ProblemSolved).for_user(user.clone());
        event.difficulty = Difficulty::parse(difficulty);
        let contracts = self.rules.execute(
            &event,
            &mut self.ledger,
            &mut self.achievements,
            &self.streaks,
        );
        let achievements = self.achievements.check_achievements(user, &mut self.ledger)?;

        let block_hash = self.ledger.mine_pending_transactions(user)?.hash.clone();
        let balance = self.ledger.balance_of(user);
        info!(
            "{user} solved '{}' ({difficulty}): balance {balance}, {} new achievements",
            problem.title,
            achievements.len()
        );

        Ok(SolveOutcome {
            reward,
            streak,
            streak_multiplier: self.streaks.multiplier(user),
            contracts,
            achievements,
            block_hash,
            balance,
        })
    }

    /// Queue today's bonus; it is sealed by the next mine.
    pub fn claim_daily_bonus(&mut self, user: &Address) -> Result<DailyBonus, LedgerError> {
        Ok(self.streaks.claim_daily_bonus(user, &mut self.ledger)?)
    }

    pub fn mine(&mut self, miner: &Address) -> Result<Block, LedgerError> {
        Ok(self.ledger.mine_pending_transactions(miner)?.clone())
    }
}
