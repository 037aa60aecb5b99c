use chrono::{Days, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::blockchain::Ledger;
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::transaction::{Address, Transaction, TxBody};

/// Coins paid by a daily bonus claim.
pub const DAILY_BONUS_AMOUNT: u64 = 5;

/// Streak lengths that earn a higher multiplier.
pub const STREAK_MILESTONES: [u32; 4] = [3, 7, 14, 30];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub total_active_days: u32,
}

impl Streak {
    /// Count `day` as active. Returns false for a repeat of the last active
    /// day; a gap of more than one day restarts the streak at 1.
    fn advance(&mut self, day: NaiveDate) -> bool {
        if self.last_active_date == Some(day) {
            return false;
        }
        let yesterday = day.checked_sub_days(Days::new(1));
        if self.last_active_date.is_some() && self.last_active_date == yesterday {
            self.current_streak += 1;
        } else {
            self.current_streak = 1;
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_active_date = Some(day);
        self.total_active_days += 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub days: u32,
    pub days_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreakStats {
    pub streak: Streak,
    pub multiplier: f64,
    pub next_milestone: Option<Milestone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DailyBonus {
    Claimed { amount: u64 },
    AlreadyClaimed,
}

/// Multiplier for a streak length; breakpoints checked from the top.
pub fn streak_multiplier(current_streak: u32) -> f64 {
    match current_streak {
        s if s >= 30 => 2.0,
        s if s >= 14 => 1.5,
        s if s >= 7 => 1.3,
        s if s >= 3 => 1.1,
        _ => 1.0,
    }
}

/// Per-address consecutive-day activity and daily bonus claims.
pub struct StreakTracker {
    streaks: HashMap<Address, Streak>,
    daily_claims: HashMap<Address, NaiveDate>,
    clock: Arc<dyn Clock>,
}

impl StreakTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            streaks: HashMap::new(),
            daily_claims: HashMap::new(),
            clock,
        }
    }

    /// Rebuild from `ledger`: streaks replay the completion dates of problem
    /// rewards, daily claims take the latest bonus date per address.
    pub fn from_ledger(clock: Arc<dyn Clock>, ledger: &Ledger) -> Self {
        let mut tracker = Self::new(clock);
        let mut active_days: HashMap<&Address, BTreeSet<NaiveDate>> = HashMap::new();
        for tx in ledger.all_transactions() {
            match &tx.body {
                TxBody::Reward(details) => {
                    active_days
                        .entry(&tx.to)
                        .or_default()
                        .insert(details.completed_at.date_naive());
                }
                TxBody::DailyBonus { date } => {
                    let claimed = tracker.daily_claims.entry(tx.to.clone()).or_insert(*date);
                    *claimed = (*claimed).max(*date);
                }
                _ => {}
            }
        }
        for (address, days) in active_days {
            let mut streak = Streak::default();
            for day in days {
                streak.advance(day);
            }
            tracker.streaks.insert(address.clone(), streak);
        }
        tracker
    }

    /// Record activity today. Same-day repeats change nothing; a gap of more
    /// than one day restarts the streak at 1.
    pub fn update_streak(&mut self, address: &Address) -> Streak {
        let today = self.clock.today();
        let streak = self.streaks.entry(address.clone()).or_default();
        if !streak.advance(today) {
            return *streak;
        }

        debug!(
            "streak {address}: current={} longest={}",
            streak.current_streak, streak.longest_streak
        );
        *streak
    }

    pub fn streak(&self, address: &Address) -> Streak {
        self.streaks.get(address).copied().unwrap_or_default()
    }

    pub fn current_streak(&self, address: &Address) -> u32 {
        self.streak(address).current_streak
    }

    pub fn multiplier(&self, address: &Address) -> f64 {
        streak_multiplier(self.current_streak(address))
    }

    pub fn streak_stats(&self, address: &Address) -> StreakStats {
        let streak = self.streak(address);
        StreakStats {
            streak,
            multiplier: streak_multiplier(streak.current_streak),
            next_milestone: next_milestone(streak.current_streak),
        }
    }

    pub fn can_claim_daily_bonus(&self, address: &Address) -> bool {
        self.daily_claims.get(address) != Some(&self.clock.today())
    }

    /// Mint the daily bonus once per calendar day. A second claim on the same
    /// day returns `AlreadyClaimed` and mints nothing.
    pub fn claim_daily_bonus(
        &mut self,
        address: &Address,
        ledger: &mut Ledger,
    ) -> Result<DailyBonus, ValidationError> {
        let today = self.clock.today();
        if !self.can_claim_daily_bonus(address) {
            return Ok(DailyBonus::AlreadyClaimed);
        }

        ledger.add_transaction(Transaction::mint(
            address.clone(),
            DAILY_BONUS_AMOUNT,
            TxBody::DailyBonus { date: today },
        ))?;
        self.daily_claims.insert(address.clone(), today);

        info!("daily bonus {address} {today}");
        Ok(DailyBonus::Claimed {
            amount: DAILY_BONUS_AMOUNT,
        })
    }
}

fn next_milestone(current_streak: u32) -> Option<Milestone> {
    STREAK_MILESTONES
        .into_iter()
        .find(|&m| current_streak < m)
        .map(|days| Milestone {
            days,
            days_remaining: days - current_streak,
        })
}
