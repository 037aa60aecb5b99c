pub mod achievement;
pub mod streak;

pub use achievement::{
    AchievementDefinition, AchievementId, AchievementProgress, AchievementTracker, Rarity,
    Requirement, UnlockedAchievement,
};
pub use streak::{DAILY_BONUS_AMOUNT, DailyBonus, Milestone, Streak, StreakStats, StreakTracker};
