//! Built-in contracts every new engine starts with.

use super::engine::Contract;
use super::rule::{Action, Condition, EventKind, Rule};
use crate::blockchain::Difficulty;
use crate::progress::AchievementId;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

fn on_problem_solved(extra: Condition) -> Vec<Condition> {
    vec![Condition::EventType(EventKind::ProblemSolved), extra]
}

fn notify(message: &str) -> Action {
    Action::Notify {
        message: message.to_string(),
    }
}

pub fn default_contracts() -> Vec<Contract> {
    let milestone = Contract::new("milestone_bonus", "Milestone Achievement Bonus", "system".into())
        .with_rule(
            Rule::new(
                "10 Problems Bonus",
                on_problem_solved(Condition::ProblemCount(10)),
                vec![
                    Action::Reward { amount: 100 },
                    Action::UnlockAchievement {
                        achievement_id: AchievementId::First10,
                    },
                    notify("Milestone! You solved 10 problems! Bonus: 100 PSIT Coins!"),
                ],
            )
            .with_id("milestone_10")
            .once_per_address(),
        )
        .with_rule(
            Rule::new(
                "50 Problems Bonus",
                on_problem_solved(Condition::ProblemCount(50)),
                vec![
                    Action::Reward { amount: 500 },
                    Action::UnlockAchievement {
                        achievement_id: AchievementId::HalfCentury,
                    },
                    Action::ApplyMultiplier {
                        multiplier: 1.5,
                        duration_ms: 7 * DAY_MS,
                    },
                    notify("50 problems solved! Bonus: 500 coins + 1.5x multiplier for 7 days!"),
                ],
            )
            .with_id("milestone_50")
            .once_per_address(),
        );

    let streak = Contract::new("streak_bonus", "Daily Streak Rewards", "system".into())
        .with_rule(
            Rule::new(
                "7-Day Streak Bonus",
                on_problem_solved(Condition::Streak(7)),
                vec![
                    Action::Reward { amount: 150 },
                    Action::UnlockAchievement {
                        achievement_id: AchievementId::WeekWarrior,
                    },
                    notify("7-day streak! Bonus: 150 PSIT Coins!"),
                ],
            )
            .with_id("streak_7")
            .once_per_address(),
        )
        .with_rule(
            Rule::new(
                "30-Day Streak Bonus",
                on_problem_solved(Condition::Streak(30)),
                vec![
                    Action::Reward { amount: 1000 },
                    Action::UnlockAchievement {
                        achievement_id: AchievementId::MonthMaster,
                    },
                    Action::ApplyMultiplier {
                        multiplier: 2.0,
                        duration_ms: 30 * DAY_MS,
                    },
                    notify("30-day streak! Bonus: 1000 coins + 2x multiplier for 30 days!"),
                ],
            )
            .with_id("streak_30")
            .once_per_address(),
        );

    // Sunday = 0, Saturday = 6
    let weekend = Contract::new("weekend_warrior", "Weekend Bonus", "system".into()).with_rule(
        Rule::new(
            "Weekend Double Rewards",
            on_problem_solved(Condition::DayOfWeek(vec![0, 6])),
            vec![
                Action::Reward { amount: 20 },
                notify("Weekend bonus: Extra 20 PSIT Coins!"),
            ],
        )
        .with_id("weekend_double"),
    );

    let hard = Contract::new("hard_master", "Hard Problem Master", "system".into()).with_rule(
        Rule::new(
            "Hard Problem Streak",
            on_problem_solved(Condition::ProblemDifficulty(Difficulty::Hard)),
            vec![
                Action::Reward { amount: 30 },
                notify("Hard problem conquered! Bonus: 30 PSIT Coins!"),
            ],
        )
        .with_id("hard_problem"),
    );

    vec![milestone, streak, weekend, hard]
}
