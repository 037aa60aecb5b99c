use std::env;
use std::time::Duration;

use crate::blockchain::{
    DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, DEFAULT_SNAPSHOT_KEY, DIFF_MAX, MiningLimits,
};

/// Ledger tunables. `from_env` reads `LEDGER_*` variables; anything unset or
/// unparsable falls back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub difficulty: u32,
    pub mining_reward: u64,
    pub snapshot_key: String,
    pub mining_limits: MiningLimits,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            mining_limits: MiningLimits::default(),
        }
    }
}

impl LedgerConfig {
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let difficulty = lookup("LEDGER_DIFFICULTY")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.difficulty);

        Self {
            difficulty: difficulty.min(DIFF_MAX),
            mining_reward: parse_u64("LEDGER_MINING_REWARD").unwrap_or(defaults.mining_reward),
            snapshot_key: lookup("LEDGER_SNAPSHOT_KEY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.snapshot_key),
            mining_limits: MiningLimits {
                max_attempts: parse_u64("LEDGER_MAX_MINING_ATTEMPTS")
                    .or(defaults.mining_limits.max_attempts),
                max_duration: parse_u64("LEDGER_MAX_MINING_MS")
                    .map(Duration::from_millis)
                    .or(defaults.mining_limits.max_duration),
            },
        }
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty.min(DIFF_MAX);
        self
    }

    pub fn with_mining_reward(mut self, reward: u64) -> Self {
        self.mining_reward = reward;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = LedgerConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, LedgerConfig::default());
        assert_eq!(cfg.difficulty, 2);
        assert_eq!(cfg.mining_reward, 10);
    }

    #[test]
    fn reads_and_clamps() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("LEDGER_DIFFICULTY", "9"),
            ("LEDGER_MINING_REWARD", "25"),
            ("LEDGER_SNAPSHOT_KEY", "session-7"),
            ("LEDGER_MAX_MINING_MS", "1500"),
        ]));
        assert_eq!(cfg.difficulty, DIFF_MAX);
        assert_eq!(cfg.mining_reward, 25);
        assert_eq!(cfg.snapshot_key, "session-7");
        assert_eq!(
            cfg.mining_limits.max_duration,
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn garbage_falls_back() {
        let cfg = LedgerConfig::from_lookup(lookup(&[("LEDGER_MINING_REWARD", "lots")]));
        assert_eq!(cfg.mining_reward, DEFAULT_MINING_REWARD);
    }
}
