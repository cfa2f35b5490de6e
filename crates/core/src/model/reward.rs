use serde::{Deserialize, Serialize};

/// What a failing run earns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Nothing unless every stage was correct.
    #[default]
    Zero,
    /// `floor(total * correct / stages)`.
    Proportional,
}

/// Coins and XP granted for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reward {
    pub coins: u32,
    pub xp: u32,
}

impl Reward {
    #[must_use]
    pub fn new(coins: u32, xp: u32) -> Self {
        Self { coins, xp }
    }
}

/// Reward values served by the "game data" lookup, replacing a module's configured totals.
pub type RewardOverride = Reward;

/// Reward configuration for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardRules {
    pub full: Reward,
    pub fallback: FallbackPolicy,
}

impl RewardRules {
    #[must_use]
    pub fn new(full: Reward, fallback: FallbackPolicy) -> Self {
        Self { full, fallback }
    }

    /// Same rules with the full-completion totals replaced.
    #[must_use]
    pub fn with_override(self, over: RewardOverride) -> Self {
        Self { full: over, ..self }
    }

    /// Final reward for `correct` right answers out of `total` stages.
    ///
    /// A run passes only when `correct == total`; failing runs fall back to the policy.
    #[must_use]
    pub fn award(&self, correct: usize, total: usize) -> Reward {
        if total > 0 && correct >= total {
            return self.full;
        }
        match self.fallback {
            FallbackPolicy::Zero => Reward::default(),
            FallbackPolicy::Proportional => Reward {
                coins: proportional(self.full.coins, correct, total),
                xp: proportional(self.full.xp, correct, total),
            },
        }
    }
}

fn proportional(amount: u32, correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = u128::from(amount) * correct as u128 / total as u128;
    u32::try_from(scaled).unwrap_or(amount)
}
