use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Throttling level derived from monthly budget consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageTier {
    /// Below 70%
    Normal,
    /// 70% to 85%
    Tier70,
    /// 85% to 95%
    Tier85,
    /// 95% and above; polling suspended
    Tier95,
}

impl UsageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageTier::Normal => "normal",
            UsageTier::Tier70 => "tier70",
            UsageTier::Tier85 => "tier85",
            UsageTier::Tier95 => "tier95",
        }
    }

    /// Interval multiplier, `None` when polling is suspended
    pub fn interval_multiplier(&self) -> Option<u32> {
        match self {
            UsageTier::Normal => Some(1),
            UsageTier::Tier70 => Some(2),
            UsageTier::Tier85 => Some(3),
            UsageTier::Tier95 => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.interval_multiplier().is_none()
    }
}

impl fmt::Display for UsageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for `monthly_used` calls out of `budget`
///
/// Thresholds are inclusive. A zero budget allows no calls at all.
pub fn usage_tier(monthly_used: u64, budget: u64) -> UsageTier {
    if budget == 0 {
        return UsageTier::Tier95;
    }

    // Integer percent comparison: used / budget >= pct / 100
    let reached = |pct: u64| monthly_used.saturating_mul(100) >= budget.saturating_mul(pct);

    if reached(95) {
        UsageTier::Tier95
    } else if reached(85) {
        UsageTier::Tier85
    } else if reached(70) {
        UsageTier::Tier70
    } else {
        UsageTier::Normal
    }
}

/// Polling interval for a sport's normal-tier `base`, `None` if suspended
///
/// Saturates at `Duration::MAX` instead of overflowing.
pub fn poll_interval(base: Duration, tier: UsageTier) -> Option<Duration> {
    tier.interval_multiplier()
        .map(|m| base.checked_mul(m).unwrap_or(Duration::MAX))
}
