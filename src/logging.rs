use std::env;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::workers::{PollOutcome, SkipReason};

/// Initialize tracing; `RUST_LOG` overrides `default_filter`, `LOG_FORMAT=json` emits JSON lines
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Emit one structured event summarizing a tick
pub fn log_outcome(outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Skipped(reason) => match reason {
            SkipReason::KillSwitch => {
                info!(target: "live_scores::tick", outcome = "skipped", reason = reason.as_str(), "Live polling disabled by kill switch");
            }
            SkipReason::BudgetExhausted {
                monthly_used,
                budget,
            } => {
                info!(
                    target: "live_scores::tick",
                    outcome = "skipped",
                    reason = reason.as_str(),
                    monthly_used,
                    budget,
                    "Monthly API budget nearly exhausted, polling suspended"
                );
            }
            SkipReason::IntervalNotElapsed { tier, interval } => {
                info!(
                    target: "live_scores::tick",
                    outcome = "skipped",
                    reason = reason.as_str(),
                    tier = tier.as_str(),
                    interval_secs = interval.as_secs(),
                    "Poll interval not elapsed"
                );
            }
        },
        PollOutcome::Completed(summary) => {
            info!(
                target: "live_scores::tick",
                outcome = "completed",
                tier = summary.tier.as_str(),
                api_calls = summary.api_calls,
                failed_feeds = summary.failed_feeds.len(),
                fetched = summary.fetched,
                admitted = summary.admitted,
                updated = summary.updated,
                removed = summary.removed,
                hourly = summary.usage.hourly,
                daily = summary.usage.daily,
                monthly = summary.usage.monthly,
                "Poll cycle complete"
            );
        }
        PollOutcome::Failed(message) => {
            error!(target: "live_scores::tick", outcome = "failed", error = %message, "Poll cycle failed");
        }
    }
}
