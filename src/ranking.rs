use crate::store::{EntryEngagement, Store};
use crate::types::Result;
use chrono::{DateTime, Utc};
use std::env;
use tracing::{debug, info, warn};

/// Tunables of the gravity-decay ranking law. Overridable at process start via
/// `FEED_COMMENT_WEIGHT` and `FEED_GRAVITY` so the formula's sensitivity can
/// be adjusted without recompilation.
#[derive(Debug, Clone, Copy)]
pub struct RankingConfig {
    pub comment_weight: f64,
    pub gravity: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            comment_weight: 0.5,
            gravity: 1.8,
        }
    }
}

impl RankingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            comment_weight: env_f64("FEED_COMMENT_WEIGHT", defaults.comment_weight),
            gravity: env_f64("FEED_GRAVITY", defaults.gravity),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring unparseable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Hacker-News-style gravity decay: recency dominates initially, engagement
/// sustains rank, decay is superlinear in age.
///
/// Negative ages (future-dated entries, clock skew) are clamped to zero so the
/// exponent base never drops below 2.
pub fn compute_weight(
    config: &RankingConfig,
    likes: i64,
    comments: i64,
    pub_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let score = 1.0 + likes as f64 + comments as f64 * config.comment_weight;
    let age_hours = ((now - pub_date).num_seconds() as f64 / 3600.0).max(0.0);
    score / (age_hours + 2.0).powf(config.gravity)
}

fn weight_of(config: &RankingConfig, engagement: &EntryEngagement, now: DateTime<Utc>) -> f64 {
    compute_weight(
        config,
        engagement.likes,
        engagement.comments,
        engagement.pub_date,
        now,
    )
}

/// Recompute one entry's weight from its current engagement.
pub async fn recompute_entry(store: &Store, config: &RankingConfig, entry_id: i64) -> Result<()> {
    if let Some(engagement) = store.entry_engagement(entry_id).await? {
        let weight = weight_of(config, &engagement, Utc::now());
        store.set_entry_weight(entry_id, weight).await?;
        debug!("entry {} weight {:.4}", entry_id, weight);
    }
    Ok(())
}

/// Maintenance pass: recompute every entry's weight. Each update commits
/// independently; a crash mid-pass leaves some entries stale, which the next
/// pass corrects.
pub async fn recompute_all(store: &Store, config: &RankingConfig) -> Result<usize> {
    let now = Utc::now();
    let engagements = store.all_entry_engagements().await?;
    let total = engagements.len();
    for engagement in engagements {
        let weight = weight_of(config, &engagement, now);
        store.set_entry_weight(engagement.entry_id, weight).await?;
    }
    info!("recomputed weights for {} feed entries", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn worked_example_with_default_tunables() {
        let config = RankingConfig {
            comment_weight: 0.5,
            gravity: 1.8,
        };
        let now = Utc::now();
        // 0 likes, 2 comments, age 0: (1 + 0 + 1) / 2^1.8
        let weight = compute_weight(&config, 0, 2, now, now);
        assert!((weight - 2.0 / 2f64.powf(1.8)).abs() < 1e-12);
        assert!((weight - 0.5743).abs() < 1e-3);
    }

    #[test]
    fn weight_decreases_monotonically_with_age() {
        let config = RankingConfig::default();
        let now = Utc::now();
        let mut previous = f64::INFINITY;
        for hours in [0, 1, 5, 24, 24 * 7] {
            let weight = compute_weight(&config, 3, 4, now - Duration::hours(hours), now);
            assert!(weight > 0.0);
            assert!(weight < previous, "weight must decay as age grows");
            previous = weight;
        }
    }

    #[test]
    fn engagement_raises_weight_at_equal_age() {
        let config = RankingConfig::default();
        let now = Utc::now();
        let published = now - Duration::hours(6);
        let quiet = compute_weight(&config, 0, 0, published, now);
        let lively = compute_weight(&config, 10, 4, published, now);
        assert!(lively > quiet);
    }

    #[test]
    fn future_dated_entries_clamp_to_age_zero() {
        let config = RankingConfig::default();
        let now = Utc::now();
        let future = now + Duration::hours(3);
        let weight = compute_weight(&config, 0, 0, future, now);
        assert!((weight - compute_weight(&config, 0, 0, now, now)).abs() < 1e-12);
    }
}
