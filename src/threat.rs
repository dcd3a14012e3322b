//! Trailing 24-hour threat aggregation.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::Database;
use crate::model::{ThreatLevel, ThreatScore};
use crate::TARGET_DB;

/// Ranks below this are low.
pub const MEDIUM_RANK_FLOOR: u32 = 2;
/// Ranks at or above this are high.
pub const HIGH_RANK_FLOOR: u32 = 5;

pub fn threat_window() -> Duration {
    Duration::hours(24)
}

/// Buckets ranks into low/medium/high and derives the level.
pub fn score_ranks<I>(ranks: I) -> ThreatScore
where
    I: IntoIterator<Item = u32>,
{
    let (mut low, mut medium, mut high) = (0, 0, 0);
    for rank in ranks {
        if rank < MEDIUM_RANK_FLOOR {
            low += 1;
        } else if rank < HIGH_RANK_FLOOR {
            medium += 1;
        } else {
            high += 1;
        }
    }
    let total = low + medium + high;

    let threat_level = if total == 0 {
        ThreatLevel::NoThreatsReported
    } else if high > 0 {
        ThreatLevel::CodeRed
    } else if medium > 0 {
        ThreatLevel::Attention
    } else {
        ThreatLevel::BusinessAsUsual
    };

    ThreatScore {
        low_rank_count: low,
        medium_rank_count: medium,
        high_rank_count: high,
        total_articles: total,
        threat_level,
    }
}

/// Threat score over articles published in the 24 hours before `now`.
///
/// Not a transactional snapshot: inserts racing with the read may or may not be seen.
pub async fn threat_score_at(db: &Database, now: DateTime<Utc>) -> Result<ThreatScore, sqlx::Error> {
    let ranks = db.ranks_since(now - threat_window()).await?;
    let score = score_ranks(ranks);
    debug!(target: TARGET_DB, "Threat score over {} articles: {}", score.total_articles, score.threat_level);
    Ok(score)
}

pub async fn today_threat_score(db: &Database) -> Result<ThreatScore, sqlx::Error> {
    threat_score_at(db, Utc::now()).await
}
