//! Delta engine
//!
//! Turns successive absolute readings into "used since last check" and
//! "used today" figures. Pure function of its inputs: the same
//! (current, previous) pair always yields the same diff.
//!
//! The carrier resets its used-counters monthly; when the current reading
//! falls in a later month than the previous snapshot, the entire current
//! usage is treated as new instead of computing a meaningless (often
//! negative) subtraction. Calendar math runs in the carrier's timezone
//! (UTC+8), not the host's.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::buckets::{BucketKey, BucketSet};
use super::store::Snapshot;

/// Carrier-local offset from UTC, in seconds
pub const CARRIER_UTC_OFFSET_SECS: i64 = 8 * 3600;

// ============================================================================
// Diff types
// ============================================================================

/// Per-bucket usage deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    /// Used since the previous snapshot
    pub used: f64,
    /// Accumulated usage for the current calendar day
    pub today: f64,
}

impl UsageDelta {
    fn add(&mut self, other: UsageDelta) {
        self.used += other.used;
        self.today += other.today;
    }
}

/// Deltas for the six base buckets plus the three aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSet {
    pub common_limited: UsageDelta,
    pub common_unlimited: UsageDelta,
    pub regional_limited: UsageDelta,
    pub regional_unlimited: UsageDelta,
    pub targeted_limited: UsageDelta,
    pub targeted_unlimited: UsageDelta,
    pub all_common: UsageDelta,
    pub all_targeted_free: UsageDelta,
    pub all_traffic: UsageDelta,
}

impl DiffSet {
    pub fn get_base(&self, key: BucketKey) -> UsageDelta {
        match key {
            BucketKey::CommonLimited => self.common_limited,
            BucketKey::CommonUnlimited => self.common_unlimited,
            BucketKey::RegionalLimited => self.regional_limited,
            BucketKey::RegionalUnlimited => self.regional_unlimited,
            BucketKey::TargetedLimited => self.targeted_limited,
            BucketKey::TargetedUnlimited => self.targeted_unlimited,
        }
    }

    fn set_base(&mut self, key: BucketKey, delta: UsageDelta) {
        match key {
            BucketKey::CommonLimited => self.common_limited = delta,
            BucketKey::CommonUnlimited => self.common_unlimited = delta,
            BucketKey::RegionalLimited => self.regional_limited = delta,
            BucketKey::RegionalUnlimited => self.regional_unlimited = delta,
            BucketKey::TargetedLimited => self.targeted_limited = delta,
            BucketKey::TargetedUnlimited => self.targeted_unlimited = delta,
        }
    }
}

// ============================================================================
// Calendar helpers
// ============================================================================

/// Calendar date of an epoch timestamp in the carrier's timezone
pub(crate) fn carrier_date(ts: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(ts + CARRIER_UTC_OFFSET_SECS, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

/// year*12 + month, for ordering across month boundaries
fn month_index(ts: i64) -> i32 {
    let date = carrier_date(ts);
    date.year() * 12 + date.month() as i32
}

// ============================================================================
// Diff computation
// ============================================================================

/// Compute the diff between current buckets and the previous snapshot
///
/// With no previous snapshot every base delta is zero; the aggregates are
/// still derived by summing the (zero) base deltas rather than skipped.
pub fn compute_diff(current: &BucketSet, now_ts: i64, previous: Option<&Snapshot>) -> DiffSet {
    let mut diff = DiffSet::default();

    if let Some(prev) = previous {
        let cross_month = month_index(now_ts) > month_index(prev.timestamp);
        let same_day = carrier_date(now_ts) == carrier_date(prev.timestamp);

        for key in BucketKey::BASE {
            let cur = current.get(key);
            let delta = if cross_month {
                // Monthly counter reset: the whole current reading is new
                UsageDelta {
                    used: cur.used,
                    today: cur.used,
                }
            } else {
                // Clamp guards against upstream counter anomalies
                let used = (cur.used - prev.buckets.get(key).used).max(0.0);
                let today = if same_day {
                    prev.diff.get_base(key).today + used
                } else {
                    used
                };
                UsageDelta { used, today }
            };
            diff.set_base(key, delta);
        }
    }

    // Aggregates are always recomputed from base deltas, never read from
    // a stored aggregate.
    let mut all_common = UsageDelta::default();
    all_common.add(diff.common_limited);
    all_common.add(diff.common_unlimited);
    all_common.add(diff.regional_limited);
    all_common.add(diff.regional_unlimited);

    let mut all_targeted = UsageDelta::default();
    all_targeted.add(diff.targeted_limited);
    all_targeted.add(diff.targeted_unlimited);

    let mut all_traffic = UsageDelta::default();
    all_traffic.add(all_common);
    all_traffic.add(all_targeted);

    diff.all_common = all_common;
    diff.all_targeted_free = all_targeted;
    diff.all_traffic = all_traffic;
    diff
}

// ============================================================================
// Tests
// ============================================================================
