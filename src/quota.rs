//! Quota Tracker
//!
//! Rolling daily budget of weighted provider operations. The channel-data
//! provider bills each operation type at a different weight, so every call is
//! charged by name rather than at a flat rate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Operation names of the channel-data provider's weight schedule.
pub mod ops {
    pub const CHANNELS_LIST: &str = "channels.list";
    pub const SEARCH_LIST: &str = "search.list";
    pub const PLAYLISTS_LIST: &str = "playlists.list";
    pub const PLAYLIST_ITEMS_LIST: &str = "playlistItems.list";
    pub const VIDEOS_LIST: &str = "videos.list";
}

/// Cost charged for an operation missing from the schedule.
const DEFAULT_COST: u64 = 1;

/// A quota tracker shared between tasks.
pub type SharedQuota = Arc<RwLock<QuotaTracker>>;

// == Quota Status ==
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub used: u64,
    pub total: u64,
    pub remaining: u64,
    pub percentage: f64,
    pub reset_time: DateTime<Utc>,
}

// == Quota Tracker ==
#[derive(Debug)]
pub struct QuotaTracker {
    used_units: u64,
    daily_ceiling: u64,
    reset_at: DateTime<Utc>,
    operation_costs: HashMap<String, u64>,
    low_threshold: f64,
}

/// Next UTC midnight strictly after `now`.
fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

impl QuotaTracker {
    /// Creates a tracker with the provider's published weight schedule.
    pub fn new(daily_ceiling: u64, low_threshold: f64) -> Self {
        let operation_costs = [
            (ops::CHANNELS_LIST, 1),
            (ops::SEARCH_LIST, 100),
            (ops::PLAYLISTS_LIST, 1),
            (ops::PLAYLIST_ITEMS_LIST, 1),
            (ops::VIDEOS_LIST, 1),
        ]
        .into_iter()
        .map(|(name, cost)| (name.to_string(), cost))
        .collect();

        Self {
            used_units: 0,
            daily_ceiling,
            reset_at: next_midnight(Utc::now()),
            operation_costs,
            low_threshold,
        }
    }

    /// Replaces or adds the weight of one operation.
    pub fn with_cost(mut self, operation: &str, cost: u64) -> Self {
        self.operation_costs.insert(operation.to_string(), cost);
        self
    }

    pub fn shared(self) -> SharedQuota {
        Arc::new(RwLock::new(self))
    }

    /// Weight of `operation`; unknown operations cost one unit.
    pub fn cost(&self, operation: &str) -> u64 {
        self.operation_costs
            .get(operation)
            .copied()
            .unwrap_or(DEFAULT_COST)
    }

    // == Can Make Request ==
    /// Whether charging `operation` would stay within the daily ceiling.
    pub fn can_make_request(&mut self, operation: &str) -> bool {
        self.roll_over_if_due(Utc::now());
        self.used_units + self.cost(operation) <= self.daily_ceiling
    }

    // == Record Usage ==
    pub fn record_usage(&mut self, operation: &str) {
        self.roll_over_if_due(Utc::now());
        let cost = self.cost(operation);
        self.used_units += cost;
        info!(
            operation,
            cost,
            used = self.used_units,
            total = self.daily_ceiling,
            "quota used"
        );
    }

    // == Status ==
    pub fn status(&mut self) -> QuotaStatus {
        self.roll_over_if_due(Utc::now());
        QuotaStatus {
            used: self.used_units,
            total: self.daily_ceiling,
            remaining: self.daily_ceiling.saturating_sub(self.used_units),
            percentage: self.percentage(),
            reset_time: self.reset_at,
        }
    }

    /// True above the low threshold (80% by default).
    pub fn is_low(&mut self) -> bool {
        self.roll_over_if_due(Utc::now());
        self.percentage() > self.low_threshold * 100.0
    }

    /// True at or above the ceiling.
    pub fn is_exhausted(&mut self) -> bool {
        self.roll_over_if_due(Utc::now());
        self.used_units >= self.daily_ceiling
    }

    /// Seconds until the next reset, used as a retry-after hint.
    pub fn seconds_until_reset(&self) -> u64 {
        (self.reset_at - Utc::now()).num_seconds().max(0) as u64
    }

    fn percentage(&self) -> f64 {
        if self.daily_ceiling == 0 {
            return 100.0;
        }
        self.used_units as f64 * 100.0 / self.daily_ceiling as f64
    }

    fn roll_over_if_due(&mut self, now: DateTime<Utc>) {
        if now >= self.reset_at {
            self.used_units = 0;
            self.reset_at = next_midnight(now);
            info!(reset_at = %self.reset_at, "daily quota reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_weighted_costs() {
        let tracker = QuotaTracker::new(10_000, 0.8);
        assert_eq!(tracker.cost(ops::CHANNELS_LIST), 1);
        assert_eq!(tracker.cost(ops::SEARCH_LIST), 100);
        assert_eq!(tracker.cost("unknown.op"), 1);
    }

    #[test]
    fn test_ceiling_reached_after_ten_weighted_calls() {
        let mut tracker = QuotaTracker::new(100, 0.8).with_cost("bulk.op", 10);

        for _ in 0..10 {
            assert!(tracker.can_make_request("bulk.op"));
            tracker.record_usage("bulk.op");
        }

        assert!(!tracker.can_make_request("bulk.op"));
        assert!(tracker.is_exhausted());
    }

    #[test]
    fn test_midnight_rollover_resets_usage() {
        let mut tracker = QuotaTracker::new(100, 0.8).with_cost("bulk.op", 10);
        for _ in 0..10 {
            tracker.record_usage("bulk.op");
        }
        assert!(!tracker.can_make_request("bulk.op"));

        // Simulate the boundary passing
        tracker.reset_at = Utc::now() - Duration::seconds(1);

        assert!(tracker.can_make_request("bulk.op"));
        assert_eq!(tracker.status().used, 0);
        assert!(tracker.reset_at > Utc::now());
    }

    #[test]
    fn test_search_is_throttled_before_lookups() {
        let mut tracker = QuotaTracker::new(150, 0.8);
        tracker.record_usage(ops::SEARCH_LIST);

        assert!(!tracker.can_make_request(ops::SEARCH_LIST));
        assert!(tracker.can_make_request(ops::CHANNELS_LIST));
    }

    #[test]
    fn test_status_and_thresholds() {
        let mut tracker = QuotaTracker::new(100, 0.8).with_cost("op", 81);
        assert!(!tracker.is_low());

        tracker.record_usage("op");
        let status = tracker.status();
        assert_eq!(status.used, 81);
        assert_eq!(status.remaining, 19);
        assert_eq!(status.percentage, 81.0);
        assert!(tracker.is_low());
        assert!(!tracker.is_exhausted());
    }

    #[test]
    fn test_next_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 17, 45, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(next_midnight(now), expected);

        let at_midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            next_midnight(at_midnight),
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut tracker = QuotaTracker::new(10, 0.8);
        let json = serde_json::to_value(tracker.status()).unwrap();
        assert!(json.get("resetTime").is_some());
        assert_eq!(json["remaining"], 10);
    }
}
