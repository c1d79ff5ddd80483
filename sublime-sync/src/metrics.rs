//! API call accounting and environmental impact estimate

use crate::state::EventBus;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sublime_common::events::SublimeEvent;

/// grams CO2 per content service call
pub const CO2_GRAMS_PER_CALL: f64 = 0.2;
/// grams CO2 per second of session
pub const CO2_GRAMS_PER_SECOND: f64 = 0.0001;
/// millilitres of water per content service call
pub const WATER_ML_PER_CALL: f64 = 0.5;
/// millilitres of water per second of session
pub const WATER_ML_PER_SECOND: f64 = 0.0002;

/// Counts every call made to the content service, successful or not
#[derive(Debug, Default)]
pub struct ApiCallCounter {
    total: AtomicU64,
}

impl ApiCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one call and return the new total
    pub fn increment(&self) -> u64 {
        self.total.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one call and announce the new total to subscribers
    pub fn record(&self, events: &EventBus) -> u64 {
        let total = self.increment();
        events.emit(SublimeEvent::ApiCallCount {
            total,
            timestamp: Utc::now(),
        });
        total
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Estimated footprint of the session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ImpactMetrics {
    pub co2_grams: f64,
    pub water_ml: f64,
}

impl ImpactMetrics {
    pub fn estimate(api_calls: u64, uptime: Duration) -> Self {
        let calls = api_calls as f64;
        let seconds = uptime.as_secs_f64();
        Self {
            co2_grams: calls * CO2_GRAMS_PER_CALL + seconds * CO2_GRAMS_PER_SECOND,
            water_ml: calls * WATER_ML_PER_CALL + seconds * WATER_ML_PER_SECOND,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let counter = ApiCallCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.total(), 2);
    }

    #[tokio::test]
    async fn test_record_announces_total() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let counter = ApiCallCounter::new();
        counter.record(&events);

        match rx.recv().await.unwrap() {
            SublimeEvent::ApiCallCount { total, .. } => assert_eq!(total, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_impact_estimate() {
        let impact = ImpactMetrics::estimate(10, Duration::from_secs(1000));
        assert!((impact.co2_grams - 2.1).abs() < 1e-9);
        assert!((impact.water_ml - 5.2).abs() < 1e-9);
    }

    #[test]
    fn test_idle_session_has_only_time_cost() {
        let impact = ImpactMetrics::estimate(0, Duration::ZERO);
        assert_eq!(impact, ImpactMetrics::default());
    }
}
