//! Lock-free security counters

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::RejectionCategory;

const RATE_LIMITED: &str = "RateLimited";

/// Counters updated by every tool call; reads never block writers.
#[derive(Debug, Default)]
pub struct SecurityStats {
    total_queries: AtomicU64,
    rejected_queries: AtomicU64,
    by_category: [AtomicU64; RejectionCategory::ALL.len()],
    rate_limited: AtomicU64,
}

impl SecurityStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, category: RejectionCategory) {
        self.rejected_queries.fetch_add(1, Ordering::Relaxed);
        self.by_category[category_index(category)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rejected_queries.fetch_add(1, Ordering::Relaxed);
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, active_sessions: usize) -> StatsSnapshot {
        let mut rejections_by_category: BTreeMap<String, u64> = RejectionCategory::ALL
            .iter()
            .map(|category| {
                (
                    category.as_str().to_string(),
                    self.by_category[category_index(*category)].load(Ordering::Relaxed),
                )
            })
            .collect();
        rejections_by_category.insert(
            RATE_LIMITED.to_string(),
            self.rate_limited.load(Ordering::Relaxed),
        );

        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            rejected_queries: self.rejected_queries.load(Ordering::Relaxed),
            rejections_by_category,
            active_sessions,
        }
    }
}

fn category_index(category: RejectionCategory) -> usize {
    RejectionCategory::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or_default()
}

/// Point-in-time copy of the counters, as served by `get_security_stats`
/// and the `/stats` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub rejected_queries: u64,
    pub rejections_by_category: BTreeMap<String, u64>,
    pub active_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = SecurityStats::new();
        stats.record_query();
        stats.record_query();
        stats.record_rejection(RejectionCategory::ForbiddenKeyword);
        stats.record_rejection(RejectionCategory::StructuralAnomaly);
        stats.record_rejection(RejectionCategory::StructuralAnomaly);
        stats.record_rate_limited();

        let snapshot = stats.snapshot(3);
        assert_eq!(snapshot.total_queries, 2);
        assert_eq!(snapshot.rejected_queries, 4);
        assert_eq!(snapshot.rejections_by_category["ForbiddenKeyword"], 1);
        assert_eq!(snapshot.rejections_by_category["StructuralAnomaly"], 2);
        assert_eq!(snapshot.rejections_by_category["LengthExceeded"], 0);
        assert_eq!(snapshot.rejections_by_category["RateLimited"], 1);
        assert_eq!(snapshot.active_sessions, 3);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(SecurityStats::new().snapshot(0)).unwrap();
        assert!(json.get("totalQueries").is_some());
        assert!(json.get("rejectedQueries").is_some());
        assert!(json.get("rejectionsByCategory").is_some());
        assert!(json.get("activeSessions").is_some());
    }
}
