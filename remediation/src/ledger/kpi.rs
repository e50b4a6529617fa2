//! KPI counters and the values derived from them
//!
//! Only raw counters are stored. Rates, budget health and MTTR are computed
//! on read so they always agree with the counters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Auto-resolve rate below this raises an alert
pub const AUTO_RESOLVE_TARGET: f64 = 0.85;

/// Mean time to resolution above this raises an alert
pub const MTTR_TARGET: Duration = Duration::from_secs(5 * 60);

/// Days of budget the cumulative cost may consume
pub const BUDGET_WINDOW_DAYS: u64 = 7;

/// Process-wide running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiAggregate {
    pub total_incidents: u64,
    pub auto_resolved: u64,
    pub escalated: u64,
    pub cumulative_cost: u64,
    /// Sum of the durations of verified attempts, in milliseconds
    pub resolution_ms_total: u64,
    /// Number of resolution times summed
    pub resolutions: u64,
}

impl KpiAggregate {
    /// Derive the reporting view
    pub fn snapshot(&self, daily_budget_cap: u64) -> KpiSnapshot {
        let auto_resolve_rate = if self.total_incidents == 0 {
            0.0
        } else {
            (self.auto_resolved as f64 / self.total_incidents as f64).clamp(0.0, 1.0)
        };
        let mean_time_to_resolution_ms = if self.resolutions == 0 {
            0.0
        } else {
            self.resolution_ms_total as f64 / self.resolutions as f64
        };
        KpiSnapshot {
            counters: *self,
            auto_resolve_rate,
            budget_healthy: self.cumulative_cost
                < daily_budget_cap.saturating_mul(BUDGET_WINDOW_DAYS),
            mean_time_to_resolution_ms,
            daily_budget_cap,
        }
    }
}

/// Counters plus derived values, as served to the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    #[serde(flatten)]
    pub counters: KpiAggregate,
    pub auto_resolve_rate: f64,
    pub budget_healthy: bool,
    pub mean_time_to_resolution_ms: f64,
    pub daily_budget_cap: u64,
}

/// Health conditions derived from a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum KpiAlert {
    AutoResolveBelowTarget { rate: f64, target: f64 },
    ResolutionTooSlow { mttr_ms: f64, target_ms: u64 },
    BudgetExceeded { cumulative_cost: u64, cap: u64 },
}

impl std::fmt::Display for KpiAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoResolveBelowTarget { rate, target } => write!(
                f,
                "auto-resolve rate {:.1}% below {:.0}%",
                rate * 100.0,
                target * 100.0
            ),
            Self::ResolutionTooSlow { mttr_ms, target_ms } => write!(
                f,
                "MTTR {:.1}s above {}s",
                mttr_ms / 1000.0,
                target_ms / 1000
            ),
            Self::BudgetExceeded {
                cumulative_cost,
                cap,
            } => write!(f, "cumulative cost {} reached cap {}", cumulative_cost, cap),
        }
    }
}

impl KpiSnapshot {
    /// Alerts that currently apply
    pub fn alerts(&self) -> Vec<KpiAlert> {
        let mut alerts = Vec::new();
        if self.counters.total_incidents > 0 && self.auto_resolve_rate < AUTO_RESOLVE_TARGET {
            alerts.push(KpiAlert::AutoResolveBelowTarget {
                rate: self.auto_resolve_rate,
                target: AUTO_RESOLVE_TARGET,
            });
        }
        let target_ms = MTTR_TARGET.as_millis() as u64;
        if self.mean_time_to_resolution_ms > target_ms as f64 {
            alerts.push(KpiAlert::ResolutionTooSlow {
                mttr_ms: self.mean_time_to_resolution_ms,
                target_ms,
            });
        }
        if !self.budget_healthy {
            alerts.push(KpiAlert::BudgetExceeded {
                cumulative_cost: self.counters.cumulative_cost,
                cap: self.daily_budget_cap.saturating_mul(BUDGET_WINDOW_DAYS),
            });
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_aggregate() {
        let s = KpiAggregate::default().snapshot(100);
        assert_eq!(s.auto_resolve_rate, 0.0);
        assert_eq!(s.mean_time_to_resolution_ms, 0.0);
        assert!(s.budget_healthy);
        assert!(s.alerts().is_empty());
    }

    #[test]
    fn test_derived_values() {
        let agg = KpiAggregate {
            total_incidents: 4,
            auto_resolved: 3,
            escalated: 1,
            cumulative_cost: 20,
            resolution_ms_total: 900,
            resolutions: 3,
        };
        let s = agg.snapshot(100);
        assert_eq!(s.auto_resolve_rate, 0.75);
        assert_eq!(s.mean_time_to_resolution_ms, 300.0);
        assert!(s.budget_healthy);
        assert_eq!(
            s.alerts(),
            vec![KpiAlert::AutoResolveBelowTarget {
                rate: 0.75,
                target: AUTO_RESOLVE_TARGET
            }]
        );
    }

    #[test]
    fn test_budget_boundary_is_exclusive() {
        let agg = KpiAggregate {
            cumulative_cost: 700,
            ..Default::default()
        };
        assert!(!agg.snapshot(100).budget_healthy);
        assert!(agg.snapshot(101).budget_healthy);
    }

    #[test]
    fn test_slow_resolution_alert() {
        let agg = KpiAggregate {
            total_incidents: 1,
            auto_resolved: 1,
            resolution_ms_total: 6 * 60 * 1000,
            resolutions: 1,
            ..Default::default()
        };
        let alerts = agg.snapshot(100).alerts();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(alerts[0], KpiAlert::ResolutionTooSlow { .. }));
        assert_eq!(alerts[0].to_string(), "MTTR 360.0s above 300s");
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let json = serde_json::to_value(KpiAggregate::default().snapshot(10)).unwrap();
        assert_eq!(json["totalIncidents"], 0);
        assert_eq!(json["autoResolveRate"], 0.0);
        assert_eq!(json["budgetHealthy"], true);
    }
}
