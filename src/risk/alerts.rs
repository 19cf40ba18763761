//! Risk alert evaluation and notification.
//!
//! [`RiskAlertManager::evaluate`] compares a metrics snapshot against a
//! [`RiskLimits`] configuration and records a [`RiskAlert`] for every
//! breach. Evaluation never fails: a check that cannot be performed (for
//! example a VaR limit bound to a different horizon than the estimate) is
//! logged at warn level and skipped.
//!
//! Alerts are appended to an in-memory store and dispatched to registered
//! [`AlertSink`]s. The store is append-only apart from explicit
//! acknowledgment and age-based purging.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::risk::alerts::{AlertSeverity, RiskAlertManager, TracingAlertSink};
//!
//! let mut manager = RiskAlertManager::new();
//! manager.add_sink(Box::new(TracingAlertSink::new(AlertSeverity::Warning)));
//! assert_eq!(manager.unacknowledged_count(), 0);
//! ```

use crate::portfolio::position::AssetId;
use crate::risk::limits::RiskLimits;
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// VaR utilization at which a warning fires before the hard breach.
const VAR_WARNING_UTILIZATION: f64 = 0.8;

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AlertSeverity {
    /// Informational, no action required.
    Info,
    /// Should be monitored.
    Warning,
    /// Requires immediate attention.
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The condition that raised an alert.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AlertType {
    /// VaR at or above its configured ceiling, or approaching it.
    VarBreach {
        /// Current VaR estimate.
        value: f64,
        /// Configured ceiling.
        limit: f64,
        /// `value / limit`.
        utilization: f64,
    },
    /// A single position exceeds the concentration limit.
    ConcentrationLimit {
        /// The concentrated asset.
        asset: AssetId,
        /// Its portfolio weight.
        weight: f64,
        /// Configured maximum weight.
        limit: f64,
    },
    /// Drawdown exceeds the configured maximum.
    DrawdownAlert {
        /// Observed peak-to-trough drawdown.
        drawdown: f64,
        /// Configured maximum.
        limit: f64,
    },
    /// Gross leverage exceeds the configured maximum.
    LeverageLimit {
        /// Observed gross leverage.
        leverage: f64,
        /// Configured maximum.
        limit: f64,
    },
    /// A stress scenario loss exceeds its cap.
    StressTestFailure {
        /// Scenario name.
        scenario: String,
        /// Scenario loss.
        loss: f64,
        /// Configured cap.
        cap: f64,
    },
    /// The correlation matrix fell back to defaults for some pairs.
    LowConfidenceCorrelation,
    /// The embedded VaR backtest rejected the model.
    BacktestRejection {
        /// Observed violations.
        violations: usize,
        /// Expected violations.
        expected: f64,
    },
}

impl AlertType {
    /// Stable identifier for grouping alerts of the same kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VarBreach { .. } => "var_breach",
            Self::ConcentrationLimit { .. } => "concentration_limit",
            Self::DrawdownAlert { .. } => "drawdown",
            Self::LeverageLimit { .. } => "leverage_limit",
            Self::StressTestFailure { .. } => "stress_test_failure",
            Self::LowConfidenceCorrelation => "low_confidence_correlation",
            Self::BacktestRejection { .. } => "backtest_rejection",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::VarBreach {
                value,
                limit,
                utilization,
            } => format!(
                "VaR {:.2} at {:.0}% of limit {:.2}",
                value,
                utilization * 100.0,
                limit
            ),
            Self::ConcentrationLimit {
                asset,
                weight,
                limit,
            } => format!(
                "position {} weight {:.1}% exceeds limit {:.1}%",
                asset,
                weight * 100.0,
                limit * 100.0
            ),
            Self::DrawdownAlert { drawdown, limit } => format!(
                "drawdown {:.1}% exceeds limit {:.1}%",
                drawdown * 100.0,
                limit * 100.0
            ),
            Self::LeverageLimit { leverage, limit } => {
                format!("gross leverage {:.2}x exceeds limit {:.2}x", leverage, limit)
            }
            Self::StressTestFailure {
                scenario,
                loss,
                cap,
            } => format!(
                "stress scenario '{}' loss {:.2} exceeds cap {:.2}",
                scenario, loss, cap
            ),
            Self::LowConfidenceCorrelation => {
                "correlation matrix uses default values for some asset pairs".to_string()
            }
            Self::BacktestRejection {
                violations,
                expected,
            } => format!(
                "VaR backtest rejected: {} violations, {:.1} expected",
                violations, expected
            ),
        }
    }
}

/// A single recorded alert.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskAlert {
    /// Monotonically increasing identifier within one manager.
    pub id: u64,
    /// Evaluation timestamp in milliseconds.
    pub timestamp: u64,
    /// Severity.
    pub severity: AlertSeverity,
    /// Typed breach description.
    pub alert_type: AlertType,
    /// Human-readable message.
    pub message: String,
    /// Whether the alert has been acknowledged.
    pub acknowledged: bool,
}

impl fmt::Display for RiskAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.alert_type.kind(), self.message)
    }
}

/// Receives alerts as they are raised.
///
/// Implement for delivery channels beyond logging (chat webhooks, pager
/// services). Sinks must not panic; a sink failure is the sink's problem.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert.
    fn publish(&self, alert: &RiskAlert);

    /// Minimum severity this sink wants. Defaults to everything.
    fn min_severity(&self) -> AlertSeverity {
        AlertSeverity::Info
    }
}

/// Sink that forwards alerts to the `tracing` subscriber at a level
/// matching the alert severity.
#[derive(Debug, Clone, Copy)]
pub struct TracingAlertSink {
    min_severity: AlertSeverity,
}

impl TracingAlertSink {
    /// Creates a sink with a severity floor.
    #[must_use]
    pub fn new(min_severity: AlertSeverity) -> Self {
        Self { min_severity }
    }
}

impl Default for TracingAlertSink {
    fn default() -> Self {
        Self::new(AlertSeverity::Info)
    }
}

impl AlertSink for TracingAlertSink {
    fn publish(&self, alert: &RiskAlert) {
        match alert.severity {
            AlertSeverity::Info => info!(id = alert.id, kind = alert.alert_type.kind(), "{}", alert.message),
            AlertSeverity::Warning => warn!(id = alert.id, kind = alert.alert_type.kind(), "{}", alert.message),
            AlertSeverity::Critical => error!(id = alert.id, kind = alert.alert_type.kind(), "{}", alert.message),
        }
    }

    fn min_severity(&self) -> AlertSeverity {
        self.min_severity
    }
}

/// Sink that collects alerts into a vector, for tests.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: Mutex<Vec<RiskAlert>>,
}

impl CollectingAlertSink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected alerts so far.
    #[must_use]
    pub fn alerts(&self) -> Vec<RiskAlert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Number of collected alerts.
    #[must_use]
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertSink for CollectingAlertSink {
    fn publish(&self, alert: &RiskAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

/// Evaluates metrics snapshots against limits and stores the alerts.
pub struct RiskAlertManager {
    alerts: Vec<RiskAlert>,
    sinks: Vec<Box<dyn AlertSink>>,
    next_id: u64,
}

impl Default for RiskAlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RiskAlertManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskAlertManager")
            .field("alerts", &self.alerts.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl RiskAlertManager {
    /// Creates a manager with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alerts: Vec::new(),
            sinks: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a delivery sink.
    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    /// Evaluates a metrics snapshot against the limits and records an alert
    /// per breach. Returns the newly raised alerts.
    ///
    /// Never fails: checks that cannot be performed are logged and skipped.
    pub fn evaluate(
        &mut self,
        metrics: &crate::engine::RiskMetrics,
        limits: &RiskLimits,
    ) -> Vec<RiskAlert> {
        let mut raised = Vec::new();

        if let Some(var_limit) = limits.max_var {
            match limits.var_utilization(
                metrics.var.value,
                metrics.var.confidence,
                metrics.var.horizon_days,
            ) {
                Some(utilization) if utilization >= 1.0 => {
                    raised.push(self.raise(
                        metrics.timestamp,
                        AlertSeverity::Critical,
                        AlertType::VarBreach {
                            value: metrics.var.value,
                            limit: var_limit.max_value,
                            utilization,
                        },
                    ));
                }
                Some(utilization) if utilization >= VAR_WARNING_UTILIZATION => {
                    raised.push(self.raise(
                        metrics.timestamp,
                        AlertSeverity::Warning,
                        AlertType::VarBreach {
                            value: metrics.var.value,
                            limit: var_limit.max_value,
                            utilization,
                        },
                    ));
                }
                Some(_) => {}
                None => {
                    warn!(
                        limit_confidence = var_limit.confidence,
                        limit_horizon = var_limit.horizon_days,
                        estimate_confidence = metrics.var.confidence,
                        estimate_horizon = metrics.var.horizon_days,
                        "VaR limit parameters do not match the estimate, check skipped"
                    );
                }
            }
        }

        if let Some(max_concentration) = limits.max_concentration {
            for (asset, weight) in &metrics.concentrations {
                if *weight > max_concentration {
                    raised.push(self.raise(
                        metrics.timestamp,
                        AlertSeverity::Warning,
                        AlertType::ConcentrationLimit {
                            asset: asset.clone(),
                            weight: *weight,
                            limit: max_concentration,
                        },
                    ));
                }
            }
        }

        if let Some(max_drawdown) = limits.max_drawdown {
            if metrics.max_drawdown > max_drawdown {
                raised.push(self.raise(
                    metrics.timestamp,
                    AlertSeverity::Warning,
                    AlertType::DrawdownAlert {
                        drawdown: metrics.max_drawdown,
                        limit: max_drawdown,
                    },
                ));
            }
        }

        if let Some(max_leverage) = limits.max_leverage {
            if metrics.leverage > max_leverage {
                raised.push(self.raise(
                    metrics.timestamp,
                    AlertSeverity::Warning,
                    AlertType::LeverageLimit {
                        leverage: metrics.leverage,
                        limit: max_leverage,
                    },
                ));
            }
        }

        for result in &metrics.stress_results {
            if let Some(cap) = limits.stress_cap(&result.scenario) {
                if result.loss > cap {
                    raised.push(self.raise(
                        metrics.timestamp,
                        AlertSeverity::Critical,
                        AlertType::StressTestFailure {
                            scenario: result.scenario.clone(),
                            loss: result.loss,
                            cap,
                        },
                    ));
                }
            }
        }

        if metrics.correlation_low_confidence {
            raised.push(self.raise(
                metrics.timestamp,
                AlertSeverity::Info,
                AlertType::LowConfidenceCorrelation,
            ));
        }

        if let Some(backtest) = &metrics.var.backtest {
            if backtest.any_rejection() {
                raised.push(self.raise(
                    metrics.timestamp,
                    AlertSeverity::Warning,
                    AlertType::BacktestRejection {
                        violations: backtest.violations,
                        expected: backtest.expected_violations,
                    },
                ));
            }
        }

        raised
    }

    /// Records and dispatches a single alert.
    pub fn raise(
        &mut self,
        timestamp: u64,
        severity: AlertSeverity,
        alert_type: AlertType,
    ) -> RiskAlert {
        let alert = RiskAlert {
            id: self.next_id,
            timestamp,
            severity,
            message: alert_type.message(),
            alert_type,
            acknowledged: false,
        };
        self.next_id += 1;

        for sink in &self.sinks {
            if severity >= sink.min_severity() {
                sink.publish(&alert);
            }
        }

        self.alerts.push(alert.clone());
        alert
    }

    /// All stored alerts, oldest first.
    #[must_use]
    pub fn alerts(&self) -> &[RiskAlert] {
        &self.alerts
    }

    /// Alerts not yet acknowledged.
    #[must_use]
    pub fn unacknowledged(&self) -> Vec<&RiskAlert> {
        self.alerts.iter().filter(|a| !a.acknowledged).collect()
    }

    /// Number of unacknowledged alerts.
    #[must_use]
    pub fn unacknowledged_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    /// Acknowledges an alert by id. Returns false when no such alert exists.
    pub fn acknowledge(&mut self, id: u64) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Acknowledges every stored alert.
    pub fn acknowledge_all(&mut self) {
        for alert in &mut self.alerts {
            alert.acknowledged = true;
        }
    }

    /// Drops alerts older than `cutoff` (milliseconds).
    pub fn purge_older_than(&mut self, cutoff: u64) {
        self.alerts.retain(|a| a.timestamp >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RiskMetrics;
    use crate::var::{VaRMethod, VaRResult};
    use std::sync::Arc;

    fn metrics_with_var(value: f64) -> RiskMetrics {
        RiskMetrics {
            timestamp: 1_000,
            total_value: 100_000.0,
            volatility: 0.01,
            beta: 1.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            max_drawdown: 0.05,
            current_drawdown: 0.01,
            leverage: 1.0,
            concentrations: vec![(AssetId::new("A"), 0.6), (AssetId::new("B"), 0.4)],
            correlation_low_confidence: false,
            var: VaRResult {
                confidence: 0.95,
                horizon_days: 1,
                method: VaRMethod::Parametric,
                value,
                percentage: value / 100_000.0,
                backtest: None,
            },
            expected_shortfall: None,
            component_var: None,
            stress_results: Vec::new(),
        }
    }

    #[test]
    fn test_no_limits_no_alerts() {
        let mut manager = RiskAlertManager::new();
        let raised = manager.evaluate(&metrics_with_var(50_000.0), &RiskLimits::none());
        assert!(raised.is_empty());
        assert_eq!(manager.unacknowledged_count(), 0);
    }

    #[test]
    fn test_var_breach_is_critical() {
        let limits = RiskLimits::none().with_max_var(10_000.0, 0.95, 1).unwrap();
        let mut manager = RiskAlertManager::new();

        let raised = manager.evaluate(&metrics_with_var(12_000.0), &limits);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::Critical);
        assert_eq!(raised[0].alert_type.kind(), "var_breach");
    }

    #[test]
    fn test_var_approaching_is_warning() {
        let limits = RiskLimits::none().with_max_var(10_000.0, 0.95, 1).unwrap();
        let mut manager = RiskAlertManager::new();

        let raised = manager.evaluate(&metrics_with_var(8_500.0), &limits);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::Warning);

        let quiet = manager.evaluate(&metrics_with_var(5_000.0), &limits);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_mismatched_var_limit_skipped_not_errored() {
        // Limit set for a 10-day horizon, estimate is 1-day: skipped.
        let limits = RiskLimits::none().with_max_var(10_000.0, 0.95, 10).unwrap();
        let mut manager = RiskAlertManager::new();

        let raised = manager.evaluate(&metrics_with_var(50_000.0), &limits);
        assert!(raised.is_empty());
    }

    #[test]
    fn test_concentration_alert_per_asset() {
        let limits = RiskLimits::none().with_max_concentration(0.5).unwrap();
        let mut manager = RiskAlertManager::new();

        let raised = manager.evaluate(&metrics_with_var(0.0), &limits);
        assert_eq!(raised.len(), 1);
        match &raised[0].alert_type {
            AlertType::ConcentrationLimit { asset, weight, .. } => {
                assert_eq!(asset.as_str(), "A");
                assert!((weight - 0.6).abs() < 1e-12);
            }
            other => panic!("unexpected alert: {:?}", other),
        }
    }

    #[test]
    fn test_drawdown_and_leverage_alerts() {
        let limits = RiskLimits::none()
            .with_max_drawdown(0.03)
            .unwrap()
            .with_max_leverage(0.5)
            .unwrap();
        let mut manager = RiskAlertManager::new();

        let raised = manager.evaluate(&metrics_with_var(0.0), &limits);
        let kinds: Vec<&str> = raised.iter().map(|a| a.alert_type.kind()).collect();
        assert!(kinds.contains(&"drawdown"));
        assert!(kinds.contains(&"leverage_limit"));
    }

    #[test]
    fn test_stress_cap_breach() {
        use crate::stress::StressTestResult;

        let limits = RiskLimits::none()
            .with_stress_loss_cap("crash", 1_000.0)
            .unwrap();
        let mut metrics = metrics_with_var(0.0);
        metrics.stress_results.push(StressTestResult {
            scenario: "crash".to_string(),
            initial_value: 100_000.0,
            stressed_value: 95_000.0,
            loss: 5_000.0,
            loss_pct: 0.05,
            position_impacts: Vec::new(),
            stressed_var: None,
        });

        let mut manager = RiskAlertManager::new();
        let raised = manager.evaluate(&metrics, &limits);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_low_confidence_correlation_info() {
        let mut metrics = metrics_with_var(0.0);
        metrics.correlation_low_confidence = true;

        let mut manager = RiskAlertManager::new();
        let raised = manager.evaluate(&metrics, &RiskLimits::none());
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::Info);
    }

    #[test]
    fn test_acknowledge_and_purge() {
        let limits = RiskLimits::none().with_max_var(10_000.0, 0.95, 1).unwrap();
        let mut manager = RiskAlertManager::new();
        manager.evaluate(&metrics_with_var(12_000.0), &limits);

        let id = manager.alerts()[0].id;
        assert!(manager.acknowledge(id));
        assert!(!manager.acknowledge(9_999));
        assert_eq!(manager.unacknowledged_count(), 0);

        manager.purge_older_than(2_000);
        assert!(manager.alerts().is_empty());
    }

    #[test]
    fn test_sink_severity_filter() {
        struct SharedSink(Arc<CollectingAlertSink>);
        impl AlertSink for SharedSink {
            fn publish(&self, alert: &RiskAlert) {
                self.0.publish(alert);
            }
            fn min_severity(&self) -> AlertSeverity {
                AlertSeverity::Critical
            }
        }

        let collector = Arc::new(CollectingAlertSink::new());
        let mut manager = RiskAlertManager::new();
        manager.add_sink(Box::new(SharedSink(Arc::clone(&collector))));

        manager.raise(1, AlertSeverity::Info, AlertType::LowConfidenceCorrelation);
        manager.raise(
            2,
            AlertSeverity::Critical,
            AlertType::VarBreach {
                value: 11.0,
                limit: 10.0,
                utilization: 1.1,
            },
        );

        // Both stored, only the critical one delivered.
        assert_eq!(manager.alerts().len(), 2);
        assert_eq!(collector.count(), 1);
    }
}
