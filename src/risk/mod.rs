//! Portfolio risk measurement, limits and alerting.

pub mod alerts;
pub mod correlation;
pub mod limits;
pub mod metrics;

pub use alerts::{AlertSeverity, AlertSink, AlertType, RiskAlert, RiskAlertManager};
pub use correlation::{CorrelationMatrix, DEFAULT_CORRELATION, MIN_CORRELATION_OBSERVATIONS};
pub use limits::{RiskLimits, VaRLimit};
pub use metrics::{DrawdownStats, RiskCalculator, TRADING_DAYS_PER_YEAR};
