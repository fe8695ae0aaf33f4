//! Analysis module - phase classification, RMS windows, anomaly tracking,
//! weekly compliance

mod analyzer;
mod anomaly;
mod compliance;
mod rms;

pub use analyzer::{PhaseAnalysis, VoltageAnalyzer};
pub use anomaly::{ActiveAnomaly, Anomaly, AnomalyKind, AnomalyTracker, EpisodeKind, Severity};
pub use compliance::{evaluate as evaluate_compliance, week_start_of, WeeklyCompliance};
pub use rms::{slot_start, RmsAggregator, RmsWindow};
