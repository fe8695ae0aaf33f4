//! Per-reading phase analysis against the fixed voltage envelope

use serde::Serialize;

use crate::config::Thresholds;
use crate::meter::{Phase, Reading};

/// Classification of a single phase voltage against the envelope
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseAnalysis {
    pub phase: Phase,
    pub voltage: f64,
    pub nominal: f64,
    pub min: f64,
    pub max: f64,
    /// Signed distance from nominal
    pub deviation: f64,
    pub in_bounds: bool,
    pub is_zero: bool,
}

/// Pure per-reading classifier
#[derive(Debug, Clone)]
pub struct VoltageAnalyzer {
    thresholds: Thresholds,
}

impl VoltageAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Envelope test, bounds inclusive
    pub fn in_bounds(&self, v: f64) -> bool {
        v >= self.thresholds.voltage_min && v <= self.thresholds.voltage_max
    }

    /// Loss-of-supply test
    pub fn is_zero(&self, v: f64) -> bool {
        v < self.thresholds.voltage_zero_threshold
    }

    /// Classify one phase voltage
    pub fn analyse(&self, v: f64, phase: Phase) -> PhaseAnalysis {
        PhaseAnalysis {
            phase,
            voltage: v,
            nominal: self.thresholds.nominal_voltage,
            min: self.thresholds.voltage_min,
            max: self.thresholds.voltage_max,
            deviation: v - self.thresholds.nominal_voltage,
            in_bounds: self.in_bounds(v),
            is_zero: self.is_zero(v),
        }
    }

    /// Classify all three phases of a reading, in L1, L2, L3 order
    pub fn analyse_reading(&self, reading: &Reading) -> [PhaseAnalysis; 3] {
        [
            self.analyse(reading.v1, Phase::L1),
            self.analyse(reading.v2, Phase::L2),
            self.analyse(reading.v3, Phase::L3),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn analyzer() -> VoltageAnalyzer {
        VoltageAnalyzer::new(Thresholds::default())
    }

    #[test]
    fn envelope_bounds_are_inclusive() {
        let a = analyzer();
        assert!(a.in_bounds(220.0));
        assert!(a.in_bounds(240.0));
        assert!(a.in_bounds(230.0));
        assert!(!a.in_bounds(219.999));
        assert!(!a.in_bounds(240.001));
    }

    #[test]
    fn zero_threshold_is_exclusive_at_ten_volts() {
        let a = analyzer();
        assert!(a.is_zero(9.999));
        assert!(a.is_zero(0.0));
        assert!(!a.is_zero(10.0));
        assert!(!a.is_zero(230.0));
    }

    #[test]
    fn analyse_computes_deviation_from_nominal() {
        let a = analyzer();
        let pa = a.analyse(245.5, Phase::L2);
        assert_eq!(pa.phase, Phase::L2);
        assert_eq!(pa.voltage, 245.5);
        assert_eq!(pa.nominal, 230.0);
        assert!((pa.deviation - 15.5).abs() < 1e-9);
        assert!(!pa.in_bounds);
        assert!(!pa.is_zero);
    }

    #[test]
    fn analyse_reading_keeps_phase_order() {
        let a = analyzer();
        let ts = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let phases = a.analyse_reading(&Reading::new(ts, 230.0, 5.0, 250.0));
        assert_eq!(phases[0].phase, Phase::L1);
        assert_eq!(phases[1].phase, Phase::L2);
        assert_eq!(phases[2].phase, Phase::L3);
        assert!(phases[0].in_bounds);
        assert!(phases[1].is_zero);
        assert!(!phases[2].in_bounds && !phases[2].is_zero);
    }
}
