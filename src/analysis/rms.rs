// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Fixed 10-minute RMS window aggregation

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Thresholds;
use crate::meter::{Phase, Reading};

/// Aggregate of one fixed 10-minute wall-clock window
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RmsWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: usize,
    pub rms_v1: f64,
    pub rms_v2: f64,
    pub rms_v3: f64,
    pub oob_seconds_l1: u32,
    pub oob_seconds_l2: u32,
    pub oob_seconds_l3: u32,
    pub compliant_l1: bool,
    pub compliant_l2: bool,
    pub compliant_l3: bool,
}

impl RmsWindow {
    /// RMS voltage on the given phase
    pub fn rms(&self, phase: Phase) -> f64 {
        match phase {
            Phase::L1 => self.rms_v1,
            Phase::L2 => self.rms_v2,
            Phase::L3 => self.rms_v3,
        }
    }

    /// Out-of-bounds seconds on the given phase
    pub fn oob_seconds(&self, phase: Phase) -> u32 {
        match phase {
            Phase::L1 => self.oob_seconds_l1,
            Phase::L2 => self.oob_seconds_l2,
            Phase::L3 => self.oob_seconds_l3,
        }
    }

    /// Window compliance on the given phase
    pub fn compliant(&self, phase: Phase) -> bool {
        match phase {
            Phase::L1 => self.compliant_l1,
            Phase::L2 => self.compliant_l2,
            Phase::L3 => self.compliant_l3,
        }
    }
}

/// Floor a timestamp to the start of its 10-minute wall-clock slot
pub fn slot_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    Utc.timestamp_opt(secs - secs.rem_euclid(600), 0).unwrap()
}

/// Single-slot window buffer.
///
/// Holds the readings of the currently open 10-minute slot and emits the
/// completed window when a reading belonging to a later slot arrives.
/// Assumes in-order timestamps; a reading whose slot is strictly before the
/// open slot is folded into the open window and logged.
#[derive(Debug, Clone)]
pub struct RmsAggregator {
    thresholds: Thresholds,
    open_slot: Option<DateTime<Utc>>,
    buffer: Vec<Reading>,
}

impl RmsAggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            open_slot: None,
            buffer: Vec::with_capacity(64),
        }
    }

    /// Add a reading; returns the completed window when the slot advances.
    pub fn add(&mut self, reading: &Reading) -> Option<RmsWindow> {
        let slot = slot_start(reading.ts);

        match self.open_slot {
            None => {
                self.open_slot = Some(slot);
                self.buffer.push(*reading);
                None
            }
            Some(open) if slot == open => {
                self.buffer.push(*reading);
                None
            }
            Some(open) if slot < open => {
                // Out-of-contract input; fold into the open window rather
                // than losing the sample.
                warn!(
                    "out-of-order reading at {} folded into open window {}",
                    reading.ts, open
                );
                self.buffer.push(*reading);
                None
            }
            Some(open) => {
                let window = self.aggregate(open, &self.buffer);
                self.buffer.clear();
                self.buffer.push(*reading);
                self.open_slot = Some(slot);
                Some(window)
            }
        }
    }

    /// Aggregate and clear the open window, if any readings are buffered.
    pub fn flush(&mut self) -> Option<RmsWindow> {
        let open = self.open_slot?;
        if self.buffer.is_empty() {
            return None;
        }
        let window = self.aggregate(open, &self.buffer);
        self.buffer.clear();
        self.open_slot = None;
        Some(window)
    }

    /// Number of readings buffered in the open window
    pub fn open_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any open window without emitting it
    pub fn clear(&mut self) {
        self.open_slot = None;
        self.buffer.clear();
    }

    /// Aggregate a set of readings into the window starting at `slot`.
    ///
    /// With zero readings every phase reports 0 V RMS, a full window of
    /// out-of-bounds seconds and non-compliance.
    pub fn aggregate(&self, slot: DateTime<Utc>, readings: &[Reading]) -> RmsWindow {
        let window_seconds = self.thresholds.window_seconds();
        let n = readings.len();

        let mut rms = [0.0_f64; 3];
        let mut oob = [window_seconds; 3];
        for phase in Phase::ALL {
            let i = phase.index();
            if n > 0 {
                let sum_sq: f64 = readings.iter().map(|r| r.voltage(phase).powi(2)).sum();
                rms[i] = round3((sum_sq / n as f64).sqrt());

                let oob_count = readings
                    .iter()
                    .filter(|r| {
                        let v = r.voltage(phase);
                        v < self.thresholds.voltage_min || v > self.thresholds.voltage_max
                    })
                    .count() as u32;
                oob[i] = (oob_count * self.thresholds.poll_interval_seconds).min(window_seconds);
            }
        }

        let max_oob = self.thresholds.window_oob_max_seconds;
        RmsWindow {
            window_start: slot,
            window_end: slot + chrono::Duration::seconds(window_seconds as i64),
            sample_count: n,
            rms_v1: rms[0],
            rms_v2: rms[1],
            rms_v3: rms[2],
            oob_seconds_l1: oob[0],
            oob_seconds_l2: oob[1],
            oob_seconds_l3: oob[2],
            compliant_l1: oob[0] <= max_oob,
            compliant_l2: oob[1] <= max_oob,
            compliant_l3: oob[2] <= max_oob,
        }
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 30, 0).unwrap()
    }

    fn reading(ts: DateTime<Utc>, v: f64) -> Reading {
        Reading::new(ts, v, 230.0, 230.0)
    }

    fn aggregator() -> RmsAggregator {
        RmsAggregator::new(Thresholds::default())
    }

    #[test]
    fn slot_start_floors_to_ten_minutes() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 5, 12, 34, 56).unwrap();
        assert_eq!(slot_start(ts), Utc.with_ymd_and_hms(2026, 1, 5, 12, 30, 0).unwrap());

        let exact = Utc.with_ymd_and_hms(2026, 1, 5, 12, 40, 0).unwrap();
        assert_eq!(slot_start(exact), exact);

        let late = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap();
        assert_eq!(slot_start(late), Utc.with_ymd_and_hms(2026, 1, 5, 23, 50, 0).unwrap());
    }

    #[test]
    fn readings_in_same_slot_are_buffered() {
        let mut agg = aggregator();
        for i in 0..10 {
            let out = agg.add(&reading(base() + Duration::seconds(i * 10), 230.0));
            assert!(out.is_none());
        }
        assert_eq!(agg.open_len(), 10);
    }

    #[test]
    fn slot_advance_emits_completed_window() {
        let mut agg = aggregator();
        for i in 0..60 {
            assert!(agg.add(&reading(base() + Duration::seconds(i * 10), 230.0)).is_none());
        }

        let next = base() + Duration::minutes(10);
        let window = agg.add(&reading(next, 230.0)).expect("window should close");

        assert_eq!(window.window_start, base());
        assert_eq!(window.window_end, next);
        assert_eq!(window.window_end - window.window_start, Duration::seconds(600));
        assert_eq!(window.sample_count, 60);
        assert_eq!(window.rms_v1, 230.0);
        assert!(window.compliant_l1);
        // New window holds only the boundary-crossing reading
        assert_eq!(agg.open_len(), 1);
    }

    #[test]
    fn rms_is_root_mean_square_rounded_to_three_decimals() {
        let agg = aggregator();
        let readings = [reading(base(), 220.0), reading(base() + Duration::seconds(10), 240.0)];
        let window = agg.aggregate(base(), &readings);
        // sqrt((220^2 + 240^2) / 2) = 230.217...
        assert_eq!(window.rms_v1, 230.217);
    }

    #[test]
    fn window_compliance_boundary_at_thirty_seconds() {
        // 3 OOB readings x 10 s = 30 s, still compliant
        let mut agg = aggregator();
        for i in 0..60 {
            let v = if i < 3 { 250.0 } else { 230.0 };
            assert!(agg.add(&reading(base() + Duration::seconds(i * 10), v)).is_none());
        }
        let window = agg.add(&reading(base() + Duration::minutes(10), 230.0)).unwrap();
        assert_eq!(window.oob_seconds_l1, 30);
        assert!(window.compliant_l1);
        assert_eq!(window.oob_seconds_l2, 0);
        assert!(window.compliant_l2);

        // 4 OOB readings x 10 s = 40 s, not compliant
        let mut agg = aggregator();
        for i in 0..60 {
            let v = if i < 4 { 250.0 } else { 230.0 };
            assert!(agg.add(&reading(base() + Duration::seconds(i * 10), v)).is_none());
        }
        let window = agg.add(&reading(base() + Duration::minutes(10), 230.0)).unwrap();
        assert_eq!(window.oob_seconds_l1, 40);
        assert!(!window.compliant_l1);
    }

    #[test]
    fn flush_drains_open_window() {
        let mut agg = aggregator();
        assert!(agg.flush().is_none());

        agg.add(&reading(base(), 230.0));
        agg.add(&reading(base() + Duration::seconds(10), 230.0));

        let window = agg.flush().expect("open window should flush");
        assert_eq!(window.sample_count, 2);
        assert_eq!(window.window_start, base());
        assert!(agg.flush().is_none());
        assert_eq!(agg.open_len(), 0);
    }

    #[test]
    fn empty_aggregation_reports_full_outage() {
        let agg = aggregator();
        let window = agg.aggregate(base(), &[]);
        assert_eq!(window.sample_count, 0);
        assert_eq!(window.rms_v1, 0.0);
        assert_eq!(window.oob_seconds_l1, 600);
        assert!(!window.compliant_l1);
        assert!(!window.compliant_l2);
        assert!(!window.compliant_l3);
    }

    #[test]
    fn out_of_order_reading_folds_into_open_window() {
        let mut agg = aggregator();
        agg.add(&reading(base(), 230.0));

        // Strictly before the open slot
        let stale = reading(base() - Duration::minutes(15), 230.0);
        assert!(agg.add(&stale).is_none());
        assert_eq!(agg.open_len(), 2);

        let window = agg.add(&reading(base() + Duration::minutes(10), 230.0)).unwrap();
        assert_eq!(window.sample_count, 2);
        assert_eq!(window.window_start, base());
    }

    #[test]
    fn oob_seconds_clamped_to_window_length() {
        let agg = aggregator();
        // 70 samples all out of bounds would naively be 700 s
        let readings: Vec<Reading> = (0..70)
            .map(|i| reading(base() + Duration::seconds(i * 8), 250.0))
            .collect();
        let window = agg.aggregate(base(), &readings);
        assert_eq!(window.oob_seconds_l1, 600);
        assert!(!window.compliant_l1);
    }
}
