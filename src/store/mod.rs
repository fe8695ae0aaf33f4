// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! In-memory state store - owns the ring buffers and the live analytics
//! pipeline, coordinates them on each incoming reading, and serves all read
//! queries

mod ring;

pub use ring::RingBuffer;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::analysis::{
    evaluate_compliance, week_start_of, ActiveAnomaly, Anomaly, AnomalyKind, AnomalyTracker,
    EpisodeKind, RmsAggregator, RmsWindow, WeeklyCompliance,
};
use crate::config::{StoreConfig, Thresholds};
use crate::meter::{Phase, Reading};

/// Wall-clock source, injectable for deterministic tests
pub type Clock = fn() -> DateTime<Utc>;

/// Everything produced by one `push`
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub anomalies: Vec<Anomaly>,
    pub completed_window: Option<RmsWindow>,
}

/// Store counters snapshot
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub total_readings: usize,
    pub total_windows: usize,
    pub total_anomalies: usize,
    pub active_anomalies: usize,
}

/// Conjunctive anomaly query filter
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyFilter {
    pub episode: Option<EpisodeKind>,
    pub phase: Option<Phase>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Process-wide analytics state.
///
/// Single writer (the poller) drives `push`; readers take whole-query
/// snapshots under the owning lock. All buffers are bounded: eldest entries
/// are dropped on overflow, so memory stays flat however long the process
/// runs.
pub struct StateStore {
    thresholds: Thresholds,
    readings: RingBuffer<Reading>,
    windows: RingBuffer<RmsWindow>,
    anomalies: RingBuffer<Anomaly>,
    tracker: AnomalyTracker,
    aggregator: RmsAggregator,
    now: Clock,
}

impl StateStore {
    pub fn new(thresholds: Thresholds, config: &StoreConfig) -> Self {
        Self::with_clock(thresholds, config, Utc::now)
    }

    /// Create a store with an explicit clock (tests pin week boundaries)
    pub fn with_clock(thresholds: Thresholds, config: &StoreConfig, now: Clock) -> Self {
        Self {
            thresholds: thresholds.clone(),
            readings: RingBuffer::new(config.reading_capacity),
            windows: RingBuffer::new(config.window_capacity),
            anomalies: RingBuffer::new(config.anomaly_capacity),
            tracker: AnomalyTracker::new(thresholds.clone()),
            aggregator: RmsAggregator::new(thresholds),
            now,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Ingest one reading: run the anomaly tracker, then the window
    /// aggregator, and record everything produced.
    pub fn push(&mut self, reading: Reading) -> PushOutcome {
        self.readings.push(reading);

        let anomalies = self.tracker.process(&reading);
        for anomaly in &anomalies {
            self.anomalies.push(*anomaly);
        }

        let completed_window = self.aggregator.add(&reading);
        if let Some(window) = completed_window {
            self.windows.push(window);
        }

        PushOutcome {
            anomalies,
            completed_window,
        }
    }

    /// Most recent reading
    pub fn latest(&self) -> Option<Reading> {
        self.readings.back().copied()
    }

    /// Readings within the inclusive time range
    pub fn readings(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Reading> {
        self.readings
            .iter()
            .filter(|r| from.map_or(true, |f| r.ts >= f) && to.map_or(true, |t| r.ts <= t))
            .copied()
            .collect()
    }

    /// Range query with index-based downsampling.
    ///
    /// Returns at most `max_points + 1` readings: evenly spaced picks plus
    /// the final reading of the range when not already included.
    pub fn readings_downsampled(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_points: usize,
    ) -> Vec<Reading> {
        let filtered = self.readings(Some(from), Some(to));
        let n = filtered.len();
        if n <= max_points || max_points == 0 {
            return filtered;
        }

        let step = n as f64 / max_points as f64;
        let mut picked: Vec<Reading> = (0..max_points)
            .map(|i| filtered[(i as f64 * step) as usize])
            .collect();

        let last_idx = ((max_points - 1) as f64 * step) as usize;
        if last_idx != n - 1 {
            picked.push(filtered[n - 1]);
        }
        picked
    }

    /// Windows fully inside the inclusive range
    pub fn windows(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<RmsWindow> {
        self.windows
            .iter()
            .filter(|w| {
                from.map_or(true, |f| w.window_start >= f) && to.map_or(true, |t| w.window_end <= t)
            })
            .copied()
            .collect()
    }

    /// Anomalies matching every set filter field, eldest first.
    /// Time bounds compare against `started_at`.
    pub fn anomalies(&self, filter: &AnomalyFilter) -> Vec<Anomaly> {
        self.anomalies
            .iter()
            .filter(|a| {
                filter.episode.map_or(true, |e| episode_matches(e, a.kind))
                    && filter.phase.map_or(true, |p| a.phase == p)
                    && filter.from.map_or(true, |f| a.started_at >= f)
                    && filter.to.map_or(true, |t| a.started_at <= t)
            })
            .copied()
            .collect()
    }

    /// Ongoing episodes of the anomaly tracker
    pub fn active_anomalies(&self) -> Vec<ActiveAnomaly> {
        self.tracker.active()
    }

    /// Weekly verdict for the UTC week containing `date` (default: now)
    pub fn weekly_compliance(&self, date: Option<DateTime<Utc>>) -> WeeklyCompliance {
        let week_start = week_start_of(date.unwrap_or_else(self.now));
        let week_end = week_start + Duration::days(7);
        let windows: Vec<RmsWindow> = self
            .windows
            .iter()
            .filter(|w| w.window_start >= week_start && w.window_start < week_end)
            .copied()
            .collect();
        evaluate_compliance(&self.thresholds, &windows, week_start)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_readings: self.readings.len(),
            total_windows: self.windows.len(),
            total_anomalies: self.anomalies.len(),
            active_anomalies: self.tracker.active().len(),
        }
    }

    /// Empty every buffer and reset the pipeline. Test use only.
    pub fn reset(&mut self) {
        self.readings.clear();
        self.windows.clear();
        self.anomalies.clear();
        self.tracker.reset();
        self.aggregator.clear();
    }
}

fn episode_matches(episode: EpisodeKind, kind: AnomalyKind) -> bool {
    match episode {
        EpisodeKind::Interruption => matches!(
            kind,
            AnomalyKind::LongInterruption | AnomalyKind::ShortInterruption
        ),
        EpisodeKind::Deviation => kind == AnomalyKind::VoltageDeviation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        // Monday
        Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()
    }

    fn pinned_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap()
    }

    fn store() -> StateStore {
        StateStore::with_clock(Thresholds::default(), &StoreConfig::default(), pinned_now)
    }

    fn small_store() -> StateStore {
        let config = StoreConfig {
            reading_capacity: 5,
            window_capacity: 3,
            anomaly_capacity: 4,
        };
        StateStore::with_clock(Thresholds::default(), &config, pinned_now)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        base() + Duration::seconds(secs)
    }

    fn push_l1(s: &mut StateStore, secs: i64, v: f64) -> PushOutcome {
        s.push(Reading::new(at(secs), v, 230.0, 230.0))
    }

    #[test]
    fn push_records_reading_and_overwrites_latest() {
        let mut s = store();
        assert!(s.latest().is_none());

        push_l1(&mut s, 0, 230.0);
        push_l1(&mut s, 10, 231.0);
        assert_eq!(s.latest().unwrap().v1, 231.0);
        assert_eq!(s.stats().total_readings, 2);
    }

    #[test]
    fn push_runs_tracker_and_aggregator() {
        let mut s = store();

        let out = push_l1(&mut s, 0, 250.0);
        assert_eq!(out.anomalies.len(), 1);
        assert!(out.completed_window.is_none());

        // Crossing the slot boundary closes the first window
        let out = push_l1(&mut s, 600, 230.0);
        let window = out.completed_window.expect("window should close");
        assert_eq!(window.sample_count, 1);
        assert_eq!(window.rms_v1, 250.0);
        assert_eq!(window.oob_seconds_l1, 10);

        assert_eq!(s.stats().total_windows, 1);
        assert_eq!(s.stats().total_anomalies, 2); // deviation open + close
    }

    #[test]
    fn ring_capacities_are_never_exceeded() {
        let mut s = small_store();
        for i in 0..50 {
            // Alternate envelope violations to generate plenty of anomalies
            let v = if i % 2 == 0 { 250.0 } else { 230.0 };
            push_l1(&mut s, i * 60, v);
        }
        let stats = s.stats();
        assert!(stats.total_readings <= 5);
        assert!(stats.total_windows <= 3);
        assert!(stats.total_anomalies <= 4);
        // Latest reading survives eviction
        assert_eq!(s.latest().unwrap().ts, at(49 * 60));
    }

    #[test]
    fn readings_range_filter_is_inclusive() {
        let mut s = store();
        for i in 0..10 {
            push_l1(&mut s, i * 10, 230.0);
        }

        let all = s.readings(None, None);
        assert_eq!(all.len(), 10);

        let slice = s.readings(Some(at(20)), Some(at(50)));
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.first().unwrap().ts, at(20));
        assert_eq!(slice.last().unwrap().ts, at(50));
    }

    #[test]
    fn downsampling_bounds_and_final_point() {
        let mut s = store();
        for i in 0..100 {
            push_l1(&mut s, i, 230.0);
        }

        // Under the cap: returned as-is
        let few = s.readings_downsampled(at(0), at(9), 500);
        assert_eq!(few.len(), 10);

        // Over the cap: at most max_points + 1, final point included
        let picked = s.readings_downsampled(at(0), at(99), 7);
        assert!(picked.len() <= 8);
        assert_eq!(picked.first().unwrap().ts, at(0));
        assert_eq!(picked.last().unwrap().ts, at(99));

        // Monotonic timestamps preserved
        for pair in picked.windows(2) {
            assert!(pair[0].ts < pair[1].ts);
        }
    }

    #[test]
    fn window_query_requires_full_containment() {
        let mut s = store();
        for i in 0..180 {
            push_l1(&mut s, i * 10, 230.0);
        }
        // 1800 s pushed: two complete windows closed, third open
        assert_eq!(s.stats().total_windows, 2);

        let all = s.windows(None, None);
        assert_eq!(all.len(), 2);

        // window_end must be <= to
        let cut = s.windows(Some(at(0)), Some(at(700)));
        assert_eq!(cut.len(), 1);
        assert_eq!(cut[0].window_start, at(0));
    }

    #[test]
    fn anomaly_filter_is_conjunctive() {
        let mut s = store();
        push_l1(&mut s, 0, 250.0); // L1 deviation opens
        push_l1(&mut s, 10, 230.0); // L1 deviation closes
        s.push(Reading::new(at(20), 230.0, 0.0, 230.0)); // L2 interruption begins
        s.push(Reading::new(at(30), 230.0, 230.0, 230.0)); // L2 interruption ends

        assert_eq!(s.anomalies(&AnomalyFilter::default()).len(), 3);

        let interruptions = s.anomalies(&AnomalyFilter {
            episode: Some(EpisodeKind::Interruption),
            ..Default::default()
        });
        assert_eq!(interruptions.len(), 1);
        assert_eq!(interruptions[0].phase, Phase::L2);

        let l1_deviations = s.anomalies(&AnomalyFilter {
            episode: Some(EpisodeKind::Deviation),
            phase: Some(Phase::L1),
            ..Default::default()
        });
        assert_eq!(l1_deviations.len(), 2);

        let late = s.anomalies(&AnomalyFilter {
            from: Some(at(15)),
            ..Default::default()
        });
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].started_at, at(20));
    }

    #[test]
    fn weekly_compliance_uses_injected_clock() {
        let mut s = store();
        // Fill six windows inside the pinned week, all compliant
        for i in 0..(6 * 60 + 1) {
            push_l1(&mut s, i * 10, 230.0);
        }

        let report = s.weekly_compliance(None);
        assert_eq!(report.week_start, base());
        assert_eq!(report.total_windows, 6);
        assert_eq!(report.compliance_pct_l1, 100.0);
        assert!(report.overall_compliant);

        // A date in a different week sees no windows
        let other = s.weekly_compliance(Some(base() - Duration::days(7)));
        assert_eq!(other.total_windows, 0);
        assert!(!other.overall_compliant);
    }

    #[test]
    fn active_anomalies_reflect_tracker_state() {
        let mut s = store();
        push_l1(&mut s, 0, 0.0);
        let active = s.active_anomalies();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].phase, Phase::L1);
        assert_eq!(s.stats().active_anomalies, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = store();
        push_l1(&mut s, 0, 0.0);
        push_l1(&mut s, 10, 250.0);
        s.reset();

        let stats = s.stats();
        assert_eq!(stats.total_readings, 0);
        assert_eq!(stats.total_windows, 0);
        assert_eq!(stats.total_anomalies, 0);
        assert_eq!(stats.active_anomalies, 0);
        assert!(s.latest().is_none());
    }
}
