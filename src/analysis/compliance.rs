// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Weekly compliance evaluation against the ESO 95 % rule

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::rms::RmsWindow;
use crate::config::Thresholds;
use crate::meter::Phase;

/// Weekly compliance verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeeklyCompliance {
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_windows: usize,
    pub compliant_windows_l1: usize,
    pub compliant_windows_l2: usize,
    pub compliant_windows_l3: usize,
    pub compliance_pct_l1: f64,
    pub compliance_pct_l2: f64,
    pub compliance_pct_l3: f64,
    pub overall_compliant: bool,
}

/// Monday 00:00 UTC of the week containing `date`.
///
/// Compliance weeks are defined in UTC so the verdict does not depend on
/// server timezone configuration.
pub fn week_start_of(date: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    let monday = date.date_naive() - Duration::days(days_from_monday);
    Utc.from_utc_datetime(&monday.and_hms_opt(0, 0, 0).unwrap())
}

/// Evaluate a set of windows against the weekly 95 % rule.
///
/// Pure: callers select the windows belonging to the week. With zero windows
/// every percentage is 0 and the verdict is non-compliant.
pub fn evaluate(thresholds: &Thresholds, windows: &[RmsWindow], week_start: DateTime<Utc>) -> WeeklyCompliance {
    let total = windows.len();

    let mut compliant = [0usize; 3];
    for window in windows {
        for phase in Phase::ALL {
            if window.compliant(phase) {
                compliant[phase.index()] += 1;
            }
        }
    }

    let pct = |count: usize| -> f64 {
        if total == 0 {
            0.0
        } else {
            round2(count as f64 / total as f64 * 100.0)
        }
    };

    let pct_l1 = pct(compliant[0]);
    let pct_l2 = pct(compliant[1]);
    let pct_l3 = pct(compliant[2]);
    let min_pct = thresholds.weekly_compliance_pct;

    WeeklyCompliance {
        week_start,
        week_end: week_start + Duration::days(7),
        total_windows: total,
        compliant_windows_l1: compliant[0],
        compliant_windows_l2: compliant[1],
        compliant_windows_l3: compliant[2],
        compliance_pct_l1: pct_l1,
        compliance_pct_l2: pct_l2,
        compliance_pct_l3: pct_l3,
        overall_compliant: total > 0 && pct_l1 >= min_pct && pct_l2 >= min_pct && pct_l3 >= min_pct,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
