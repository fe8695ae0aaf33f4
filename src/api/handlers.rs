//! Request handlers for the voltage API

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::analysis::{ActiveAnomaly, Anomaly, EpisodeKind, PhaseAnalysis, RmsWindow, WeeklyCompliance};
use crate::meter::{Phase, Reading};
use crate::store::AnomalyFilter;

/// Default number of points on the raw history endpoint
const DEFAULT_POINTS: usize = 500;
/// Hard cap on requested history points
const MAX_POINTS: usize = 5_000;
/// Default anomaly list length
const DEFAULT_ANOMALY_LIMIT: usize = 100;
/// Hard cap on the anomaly list length
const MAX_ANOMALY_LIMIT: usize = 1_000;

/// Envelope constants echoed in responses
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bounds {
    pub nominal: f64,
    pub min: f64,
    pub max: f64,
}

/// Parse an ISO-8601 timestamp or plain date. Dates are parsed loosely per
/// the API contract: garbage never fails the request, it just yields nothing.
fn parse_opt(input: Option<&str>) -> Option<DateTime<Utc>> {
    let s = input?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    s.parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Loose parse with a caller-supplied default
fn parse_loose(input: Option<&str>, default: DateTime<Utc>) -> DateTime<Utc> {
    parse_opt(input).unwrap_or(default)
}

// --- GET /api/voltage/latest ---

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub timestamp: DateTime<Utc>,
    pub phases: [PhaseAnalysis; 3],
    pub bounds: Bounds,
}

pub async fn latest(State(state): State<AppState>) -> ApiResult<Json<LatestResponse>> {
    let store = state.store.read().await;
    let reading = store.latest().ok_or(ApiError::NoData)?;

    Ok(Json(LatestResponse {
        timestamp: reading.ts,
        phases: state.analyzer.analyse_reading(&reading),
        bounds: state.bounds(),
    }))
}

// --- GET /api/voltage/history ---

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub points: Option<usize>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RawPoint {
    pub timestamp: DateTime<Utc>,
    pub voltage_l1: f64,
    pub voltage_l2: f64,
    pub voltage_l3: f64,
}

impl From<Reading> for RawPoint {
    fn from(r: Reading) -> Self {
        Self {
            timestamp: r.ts,
            voltage_l1: r.v1,
            voltage_l2: r.v2,
            voltage_l3: r.v3,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WindowPoint {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: usize,
    pub voltage_l1: f64,
    pub voltage_l2: f64,
    pub voltage_l3: f64,
    pub oob_seconds_l1: u32,
    pub oob_seconds_l2: u32,
    pub oob_seconds_l3: u32,
    pub compliant_l1: bool,
    pub compliant_l2: bool,
    pub compliant_l3: bool,
}

impl From<RmsWindow> for WindowPoint {
    fn from(w: RmsWindow) -> Self {
        Self {
            window_start: w.window_start,
            window_end: w.window_end,
            sample_count: w.sample_count,
            voltage_l1: w.rms_v1,
            voltage_l2: w.rms_v2,
            voltage_l3: w.rms_v3,
            oob_seconds_l1: w.oob_seconds_l1,
            oob_seconds_l2: w.oob_seconds_l2,
            oob_seconds_l3: w.oob_seconds_l3,
            compliant_l1: w.compliant_l1,
            compliant_l2: w.compliant_l2,
            compliant_l3: w.compliant_l3,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HistoryData {
    Raw(Vec<RawPoint>),
    Windows(Vec<WindowPoint>),
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub interval: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub count: usize,
    pub data: HistoryData,
    pub bounds: Bounds,
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let now = Utc::now();
    let from = parse_loose(params.from.as_deref(), now - Duration::hours(24));
    let to = parse_loose(params.to.as_deref(), now);
    if from >= to {
        return Err(ApiError::InvalidRange);
    }

    let interval = params.interval.as_deref().unwrap_or("raw");
    let points = params.points.unwrap_or(DEFAULT_POINTS).clamp(1, MAX_POINTS);

    let store = state.store.read().await;
    let (count, data) = match interval {
        "raw" => {
            let readings = store.readings_downsampled(from, to, points);
            (
                readings.len(),
                HistoryData::Raw(readings.into_iter().map(RawPoint::from).collect()),
            )
        }
        "10min" => {
            let windows = store.windows(Some(from), Some(to));
            (
                windows.len(),
                HistoryData::Windows(windows.into_iter().map(WindowPoint::from).collect()),
            )
        }
        other => return Err(ApiError::InvalidInterval(other.to_string())),
    };

    Ok(Json(HistoryResponse {
        interval: interval.to_string(),
        from,
        to,
        count,
        data,
        bounds: state.bounds(),
    }))
}

// --- GET /api/voltage/anomalies ---

#[derive(Debug, Deserialize)]
pub struct AnomalyParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub phase: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnomalyListResponse {
    pub count: usize,
    pub data: Vec<Anomaly>,
}

pub async fn anomalies(
    State(state): State<AppState>,
    Query(params): Query<AnomalyParams>,
) -> ApiResult<Json<AnomalyListResponse>> {
    let episode = match params.kind.as_deref() {
        None => None,
        Some("interruption") => Some(EpisodeKind::Interruption),
        Some("deviation") => Some(EpisodeKind::Deviation),
        Some(other) => return Err(ApiError::InvalidType(other.to_string())),
    };

    let phase = match params.phase.as_deref() {
        None => None,
        Some(s) => Some(Phase::parse(s).ok_or_else(|| ApiError::InvalidPhase(s.to_string()))?),
    };

    let filter = AnomalyFilter {
        episode,
        phase,
        from: parse_opt(params.from.as_deref()),
        to: parse_opt(params.to.as_deref()),
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ANOMALY_LIMIT)
        .clamp(1, MAX_ANOMALY_LIMIT);

    let store = state.store.read().await;
    // Newest first, limit applied after filtering
    let mut matched = store.anomalies(&filter);
    matched.reverse();
    matched.truncate(limit);

    Ok(Json(AnomalyListResponse {
        count: matched.len(),
        data: matched,
    }))
}

// --- GET /api/voltage/anomalies/active ---

#[derive(Debug, Serialize)]
pub struct ActiveAnomalyResponse {
    pub count: usize,
    pub data: Vec<ActiveAnomaly>,
}

pub async fn active_anomalies(State(state): State<AppState>) -> Json<ActiveAnomalyResponse> {
    let store = state.store.read().await;
    let data = store.active_anomalies();
    Json(ActiveAnomalyResponse {
        count: data.len(),
        data,
    })
}

// --- GET /api/voltage/compliance/weekly ---

#[derive(Debug, Deserialize)]
pub struct WeeklyParams {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyResponse {
    #[serde(flatten)]
    pub compliance: WeeklyCompliance,
    pub eso_threshold_pct: f64,
    pub window_duration_minutes: u32,
    pub windows_per_week: u32,
}

pub async fn weekly_compliance(
    State(state): State<AppState>,
    Query(params): Query<WeeklyParams>,
) -> Json<WeeklyResponse> {
    let date = parse_loose(params.date.as_deref(), Utc::now());

    let store = state.store.read().await;
    let thresholds = store.thresholds();
    let windows_per_week = 7 * 24 * 60 / thresholds.window_minutes;
    let response = WeeklyResponse {
        compliance: store.weekly_compliance(Some(date)),
        eso_threshold_pct: thresholds.weekly_compliance_pct,
        window_duration_minutes: thresholds.window_minutes,
        windows_per_week,
    };
    Json(response)
}

// --- GET /api/voltage/summary ---

#[derive(Debug, Serialize)]
pub struct ComplianceSummary {
    pub pct_l1: f64,
    pub pct_l2: f64,
    pub pct_l3: f64,
    pub overall_compliant: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub has_data: bool,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub stats: crate::store::StoreStats,
    pub weekly_compliance: ComplianceSummary,
    pub bounds: Bounds,
}

pub async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let store = state.store.read().await;
    let latest = store.latest();
    let weekly = store.weekly_compliance(None);

    Json(SummaryResponse {
        has_data: latest.is_some(),
        latest_timestamp: latest.map(|r| r.ts),
        stats: store.stats(),
        weekly_compliance: ComplianceSummary {
            pct_l1: weekly.compliance_pct_l1,
            pct_l2: weekly.compliance_pct_l2,
            pct_l3: weekly.compliance_pct_l3,
            overall_compliant: weekly.overall_compliant,
        },
        bounds: state.bounds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn loose_parsing_accepts_rfc3339_and_plain_dates() {
        let fallback = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let parsed = parse_loose(Some("2026-03-02T10:20:30Z"), fallback);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 2, 10, 20, 30).unwrap());

        let parsed = parse_loose(Some("2026-03-02"), fallback);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());

        assert_eq!(parse_loose(Some("not-a-date"), fallback), fallback);
        assert_eq!(parse_loose(None, fallback), fallback);
    }
}
