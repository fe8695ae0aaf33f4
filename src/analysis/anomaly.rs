//! Supply interruption and voltage deviation tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::meter::{Phase, Reading};

/// Anomaly event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    LongInterruption,
    ShortInterruption,
    VoltageDeviation,
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

/// An emitted anomaly event.
///
/// Interruptions are emitted once, on recovery, with `ended_at` set.
/// Deviations are emitted twice per episode: on start with `ended_at = None`
/// and on resolution with the extremes observed during the episode.
/// Consumers de-duplicate by `(phase, started_at)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Anomaly {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub v_min: Option<f64>,
    pub v_max: Option<f64>,
    pub duration_s: Option<f64>,
}

/// An ongoing episode reported by the active-anomalies query
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActiveAnomaly {
    pub phase: Phase,
    #[serde(rename = "type")]
    pub episode: EpisodeKind,
    pub started_at: DateTime<Utc>,
}

/// Which sub-machine an active episode belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeKind {
    Interruption,
    Deviation,
}

/// Interruption sub-machine state
#[derive(Debug, Clone, Copy)]
enum InterruptionState {
    Idle,
    Active { started_at: DateTime<Utc> },
}

/// Deviation sub-machine state
#[derive(Debug, Clone, Copy)]
enum DeviationState {
    Idle,
    Active {
        started_at: DateTime<Utc>,
        v_min: f64,
        v_max: f64,
    },
}

/// Per-phase tracker state
#[derive(Debug, Clone, Copy)]
struct PhaseState {
    interruption: InterruptionState,
    deviation: DeviationState,
}

impl PhaseState {
    fn idle() -> Self {
        Self {
            interruption: InterruptionState::Idle,
            deviation: DeviationState::Idle,
        }
    }
}

/// Per-phase anomaly state machine.
///
/// Each phase carries two orthogonal sub-machines. Interruption logic runs
/// first on every sample; deviation logic only on the non-zero branch, so a
/// recovery reading does not also open a deviation unless the recovery
/// voltage is itself out of bounds.
#[derive(Debug, Clone)]
pub struct AnomalyTracker {
    thresholds: Thresholds,
    states: [PhaseState; 3],
}

impl AnomalyTracker {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            states: [PhaseState::idle(); 3],
        }
    }

    /// Process one reading; returns zero or more emitted anomalies.
    pub fn process(&mut self, reading: &Reading) -> Vec<Anomaly> {
        let mut emitted = Vec::new();
        for phase in Phase::ALL {
            self.step_phase(phase, reading.voltage(phase), reading.ts, &mut emitted);
        }
        emitted
    }

    fn step_phase(
        &mut self,
        phase: Phase,
        v: f64,
        ts: DateTime<Utc>,
        emitted: &mut Vec<Anomaly>,
    ) {
        let state = &mut self.states[phase.index()];

        if v < self.thresholds.voltage_zero_threshold {
            // Loss of supply. The interruption machine owns the episode;
            // an open deviation is cancelled without a closing event.
            if let InterruptionState::Idle = state.interruption {
                state.interruption = InterruptionState::Active { started_at: ts };
            }
            state.deviation = DeviationState::Idle;
            return;
        }

        // Supply present: close an ongoing interruption first.
        if let InterruptionState::Active { started_at } = state.interruption {
            state.interruption = InterruptionState::Idle;
            let duration_ms = (ts - started_at).num_milliseconds();
            let long = duration_ms > self.thresholds.long_interruption_seconds as i64 * 1000;
            emitted.push(Anomaly {
                started_at,
                ended_at: Some(ts),
                phase,
                kind: if long {
                    AnomalyKind::LongInterruption
                } else {
                    AnomalyKind::ShortInterruption
                },
                severity: if long { Severity::Critical } else { Severity::Warning },
                v_min: Some(0.0),
                v_max: Some(v),
                duration_s: Some(duration_ms as f64 / 1000.0),
            });
        }

        let in_bounds = v >= self.thresholds.voltage_min && v <= self.thresholds.voltage_max;

        match (state.deviation, in_bounds) {
            (DeviationState::Idle, true) => {}
            (DeviationState::Idle, false) => {
                state.deviation = DeviationState::Active {
                    started_at: ts,
                    v_min: v,
                    v_max: v,
                };
                emitted.push(Anomaly {
                    started_at: ts,
                    ended_at: None,
                    phase,
                    kind: AnomalyKind::VoltageDeviation,
                    severity: Severity::Warning,
                    v_min: Some(v),
                    v_max: Some(v),
                    duration_s: None,
                });
            }
            (DeviationState::Active { started_at, v_min, v_max }, false) => {
                state.deviation = DeviationState::Active {
                    started_at,
                    v_min: v_min.min(v),
                    v_max: v_max.max(v),
                };
            }
            (DeviationState::Active { started_at, v_min, v_max }, true) => {
                state.deviation = DeviationState::Idle;
                emitted.push(Anomaly {
                    started_at,
                    ended_at: Some(ts),
                    phase,
                    kind: AnomalyKind::VoltageDeviation,
                    severity: Severity::Warning,
                    v_min: Some(v_min),
                    v_max: Some(v_max),
                    duration_s: Some((ts - started_at).num_milliseconds() as f64 / 1000.0),
                });
            }
        }
    }

    /// One entry per ongoing sub-machine not in idle
    pub fn active(&self) -> Vec<ActiveAnomaly> {
        let mut active = Vec::new();
        for phase in Phase::ALL {
            let state = &self.states[phase.index()];
            if let InterruptionState::Active { started_at } = state.interruption {
                active.push(ActiveAnomaly {
                    phase,
                    episode: EpisodeKind::Interruption,
                    started_at,
                });
            }
            if let DeviationState::Active { started_at, .. } = state.deviation {
                active.push(ActiveAnomaly {
                    phase,
                    episode: EpisodeKind::Deviation,
                    started_at,
                });
            }
        }
        active
    }

    /// Return every sub-machine to idle
    pub fn reset(&mut self) {
        self.states = [PhaseState::idle(); 3];
    }
}
