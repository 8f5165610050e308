//! Hysteresis Controller Implementation

use crate::config::HysteresisConfig;
use metrics::counter;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-key state tracked by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisState {
    /// Whether the key is currently in the active state
    pub is_active: bool,
    /// When the state last changed (or was first created)
    pub last_change_time: Instant,
    /// Most recent value evaluated for this key
    pub last_value: f64,
    /// Number of transitions since the state was created
    pub change_count: u64,
}

/// Why an evaluation produced its decision
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationReason {
    /// First evaluation for the key
    InitialEvaluation,
    /// Still inside the minimum hold time since the last change
    HoldTimeActive { remaining: Duration },
    /// Inactive key crossed the activation threshold
    Activated { value: f64, threshold: f64 },
    /// Active key dropped below the deactivation threshold
    Deactivated { value: f64, threshold: f64 },
    /// Active key stayed at or above the deactivation threshold
    MaintainedActive { value: f64, threshold: f64 },
    /// Inactive key stayed below the activation threshold
    MaintainedInactive { value: f64, threshold: f64 },
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialEvaluation => write!(f, "initial_evaluation"),
            Self::HoldTimeActive { remaining } => {
                write!(f, "hold_time_active: {:.1}s remaining", remaining.as_secs_f64())
            }
            Self::Activated { value, threshold } => {
                write!(f, "activated: {value} >= {threshold}")
            }
            Self::Deactivated { value, threshold } => {
                write!(f, "deactivated: {value} < {threshold}")
            }
            Self::MaintainedActive { value, threshold } => {
                write!(f, "maintained_active: {value} >= {threshold}")
            }
            Self::MaintainedInactive { value, threshold } => {
                write!(f, "maintained_inactive: {value} < {threshold}")
            }
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisDecision {
    /// Stable decision for the key
    pub should_act: bool,
    /// Explanation of how the decision was reached
    pub reason: EvaluationReason,
}

impl HysteresisDecision {
    fn new(should_act: bool, reason: EvaluationReason) -> Self {
        Self { should_act, reason }
    }
}

/// Thread-safe hysteresis state machine keyed by an arbitrary identifier.
///
/// All reads and writes of the state map go through a single mutex, held for
/// exactly one evaluation; nothing inside the critical section blocks.
#[derive(Debug, Default)]
pub struct HysteresisController {
    states: Mutex<HashMap<String, HysteresisState>>,
}

impl HysteresisController {
    /// Create a controller with no tracked keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `current_value` for `key` at time `now`
    pub fn evaluate(
        &self,
        key: &str,
        current_value: f64,
        config: &HysteresisConfig,
        now: Instant,
    ) -> HysteresisDecision {
        counter!("hysteresis_evaluations_total").increment(1);
        let mut states = self.lock();

        let Some(state) = states.get_mut(key) else {
            let is_active = current_value >= config.activation_threshold();
            states.insert(
                key.to_string(),
                HysteresisState {
                    is_active,
                    last_change_time: now,
                    last_value: current_value,
                    change_count: 0,
                },
            );
            debug!(key, current_value, is_active, "Initial hysteresis evaluation");
            return HysteresisDecision::new(is_active, EvaluationReason::InitialEvaluation);
        };

        state.last_value = current_value;

        let elapsed = now.saturating_duration_since(state.last_change_time);
        let hold = config.min_hold_time();
        if elapsed < hold {
            return HysteresisDecision::new(
                state.is_active,
                EvaluationReason::HoldTimeActive {
                    remaining: hold - elapsed,
                },
            );
        }

        let reason = if state.is_active {
            let threshold = config.deactivation_threshold();
            if current_value < threshold {
                state.is_active = false;
                EvaluationReason::Deactivated {
                    value: current_value,
                    threshold,
                }
            } else {
                EvaluationReason::MaintainedActive {
                    value: current_value,
                    threshold,
                }
            }
        } else {
            let threshold = config.activation_threshold();
            if current_value >= threshold {
                state.is_active = true;
                EvaluationReason::Activated {
                    value: current_value,
                    threshold,
                }
            } else {
                EvaluationReason::MaintainedInactive {
                    value: current_value,
                    threshold,
                }
            }
        };

        if matches!(
            reason,
            EvaluationReason::Activated { .. } | EvaluationReason::Deactivated { .. }
        ) {
            state.last_change_time = now;
            state.change_count += 1;
            let direction = if state.is_active { "activate" } else { "deactivate" };
            counter!("hysteresis_transitions_total", "direction" => direction).increment(1);
            info!(key, change_count = state.change_count, "Hysteresis {}", reason);
        }

        HysteresisDecision::new(state.is_active, reason)
    }

    /// Evaluate using the current wall-clock instant
    pub fn evaluate_now(
        &self,
        key: &str,
        current_value: f64,
        config: &HysteresisConfig,
    ) -> HysteresisDecision {
        self.evaluate(key, current_value, config, Instant::now())
    }

    /// Snapshot of the state tracked for `key`
    pub fn get_state(&self, key: &str) -> Option<HysteresisState> {
        self.lock().get(key).copied()
    }

    /// Forget `key`; the next evaluation is treated as the first
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            debug!(key, "Hysteresis state reset");
        }
        removed
    }

    /// Forget every key, returning how many were tracked
    pub fn reset_all(&self) -> usize {
        let mut states = self.lock();
        let count = states.len();
        states.clear();
        info!("Reset {} hysteresis states", count);
        count
    }

    /// Keys currently tracked
    pub fn tracked_keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key is tracked
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic elsewhere cannot leave a state half-written, so a poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, HysteresisState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
