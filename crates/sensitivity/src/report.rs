//! Analysis report types

use crate::decision::{Decision, DecisionInputs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which way an input must move to reach its decision boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    None,
}

/// Sensitivity of the decision to one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityFactor {
    pub factor_name: String,
    pub current_value: f64,
    /// Input value at which the action flips, if one lies in the searched range
    pub decision_boundary: Option<f64>,
    /// |boundary - current| / |current|; infinite without a boundary or when current is 0
    pub headroom: f64,
    /// |boundary - current|; infinite without a boundary
    pub headroom_absolute: f64,
    pub direction: Direction,
    /// 1 = least headroom = most important
    pub importance_rank: usize,
    pub is_fragile: bool,
}

impl SensitivityFactor {
    /// Build a factor from a search result; the rank is assigned later
    pub(crate) fn new(
        factor_name: &str,
        current_value: f64,
        decision_boundary: Option<f64>,
        fragile_threshold: f64,
    ) -> Self {
        let (headroom, headroom_absolute, direction) = match decision_boundary {
            Some(boundary) => {
                let absolute = (boundary - current_value).abs();
                let relative = if current_value == 0.0 {
                    f64::INFINITY
                } else {
                    absolute / current_value.abs()
                };
                let direction = if boundary > current_value {
                    Direction::Up
                } else {
                    Direction::Down
                };
                (relative, absolute, direction)
            }
            None => (f64::INFINITY, f64::INFINITY, Direction::None),
        };

        Self {
            factor_name: factor_name.to_string(),
            current_value,
            decision_boundary,
            headroom,
            headroom_absolute,
            direction,
            importance_rank: 0,
            is_fragile: headroom < fragile_threshold,
        }
    }

    /// Headroom as a percentage
    pub fn headroom_pct(&self) -> f64 {
        self.headroom * 100.0
    }
}

/// Aggregate robustness report for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRobustness {
    /// 1.0 = no reachable boundary, 0.0 = extremely fragile
    pub robustness_score: f64,
    pub base_decision: String,
    pub base_utility: f64,
    /// Up to `max_key_drivers` factors with the least headroom
    pub key_drivers: Vec<SensitivityFactor>,
    /// Names of fragile factors, most fragile first
    pub fragile_factors: Vec<String>,
    /// Boundaries found, by input name
    pub decision_boundaries: BTreeMap<String, f64>,
    /// Every analyzed factor, ordered by importance rank
    pub factors: Vec<SensitivityFactor>,
    pub recommendation: String,
}

impl DecisionRobustness {
    /// Look up the factor for an input
    pub fn factor(&self, name: &str) -> Option<&SensitivityFactor> {
        self.factors.iter().find(|f| f.factor_name == name)
    }

    /// Whether any factor is fragile
    pub fn is_fragile(&self) -> bool {
        !self.fragile_factors.is_empty()
    }
}

/// Comparison of a base case against hypothetically changed inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfResult {
    pub base: Decision,
    pub changed: Decision,
    pub decision_changed: bool,
    pub utility_change: f64,
    /// Change relative to |base utility| in percent; `None` when base utility is 0
    pub utility_change_pct: Option<f64>,
    pub changes: DecisionInputs,
}

impl WhatIfResult {
    pub(crate) fn compare(base: Decision, changed: Decision, changes: DecisionInputs) -> Self {
        let utility_change = changed.utility - base.utility;
        let utility_change_pct = if base.utility == 0.0 {
            None
        } else {
            Some(utility_change / base.utility.abs() * 100.0)
        };

        Self {
            decision_changed: base.action != changed.action,
            utility_change,
            utility_change_pct,
            base,
            changed,
            changes,
        }
    }
}
