//! Sensitivity Analyzer Implementation

use crate::config::SensitivityConfig;
use crate::decision::{Decision, DecisionFunction, DecisionInputs};
use crate::report::{DecisionRobustness, SensitivityFactor, WhatIfResult};
use crate::SensitivityError;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Search range `(min, max)` per input name
pub type InputRanges = BTreeMap<String, (f64, f64)>;

/// Sensitivity analyzer over a black-box decision function.
///
/// Boundary searches assume the decision function is monotone in the swept
/// input over the searched interval: it switches between the base action and
/// another action exactly once. With a non-monotone function the result is a
/// point where the action changes, not necessarily the nearest one.
pub struct SensitivityAnalyzer {
    decision_fn: Arc<dyn DecisionFunction>,
    config: SensitivityConfig,
}

impl SensitivityAnalyzer {
    /// Create an analyzer with default thresholds
    pub fn new(decision_fn: Arc<dyn DecisionFunction>) -> Self {
        Self {
            decision_fn,
            config: SensitivityConfig::default(),
        }
    }

    /// Create an analyzer with custom thresholds
    pub fn with_config(
        decision_fn: Arc<dyn DecisionFunction>,
        config: SensitivityConfig,
    ) -> Result<Self, SensitivityError> {
        config.validate()?;
        Ok(Self { decision_fn, config })
    }

    /// Get configuration
    pub fn config(&self) -> &SensitivityConfig {
        &self.config
    }

    /// Find every input whose range contains a decision flip and score robustness
    pub async fn analyze(
        &self,
        base_inputs: &DecisionInputs,
        input_ranges: &InputRanges,
    ) -> Result<DecisionRobustness, SensitivityError> {
        let mut targets = Vec::with_capacity(input_ranges.len());
        for (name, &range) in input_ranges {
            match base_inputs.get(name) {
                Some(&current) => {
                    validate_range(name, range)?;
                    targets.push((name.as_str(), current, range));
                }
                None if self.config.strict_ranges => {
                    return Err(SensitivityError::UnknownInput(name.clone()));
                }
                None => debug!(input = %name, "Skipping range for input not in base inputs"),
            }
        }

        let base = self.decision_fn.decide(base_inputs).await;

        let searches = targets.iter().map(|&(name, current, range)| {
            self.find_boundary(base_inputs, name, current, range, &base.action)
        });
        let boundaries: Vec<Option<f64>> = if self.config.concurrent_searches {
            join_all(searches).await
        } else {
            let mut boundaries = Vec::with_capacity(targets.len());
            for search in searches {
                boundaries.push(search.await);
            }
            boundaries
        };

        let mut factors: Vec<SensitivityFactor> = targets
            .iter()
            .zip(boundaries)
            .map(|(&(name, current, _), boundary)| {
                SensitivityFactor::new(name, current, boundary, self.config.fragile_threshold)
            })
            .collect();

        factors.sort_by(|a, b| a.headroom.total_cmp(&b.headroom));
        for (i, factor) in factors.iter_mut().enumerate() {
            factor.importance_rank = i + 1;
        }

        let key_drivers: Vec<SensitivityFactor> = factors
            .iter()
            .take(self.config.max_key_drivers)
            .cloned()
            .collect();
        let fragile_factors: Vec<String> = factors
            .iter()
            .filter(|f| f.is_fragile)
            .map(|f| f.factor_name.clone())
            .collect();
        let decision_boundaries: BTreeMap<String, f64> = factors
            .iter()
            .filter_map(|f| f.decision_boundary.map(|b| (f.factor_name.clone(), b)))
            .collect();

        let robustness_score = self.robustness_score(&factors);
        let recommendation = self.recommend(robustness_score, &base.action, &factors);

        info!(
            action = %base.action,
            robustness_score,
            factors = factors.len(),
            fragile = fragile_factors.len(),
            "Sensitivity analysis complete"
        );

        Ok(DecisionRobustness {
            robustness_score,
            base_decision: base.action,
            base_utility: base.utility,
            key_drivers,
            fragile_factors,
            decision_boundaries,
            factors,
            recommendation,
        })
    }

    /// Binary search for the value of `input_name` at which the action stops being `base_action`.
    ///
    /// Returns `None` when both ends of the range yield `base_action`. Otherwise
    /// bisects the half between `current` and the end whose action differs,
    /// stopping once the interval is no wider than `tolerance * max(|current|, 1)`,
    /// and returns the final midpoint.
    pub async fn find_boundary(
        &self,
        base_inputs: &DecisionInputs,
        input_name: &str,
        current: f64,
        (min_val, max_val): (f64, f64),
        base_action: &str,
    ) -> Option<f64> {
        let low_action = self.decide_with(base_inputs, input_name, min_val).await.action;
        let high_action = self.decide_with(base_inputs, input_name, max_val).await.action;

        if low_action == base_action && high_action == base_action {
            debug!(input = input_name, "No decision boundary within range");
            return None;
        }

        let pivot = current.clamp(min_val, max_val);
        // `base_end` keeps the base action, `flip_end` does not
        let (mut base_end, mut flip_end) = if low_action != base_action {
            (pivot, min_val)
        } else {
            (pivot, max_val)
        };

        let width_limit = self.config.tolerance * current.abs().max(1.0);
        let mut iterations = 0;
        while (flip_end - base_end).abs() > width_limit
            && iterations < self.config.max_search_iterations
        {
            let mid = (base_end + flip_end) / 2.0;
            if self.decide_with(base_inputs, input_name, mid).await.action == base_action {
                base_end = mid;
            } else {
                flip_end = mid;
            }
            iterations += 1;
        }

        let boundary = (base_end + flip_end) / 2.0;
        debug!(input = input_name, boundary, iterations, "Decision boundary found");
        Some(boundary)
    }

    /// Compare the base decision with the decision after applying `changes`
    pub async fn what_if(
        &self,
        base_inputs: &DecisionInputs,
        changes: &DecisionInputs,
    ) -> WhatIfResult {
        let base = self.decision_fn.decide(base_inputs).await;

        let mut changed_inputs = base_inputs.clone();
        changed_inputs.extend(changes.iter().map(|(k, &v)| (k.clone(), v)));
        let changed = self.decision_fn.decide(&changed_inputs).await;

        let result = WhatIfResult::compare(base, changed, changes.clone());
        debug!(
            decision_changed = result.decision_changed,
            utility_change = result.utility_change,
            "What-if evaluated"
        );
        result
    }

    /// Binary search for the value of `input_name` at which `target_action` starts being chosen.
    ///
    /// Stops once the interval is no wider than `tolerance` of the range width.
    /// Returns `None` up front when neither end of the range yields
    /// `target_action`.
    ///
    /// Unlike [`find_boundary`](Self::find_boundary), this does not return the
    /// final midpoint: a midpoint can land on the non-target side of the step
    /// and would then be reported as a miss. It returns the converged end of
    /// the bracket, which always yields `target_action`, so a step at exactly
    /// `x` can return `Some(x)`.
    pub async fn find_threshold(
        &self,
        base_inputs: &DecisionInputs,
        input_name: &str,
        (min_val, max_val): (f64, f64),
        target_action: &str,
    ) -> Result<Option<f64>, SensitivityError> {
        validate_range(input_name, (min_val, max_val))?;

        let at_min =
            self.decide_with(base_inputs, input_name, min_val).await.action == target_action;
        let at_max =
            self.decide_with(base_inputs, input_name, max_val).await.action == target_action;
        if !at_min && !at_max {
            debug!(input = input_name, target_action, "Target action not reachable in range");
            return Ok(None);
        }

        // Prefer the upper end when both ends already yield the target
        let (mut target_end, mut other_end) = if at_max {
            (max_val, min_val)
        } else {
            (min_val, max_val)
        };

        let width_limit = self.config.tolerance * (max_val - min_val);
        let mut iterations = 0;
        while (target_end - other_end).abs() > width_limit
            && iterations < self.config.max_search_iterations
        {
            let mid = (target_end + other_end) / 2.0;
            if self.decide_with(base_inputs, input_name, mid).await.action == target_action {
                target_end = mid;
            } else {
                other_end = mid;
            }
            iterations += 1;
        }

        debug!(
            input = input_name,
            target_action,
            threshold = target_end,
            iterations,
            "Threshold found"
        );
        Ok(Some(target_end))
    }

    async fn decide_with(
        &self,
        base_inputs: &DecisionInputs,
        input_name: &str,
        value: f64,
    ) -> Decision {
        let mut inputs = base_inputs.clone();
        inputs.insert(input_name.to_string(), value);
        self.decision_fn.decide(&inputs).await
    }

    fn robustness_score(&self, factors: &[SensitivityFactor]) -> f64 {
        let bounded: Vec<&SensitivityFactor> =
            factors.iter().filter(|f| f.decision_boundary.is_some()).collect();
        if bounded.is_empty() {
            return 1.0;
        }

        let mean_headroom =
            bounded.iter().map(|f| f.headroom.min(1.0)).sum::<f64>() / bounded.len() as f64;
        let fragile = factors.iter().filter(|f| f.is_fragile).count() as f64;
        (mean_headroom - self.config.fragile_penalty * fragile).clamp(0.0, 1.0)
    }

    fn recommend(&self, score: f64, action: &str, factors: &[SensitivityFactor]) -> String {
        let fragile: Vec<&SensitivityFactor> = factors.iter().filter(|f| f.is_fragile).collect();

        if score >= self.config.robust_threshold {
            return format!(
                "Decision '{}' is robust to input uncertainty; safe to proceed.",
                action
            );
        }

        if fragile.is_empty() {
            return match factors.first() {
                Some(driver) if driver.headroom.is_finite() => format!(
                    "Decision '{}' is reasonably stable. Monitor '{}', which is {:.0}% from its decision boundary.",
                    action,
                    driver.factor_name,
                    driver.headroom_pct()
                ),
                _ => format!(
                    "Decision '{}' is reasonably stable. Monitor key inputs for changes.",
                    action
                ),
            };
        }

        let names = fragile
            .iter()
            .take(3)
            .map(|f| format!("'{}'", f.factor_name))
            .collect::<Vec<_>>()
            .join(", ");

        if score < self.config.weak_threshold {
            format!(
                "Decision '{}' is highly sensitive to {}. Recommend human review before proceeding.",
                action, names
            )
        } else if score < self.config.moderate_threshold {
            format!(
                "Decision '{}' is sensitive to {}. Consider gathering more information before committing.",
                action, names
            )
        } else {
            let most_fragile = fragile[0];
            format!(
                "Decision '{}' is fairly robust, but '{}' is within {:.0}% of its decision boundary.",
                action,
                most_fragile.factor_name,
                most_fragile.headroom_pct()
            )
        }
    }
}

fn validate_range(input: &str, (min, max): (f64, f64)) -> Result<(), SensitivityError> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(SensitivityError::InvalidRange {
            input: input.to_string(),
            min,
            max,
        });
    }
    Ok(())
}
