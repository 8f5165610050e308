//! Decision function contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named numeric inputs to a decision function
pub type DecisionInputs = BTreeMap<String, f64>;

/// Action chosen by a decision function and its utility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub utility: f64,
}

impl Decision {
    /// Create a new decision
    pub fn new(action: impl Into<String>, utility: f64) -> Self {
        Self {
            action: action.into(),
            utility,
        }
    }
}

/// Black-box decision function probed by the analyzer.
///
/// Called many times per analysis, so it should be cheap. When
/// `SensitivityConfig::concurrent_searches` is enabled it is also polled
/// concurrently.
#[async_trait]
pub trait DecisionFunction: Send + Sync {
    /// Choose an action for the given inputs
    async fn decide(&self, inputs: &DecisionInputs) -> Decision;
}

/// Adapter turning a synchronous closure into a [`DecisionFunction`]
pub struct FnDecision<F>(pub F);

#[async_trait]
impl<F> DecisionFunction for FnDecision<F>
where
    F: Fn(&DecisionInputs) -> Decision + Send + Sync,
{
    async fn decide(&self, inputs: &DecisionInputs) -> Decision {
        (self.0)(inputs)
    }
}

/// Wrap a synchronous closure as a shareable decision function
pub fn from_fn<F>(f: F) -> Arc<dyn DecisionFunction>
where
    F: Fn(&DecisionInputs) -> Decision + Send + Sync + 'static,
{
    Arc::new(FnDecision(f))
}
