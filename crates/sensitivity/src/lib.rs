//! Sensitivity & Robustness Analyzer
//!
//! Probes a black-box decision function to find the input values at which
//! its chosen action flips, and scores how far the current inputs sit from
//! those flips.

mod analyzer;
mod config;
mod decision;
mod report;

pub use analyzer::{InputRanges, SensitivityAnalyzer};
pub use config::SensitivityConfig;
pub use decision::{from_fn, Decision, DecisionFunction, DecisionInputs, FnDecision};
pub use report::{DecisionRobustness, Direction, SensitivityFactor, WhatIfResult};

use thiserror::Error;

/// Errors raised for misconfigured analyses
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensitivityError {
    #[error("Invalid range for {input}: [{min}, {max}]")]
    InvalidRange { input: String, min: f64, max: f64 },
    #[error("Range given for unknown input: {0}")]
    UnknownInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
