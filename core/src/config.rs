//! Engine configuration.
//!
//! Everything an operator tunes without a code change lives here: fraud
//! factor weights, recommendation thresholds, the compromise minority rule,
//! the merchant response window, and currency minor units. Loaded from
//! `{data_dir}/engine.json`; tests use `EngineConfig::default_test()`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fraud aggregation parameters. Recognized keys:
///   - `weights`: { factor name → weight }, unlisted factors get
///     `default_weight` (1.0).
///   - `approve_below` / `reject_above`: recommendation thresholds on the
///     weighted mean (defaults 0.3 / 0.7; the band between is FURTHER_REVIEW).
///   - `elevated_cutoff`: a factor scoring at or above this counts as
///     elevated for the minority rule (default 0.5).
///   - `minority_min_factors`: minimum factor count before the minority rule
///     applies (default 3).
///   - `minority_weight_threshold`: a lone dissenting factor weighing at
///     least this much turns the recommendation into COMPROMISE (default 1.5).
///   - `neutral_score`: the defined result of scoring zero factors (0.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    #[serde(default = "default_approve_below")]
    pub approve_below: f64,
    #[serde(default = "default_reject_above")]
    pub reject_above: f64,
    #[serde(default = "default_elevated_cutoff")]
    pub elevated_cutoff: f64,
    #[serde(default = "default_minority_min_factors")]
    pub minority_min_factors: usize,
    #[serde(default = "default_minority_weight_threshold")]
    pub minority_weight_threshold: f64,
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,
}

fn default_weight() -> f64 {
    1.0
}
fn default_approve_below() -> f64 {
    0.3
}
fn default_reject_above() -> f64 {
    0.7
}
fn default_elevated_cutoff() -> f64 {
    0.5
}
fn default_minority_min_factors() -> usize {
    3
}
fn default_minority_weight_threshold() -> f64 {
    1.5
}
fn default_neutral_score() -> f64 {
    0.5
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: default_weight(),
            approve_below: default_approve_below(),
            reject_above: default_reject_above(),
            elevated_cutoff: default_elevated_cutoff(),
            minority_min_factors: default_minority_min_factors(),
            minority_weight_threshold: default_minority_weight_threshold(),
            neutral_score: default_neutral_score(),
        }
    }
}

/// Resolution computation parameters.
/// Compromise amounts are rounded to the currency's minor unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Minor units per currency code (e.g. "JPY" → 0). Unlisted currencies
    /// use `default_minor_units`.
    #[serde(default)]
    pub currency_minor_units: HashMap<String, u32>,
    #[serde(default = "default_minor_units")]
    pub default_minor_units: u32,
}

fn default_minor_units() -> u32 {
    2
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            currency_minor_units: HashMap::new(),
            default_minor_units: default_minor_units(),
        }
    }
}

impl ResolutionConfig {
    pub fn minor_units(&self, currency: &str) -> u32 {
        self.currency_minor_units
            .get(currency)
            .copied()
            .unwrap_or(self.default_minor_units)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hours the merchant has to respond before the timeout transition
    /// becomes due.
    #[serde(default = "default_response_window")]
    pub merchant_response_window_hours: i64,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

fn default_response_window() -> i64 {
    48
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merchant_response_window_hours: default_response_window(),
            fraud: FraudConfig::default(),
            resolution: ResolutionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self::default()
    }
}
