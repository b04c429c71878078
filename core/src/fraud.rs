//! Fraud risk aggregation.
//!
//! A pure function from weighted risk factors to a 0.0–1.0 score and a
//! recommendation tag. No I/O, no side effects — the function is unit
//! tested against literal factor sets. Weights and thresholds come from
//! FraudConfig, never from code (see config.rs for the recognized keys).

use crate::config::FraudConfig;
use serde::{Deserialize, Serialize};

/// One scored risk signal. `score` is the factor's own risk reading in
/// [0, 1]; its influence on the aggregate comes from the configured weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub score: f64,
    pub details: String,
}

impl RiskFactor {
    pub fn new(factor: &str, score: f64, details: &str) -> Self {
        Self {
            factor: factor.to_string(),
            score,
            details: details.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Reject,
    FurtherReview,
    Compromise,
}

/// The aggregate verdict handed to the resolution decision procedure.
/// Carries the input factors so the audit trail survives into the
/// resolution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub overall: f64,
    pub recommendation: Recommendation,
    pub factors: Vec<RiskFactor>,
}

/// Combine weighted risk factors into an overall score and recommendation.
///
/// `overall` is the weighted mean of factor scores (clamped to [0, 1] on
/// input). Zero factors is a defined case: the configured neutral score and
/// FURTHER_REVIEW. The minority rule is checked before the plain
/// thresholds: mixed evidence with a single heavy dissenter is a
/// compromise case even when the mean lands outside the review band.
pub fn score(factors: &[RiskFactor], cfg: &FraudConfig) -> FraudAssessment {
    if factors.is_empty() {
        return FraudAssessment {
            overall: cfg.neutral_score,
            recommendation: Recommendation::FurtherReview,
            factors: Vec::new(),
        };
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for f in factors {
        let w = weight_of(f, cfg);
        weighted_sum += w * f.score.clamp(0.0, 1.0);
        weight_total += w;
    }
    let overall = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        cfg.neutral_score
    };

    let recommendation = if let Some(dissenter) = lone_heavy_dissenter(factors, cfg) {
        log::debug!(
            "compromise recommendation: factor '{}' dissents from {} others",
            dissenter.factor,
            factors.len() - 1
        );
        Recommendation::Compromise
    } else if overall < cfg.approve_below {
        Recommendation::Approve
    } else if overall > cfg.reject_above {
        Recommendation::Reject
    } else {
        Recommendation::FurtherReview
    };

    FraudAssessment {
        overall,
        recommendation,
        factors: factors.to_vec(),
    }
}

fn weight_of(factor: &RiskFactor, cfg: &FraudConfig) -> f64 {
    cfg.weights
        .get(&factor.factor)
        .copied()
        .unwrap_or(cfg.default_weight)
        .max(0.0)
}

/// Deterministic minority detection: partition factors on the elevated
/// cutoff; if exactly one factor sits on the strictly smaller side and its
/// weight reaches the minority threshold, it is the lone dissenter.
fn lone_heavy_dissenter<'a>(
    factors: &'a [RiskFactor],
    cfg: &FraudConfig,
) -> Option<&'a RiskFactor> {
    if factors.len() < cfg.minority_min_factors {
        return None;
    }

    let (elevated, benign): (Vec<&RiskFactor>, Vec<&RiskFactor>) = factors
        .iter()
        .partition(|f| f.score.clamp(0.0, 1.0) >= cfg.elevated_cutoff);

    let minority = if elevated.len() < benign.len() {
        elevated
    } else if benign.len() < elevated.len() {
        benign
    } else {
        return None; // even split, no minority
    };

    match minority.as_slice() {
        [lone] if weight_of(lone, cfg) >= cfg.minority_weight_threshold => Some(*lone),
        _ => None,
    }
}
