use super::scoring::MAX_SCORE;
use serde::{Deserialize, Serialize};

/// Risk tiers in descending score order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Low,
        RiskTier::Moderate,
        RiskTier::High,
        RiskTier::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low Risk",
            RiskTier::Moderate => "Moderate Risk",
            RiskTier::High => "High Risk",
            RiskTier::Critical => "Critical Risk",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskTier::Low => "green",
            RiskTier::Moderate => "yellow",
            RiskTier::High => "orange",
            RiskTier::Critical => "red",
        }
    }
}

/// Inclusive lower bounds of the three upper tiers; everything below `high` is critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 80.0,
            moderate: 60.0,
            high: 40.0,
        }
    }
}

impl RiskThresholds {
    /// Total over every `f64`: out-of-range scores are clamped and NaN is critical.
    pub fn classify(&self, score: f64) -> RiskTier {
        if score.is_nan() {
            return RiskTier::Critical;
        }

        let score = score.clamp(0.0, MAX_SCORE as f64);
        if score >= self.low {
            RiskTier::Low
        } else if score >= self.moderate {
            RiskTier::Moderate
        } else if score >= self.high {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }
}

/// Classify against the default thresholds, returning `(label, color)`.
pub fn classify(score: f64) -> (&'static str, &'static str) {
    let tier = RiskThresholds::default().classify(score);
    (tier.label(), tier.color())
}
