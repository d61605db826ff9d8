//! Lighthouse-style performance score.

use crate::models::CoreWebVitals;

/// Good/poor thresholds of one metric, in milliseconds.
#[derive(Debug, Clone, Copy)]
struct Threshold {
    good: f64,
    poor: f64,
    weight: f64,
}

const FCP: Threshold = Threshold {
    good: 2000.0,
    poor: 4000.0,
    weight: 0.15,
};

const LCP: Threshold = Threshold {
    good: 2500.0,
    poor: 4500.0,
    weight: 0.25,
};

const TBT: Threshold = Threshold {
    good: 300.0,
    poor: 600.0,
    weight: 0.30,
};

/// Score of a single metric: 1 at or below `good`, 0 at or above `poor`,
/// linear in between.
pub fn metric_score(value: f64, good: f64, poor: f64) -> f64 {
    if value <= good {
        1.0
    } else if value >= poor {
        0.0
    } else {
        (poor - value) / (poor - good)
    }
}

/// Weighted score in `0..=100`.
///
/// Weights are normalized by their sum so a page that is good on every
/// metric scores 100.
pub fn performance_score(vitals: &CoreWebVitals) -> u32 {
    let parts = [
        (vitals.fcp_ms, FCP),
        (vitals.lcp_ms, LCP),
        (vitals.tbt_ms, TBT),
    ];

    let total_weight: f64 = parts.iter().map(|(_, t)| t.weight).sum();
    let weighted: f64 = parts
        .iter()
        .map(|(value, t)| metric_score(f64::from(*value), t.good, t.poor) * t.weight)
        .sum();

    (weighted / total_weight * 100.0).round() as u32
}

/// Qualitative band of a score.
pub fn score_label(score: u32) -> &'static str {
    match score {
        90.. => "Good",
        50..=89 => "Needs Improvement",
        _ => "Poor",
    }
}
