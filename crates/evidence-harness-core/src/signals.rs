//! Confidence signals for a final ranked result list.
//!
//! [`compute_signals`] reduces ranked results to a handful of numbers and a
//! weak/strong flag so a downstream consumer can decide whether to cite
//! confidently or hedge without inspecting raw scores.
//!
//! | Signal | Definition |
//! |--------|------------|
//! | `top_score` | score of `results[0]`, or `0.0` |
//! | `avg_top3` | mean score of the first `min(3, n)` results, or `0.0` |
//! | `strong_hit_count` | results (all of them) with `score >= strong_hit_threshold` |
//! | `is_weak` | no results, or any result content carries the low-confidence marker |
//!
//! `is_weak` is deliberately independent of the numeric thresholds. Callers
//! that want a threshold-based verdict use [`SignalThresholds::classify`].

use serde::Serialize;

use crate::models::{RankedResult, Signals};

/// Marker a store or an earlier stage embeds in passage text to flag it as
/// low confidence.
pub const DEFAULT_LOW_CONFIDENCE_MARKER: &str = "WARN:";

/// Thresholds for the confidence calculator. Built once from configuration
/// and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalThresholds {
    /// Score at or above which a result counts as a strong hit.
    pub strong_hit_threshold: f64,
    /// A top score below this is distrusted.
    pub min_top_score: f64,
    /// Floor for the average of the top three.
    pub weak_bundle_avg: f64,
    /// Strong hits needed to call a bundle strong.
    pub min_strong_hits: usize,
    /// Content marker that forces `is_weak`. Empty disables the check.
    pub low_confidence_marker: String,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_hit_threshold: 0.62,
            min_top_score: 0.55,
            weak_bundle_avg: 0.5,
            min_strong_hits: 2,
            low_confidence_marker: DEFAULT_LOW_CONFIDENCE_MARKER.to_string(),
        }
    }
}

/// Threshold-based verdict on a result bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Strong,
    Weak,
}

impl SignalThresholds {
    /// Combine the raw signals with the numeric thresholds.
    ///
    /// Weak when `is_weak` is set, the top score is under `min_top_score`,
    /// the top-3 average is under `weak_bundle_avg`, or there are fewer than
    /// `min_strong_hits` strong hits.
    pub fn classify(&self, signals: &Signals) -> Confidence {
        if signals.is_weak
            || signals.top_score < self.min_top_score
            || signals.avg_top3 < self.weak_bundle_avg
            || signals.strong_hit_count < self.min_strong_hits
        {
            Confidence::Weak
        } else {
            Confidence::Strong
        }
    }
}

/// Compute confidence signals for a rank-ordered result list.
pub fn compute_signals(results: &[RankedResult], thresholds: &SignalThresholds) -> Signals {
    if results.is_empty() {
        return Signals::empty();
    }

    let top_score = results[0].score;
    let top3 = &results[..results.len().min(3)];
    let avg_top3 = top3.iter().map(|r| r.score).sum::<f64>() / top3.len() as f64;
    let strong_hit_count = results
        .iter()
        .filter(|r| r.score >= thresholds.strong_hit_threshold)
        .count();

    let marker = thresholds.low_confidence_marker.as_str();
    let flagged = !marker.is_empty() && results.iter().any(|r| r.content.contains(marker));

    Signals {
        top_score,
        avg_top3,
        strong_hit_count,
        is_weak: flagged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, SourceTier};

    fn ranked(scores: &[f64]) -> Vec<RankedResult> {
        RankedResult::from_ordered(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| Candidate {
                    id: format!("p{}", i),
                    content: format!("passage number {}", i),
                    relevance_score: *s,
                    locator: serde_json::Value::Null,
                    source_tier: SourceTier::Dense,
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_results() {
        let s = compute_signals(&[], &SignalThresholds::default());
        assert_eq!(
            s,
            Signals {
                top_score: 0.0,
                avg_top3: 0.0,
                strong_hit_count: 0,
                is_weak: true,
            }
        );
    }

    #[test]
    fn test_basic_signals() {
        let results = ranked(&[0.91, 0.89, 0.88, 0.80, 0.75, 0.60]);
        let s = compute_signals(&results, &SignalThresholds::default());
        assert!((s.top_score - 0.91).abs() < 1e-9);
        assert!((s.avg_top3 - (0.91 + 0.89 + 0.88) / 3.0).abs() < 1e-9);
        assert_eq!(s.strong_hit_count, 5);
        assert!(!s.is_weak);
    }

    #[test]
    fn test_fewer_than_three_results() {
        let s = compute_signals(&ranked(&[0.8, 0.4]), &SignalThresholds::default());
        assert!((s.avg_top3 - 0.6).abs() < 1e-9);
        let s = compute_signals(&ranked(&[0.3]), &SignalThresholds::default());
        assert!((s.avg_top3 - 0.3).abs() < 1e-9);
        assert!((s.top_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_strong_hits_counted_beyond_top3_and_inclusive() {
        let thresholds = SignalThresholds {
            strong_hit_threshold: 0.5,
            ..Default::default()
        };
        let s = compute_signals(&ranked(&[0.9, 0.1, 0.1, 0.5, 0.7]), &thresholds);
        assert_eq!(s.strong_hit_count, 3);
    }

    #[test]
    fn test_marker_forces_weak() {
        let mut results = ranked(&[0.95, 0.9]);
        results[1].content = "WARN: source page was partially unreadable".to_string();
        let s = compute_signals(&results, &SignalThresholds::default());
        assert!(s.is_weak);
        assert!((s.top_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_empty_marker_disables_check() {
        let thresholds = SignalThresholds {
            low_confidence_marker: String::new(),
            ..Default::default()
        };
        let s = compute_signals(&ranked(&[0.2]), &thresholds);
        assert!(!s.is_weak);
    }

    #[test]
    fn test_avg_top3_never_exceeds_top_score_for_sorted_scores() {
        let cases: [&[f64]; 5] = [
            &[0.9],
            &[0.9, 0.9, 0.9],
            &[0.91, 0.2, 0.1, 0.05],
            &[5.0, 4.5, -1.0],
            &[0.4, 0.4, 0.39, 0.39, 0.1],
        ];
        for scores in cases {
            let s = compute_signals(&ranked(scores), &SignalThresholds::default());
            assert!(s.avg_top3 <= s.top_score + 1e-12, "scores={:?}", scores);
        }
    }

    #[test]
    fn test_classify() {
        let thresholds = SignalThresholds::default();
        let strong = Signals {
            top_score: 0.9,
            avg_top3: 0.8,
            strong_hit_count: 3,
            is_weak: false,
        };
        assert_eq!(thresholds.classify(&strong), Confidence::Strong);
        assert_eq!(
            thresholds.classify(&Signals {
                is_weak: true,
                ..strong
            }),
            Confidence::Weak
        );
        assert_eq!(
            thresholds.classify(&Signals {
                top_score: 0.5,
                ..strong
            }),
            Confidence::Weak
        );
        assert_eq!(
            thresholds.classify(&Signals {
                avg_top3: 0.4,
                ..strong
            }),
            Confidence::Weak
        );
        assert_eq!(
            thresholds.classify(&Signals {
                strong_hit_count: 1,
                ..strong
            }),
            Confidence::Weak
        );
        assert_eq!(thresholds.classify(&Signals::empty()), Confidence::Weak);
    }
}
