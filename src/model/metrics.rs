use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// Session score state, derived from the transcript but kept separately so
/// the UI reads it in O(1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsState {
    /// Percent of the goal threshold reached, clamped to 0..=100.
    pub progress: u32,
    /// Running total across all tactics. Signed and unbounded.
    pub cumulative_score: i64,
    pub tactic_scores: BTreeMap<String, i64>,
}

impl MetricsState {
    /// The sole mutator. Called exactly once per resolved turn; an empty
    /// delta map is a valid call that still recomputes progress (the goal
    /// threshold may have moved).
    pub fn apply_delta(
        &mut self,
        deltas: &BTreeMap<String, i64>,
        goal_threshold: i64,
    ) -> Result<(), EngineError> {
        if goal_threshold <= 0 {
            return Err(EngineError::Configuration(format!(
                "cannot compute progress against goal_threshold {goal_threshold}"
            )));
        }

        for (tactic, delta) in deltas {
            self.cumulative_score += delta;
            *self.tactic_scores.entry(tactic.clone()).or_insert(0) += delta;
        }

        let ratio = self.cumulative_score as f64 / goal_threshold as f64 * 100.0;
        self.progress = ratio.round().clamp(0.0, 100.0) as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn accumulates_per_tactic_and_total() {
        let mut m = MetricsState::default();
        m.apply_delta(&deltas(&[("Assertiveness", 40)]), 100).unwrap();
        m.apply_delta(&deltas(&[("Assertiveness", 40), ("Empathy", -10)]), 100)
            .unwrap();

        assert_eq!(m.cumulative_score, 70);
        assert_eq!(m.tactic_scores["Assertiveness"], 80);
        assert_eq!(m.tactic_scores["Empathy"], -10);
        assert_eq!(m.progress, 70);
    }

    #[test]
    fn progress_stays_clamped_under_any_sequence() {
        let mut m = MetricsState::default();
        let swings = [
            deltas(&[("Assertiveness", 10_000)]),
            deltas(&[("Empathy", -50_000)]),
            deltas(&[("Assertiveness", 3)]),
            deltas(&[]),
            deltas(&[("Clarity", i64::from(i32::MAX))]),
        ];
        for d in &swings {
            m.apply_delta(d, 100).unwrap();
            assert!(m.progress <= 100, "progress {} escaped range", m.progress);
        }
    }

    #[test]
    fn empty_delta_recomputes_against_new_threshold() {
        let mut m = MetricsState::default();
        m.apply_delta(&deltas(&[("Assertiveness", 50)]), 100).unwrap();
        assert_eq!(m.progress, 50);

        // Goal tightened mid-session; a no-op delta must re-derive progress.
        m.apply_delta(&deltas(&[]), 50).unwrap();
        assert_eq!(m.progress, 100);
    }

    #[test]
    fn zero_threshold_is_a_configuration_error() {
        let mut m = MetricsState::default();
        let err = m.apply_delta(&deltas(&[("Empathy", 1)]), 0).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        // Nothing was applied.
        assert_eq!(m.cumulative_score, 0);
    }
}
