use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// A generated training scenario. Created once by the content generator at
/// session start, then updated field-by-field as turns resolve.
///
/// Participants are stable for the whole session; narrative and decision
/// options may be wholly replaced by a turn update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub title: String,

    #[serde(default, alias = "narrativeContext", alias = "context")]
    pub narrative_context: String,

    #[serde(default)]
    pub participants: Vec<Participant>,

    #[serde(default, alias = "decisionOptions", alias = "options")]
    pub decision_options: Vec<DecisionOption>,

    /// Score the trainee is working toward; progress is reported relative to
    /// this. Must be positive.
    #[serde(default, alias = "goalThreshold")]
    pub goal_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub objective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "consequenceHints", alias = "hints")]
    pub consequence_hints: Vec<String>,
}

/// The slice of a turn reply that rewrites scenario state. Absent fields
/// leave the current value in place; participants can never change here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioUpdate {
    #[serde(default, alias = "narrativeUpdate", alias = "narrative_context")]
    pub narrative_update: Option<String>,

    #[serde(default, alias = "decisionOptions", alias = "options")]
    pub decision_options: Option<Vec<DecisionOption>>,

    #[serde(default, alias = "goalThreshold")]
    pub goal_threshold: Option<i64>,
}

impl Scenario {
    /// Creation-time validation. A scenario that fails here is a
    /// configuration error: the session drops back to setup rather than
    /// limping along and dividing by zero later.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.title.trim().is_empty() {
            return Err(EngineError::Configuration("scenario has no title".into()));
        }
        if self.participants.is_empty() {
            return Err(EngineError::Configuration(
                "scenario has no participants".into(),
            ));
        }
        if self.decision_options.is_empty() {
            return Err(EngineError::Configuration(
                "scenario has no decision options".into(),
            ));
        }
        if self.goal_threshold <= 0 {
            return Err(EngineError::Configuration(format!(
                "goal_threshold must be positive, got {}",
                self.goal_threshold
            )));
        }
        Ok(())
    }

    pub fn apply_update(&mut self, update: ScenarioUpdate) {
        if let Some(narrative) = update.narrative_update {
            if !narrative.trim().is_empty() {
                self.narrative_context = narrative;
            }
        }
        if let Some(options) = update.decision_options {
            if !options.is_empty() {
                self.decision_options = options;
            }
        }
        if let Some(threshold) = update.goal_threshold {
            // A turn update may tighten or loosen the goal, but never break
            // the positive invariant established at creation.
            if threshold > 0 {
                self.goal_threshold = threshold;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Scenario {
        Scenario {
            title: "Vendor renewal".into(),
            narrative_context: "The annual contract is up.".into(),
            participants: vec![Participant {
                name: "Dana".into(),
                role: "Account manager".into(),
                objective: "Maximize contract value".into(),
            }],
            decision_options: vec![DecisionOption {
                label: "Open with a discount ask".into(),
                description: String::new(),
                consequence_hints: vec![],
            }],
            goal_threshold: 100,
        }
    }

    #[test]
    fn validate_rejects_zero_goal_threshold() {
        let mut s = scenario();
        s.goal_threshold = 0;
        assert!(matches!(
            s.validate(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn update_never_clears_options_or_goal() {
        let mut s = scenario();
        s.apply_update(ScenarioUpdate {
            narrative_update: Some(String::new()),
            decision_options: Some(vec![]),
            goal_threshold: Some(0),
        });
        assert_eq!(s.narrative_context, "The annual contract is up.");
        assert_eq!(s.decision_options.len(), 1);
        assert_eq!(s.goal_threshold, 100);
    }

    #[test]
    fn update_replaces_narrative_and_options() {
        let mut s = scenario();
        s.apply_update(ScenarioUpdate {
            narrative_update: Some("Dana counters hard.".into()),
            decision_options: Some(vec![DecisionOption {
                label: "Hold firm".into(),
                description: String::new(),
                consequence_hints: vec![],
            }]),
            goal_threshold: None,
        });
        assert_eq!(s.narrative_context, "Dana counters hard.");
        assert_eq!(s.decision_options[0].label, "Hold firm");
    }
}
