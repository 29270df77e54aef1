//! Builds the final debriefing after a session terminates.
//!
//! Three generator calls (outcome classification, tactic analysis,
//! improvement advice) run concurrently over the same history snapshot and
//! are joined before the report is assembled. Each call has a fallback, so a
//! debriefing is always produced and never partially emitted.

use std::thread;

use crate::engine::domain::DomainProfile;
use crate::engine::generator::{ContentGenerator, GenerationOptions};
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::response_parser::{parse_reply, ParsedReply};
use crate::model::debrief::{Debriefing, LetterGrade, Outcome};
use crate::model::metrics::MetricsState;
use crate::model::reply_decode::{
    decode_advice, decode_outcome_classification, decode_tactic_analysis,
    OutcomeClassification, TacticAssessment,
};
use crate::model::turn::HistoryLog;

/// Tactic scores above this are strengths; below `IMPROVEMENT_BELOW` are
/// improvement areas. Scores of exactly 6 or 7 land in neither bucket,
/// kept as shipped pending product confirmation.
const STRENGTH_ABOVE: i64 = 7;
const IMPROVEMENT_BELOW: i64 = 6;

pub fn synthesize(
    generator: &dyn ContentGenerator,
    profile: &DomainProfile,
    history: &HistoryLog,
    metrics: &MetricsState,
) -> Debriefing {
    let outcome_prompt = PromptBuilder::outcome_classification(history, profile);
    let tactics_prompt = PromptBuilder::tactic_analysis(history, profile);
    let advice_prompt = PromptBuilder::improvement_advice(history, profile);

    // Independent reads over one snapshot; join all three before assembling.
    let (classification, assessments, advice) = thread::scope(|s| {
        let outcome_call = s.spawn(|| {
            generate_parsed(generator, &outcome_prompt, &GenerationOptions::assessment())
                .as_ref()
                .and_then(decode_outcome_classification)
        });
        let tactics_call = s.spawn(|| {
            generate_parsed(generator, &tactics_prompt, &GenerationOptions::assessment())
                .as_ref()
                .and_then(|r| decode_tactic_analysis(r, profile.tactics))
        });
        let advice_call = s.spawn(|| {
            generate_parsed(generator, &advice_prompt, &GenerationOptions::narrative())
                .as_ref()
                .and_then(decode_advice)
        });

        (
            join_or_none(outcome_call),
            join_or_none(tactics_call),
            join_or_none(advice_call),
        )
    });

    assemble(classification, assessments, advice, history, metrics)
}

fn generate_parsed(
    generator: &dyn ContentGenerator,
    prompt: &str,
    options: &GenerationOptions,
) -> Option<ParsedReply> {
    let raw = match generator.generate(prompt, options) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("debrief call failed: {e}");
            return None;
        }
    };
    match parse_reply(&raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("debrief reply unusable: {e}");
            None
        }
    }
}

fn join_or_none<T>(handle: thread::ScopedJoinHandle<'_, Option<T>>) -> Option<T> {
    match handle.join() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("debrief worker panicked");
            None
        }
    }
}

fn assemble(
    classification: Option<OutcomeClassification>,
    assessments: Option<Vec<TacticAssessment>>,
    advice: Option<String>,
    history: &HistoryLog,
    metrics: &MetricsState,
) -> Debriefing {
    let exchanges = history
        .records()
        .iter()
        .filter(|r| r.speaker == crate::model::turn::Speaker::User)
        .count();

    let (effectiveness, llm_outcome, reason, summary) = match classification {
        Some(c) => (c.effectiveness, c.outcome, c.reason, c.summary),
        None => {
            // No judge verdict: fall back to session evidence, either goal
            // progress or the share of user turns when nothing was scored.
            let derived = if metrics.cumulative_score != 0 {
                metrics.progress as i64
            } else {
                (history.user_turn_fraction() * 100.0).round() as i64
            };
            (derived, None, None, None)
        }
    };

    let outcome = llm_outcome.unwrap_or_else(|| Outcome::from_effectiveness(effectiveness));

    let (strengths, areas_for_improvement) = match &assessments {
        Some(rows) => bucket_tactics(rows),
        None => (Vec::new(), Vec::new()),
    };

    let mut summary = summary.unwrap_or_else(|| {
        format!(
            "Session ended after {exchanges} exchange(s) with {}% of the goal reached.",
            metrics.progress
        )
    });
    if assessments.is_none() {
        summary.push_str(" Per-tactic analysis was unavailable for this session.");
    }

    Debriefing {
        summary,
        outcome,
        outcome_reason: reason.unwrap_or_else(|| {
            "Automatic assessment was unavailable; the outcome was derived from \
             the accumulated score."
                .into()
        }),
        strengths,
        areas_for_improvement,
        overall_score: effectiveness,
        letter_grade: LetterGrade::from_effectiveness(effectiveness),
        advice: advice.unwrap_or_else(|| {
            "Review the transcript and pick one exchange you would handle \
             differently next time."
                .into()
        }),
        transcript: history.snapshot(),
    }
}

fn bucket_tactics(rows: &[TacticAssessment]) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();
    for row in rows {
        if row.score > STRENGTH_ABOVE {
            strengths.push(row.name.clone());
        } else if row.score < IMPROVEMENT_BELOW {
            improvements.push(row.name.clone());
        }
    }
    (strengths, improvements)
}
