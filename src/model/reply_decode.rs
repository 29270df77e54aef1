//! Decode cleaned generator replies into typed payloads.
//!
//! The parser (`engine::response_parser`) only cleans and classifies; the
//! functions here know which fields each call is supposed to carry and which
//! absences are recoverable. Tactic names are matched case-insensitively
//! against the domain vocabulary instead of reshaping whole objects.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::error::EngineError;
use crate::engine::response_parser::{get_ci, require_str, ParsedReply};
use crate::model::debrief::Outcome;
use crate::model::scenario::{Scenario, ScenarioUpdate};

/// Counterpart reply for one turn: what they say, how the scene shifts, and
/// the tactic deltas earned by the user's action.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    pub update: ScenarioUpdate,
    pub tactic_deltas: BTreeMap<String, i64>,
}

/// Coaching feedback on the user's last action.
#[derive(Debug, Clone)]
pub struct FeedbackReply {
    pub feedback: String,
    pub tactic_deltas: BTreeMap<String, i64>,
}

/// One row of the debrief tactic analysis.
#[derive(Debug, Clone)]
pub struct TacticAssessment {
    pub name: String,
    /// 1–10.
    pub score: i64,
    pub example: Option<String>,
}

pub fn decode_scenario(reply: &ParsedReply) -> Result<Scenario, EngineError> {
    let value = reply
        .as_json()
        .ok_or_else(|| EngineError::Parse("expected a JSON scenario".into()))?;

    serde_json::from_value::<Scenario>(value.clone())
        .map_err(|e| EngineError::Parse(format!("scenario did not decode: {e}")))
}

pub fn decode_turn_reply(
    reply: &ParsedReply,
    vocabulary: &[&str],
) -> Result<TurnReply, EngineError> {
    let value = reply
        .as_json()
        .ok_or_else(|| EngineError::MissingField("reply".into()))?;

    let text = require_str(value, "reply")?;
    let update = serde_json::from_value::<ScenarioUpdate>(value.clone())
        .unwrap_or_default();

    Ok(TurnReply {
        reply: text,
        update,
        tactic_deltas: decode_tactic_deltas(value, vocabulary),
    })
}

/// Feedback tolerates prose: if the generator ignored the JSON instruction
/// the cleaned text still makes a usable coach line, just unscored.
pub fn decode_feedback(reply: &ParsedReply, vocabulary: &[&str]) -> FeedbackReply {
    match reply {
        ParsedReply::Json(value) => FeedbackReply {
            feedback: require_str(value, "feedback")
                .unwrap_or_else(|_| "No specific feedback this turn.".into()),
            tactic_deltas: decode_tactic_deltas(value, vocabulary),
        },
        ParsedReply::Text(text) => FeedbackReply {
            feedback: text.clone(),
            tactic_deltas: BTreeMap::new(),
        },
    }
}

/// The cheap per-turn outcome probe. Anything that is not a clear win or
/// loss reads as "still going"; an unreadable probe never fails a turn.
pub fn decode_probe_outcome(reply: &ParsedReply) -> Option<Outcome> {
    let value = reply.as_json()?;
    let verdict = get_ci(value, "outcome")?.as_str()?;
    decode_outcome_word(verdict)
}

pub fn decode_outcome_word(word: &str) -> Option<Outcome> {
    match word.trim().to_ascii_lowercase().as_str() {
        "win" | "won" | "favorable" => Some(Outcome::Win),
        "lose" | "loss" | "lost" | "unfavorable" => Some(Outcome::Lose),
        "draw" | "ongoing" | "undecided" => Some(Outcome::Draw),
        _ => None,
    }
}

/// Debrief outcome classification: effectiveness score plus the generator's
/// own verdict and reasoning when present.
pub struct OutcomeClassification {
    pub effectiveness: i64,
    pub outcome: Option<Outcome>,
    pub reason: Option<String>,
    pub summary: Option<String>,
}

pub fn decode_outcome_classification(reply: &ParsedReply) -> Option<OutcomeClassification> {
    let value = reply.as_json()?;
    let effectiveness = get_ci(value, "effectiveness").and_then(as_i64)?;

    Some(OutcomeClassification {
        effectiveness,
        outcome: get_ci(value, "outcome")
            .and_then(|v| v.as_str())
            .and_then(decode_outcome_word),
        reason: opt_string(value, "reason"),
        summary: opt_string(value, "summary"),
    })
}

/// Tactic analysis rows. Accepts either
/// `{"tactics": [{"name": …, "score": …, "example": …}, …]}` or a flat
/// `{"tactics": {"Assertiveness": 8, …}}` map; names are canonicalized
/// against the vocabulary.
pub fn decode_tactic_analysis(
    reply: &ParsedReply,
    vocabulary: &[&str],
) -> Option<Vec<TacticAssessment>> {
    let value = reply.as_json()?;
    let tactics = get_ci(value, "tactics")?;

    let mut out = Vec::new();
    match tactics {
        Value::Array(rows) => {
            for row in rows {
                let Some(name) = get_ci(row, "name").and_then(|v| v.as_str()) else {
                    continue;
                };
                let Some(score) = get_ci(row, "score").and_then(as_i64) else {
                    continue;
                };
                out.push(TacticAssessment {
                    name: canonical_tactic(name, vocabulary),
                    score,
                    example: opt_string(row, "example"),
                });
            }
        }
        Value::Object(map) => {
            for (name, score) in map {
                let Some(score) = as_i64(score) else { continue };
                out.push(TacticAssessment {
                    name: canonical_tactic(name, vocabulary),
                    score,
                    example: None,
                });
            }
        }
        _ => return None,
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

pub fn decode_advice(reply: &ParsedReply) -> Option<String> {
    match reply {
        ParsedReply::Json(value) => opt_string(value, "advice"),
        ParsedReply::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        ParsedReply::Text(_) => None,
    }
}

/// Signed per-tactic deltas attached to a turn or feedback payload. Missing
/// or malformed entries are dropped rather than failing the call.
pub fn decode_tactic_deltas(value: &Value, vocabulary: &[&str]) -> BTreeMap<String, i64> {
    let mut deltas = BTreeMap::new();

    let Some(raw) = get_ci(value, "tactic_deltas")
        .or_else(|| get_ci(value, "scores"))
        .and_then(|v| v.as_object())
    else {
        return deltas;
    };

    for (name, delta) in raw {
        if let Some(delta) = as_i64(delta) {
            deltas.insert(canonical_tactic(name, vocabulary), delta);
        }
    }
    deltas
}

/// Map a generator-spelled tactic name onto the domain vocabulary when it
/// matches case-insensitively; unknown tactics pass through verbatim.
fn canonical_tactic(name: &str, vocabulary: &[&str]) -> String {
    let trimmed = name.trim();
    vocabulary
        .iter()
        .find(|known| known.eq_ignore_ascii_case(trimmed))
        .map(|known| known.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn as_i64(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    // Scores occasionally arrive as floats or quoted numbers.
    if let Some(f) = value.as_f64() {
        return Some(f.round() as i64);
    }
    value.as_str()?.trim().parse().ok()
}

fn opt_string(value: &Value, key: &str) -> Option<String> {
    get_ci(value, key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
