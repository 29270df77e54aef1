use serde::{Deserialize, Serialize};

use crate::model::turn::TurnRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    /// Effectiveness above 50 is favorable. The bucketing is exact; the
    /// debrief view and tests depend on it.
    pub fn from_effectiveness(score: i64) -> Self {
        if score > 50 {
            Outcome::Win
        } else {
            Outcome::Lose
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Win => "Win",
            Outcome::Lose => "Loss",
            Outcome::Draw => "Draw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
}

impl LetterGrade {
    /// >85 → A, >70 → B, >50 → C, else D. All boundaries exclusive, so an
    /// effectiveness of exactly 70 grades C.
    pub fn from_effectiveness(score: i64) -> Self {
        if score > 85 {
            LetterGrade::A
        } else if score > 70 {
            LetterGrade::B
        } else if score > 50 {
            LetterGrade::C
        } else {
            LetterGrade::D
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
        }
    }
}

/// Final report for a completed session. Built exactly once by the
/// synthesizer, immutable afterwards, discarded on reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debriefing {
    pub summary: String,
    pub outcome: Outcome,
    pub outcome_reason: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub overall_score: i64,
    pub letter_grade: LetterGrade,
    pub advice: String,
    pub transcript: Vec<TurnRecord>,
}
