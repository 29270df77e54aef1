use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Counterpart,
    /// Coaching feedback on the user's last action; carries tactic scores.
    Feedback,
}

/// One entry in the session transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Strictly increasing and gapless within a session.
    pub sequence: u64,
    pub speaker: Speaker,
    pub content: String,
    pub timestamp_ms: u64,
    /// Tactic-name → signed delta attributed to this record, if scored.
    pub score_delta: Option<BTreeMap<String, i64>>,
}

/// Append-only transcript. Owns the sequence counter so ordering never
/// depends on process-wide state.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    records: Vec<TurnRecord>,
    next_sequence: u64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        speaker: Speaker,
        content: &str,
        score_delta: Option<BTreeMap<String, i64>>,
    ) {
        let record = TurnRecord {
            sequence: self.next_sequence,
            speaker,
            content: sanitize(content),
            timestamp_ms: now_ms(),
            score_delta,
        };
        self.next_sequence += 1;
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<TurnRecord> {
        self.records.clone()
    }

    /// Flat transcript used in prompts and the debrief calls.
    pub fn render_transcript(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            let tag = match record.speaker {
                Speaker::User => "TRAINEE",
                Speaker::Counterpart => "COUNTERPART",
                Speaker::Feedback => "COACH",
            };
            out.push_str(&format!("[{}] {}\n", tag, record.content));
        }
        out
    }

    /// How many of the exchanges so far came from the user. The synthesizer
    /// uses this as last-resort evidence when the outcome call fails.
    pub fn user_turn_fraction(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let user = self
            .records
            .iter()
            .filter(|r| r.speaker == Speaker::User)
            .count();
        user as f64 / self.records.len() as f64
    }
}

/// Generator output can carry control characters and stray whitespace;
/// transcripts keep plain printable text plus newlines.
fn sanitize(content: &str) -> String {
    content
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_strictly_increasing_and_gapless() {
        let mut log = HistoryLog::new();
        log.append(Speaker::User, "offer", None);
        log.append(Speaker::Counterpart, "counter", None);
        log.append(Speaker::Feedback, "good opener", None);

        let seqs: Vec<u64> = log.records().iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn append_never_rewrites_existing_records() {
        let mut log = HistoryLog::new();
        log.append(Speaker::User, "first", None);
        let before = log.records()[0].clone();

        log.append(Speaker::Counterpart, "second", None);
        log.append(Speaker::User, "third", None);

        assert_eq!(log.records()[0].content, before.content);
        assert_eq!(log.records()[0].sequence, before.sequence);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn sanitize_strips_control_chars_keeps_newlines() {
        let mut log = HistoryLog::new();
        log.append(Speaker::Counterpart, "  line one\u{7}\nline two  ", None);
        assert_eq!(log.records()[0].content, "line one\nline two");
    }
}
