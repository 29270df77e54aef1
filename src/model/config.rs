use serde::{Deserialize, Serialize};

/// The five training domains. Each one only contributes prompt templates and
/// a tactic vocabulary; the engine itself is domain-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Negotiation,
    CrisisResponse,
    Cybersecurity,
    Pitch,
    PerformanceChallenge,
}

impl DomainKind {
    pub const ALL: [DomainKind; 5] = [
        DomainKind::Negotiation,
        DomainKind::CrisisResponse,
        DomainKind::Cybersecurity,
        DomainKind::Pitch,
        DomainKind::PerformanceChallenge,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DomainKind::Negotiation => "Negotiation",
            DomainKind::CrisisResponse => "Crisis Response",
            DomainKind::Cybersecurity => "Cybersecurity Incident",
            DomainKind::Pitch => "Investor Pitch",
            DomainKind::PerformanceChallenge => "Performance Challenge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Expert,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Expert => "Expert",
        }
    }
}

/// Everything the engine needs to start a session. Collected in the setup
/// view; no generator calls happen until this is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Role the trainee plays (e.g. "procurement lead", "incident commander").
    pub player_role: String,
    pub domain: DomainKind,
    pub difficulty: Difficulty,

    /// Enables the out-of-band wrap-up token. Never exposed as a UI control
    /// on the session screens; toggled in settings only.
    pub developer_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_role: "Negotiator".into(),
            domain: DomainKind::Negotiation,
            difficulty: Difficulty::Intermediate,
            developer_mode: false,
        }
    }
}
