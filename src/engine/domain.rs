use crate::model::config::DomainKind;

/// Everything a training domain contributes: a counterpart persona, prompt
/// framing, and the tactic vocabulary that gets scored. The turn engine is
/// the same state machine for all five.
pub struct DomainProfile {
    pub kind: DomainKind,
    /// What the generated counterpart is, for prompts and the UI header.
    pub counterpart_label: &'static str,
    /// One-line premise handed to the scenario prompt.
    pub premise: &'static str,
    /// Skill dimensions scored per turn and analyzed in the debrief.
    pub tactics: &'static [&'static str],
}

const NEGOTIATION: DomainProfile = DomainProfile {
    kind: DomainKind::Negotiation,
    counterpart_label: "the opposing negotiator",
    premise: "a high-stakes business negotiation with competing interests \
              and room for a creative deal",
    tactics: &["Assertiveness", "Empathy", "Framing", "Concession Strategy"],
};

const CRISIS_RESPONSE: DomainProfile = DomainProfile {
    kind: DomainKind::CrisisResponse,
    counterpart_label: "the situation and the people caught in it",
    premise: "an unfolding organizational crisis that escalates if handled \
              poorly and stabilizes if handled well",
    tactics: &["Decisiveness", "Communication", "Prioritization", "Composure"],
};

const CYBERSECURITY: DomainProfile = DomainProfile {
    kind: DomainKind::Cybersecurity,
    counterpart_label: "the incident as it develops",
    premise: "a security incident in progress: partial evidence, an active \
              adversary, and pressure to contain without breaking production",
    tactics: &["Triage", "Containment", "Evidence Handling", "Stakeholder Updates"],
};

const PITCH: DomainProfile = DomainProfile {
    kind: DomainKind::Pitch,
    counterpart_label: "a skeptical investor panel",
    premise: "an investor pitch meeting where the panel pushes on numbers, \
              market and team",
    tactics: &["Clarity", "Storytelling", "Handling Objections", "Credibility"],
};

const PERFORMANCE_CHALLENGE: DomainProfile = DomainProfile {
    kind: DomainKind::PerformanceChallenge,
    counterpart_label: "the employee across the table",
    premise: "a difficult performance conversation with a valued but \
              struggling team member",
    tactics: &["Directness", "Empathy", "Goal Setting", "Listening"],
};

impl DomainKind {
    pub fn profile(&self) -> &'static DomainProfile {
        match self {
            DomainKind::Negotiation => &NEGOTIATION,
            DomainKind::CrisisResponse => &CRISIS_RESPONSE,
            DomainKind::Cybersecurity => &CYBERSECURITY,
            DomainKind::Pitch => &PITCH,
            DomainKind::PerformanceChallenge => &PERFORMANCE_CHALLENGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_has_a_profile_with_tactics() {
        for kind in DomainKind::ALL {
            let profile = kind.profile();
            assert_eq!(profile.kind, kind);
            assert!(!profile.tactics.is_empty());
        }
    }
}
