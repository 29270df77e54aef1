use crate::engine::domain::DomainProfile;
use crate::model::config::SessionConfig;
use crate::model::scenario::Scenario;
use crate::model::turn::HistoryLog;

/// Builds every prompt sent to the content generator.
/// This struct is intentionally dumb: it only formats text.
/// No parsing, no networking, no engine logic.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn scenario(config: &SessionConfig, profile: &DomainProfile) -> String {
        let mut prompt = String::new();

        prompt.push_str(
            "You are the scenario director for an interactive training \
             simulation.\n\n",
        );
        prompt.push_str(&format!(
            "Create {} at {} difficulty. The trainee plays: {}.\n\n",
            profile.premise,
            config.difficulty.label().to_lowercase(),
            config.player_role
        ));

        prompt.push_str(
            "Respond with ONLY a JSON object, no commentary, in this shape:\n\
             {\n\
               \"title\": \"short scenario title\",\n\
               \"narrative_context\": \"2-3 paragraphs setting the scene\",\n\
               \"participants\": [{\"name\": \"\", \"role\": \"\", \"objective\": \"\"}],\n\
               \"decision_options\": [{\"label\": \"\", \"description\": \"\", \"consequence_hints\": [\"\"]}],\n\
               \"goal_threshold\": 100\n\
             }\n\n",
        );
        prompt.push_str(
            "Include the trainee and at least one counterpart in \
             participants. Offer 3-4 decision options. goal_threshold is the \
             positive score a strong performance would accumulate.\n",
        );

        prompt
    }

    pub fn feedback(
        scenario: &Scenario,
        history: &HistoryLog,
        user_action: &str,
        profile: &DomainProfile,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are a {} coach observing a training simulation.\n\n",
            profile.kind.label().to_lowercase()
        ));
        push_scene(&mut prompt, scenario);
        push_transcript(&mut prompt, history);
        push_user_action(&mut prompt, user_action);

        prompt.push_str(&format!(
            "Score the trainee's action on these tactics: {}.\n",
            profile.tactics.join(", ")
        ));
        prompt.push_str(
            "Respond with ONLY JSON:\n\
             {\"feedback\": \"one or two coaching sentences\", \
             \"tactic_deltas\": {\"<tactic>\": <signed integer, -10..10>}}\n",
        );

        prompt
    }

    pub fn counterpart_turn(
        scenario: &Scenario,
        history: &HistoryLog,
        user_action: &str,
        profile: &DomainProfile,
    ) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are {} in an interactive training simulation. Stay in \
             character. Never speak or act for the trainee.\n\n",
            profile.counterpart_label
        ));
        push_scene(&mut prompt, scenario);
        push_transcript(&mut prompt, history);
        push_user_action(&mut prompt, user_action);

        prompt.push_str(
            "Respond with ONLY JSON:\n\
             {\n\
               \"reply\": \"what the counterpart says or how the situation develops\",\n\
               \"narrative_update\": \"optional replacement scene description\",\n\
               \"decision_options\": [3-4 fresh options, same shape as the scenario's],\n\
               \"tactic_deltas\": {\"<tactic>\": <signed integer>}\n\
             }\n",
        );

        prompt
    }

    /// The cheap per-turn termination probe. Deliberately tiny.
    pub fn outcome_probe(history: &HistoryLog) -> String {
        let mut prompt = String::new();

        prompt.push_str("Judge this training-simulation transcript.\n\n");
        push_transcript(&mut prompt, history);
        prompt.push_str(
            "Has the exchange reached a decisive end?\n\
             Respond with ONLY JSON: {\"outcome\": \"win\" | \"lose\" | \"ongoing\"}\n\
             Use \"ongoing\" unless one side has clearly prevailed.\n",
        );

        prompt
    }

    pub fn outcome_classification(history: &HistoryLog, profile: &DomainProfile) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are assessing a completed {} training session.\n\n",
            profile.kind.label().to_lowercase()
        ));
        push_transcript(&mut prompt, history);
        prompt.push_str(
            "Respond with ONLY JSON:\n\
             {\"effectiveness\": <0-100>, \"outcome\": \"win\" | \"lose\" | \"draw\", \
             \"reason\": \"one sentence\", \"summary\": \"2-3 sentence recap\"}\n",
        );

        prompt
    }

    pub fn tactic_analysis(history: &HistoryLog, profile: &DomainProfile) -> String {
        let mut prompt = String::new();

        prompt.push_str("Rate the trainee's performance in this transcript.\n\n");
        push_transcript(&mut prompt, history);
        prompt.push_str(&format!(
            "Rate each of these tactics from 1 to 10, with a supporting \
             example from the transcript: {}.\n",
            profile.tactics.join(", ")
        ));
        prompt.push_str(
            "Respond with ONLY JSON:\n\
             {\"tactics\": [{\"name\": \"\", \"score\": <1-10>, \"example\": \"\"}]}\n",
        );

        prompt
    }

    pub fn improvement_advice(history: &HistoryLog, profile: &DomainProfile) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are a {} coach writing a short debrief note.\n\n",
            profile.kind.label().to_lowercase()
        ));
        push_transcript(&mut prompt, history);
        prompt.push_str(
            "In 3-4 sentences, tell the trainee the single most useful thing \
             to practice before their next session. Plain text is fine.\n",
        );

        prompt
    }

    pub fn illustration(scenario: &Scenario) -> String {
        format!(
            "A professional illustration for a training scenario titled \
             \"{}\". Scene: {}",
            scenario.title,
            scenario.narrative_context.chars().take(300).collect::<String>()
        )
    }
}

fn push_scene(prompt: &mut String, scenario: &Scenario) {
    prompt.push_str("SCENARIO:\n");
    prompt.push_str(&format!("Title: {}\n", scenario.title));
    prompt.push_str(&scenario.narrative_context);
    prompt.push_str("\n\nPARTICIPANTS:\n");
    for p in &scenario.participants {
        prompt.push_str(&format!("- {} ({}): {}\n", p.name, p.role, p.objective));
    }
    prompt.push('\n');
}

fn push_transcript(prompt: &mut String, history: &HistoryLog) {
    if history.is_empty() {
        return;
    }
    prompt.push_str("TRANSCRIPT SO FAR:\n");
    prompt.push_str(&history.render_transcript());
    prompt.push('\n');
}

fn push_user_action(prompt: &mut String, user_action: &str) {
    prompt.push_str("TRAINEE'S ACTION:\n");
    prompt.push_str(user_action);
    prompt.push_str("\n\n");
}
