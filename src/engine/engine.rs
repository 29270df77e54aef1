use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::engine::error::EngineError;
use crate::engine::generator::{ContentGenerator, GenerationOptions};
use crate::engine::illustration::fetch_illustration;
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::protocol::{
    EngineCommand, EnginePhase, EngineResponse, ResolvedTurn,
};
use crate::engine::response_parser::parse_reply;
use crate::engine::synthesizer::synthesize;
use crate::model::config::{DomainKind, SessionConfig};
use crate::model::debrief::Outcome;
use crate::model::metrics::MetricsState;
use crate::model::reply_decode::{
    decode_feedback, decode_probe_outcome, decode_scenario, decode_turn_reply,
};
use crate::model::scenario::Scenario;
use crate::model::turn::{HistoryLog, Speaker};

/// Turn-count ceiling: the session terminates after this many exchanges
/// even if the probe never calls a decisive result.
pub const MAX_EXCHANGES: u32 = 5;

/// Out-of-band fast-forward token. Honored only when the session config has
/// `developer_mode` set; no UI affordance sends it. It skips the current
/// turn's generator calls and jumps straight to the debrief.
pub const WRAPUP_TOKEN: &str = "::wrapup";

/// The turn-based state machine driving one training session. Runs on its
/// own thread; the UI talks to it exclusively through the command/response
/// channels. Generator calls run on short-lived workers that post results
/// back into the command queue, so this thread never blocks on the network
/// and a `Reset` can always get through.
pub struct Engine {
    rx: Receiver<EngineCommand>,
    tx: Sender<EngineResponse>,
    /// Clone of our own command sender, handed to worker threads.
    worker_tx: Sender<EngineCommand>,
    generator: Arc<dyn ContentGenerator>,

    phase: EnginePhase,
    /// Bumped on every reset; results stamped with an older epoch are stale
    /// and get dropped instead of applied.
    epoch: u64,
    scenario_request_outstanding: bool,

    config: SessionConfig,
    scenario: Option<Scenario>,
    history: HistoryLog,
    metrics: MetricsState,
    exchanges: u32,
}

impl Engine {
    pub fn new(
        rx: Receiver<EngineCommand>,
        worker_tx: Sender<EngineCommand>,
        tx: Sender<EngineResponse>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            rx,
            tx,
            worker_tx,
            generator,
            phase: EnginePhase::Setup,
            epoch: 0,
            scenario_request_outstanding: false,
            config: SessionConfig::default(),
            scenario: None,
            history: HistoryLog::new(),
            metrics: MetricsState::default(),
            exchanges: 0,
        }
    }

    pub fn run(&mut self) {
        while let Ok(cmd) = self.rx.recv() {
            if !self.handle(cmd) {
                break;
            }
        }
        log::info!("engine thread exiting");
    }

    fn handle(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::Configure(config) => self.on_configure(config),
            EngineCommand::RequestScenario => self.on_request_scenario(),
            EngineCommand::SubmitChoice(index) => self.on_submit_choice(index),
            EngineCommand::SubmitFreeText(text) => self.on_submit_free_text(text),
            EngineCommand::Reset => self.on_reset(),
            EngineCommand::Shutdown => return false,

            EngineCommand::ScenarioArrived { epoch, result } => {
                self.on_scenario_arrived(epoch, result)
            }
            EngineCommand::TurnArrived { epoch, result } => {
                self.on_turn_arrived(epoch, result)
            }
            EngineCommand::DebriefArrived { epoch, debriefing } => {
                self.on_debrief_arrived(epoch, debriefing)
            }
            EngineCommand::IllustrationArrived { epoch, image } => {
                if epoch == self.epoch && self.phase != EnginePhase::Setup {
                    self.send(EngineResponse::IllustrationReady(image));
                } else {
                    log::debug!("dropping stale illustration");
                }
            }
        }
        true
    }

    /* =========================
       Setup & scenario creation
       ========================= */

    fn on_configure(&mut self, config: SessionConfig) {
        if self.phase != EnginePhase::Setup {
            self.reject("configuration can only change during setup");
            return;
        }
        log::info!(
            "session configured: {} / {} / {}",
            config.domain.label(),
            config.difficulty.label(),
            config.player_role
        );
        self.config = config;
    }

    fn on_request_scenario(&mut self) {
        let retrying = self.phase == EnginePhase::AwaitingScenario
            && !self.scenario_request_outstanding;
        if self.phase != EnginePhase::Setup && !retrying {
            self.reject("a scenario request is already in progress");
            return;
        }

        self.set_phase(EnginePhase::AwaitingScenario);
        self.scenario_request_outstanding = true;

        let generator = Arc::clone(&self.generator);
        let prompt = PromptBuilder::scenario(&self.config, self.config.domain.profile());
        let tx = self.worker_tx.clone();
        let epoch = self.epoch;
        thread::spawn(move || {
            let result = request_scenario(generator.as_ref(), &prompt);
            let _ = tx.send(EngineCommand::ScenarioArrived { epoch, result });
        });
    }

    fn on_scenario_arrived(
        &mut self,
        epoch: u64,
        result: Result<Scenario, EngineError>,
    ) {
        if epoch != self.epoch {
            log::warn!("dropping scenario from a previous session");
            return;
        }
        self.scenario_request_outstanding = false;
        if self.phase != EnginePhase::AwaitingScenario {
            log::warn!("scenario arrived in {:?}, dropping", self.phase);
            return;
        }

        let scenario = match result {
            Ok(scenario) => scenario,
            Err(e) => {
                log::warn!("scenario request failed: {e}");
                // Manual retry: stay in AwaitingScenario.
                self.send(EngineResponse::RecoverableError {
                    message: e.user_message(),
                });
                return;
            }
        };

        if let Err(e) = scenario.validate() {
            self.abort_session(e);
            return;
        }

        self.spawn_illustration(&scenario);
        self.scenario = Some(scenario.clone());
        self.send(EngineResponse::ScenarioChanged(scenario));
        self.set_phase(EnginePhase::ScenarioReady);
    }

    /* =========================
       Turn resolution
       ========================= */

    fn on_submit_choice(&mut self, index: usize) {
        if !self.can_accept_submission() {
            return;
        }
        let Some(scenario) = self.scenario.as_ref() else {
            self.reject("no scenario is active");
            return;
        };
        let Some(option) = scenario.decision_options.get(index) else {
            self.reject("that option no longer exists");
            return;
        };

        let action = if option.description.trim().is_empty() {
            option.label.clone()
        } else {
            format!("{} — {}", option.label, option.description)
        };
        self.start_turn(action);
    }

    fn on_submit_free_text(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            self.reject("nothing to submit");
            return;
        }

        if text == WRAPUP_TOKEN && self.config.developer_mode {
            // Reachable from an in-flight turn as well: the pending worker
            // result will find the phase moved on and be dropped.
            if matches!(
                self.phase,
                EnginePhase::ScenarioReady | EnginePhase::TurnInFlight
            ) {
                log::warn!("developer wrap-up token received, fast-forwarding");
                self.begin_termination();
            } else {
                self.reject("nothing to wrap up yet");
            }
            return;
        }

        if !self.can_accept_submission() {
            return;
        }
        self.start_turn(text);
    }

    fn can_accept_submission(&mut self) -> bool {
        match self.phase {
            EnginePhase::ScenarioReady => true,
            EnginePhase::TurnInFlight | EnginePhase::TurnResolved => {
                self.reject("hold on — the current turn is still being processed");
                false
            }
            _ => {
                self.reject("the session is not ready for an action");
                false
            }
        }
    }

    fn start_turn(&mut self, action: String) {
        let Some(scenario) = self.scenario.clone() else {
            self.reject("no scenario is active");
            return;
        };

        self.set_phase(EnginePhase::TurnInFlight);

        let generator = Arc::clone(&self.generator);
        let history = self.history.clone();
        let domain = self.config.domain;
        let tx = self.worker_tx.clone();
        let epoch = self.epoch;
        thread::spawn(move || {
            let result = resolve_turn(generator.as_ref(), domain, &scenario, &history, action);
            let _ = tx.send(EngineCommand::TurnArrived { epoch, result });
        });
    }

    fn on_turn_arrived(
        &mut self,
        epoch: u64,
        result: Result<ResolvedTurn, EngineError>,
    ) {
        if epoch != self.epoch {
            log::warn!("dropping turn resolved after reset");
            return;
        }
        if self.phase != EnginePhase::TurnInFlight {
            log::warn!("turn arrived in {:?}, dropping", self.phase);
            return;
        }

        match result {
            Ok(turn) => self.apply_resolved_turn(turn),
            Err(e) if e.is_recoverable() => {
                log::warn!("turn failed, rolling back: {e}");
                self.send(EngineResponse::RecoverableError {
                    message: e.user_message(),
                });
                self.set_phase(EnginePhase::ScenarioReady);
            }
            Err(e) => self.abort_session(e),
        }
    }

    /// The fixed application order for a successful turn: user record,
    /// feedback record, counterpart record, metric deltas, termination
    /// check. Runs only after every generator call for the turn succeeded,
    /// so a failed turn leaves history and metrics untouched.
    fn apply_resolved_turn(&mut self, turn: ResolvedTurn) {
        self.set_phase(EnginePhase::TurnResolved);

        self.history.append(Speaker::User, &turn.user_action, None);
        self.history.append(
            Speaker::Feedback,
            &turn.feedback.feedback,
            Some(turn.feedback.tactic_deltas.clone()),
        );
        let counterpart_deltas = (!turn.counterpart.tactic_deltas.is_empty())
            .then(|| turn.counterpart.tactic_deltas.clone());
        self.history
            .append(Speaker::Counterpart, &turn.counterpart.reply, counterpart_deltas);

        let goal_threshold = {
            let Some(scenario) = self.scenario.as_mut() else {
                return;
            };
            scenario.apply_update(turn.counterpart.update);
            scenario.goal_threshold
        };

        // One accumulator call per resolved turn, feedback and counterpart
        // deltas merged.
        let mut merged = turn.feedback.tactic_deltas;
        for (tactic, delta) in turn.counterpart.tactic_deltas {
            *merged.entry(tactic).or_insert(0) += delta;
        }
        if let Err(e) = self.metrics.apply_delta(&merged, goal_threshold) {
            self.abort_session(e);
            return;
        }

        self.exchanges += 1;
        log::debug!(
            "exchange {} applied, history at {} records",
            self.exchanges,
            self.history.len()
        );

        if let Some(scenario) = self.scenario.as_ref() {
            self.send(EngineResponse::ScenarioChanged(scenario.clone()));
        }
        self.send(EngineResponse::HistoryChanged(self.history.snapshot()));
        self.send(EngineResponse::MetricsChanged(self.metrics.clone()));

        let decisive = matches!(turn.probe, Some(Outcome::Win) | Some(Outcome::Lose));
        if self.exchanges >= MAX_EXCHANGES || decisive {
            self.begin_termination();
        } else {
            self.set_phase(EnginePhase::ScenarioReady);
        }
    }

    /* =========================
       Termination & reset
       ========================= */

    fn begin_termination(&mut self) {
        self.set_phase(EnginePhase::Terminating);

        let generator = Arc::clone(&self.generator);
        let domain = self.config.domain;
        let history = self.history.clone();
        let metrics = self.metrics.clone();
        let tx = self.worker_tx.clone();
        let epoch = self.epoch;
        thread::spawn(move || {
            let debriefing =
                synthesize(generator.as_ref(), domain.profile(), &history, &metrics);
            let _ = tx.send(EngineCommand::DebriefArrived {
                epoch,
                debriefing: Box::new(debriefing),
            });
        });
    }

    fn on_debrief_arrived(
        &mut self,
        epoch: u64,
        debriefing: Box<crate::model::debrief::Debriefing>,
    ) {
        if epoch != self.epoch {
            log::warn!("dropping debrief from a previous session");
            return;
        }
        if self.phase != EnginePhase::Terminating {
            log::warn!("debrief arrived in {:?}, dropping", self.phase);
            return;
        }
        self.set_phase(EnginePhase::Complete);
        self.send(EngineResponse::DebriefReady(debriefing));
    }

    fn on_reset(&mut self) {
        log::info!("session reset");
        self.epoch += 1;
        self.scenario = None;
        self.history = HistoryLog::new();
        self.metrics = MetricsState::default();
        self.exchanges = 0;
        self.scenario_request_outstanding = false;
        self.set_phase(EnginePhase::Setup);
    }

    /// Configuration failures end the session; the user starts over.
    fn abort_session(&mut self, error: EngineError) {
        log::error!("session aborted: {error}");
        let message = error.user_message();
        self.on_reset();
        self.send(EngineResponse::SessionAborted { message });
    }

    /* =========================
       Plumbing
       ========================= */

    fn spawn_illustration(&self, scenario: &Scenario) {
        let generator = Arc::clone(&self.generator);
        let scenario = scenario.clone();
        let tx = self.worker_tx.clone();
        let epoch = self.epoch;
        thread::spawn(move || match fetch_illustration(generator.as_ref(), &scenario) {
            Ok(image) => {
                let _ = tx.send(EngineCommand::IllustrationArrived { epoch, image });
            }
            Err(e) => log::warn!("illustration skipped: {e}"),
        });
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        if self.phase != phase {
            log::debug!("phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
            self.send(EngineResponse::PhaseChanged(phase));
        }
    }

    fn reject(&mut self, reason: &str) {
        self.send(EngineResponse::SubmissionRejected {
            reason: reason.to_string(),
        });
    }

    fn send(&self, response: EngineResponse) {
        let _ = self.tx.send(response);
    }
}

/* =========================
   Worker-side call sequences
   ========================= */

fn transport(e: anyhow::Error) -> EngineError {
    EngineError::Transport(e.to_string())
}

fn request_scenario(
    generator: &dyn ContentGenerator,
    prompt: &str,
) -> Result<Scenario, EngineError> {
    let raw = generator
        .generate(prompt, &GenerationOptions::narrative())
        .map_err(transport)?;
    decode_scenario(&parse_reply(&raw)?)
}

/// All generator calls for one turn, in order: coach feedback, counterpart
/// reply, then the cheap termination probe. A probe failure is not a turn
/// failure; an unreadable verdict reads as "still going".
fn resolve_turn(
    generator: &dyn ContentGenerator,
    domain: DomainKind,
    scenario: &Scenario,
    history: &HistoryLog,
    action: String,
) -> Result<ResolvedTurn, EngineError> {
    let profile = domain.profile();

    let feedback_prompt = PromptBuilder::feedback(scenario, history, &action, profile);
    let raw = generator
        .generate(&feedback_prompt, &GenerationOptions::narrative())
        .map_err(transport)?;
    let feedback = decode_feedback(&parse_reply(&raw)?, profile.tactics);

    let counterpart_prompt = PromptBuilder::counterpart_turn(scenario, history, &action, profile);
    let raw = generator
        .generate(&counterpart_prompt, &GenerationOptions::narrative())
        .map_err(transport)?;
    let counterpart = decode_turn_reply(&parse_reply(&raw)?, profile.tactics)?;

    // Probe over the transcript as it will look once this turn lands.
    let mut probe_history = history.clone();
    probe_history.append(Speaker::User, &action, None);
    probe_history.append(Speaker::Counterpart, &counterpart.reply, None);
    let probe_prompt = PromptBuilder::outcome_probe(&probe_history);
    let probe = match generator.generate(&probe_prompt, &GenerationOptions::assessment()) {
        Ok(raw) => parse_reply(&raw)
            .ok()
            .as_ref()
            .and_then(decode_probe_outcome),
        Err(e) => {
            log::warn!("outcome probe failed, treating as ongoing: {e}");
            None
        }
    };

    Ok(ResolvedTurn {
        user_action: action,
        feedback,
        counterpart,
        probe,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::debrief::LetterGrade;
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    /// Scripted generator for driving the engine end-to-end. Prompts are
    /// recognized by marker phrases from the prompt builder; each kind pops
    /// from its own reply queue.
    struct ScriptedGenerator {
        scenario_replies: Mutex<VecDeque<String>>,
        feedback_reply: String,
        counterpart_replies: Mutex<VecDeque<String>>,
        probe_replies: Mutex<VecDeque<String>>,
        counts: Mutex<BTreeMap<&'static str, u32>>,
        /// When set, counterpart calls block until the test sends a token.
        counterpart_gate: Option<Mutex<mpsc::Receiver<()>>>,
    }

    impl ScriptedGenerator {
        fn new() -> Self {
            Self {
                scenario_replies: Mutex::new(VecDeque::from([scenario_json()])),
                feedback_reply:
                    r#"{"feedback": "Solid move.", "tactic_deltas": {"Assertiveness": 40}}"#
                        .into(),
                counterpart_replies: Mutex::new(VecDeque::from(vec![
                    r#"{"reply": "Noted. Continue."}"#.to_string();
                    5
                ])),
                probe_replies: Mutex::new(VecDeque::new()),
                counts: Mutex::new(BTreeMap::new()),
                counterpart_gate: None,
            }
        }

        fn count(&self, kind: &'static str) -> u32 {
            *self.counts.lock().unwrap().get(kind).unwrap_or(&0)
        }

        fn pop(queue: &Mutex<VecDeque<String>>, kind: &str) -> anyhow::Result<String> {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted {kind} reply left"))
        }
    }

    impl ContentGenerator for ScriptedGenerator {
        fn generate(&self, prompt: &str, _: &GenerationOptions) -> anyhow::Result<String> {
            let kind = if prompt.contains("scenario director") {
                "scenario"
            } else if prompt.contains("coach observing") {
                "feedback"
            } else if prompt.contains("Stay in character") {
                "counterpart"
            } else if prompt.contains("decisive end") {
                "probe"
            } else if prompt.contains("assessing a completed") {
                "classification"
            } else if prompt.contains("Rate each of these tactics") {
                "tactics"
            } else if prompt.contains("debrief note") {
                "advice"
            } else {
                return Err(anyhow!("unrecognized prompt"));
            };
            *self.counts.lock().unwrap().entry(kind).or_insert(0) += 1;

            match kind {
                "scenario" => Self::pop(&self.scenario_replies, kind),
                "feedback" => Ok(self.feedback_reply.clone()),
                "counterpart" => {
                    if let Some(gate) = &self.counterpart_gate {
                        gate.lock().unwrap().recv().map_err(|_| anyhow!("gate closed"))?;
                    }
                    Self::pop(&self.counterpart_replies, kind)
                }
                "probe" => Ok(self
                    .probe_replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| r#"{"outcome": "ongoing"}"#.into())),
                "classification" => Ok(
                    r#"{"effectiveness": 80, "outcome": "win", "reason": "strong finish", "summary": "Good session."}"#
                        .into(),
                ),
                "tactics" => Ok(
                    r#"{"tactics": [{"name": "Assertiveness", "score": 9, "example": "turn one"}]}"#
                        .into(),
                ),
                "advice" => Ok("Keep practicing.".into()),
                _ => unreachable!(),
            }
        }
    }

    fn scenario_json() -> String {
        r#"{
            "title": "Vendor Standoff",
            "narrative_context": "The annual renewal is on the table.",
            "participants": [
                {"name": "Dana", "role": "Account manager", "objective": "Maximize value"}
            ],
            "decision_options": [
                {"label": "Anchor low", "description": "Open well under budget"},
                {"label": "Build rapport"}
            ],
            "goal_threshold": 100
        }"#
        .into()
    }

    fn start_engine(
        generator: Arc<dyn ContentGenerator>,
    ) -> (Sender<EngineCommand>, Receiver<EngineResponse>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let worker_tx = cmd_tx.clone();
        thread::spawn(move || {
            Engine::new(cmd_rx, worker_tx, resp_tx, generator).run();
        });
        (cmd_tx, resp_rx)
    }

    /// Collect responses until `stop` matches one (inclusive).
    fn drain_until(
        rx: &Receiver<EngineResponse>,
        mut stop: impl FnMut(&EngineResponse) -> bool,
    ) -> Vec<EngineResponse> {
        let mut seen = Vec::new();
        loop {
            let resp = rx
                .recv_timeout(RECV_TIMEOUT)
                .unwrap_or_else(|_| panic!("timed out; saw {seen:?}"));
            let done = stop(&resp);
            seen.push(resp);
            if done {
                return seen;
            }
        }
    }

    fn wait_for_phase(rx: &Receiver<EngineResponse>, phase: EnginePhase) -> Vec<EngineResponse> {
        drain_until(rx, |r| matches!(r, EngineResponse::PhaseChanged(p) if *p == phase))
    }

    fn begin_session(
        cmd: &Sender<EngineCommand>,
        rx: &Receiver<EngineResponse>,
        config: SessionConfig,
    ) {
        cmd.send(EngineCommand::Configure(config)).unwrap();
        cmd.send(EngineCommand::RequestScenario).unwrap();
        wait_for_phase(rx, EnginePhase::ScenarioReady);
    }

    #[test]
    fn scripted_two_turn_session_end_to_end() {
        let generator = Arc::new({
            let g = ScriptedGenerator::new();
            g.probe_replies.lock().unwrap().extend([
                r#"{"outcome": "ongoing"}"#.to_string(),
                r#"{"outcome": "win"}"#.to_string(),
            ]);
            g
        });
        let (cmd, rx) = start_engine(generator.clone());

        begin_session(&cmd, &rx, SessionConfig::default());

        cmd.send(EngineCommand::SubmitChoice(0)).unwrap();
        wait_for_phase(&rx, EnginePhase::ScenarioReady);

        cmd.send(EngineCommand::SubmitFreeText("I hold at my number.".into()))
            .unwrap();
        let responses = drain_until(&rx, |r| matches!(r, EngineResponse::DebriefReady(_)));

        let metrics = responses
            .iter()
            .rev()
            .find_map(|r| match r {
                EngineResponse::MetricsChanged(m) => Some(m.clone()),
                _ => None,
            })
            .expect("metrics update");
        assert_eq!(metrics.cumulative_score, 80);
        assert_eq!(metrics.progress, 80);

        let debrief = responses
            .iter()
            .find_map(|r| match r {
                EngineResponse::DebriefReady(d) => Some(d.clone()),
                _ => None,
            })
            .expect("debrief");
        assert_eq!(debrief.overall_score, 80);
        assert_eq!(debrief.letter_grade, LetterGrade::B);
        // user + feedback + counterpart per exchange.
        assert_eq!(debrief.transcript.len(), 6);

        // The probe ran after each turn; the debrief classification exactly once.
        assert_eq!(generator.count("probe"), 2);
        assert_eq!(generator.count("classification"), 1);
        assert_eq!(generator.count("tactics"), 1);
        assert_eq!(generator.count("advice"), 1);
    }

    #[test]
    fn failed_counterpart_call_rolls_the_turn_back() {
        let generator = Arc::new({
            let g = ScriptedGenerator::new();
            // First counterpart reply is prose with no "reply" field.
            g.counterpart_replies
                .lock()
                .unwrap()
                .push_front("I am lost, sorry.".into());
            g
        });
        let (cmd, rx) = start_engine(generator.clone());
        begin_session(&cmd, &rx, SessionConfig::default());

        cmd.send(EngineCommand::SubmitChoice(0)).unwrap();
        let responses = drain_until(&rx, |r| {
            matches!(r, EngineResponse::RecoverableError { .. })
        });

        // All-or-nothing: nothing was applied for the failed turn.
        assert!(!responses
            .iter()
            .any(|r| matches!(r, EngineResponse::HistoryChanged(_))));
        assert!(!responses
            .iter()
            .any(|r| matches!(r, EngineResponse::MetricsChanged(_))));
        wait_for_phase(&rx, EnginePhase::ScenarioReady);

        // Retry succeeds and history starts clean at sequence zero.
        cmd.send(EngineCommand::SubmitChoice(0)).unwrap();
        let responses = drain_until(&rx, |r| matches!(r, EngineResponse::HistoryChanged(_)));
        let history = responses
            .iter()
            .find_map(|r| match r {
                EngineResponse::HistoryChanged(h) => Some(h.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].sequence, 0);
        assert_eq!(history[0].speaker, Speaker::User);
    }

    #[test]
    fn second_submission_during_flight_is_rejected_not_queued() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let generator = Arc::new({
            let mut g = ScriptedGenerator::new();
            g.counterpart_gate = Some(Mutex::new(gate_rx));
            g
        });
        let (cmd, rx) = start_engine(generator.clone());
        begin_session(&cmd, &rx, SessionConfig::default());

        cmd.send(EngineCommand::SubmitChoice(0)).unwrap();
        wait_for_phase(&rx, EnginePhase::TurnInFlight);

        cmd.send(EngineCommand::SubmitChoice(1)).unwrap();
        drain_until(&rx, |r| matches!(r, EngineResponse::SubmissionRejected { .. }));

        gate_tx.send(()).unwrap();
        wait_for_phase(&rx, EnginePhase::ScenarioReady);
        // Only the first submission became a turn.
        assert_eq!(generator.count("counterpart"), 1);
    }

    #[test]
    fn reset_discards_the_in_flight_turn() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let generator = Arc::new({
            let mut g = ScriptedGenerator::new();
            g.scenario_replies
                .lock()
                .unwrap()
                .push_back(scenario_json());
            g.counterpart_gate = Some(Mutex::new(gate_rx));
            g
        });
        let (cmd, rx) = start_engine(generator.clone());
        begin_session(&cmd, &rx, SessionConfig::default());

        cmd.send(EngineCommand::SubmitChoice(0)).unwrap();
        wait_for_phase(&rx, EnginePhase::TurnInFlight);

        cmd.send(EngineCommand::Reset).unwrap();
        wait_for_phase(&rx, EnginePhase::Setup);

        // Let the stale worker finish and post its result.
        gate_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));

        // A fresh session starts untouched by the stale resolution.
        cmd.send(EngineCommand::RequestScenario).unwrap();
        let responses = wait_for_phase(&rx, EnginePhase::ScenarioReady);
        assert!(!responses
            .iter()
            .any(|r| matches!(r, EngineResponse::HistoryChanged(_))));
        assert!(!responses
            .iter()
            .any(|r| matches!(r, EngineResponse::MetricsChanged(_))));
    }

    #[test]
    fn wrapup_token_requires_developer_mode() {
        // Without the flag the token is ordinary free text.
        let generator = Arc::new(ScriptedGenerator::new());
        let (cmd, rx) = start_engine(generator.clone());
        begin_session(&cmd, &rx, SessionConfig::default());

        cmd.send(EngineCommand::SubmitFreeText(WRAPUP_TOKEN.into())).unwrap();
        wait_for_phase(&rx, EnginePhase::ScenarioReady);
        assert_eq!(generator.count("counterpart"), 1);

        // With the flag it fast-forwards to the debrief with no turn calls.
        let generator = Arc::new(ScriptedGenerator::new());
        let (cmd, rx) = start_engine(generator.clone());
        let config = SessionConfig {
            developer_mode: true,
            ..SessionConfig::default()
        };
        begin_session(&cmd, &rx, config);

        cmd.send(EngineCommand::SubmitFreeText(WRAPUP_TOKEN.into())).unwrap();
        drain_until(&rx, |r| matches!(r, EngineResponse::DebriefReady(_)));
        assert_eq!(generator.count("counterpart"), 0);
        assert_eq!(generator.count("classification"), 1);
    }

    #[test]
    fn unusable_scenario_reply_allows_manual_retry() {
        let generator = Arc::new({
            let g = ScriptedGenerator::new();
            g.scenario_replies
                .lock()
                .unwrap()
                .push_front("no json at all".into());
            g
        });
        let (cmd, rx) = start_engine(generator);

        cmd.send(EngineCommand::Configure(SessionConfig::default())).unwrap();
        cmd.send(EngineCommand::RequestScenario).unwrap();
        drain_until(&rx, |r| matches!(r, EngineResponse::RecoverableError { .. }));

        // Still awaiting; a second request succeeds.
        cmd.send(EngineCommand::RequestScenario).unwrap();
        wait_for_phase(&rx, EnginePhase::ScenarioReady);
    }

    #[test]
    fn scenario_without_goal_threshold_aborts_to_setup() {
        let generator = Arc::new({
            let g = ScriptedGenerator::new();
            g.scenario_replies.lock().unwrap().clear();
            g.scenario_replies.lock().unwrap().push_back(
                r#"{
                    "title": "Broken",
                    "narrative_context": "x",
                    "participants": [{"name": "A", "role": "B", "objective": ""}],
                    "decision_options": [{"label": "Go"}]
                }"#
                .into(),
            );
            g
        });
        let (cmd, rx) = start_engine(generator);

        cmd.send(EngineCommand::Configure(SessionConfig::default())).unwrap();
        cmd.send(EngineCommand::RequestScenario).unwrap();
        let responses = drain_until(&rx, |r| {
            matches!(r, EngineResponse::SessionAborted { .. })
        });
        assert!(responses
            .iter()
            .any(|r| matches!(r, EngineResponse::PhaseChanged(EnginePhase::Setup))));
    }
}
