use eframe::egui;
use egui::Layout;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::engine::Engine;
use crate::engine::generator::{ChatCompletionsClient, ContentGenerator};
use crate::engine::protocol::{
    DecodedImage, EngineCommand, EnginePhase, EngineResponse,
};
use crate::model::config::{Difficulty, DomainKind};
use crate::model::debrief::Debriefing;
use crate::model::metrics::MetricsState;
use crate::model::scenario::Scenario;
use crate::model::turn::{Speaker, TurnRecord};
use crate::ui::settings::UiSettings;
use crate::ui::settings_io;
use crate::ui::{center_panel, debrief_panel, right_panel, setup_panel};

/* =========================
   UI State
   ========================= */

pub struct UiState {
    pub phase: EnginePhase,

    // Setup form.
    pub player_role: String,
    pub domain: DomainKind,
    pub difficulty: Difficulty,

    // Mirrors of engine state, updated from EngineResponses only.
    pub scenario: Option<Scenario>,
    pub history: Vec<TurnRecord>,
    pub metrics: MetricsState,
    pub debrief: Option<Box<Debriefing>>,

    pub input_text: String,
    pub status_line: Option<String>,
    pub should_auto_scroll: bool,

    pub pending_illustration: Option<DecodedImage>,
    pub illustration: Option<egui::TextureHandle>,

    pub probe_rx: Option<mpsc::Receiver<String>>,
    pub connection_status: Option<String>,
}

impl UiState {
    fn new() -> Self {
        Self {
            phase: EnginePhase::Setup,
            player_role: "Negotiator".into(),
            domain: DomainKind::Negotiation,
            difficulty: Difficulty::Intermediate,
            scenario: None,
            history: Vec::new(),
            metrics: MetricsState::default(),
            debrief: None,
            input_text: String::new(),
            status_line: None,
            should_auto_scroll: false,
            pending_illustration: None,
            illustration: None,
            probe_rx: None,
            connection_status: None,
        }
    }

    fn clear_session(&mut self) {
        self.scenario = None;
        self.history.clear();
        self.metrics = MetricsState::default();
        self.debrief = None;
        self.input_text.clear();
        self.pending_illustration = None;
        self.illustration = None;
    }
}

/* =========================
   App
   ========================= */

pub struct SimApp {
    pub ui: UiState,
    pub settings: UiSettings,

    cmd_tx: mpsc::Sender<EngineCommand>,
    resp_rx: mpsc::Receiver<EngineResponse>,
}

impl SimApp {
    pub fn new() -> anyhow::Result<Self> {
        let settings = settings_io::load_settings();

        let client = ChatCompletionsClient::new(&settings.endpoint, &settings.model)?;
        let generator: Arc<dyn ContentGenerator> = Arc::new(client);

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let worker_tx = cmd_tx.clone();

        std::thread::spawn(move || {
            Engine::new(cmd_rx, worker_tx, resp_tx, generator).run();
        });

        Ok(Self {
            ui: UiState::new(),
            settings,
            cmd_tx,
            resp_rx,
        })
    }

    pub fn send_command(&self, cmd: EngineCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    fn pump_engine(&mut self) {
        while let Ok(resp) = self.resp_rx.try_recv() {
            match resp {
                EngineResponse::PhaseChanged(phase) => {
                    self.ui.phase = phase;
                    if phase == EnginePhase::Setup {
                        self.ui.clear_session();
                    }
                }
                EngineResponse::ScenarioChanged(scenario) => {
                    self.ui.scenario = Some(scenario);
                }
                EngineResponse::HistoryChanged(history) => {
                    self.ui.history = history;
                    self.ui.should_auto_scroll = true;
                }
                EngineResponse::MetricsChanged(metrics) => {
                    self.ui.metrics = metrics;
                }
                EngineResponse::IllustrationReady(image) => {
                    self.ui.pending_illustration = Some(image);
                    self.ui.illustration = None;
                }
                EngineResponse::SubmissionRejected { reason } => {
                    self.ui.status_line = Some(reason);
                }
                EngineResponse::RecoverableError { message } => {
                    self.ui.status_line = Some(message);
                }
                EngineResponse::SessionAborted { message } => {
                    self.ui.status_line = Some(message);
                }
                EngineResponse::DebriefReady(debrief) => {
                    self.ui.debrief = Some(debrief);
                }
            }
        }

        let mut probe_done = false;
        if let Some(rx) = &self.ui.probe_rx {
            if let Ok(status) = rx.try_recv() {
                self.ui.connection_status = Some(status);
                probe_done = true;
            }
        }
        if probe_done {
            self.ui.probe_rx = None;
        }
    }

    pub fn draw_message(&self, ui: &mut egui::Ui, record: &TurnRecord) {
        let (key, right, text) = match record.speaker {
            Speaker::User => ("User", true, format!("You: {}", record.content)),
            Speaker::Counterpart => ("Counterpart", false, record.content.clone()),
            Speaker::Feedback => ("Feedback", false, format!("Coach: {}", record.content)),
        };

        ui.add_space(6.0);

        let color = self.settings.color(key);
        if right {
            ui.with_layout(Layout::right_to_left(egui::Align::TOP), |ui| {
                bubble(ui, color, &text);
            });
        } else {
            bubble(ui, color, &text);
        }
    }
}

pub fn bubble(ui: &mut egui::Ui, color: egui::Color32, text: &str) {
    egui::Frame::new()
        .fill(color)
        .corner_radius(egui::CornerRadius::same(8))
        .inner_margin(egui::Margin::symmetric(10, 6))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).color(egui::Color32::WHITE));
        });
}

/* =========================
   egui App
   ========================= */

impl eframe::App for SimApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        // Engine responses arrive between frames; keep polling.
        ctx.request_repaint_after(Duration::from_millis(200));
        ctx.set_pixels_per_point(self.settings.ui_scale);

        self.pump_engine();

        match self.ui.phase {
            EnginePhase::Setup | EnginePhase::AwaitingScenario => {
                setup_panel::draw_setup_panel(ctx, self);
            }
            EnginePhase::Complete => {
                debrief_panel::draw_debrief_panel(ctx, self);
            }
            _ => {
                right_panel::draw_right_panel(ctx, self);
                center_panel::draw_center_panel(ctx, self);
            }
        }

        self.ui.should_auto_scroll = false;
    }
}
