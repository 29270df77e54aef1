use eframe::egui;
use rand::seq::SliceRandom;
use std::sync::mpsc;

use crate::engine::generator::ChatCompletionsClient;
use crate::engine::protocol::{EngineCommand, EnginePhase};
use crate::model::config::{Difficulty, DomainKind, SessionConfig};
use crate::ui::app::SimApp;
use crate::ui::settings_io;

pub fn draw_setup_panel(ctx: &egui::Context, app: &mut SimApp) {
    let awaiting = app.ui.phase == EnginePhase::AwaitingScenario;

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Sparring — Training Simulator");
        ui.add_space(8.0);

        if awaiting {
            draw_awaiting(ui, app);
            return;
        }

        ui.label("Your role");
        ui.text_edit_singleline(&mut app.ui.player_role);
        ui.add_space(6.0);

        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Domain")
                .selected_text(app.ui.domain.label())
                .show_ui(ui, |ui| {
                    for domain in DomainKind::ALL {
                        ui.selectable_value(&mut app.ui.domain, domain, domain.label());
                    }
                });

            if ui.button("🎲 Surprise me").clicked() {
                if let Some(domain) = DomainKind::ALL.choose(&mut rand::thread_rng()) {
                    app.ui.domain = *domain;
                }
            }
        });

        egui::ComboBox::from_label("Difficulty")
            .selected_text(app.ui.difficulty.label())
            .show_ui(ui, |ui| {
                for difficulty in Difficulty::ALL {
                    ui.selectable_value(&mut app.ui.difficulty, difficulty, difficulty.label());
                }
            });

        ui.add_space(10.0);

        if ui.button("Begin scenario").clicked() {
            app.ui.status_line = None;
            app.send_command(EngineCommand::Configure(SessionConfig {
                player_role: app.ui.player_role.trim().to_string(),
                domain: app.ui.domain,
                difficulty: app.ui.difficulty,
                developer_mode: app.settings.developer_mode,
            }));
            app.send_command(EngineCommand::RequestScenario);
        }

        if let Some(status) = &app.ui.status_line {
            ui.add_space(6.0);
            ui.colored_label(egui::Color32::LIGHT_RED, status);
        }

        ui.add_space(12.0);
        ui.separator();
        draw_settings(ui, app);
    });
}

fn draw_awaiting(ui: &mut egui::Ui, app: &mut SimApp) {
    ui.horizontal(|ui| {
        ui.spinner();
        ui.label("Generating your scenario…");
    });

    if let Some(status) = &app.ui.status_line {
        ui.add_space(6.0);
        ui.colored_label(egui::Color32::LIGHT_RED, status);
        if ui.button("Retry").clicked() {
            app.ui.status_line = None;
            app.send_command(EngineCommand::RequestScenario);
        }
    }
}

fn draw_settings(ui: &mut egui::Ui, app: &mut SimApp) {
    ui.collapsing("Settings", |ui| {
        ui.label("UI Scale");
        ui.add(egui::Slider::new(&mut app.settings.ui_scale, 0.75..=2.0));

        ui.label("Generator endpoint");
        ui.text_edit_singleline(&mut app.settings.endpoint);
        ui.label("Model");
        ui.text_edit_singleline(&mut app.settings.model);
        ui.small("Endpoint changes apply after restart.");

        ui.checkbox(&mut app.settings.developer_mode, "Developer mode");

        ui.add_space(6.0);
        ui.label("Speaker colors");
        for key in ["User", "Counterpart", "Feedback", "System"] {
            let mut color = app.settings.color(key);
            ui.horizontal(|ui| {
                if ui.color_edit_button_srgba(&mut color).changed() {
                    app.settings.set_color(key, color);
                }
                ui.label(key);
            });
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.button("Save settings").clicked() {
                settings_io::save_settings(&app.settings);
            }

            if ui.button("Test connection").clicked() && app.ui.probe_rx.is_none() {
                app.ui.probe_rx = Some(spawn_probe(&app.settings.endpoint, &app.settings.model));
            }
        });

        if app.ui.probe_rx.is_some() {
            ui.spinner();
        } else if let Some(status) = &app.ui.connection_status {
            ui.label(status);
        }
    });
}

/// Probe off the UI thread; the result lands in `UiState::connection_status`.
fn spawn_probe(endpoint: &str, model: &str) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let endpoint = endpoint.to_string();
    let model = model.to_string();
    std::thread::spawn(move || {
        let status = ChatCompletionsClient::new(&endpoint, &model)
            .and_then(|client| client.test_connection())
            .unwrap_or_else(|e| format!("Connection failed: {e}"));
        let _ = tx.send(status);
    });
    rx
}
