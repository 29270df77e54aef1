use eframe::egui;

use crate::engine::protocol::{EngineCommand, EnginePhase};
use crate::ui::app::{bubble, SimApp};

pub fn draw_center_panel(ctx: &egui::Context, app: &mut SimApp) {
    let input_id = egui::Id::new("action_input_box");
    let busy = matches!(
        app.ui.phase,
        EnginePhase::TurnInFlight | EnginePhase::TurnResolved | EnginePhase::Terminating
    );

    // ---------- Input bar ----------
    egui::TopBottomPanel::bottom("action_input").show(ctx, |ui| {
        if let Some(status) = app.ui.status_line.clone() {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::LIGHT_RED, status);
                if ui.small_button("✖").clicked() {
                    app.ui.status_line = None;
                }
            });
        }

        if busy {
            ui.horizontal(|ui| {
                ui.spinner();
                let label = if app.ui.phase == EnginePhase::Terminating {
                    "Preparing your debriefing…"
                } else {
                    "Waiting for the counterpart…"
                };
                ui.label(label);
            });
        } else {
            draw_decision_options(ui, app);
        }

        let mut send_now = false;

        ui.horizontal(|ui| {
            ui.add_enabled_ui(!busy, |ui| {
                let response = ui.add_sized(
                    [ui.available_width() - 60.0, 60.0],
                    egui::TextEdit::multiline(&mut app.ui.input_text)
                        .id(input_id)
                        .hint_text("Respond in your own words…")
                        .lock_focus(true),
                );

                // Enter vs Shift+Enter
                if response.has_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift)
                {
                    send_now = true;
                }

                if ui.button("Send").clicked() {
                    send_now = true;
                }
            });
        });

        if send_now && !busy {
            let text = app.ui.input_text.trim().to_string();

            if !text.is_empty() {
                app.ui.status_line = None;
                app.send_command(EngineCommand::SubmitFreeText(text));
                app.ui.input_text.clear();
            }

            // Keep cursor focused
            ui.memory_mut(|m| m.request_focus(input_id));
        }
    });

    // ---------- Transcript ----------
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical()
            .stick_to_bottom(app.ui.should_auto_scroll)
            .show(ui, |ui| {
                if let Some(scenario) = &app.ui.scenario {
                    ui.heading(&scenario.title);
                    bubble(
                        ui,
                        app.settings.color("System"),
                        &scenario.narrative_context,
                    );
                    ui.add_space(8.0);
                }

                for record in &app.ui.history {
                    app.draw_message(ui, record);
                }
            });
    });
}

fn draw_decision_options(ui: &mut egui::Ui, app: &mut SimApp) {
    let Some(scenario) = app.ui.scenario.clone() else {
        return;
    };

    ui.label("Choose an action:");
    ui.horizontal_wrapped(|ui| {
        for (i, option) in scenario.decision_options.iter().enumerate() {
            let button = ui.button(&option.label);
            let button = if option.description.trim().is_empty() {
                button
            } else {
                button.on_hover_text(&option.description)
            };
            if button.clicked() {
                app.ui.status_line = None;
                app.send_command(EngineCommand::SubmitChoice(i));
            }
        }
    });
}
