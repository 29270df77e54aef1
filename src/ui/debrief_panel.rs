use eframe::egui;
use std::fs;

use crate::engine::protocol::EngineCommand;
use crate::model::debrief::Debriefing;
use crate::ui::app::SimApp;

pub fn draw_debrief_panel(ctx: &egui::Context, app: &mut SimApp) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let Some(debrief) = app.ui.debrief.clone() else {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Finalizing the debriefing…");
            });
            return;
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Debriefing");
            ui.add_space(6.0);

            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!("Grade: {}", debrief.letter_grade.label()))
                        .size(28.0)
                        .strong(),
                );
                ui.add_space(12.0);
                ui.label(format!(
                    "{} — score {}",
                    debrief.outcome.label(),
                    debrief.overall_score
                ));
            });

            ui.add_space(6.0);
            ui.label(&debrief.summary);
            ui.small(&debrief.outcome_reason);

            ui.add_space(10.0);
            tactic_list(ui, "Strengths", &debrief.strengths);
            tactic_list(ui, "Areas to improve", &debrief.areas_for_improvement);

            ui.add_space(10.0);
            ui.heading("Coach's advice");
            ui.label(&debrief.advice);

            ui.add_space(10.0);
            ui.collapsing("Transcript", |ui| {
                for record in &debrief.transcript {
                    app.draw_message(ui, record);
                }
            });

            ui.add_space(12.0);
            ui.horizontal(|ui| {
                if ui.button("Export report…").clicked() {
                    export_report(app, &debrief);
                }
                if ui.button("Start a new session").clicked() {
                    app.send_command(EngineCommand::Reset);
                }
            });

            if let Some(status) = &app.ui.status_line {
                ui.add_space(6.0);
                ui.label(status);
            }
        });
    });
}

fn tactic_list(ui: &mut egui::Ui, label: &str, tactics: &[String]) {
    ui.heading(label);
    if tactics.is_empty() {
        ui.small("Nothing stood out this session.");
    } else {
        for tactic in tactics {
            ui.label(format!("• {tactic}"));
        }
    }
}

fn export_report(app: &mut SimApp, debrief: &Debriefing) {
    let Some(path) = rfd::FileDialog::new()
        .set_file_name("debriefing.json")
        .save_file()
    else {
        return;
    };

    let result = serde_json::to_string_pretty(debrief)
        .map_err(anyhow::Error::from)
        .and_then(|json| fs::write(&path, json).map_err(anyhow::Error::from));

    app.ui.status_line = Some(match result {
        Ok(()) => format!("Report saved to {}", path.display()),
        Err(e) => format!("Could not save report: {e}"),
    });
}
