use eframe::egui;

use crate::engine::protocol::EngineCommand;
use crate::ui::app::SimApp;

pub fn draw_right_panel(ctx: &egui::Context, app: &mut SimApp) {
    egui::SidePanel::right("session")
        .resizable(true)
        .default_width(300.0)
        .min_width(240.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                draw_illustration(ui, app);
                draw_metrics(ui, app);
                draw_participants(ui, app);

                ui.separator();
                if ui.button("Abandon session").clicked() {
                    app.send_command(EngineCommand::Reset);
                }
            });
        });
}

fn draw_illustration(ui: &mut egui::Ui, app: &mut SimApp) {
    // Decode arrives as raw RGBA from the engine; upload once per image.
    if let Some(image) = app.ui.pending_illustration.take() {
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [image.width as usize, image.height as usize],
            &image.rgba,
        );
        app.ui.illustration = Some(ui.ctx().load_texture(
            "scenario_illustration",
            color_image,
            egui::TextureOptions::LINEAR,
        ));
    }

    if let Some(texture) = &app.ui.illustration {
        ui.add(egui::Image::new(texture).max_width(ui.available_width()));
        ui.add_space(6.0);
    }
}

fn draw_metrics(ui: &mut egui::Ui, app: &SimApp) {
    ui.heading("Progress");
    ui.add(
        egui::ProgressBar::new(app.ui.metrics.progress as f32 / 100.0).show_percentage(),
    );
    ui.label(format!("Cumulative score: {}", app.ui.metrics.cumulative_score));

    if !app.ui.metrics.tactic_scores.is_empty() {
        ui.add_space(6.0);
        ui.heading("Tactics");
        for (tactic, score) in &app.ui.metrics.tactic_scores {
            ui.horizontal(|ui| {
                ui.label(tactic);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("{score:+}"));
                });
            });
        }
    }
}

fn draw_participants(ui: &mut egui::Ui, app: &SimApp) {
    let Some(scenario) = &app.ui.scenario else {
        return;
    };

    ui.add_space(6.0);
    ui.collapsing("Participants", |ui| {
        for p in &scenario.participants {
            ui.label(format!("• {} — {}", p.name, p.role));
            if !p.objective.trim().is_empty() {
                ui.small(format!("  {}", p.objective));
            }
        }
    });
}
