//! Top bar UI: app title and status line.

use super::UiState;
use crate::canvas::colors;
use crate::map::HostPhase;
use eframe::egui::{self, Color32, RichText};

pub fn render_top_bar(ctx: &egui::Context, state: &UiState, phase: &HostPhase, fetching: bool) {
    egui::TopBottomPanel::top("top_bar")
        .exact_height(36.0)
        .show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                ui.label(
                    RichText::new("Krawl Map")
                        .strong()
                        .size(16.0)
                        .color(Color32::WHITE),
                );

                ui.separator();

                let (dot, color) = match phase {
                    HostPhase::Ready => ("\u{25CF}", colors::status::OK),
                    HostPhase::Error(_) => ("\u{25CF}", colors::status::ERROR),
                    _ => ("\u{25CB}", colors::status::WARN),
                };
                ui.label(RichText::new(dot).color(color));
                ui.label(RichText::new(phase.name()).size(12.0).color(Color32::GRAY));

                ui.separator();

                if fetching {
                    ui.spinner();
                }
                ui.label(
                    RichText::new(&state.status_message)
                        .size(13.0)
                        .color(Color32::GRAY),
                );
            });
        });
}
