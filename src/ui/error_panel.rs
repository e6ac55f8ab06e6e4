//! Blocking panel shown while the map cannot be displayed.

use crate::canvas::colors;
use crate::map::MapError;
use eframe::egui::{self, RichText};

/// Retry progress shown under the error.
#[derive(Debug, Clone, Copy)]
pub struct RetryInfo {
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Renders `error` centred in `ui`. Returns true when retry was clicked.
pub fn render_error_panel(ui: &mut egui::Ui, error: &MapError, retry: RetryInfo) -> bool {
    let mut clicked = false;
    ui.vertical_centered(|ui| {
        ui.add_space(ui.available_height() * 0.3);
        ui.label(
            RichText::new(error.code.title())
                .strong()
                .size(20.0)
                .color(colors::status::ERROR),
        );
        ui.add_space(6.0);
        ui.label(&error.message);
        ui.label(
            RichText::new(error.code.to_string())
                .small()
                .monospace()
                .color(colors::status::MUTED),
        );
        ui.add_space(12.0);

        if error.retryable {
            if ui.button("Try again").clicked() {
                clicked = true;
            }
            if retry.attempt > 0 {
                ui.label(
                    RichText::new(format!("Attempt {} of {}", retry.attempt, retry.max_attempts))
                        .small()
                        .color(colors::status::MUTED),
                );
            }
        } else {
            ui.label(RichText::new("Reload the page to try again.").small());
        }
    });
    clicked
}
