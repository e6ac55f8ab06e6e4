//! Gem details popup anchored to its marker.

use crate::canvas::colors;
use crate::geo::{ScreenPoint, ScreenSize};
use crate::map::{MarkerEntity, MarkerStatus};
use eframe::egui::{self, Pos2, RichText};

/// Size the popup is laid out for.
pub const POPUP_SIZE: ScreenSize = ScreenSize::new(288.0, 190.0);

/// Draws the popup with its top-left corner at `top_left` (canvas-relative).
///
/// Returns true when the user closed it.
pub fn render_marker_popup(
    ctx: &egui::Context,
    canvas_origin: Pos2,
    top_left: ScreenPoint,
    marker: &MarkerEntity,
    distance: Option<String>,
) -> bool {
    let mut closed = false;
    let pos = canvas_origin + egui::vec2(top_left.x, top_left.y);

    egui::Area::new(egui::Id::new("marker_popup"))
        .order(egui::Order::Foreground)
        .fixed_pos(pos)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_width(POPUP_SIZE.w - 16.0);
                ui.set_max_height(POPUP_SIZE.h - 16.0);

                ui.horizontal(|ui| {
                    ui.label(RichText::new(marker.display_name()).strong().size(15.0));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("\u{2715}").clicked() {
                            closed = true;
                        }
                    });
                });

                ui.horizontal(|ui| {
                    ui.label(RichText::new(&marker.category).small());
                    let (text, color) = match marker.status {
                        MarkerStatus::Verified => ("verified", colors::status::OK),
                        MarkerStatus::Pending => ("pending", colors::status::MUTED),
                        MarkerStatus::Stale => ("needs update", colors::status::WARN),
                    };
                    ui.label(RichText::new(text).small().color(color));
                });

                if let Some(district) = &marker.district {
                    ui.label(RichText::new(district).small().color(colors::status::MUTED));
                }
                if let Some(description) = &marker.short_description {
                    ui.add_space(4.0);
                    ui.label(description);
                }

                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    if let Some(rating) = marker.rating {
                        ui.label(RichText::new(format!("\u{2605} {:.1}", rating)).small());
                    }
                    if let Some(vouches) = marker.vouch_count {
                        ui.label(RichText::new(format!("{} vouches", vouches)).small());
                    }
                    if let Some(distance) = &distance {
                        ui.label(RichText::new(distance).small().color(colors::status::MUTED));
                    }
                });
            });
        });

    closed
}
