//! Left panel UI: search, filters, location picking and the krawl trail.

use super::{UiState, CATEGORIES};
use crate::canvas::colors;
use crate::map::TravelProfile;
use eframe::egui::{self, RichText};

pub fn render_left_panel(ctx: &egui::Context, state: &mut UiState, locating: bool) {
    egui::SidePanel::left("left_panel")
        .resizable(true)
        .default_width(260.0)
        .min_width(220.0)
        .max_width(400.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                render_search(ui, state);
                ui.add_space(10.0);
                render_filters(ui, state);
                ui.add_space(10.0);
                render_pick(ui, state);
                ui.add_space(10.0);
                render_trail(ui, state);
                ui.add_space(10.0);
                render_location(ui, state, locating);
            });
        });
}

fn render_search(ui: &mut egui::Ui, state: &mut UiState) {
    ui.heading("Search");
    ui.separator();

    let search = &mut state.search;
    ui.horizontal(|ui| {
        let response = ui.add(
            egui::TextEdit::singleline(&mut search.query)
                .hint_text("Place or address")
                .desired_width(170.0),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        ui.add_enabled_ui(!search.pending, |ui| {
            if ui.button("Go").clicked() || submitted {
                state.search_requested = true;
            }
        });
    });

    let search = &state.search;
    if search.pending {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Searching...");
        });
    }
    if let Some(error) = &search.error {
        ui.label(RichText::new(error).small().color(colors::status::ERROR));
    }

    let mut picked = None;
    for result in &search.results {
        if ui
            .selectable_label(false, &result.text)
            .on_hover_text(&result.place_name)
            .clicked()
        {
            picked = Some(result.center);
        }
    }
    if picked.is_some() {
        state.fly_to = picked;
    }
}

fn render_filters(ui: &mut egui::Ui, state: &mut UiState) {
    ui.heading("Categories");
    ui.separator();

    for category in CATEGORIES {
        let mut enabled = state.filters.contains(category);
        if ui.checkbox(&mut enabled, *category).changed() {
            state.filters.toggle(category);
            state.filters_changed = true;
        }
    }

    if !state.filters.is_empty() && ui.small_button("Show all").clicked() {
        for category in state.filters.categories().to_vec() {
            state.filters.toggle(&category);
        }
        state.filters_changed = true;
    }
}

fn render_pick(ui: &mut egui::Ui, state: &mut UiState) {
    ui.heading("Add a gem");
    ui.separator();

    let pick = &mut state.pick;
    let label = if pick.active { "Cancel picking" } else { "Pick location" };
    if ui.button(label).clicked() {
        pick.active = !pick.active;
        pick.candidate = None;
        pick.validation = None;
    }
    if !pick.active {
        return;
    }

    match (&pick.candidate, &pick.validation) {
        (None, _) => {
            ui.label(RichText::new("Click the map to choose a spot.").small());
        }
        (Some(point), None) => {
            ui.label(RichText::new(format!("{:.5}, {:.5}", point.lat, point.lon)).monospace());
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Checking service area...");
            });
        }
        (Some(point), Some(result)) => {
            ui.label(RichText::new(format!("{:.5}, {:.5}", point.lat, point.lon)).monospace());
            let color = if result.is_valid {
                colors::status::OK
            } else {
                colors::status::ERROR
            };
            if let Some(message) = &result.message {
                ui.label(RichText::new(message).color(color));
            }
            if let Some(meters) = result.distance_m {
                let distance = crate::geo::format_distance(meters);
                ui.label(
                    RichText::new(format!("{} from the boundary", distance))
                        .small()
                        .color(colors::status::MUTED),
                );
            }
        }
    }
}

fn render_trail(ui: &mut egui::Ui, state: &mut UiState) {
    ui.heading("Krawl");
    ui.separator();

    if ui.checkbox(&mut state.show_trail, "Show sample krawl").changed() {
        state.trail_requested = true;
    }

    ui.add_enabled_ui(state.show_trail, |ui| {
        let before = state.profile;
        egui::ComboBox::from_label("Travel")
            .selected_text(state.profile.as_str())
            .show_ui(ui, |ui| {
                for profile in [
                    TravelProfile::Walking,
                    TravelProfile::Cycling,
                    TravelProfile::Driving,
                ] {
                    ui.selectable_value(&mut state.profile, profile, profile.as_str());
                }
            });
        if state.profile != before {
            state.trail_requested = true;
        }
    });

    if let (true, Some(summary)) = (state.show_trail, &state.trail_summary) {
        ui.label(RichText::new(summary).small());
    }
}

fn render_location(ui: &mut egui::Ui, state: &mut UiState, locating: bool) {
    ui.heading("Location");
    ui.separator();

    ui.add_enabled_ui(!locating, |ui| {
        if ui.button("Locate me").clicked() {
            state.locate_requested = true;
        }
    });
    if locating {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Waiting for position...");
        });
    }
    if let Some(label) = &state.location_label {
        ui.label(RichText::new(label).small().color(colors::status::MUTED));
    }
}
