use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::color::ColorMap;
use crate::data::model::Dimension;
use crate::pipeline::view::{Dashboard, Kpi, Section, Tab, ViewModel};
use crate::state::{AppState, Status};

use super::{plot, table};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Company (single choice) ----
            ui.strong("Company");
            let companies = state.table.distinct_text(Dimension::Company);
            let current = state.selection.company.clone();
            egui::ComboBox::from_id_salt("company")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for company in &companies {
                        if ui.selectable_label(current == *company, company).clicked() {
                            state.set_company(company);
                        }
                    }
                });
            ui.separator();

            // ---- Multi-select checklists (collapsible) ----
            for dim in [Dimension::Year, Dimension::Region, Dimension::Department] {
                checklist(ui, state, dim);
            }
        });
}

fn checklist(ui: &mut Ui, state: &mut AppState, dim: Dimension) {
    let values = state.choices(dim);
    let n_selected = values.iter().filter(|v| state.is_selected(dim, v)).count();
    let header_text = format!("{}  ({n_selected}/{})", dimension_title(dim), values.len());

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(dim.name())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    state.select_all(dim);
                }
                if ui.small_button("None").clicked() {
                    state.select_none(dim);
                }
            });

            for value in &values {
                let label = value.to_string();
                let mut text = RichText::new(&label);
                if dim != Dimension::Year {
                    text = text.color(state.color_map.color_for(&label));
                }
                let mut checked = state.is_selected(dim, value);
                if ui.checkbox(&mut checked, text).changed() {
                    state.toggle(dim, value);
                }
            }
        });
}

fn dimension_title(dim: Dimension) -> &'static str {
    match dim {
        Dimension::Company => "Company",
        Dimension::Region => "Regions",
        Dimension::Department => "Departments",
        Dimension::Year => "Years",
        Dimension::Quarter => "Quarters",
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open dataset…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let export = ui.add_enabled(
                state.export_file_name().is_some(),
                egui::Button::new("Export CSV…"),
            );
            if export.clicked() {
                export_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        let matched = match &state.view {
            ViewModel::Dashboard(d) => d.matched_rows,
            ViewModel::NoData => 0,
        };
        ui.label(format!(
            "{} records loaded, {} matching",
            state.table.len(),
            matched
        ));

        match &state.status {
            Some(Status::Info(msg)) => {
                ui.separator();
                ui.label(msg);
            }
            Some(Status::Error(msg)) => {
                ui.separator();
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// Central panel – KPIs and tabs
// ---------------------------------------------------------------------------

pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    let AppState { view, tab, color_map, .. } = state;

    let dashboard = match view {
        ViewModel::Dashboard(d) => d,
        ViewModel::NoData => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label(
                    RichText::new("No data available for the selected filters.")
                        .color(Color32::YELLOW)
                        .size(18.0),
                );
            });
            return;
        }
    };

    ui.heading(format!("{} ESG Analytics", dashboard.company));
    kpi_row(ui, &dashboard.headline);
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        for t in Tab::ALL {
            ui.selectable_value(tab, t, t.title());
        }
    });
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if *tab == Tab::Detail {
                detail_tab(ui, dashboard);
            } else if let Some(section) = dashboard.section(*tab) {
                section_tab(ui, section, color_map);
            }
        });
}

fn section_tab(ui: &mut Ui, section: &Section, colors: &ColorMap) {
    if !section.kpis.is_empty() {
        kpi_row(ui, &section.kpis);
        ui.add_space(8.0);
    }
    for panel in &section.panels {
        plot::panel(ui, panel, colors);
    }
}

fn detail_tab(ui: &mut Ui, dashboard: &Dashboard) {
    ui.label(format!(
        "{} rows · File → Export CSV… saves them as {}",
        dashboard.detail.len(),
        dashboard.export_file_name
    ));
    ui.add_space(4.0);
    table::detail_table(ui, &dashboard.detail);
}

fn kpi_row(ui: &mut Ui, kpis: &[Kpi]) {
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for kpi in kpis {
            egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
                ui.vertical(|ui: &mut Ui| {
                    ui.label(RichText::new(kpi.label).small());
                    ui.label(RichText::new(kpi.display()).size(22.0).strong());
                    if let Some(delta) = kpi.delta_display() {
                        let color = match kpi.delta {
                            Some(d) if d < 0.0 => Color32::LIGHT_RED,
                            _ => Color32::LIGHT_GREEN,
                        };
                        ui.label(RichText::new(delta).color(color));
                    }
                });
            });
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open ESG dataset")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let Some(name) = state.export_file_name().map(str::to_string) else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Export filtered data")
        .set_file_name(&name)
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        state.export(&path);
    }
}
