use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::color::{diverging_color, heat_color};
use crate::data::model::EsgRecord;
use crate::pipeline::aggregate::{CorrelationMatrix, GroupedTable, PivotTable};
use crate::pipeline::export::{EXPORT_COLUMNS, ExportRow};
use crate::pipeline::view::KpiFormat;

const CELL: KpiFormat = KpiFormat::Decimal(2, "");

fn shaded(text: String, background: Color32) -> RichText {
    RichText::new(text).background_color(background).color(Color32::BLACK)
}

fn key_header(ui: &mut Ui, grouped: &GroupedTable) {
    let keys: Vec<&str> = grouped.keys.iter().map(|k| k.name()).collect();
    ui.strong(keys.join(" / "));
}

// ---------------------------------------------------------------------------
// Grouped tables as grids
// ---------------------------------------------------------------------------

/// Group rows with one numeric column per reduction.
pub fn scorecard(ui: &mut Ui, id: &str, grouped: &GroupedTable) {
    egui::Grid::new(id).striped(true).show(ui, |ui: &mut Ui| {
        key_header(ui, grouped);
        for reduction in &grouped.reductions {
            ui.strong(reduction.to_string());
        }
        ui.end_row();

        for row in &grouped.rows {
            ui.label(row.label());
            for value in &row.values {
                ui.label(CELL.apply(*value));
            }
            ui.end_row();
        }
    });
}

/// Like [`scorecard`], with cells shaded by their normalised value.
pub fn heatmap(ui: &mut Ui, id: &str, grouped: &GroupedTable) {
    egui::Grid::new(id).show(ui, |ui: &mut Ui| {
        key_header(ui, grouped);
        for reduction in &grouped.reductions {
            ui.strong(reduction.field().name());
        }
        ui.end_row();

        for row in &grouped.rows {
            ui.label(row.label());
            for value in &row.values {
                match value {
                    Some(v) => ui.label(shaded(CELL.apply(Some(*v)), heat_color(*v))),
                    None => ui.label(CELL.apply(None)),
                };
            }
            ui.end_row();
        }
    });
}

pub fn correlation(ui: &mut Ui, id: &str, matrix: &CorrelationMatrix) {
    egui::Grid::new(id).show(ui, |ui: &mut Ui| {
        ui.label("");
        for field in &matrix.fields {
            ui.strong(field.name());
        }
        ui.end_row();

        for (field, cells) in matrix.fields.iter().zip(&matrix.cells) {
            ui.strong(field.name());
            for cell in cells {
                match cell.value() {
                    Some(r) => ui.label(shaded(cell.to_string(), diverging_color(r))),
                    None => ui.label(cell.to_string()),
                };
            }
            ui.end_row();
        }
    });
}

pub fn pivot(ui: &mut Ui, id: &str, pivot: &PivotTable) {
    let defined = pivot.cells.iter().flatten().flatten().copied();
    let (lo, hi) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let scale = |v: f64| if hi > lo { (v - lo) / (hi - lo) } else { 0.5 };

    egui::Grid::new(id).show(ui, |ui: &mut Ui| {
        ui.label("");
        for label in &pivot.column_labels {
            ui.strong(label);
        }
        ui.end_row();

        for (key, cells) in pivot.row_keys.iter().zip(&pivot.cells) {
            ui.strong(key.to_string());
            for cell in cells {
                match cell {
                    Some(v) => ui.label(shaded(format!("{v:.3}"), heat_color(scale(*v)))),
                    None => ui.label(""),
                };
            }
            ui.end_row();
        }
    });
}

// ---------------------------------------------------------------------------
// Detail table
// ---------------------------------------------------------------------------

fn cells(row: &ExportRow<'_>) -> [String; 11] {
    [
        row.company_name.to_string(),
        row.region.to_string(),
        row.department.to_string(),
        row.year.to_string(),
        row.quarter.to_string(),
        format!("{:.1}", row.esg_score),
        format!("{:.3}", row.renewable_energy_share_pct),
        format!("{:.1}", row.scope1_emissions_tco2e),
        format!("{:.3}", row.female_pct),
        format!("{:.1}", row.employee_engagement_score),
        format!("{}", row.controversy_level_0_low_3_high),
    ]
}

/// The export columns for `records`, in the order given.
pub fn detail_table(ui: &mut Ui, records: &[EsgRecord]) {
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .columns(Column::auto().at_least(60.0), EXPORT_COLUMNS.len())
        .header(20.0, |mut header| {
            for name in EXPORT_COLUMNS {
                header.col(|ui: &mut Ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, records.len(), |mut row| {
                let export = ExportRow::from(&records[row.index()]);
                for text in cells(&export) {
                    row.col(|ui: &mut Ui| {
                        ui.label(text);
                    });
                }
            });
        });
}
