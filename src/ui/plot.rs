use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use eframe::egui::{Color32, Ui};
use egui_plot::{
    Bar, BarChart, GridMark, HLine, Legend, Line, LineStyle, Plot, Points, VLine,
};

use crate::color::{ColorMap, generate_palette};
use crate::data::model::DimensionValue;
use crate::pipeline::aggregate::{GroupedTable, ValueCount};
use crate::pipeline::view::{ChartKind, Panel, PanelBody, ThresholdRow, period_label};

use super::table;

const PLOT_HEIGHT: f32 = 240.0;

// ---------------------------------------------------------------------------
// Panel dispatch
// ---------------------------------------------------------------------------

/// Render one dashboard panel: a title followed by its chart or grid.
pub fn panel(ui: &mut Ui, panel: &Panel, colors: &ColorMap) {
    ui.strong(panel.title);
    match &panel.body {
        PanelBody::Chart { kind, table } => chart(ui, panel.title, *kind, table, colors),
        PanelBody::Counts { field, counts } => counts_chart(ui, panel.title, field.name(), counts),
        PanelBody::Threshold { rows, threshold } => {
            threshold_chart(ui, panel.title, rows, *threshold)
        }
        PanelBody::Scorecard(grouped) => table::scorecard(ui, panel.title, grouped),
        PanelBody::Heatmap(grouped) => table::heatmap(ui, panel.title, grouped),
        PanelBody::Correlation(matrix) => table::correlation(ui, panel.title, matrix),
        PanelBody::Pivot(pivot) => table::pivot(ui, panel.title, pivot),
    }
    ui.add_space(12.0);
}

fn plot(id: &str) -> Plot<'_> {
    Plot::new(id)
        .height(PLOT_HEIGHT)
        .legend(Legend::default())
        .allow_scroll(false)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_zoom(true)
}

/// Axis formatter for categorical x positions `0, 1, 2, …`.
fn category_formatter(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark: GridMark, _range: &RangeInclusive<f64>| {
        let i = mark.value.round();
        if (mark.value - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        labels.get(i as usize).cloned().unwrap_or_default()
    }
}

fn year_of(key: &[DimensionValue]) -> Option<f64> {
    key.first()
        .and_then(DimensionValue::as_integer)
        .map(|y| y as f64)
}

fn column_name(table: &GroupedTable, column: usize) -> &'static str {
    table
        .reductions
        .get(column)
        .map(|r| r.field().name())
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Grouped-table charts
// ---------------------------------------------------------------------------

fn chart(ui: &mut Ui, id: &str, kind: ChartKind, grouped: &GroupedTable, colors: &ColorMap) {
    if grouped.is_empty() {
        ui.label("No data");
        return;
    }
    match kind {
        ChartKind::Line => year_lines(ui, id, grouped),
        ChartKind::Periods => period_lines(ui, id, grouped),
        ChartKind::Split => split_lines(ui, id, grouped, colors),
        ChartKind::Bar => bars(ui, id, grouped, colors),
        ChartKind::Scatter {
            x,
            y,
            guide_x,
            guide_y,
        } => scatter(ui, id, grouped, (x, y), (guide_x, guide_y), colors),
    }
}

/// One line per column against the year key.
fn year_lines(ui: &mut Ui, id: &str, grouped: &GroupedTable) {
    let palette = generate_palette(grouped.reductions.len());
    plot(id).x_axis_label("year").show(ui, |plot_ui| {
        for (col, color) in palette.into_iter().enumerate() {
            let points: Vec<[f64; 2]> = grouped
                .rows
                .iter()
                .filter_map(|row| Some([year_of(&row.key)?, row.values[col]?]))
                .collect();
            let name = column_name(grouped, col);
            plot_ui.points(Points::new(points.clone()).radius(3.0).color(color).name(name));
            plot_ui.line(Line::new(points).name(name).color(color).width(1.5));
        }
    });
}

/// Rows keyed by (year, quarter), evenly spaced and labelled `YYYY-Qn`.
fn period_lines(ui: &mut Ui, id: &str, grouped: &GroupedTable) {
    let labels: Vec<String> = grouped
        .rows
        .iter()
        .map(|row| match row.key.as_slice() {
            [year, quarter] => match (year.as_integer(), quarter.as_integer()) {
                (Some(y), Some(q)) => period_label(y, q),
                _ => row.label(),
            },
            _ => row.label(),
        })
        .collect();
    let palette = generate_palette(grouped.reductions.len());

    plot(id)
        .x_axis_formatter(category_formatter(labels))
        .show(ui, |plot_ui| {
            for (col, color) in palette.into_iter().enumerate() {
                let points: Vec<[f64; 2]> = grouped
                    .rows
                    .iter()
                    .enumerate()
                    .filter_map(|(i, row)| Some([i as f64, row.values[col]?]))
                    .collect();
                let name = column_name(grouped, col);
                plot_ui.points(Points::new(points.clone()).radius(3.0).color(color).name(name));
                plot_ui.line(Line::new(points).name(name).color(color).width(1.5));
            }
        });
}

/// Rows keyed by (year, category): one line per category, first column.
fn split_lines(ui: &mut Ui, id: &str, grouped: &GroupedTable, colors: &ColorMap) {
    let mut series: BTreeMap<String, Vec<[f64; 2]>> = BTreeMap::new();
    for row in &grouped.rows {
        let (Some(x), Some(split), Some(y)) = (
            year_of(&row.key),
            row.key.get(1),
            row.values.first().copied().flatten(),
        ) else {
            continue;
        };
        series.entry(split.to_string()).or_default().push([x, y]);
    }

    plot(id)
        .x_axis_label("year")
        .y_axis_label(column_name(grouped, 0))
        .show(ui, |plot_ui| {
            for (name, points) in series {
                let color = colors.color_for(&name);
                plot_ui.points(Points::new(points.clone()).radius(3.0).color(color).name(&name));
                plot_ui.line(Line::new(points).name(&name).color(color).width(1.5));
            }
        });
}

/// Categorical bars. A single column is coloured per category; several
/// columns are drawn side by side, coloured per column.
fn bars(ui: &mut Ui, id: &str, grouped: &GroupedTable, colors: &ColorMap) {
    let labels: Vec<String> = grouped.rows.iter().map(|r| r.label()).collect();
    let n_cols = grouped.reductions.len().max(1);
    let width = 0.8 / n_cols as f64;
    let palette = generate_palette(n_cols);

    let charts: Vec<BarChart> = (0..grouped.reductions.len())
        .map(|col| {
            let offset = (col as f64 - (n_cols as f64 - 1.0) / 2.0) * width;
            let bars: Vec<Bar> = grouped
                .rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| {
                    let value = row.values[col]?;
                    let fill = if n_cols == 1 {
                        colors.color_for(&labels[i])
                    } else {
                        palette[col]
                    };
                    Some(
                        Bar::new(i as f64 + offset, value)
                            .width(width)
                            .name(&labels[i])
                            .fill(fill),
                    )
                })
                .collect();
            BarChart::new(bars)
                .name(column_name(grouped, col))
                .color(palette[col])
        })
        .collect();

    plot(id)
        .x_axis_formatter(category_formatter(labels))
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

fn scatter(
    ui: &mut Ui,
    id: &str,
    grouped: &GroupedTable,
    (x, y): (usize, usize),
    (guide_x, guide_y): (Option<f64>, Option<f64>),
    colors: &ColorMap,
) {
    plot(id)
        .x_axis_label(column_name(grouped, x))
        .y_axis_label(column_name(grouped, y))
        .show(ui, |plot_ui| {
            for row in &grouped.rows {
                let (Some(px), Some(py)) = (
                    row.values.get(x).copied().flatten(),
                    row.values.get(y).copied().flatten(),
                ) else {
                    continue;
                };
                // Points sharing a first key share a legend entry and colour.
                let group = row.key.first().map(ToString::to_string).unwrap_or_default();
                plot_ui.points(
                    Points::new(vec![[px, py]])
                        .radius(5.0)
                        .color(colors.color_for(&group))
                        .name(&group),
                );
            }
            if let Some(gx) = guide_x {
                plot_ui.vline(
                    VLine::new(gx)
                        .name("median")
                        .color(Color32::GRAY)
                        .style(LineStyle::dashed_loose()),
                );
            }
            if let Some(gy) = guide_y {
                plot_ui.hline(
                    HLine::new(gy)
                        .name("parity")
                        .color(Color32::GRAY)
                        .style(LineStyle::dashed_loose()),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Histogram and threshold charts
// ---------------------------------------------------------------------------

fn counts_chart(ui: &mut Ui, id: &str, field: &str, counts: &[ValueCount]) {
    let bars: Vec<Bar> = counts
        .iter()
        .map(|c| Bar::new(c.value, c.count as f64).width(0.8).name(format!("{}", c.value)))
        .collect();
    plot(id)
        .x_axis_label(field)
        .y_axis_label("count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(field).color(Color32::LIGHT_BLUE));
        });
}

fn threshold_chart(ui: &mut Ui, id: &str, rows: &[ThresholdRow], threshold: f64) {
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let (meets, misses): (Vec<Bar>, Vec<Bar>) = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let bar = Bar::new(i as f64, r.value?).width(0.6).name(&r.label);
            Some((r.meets, bar))
        })
        .fold((Vec::new(), Vec::new()), |(mut yes, mut no), (ok, bar)| {
            if ok {
                yes.push(bar);
            } else {
                no.push(bar);
            }
            (yes, no)
        });

    plot(id)
        .x_axis_formatter(category_formatter(labels))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(
                BarChart::new(meets)
                    .name("meets threshold")
                    .color(Color32::LIGHT_GREEN),
            );
            plot_ui.bar_chart(
                BarChart::new(misses)
                    .name("below threshold")
                    .color(Color32::LIGHT_RED),
            );
            plot_ui.hline(
                HLine::new(threshold)
                    .name(format!("{threshold}% threshold"))
                    .color(Color32::RED)
                    .style(LineStyle::dashed_loose()),
            );
        });
}
