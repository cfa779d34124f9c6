use std::collections::BTreeMap;
use std::fmt;

use crate::data::model::{Dimension, DimensionValue};

use super::derive::{DerivedFrame, Field};

// ---------------------------------------------------------------------------
// Group-by / reduce
// ---------------------------------------------------------------------------

/// One reduction applied to every group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean(Field),
    Sum(Field),
}

impl Reduction {
    pub fn field(self) -> Field {
        match self {
            Reduction::Mean(f) | Reduction::Sum(f) => f,
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Mean(field) => write!(f, "mean({field})"),
            Reduction::Sum(field) => write!(f, "sum({field})"),
        }
    }
}

/// One emitted group: its key tuple and one value per reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: Vec<DimensionValue>,
    pub values: Vec<Option<f64>>,
}

impl GroupRow {
    /// Key rendered for axis labels and legends, e.g. `2023 / EU`.
    pub fn label(&self) -> String {
        self.key
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Result of [`aggregate`]: rows sorted ascending by key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTable {
    pub keys: Vec<Dimension>,
    pub reductions: Vec<Reduction>,
    pub rows: Vec<GroupRow>,
}

impl GroupedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn finish(self, reduction: Reduction) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let value = match reduction {
            Reduction::Mean(_) => self.sum / self.count as f64,
            Reduction::Sum(_) => self.sum,
        };
        value.is_finite().then_some(value)
    }
}

/// Partition `frame` by the ordered `keys` and apply each reduction per group.
///
/// * Groups come out in ascending key order.
/// * Only groups that own at least one row are emitted.
/// * Undefined values are skipped; a group with no defined value for a
///   column yields `None` in that column.
/// * With no keys the whole frame forms a single group (empty key).
pub fn aggregate(
    frame: &DerivedFrame<'_>,
    keys: &[Dimension],
    reductions: &[Reduction],
) -> GroupedTable {
    let mut groups: BTreeMap<Vec<DimensionValue>, Vec<Accumulator>> = BTreeMap::new();

    for row in frame.rows() {
        let key: Vec<DimensionValue> = keys.iter().map(|d| d.value_of(row.record)).collect();
        let accs = groups
            .entry(key)
            .or_insert_with(|| vec![Accumulator::default(); reductions.len()]);
        for (acc, reduction) in accs.iter_mut().zip(reductions) {
            if let Some(v) = row.value(reduction.field()) {
                acc.sum += v;
                acc.count += 1;
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, accs)| GroupRow {
            key,
            values: accs
                .into_iter()
                .zip(reductions)
                .map(|(acc, r)| acc.finish(*r))
                .collect(),
        })
        .collect();

    GroupedTable {
        keys: keys.to_vec(),
        reductions: reductions.to_vec(),
        rows,
    }
}

/// Mean of the defined values of `field` over the whole frame.
pub fn mean(frame: &DerivedFrame<'_>, field: Field) -> Option<f64> {
    scalar(frame, Reduction::Mean(field))
}

/// Sum of the defined values of `field` over the whole frame.
pub fn sum(frame: &DerivedFrame<'_>, field: Field) -> Option<f64> {
    scalar(frame, Reduction::Sum(field))
}

fn scalar(frame: &DerivedFrame<'_>, reduction: Reduction) -> Option<f64> {
    aggregate(frame, &[], &[reduction])
        .rows
        .first()
        .and_then(|row| row.values[0])
}

/// Median of the defined values, `None` when there are none.
pub fn median(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut v: Vec<f64> = values.into_iter().flatten().collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

// ---------------------------------------------------------------------------
// Value counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueCount {
    pub value: f64,
    pub count: usize,
}

/// Histogram of the defined values of `field`: most frequent first, ties in
/// ascending value order.
pub fn value_counts(frame: &DerivedFrame<'_>, field: Field) -> Vec<ValueCount> {
    let mut values: Vec<f64> = frame.defined(field).collect();
    values.sort_by(f64::total_cmp);

    let mut counts: Vec<ValueCount> = Vec::new();
    for v in values {
        match counts.last_mut() {
            Some(last) if last.value == v => last.count += 1,
            _ => counts.push(ValueCount { value: v, count: 1 }),
        }
    }
    // Stable: equal counts keep ascending value order.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// A correlation coefficient, or N/A when it is not defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Coefficient(f64),
    NotAvailable,
}

impl Correlation {
    pub fn value(self) -> Option<f64> {
        match self {
            Correlation::Coefficient(r) => Some(r),
            Correlation::NotAvailable => None,
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Coefficient(r) => write!(f, "{r:.2}"),
            Correlation::NotAvailable => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub fields: Vec<Field>,
    /// `cells[i][j]` correlates `fields[i]` with `fields[j]`.
    pub cells: Vec<Vec<Correlation>>,
}

/// Pairwise Pearson correlation over the rows where both fields are defined.
pub fn correlation(frame: &DerivedFrame<'_>, fields: &[Field]) -> CorrelationMatrix {
    let cells = fields
        .iter()
        .map(|&a| {
            fields
                .iter()
                .map(|&b| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = frame
                        .rows()
                        .iter()
                        .filter_map(|r| Some((r.value(a)?, r.value(b)?)))
                        .unzip();
                    pearson(&xs, &ys)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        fields: fields.to_vec(),
        cells,
    }
}

/// N/A for fewer than two pairs or when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Correlation {
    let n = xs.len().min(ys.len());
    if n < 2 || is_constant(&xs[..n]) || is_constant(&ys[..n]) {
        return Correlation::NotAvailable;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        Correlation::Coefficient(r.clamp(-1.0, 1.0))
    } else {
        Correlation::NotAvailable
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

// ---------------------------------------------------------------------------
// Min-max normalisation
// ---------------------------------------------------------------------------

/// Rescale each column of `table` to [0, 1] across its groups. A constant
/// column maps to 0.5; undefined cells stay undefined.
pub fn min_max_normalize(table: &GroupedTable) -> GroupedTable {
    let mut out = table.clone();
    for col in 0..table.reductions.len() {
        let defined = table.rows.iter().filter_map(|r| r.values[col]);
        let (min, max) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        let range = max - min;
        for row in &mut out.rows {
            row.values[col] = row.values[col].map(|v| {
                if range == 0.0 {
                    0.5
                } else {
                    (v - min) / range
                }
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Equal-width binning and pivot
// ---------------------------------------------------------------------------

pub const TRAINING_LEVELS: [&str; 5] = ["Very Low", "Low", "Medium", "High", "Very High"];

/// Assign each value to one of `bins` equal-width, right-closed intervals
/// spanning the defined values. The minimum always lands in the first bin.
/// A zero-width range is widened by 0.1% on both sides, which puts every
/// value in the middle bin.
pub fn bin_equal_width(values: &[Option<f64>], bins: usize) -> Vec<Option<usize>> {
    let (min, max) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if bins == 0 || !min.is_finite() {
        return vec![None; values.len()];
    }

    let (lo, hi) = if min == max {
        let adj = if min == 0.0 { 0.001 } else { 0.001 * min.abs() };
        (min - adj, max + adj)
    } else {
        (min, max)
    };
    let width = (hi - lo) / bins as f64;

    values
        .iter()
        .map(|v| {
            v.map(|v| {
                let pos = ((v - lo) / width).ceil().max(1.0) as usize;
                (pos - 1).min(bins - 1)
            })
        })
        .collect()
}

/// Mean of `value` per (`row_dim`, bin of `bin_field`) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub row_keys: Vec<DimensionValue>,
    pub column_labels: Vec<String>,
    /// `None` where no row falls into the cell.
    pub cells: Vec<Vec<Option<f64>>>,
}

pub fn pivot_mean(
    frame: &DerivedFrame<'_>,
    row_dim: Dimension,
    bin_field: Field,
    labels: &[&str],
    value: Field,
) -> PivotTable {
    let to_bin: Vec<Option<f64>> = frame.rows().iter().map(|r| r.value(bin_field)).collect();
    let bins = bin_equal_width(&to_bin, labels.len());

    let mut acc: BTreeMap<DimensionValue, Vec<Accumulator>> = BTreeMap::new();
    for (row, bin) in frame.rows().iter().zip(bins) {
        let cells = acc
            .entry(row_dim.value_of(row.record))
            .or_insert_with(|| vec![Accumulator::default(); labels.len()]);
        if let (Some(bin), Some(v)) = (bin, row.value(value)) {
            cells[bin].sum += v;
            cells[bin].count += 1;
        }
    }

    let (row_keys, cells): (Vec<DimensionValue>, Vec<Vec<Option<f64>>>) = acc
        .into_iter()
        .map(|(key, accs)| {
            let cells = accs
                .into_iter()
                .map(|a| a.finish(Reduction::Mean(value)))
                .collect();
            (key, cells)
        })
        .unzip();

    PivotTable {
        row_keys,
        column_labels: labels.iter().map(|s| s.to_string()).collect(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use crate::data::model::{EsgRecord, Measure};
    use crate::pipeline::derive::{Metric, derive_records};

    fn region_row(region: &str, values: Vec<Option<f64>>) -> GroupRow {
        GroupRow {
            key: vec![DimensionValue::Text(region.to_string())],
            values,
        }
    }

    fn frame(records: &[EsgRecord]) -> DerivedFrame<'_> {
        derive_records(records.iter().collect())
    }

    #[test]
    fn mean_excludes_undefined_rows() {
        let mut a = record("Company A", "EU", "Ops", 2023, 1);
        a.production_output_units = 10.0;
        a.energy_consumption_mwh = 50.0;
        let mut b = record("Company A", "EU", "Ops", 2023, 2);
        b.production_output_units = 0.0;
        let mut c = record("Company A", "EU", "HR", 2023, 1);
        c.production_output_units = 4.0;
        c.energy_consumption_mwh = 2.0;
        let records = vec![a, b, c];
        let f = frame(&records);

        let energy = Field::Metric(Metric::EnergyIntensity);
        assert_eq!(f.rows()[0].value(energy), Some(5.0));
        assert_eq!(f.rows()[1].value(energy), None);

        let grouped = aggregate(&f, &[Dimension::Department], &[Reduction::Mean(energy)]);
        assert_eq!(grouped.rows.len(), 2);
        // Keys sort ascending: HR before Ops.
        assert_eq!(grouped.rows[0].label(), "HR");
        assert_eq!(grouped.rows[0].values, vec![Some(0.5)]);
        assert_eq!(grouped.rows[1].label(), "Ops");
        assert_eq!(grouped.rows[1].values, vec![Some(5.0)]);
    }

    #[test]
    fn group_with_only_undefined_values_yields_none() {
        let mut a = record("A", "EU", "Ops", 2023, 1);
        a.production_output_units = 0.0;
        let records = vec![a];
        let f = frame(&records);
        let energy = Field::Metric(Metric::EnergyIntensity);
        let reductions = [Reduction::Mean(energy), Reduction::Sum(energy)];
        let grouped = aggregate(&f, &[Dimension::Year], &reductions);
        assert_eq!(grouped.rows[0].values, vec![None, None]);
    }

    #[test]
    fn multi_key_groups_and_sums() {
        let mut records = vec![
            record("A", "NA", "Ops", 2023, 1),
            record("A", "EU", "Ops", 2023, 1),
            record("A", "EU", "Ops", 2022, 4),
            record("A", "EU", "Ops", 2023, 2),
        ];
        records[3].whistleblower_reports = 5.0;
        let f = frame(&records);
        let reports = Field::Measure(Measure::WhistleblowerReports);
        let keys = [Dimension::Year, Dimension::Region];
        let grouped = aggregate(&f, &keys, &[Reduction::Sum(reports)]);
        let labels: Vec<String> = grouped.rows.iter().map(GroupRow::label).collect();
        assert_eq!(labels, vec!["2022 / EU", "2023 / EU", "2023 / NA"]);
        assert_eq!(grouped.rows[1].values, vec![Some(7.0)]);
        assert_eq!(grouped.reductions, vec![Reduction::Sum(reports)]);
    }

    #[test]
    fn no_keys_is_one_group() {
        let records = vec![record("A", "EU", "Ops", 2023, 1), record("A", "NA", "HR", 2022, 2)];
        let f = frame(&records);
        assert_eq!(mean(&f, Field::Measure(Measure::EsgScore)), Some(65.0));
        assert_eq!(sum(&f, Field::Measure(Measure::Headcount)), Some(240.0));
    }

    #[test]
    fn empty_frame_emits_no_groups() {
        let f = frame(&[]);
        let esg = Field::Measure(Measure::EsgScore);
        let grouped = aggregate(&f, &[Dimension::Year], &[Reduction::Mean(esg)]);
        assert!(grouped.is_empty());
        assert_eq!(mean(&f, esg), None);
    }

    #[test]
    fn value_counts_order_by_frequency_then_value() {
        let levels = [2.0, 0.0, 2.0, 1.0, 0.0, 3.0];
        let records: Vec<EsgRecord> = levels
            .iter()
            .map(|&l| {
                let mut r = record("A", "EU", "Ops", 2023, 1);
                r.controversy_level_0_low_3_high = l;
                r
            })
            .collect();
        let counts = value_counts(&frame(&records), Field::Measure(Measure::ControversyLevel));
        let pairs: Vec<(f64, usize)> = counts.iter().map(|c| (c.value, c.count)).collect();
        assert_eq!(pairs, vec![(0.0, 2), (2.0, 2), (1.0, 1), (3.0, 1)]);
    }

    #[test]
    fn pearson_basics() {
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), Correlation::Coefficient(1.0));
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), Correlation::Coefficient(-1.0));
        assert_eq!(pearson(&[1.0], &[1.0]), Correlation::NotAvailable);
        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), Correlation::NotAvailable);
        assert_eq!(Correlation::NotAvailable.to_string(), "N/A");
    }

    #[test]
    fn correlation_matrix_marks_degenerate_cells() {
        let mut records = vec![
            record("A", "EU", "Ops", 2023, 1),
            record("A", "EU", "Ops", 2023, 2),
            record("A", "EU", "Ops", 2023, 3),
        ];
        for (i, r) in records.iter_mut().enumerate() {
            r.esg_score = 50.0 + i as f64 * 10.0;
            r.independent_directors_pct = 0.5 + i as f64 * 0.1;
        }
        let fields = [
            Field::Measure(Measure::EsgScore),
            Field::Measure(Measure::IndependentDirectorsPct),
            Field::Measure(Measure::BoardSize),
        ];
        let m = correlation(&frame(&records), &fields);
        assert!((m.cells[0][1].value().unwrap() - 1.0).abs() < 1e-9);
        assert!((m.cells[0][0].value().unwrap() - 1.0).abs() < 1e-9);
        // Board size is constant across the rows.
        assert_eq!(m.cells[2][0], Correlation::NotAvailable);
        assert_eq!(m.cells[2][2], Correlation::NotAvailable);
    }

    #[test]
    fn single_row_correlation_is_not_available() {
        let records = vec![record("A", "EU", "Ops", 2023, 1)];
        let m = correlation(&frame(&records), &[Field::Measure(Measure::EsgScore)]);
        assert_eq!(m.cells, vec![vec![Correlation::NotAvailable]]);
    }

    #[test]
    fn min_max_normalize_handles_constant_columns() {
        let table = GroupedTable {
            keys: vec![Dimension::Region],
            reductions: vec![
                Reduction::Sum(Field::Measure(Measure::DataBreaches)),
                Reduction::Sum(Field::Measure(Measure::FinesPenalties)),
            ],
            rows: vec![
                region_row("EU", vec![Some(2.0), Some(1.0)]),
                region_row("NA", vec![Some(6.0), Some(1.0)]),
                region_row("SA", vec![Some(4.0), None]),
            ],
        };
        let n = min_max_normalize(&table);
        let breaches: Vec<Option<f64>> = n.rows.iter().map(|r| r.values[0]).collect();
        assert_eq!(breaches, vec![Some(0.0), Some(1.0), Some(0.5)]);
        let fines: Vec<Option<f64>> = n.rows.iter().map(|r| r.values[1]).collect();
        assert_eq!(fines, vec![Some(0.5), Some(0.5), None]);
    }

    #[test]
    fn min_max_normalize_stretches_tiny_ranges() {
        // A spread far below f64::EPSILON is still a spread.
        let tiny = 2f64.powi(-70);
        let fines = Reduction::Sum(Field::Measure(Measure::FinesPenalties));
        let table = GroupedTable {
            keys: vec![Dimension::Region],
            reductions: vec![fines],
            rows: vec![
                region_row("EU", vec![Some(0.0)]),
                region_row("NA", vec![Some(tiny)]),
                region_row("SA", vec![Some(tiny / 2.0)]),
            ],
        };
        let n = min_max_normalize(&table);
        let scaled: Vec<Option<f64>> = n.rows.iter().map(|r| r.values[0]).collect();
        assert_eq!(scaled, vec![Some(0.0), Some(1.0), Some(0.5)]);
    }

    #[test]
    fn equal_width_bins() {
        let values = [Some(0.0), Some(10.0), Some(5.0), None, Some(2.0), Some(8.0)];
        let bins = bin_equal_width(&values, 5);
        assert_eq!(bins, vec![Some(0), Some(4), Some(2), None, Some(0), Some(3)]);
        // Edges are right-closed: 2.0 sits on the first boundary.

        let flat = bin_equal_width(&[Some(7.0), Some(7.0)], 5);
        assert_eq!(flat, vec![Some(2), Some(2)]);
    }

    #[test]
    fn pivot_means_by_region_and_training_level() {
        let mut records = vec![
            record("A", "EU", "Ops", 2023, 1),
            record("A", "EU", "HR", 2023, 1),
            record("A", "NA", "Ops", 2023, 1),
        ];
        records[0].avg_training_hours_per_employee = 10.0;
        records[0].pay_equity_ratio_female_to_male = 0.9;
        records[1].avg_training_hours_per_employee = 10.0;
        records[1].pay_equity_ratio_female_to_male = 1.0;
        records[2].avg_training_hours_per_employee = 50.0;
        records[2].pay_equity_ratio_female_to_male = 1.1;

        let p = pivot_mean(
            &frame(&records),
            Dimension::Region,
            Field::Measure(Measure::TrainingHours),
            &TRAINING_LEVELS,
            Field::Measure(Measure::PayEquityRatio),
        );
        assert_eq!(p.row_keys.len(), 2);
        assert_eq!(p.column_labels[4], "Very High");
        assert!((p.cells[0][0].unwrap() - 0.95).abs() < 1e-9);
        assert_eq!(p.cells[0][4], None);
        assert_eq!(p.cells[1][4], Some(1.1));
    }

    #[test]
    fn median_of_defined_values() {
        assert_eq!(median([Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median([Some(4.0), Some(1.0)]), Some(2.5));
        assert_eq!(median([None]), None);
    }
}
