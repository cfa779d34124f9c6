use crate::config::Settings;
use crate::data::filter::{FilterSelection, filter};
use crate::data::model::{Dimension, EsgRecord, EsgTable, Measure};

use super::aggregate::{
    CorrelationMatrix, GroupedTable, PivotTable, Reduction, TRAINING_LEVELS, ValueCount,
    aggregate, correlation, mean, median, min_max_normalize, pivot_mean, value_counts,
};
use super::derive::{DerivedFrame, Field, Metric, derive};
use super::export::{export_file_name, export_order};

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Environmental,
    Social,
    Governance,
    Trends,
    Detail,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Environmental,
        Tab::Social,
        Tab::Governance,
        Tab::Trends,
        Tab::Detail,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Environmental => "Environmental",
            Tab::Social => "Social",
            Tab::Governance => "Governance",
            Tab::Trends => "Trends",
            Tab::Detail => "Detailed View",
        }
    }
}

// ---------------------------------------------------------------------------
// KPI cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiFormat {
    /// Fixed decimals followed by a unit suffix (may be empty).
    Decimal(usize, &'static str),
    /// Value already in percent units: `42.0` → `42.0%`.
    Percent(usize),
    /// Fraction shown as a percentage: `0.42` → `42.0%`.
    FractionPercent(usize),
    /// Rounded to a whole number with thousands separators.
    Thousands,
}

impl KpiFormat {
    /// Undefined and non-finite values render as `N/A`.
    pub fn apply(self, value: Option<f64>) -> String {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return "N/A".to_string();
        };
        match self {
            KpiFormat::Decimal(decimals, unit) => format!("{v:.decimals$}{unit}"),
            KpiFormat::Percent(decimals) => format!("{v:.decimals$}%"),
            KpiFormat::FractionPercent(decimals) => format!("{:.decimals$}%", v * 100.0),
            KpiFormat::Thousands => thousands(v),
        }
    }
}

fn thousands(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if v < 0.0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kpi {
    pub label: &'static str,
    pub value: Option<f64>,
    pub format: KpiFormat,
    /// Change against a reference period, if any.
    pub delta: Option<f64>,
}

impl Kpi {
    fn new(label: &'static str, value: Option<f64>, format: KpiFormat) -> Self {
        Kpi {
            label,
            value,
            format,
            delta: None,
        }
    }

    pub fn display(&self) -> String {
        self.format.apply(self.value)
    }

    pub fn delta_display(&self) -> Option<String> {
        self.delta
            .filter(|d| d.is_finite())
            .map(|d| format!("{d:+.1}"))
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartKind {
    /// x is the first (year) key; one line per column.
    Line,
    /// Keys `[Year, Quarter]`; one line per column, ticks labelled `YYYY-Qn`.
    Periods,
    /// Keys `[x, split]`; one line per distinct split value, first column.
    Split,
    /// One bar group per row, one bar per column.
    Bar,
    /// One point per row at (column `x`, column `y`), with optional guide
    /// lines.
    Scatter {
        x: usize,
        y: usize,
        guide_x: Option<f64>,
        guide_y: Option<f64>,
    },
}

/// One department measured against the policy coverage threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRow {
    pub label: String,
    pub value: Option<f64>,
    pub meets: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelBody {
    Chart { kind: ChartKind, table: GroupedTable },
    Scorecard(GroupedTable),
    /// Columns already min-max normalised to [0, 1].
    Heatmap(GroupedTable),
    Correlation(CorrelationMatrix),
    Counts { field: Field, counts: Vec<ValueCount> },
    Pivot(PivotTable),
    Threshold { rows: Vec<ThresholdRow>, threshold: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: &'static str,
    pub body: PanelBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub tab: Tab,
    pub kpis: Vec<Kpi>,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub company: String,
    pub matched_rows: usize,
    pub headline: Vec<Kpi>,
    pub sections: Vec<Section>,
    /// Matched records in export order.
    pub detail: Vec<EsgRecord>,
    pub export_file_name: String,
}

impl Dashboard {
    pub fn section(&self, tab: Tab) -> Option<&Section> {
        self.sections.iter().find(|s| s.tab == tab)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewModel {
    /// The filter matched nothing.
    NoData,
    Dashboard(Box<Dashboard>),
}

pub fn period_label(year: i64, quarter: i64) -> String {
    format!("{year}-Q{quarter}")
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

const BY_YEAR: &[Dimension] = &[Dimension::Year];
const BY_PERIOD: &[Dimension] = &[Dimension::Year, Dimension::Quarter];
const BY_REGION: &[Dimension] = &[Dimension::Region];
const BY_DEPARTMENT: &[Dimension] = &[Dimension::Department];

/// Build everything the dashboard shows for one selection.
///
/// Runs filter, derivation and aggregation from scratch on every call; the
/// table itself is never modified.
pub fn render(table: &EsgTable, selection: &FilterSelection, settings: &Settings) -> ViewModel {
    let Some(subset) = filter(table, selection).rows() else {
        log::warn!(
            "No rows for '{}' with {} years, {} regions, {} departments selected",
            selection.company,
            selection.years.len(),
            selection.regions.len(),
            selection.departments.len()
        );
        return ViewModel::NoData;
    };

    let frame = derive(&subset);
    log::debug!(
        "Rendering {} of {} rows for '{}'",
        frame.len(),
        table.len(),
        selection.company
    );

    let mut detail: Vec<EsgRecord> = subset.records().cloned().collect();
    detail.sort_by(export_order);

    ViewModel::Dashboard(Box::new(Dashboard {
        company: selection.company.clone(),
        matched_rows: frame.len(),
        headline: headline(&frame),
        sections: vec![
            environmental(&frame),
            social(&frame),
            governance(&frame, settings),
            trends(&frame),
            Section {
                tab: Tab::Detail,
                kpis: Vec::new(),
                panels: Vec::new(),
            },
        ],
        detail,
        export_file_name: export_file_name(&selection.company),
    }))
}

fn raw(m: Measure) -> Field {
    Field::Measure(m)
}

fn metric(m: Metric) -> Field {
    Field::Metric(m)
}

fn means(frame: &DerivedFrame<'_>, keys: &[Dimension], fields: &[Field]) -> GroupedTable {
    let reductions: Vec<Reduction> = fields.iter().map(|&f| Reduction::Mean(f)).collect();
    aggregate(frame, keys, &reductions)
}

fn sums(frame: &DerivedFrame<'_>, keys: &[Dimension], fields: &[Field]) -> GroupedTable {
    let reductions: Vec<Reduction> = fields.iter().map(|&f| Reduction::Sum(f)).collect();
    aggregate(frame, keys, &reductions)
}

fn chart(title: &'static str, kind: ChartKind, table: GroupedTable) -> Panel {
    Panel {
        title,
        body: PanelBody::Chart { kind, table },
    }
}

fn scatter(title: &'static str, table: GroupedTable) -> Panel {
    let kind = ChartKind::Scatter {
        x: 0,
        y: 1,
        guide_x: None,
        guide_y: None,
    };
    chart(title, kind, table)
}

fn panel(title: &'static str, body: PanelBody) -> Panel {
    Panel { title, body }
}

/// Finite per-row values of an expression over the raw record.
fn row_values(frame: &DerivedFrame<'_>, f: impl Fn(&EsgRecord) -> f64) -> Vec<f64> {
    frame
        .rows()
        .iter()
        .map(|r| f(r.record))
        .filter(|v| v.is_finite())
        .collect()
}

fn mean_of(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn sum_of(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum())
}

fn headline(frame: &DerivedFrame<'_>) -> Vec<Kpi> {
    let scope12 = row_values(frame, |r| r.scope1_emissions_tco2e + r.scope2_emissions_tco2e);
    let scope123 = row_values(frame, |r| {
        r.scope1_emissions_tco2e + r.scope2_emissions_tco2e + r.scope3_emissions_tco2e
    });
    vec![
        Kpi::new(
            "Average ESG Score",
            mean(frame, raw(Measure::EsgScore)),
            KpiFormat::Decimal(1, ""),
        ),
        Kpi::new(
            "Avg Scope 1+2 Emissions (tCO2e)",
            mean_of(&scope12),
            KpiFormat::Thousands,
        ),
        Kpi::new(
            "Avg Renewable Energy %",
            mean(frame, raw(Measure::RenewableEnergySharePct)),
            KpiFormat::Percent(1),
        ),
        Kpi::new(
            "Avg Female Representation",
            mean(frame, raw(Measure::FemalePct)),
            KpiFormat::FractionPercent(1),
        ),
        Kpi::new(
            "Total Emissions (tCO2e)",
            sum_of(&scope123),
            KpiFormat::Thousands,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn environmental(frame: &DerivedFrame<'_>) -> Section {
    let energy = metric(Metric::EnergyIntensity);
    let carbon = metric(Metric::CarbonIntensity);
    let waste = metric(Metric::WasteIntensity);
    let water = metric(Metric::WaterIntensity);
    let green = metric(Metric::GreenEfficiencyScore);
    let renewable = raw(Measure::RenewableEnergySharePct);
    let recycled = raw(Measure::WasteRecycledPct);

    let kpis = vec![
        Kpi::new("Energy Intensity", mean(frame, energy), KpiFormat::Decimal(2, " MWh/unit")),
        Kpi::new("Carbon Intensity", mean(frame, carbon), KpiFormat::Decimal(1, " tCO₂e/MUSD")),
        Kpi::new("Waste Intensity", mean(frame, waste), KpiFormat::Decimal(3, " tonnes/unit")),
        Kpi::new("Water Intensity", mean(frame, water), KpiFormat::Decimal(1, " m³/unit")),
    ];

    let scopes = [
        raw(Measure::Scope1Emissions),
        raw(Measure::Scope2Emissions),
        raw(Measure::Scope3Emissions),
    ];
    let waste_by_dept = [raw(Measure::WasteGenerated), recycled];
    let water_use = [raw(Measure::WaterWithdrawal), raw(Measure::WaterRecycledPct)];

    let panels = vec![
        chart(
            "Energy Intensity Trend (MWh per Production Unit)",
            ChartKind::Line,
            means(frame, BY_YEAR, &[energy]),
        ),
        chart(
            "Average Emissions by Scope Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &scopes),
        ),
        chart(
            "Carbon Intensity Trend (tCO₂e per MUSD Revenue)",
            ChartKind::Line,
            means(frame, BY_YEAR, &[carbon]),
        ),
        chart(
            "Renewable Energy Share by Region",
            ChartKind::Bar,
            means(frame, BY_REGION, &[renewable]),
        ),
        chart(
            "Waste Recycled (%) Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &[recycled]),
        ),
        chart(
            "Waste Intensity by Region (Tonnes per Production Unit)",
            ChartKind::Bar,
            means(frame, BY_REGION, &[waste]),
        ),
        chart(
            "Departmental Waste Comparison",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &waste_by_dept),
        ),
        scatter(
            "Waste Generation vs Recycling Rate by Department",
            means(frame, BY_DEPARTMENT, &waste_by_dept),
        ),
        chart(
            "Water Intensity Trend (m³ per Production Unit)",
            ChartKind::Line,
            means(frame, BY_YEAR, &[water]),
        ),
        chart(
            "Water Usage and Recycling Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &water_use),
        ),
        scatter("Regional Water Dependency", means(frame, BY_REGION, &water_use)),
        chart(
            "Green Efficiency Score by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[green]),
        ),
        panel(
            "Departmental Environmental Performance",
            PanelBody::Scorecard(means(
                frame,
                BY_DEPARTMENT,
                &[carbon, renewable, recycled, green],
            )),
        ),
        chart(
            "Environmental Performance Trends",
            ChartKind::Line,
            means(frame, BY_YEAR, &[green, carbon, renewable]),
        ),
        panel(
            "Regional Environmental Performance",
            PanelBody::Scorecard(means(frame, BY_REGION, &[green, carbon, renewable, recycled])),
        ),
    ];

    Section {
        tab: Tab::Environmental,
        kpis,
        panels,
    }
}

fn social(frame: &DerivedFrame<'_>) -> Section {
    let engagement = raw(Measure::EngagementScore);
    let turnover = raw(Measure::TurnoverPct);
    let pay_equity = raw(Measure::PayEquityRatio);
    let training = raw(Measure::TrainingHours);
    let minority = raw(Measure::MinorityPct);
    let female = raw(Measure::FemalePct);
    let wellbeing = metric(Metric::SocialWellBeingIndex);
    let diversity = metric(Metric::DiversityInclusionIndex);

    let kpis = vec![
        Kpi::new("Avg Engagement Score", mean(frame, engagement), KpiFormat::Decimal(1, "")),
        Kpi::new("Avg Turnover Rate", mean(frame, turnover), KpiFormat::FractionPercent(1)),
        Kpi::new("Avg Pay Equity Ratio", mean(frame, pay_equity), KpiFormat::Decimal(3, "")),
        Kpi::new("Social Well-Being Index", mean(frame, wellbeing), KpiFormat::Decimal(1, "")),
    ];

    // Minority share vs pay equity, guided by the median department and parity.
    let representation = means(
        frame,
        BY_DEPARTMENT,
        &[minority, pay_equity, raw(Measure::Headcount)],
    );
    let median_minority = median(representation.rows.iter().map(|r| r.values[0]));
    let representation_kind = ChartKind::Scatter {
        x: 0,
        y: 1,
        guide_x: median_minority,
        guide_y: Some(1.0),
    };

    let panels = vec![
        chart(
            "Gender Distribution by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[female, metric(Metric::MalePct)]),
        ),
        chart(
            "Diversity Trends Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &[female, minority]),
        ),
        chart(
            "Minority Representation by Region Over Time",
            ChartKind::Split,
            means(frame, &[Dimension::Year, Dimension::Region], &[minority]),
        ),
        chart(
            "Pay Equity Ratio by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[pay_equity]),
        ),
        chart(
            "Average Training Hours by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[training]),
        ),
        chart(
            "Employee Turnover Rate by Quarter",
            ChartKind::Periods,
            means(frame, BY_PERIOD, &[turnover]),
        ),
        chart(
            "Safety Performance: Lost Time Incident Rate",
            ChartKind::Line,
            means(frame, BY_YEAR, &[raw(Measure::LostTimeIncidentRate)]),
        ),
        panel(
            "HR Metrics Correlation",
            PanelBody::Correlation(correlation(
                frame,
                &[training, turnover, engagement, pay_equity],
            )),
        ),
        chart(
            "Employee Engagement by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[engagement]),
        ),
        chart(
            "Employee Engagement Trend",
            ChartKind::Line,
            means(frame, BY_YEAR, &[engagement]),
        ),
        chart(
            "Community Investment by Year (USD M)",
            ChartKind::Bar,
            sums(frame, BY_YEAR, &[raw(Measure::CommunityInvestment)]),
        ),
        chart(
            "Training Hours vs Turnover Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &[training, turnover]),
        ),
        scatter(
            "Pay Equity vs Engagement by Department",
            means(frame, BY_DEPARTMENT, &[pay_equity, engagement]),
        ),
        panel(
            "Pay Equity by Region and Training Level",
            PanelBody::Pivot(pivot_mean(
                frame,
                Dimension::Region,
                training,
                &TRAINING_LEVELS,
                pay_equity,
            )),
        ),
        chart(
            "Minority Representation vs Pay Equity by Department",
            representation_kind,
            representation,
        ),
        chart(
            "Social Well-Being Index by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[wellbeing]),
        ),
        chart(
            "Social Well-Being Index Trend",
            ChartKind::Line,
            means(frame, BY_YEAR, &[wellbeing]),
        ),
        chart(
            "Diversity & Inclusion Index by Region",
            ChartKind::Bar,
            means(frame, BY_REGION, &[diversity]),
        ),
        chart(
            "Diversity & Inclusion Index Trend",
            ChartKind::Line,
            means(frame, BY_YEAR, &[diversity]),
        ),
        panel(
            "Regional Social Performance",
            PanelBody::Scorecard(means(
                frame,
                BY_REGION,
                &[wellbeing, diversity, engagement, pay_equity],
            )),
        ),
        panel(
            "Departmental Social Performance",
            PanelBody::Scorecard(means(frame, BY_DEPARTMENT, &[wellbeing, turnover, training])),
        ),
    ];

    Section {
        tab: Tab::Social,
        kpis,
        panels,
    }
}

fn governance(frame: &DerivedFrame<'_>, settings: &Settings) -> Section {
    let gov = metric(Metric::GovernanceEffectivenessIndex);
    let independence = raw(Measure::IndependentDirectorsPct);
    let policy = raw(Measure::EsgPolicyCoveragePct);
    let controversy = raw(Measure::ControversyLevel);
    let anti_corruption = raw(Measure::AntiCorruptionTrainingPct);
    let supplier = raw(Measure::SupplierCodeCoveragePct);
    let breaches = raw(Measure::DataBreaches);
    let fines = raw(Measure::FinesPenalties);
    let whistleblower = raw(Measure::WhistleblowerReports);
    let board_size = raw(Measure::BoardSize);
    let board_gender = raw(Measure::BoardGenderDiversityPct);
    let esg = raw(Measure::EsgScore);

    let mut kpis = vec![
        Kpi::new("Governance Effectiveness Index", mean(frame, gov), KpiFormat::Decimal(1, "")),
        Kpi::new("Avg Board Independence", mean(frame, independence), KpiFormat::Percent(1)),
        Kpi::new("ESG Policy Coverage", mean(frame, policy), KpiFormat::Percent(1)),
        Kpi::new("Avg Controversy Level", mean(frame, controversy), KpiFormat::Decimal(2, "")),
    ];
    kpis.extend(benchmark(frame, settings.industry_benchmark));

    let compliance = {
        let mut table = aggregate(
            frame,
            BY_DEPARTMENT,
            &[
                Reduction::Mean(anti_corruption),
                Reduction::Mean(policy),
                Reduction::Mean(supplier),
                Reduction::Sum(breaches),
                Reduction::Sum(fines),
            ],
        );
        table.rows.retain(|r| r.values.iter().any(Option::is_some));
        table
    };

    let panels = vec![
        chart(
            "Board Structure by Region",
            ChartKind::Bar,
            means(frame, BY_REGION, &[board_size, independence]),
        ),
        chart(
            "Board Composition Trends",
            ChartKind::Line,
            means(frame, BY_YEAR, &[board_gender, independence]),
        ),
        panel(
            "Governance Risk Heatmap by Region (normalised)",
            PanelBody::Heatmap(min_max_normalize(&sums(
                frame,
                BY_REGION,
                &[breaches, whistleblower, fines],
            ))),
        ),
        chart(
            "Whistleblower Reports by Year",
            ChartKind::Bar,
            sums(frame, BY_YEAR, &[whistleblower]),
        ),
        chart("Data Breaches by Year", ChartKind::Bar, sums(frame, BY_YEAR, &[breaches])),
        chart(
            "Fines & Penalties by Year (USD M)",
            ChartKind::Bar,
            sums(frame, BY_YEAR, &[fines]),
        ),
        chart(
            "Anti-Corruption Training by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[anti_corruption]),
        ),
        panel("Governance Compliance Scorecard", PanelBody::Scorecard(compliance)),
        panel(
            "ESG Score vs Governance Variables Correlation",
            PanelBody::Correlation(correlation(
                frame,
                &[esg, independence, board_gender, anti_corruption, policy, supplier],
            )),
        ),
        chart(
            "Governance Effectiveness by Department",
            ChartKind::Bar,
            means(frame, BY_DEPARTMENT, &[gov]),
        ),
        panel(
            "ESG Policy Gap Tracker by Department",
            policy_gap(frame, settings.policy_threshold_pct),
        ),
        scatter(
            "ESG Policy Coverage vs ESG Score",
            means(
                frame,
                &[Dimension::Region, Dimension::Department, Dimension::Year, Dimension::Quarter],
                &[policy, esg],
            ),
        ),
        chart(
            "Supplier Code of Conduct Coverage Over Time",
            ChartKind::Line,
            means(frame, BY_YEAR, &[supplier]),
        ),
        panel(
            "Distribution of Controversy Levels",
            PanelBody::Counts {
                field: controversy,
                counts: value_counts(frame, controversy),
            },
        ),
        panel(
            "Regional Governance Overview",
            PanelBody::Scorecard(means(frame, BY_REGION, &[gov, esg, controversy])),
        ),
        panel(
            "Departmental Risk Profile",
            PanelBody::Scorecard(sums(frame, BY_DEPARTMENT, &[breaches, fines, whistleblower])),
        ),
    ];

    Section {
        tab: Tab::Governance,
        kpis,
        panels,
    }
}

/// Current governance index with its change against the year before the
/// latest selected one, plus the fixed industry reference.
fn benchmark(frame: &DerivedFrame<'_>, industry: f64) -> [Kpi; 2] {
    let gov = metric(Metric::GovernanceEffectivenessIndex);
    let current = mean(frame, gov);

    let latest = frame.rows().iter().map(|r| r.record.year).max();
    let previous = latest
        .map(|year| frame.retain(|r| r.year == year - 1))
        .filter(|prev| !prev.is_empty());
    let previous = match previous {
        Some(prev) => mean(&prev, gov),
        None => current,
    };

    let mut current_kpi = Kpi::new("Current Governance Index", current, KpiFormat::Decimal(1, ""));
    current_kpi.delta = current.zip(previous).map(|(c, p)| c - p);

    [
        current_kpi,
        Kpi::new("Industry Benchmark", Some(industry), KpiFormat::Decimal(0, "")),
    ]
}

fn policy_gap(frame: &DerivedFrame<'_>, threshold: f64) -> PanelBody {
    let table = means(frame, BY_DEPARTMENT, &[raw(Measure::EsgPolicyCoveragePct)]);
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let value = row.values[0];
            ThresholdRow {
                label: row.label(),
                value,
                meets: value.is_some_and(|v| v >= threshold),
            }
        })
        .collect();
    PanelBody::Threshold { rows, threshold }
}

fn trends(frame: &DerivedFrame<'_>) -> Section {
    let esg = raw(Measure::EsgScore);
    Section {
        tab: Tab::Trends,
        kpis: Vec::new(),
        panels: vec![
            chart(
                "ESG Score Trend Over Time",
                ChartKind::Periods,
                means(frame, BY_PERIOD, &[esg]),
            ),
            chart(
                "Average ESG Score by Region",
                ChartKind::Bar,
                means(frame, BY_REGION, &[esg]),
            ),
            chart(
                "Average ESG Score by Department",
                ChartKind::Bar,
                means(frame, BY_DEPARTMENT, &[esg]),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;

    fn select(
        company: &str,
        years: &[i64],
        regions: &[&str],
        departments: &[&str],
    ) -> FilterSelection {
        FilterSelection {
            company: company.to_string(),
            years: years.iter().copied().collect(),
            regions: regions.iter().map(|s| s.to_string()).collect(),
            departments: departments.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn dashboard(view: ViewModel) -> Dashboard {
        match view {
            ViewModel::Dashboard(d) => *d,
            ViewModel::NoData => panic!("expected a dashboard"),
        }
    }

    fn kpi<'a>(kpis: &'a [Kpi], label: &str) -> &'a Kpi {
        kpis.iter().find(|k| k.label == label).unwrap()
    }

    #[test]
    fn empty_selection_is_no_data() {
        let table = EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]);
        let settings = Settings::default();

        let none = select("Acme", &[], &["EU"], &["Ops"]);
        assert_eq!(render(&table, &none, &settings), ViewModel::NoData);

        let unknown = select("Nobody", &[2023], &["EU"], &["Ops"]);
        assert_eq!(render(&table, &unknown, &settings), ViewModel::NoData);

        let empty = EsgTable::from_records(Vec::new());
        assert_eq!(
            render(&empty, &FilterSelection::default(), &settings),
            ViewModel::NoData
        );
    }

    #[test]
    fn kpi_formats() {
        assert_eq!(KpiFormat::Thousands.apply(Some(1_234_567.4)), "1,234,567");
        assert_eq!(KpiFormat::Thousands.apply(Some(999.0)), "999");
        assert_eq!(KpiFormat::Thousands.apply(Some(-1234.0)), "-1,234");
        assert_eq!(KpiFormat::FractionPercent(1).apply(Some(0.452)), "45.2%");
        assert_eq!(KpiFormat::Percent(1).apply(Some(61.23)), "61.2%");
        assert_eq!(KpiFormat::Decimal(2, " MWh/unit").apply(Some(5.0)), "5.00 MWh/unit");
        assert_eq!(KpiFormat::Decimal(0, "").apply(Some(65.0)), "65");
        assert_eq!(KpiFormat::Decimal(1, "").apply(None), "N/A");
        assert_eq!(KpiFormat::Percent(1).apply(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn dashboard_has_every_section_and_sorted_detail() {
        let table = EsgTable::from_records(vec![
            record("Acme Corp", "EU", "Ops", 2022, 4),
            record("Acme Corp", "EU", "HR", 2023, 1),
            record("Acme Corp", "NA", "Ops", 2023, 2),
            record("Other", "EU", "Ops", 2023, 2),
        ]);
        let sel = select("Acme Corp", &[2022, 2023], &["EU", "NA"], &["Ops", "HR"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));

        assert_eq!(d.matched_rows, 3);
        assert_eq!(d.export_file_name, "esg_data_Acme_Corp.csv");
        let tabs: Vec<Tab> = d.sections.iter().map(|s| s.tab).collect();
        assert_eq!(tabs, Tab::ALL.to_vec());

        let order: Vec<(i64, i64)> = d.detail.iter().map(|r| (r.year, r.quarter)).collect();
        assert_eq!(order, vec![(2023, 2), (2023, 1), (2022, 4)]);

        assert_eq!(kpi(&d.headline, "Average ESG Score").display(), "65.0");
        // 10 + 20 per row.
        assert_eq!(kpi(&d.headline, "Avg Scope 1+2 Emissions (tCO2e)").display(), "30");
        assert_eq!(kpi(&d.headline, "Total Emissions (tCO2e)").display(), "180");
        assert_eq!(kpi(&d.headline, "Avg Female Representation").display(), "45.0%");
    }

    #[test]
    fn undefined_intensities_render_not_available() {
        let mut r = record("Acme", "EU", "Ops", 2023, 1);
        r.production_output_units = 0.0;
        let table = EsgTable::from_records(vec![r]);
        let sel = select("Acme", &[2023], &["EU"], &["Ops"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));
        let env = d.section(Tab::Environmental).unwrap();
        assert_eq!(kpi(&env.kpis, "Energy Intensity").display(), "N/A");
    }

    #[test]
    fn governance_delta_against_previous_year() {
        let older = record("Acme", "EU", "Ops", 2022, 1);
        let mut newer = record("Acme", "EU", "Ops", 2023, 1);
        newer.independent_directors_pct = 1.0;
        let table = EsgTable::from_records(vec![older, newer]);
        let sel = select("Acme", &[2022, 2023], &["EU"], &["Ops"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));
        let gov = d.section(Tab::Governance).unwrap();

        // Mean over both years minus the 2022 mean: half of 0.4 * 0.3.
        let delta = kpi(&gov.kpis, "Current Governance Index").delta.unwrap();
        assert!((delta - 0.06).abs() < 1e-9);
        assert_eq!(kpi(&gov.kpis, "Industry Benchmark").display(), "65");
    }

    #[test]
    fn governance_delta_falls_back_to_zero_without_previous_year() {
        let table = EsgTable::from_records(vec![
            record("Acme", "EU", "Ops", 2021, 1),
            record("Acme", "EU", "Ops", 2023, 1),
        ]);
        let sel = select("Acme", &[2021, 2023], &["EU"], &["Ops"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));
        let gov = d.section(Tab::Governance).unwrap();
        let current = kpi(&gov.kpis, "Current Governance Index");
        assert_eq!(current.delta, Some(0.0));
        assert_eq!(current.delta_display().as_deref(), Some("+0.0"));
    }

    #[test]
    fn policy_gap_flags_departments_below_threshold() {
        let mut ops = record("Acme", "EU", "Ops", 2023, 1);
        ops.esg_policy_coverage_pct = 82.0;
        let mut hr = record("Acme", "EU", "HR", 2023, 1);
        hr.esg_policy_coverage_pct = 61.0;
        let frame = crate::pipeline::derive::derive_records(vec![&ops, &hr]);

        let PanelBody::Threshold { rows, threshold } = policy_gap(&frame, 70.0) else {
            panic!("expected a threshold panel");
        };
        assert_eq!(threshold, 70.0);
        let flags: Vec<(&str, bool)> = rows.iter().map(|r| (r.label.as_str(), r.meets)).collect();
        assert_eq!(flags, vec![("HR", false), ("Ops", true)]);
    }

    fn governance_panel<'a>(d: &'a Dashboard, title: &str) -> &'a PanelBody {
        let gov = d.section(Tab::Governance).unwrap();
        &gov.panels.iter().find(|p| p.title == title).unwrap().body
    }

    #[test]
    fn governance_correlation_covers_board_and_policy_fields() {
        let table = EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]);
        let sel = select("Acme", &[2023], &["EU"], &["Ops"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));

        let PanelBody::Correlation(matrix) =
            governance_panel(&d, "ESG Score vs Governance Variables Correlation")
        else {
            panic!("expected a correlation matrix");
        };
        let names: Vec<&str> = matrix.fields.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "esg_score",
                "independent_directors_pct",
                "board_gender_diversity_pct",
                "anti_corruption_training_pct",
                "esg_policy_coverage_pct",
                "supplier_code_of_conduct_coverage_pct",
            ]
        );
    }

    #[test]
    fn board_trends_plot_only_fractions() {
        let table = EsgTable::from_records(vec![record("Acme", "EU", "Ops", 2023, 1)]);
        let sel = select("Acme", &[2023], &["EU"], &["Ops"]);
        let d = dashboard(render(&table, &sel, &Settings::default()));

        let PanelBody::Chart { table: trends, .. } =
            governance_panel(&d, "Board Composition Trends")
        else {
            panic!("expected a chart");
        };
        let fields: Vec<&str> = trends.reductions.iter().map(|r| r.field().name()).collect();
        assert_eq!(fields, vec!["board_gender_diversity_pct", "independent_directors_pct"]);
    }

    #[test]
    fn period_labels() {
        assert_eq!(period_label(2023, 4), "2023-Q4");
    }
}
