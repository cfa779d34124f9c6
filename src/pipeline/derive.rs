use std::fmt;

use crate::data::filter::Subset;
use crate::data::model::{EsgRecord, Measure};

// ---------------------------------------------------------------------------
// Composite weights
// ---------------------------------------------------------------------------

/// engagement, retention, pay equity, relative training hours.
pub const SOCIAL_WEIGHTS: [f64; 4] = [0.25, 0.25, 0.25, 0.25];

/// normalized carbon intensity, renewable share, waste recycled.
pub const GREEN_WEIGHTS: [f64; 3] = [0.4, 0.3, 0.3];

/// independent directors, board gender diversity, anti-corruption training,
/// ESG policy coverage, supplier code coverage, low controversy.
///
/// These sum to 1.10, not 1.0, and are applied unnormalized.
pub const GOVERNANCE_WEIGHTS: [f64; 6] = [0.3, 0.2, 0.2, 0.15, 0.15, 0.1];

// ---------------------------------------------------------------------------
// Metric – columns computed per filtered subset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    EnergyIntensity,
    CarbonIntensity,
    WasteIntensity,
    WaterIntensity,
    WeightedWasteRecycled,
    NormCarbonIntensity,
    GreenEfficiencyScore,
    MalePct,
    SocialWellBeingIndex,
    DiversityInclusionIndex,
    GovernanceEffectivenessIndex,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::EnergyIntensity => "energy_intensity",
            Metric::CarbonIntensity => "carbon_intensity",
            Metric::WasteIntensity => "waste_intensity",
            Metric::WaterIntensity => "water_intensity",
            Metric::WeightedWasteRecycled => "weighted_waste_recycled",
            Metric::NormCarbonIntensity => "norm_carbon_intensity",
            Metric::GreenEfficiencyScore => "green_efficiency_score",
            Metric::MalePct => "male_pct",
            Metric::SocialWellBeingIndex => "social_well_being_index",
            Metric::DiversityInclusionIndex => "diversity_inclusion_index",
            Metric::GovernanceEffectivenessIndex => "governance_effectiveness_index",
        }
    }
}

// ---------------------------------------------------------------------------
// Field – any numeric column, raw or derived
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Measure(Measure),
    Metric(Metric),
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Measure(m) => m.name(),
            Field::Metric(m) => m.name(),
        }
    }
}

impl From<Measure> for Field {
    fn from(m: Measure) -> Self {
        Field::Measure(m)
    }
}

impl From<Metric> for Field {
    fn from(m: Metric) -> Self {
        Field::Metric(m)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Derived frame
// ---------------------------------------------------------------------------

/// Per-row derived values. `None` marks an undefined value (zero denominator,
/// zero subset maximum or a non-finite result).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedMetrics {
    pub energy_intensity: Option<f64>,
    pub carbon_intensity: Option<f64>,
    pub waste_intensity: Option<f64>,
    pub water_intensity: Option<f64>,
    pub weighted_waste_recycled: Option<f64>,
    pub norm_carbon_intensity: Option<f64>,
    pub green_efficiency_score: Option<f64>,
    pub male_pct: Option<f64>,
    pub social_well_being_index: Option<f64>,
    pub diversity_inclusion_index: Option<f64>,
    pub governance_effectiveness_index: Option<f64>,
}

impl DerivedMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::EnergyIntensity => self.energy_intensity,
            Metric::CarbonIntensity => self.carbon_intensity,
            Metric::WasteIntensity => self.waste_intensity,
            Metric::WaterIntensity => self.water_intensity,
            Metric::WeightedWasteRecycled => self.weighted_waste_recycled,
            Metric::NormCarbonIntensity => self.norm_carbon_intensity,
            Metric::GreenEfficiencyScore => self.green_efficiency_score,
            Metric::MalePct => self.male_pct,
            Metric::SocialWellBeingIndex => self.social_well_being_index,
            Metric::DiversityInclusionIndex => self.diversity_inclusion_index,
            Metric::GovernanceEffectivenessIndex => self.governance_effectiveness_index,
        }
    }
}

/// A source record together with the metrics derived for it.
#[derive(Debug, Clone, Copy)]
pub struct DerivedRow<'a> {
    pub record: &'a EsgRecord,
    pub metrics: DerivedMetrics,
}

impl DerivedRow<'_> {
    /// Value of any numeric field; non-finite raw values count as undefined.
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::Measure(m) => finite(m.value_of(self.record)),
            Field::Metric(m) => self.metrics.get(m),
        }
    }
}

/// The working copy the aggregation engine reads. The source table is never
/// touched.
#[derive(Debug, Clone, Default)]
pub struct DerivedFrame<'a> {
    rows: Vec<DerivedRow<'a>>,
}

impl<'a> DerivedFrame<'a> {
    pub fn rows(&self) -> &[DerivedRow<'a>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Defined values of `field`, in row order.
    pub fn defined(&self, field: Field) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().filter_map(move |r| r.value(field))
    }

    /// Rows satisfying `keep`, as a new frame. Derived values are kept as
    /// computed for the parent frame.
    pub fn retain(&self, keep: impl Fn(&EsgRecord) -> bool) -> DerivedFrame<'a> {
        DerivedFrame {
            rows: self.rows.iter().filter(|r| keep(r.record)).copied().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Compute every derived metric for the rows of `subset`.
///
/// Normalized terms divide by the maximum over this subset, so a row's
/// green efficiency and social well-being scores depend on which other rows
/// were selected alongside it.
pub fn derive<'a>(subset: &Subset<'a>) -> DerivedFrame<'a> {
    derive_records(subset.records().collect())
}

pub(crate) fn derive_records<'a>(records: Vec<&'a EsgRecord>) -> DerivedFrame<'a> {
    let carbon: Vec<Option<f64>> = records.iter().map(|r| carbon_intensity(r)).collect();
    let max_carbon = max_defined(carbon.iter().copied());
    let max_training = max_defined(
        records
            .iter()
            .map(|r| finite(r.avg_training_hours_per_employee)),
    );

    let rows = records
        .into_iter()
        .zip(carbon)
        .map(|(record, carbon_intensity)| {
            let norm_carbon_intensity = carbon_intensity
                .zip(max_carbon)
                .and_then(|(ci, max)| ratio(ci, max))
                .map(|r| 1.0 - r);
            let metrics = DerivedMetrics {
                energy_intensity: ratio(
                    record.energy_consumption_mwh,
                    record.production_output_units,
                ),
                carbon_intensity,
                waste_intensity: ratio(
                    record.waste_generated_tonnes,
                    record.production_output_units,
                ),
                water_intensity: ratio(record.water_withdrawal_m3, record.production_output_units),
                weighted_waste_recycled: finite(
                    record.waste_recycled_pct * record.waste_generated_tonnes,
                ),
                norm_carbon_intensity,
                green_efficiency_score: norm_carbon_intensity
                    .and_then(|norm| green_efficiency(record, norm)),
                male_pct: finite(1.0 - record.female_pct),
                social_well_being_index: max_training
                    .and_then(|max| ratio(record.avg_training_hours_per_employee, max))
                    .and_then(|training| social_well_being(record, training)),
                diversity_inclusion_index: finite(
                    (record.female_pct + record.minority_pct + record.board_gender_diversity_pct)
                        / 3.0
                        * 100.0,
                ),
                governance_effectiveness_index: governance_effectiveness(record),
            };
            DerivedRow { record, metrics }
        })
        .collect();

    DerivedFrame { rows }
}

fn carbon_intensity(r: &EsgRecord) -> Option<f64> {
    ratio(
        r.scope1_emissions_tco2e + r.scope2_emissions_tco2e + r.scope3_emissions_tco2e,
        r.revenue_usd_m,
    )
}

fn green_efficiency(r: &EsgRecord, norm_carbon: f64) -> Option<f64> {
    let [w_carbon, w_renewable, w_waste] = GREEN_WEIGHTS;
    finite(
        (norm_carbon * w_carbon
            + r.renewable_energy_share_pct * w_renewable
            + r.waste_recycled_pct * w_waste)
            * 100.0,
    )
}

fn social_well_being(r: &EsgRecord, relative_training: f64) -> Option<f64> {
    let [w_engagement, w_retention, w_equity, w_training] = SOCIAL_WEIGHTS;
    finite(
        ((r.employee_engagement_score / 100.0) * w_engagement
            + (1.0 - r.employee_turnover_pct) * w_retention
            + r.pay_equity_ratio_female_to_male * w_equity
            + relative_training * w_training)
            * 100.0,
    )
}

fn governance_effectiveness(r: &EsgRecord) -> Option<f64> {
    let [w_indep, w_gender, w_anti, w_policy, w_supplier, w_controversy] = GOVERNANCE_WEIGHTS;
    finite(
        r.independent_directors_pct * w_indep
            + r.board_gender_diversity_pct * w_gender
            + r.anti_corruption_training_pct * w_anti
            + r.esg_policy_coverage_pct * w_policy
            + r.supplier_code_of_conduct_coverage_pct * w_supplier
            + (1.0 - r.controversy_level_0_low_3_high / 3.0) * w_controversy,
    )
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// `num / den`, undefined for a zero denominator or a non-finite result.
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        finite(num / den)
    }
}

fn max_defined(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |m| m.max(v)))
    })
}
