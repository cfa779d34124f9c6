use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// EsgRecord – one row of the source table
// ---------------------------------------------------------------------------

/// One company/region/department/year/quarter observation.
///
/// Field names match the CSV header, so the same struct deserializes CSV,
/// records-oriented JSON and (via a JSON map per row) Parquet. A blank CSV
/// cell or a JSON `null` in a numeric column reads as NaN, which the
/// pipeline treats as undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgRecord {
    pub company_name: String,
    pub region: String,
    pub department: String,
    pub year: i64,
    pub quarter: i64,

    // Environmental
    #[serde(deserialize_with = "blank_as_nan")]
    pub energy_consumption_mwh: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub production_output_units: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub scope1_emissions_tco2e: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub scope2_emissions_tco2e: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub scope3_emissions_tco2e: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub waste_generated_tonnes: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub waste_recycled_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub water_withdrawal_m3: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub water_recycled_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub renewable_energy_share_pct: f64,

    // Social
    #[serde(deserialize_with = "blank_as_nan")]
    pub headcount: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub female_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub minority_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub employee_engagement_score: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub employee_turnover_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub avg_training_hours_per_employee: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub pay_equity_ratio_female_to_male: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub board_gender_diversity_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub community_investment_usd_m: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub lost_time_incident_rate: f64,

    // Governance
    #[serde(deserialize_with = "blank_as_nan")]
    pub board_size: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub independent_directors_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub anti_corruption_training_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub esg_policy_coverage_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub supplier_code_of_conduct_coverage_pct: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub controversy_level_0_low_3_high: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub data_breaches_count: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub whistleblower_reports: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub fines_penalties_usd_m: f64,

    // Composite
    #[serde(deserialize_with = "blank_as_nan")]
    pub esg_score: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub revenue_usd_m: f64,
}

fn blank_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

// ---------------------------------------------------------------------------
// Dimensions – the columns rows are filtered and grouped by
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Company,
    Region,
    Department,
    Year,
    Quarter,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Company,
        Dimension::Region,
        Dimension::Department,
        Dimension::Year,
        Dimension::Quarter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Company => "company_name",
            Dimension::Region => "region",
            Dimension::Department => "department",
            Dimension::Year => "year",
            Dimension::Quarter => "quarter",
        }
    }

    /// The record's value for this dimension.
    pub fn value_of(self, record: &EsgRecord) -> DimensionValue {
        match self {
            Dimension::Company => DimensionValue::Text(record.company_name.clone()),
            Dimension::Region => DimensionValue::Text(record.region.clone()),
            Dimension::Department => DimensionValue::Text(record.department.clone()),
            Dimension::Year => DimensionValue::Integer(record.year),
            Dimension::Quarter => DimensionValue::Integer(record.quarter),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single dimension cell. Integers sort before text, so mixed keys still
/// have a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimensionValue {
    Integer(i64),
    Text(String),
}

impl DimensionValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DimensionValue::Text(s) => Some(s),
            DimensionValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DimensionValue::Integer(i) => Some(*i),
            DimensionValue::Text(_) => None,
        }
    }
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Integer(i) => write!(f, "{i}"),
            DimensionValue::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Measure – the raw numeric columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Measure {
    EnergyConsumption,
    ProductionOutput,
    Scope1Emissions,
    Scope2Emissions,
    Scope3Emissions,
    WasteGenerated,
    WasteRecycledPct,
    WaterWithdrawal,
    WaterRecycledPct,
    RenewableEnergySharePct,
    Headcount,
    FemalePct,
    MinorityPct,
    EngagementScore,
    TurnoverPct,
    TrainingHours,
    PayEquityRatio,
    BoardGenderDiversityPct,
    CommunityInvestment,
    LostTimeIncidentRate,
    BoardSize,
    IndependentDirectorsPct,
    AntiCorruptionTrainingPct,
    EsgPolicyCoveragePct,
    SupplierCodeCoveragePct,
    ControversyLevel,
    DataBreaches,
    WhistleblowerReports,
    FinesPenalties,
    EsgScore,
    Revenue,
}

impl Measure {
    pub const ALL: [Measure; 31] = [
        Measure::EnergyConsumption,
        Measure::ProductionOutput,
        Measure::Scope1Emissions,
        Measure::Scope2Emissions,
        Measure::Scope3Emissions,
        Measure::WasteGenerated,
        Measure::WasteRecycledPct,
        Measure::WaterWithdrawal,
        Measure::WaterRecycledPct,
        Measure::RenewableEnergySharePct,
        Measure::Headcount,
        Measure::FemalePct,
        Measure::MinorityPct,
        Measure::EngagementScore,
        Measure::TurnoverPct,
        Measure::TrainingHours,
        Measure::PayEquityRatio,
        Measure::BoardGenderDiversityPct,
        Measure::CommunityInvestment,
        Measure::LostTimeIncidentRate,
        Measure::BoardSize,
        Measure::IndependentDirectorsPct,
        Measure::AntiCorruptionTrainingPct,
        Measure::EsgPolicyCoveragePct,
        Measure::SupplierCodeCoveragePct,
        Measure::ControversyLevel,
        Measure::DataBreaches,
        Measure::WhistleblowerReports,
        Measure::FinesPenalties,
        Measure::EsgScore,
        Measure::Revenue,
    ];

    /// Column name as it appears in the dataset header.
    pub fn name(self) -> &'static str {
        match self {
            Measure::EnergyConsumption => "energy_consumption_mwh",
            Measure::ProductionOutput => "production_output_units",
            Measure::Scope1Emissions => "scope1_emissions_tco2e",
            Measure::Scope2Emissions => "scope2_emissions_tco2e",
            Measure::Scope3Emissions => "scope3_emissions_tco2e",
            Measure::WasteGenerated => "waste_generated_tonnes",
            Measure::WasteRecycledPct => "waste_recycled_pct",
            Measure::WaterWithdrawal => "water_withdrawal_m3",
            Measure::WaterRecycledPct => "water_recycled_pct",
            Measure::RenewableEnergySharePct => "renewable_energy_share_pct",
            Measure::Headcount => "headcount",
            Measure::FemalePct => "female_pct",
            Measure::MinorityPct => "minority_pct",
            Measure::EngagementScore => "employee_engagement_score",
            Measure::TurnoverPct => "employee_turnover_pct",
            Measure::TrainingHours => "avg_training_hours_per_employee",
            Measure::PayEquityRatio => "pay_equity_ratio_female_to_male",
            Measure::BoardGenderDiversityPct => "board_gender_diversity_pct",
            Measure::CommunityInvestment => "community_investment_usd_m",
            Measure::LostTimeIncidentRate => "lost_time_incident_rate",
            Measure::BoardSize => "board_size",
            Measure::IndependentDirectorsPct => "independent_directors_pct",
            Measure::AntiCorruptionTrainingPct => "anti_corruption_training_pct",
            Measure::EsgPolicyCoveragePct => "esg_policy_coverage_pct",
            Measure::SupplierCodeCoveragePct => "supplier_code_of_conduct_coverage_pct",
            Measure::ControversyLevel => "controversy_level_0_low_3_high",
            Measure::DataBreaches => "data_breaches_count",
            Measure::WhistleblowerReports => "whistleblower_reports",
            Measure::FinesPenalties => "fines_penalties_usd_m",
            Measure::EsgScore => "esg_score",
            Measure::Revenue => "revenue_usd_m",
        }
    }

    pub fn value_of(self, r: &EsgRecord) -> f64 {
        match self {
            Measure::EnergyConsumption => r.energy_consumption_mwh,
            Measure::ProductionOutput => r.production_output_units,
            Measure::Scope1Emissions => r.scope1_emissions_tco2e,
            Measure::Scope2Emissions => r.scope2_emissions_tco2e,
            Measure::Scope3Emissions => r.scope3_emissions_tco2e,
            Measure::WasteGenerated => r.waste_generated_tonnes,
            Measure::WasteRecycledPct => r.waste_recycled_pct,
            Measure::WaterWithdrawal => r.water_withdrawal_m3,
            Measure::WaterRecycledPct => r.water_recycled_pct,
            Measure::RenewableEnergySharePct => r.renewable_energy_share_pct,
            Measure::Headcount => r.headcount,
            Measure::FemalePct => r.female_pct,
            Measure::MinorityPct => r.minority_pct,
            Measure::EngagementScore => r.employee_engagement_score,
            Measure::TurnoverPct => r.employee_turnover_pct,
            Measure::TrainingHours => r.avg_training_hours_per_employee,
            Measure::PayEquityRatio => r.pay_equity_ratio_female_to_male,
            Measure::BoardGenderDiversityPct => r.board_gender_diversity_pct,
            Measure::CommunityInvestment => r.community_investment_usd_m,
            Measure::LostTimeIncidentRate => r.lost_time_incident_rate,
            Measure::BoardSize => r.board_size,
            Measure::IndependentDirectorsPct => r.independent_directors_pct,
            Measure::AntiCorruptionTrainingPct => r.anti_corruption_training_pct,
            Measure::EsgPolicyCoveragePct => r.esg_policy_coverage_pct,
            Measure::SupplierCodeCoveragePct => r.supplier_code_of_conduct_coverage_pct,
            Measure::ControversyLevel => r.controversy_level_0_low_3_high,
            Measure::DataBreaches => r.data_breaches_count,
            Measure::WhistleblowerReports => r.whistleblower_reports,
            Measure::FinesPenalties => r.fines_penalties_usd_m,
            Measure::EsgScore => r.esg_score,
            Measure::Revenue => r.revenue_usd_m,
        }
    }
}

/// Every column name a dataset must provide, in canonical file order.
pub fn required_columns() -> Vec<&'static str> {
    let mut cols: Vec<&'static str> = Dimension::ALL.iter().map(|d| d.name()).collect();
    cols.extend(Measure::ALL.iter().map(|m| m.name()));
    cols
}

// ---------------------------------------------------------------------------
// EsgTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The immutable loaded table with per-dimension distinct values.
#[derive(Debug, Clone)]
pub struct EsgTable {
    records: Vec<EsgRecord>,
    /// For each dimension, distinct values in first-seen order.
    distinct: BTreeMap<Dimension, Vec<DimensionValue>>,
}

impl EsgTable {
    pub fn from_records(records: Vec<EsgRecord>) -> Self {
        let mut distinct: BTreeMap<Dimension, Vec<DimensionValue>> = BTreeMap::new();
        for dim in Dimension::ALL {
            let mut seen = std::collections::HashSet::new();
            let values = records
                .iter()
                .map(|r| dim.value_of(r))
                .filter(|v| seen.insert(v.clone()))
                .collect();
            distinct.insert(dim, values);
        }
        EsgTable { records, distinct }
    }

    pub fn records(&self) -> &[EsgRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct values of a dimension in table order.
    pub fn distinct_values(&self, dim: Dimension) -> &[DimensionValue] {
        self.distinct.get(&dim).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct text values (company, region, department) in table order.
    pub fn distinct_text(&self, dim: Dimension) -> Vec<String> {
        self.distinct_values(dim)
            .iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect()
    }

    /// Distinct years, most recent first.
    pub fn years_descending(&self) -> Vec<i64> {
        let mut years: Vec<i64> = self
            .distinct_values(Dimension::Year)
            .iter()
            .filter_map(DimensionValue::as_integer)
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years
    }
}
