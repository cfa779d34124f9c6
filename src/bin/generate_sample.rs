//! Writes a synthetic ESG dataset for trying out the dashboard.
//!
//! Usage: `generate_sample [OUTPUT]`; the format follows the extension
//! (`.csv` by default, `.json` or `.parquet`).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::Value as JsonValue;

use greenlens::data::model::{EsgRecord, required_columns};

const COMPANIES: [&str; 3] = ["Acme Industries", "Green Leaf Co", "Northwind Manufacturing"];
const REGIONS: [&str; 4] = ["North America", "Europe", "Asia Pacific", "Latin America"];
const DEPARTMENTS: [&str; 6] = ["Operations", "Manufacturing", "Logistics", "R&D", "Sales", "HR"];
const YEARS: std::ops::RangeInclusive<i64> = 2020..=2024;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Normal sample clamped to `[lo, hi]`.
    fn bounded(&mut self, mean: f64, std_dev: f64, lo: f64, hi: f64) -> f64 {
        self.gauss(mean, std_dev).clamp(lo, hi)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

fn round(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}

/// One observation. `trend` grows over the years so charts show movement.
fn record(
    rng: &mut SimpleRng,
    company: &str,
    region: &str,
    department: &str,
    year: i64,
    quarter: i64,
) -> EsgRecord {
    let trend = (year - YEARS.start()) as f64 * 4.0 + (quarter - 1) as f64;
    let output = rng.bounded(5_000.0, 1_500.0, 500.0, 10_000.0);
    let energy = output * rng.bounded(2.0 - trend * 0.02, 0.3, 0.5, 4.0);
    let scope1 = energy * rng.bounded(0.25, 0.05, 0.05, 0.6);
    let scope2 = energy * rng.bounded(0.35, 0.05, 0.05, 0.7);
    let waste = output * rng.bounded(0.05, 0.01, 0.005, 0.12);
    let controversy = (rng.below(10) as f64 / 3.0).floor().min(3.0);

    EsgRecord {
        company_name: company.to_string(),
        region: region.to_string(),
        department: department.to_string(),
        year,
        quarter,

        energy_consumption_mwh: round(energy, 1),
        production_output_units: round(output, 0),
        scope1_emissions_tco2e: round(scope1, 1),
        scope2_emissions_tco2e: round(scope2, 1),
        scope3_emissions_tco2e: round((scope1 + scope2) * rng.bounded(2.5, 0.6, 0.8, 5.0), 1),
        waste_generated_tonnes: round(waste, 2),
        waste_recycled_pct: round(rng.bounded(0.45 + trend * 0.01, 0.1, 0.05, 0.95), 3),
        water_withdrawal_m3: round(output * rng.bounded(3.0, 0.8, 0.5, 8.0), 0),
        water_recycled_pct: round(rng.bounded(0.3 + trend * 0.005, 0.08, 0.0, 0.9), 3),
        renewable_energy_share_pct: round(rng.bounded(0.35 + trend * 0.015, 0.1, 0.0, 1.0), 3),

        headcount: rng.bounded(250.0, 90.0, 20.0, 800.0).round(),
        female_pct: round(rng.bounded(0.42, 0.08, 0.1, 0.7), 3),
        minority_pct: round(rng.bounded(0.25, 0.07, 0.02, 0.6), 3),
        employee_engagement_score: round(rng.bounded(70.0 + trend * 0.3, 8.0, 30.0, 98.0), 1),
        employee_turnover_pct: round(rng.bounded(0.12, 0.04, 0.01, 0.4), 3),
        avg_training_hours_per_employee: round(rng.bounded(24.0 + trend * 0.4, 7.0, 2.0, 80.0), 1),
        pay_equity_ratio_female_to_male: round(rng.bounded(0.94, 0.04, 0.75, 1.08), 3),
        board_gender_diversity_pct: round(rng.bounded(0.32, 0.07, 0.1, 0.6), 3),
        community_investment_usd_m: round(rng.bounded(1.2, 0.5, 0.0, 4.0), 2),
        lost_time_incident_rate: round(rng.bounded(1.1 - trend * 0.01, 0.35, 0.05, 3.0), 2),

        board_size: rng.bounded(10.0, 2.0, 5.0, 15.0).round(),
        independent_directors_pct: round(rng.bounded(0.62, 0.1, 0.3, 0.95), 3),
        anti_corruption_training_pct: round(rng.bounded(0.82, 0.08, 0.4, 1.0), 3),
        esg_policy_coverage_pct: round(rng.bounded(72.0 + trend * 0.5, 10.0, 30.0, 100.0), 1),
        supplier_code_of_conduct_coverage_pct: round(rng.bounded(0.7, 0.1, 0.3, 1.0), 3),
        controversy_level_0_low_3_high: controversy,
        data_breaches_count: rng.below(4) as f64,
        whistleblower_reports: rng.below(8) as f64,
        fines_penalties_usd_m: round(rng.bounded(0.2, 0.25, 0.0, 2.0), 2),

        esg_score: round(rng.bounded(62.0 + trend * 0.4, 7.0, 20.0, 95.0), 1),
        revenue_usd_m: round(output * rng.bounded(0.02, 0.005, 0.005, 0.05), 2),
    }
}

fn generate(rng: &mut SimpleRng) -> Vec<EsgRecord> {
    let mut records = Vec::new();
    for company in COMPANIES {
        for region in REGIONS {
            for department in DEPARTMENTS {
                for year in YEARS {
                    for quarter in 1..=4 {
                        records.push(record(rng, company, region, department, year, quarter));
                    }
                }
            }
        }
    }
    records
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_csv(path: &Path, records: &[EsgRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    for r in records {
        writer.serialize(r).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_json(path: &Path, records: &[EsgRecord]) -> Result<()> {
    let text = serde_json::to_string_pretty(records).context("serializing JSON")?;
    std::fs::write(path, text).context("writing JSON file")
}

/// One flat column per dataset field; the Arrow type follows the JSON type
/// of the serialized value.
fn write_parquet(path: &Path, records: &[EsgRecord]) -> Result<()> {
    let rows: Vec<JsonValue> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<_>>()
        .context("converting records")?;

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for name in required_columns() {
        let cells: Vec<&JsonValue> = rows.iter().map(|r| &r[name]).collect();
        let (data_type, array): (DataType, ArrayRef) = match cells.first() {
            Some(JsonValue::String(_)) => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    cells.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                )),
            ),
            Some(v) if v.is_i64() => (
                DataType::Int64,
                Arc::new(Int64Array::from(
                    cells.iter().map(|c| c.as_i64()).collect::<Vec<_>>(),
                )),
            ),
            _ => (
                DataType::Float64,
                Arc::new(Float64Array::from(
                    cells.iter().map(|c| c.as_f64()).collect::<Vec<_>>(),
                )),
            ),
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "greenlens_esg_dataset.csv".to_string());
    let path = Path::new(&output);

    let mut rng = SimpleRng::new(42);
    let records = generate(&mut rng);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(path, &records),
        "json" => write_json(path, &records),
        "parquet" | "pq" => write_parquet(path, &records),
        other => bail!("Unsupported output extension: .{other}"),
    }
    .with_context(|| format!("writing {}", path.display()))?;

    log::info!("Wrote {} ESG records to {}", records.len(), path.display());
    println!("Wrote {} ESG records to {}", records.len(), path.display());
    Ok(())
}
