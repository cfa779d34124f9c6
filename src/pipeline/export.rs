use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::model::EsgRecord;

/// Column subset offered for download, in output order.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "company_name",
    "region",
    "department",
    "year",
    "quarter",
    "esg_score",
    "renewable_energy_share_pct",
    "scope1_emissions_tco2e",
    "female_pct",
    "employee_engagement_score",
    "controversy_level_0_low_3_high",
];

/// One exported line. Field order defines the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow<'a> {
    pub company_name: &'a str,
    pub region: &'a str,
    pub department: &'a str,
    pub year: i64,
    pub quarter: i64,
    pub esg_score: f64,
    pub renewable_energy_share_pct: f64,
    pub scope1_emissions_tco2e: f64,
    pub female_pct: f64,
    pub employee_engagement_score: f64,
    pub controversy_level_0_low_3_high: f64,
}

impl<'a> From<&'a EsgRecord> for ExportRow<'a> {
    fn from(r: &'a EsgRecord) -> Self {
        ExportRow {
            company_name: &r.company_name,
            region: &r.region,
            department: &r.department,
            year: r.year,
            quarter: r.quarter,
            esg_score: r.esg_score,
            renewable_energy_share_pct: r.renewable_energy_share_pct,
            scope1_emissions_tco2e: r.scope1_emissions_tco2e,
            female_pct: r.female_pct,
            employee_engagement_score: r.employee_engagement_score,
            controversy_level_0_low_3_high: r.controversy_level_0_low_3_high,
        }
    }
}

/// Year desc, quarter desc, department asc.
pub fn export_order(a: &EsgRecord, b: &EsgRecord) -> Ordering {
    b.year
        .cmp(&a.year)
        .then(b.quarter.cmp(&a.quarter))
        .then_with(|| a.department.cmp(&b.department))
}

/// Rows in [`export_order`]. The sort is stable, so full ties keep their
/// table order.
pub fn detail_rows<'a>(records: impl IntoIterator<Item = &'a EsgRecord>) -> Vec<ExportRow<'a>> {
    let mut records: Vec<&'a EsgRecord> = records.into_iter().collect();
    records.sort_by(|a, b| export_order(a, b));
    records.into_iter().map(ExportRow::from).collect()
}

/// Serialize rows as comma-delimited text with a header line.
pub fn to_csv(rows: &[ExportRow<'_>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer
            .write_record(EXPORT_COLUMNS)
            .context("writing CSV header")?;
    }
    for row in rows {
        writer.serialize(row).context("writing CSV row")?;
    }
    let bytes = writer.into_inner().context("flushing CSV")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// `esg_data_<company>.csv` with spaces in the company name replaced by
/// underscores.
pub fn export_file_name(company: &str) -> String {
    format!("esg_data_{}.csv", company.replace(' ', "_"))
}

/// Write the export to `path`.
pub fn write_csv(path: &Path, rows: &[ExportRow<'_>]) -> Result<()> {
    let text = to_csv(rows)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}
