use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Number, Value as JsonValue};

use super::error::DataError;
use super::model::{EsgRecord, EsgTable, required_columns};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an ESG table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the dataset column names (the default)
/// * `.json`    – `[{ "company_name": "...", "year": 2023, ... }, ...]`
/// * `.parquet` – flat columns with the same names
pub fn load_file(path: &Path) -> Result<EsgTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => return Err(DataError::UnsupportedExtension(other.to_string()).into()),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    Ok(EsgTable::from_records(records))
}

fn check_columns<'a>(present: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let present: Vec<&str> = present.into_iter().collect();
    for col in required_columns() {
        if !present.contains(&col) {
            return Err(DataError::MissingColumn(col.to_string()).into());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Extra columns are ignored; column order is free. Blank numeric cells
/// read as NaN.
fn load_csv(path: &Path) -> Result<Vec<EsgRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    check_columns(headers.iter())?;

    reader
        .deserialize::<EsgRecord>()
        .enumerate()
        .map(|(row_no, result)| result.map_err(|e| csv_row_error(row_no, &headers, e)))
        .collect()
}

/// A cell that does not parse becomes [`DataError::BadCell`]; anything else
/// (I/O, ragged rows) keeps the csv error with the row number attached.
fn csv_row_error(row: usize, headers: &csv::StringRecord, err: csv::Error) -> anyhow::Error {
    if let csv::ErrorKind::Deserialize { err: cell, .. } = err.kind() {
        let column = cell
            .field()
            .and_then(|i| headers.get(i as usize))
            .unwrap_or("?")
            .to_string();
        return DataError::BadCell {
            row,
            column,
            message: cell.kind().to_string(),
        }
        .into();
    }
    anyhow::Error::new(err).context(format!("CSV row {row}"))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "company_name": "Acme", "region": "EU", "year": 2023, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<EsgRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            check_columns(obj.keys().map(String::as_str))
                .with_context(|| format!("Row {i}"))?;
            serde_json::from_value(row.clone()).with_context(|| format!("Row {i}"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Each row is lifted into a JSON map and deserialized like the JSON loader,
/// so numeric widths and Int/Float mixes in the file do not matter.
fn load_parquet(path: &Path) -> Result<Vec<EsgRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        check_columns(schema.fields().iter().map(|f| f.name().as_str()))?;

        let columns: Vec<(String, &Arc<dyn Array>)> = required_columns()
            .into_iter()
            .filter_map(|name| {
                let idx = schema.index_of(name).ok()?;
                Some((name.to_string(), batch.column(idx)))
            })
            .collect();

        for row in 0..batch.num_rows() {
            let mut obj = Map::new();
            for (name, col) in &columns {
                obj.insert(name.clone(), arrow_cell_to_json(name, col, row)?);
            }
            let offset = records.len();
            let record: EsgRecord = serde_json::from_value(JsonValue::Object(obj))
                .with_context(|| format!("Row {offset}"))?;
            records.push(record);
        }
    }

    Ok(records)
}

/// Convert a single Arrow cell into a JSON value.
fn arrow_cell_to_json(name: &str, col: &Arc<dyn Array>, row: usize) -> Result<JsonValue> {
    if col.is_null(row) {
        return Ok(JsonValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => {
            let arr = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            JsonValue::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => JsonValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            JsonValue::from(arr.value(row))
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            JsonValue::from(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            float_to_json(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            float_to_json(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            JsonValue::Bool(arr.value(row))
        }
        other => bail!(DataError::UnsupportedType {
            column: name.to_string(),
            data_type: format!("{other:?}"),
        }),
    };
    Ok(value)
}

/// JSON has no NaN; non-finite floats become null and fail deserialization
/// with the row number attached.
fn float_to_json(v: f64) -> JsonValue {
    Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::Dimension;

    const HEADER: &str = "company_name,region,department,year,quarter,\
energy_consumption_mwh,production_output_units,scope1_emissions_tco2e,scope2_emissions_tco2e,\
scope3_emissions_tco2e,waste_generated_tonnes,waste_recycled_pct,water_withdrawal_m3,\
water_recycled_pct,renewable_energy_share_pct,headcount,female_pct,minority_pct,\
employee_engagement_score,employee_turnover_pct,avg_training_hours_per_employee,\
pay_equity_ratio_female_to_male,board_gender_diversity_pct,community_investment_usd_m,\
lost_time_incident_rate,board_size,independent_directors_pct,anti_corruption_training_pct,\
esg_policy_coverage_pct,supplier_code_of_conduct_coverage_pct,controversy_level_0_low_3_high,\
data_breaches_count,whistleblower_reports,fines_penalties_usd_m,esg_score,revenue_usd_m";

    const ROW_TAIL: &str = "1000,50,10,20,30,5,0.5,200,0.25,0.4,120,0.45,0.2,70,0.1,20,0.95,\
0.3,1.5,0.8,9,0.6,0.9,0.8,0.7,1,0,2,0.1,65,60";

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_csv_rows() {
        let csv = format!(
            "{HEADER}\nAcme Corp,EU,Ops,2023,1,{ROW_TAIL}\nAcme Corp,NA,HR,2022,4,{ROW_TAIL}\n"
        );
        let file = write_temp(".csv", &csv);
        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].company_name, "Acme Corp");
        assert_eq!(table.records()[1].quarter, 4);
        assert_eq!(table.records()[0].energy_consumption_mwh, 1000.0);
        assert_eq!(table.distinct_text(Dimension::Region), vec!["EU", "NA"]);
    }

    #[test]
    fn extra_csv_columns_are_ignored() {
        let csv = format!("{HEADER},notes\nAcme,EU,Ops,2023,1,{ROW_TAIL},hello\n");
        let file = write_temp(".csv", &csv);
        assert_eq!(load_file(file.path()).unwrap().len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let header = HEADER.replace(",esg_score", "");
        let tail = ROW_TAIL.replacen(",65,60", ",60", 1);
        let file = write_temp(".csv", &format!("{header}\nAcme,EU,Ops,2023,1,{tail}\n"));
        let err = load_file(file.path()).unwrap_err();
        let missing = err
            .chain()
            .find_map(|e| e.downcast_ref::<DataError>())
            .expect("typed error in chain");
        assert!(matches!(missing, DataError::MissingColumn(c) if c == "esg_score"));
    }

    #[test]
    fn malformed_cell_is_an_error() {
        let csv = format!("{HEADER}\nAcme,EU,Ops,twenty,1,{ROW_TAIL}\n");
        let file = write_temp(".csv", &csv);
        let err = load_file(file.path()).unwrap_err();
        let bad = err
            .chain()
            .find_map(|e| e.downcast_ref::<DataError>())
            .expect("typed error in chain");
        assert!(matches!(
            bad,
            DataError::BadCell { row: 0, column, .. } if column == "year"
        ));
    }

    #[test]
    fn blank_numeric_cells_read_as_nan() {
        let tail = ROW_TAIL.replacen("1000,50,", "1000,,", 1);
        let csv = format!("{HEADER}\nAcme,EU,Ops,2023,1,{tail}\n");
        let file = write_temp(".csv", &csv);
        let table = load_file(file.path()).unwrap();
        let r = &table.records()[0];
        assert!(r.production_output_units.is_nan());
        assert_eq!(r.energy_consumption_mwh, 1000.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_file(Path::new("/definitely/not/here.csv")).is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = write_temp(".xlsx", "irrelevant");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }

    #[test]
    fn loads_json_records() {
        let csv = format!("{HEADER}\nAcme,EU,Ops,2023,1,{ROW_TAIL}\n");
        let csv_file = write_temp(".csv", &csv);
        let table = load_file(csv_file.path()).unwrap();

        let json = serde_json::to_string(table.records()).unwrap();
        let json_file = write_temp(".json", &json);
        let from_json = load_file(json_file.path()).unwrap();
        assert_eq!(from_json.records(), table.records());
    }

    #[test]
    fn loads_parquet_columns() {
        use arrow::array::ArrayRef;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for name in required_columns() {
            match name {
                "company_name" | "region" | "department" => {
                    fields.push(Field::new(name, DataType::Utf8, false));
                    arrays.push(Arc::new(StringArray::from(vec!["Acme", "Acme"])));
                }
                "year" => {
                    fields.push(Field::new(name, DataType::Int64, false));
                    arrays.push(Arc::new(Int64Array::from(vec![2023, 2024])));
                }
                "quarter" => {
                    fields.push(Field::new(name, DataType::Int32, false));
                    arrays.push(Arc::new(Int32Array::from(vec![1, 2])));
                }
                _ => {
                    fields.push(Field::new(name, DataType::Float64, false));
                    arrays.push(Arc::new(Float64Array::from(vec![1.5, 2.5])));
                }
            }
        }
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].year, 2024);
        assert_eq!(table.records()[1].quarter, 2);
        assert_eq!(table.records()[0].esg_score, 1.5);
    }
}
