//! Customer data ingestion from delimited files using Polars

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::StageError;
use crate::features::missing_default;
use crate::pipeline::{PipelineState, Stage};
use crate::record::{AttrValue, Record, RESERVED_ATTRS};

/// Expected-numeric columns every source file must carry.
pub const REQUIRED_NUMERIC_COLUMNS: [&str; 4] =
    ["visit_freq", "avg_basket", "last_coupon_days", "reward_points"];

/// Load customer records from a CSV file.
///
/// The required columns are `customer_id` plus [`REQUIRED_NUMERIC_COLUMNS`];
/// a missing one is fatal. Non-numeric or empty cells in expected-numeric
/// columns resolve to the column's default instead of erroring. Any further
/// columns pass through into the record's extras, except names the pipeline
/// reserves for its own attributes.
pub fn load_customers(path: &Path) -> Result<Vec<Record>, StageError> {
    let df = CsvReader::from_path(path)?.has_header(true).finish()?;

    let column_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    if !column_names.iter().any(|c| c == "customer_id") {
        return Err(StageError::MissingColumn("customer_id".to_string()));
    }
    for required in REQUIRED_NUMERIC_COLUMNS {
        if !column_names.iter().any(|c| c == required) {
            return Err(StageError::MissingColumn(required.to_string()));
        }
    }

    // Non-strict casts: a cell that cannot become a number turns into null
    // and picks up the column default below.
    let ids = df.column("customer_id")?.cast(&DataType::Utf8)?;
    let ids = ids.utf8()?;

    let mut numeric = Vec::with_capacity(REQUIRED_NUMERIC_COLUMNS.len());
    for name in REQUIRED_NUMERIC_COLUMNS {
        numeric.push(df.column(name)?.cast(&DataType::Float64)?);
    }

    let extra_names: Vec<&String> = column_names
        .iter()
        .filter(|name| {
            name.as_str() != "customer_id"
                && !REQUIRED_NUMERIC_COLUMNS.contains(&name.as_str())
                && !RESERVED_ATTRS.contains(&name.as_str())
        })
        .collect();

    let mut records = Vec::with_capacity(df.height());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(df.height());

    for row in 0..df.height() {
        let customer_id = ids.get(row).map(|s| s.trim().to_string()).ok_or_else(|| {
            StageError::InvalidRow {
                row,
                detail: "customer_id is empty".to_string(),
            }
        })?;
        if customer_id.is_empty() {
            return Err(StageError::InvalidRow {
                row,
                detail: "customer_id is empty".to_string(),
            });
        }
        if !seen_ids.insert(customer_id.clone()) {
            return Err(StageError::DuplicateCustomer(customer_id));
        }

        let mut values = [0.0f64; REQUIRED_NUMERIC_COLUMNS.len()];
        for (i, (series, name)) in numeric.iter().zip(REQUIRED_NUMERIC_COLUMNS).enumerate() {
            values[i] = series
                .f64()?
                .get(row)
                .unwrap_or_else(|| missing_default(name));
        }

        let mut record = Record::new(customer_id, values[0], values[1], values[2], values[3]);

        for name in &extra_names {
            if let Some(value) = attr_value(df.column(name)?.get(row)?) {
                record.extras.insert((*name).clone(), value);
            }
        }

        records.push(record);
    }

    log::info!("ingested {} customers from {}", records.len(), path.display());
    Ok(records)
}

/// Convert one Polars cell into a passthrough attribute. Nulls are simply
/// absent attributes.
fn attr_value(value: AnyValue) -> Option<AttrValue> {
    match value {
        AnyValue::Null => None,
        AnyValue::Boolean(b) => Some(AttrValue::Bool(b)),
        AnyValue::Utf8(s) => Some(AttrValue::Text(s.to_string())),
        AnyValue::Utf8Owned(s) => Some(AttrValue::Text(s.to_string())),
        AnyValue::Int8(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::Int16(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::Int32(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::Int64(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::UInt8(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::UInt16(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::UInt32(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::UInt64(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::Float32(v) => Some(AttrValue::Number(v as f64)),
        AnyValue::Float64(v) => Some(AttrValue::Number(v)),
        other => Some(AttrValue::Text(format!("{}", other))),
    }
}

/// Pipeline stage producing the initial record collection. The only stage
/// allowed to change the batch cardinality.
pub struct IngestStage {
    path: PathBuf,
}

impl IngestStage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IngestStage { path: path.into() }
    }
}

impl Stage for IngestStage {
    fn name(&self) -> &'static str {
        "ingestion"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Ingesting
    }

    fn run(&self, _batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        load_customers(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_load_basic_records() {
        let file = write_csv(&[
            "customer_id,visit_freq,avg_basket,last_coupon_days,reward_points",
            "1,5,42.5,12,300",
            "2,0,0,99,0",
        ]);

        let records = load_customers(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].customer_id, "1");
        assert_eq!(records[0].visit_freq, 5.0);
        assert_eq!(records[0].avg_basket, 42.5);
        assert_eq!(records[1].last_coupon_days, 99.0);
    }

    #[test]
    fn test_extra_columns_pass_through() {
        let file = write_csv(&[
            "customer_id,visit_freq,avg_basket,last_coupon_days,reward_points,name,age",
            "1,5,42.5,12,300,Priya,34",
        ]);

        let records = load_customers(file.path()).unwrap();
        assert_eq!(
            records[0].extras.get("name"),
            Some(&AttrValue::Text("Priya".to_string()))
        );
        assert_eq!(records[0].numeric_attr("age"), Some(34.0));
    }

    #[test]
    fn test_missing_numeric_cells_use_defaults() {
        let file = write_csv(&[
            "customer_id,visit_freq,avg_basket,last_coupon_days,reward_points",
            "1,,,,",
        ]);

        let records = load_customers(file.path()).unwrap();
        assert_eq!(records[0].visit_freq, 0.0);
        assert_eq!(records[0].avg_basket, 0.0);
        // "days since" fields default high, not to zero
        assert_eq!(records[0].last_coupon_days, 99.0);
        assert_eq!(records[0].reward_points, 0.0);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let file = write_csv(&["customer_id,visit_freq,avg_basket", "1,5,42.5"]);

        let result = load_customers(file.path());
        assert!(matches!(result, Err(StageError::MissingColumn(col)) if col == "last_coupon_days"));
    }

    #[test]
    fn test_duplicate_customer_id_is_fatal() {
        let file = write_csv(&[
            "customer_id,visit_freq,avg_basket,last_coupon_days,reward_points",
            "1,5,42.5,12,300",
            "1,2,10.0,3,50",
        ]);

        let result = load_customers(file.path());
        assert!(matches!(result, Err(StageError::DuplicateCustomer(id)) if id == "1"));
    }

    #[test]
    fn test_reserved_columns_are_dropped() {
        let file = write_csv(&[
            "customer_id,visit_freq,avg_basket,last_coupon_days,reward_points,persona",
            "1,5,42.5,12,300,already-set",
        ]);

        let records = load_customers(file.path()).unwrap();
        assert!(records[0].persona.is_none());
        assert!(!records[0].extras.contains_key("persona"));
    }

    #[test]
    fn test_header_only_file_is_empty_batch() {
        let file = write_csv(&["customer_id,visit_freq,avg_basket,last_coupon_days,reward_points"]);
        let records = load_customers(file.path()).unwrap();
        assert!(records.is_empty());
    }
}
