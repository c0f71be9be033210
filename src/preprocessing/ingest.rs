//! CSV ingestion into [`RawRecord`]s.

use crate::preprocessing::error::PipelineError;
use crate::preprocessing::schema::{RawRecord, Value};
use std::path::Path;

/// Parses CSV text with a header row into raw records.
///
/// Rows whose field count differs from the header are dropped. Cells are trimmed
/// and coerced with [`Value::parse`].
///
/// # Errors
/// [`PipelineError::Format`] when the header or every data row is absent, or the
/// text is not valid CSV.
pub fn ingest(text: &str) -> Result<Vec<RawRecord>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(PipelineError::Format("missing header row".to_string()));
    }

    let mut records = Vec::new();
    let mut seen = 0usize;
    let mut dropped = 0usize;
    for row in reader.records() {
        let row = row?;
        seen += 1;
        if row.len() != headers.len() {
            dropped += 1;
            tracing::debug!(
                line = row.position().map(|p| p.line()),
                fields = row.len(),
                expected = headers.len(),
                "dropping row with mismatched field count"
            );
            continue;
        }
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, cell)| (h.as_str(), Value::parse(cell)))
                .collect::<RawRecord>(),
        );
    }

    if seen == 0 {
        return Err(PipelineError::Format(
            "expected a header and at least one data row".to_string(),
        ));
    }

    tracing::info!(rows = records.len(), dropped, "ingested csv");
    Ok(records)
}

/// Reads `path` and ingests its contents.
pub fn ingest_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>, PipelineError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Format(format!("{}: {e}", path.display())))?;
    ingest(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "top_speed_kmh,battery_capacity_kWh,torque_nm,acceleration_0_100_s,fast_charging_power_kw_dc,fast_charge_port,seats,drivetrain,length_mm,width_mm,height_mm,range_km";

    #[test]
    fn test_ingest_single_row() {
        let text = format!("{HEADER}\n150,60,310,7.5,100,CCS,5,AWD,4500,1850,1550,400\n");
        let records = ingest(&text).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.len(), 12);
        assert_eq!(r.get("range_km"), Some(&Value::Number(400.0)));
        assert_eq!(r.get("fast_charge_port"), Some(&Value::Text("CCS".into())));
        assert_eq!(r.get("acceleration_0_100_s"), Some(&Value::Number(7.5)));
    }

    #[test]
    fn test_ingest_header_only_is_format_error() {
        assert!(matches!(ingest(HEADER), Err(PipelineError::Format(_))));
        assert!(matches!(ingest(""), Err(PipelineError::Format(_))));
    }

    #[test]
    fn test_ingest_drops_rows_with_wrong_field_count() {
        let text = "a,b,c\n1,2,3\n4,5\n6,7,8,9\n10,,x\n";
        let records = ingest(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("b"), Some(&Value::Missing));
        assert_eq!(records[1].get("c"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn test_ingest_all_rows_dropped_yields_no_records() {
        let records = ingest("a,b\n1\n2,3,4\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_ingest_trims_cells_and_headers() {
        let records = ingest(" a , b \n 1 , CCS \n").unwrap();
        assert_eq!(records[0].get("a"), Some(&Value::Number(1.0)));
        assert_eq!(records[0].get("b"), Some(&Value::Text("CCS".into())));
    }

    #[test]
    fn test_ingest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b\n1,2").unwrap();
        assert_eq!(ingest_file(file.path()).unwrap().len(), 1);

        let missing = file.path().with_extension("absent");
        assert!(matches!(
            ingest_file(&missing),
            Err(PipelineError::Format(msg)) if msg.contains("absent")
        ));
    }
}
