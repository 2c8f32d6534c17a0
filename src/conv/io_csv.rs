// Primitives for reading the count exports.

use std::path::Path;

use log::debug;
use snafu::ResultExt;

use shift_layout::{infer_day_controls, DayControl, Records};

use crate::conv::io_common::display_path;
use crate::conv::*;

pub fn read_records(path: &Path) -> ConvResult<Records> {
    let p = display_path(path);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path: p.clone() })?;

    let headers: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu {
            path: p.clone(),
            lineno: 1usize,
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    debug!("read_records: {}: header: {:?}", p, headers);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: p.clone(),
            lineno,
        })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_records: {}: {} rows", p, rows.len());
    Ok(Records::new(headers, rows))
}

/// The days with counts in an export.
pub fn read_day_controls(path: &Path, timestamp_column: &str) -> ConvResult<Vec<DayControl>> {
    let records = read_records(path)?;
    infer_day_controls(&records, timestamp_column).context(LayoutSnafu {
        path: display_path(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn read_with_bom_and_short_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        fs::write(
            &path,
            "\u{feff}horaDas,horaAte,carros\n2024-03-01 00:00:00,2024-03-01 00:15:00,3\n2024-03-01 00:15:00\n",
        )
        .unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.headers, vec!["horaDas", "horaAte", "carros"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records.rows[1], vec!["2024-03-01 00:15:00"]);
        assert_eq!(records.column_index("horaDas"), Some(0));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = read_records(&dir.path().join("missing.csv"));
        assert!(matches!(res, Err(ConvError::OpeningCsv { .. })));
    }

    #[test]
    fn days_of_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        fs::write(
            &path,
            "horaDas,carros\n2024-03-02 10:00:00,0\n2024-03-01 10:00:00,4\n2024-03-02 11:00:00,1\n",
        )
        .unwrap();
        let dcs = read_day_controls(&path, "horaDas").unwrap();
        let days: Vec<String> = dcs.iter().map(|dc| shift_layout::format_day(dc.date)).collect();
        assert_eq!(days, vec!["01-03-2024", "02-03-2024"]);
    }
}
