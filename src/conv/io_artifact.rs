// The intermediate files: one export restricted to one shift of one day.

use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, DataType, Reader, Xlsx};
use chrono::{NaiveDate, NaiveTime};
use log::debug;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use snafu::{OptionExt, ResultExt};

use shift_layout::{format_day, select_window, Records};

use crate::conv::io_common::{display_path, file_stem};
use crate::conv::io_csv::read_records;
use crate::conv::*;

/// Identifies an intermediate file within the processing of one shift.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ArtifactKey {
    pub source: PathBuf,
    /// None for an unfiltered export.
    pub date: Option<NaiveDate>,
}

/// An intermediate file and the number of data rows written in it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub rows: usize,
}

/// The cells of one day, as read back from an intermediate file.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DayTable {
    pub rows: Vec<Vec<DataType>>,
}

impl DayTable {
    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `{stem}_{DD-MM-YYYY}.xlsx`, or `{stem}.xlsx` without a date.
pub fn artifact_name(source: &Path, date: Option<NaiveDate>) -> String {
    let stem = file_stem(source);
    match date {
        Some(d) => format!("{}_{}.xlsx", stem, format_day(d)),
        None => format!("{}.xlsx", stem),
    }
}

/// Converts an export into an intermediate file in `destination_folder`.
///
/// With a date, only the records of that day between `start` and `end` (both
/// included) are kept. Without a date, the whole export is converted.
pub fn convert(
    source: &Path,
    destination_folder: &Path,
    date: Option<NaiveDate>,
    start: NaiveTime,
    end: NaiveTime,
    timestamp_column: &str,
) -> ConvResult<Artifact> {
    let records = read_records(source)?;
    let selected = match date {
        Some(d) => select_window(&records, timestamp_column, d, start, end).context(LayoutSnafu {
            path: display_path(source),
        })?,
        None => records,
    };
    let path = destination_folder.join(artifact_name(source, date));
    write_artifact(&selected, &path)?;
    debug!("convert: {:?} -> {:?}: {} rows", source, path, selected.len());
    Ok(Artifact {
        path,
        rows: selected.len(),
    })
}

fn write_artifact(records: &Records, path: &Path) -> ConvResult<()> {
    let p = display_path(path);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, name) in records.headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name.as_str())
            .context(WritingArtifactSnafu { path: p.clone() })?;
    }
    for (idx, row) in records.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            write_value(worksheet, (idx + 1) as u32, col as u16, value)
                .context(WritingArtifactSnafu { path: p.clone() })?;
        }
    }
    workbook
        .save(path)
        .context(WritingArtifactSnafu { path: p })?;
    Ok(())
}

// Numbers are written as numbers, so that they land as numbers in the template.
fn write_value(worksheet: &mut Worksheet, row: u32, col: u16, value: &str) -> Result<(), XlsxError> {
    let v = value.trim();
    if v.is_empty() {
        return Ok(());
    }
    match v.parse::<f64>() {
        Ok(x) if x.is_finite() => worksheet.write_number(row, col, x)?,
        _ => worksheet.write_string(row, col, value)?,
    };
    Ok(())
}

/// Reads back the data rows of an intermediate file, restricted to the columns
/// `[band.0, band.1)`.
///
/// Exactly `artifact.rows` rows are read after the header. The band is
/// clipped to the width of the file.
pub fn load_band(artifact: &Artifact, band: (u32, u32)) -> ConvResult<DayTable> {
    let p = display_path(&artifact.path);
    let mut workbook: Xlsx<_> =
        open_workbook(&artifact.path).context(OpeningExcelSnafu { path: p.clone() })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path: p.clone() })?
        .context(OpeningExcelSnafu { path: p.clone() })?;

    let file_width = range.end().map(|(_, col)| col + 1).unwrap_or(0);
    let cols = band.0..band.1.min(file_width);
    debug!(
        "load_band: {}: {} rows, columns {:?} (file width {})",
        p, artifact.rows, cols, file_width
    );

    let rows: Vec<Vec<DataType>> = (1..=artifact.rows as u32)
        .map(|row| {
            cols.clone()
                .map(|col| range.get_value((row, col)).cloned().unwrap_or(DataType::Empty))
                .collect()
        })
        .collect();
    Ok(DayTable { rows })
}

/// Deletes an intermediate file. Returns false if it was already gone.
pub fn remove_artifact(path: &Path) -> ConvResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).context(RemovingArtifactSnafu {
            path: display_path(path),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shift_layout::{parse_day, parse_time_of_day};

    fn d(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        parse_time_of_day(s).unwrap()
    }

    fn write_source(dir: &Path) -> PathBuf {
        let path = dir.join("mov_a.csv");
        fs::write(
            &path,
            "id,local,horaDas,carros,motos,obs\n\
             1,P1,2024-03-01 05:45:00,1,2,\n\
             2,P1,2024-03-01 06:00:00,3,4,ok\n\
             3,P1,bad timestamp,5,6,\n\
             4,P1,2024-03-01 06:15:00,7,8,\n\
             5,P1,2024-03-02 06:15:00,9,9,\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn names() {
        let p = Path::new("/in/mov_a.csv");
        assert_eq!(artifact_name(p, Some(d("01-03-2024"))), "mov_a_01-03-2024.xlsx");
        assert_eq!(artifact_name(p, None), "mov_a.xlsx");
    }

    #[test]
    fn convert_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path());
        let artifact = convert(
            &source,
            dir.path(),
            Some(d("01-03-2024")),
            t("06:00"),
            t("06:15"),
            "horaDas",
        )
        .unwrap();
        assert_eq!(artifact.path, dir.path().join("mov_a_01-03-2024.xlsx"));
        assert_eq!(artifact.rows, 2);

        // Columns D:AD of a 6 column file: carros, motos, obs.
        let table = load_band(&artifact, (3, 30)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 3);
        assert_eq!(
            table.rows[0],
            vec![
                DataType::Float(3.0),
                DataType::Float(4.0),
                DataType::String("ok".to_string())
            ]
        );
        assert_eq!(
            table.rows[1],
            vec![DataType::Float(7.0), DataType::Float(8.0), DataType::Empty]
        );
    }

    #[test]
    fn load_reads_only_the_recorded_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path());
        let artifact = convert(&source, dir.path(), None, t("00:00"), t("00:00"), "horaDas").unwrap();
        assert_eq!(artifact.rows, 5);
        let partial = Artifact {
            path: artifact.path.clone(),
            rows: 1,
        };
        let table = load_band(&partial, (3, 5)).unwrap();
        assert_eq!(table.rows, vec![vec![DataType::Float(1.0), DataType::Float(2.0)]]);
    }

    #[test]
    fn empty_window() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path());
        let artifact = convert(
            &source,
            dir.path(),
            Some(d("05-03-2024")),
            t("06:00"),
            t("17:45"),
            "horaDas",
        )
        .unwrap();
        assert_eq!(artifact.rows, 0);
        assert!(load_band(&artifact, (3, 30)).unwrap().is_empty());
    }

    #[test]
    fn narrow_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("narrow.csv");
        fs::write(&source, "horaDas,carros\n2024-03-01 06:00:00,1\n").unwrap();
        let artifact = convert(
            &source,
            dir.path(),
            Some(d("01-03-2024")),
            t("06:00"),
            t("06:00"),
            "horaDas",
        )
        .unwrap();
        let table = load_band(&artifact, (3, 30)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.width(), 0);
    }

    #[test]
    fn remove_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_01-03-2024.xlsx");
        fs::write(&path, b"").unwrap();
        assert!(remove_artifact(&path).unwrap());
        assert!(!remove_artifact(&path).unwrap());
    }
}
