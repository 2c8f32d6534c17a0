// Writing into the destination template.

use std::path::{Path, PathBuf};

use calamine::DataType;
use log::{debug, info, warn};
use snafu::{OptionExt, ResultExt};
use umya_spreadsheet::Spreadsheet;

use shift_layout::{format_title_date, Group, SheetLayout, ShiftConfig, TemplateLayout};

use crate::conv::io_artifact::DayTable;
use crate::conv::io_common::{display_path, file_stem};
use crate::conv::*;

/// A destination for the cells of a shift.
///
/// Rows and columns are 0-based.
pub trait TemplateSink {
    fn write_cell(&mut self, sheet: &str, row: u32, col: u32, value: &DataType) -> ConvResult<()>;

    /// Flushes all the writes and releases the destination.
    fn finish(self) -> ConvResult<()>
    where
        Self: Sized;
}

/// An existing workbook, modified in place. Only the written cells change.
pub struct TemplateWorkbook {
    path: PathBuf,
    book: Spreadsheet,
}

impl TemplateWorkbook {
    pub fn open(path: &Path) -> ConvResult<TemplateWorkbook> {
        let book = umya_spreadsheet::reader::xlsx::read(path).context(OpeningTemplateSnafu {
            path: display_path(path),
        })?;
        debug!("TemplateWorkbook::open: {:?}", path);
        Ok(TemplateWorkbook {
            path: path.to_path_buf(),
            book,
        })
    }
}

impl TemplateSink for TemplateWorkbook {
    fn write_cell(&mut self, sheet: &str, row: u32, col: u32, value: &DataType) -> ConvResult<()> {
        if self.book.get_sheet_by_name(sheet).is_none() {
            warn!("The sheet {} is missing from {:?}: adding it", sheet, self.path);
            self.book
                .new_sheet(sheet)
                .map_err(|message| ConvError::AddingSheet {
                    sheet: sheet.to_string(),
                    message: message.to_string(),
                })?;
        }
        let worksheet = self
            .book
            .get_sheet_by_name_mut(sheet)
            .with_whatever_context(|| format!("Sheet {} not found", sheet))?;
        // The workbook coordinates are 1-based, column first.
        let cell = worksheet.get_cell_mut((col + 1, row + 1));
        match value {
            DataType::Empty => {}
            DataType::Int(i) => {
                cell.set_value_number(*i as f64);
            }
            DataType::Float(f) | DataType::DateTime(f) => {
                cell.set_value_number(*f);
            }
            DataType::Bool(b) => {
                cell.set_value_bool(*b);
            }
            DataType::String(s) => {
                cell.set_value(s.clone());
            }
            other => {
                cell.set_value(other.to_string());
            }
        }
        Ok(())
    }

    fn finish(self) -> ConvResult<()> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path).context(SavingTemplateSnafu {
            path: display_path(&self.path),
        })?;
        info!("Saved {:?}", self.path);
        Ok(())
    }
}

/// Where the data of a shift has been written.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MergeStats {
    /// The first row of each block written in group A.
    pub blocks_a: Vec<u32>,
    pub blocks_b: Vec<u32>,
    pub cells: usize,
}

/// Writes the tables of a shift and its metadata into the template.
///
/// `tables_a` and `tables_b` have one entry per day, aligned with the day
/// controls of the shift. Disabled days and days without a table are skipped.
pub fn merge<S: TemplateSink>(
    sink: &mut S,
    layout: &TemplateLayout,
    shift: &ShiftConfig,
    template_path: &Path,
    tables_a: &[Option<DayTable>],
    tables_b: &[Option<DayTable>],
) -> ConvResult<MergeStats> {
    let mut stats = MergeStats::default();
    let label = DataType::String(shift.name.period_label().to_string());

    for (group, tables) in [(Group::A, tables_a), (Group::B, tables_b)] {
        let sheet = layout.sheet(group);
        let days = tables
            .iter()
            .zip(shift.destination_rows.iter())
            .zip(shift.day_controls.iter());
        for ((table, start_row), dc) in days {
            let table = match table {
                Some(t) if dc.enabled => t,
                _ => continue,
            };
            stats.cells += write_block(sink, sheet, *start_row, table, &label)?;
            debug!(
                "merge: {}: {} rows of {} at row {}",
                shift.name,
                table.len(),
                sheet.sheet,
                start_row
            );
            match group {
                Group::A => stats.blocks_a.push(*start_row),
                Group::B => stats.blocks_b.push(*start_row),
            }
        }
    }

    let titles = layout.titles_sheet;
    match shift.day_controls.first() {
        Some(first) => {
            let (row, col) = layout.shift_date_cell;
            let date = DataType::String(format_title_date(first.date));
            sink.write_cell(titles, row, col, &date)?;
        }
        None => warn!("{}: no day, the date is not written", shift.name),
    }
    let (row, col) = layout.file_stem_cell;
    sink.write_cell(titles, row, col, &DataType::String(file_stem(template_path)))?;

    for group in [Group::A, Group::B] {
        if let Some(source) = &shift.group(group).source {
            let (row, col) = layout.flags_cell(group, shift.name);
            sink.write_cell(titles, row, col, &DataType::String(file_stem(source)))?;
        }
    }
    Ok(stats)
}

// The data goes first, followed by the label. The label is repeated in the
// label column of the sheet.
fn write_block<S: TemplateSink>(
    sink: &mut S,
    sheet: &SheetLayout,
    start_row: u32,
    table: &DayTable,
    label: &DataType,
) -> ConvResult<usize> {
    let mut count = 0;
    let width = table.width() as u32;
    for (r, cells) in table.rows.iter().enumerate() {
        let row = start_row + r as u32;
        for (c, value) in cells.iter().enumerate() {
            if *value == DataType::Empty {
                continue;
            }
            sink.write_cell(sheet.sheet, row, sheet.data_start_col + c as u32, value)?;
            count += 1;
        }
        sink.write_cell(sheet.sheet, row, sheet.data_start_col + width, label)?;
        sink.write_cell(sheet.sheet, row, sheet.label_col, label)?;
        count += 2;
    }
    Ok(count)
}

/// Keeps the cells in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub cells: std::collections::BTreeMap<(String, u32, u32), DataType>,
    pub finished: bool,
}

#[cfg(test)]
impl MemorySink {
    pub fn get(&self, sheet: &str, row: u32, col: u32) -> Option<&DataType> {
        self.cells.get(&(sheet.to_string(), row, col))
    }

    pub fn sheets(&self) -> Vec<String> {
        let names: std::collections::BTreeSet<&String> = self.cells.keys().map(|(s, _, _)| s).collect();
        names.into_iter().cloned().collect()
    }
}

#[cfg(test)]
impl TemplateSink for &mut MemorySink {
    fn write_cell(&mut self, sheet: &str, row: u32, col: u32, value: &DataType) -> ConvResult<()> {
        self.cells.insert((sheet.to_string(), row, col), value.clone());
        Ok(())
    }

    fn finish(self) -> ConvResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "Contagens A (EXCLUIR)";
    const B: &str = "Contagens B (EXCLUIR)";

    fn table(rows: &[&[f64]]) -> DayTable {
        DayTable {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|x| DataType::Float(*x)).collect())
                .collect(),
        }
    }

    fn shift<'a>(name: ShiftName, dcs: &'a [DayControl], a: Option<&str>, b: Option<&str>) -> ShiftConfig<'a> {
        let dates = date_range(dcs);
        ShiftConfig::new(
            name,
            parse_time_of_day("18:00").unwrap(),
            parse_time_of_day("23:45").unwrap(),
            start_rows_for("18:00").unwrap()[..dcs.len()].to_vec(),
            dcs,
            GroupSources::for_dates(a.map(PathBuf::from), &dates),
            GroupSources::for_dates(b.map(PathBuf::from), &dates),
        )
        .unwrap()
    }

    fn write_template(path: &Path) {
        let mut book = umya_spreadsheet::new_file();
        for name in ["Títulos", A, B] {
            book.new_sheet(name).unwrap();
        }
        book.get_sheet_by_name_mut("Títulos")
            .unwrap()
            .get_cell_mut((1, 1))
            .set_value("Relatório de contagens");
        book.get_sheet_by_name_mut(A)
            .unwrap()
            .get_cell_mut((40, 89))
            .set_value("formula area");
        umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
    }

    #[test]
    fn nocturnal_layout() {
        let dcs = explicit_day_controls(parse_day("01-03-2024").unwrap(), 2);
        let s = shift(ShiftName::Noturno, &dcs, Some("/in/noite_a.csv"), Some("/in/noite_b.csv"));
        let mut mem = MemorySink::default();
        let mut sink = &mut mem;
        let stats = merge(
            &mut sink,
            &TemplateLayout::DEFAULT,
            &s,
            Path::new("/out/Modelo.xlsx"),
            &[Some(table(&[&[1.0, 2.0], &[3.0, 4.0]])), None],
            &[None, Some(table(&[&[5.0]]))],
        )
        .unwrap();
        assert_eq!(stats.blocks_a, vec![88]);
        assert_eq!(stats.blocks_b, vec![191]);
        // 2 rows * (2 values + 2 labels) + 1 row * (1 value + 2 labels)
        assert_eq!(stats.cells, 11);

        let noturno = Some(DataType::String("Noturno".to_string()));
        assert_eq!(mem.get(A, 88, 4), Some(&DataType::Float(1.0)));
        assert_eq!(mem.get(A, 89, 5), Some(&DataType::Float(4.0)));
        assert_eq!(mem.get(A, 89, 6).cloned(), noturno);
        assert_eq!(mem.get(A, 89, 36).cloned(), noturno);
        assert_eq!(mem.get(B, 191, 4), Some(&DataType::Float(5.0)));
        assert_eq!(mem.get(B, 191, 5).cloned(), noturno);
        assert_eq!(mem.get(B, 191, 36).cloned(), noturno);

        assert_eq!(mem.get("Títulos", 19, 1), Some(&DataType::String("Modelo".to_string())));
        assert_eq!(mem.get("Títulos", 20, 3), Some(&DataType::String("noite_a".to_string())));
        assert_eq!(mem.get("Títulos", 21, 3), Some(&DataType::String("noite_b".to_string())));
        assert_eq!(mem.get("Títulos", 20, 2), None);
        assert_eq!(mem.get("Títulos", 22, 1), Some(&DataType::String("01/03/2024".to_string())));
    }

    #[test]
    fn madrugada_is_tagged_nocturnal() {
        let dcs = explicit_day_controls(parse_day("01-03-2024").unwrap(), 1);
        let s = shift(ShiftName::Madrugada, &dcs, Some("a.csv"), None);
        let mut mem = MemorySink::default();
        let mut sink = &mut mem;
        merge(
            &mut sink,
            &TemplateLayout::DEFAULT,
            &s,
            Path::new("t.xlsx"),
            &[Some(table(&[&[1.0]]))],
            &[None],
        )
        .unwrap();
        assert_eq!(mem.get(A, 88, 36), Some(&DataType::String("Noturno".to_string())));
    }

    #[test]
    fn disabled_day_with_table_is_skipped() {
        let mut dcs = explicit_day_controls(parse_day("01-03-2024").unwrap(), 2);
        dcs[1].enabled = false;
        let s = shift(ShiftName::Diurno, &dcs, Some("a.csv"), None);
        let mut mem = MemorySink::default();
        let mut sink = &mut mem;
        let stats = merge(
            &mut sink,
            &TemplateLayout::DEFAULT,
            &s,
            Path::new("t.xlsx"),
            &[Some(table(&[&[1.0]])), Some(table(&[&[2.0]]))],
            &[None, None],
        )
        .unwrap();
        assert_eq!(stats.blocks_a, vec![88]);
        assert_eq!(mem.get(A, 88, 36), Some(&DataType::String("Diurno".to_string())));
        assert_eq!(mem.get("Títulos", 20, 2), Some(&DataType::String("a".to_string())));
    }

    #[test]
    fn overlay_on_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Modelo Semana.xlsx");
        write_template(&path);

        let dcs = explicit_day_controls(parse_day("01-03-2024").unwrap(), 1);
        let s = shift(ShiftName::Diurno, &dcs, Some("dia_a.csv"), None);
        let mut wb = TemplateWorkbook::open(&path).unwrap();
        merge(
            &mut wb,
            &TemplateLayout::DEFAULT,
            &s,
            &path,
            &[Some(table(&[&[12.0, 7.0]]))],
            &[None],
        )
        .unwrap();
        wb.finish().unwrap();

        let book = umya_spreadsheet::reader::xlsx::read(&path).unwrap();
        let titles = book.get_sheet_by_name("Títulos").unwrap();
        assert_eq!(titles.get_value((1, 1)), "Relatório de contagens");
        assert_eq!(titles.get_value((2, 20)), "Modelo Semana");
        assert_eq!(titles.get_value((3, 21)), "dia_a");
        assert_eq!(titles.get_value((2, 23)), "01/03/2024");
        let a = book.get_sheet_by_name(A).unwrap();
        assert_eq!(a.get_value((5, 89)), "12");
        assert_eq!(a.get_value((6, 89)), "7");
        assert_eq!(a.get_value((7, 89)), "Diurno");
        assert_eq!(a.get_value((37, 89)), "Diurno");
        assert_eq!(a.get_value((40, 89)), "formula area");
        let b = book.get_sheet_by_name(B).unwrap();
        assert_eq!(b.get_value((5, 89)), "");
    }

    #[test]
    fn missing_sheet_is_added() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.xlsx");
        let book = umya_spreadsheet::new_file();
        umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();

        let mut wb = TemplateWorkbook::open(&path).unwrap();
        wb.write_cell("Títulos", 19, 1, &DataType::String("bare".to_string()))
            .unwrap();
        wb.finish().unwrap();

        let book = umya_spreadsheet::reader::xlsx::read(&path).unwrap();
        assert!(book.get_sheet_by_name("Sheet1").is_some());
        assert_eq!(
            book.get_sheet_by_name("Títulos").unwrap().get_value((2, 20)),
            "bare"
        );
    }
}
