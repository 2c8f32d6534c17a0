// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};

/// A raw table, as read from a comma-separated export.
///
/// All the values are kept as strings: the interpretation of the cells
/// (timestamps, counts) is done by the consumers.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Records {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Records {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Records {
        Records { headers, rows }
    }

    /// The position of the given column in the header, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A toggle and a date for one day of interest.
///
/// A disabled day is skipped by all the shifts. It still occupies its block
/// of rows in the template.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct DayControl {
    pub enabled: bool,
    pub date: NaiveDate,
}

/// One of the three fixed processing windows of a day.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ShiftName {
    Madrugada,
    Diurno,
    Noturno,
}

impl ShiftName {
    pub const ALL: [ShiftName; 3] = [ShiftName::Madrugada, ShiftName::Diurno, ShiftName::Noturno];

    /// The display name of the shift.
    pub fn label(&self) -> &'static str {
        match self {
            ShiftName::Madrugada => "Madrugada",
            ShiftName::Diurno => "Período Diurno",
            ShiftName::Noturno => "Período Noturno",
        }
    }

    /// The period tag written next to every transcribed row.
    /// The template only knows two periods: the early morning rows are
    /// tagged as nocturnal.
    pub fn period_label(&self) -> &'static str {
        if self.is_diurnal() {
            "Diurno"
        } else {
            "Noturno"
        }
    }

    pub fn is_diurnal(&self) -> bool {
        *self == ShiftName::Diurno
    }
}

impl Display for ShiftName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The two independent input streams.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Group {
    A,
    B,
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Group::A => write!(f, "A"),
            Group::B => write!(f, "B"),
        }
    }
}

/// What a group contributes for one day.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DaySource {
    /// The given file, restricted to the given calendar day.
    Present { path: PathBuf, date: NaiveDate },
    /// Nothing for this day. The slot is kept so that the days stay aligned
    /// with the destination rows.
    Absent,
}

/// The sources of one group for one shift.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GroupSources {
    /// The configured file, if any.
    pub source: Option<PathBuf>,
    /// One entry per day control, in the same order.
    pub days: Vec<DaySource>,
}

impl GroupSources {
    /// Pairs the source with every day of the range. Disabled days and a
    /// missing source both give absent slots.
    pub fn for_dates(source: Option<PathBuf>, dates: &[Option<NaiveDate>]) -> GroupSources {
        let days = dates
            .iter()
            .map(|d| match (&source, d) {
                (Some(path), Some(date)) => DaySource::Present {
                    path: path.clone(),
                    date: *date,
                },
                _ => DaySource::Absent,
            })
            .collect();
        GroupSources { source, days }
    }

    /// An empty group, one absent slot per day.
    pub fn absent(num_days: usize) -> GroupSources {
        GroupSources {
            source: None,
            days: vec![DaySource::Absent; num_days],
        }
    }
}

/// Everything needed to process one shift.
///
/// Invariant: `destination_rows`, `day_controls`, `group_a.days` and
/// `group_b.days` all have the same length, and the i-th element of each
/// refers to the same calendar day.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ShiftConfig<'a> {
    pub name: ShiftName,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub destination_rows: Vec<u32>,
    pub day_controls: &'a [DayControl],
    pub group_a: GroupSources,
    pub group_b: GroupSources,
    /// If true, the sources of this shift are moved to the archive after the run.
    pub archive_sources: bool,
}

impl<'a> ShiftConfig<'a> {
    pub fn new(
        name: ShiftName,
        start_time: NaiveTime,
        end_time: NaiveTime,
        destination_rows: Vec<u32>,
        day_controls: &'a [DayControl],
        group_a: GroupSources,
        group_b: GroupSources,
    ) -> Result<ShiftConfig<'a>, LayoutError> {
        let n = day_controls.len();
        for len in [destination_rows.len(), group_a.days.len(), group_b.days.len()] {
            if len != n {
                return Err(LayoutError::MisalignedDays {
                    expected: n,
                    found: len,
                });
            }
        }
        Ok(ShiftConfig {
            name,
            start_time,
            end_time,
            destination_rows,
            day_controls,
            group_a,
            group_b,
            archive_sources: name != ShiftName::Madrugada,
        })
    }

    pub fn group(&self, group: Group) -> &GroupSources {
        match group {
            Group::A => &self.group_a,
            Group::B => &self.group_b,
        }
    }
}

// ******** Template contract *********

/// Where one group lands in the template.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SheetLayout {
    pub sheet: &'static str,
    /// The first column of the transcribed data (0-based).
    pub data_start_col: u32,
    /// The column repeating the period label (0-based).
    pub label_col: u32,
}

/// The fixed coordinates of the destination template.
///
/// All rows and columns are 0-based. They are properties of the template file
/// itself: a different template means a different table.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TemplateLayout {
    pub group_a: SheetLayout,
    pub group_b: SheetLayout,
    pub titles_sheet: &'static str,
    /// (row, col) of the template file name.
    pub file_stem_cell: (u32, u32),
    /// (row, col) of the date of the first day.
    pub shift_date_cell: (u32, u32),
    /// Rows of the names of the sources used by group A and group B.
    pub flags_rows: (u32, u32),
    pub flags_col_diurnal: u32,
    pub flags_col_nocturnal: u32,
    /// The columns read back from an intermediate artifact: `D:AD`.
    pub artifact_band: (u32, u32),
}

impl TemplateLayout {
    pub const DEFAULT: TemplateLayout = TemplateLayout {
        group_a: SheetLayout {
            sheet: "Contagens A (EXCLUIR)",
            data_start_col: 4,
            label_col: 36,
        },
        group_b: SheetLayout {
            sheet: "Contagens B (EXCLUIR)",
            data_start_col: 4,
            label_col: 36,
        },
        titles_sheet: "Títulos",
        file_stem_cell: (19, 1),
        shift_date_cell: (22, 1),
        flags_rows: (20, 21),
        flags_col_diurnal: 2,
        flags_col_nocturnal: 3,
        artifact_band: (3, 30),
    };

    pub fn sheet(&self, group: Group) -> &SheetLayout {
        match group {
            Group::A => &self.group_a,
            Group::B => &self.group_b,
        }
    }

    /// The (row, col) of the "flags used" cell of a group.
    pub fn flags_cell(&self, group: Group, shift: ShiftName) -> (u32, u32) {
        let row = match group {
            Group::A => self.flags_rows.0,
            Group::B => self.flags_rows.1,
        };
        let col = if shift.is_diurnal() {
            self.flags_col_diurnal
        } else {
            self.flags_col_nocturnal
        };
        (row, col)
    }
}

/// The physical row layout of the template: one block of rows per day, one
/// row per time slot.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct RowGeometry {
    pub base_row: u32,
    pub interval_minutes: u32,
    pub row_increment: u32,
    pub day_count: usize,
}

impl RowGeometry {
    pub const DEFAULT: RowGeometry = RowGeometry {
        base_row: 16,
        interval_minutes: 15,
        row_increment: 103,
        day_count: 7,
    };
}

// ******** Errors *********

/// Errors from parsing user inputs or from inconsistent configurations.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LayoutError {
    InvalidTime(String),
    InvalidDate(String),
    MissingColumn(String),
    MisalignedDays { expected: usize, found: usize },
    DayOutOfRange(usize),
}

impl Error for LayoutError {}

impl Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::InvalidTime(s) => write!(f, "invalid time of day {:?} (expected HH:MM)", s),
            LayoutError::InvalidDate(s) => write!(f, "invalid date {:?} (expected DD-MM-YYYY)", s),
            LayoutError::MissingColumn(c) => write!(f, "missing column {:?}", c),
            LayoutError::MisalignedDays { expected, found } => write!(
                f,
                "day sequences are not aligned: expected {} entries, found {}",
                expected, found
            ),
            LayoutError::DayOutOfRange(i) => write!(f, "no day at index {}", i),
        }
    }
}
