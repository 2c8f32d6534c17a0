use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use log::{debug, warn};

use crate::config::*;
use crate::parse_timestamp;

/// The format of the day controls, as typed by the users.
pub const DAY_FORMAT: &str = "%d-%m-%Y";

/// The format of the date written in the titles sheet.
pub const TITLE_DATE_FORMAT: &str = "%d/%m/%Y";

// Columns of the exports that are never counts.
const NON_COUNT_COLUMNS: [&str; 2] = ["horaDas", "horaAte"];

pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn format_title_date(date: NaiveDate) -> String {
    date.format(TITLE_DATE_FORMAT).to_string()
}

/// Parses a `DD-MM-YYYY` date. The shape is strict: `1-3-2024` is rejected.
pub fn parse_day(s: &str) -> Result<NaiveDate, LayoutError> {
    let bytes = s.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_shaped {
        return Err(LayoutError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DAY_FORMAT).map_err(|_| LayoutError::InvalidDate(s.to_string()))
}

/// The date of every enabled day, `None` for the disabled ones.
pub fn date_range(controls: &[DayControl]) -> Vec<Option<NaiveDate>> {
    controls
        .iter()
        .enumerate()
        .map(|(i, dc)| {
            if dc.enabled {
                debug!("date_range: day {}: {}", i + 1, format_day(dc.date));
                Some(dc.date)
            } else {
                debug!("date_range: day {}: disabled", i + 1);
                None
            }
        })
        .collect()
}

/// Day controls chosen by the user: `count` consecutive days, all enabled.
pub fn explicit_day_controls(first_date: NaiveDate, count: usize) -> Vec<DayControl> {
    (0..count)
        .map(|i| DayControl {
            enabled: true,
            date: first_date + Duration::days(i as i64),
        })
        .collect()
}

/// Day controls inferred from an export: every distinct date for which at
/// least one count is positive, in ascending order.
///
/// A column is a count column if all its non-empty values are numbers. The
/// rows without a valid timestamp are ignored.
pub fn infer_day_controls(
    records: &Records,
    timestamp_column: &str,
) -> Result<Vec<DayControl>, LayoutError> {
    let ts_idx = records
        .column_index(timestamp_column)
        .ok_or_else(|| LayoutError::MissingColumn(timestamp_column.to_string()))?;

    let count_columns: Vec<usize> = records
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            *idx != ts_idx
                && !NON_COUNT_COLUMNS.contains(&name.trim())
                && records.rows.iter().all(|row| match row.get(*idx) {
                    Some(v) if !v.trim().is_empty() => v.trim().parse::<f64>().is_ok(),
                    _ => true,
                })
        })
        .map(|(idx, _)| idx)
        .collect();
    debug!("infer_day_controls: count columns: {:?}", count_columns);

    let mut active: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for row in records.rows.iter() {
        let date = match row.get(ts_idx).and_then(|s| parse_timestamp(s)) {
            Some(ts) => ts.date(),
            None => continue,
        };
        let positive = count_columns.iter().any(|idx| {
            row.get(*idx)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|x| x > 0.0)
                .unwrap_or(false)
        });
        let e = active.entry(date).or_insert(false);
        *e = *e || positive;
    }

    Ok(active
        .into_iter()
        .filter(|(_, positive)| *positive)
        .map(|(date, _)| DayControl {
            enabled: true,
            date,
        })
        .collect())
}

/// Builds day controls from typed entries. An entry whose date cannot be
/// parsed is disabled, and its date is resolved from the closest valid entry
/// before it (or after it) so that the days stay consecutive.
///
/// Fails if no entry has a valid date.
pub fn resolve_day_texts(entries: &[(bool, String)]) -> Result<Vec<DayControl>, LayoutError> {
    let parsed: Vec<Option<NaiveDate>> = entries.iter().map(|(_, s)| parse_day(s).ok()).collect();
    let anchor = parsed
        .iter()
        .enumerate()
        .find_map(|(i, d)| d.map(|d| (i, d)));
    let (anchor_idx, anchor_date) = match anchor {
        Some(x) => x,
        None => {
            let first = entries.first().map(|(_, s)| s.clone()).unwrap_or_default();
            return Err(LayoutError::InvalidDate(first));
        }
    };

    let mut res: Vec<DayControl> = Vec::with_capacity(entries.len());
    let mut last_valid: (usize, NaiveDate) = (anchor_idx, anchor_date);
    for (i, ((enabled, text), date)) in entries.iter().zip(parsed.iter()).enumerate() {
        match date {
            Some(d) => {
                last_valid = (i, *d);
                res.push(DayControl {
                    enabled: *enabled,
                    date: *d,
                });
            }
            None => {
                let offset = i as i64 - last_valid.0 as i64;
                let date = last_valid.1 + Duration::days(offset);
                warn!(
                    "Day {}: could not understand the date {:?}, disabling it (assuming {})",
                    i + 1,
                    text,
                    format_day(date)
                );
                res.push(DayControl {
                    enabled: false,
                    date,
                });
            }
        }
    }
    Ok(res)
}

/// The day selection being edited before a run.
///
/// Changing the date of a day moves all the enabled days after it, so that
/// they stay consecutive.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DayControls {
    controls: Vec<DayControl>,
}

impl DayControls {
    pub fn new(controls: Vec<DayControl>) -> DayControls {
        DayControls { controls }
    }

    pub fn as_slice(&self) -> &[DayControl] {
        &self.controls
    }

    pub fn into_inner(self) -> Vec<DayControl> {
        self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// True if at least one day takes part in the run.
    pub fn any_enabled(&self) -> bool {
        self.controls.iter().any(|dc| dc.enabled)
    }

    pub fn set_enabled(&mut self, idx: usize, enabled: bool) -> Result<(), LayoutError> {
        let dc = self
            .controls
            .get_mut(idx)
            .ok_or(LayoutError::DayOutOfRange(idx))?;
        dc.enabled = enabled;
        if enabled {
            self.recalculate_from(idx)?;
        }
        Ok(())
    }

    /// Sets the date of a day from its text. Invalid text leaves the
    /// selection untouched.
    pub fn set_date_text(&mut self, idx: usize, text: &str) -> Result<(), LayoutError> {
        if idx >= self.controls.len() {
            return Err(LayoutError::DayOutOfRange(idx));
        }
        let date = parse_day(text)?;
        self.controls[idx].date = date;
        self.recalculate_from(idx)
    }

    /// Gives consecutive dates to the enabled days from `idx` onwards, counting
    /// from the date of `idx`.
    pub fn recalculate_from(&mut self, idx: usize) -> Result<(), LayoutError> {
        let start = self
            .controls
            .get(idx)
            .ok_or(LayoutError::DayOutOfRange(idx))?
            .date;
        for (offset, dc) in self.controls.iter_mut().skip(idx).enumerate() {
            if dc.enabled {
                dc.date = start + Duration::days(offset as i64);
            }
        }
        Ok(())
    }
}

impl From<Vec<DayControl>> for DayControls {
    fn from(controls: Vec<DayControl>) -> Self {
        DayControls::new(controls)
    }
}
