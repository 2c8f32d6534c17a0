mod config;
mod days;
pub mod plan;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;

pub use crate::config::*;
pub use crate::days::*;

/// The format of the timestamps in the count exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The default name of the timestamp column in the count exports.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "horaDas";

/// Parses a time of day such as `06:00` (seconds are accepted and kept).
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, LayoutError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| LayoutError::InvalidTime(s.to_string()))
}

/// Parses a timestamp of a count export. Malformed values give `None`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// Computes the first destination row of a shift, for each day of the template.
///
/// The start time is converted to a number of slots since midnight. Times that
/// are not on a slot boundary are truncated to the previous slot.
///
/// The output always has `geometry.day_count` entries, even if fewer days are
/// in use: callers take the prefix they need.
///
/// ```
/// use shift_layout::*;
/// let start = parse_time_of_day("06:00")?;
/// let rows = compute_start_rows(start, &RowGeometry::DEFAULT);
/// assert_eq!(rows, vec![40, 143, 246, 349, 452, 555, 658]);
/// # Ok::<(), LayoutError>(())
/// ```
pub fn compute_start_rows(shift_start: NaiveTime, geometry: &RowGeometry) -> Vec<u32> {
    let minutes = shift_start.hour() * 60 + shift_start.minute();
    let slots = minutes / geometry.interval_minutes;
    let first_row = geometry.base_row + slots;
    (0..geometry.day_count as u32)
        .map(|day| first_row + day * geometry.row_increment)
        .collect()
}

/// Same as [compute_start_rows] with the default geometry, from a `HH:MM` string.
pub fn start_rows_for(shift_start: &str) -> Result<Vec<u32>, LayoutError> {
    let t = parse_time_of_day(shift_start)?;
    Ok(compute_start_rows(t, &RowGeometry::DEFAULT))
}

/// Selects the records of one day that fall within `[start, end]`.
///
/// Both bounds are inclusive. Records with a missing or malformed timestamp
/// are dropped. The order of the input is preserved.
pub fn select_window(
    records: &Records,
    timestamp_column: &str,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> Result<Records, LayoutError> {
    let ts_idx = records
        .column_index(timestamp_column)
        .ok_or_else(|| LayoutError::MissingColumn(timestamp_column.to_string()))?;
    let lower = date.and_time(start_time);
    let upper = date.and_time(end_time);

    let mut dropped = 0;
    let rows: Vec<Vec<String>> = records
        .rows
        .iter()
        .filter(|row| {
            match row.get(ts_idx).and_then(|s| parse_timestamp(s)) {
                Some(ts) => ts >= lower && ts <= upper,
                None => {
                    dropped += 1;
                    false
                }
            }
        })
        .cloned()
        .collect();
    debug!(
        "select_window: [{} , {}]: kept {} of {} records ({} without timestamp)",
        lower,
        upper,
        rows.len(),
        records.len(),
        dropped
    );
    Ok(Records {
        headers: records.headers.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> NaiveTime {
        parse_time_of_day(s).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    fn records(stamps: &[&str]) -> Records {
        Records::new(
            vec!["id".to_string(), "horaDas".to_string(), "carros".to_string()],
            stamps
                .iter()
                .enumerate()
                .map(|(i, s)| vec![i.to_string(), s.to_string(), "1".to_string()])
                .collect(),
        )
    }

    #[test]
    fn start_rows_midnight() {
        assert_eq!(
            start_rows_for("00:00").unwrap(),
            vec![16, 119, 222, 325, 428, 531, 634]
        );
    }

    #[test]
    fn start_rows_morning() {
        assert_eq!(
            start_rows_for("06:00").unwrap(),
            vec![40, 143, 246, 349, 452, 555, 658]
        );
    }

    #[test]
    fn start_rows_evening() {
        assert_eq!(
            start_rows_for("18:00").unwrap(),
            vec![88, 191, 294, 397, 500, 603, 706]
        );
    }

    #[test]
    fn start_rows_shape() {
        for h in 0..24 {
            for m in [0, 15, 30, 45] {
                let rows = compute_start_rows(
                    NaiveTime::from_hms_opt(h, m, 0).unwrap(),
                    &RowGeometry::DEFAULT,
                );
                assert_eq!(rows.len(), 7);
                for w in rows.windows(2) {
                    assert_eq!(w[1] - w[0], 103);
                }
            }
        }
    }

    #[test]
    fn start_rows_truncate_to_previous_slot() {
        assert_eq!(start_rows_for("06:14").unwrap()[0], 40);
        assert_eq!(start_rows_for("06:15").unwrap()[0], 41);
        assert_eq!(start_rows_for("23:59").unwrap()[0], 16 + 95);
    }

    #[test]
    fn start_rows_custom_geometry() {
        let g = RowGeometry {
            base_row: 0,
            interval_minutes: 60,
            row_increment: 24,
            day_count: 3,
        };
        assert_eq!(compute_start_rows(time("02:30"), &g), vec![2, 26, 50]);
    }

    #[test]
    fn bad_time() {
        assert!(parse_time_of_day("6h").is_err());
        assert!(parse_time_of_day("25:00").is_err());
        assert!(start_rows_for("").is_err());
    }

    #[test]
    fn window_end_is_inclusive() {
        let r = records(&[
            "2024-03-01 17:44:59",
            "2024-03-01 17:45:00",
            "2024-03-01 17:45:01",
        ]);
        let w = select_window(&r, "horaDas", day("01-03-2024"), time("06:00"), time("17:45")).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.rows[1][1], "2024-03-01 17:45:00");
    }

    #[test]
    fn window_start_is_inclusive() {
        let r = records(&["2024-03-01 05:59:59", "2024-03-01 06:00:00"]);
        let w = select_window(&r, "horaDas", day("01-03-2024"), time("06:00"), time("17:45")).unwrap();
        assert_eq!(w.rows, vec![r.rows[1].clone()]);
    }

    #[test]
    fn window_other_days_and_malformed() {
        let r = records(&[
            "2024-03-02 08:00:00",
            "not a date",
            "",
            "2024-03-01 08:00:00",
            "2024-03-01 07:00:00",
        ]);
        let w = select_window(&r, "horaDas", day("01-03-2024"), time("06:00"), time("17:45")).unwrap();
        // Order of the input is kept.
        let ids: Vec<&str> = w.rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
        assert_eq!(w.headers, r.headers);
    }

    #[test]
    fn window_empty() {
        let r = records(&["2024-03-01 20:00:00"]);
        let w = select_window(&r, "horaDas", day("01-03-2024"), time("06:00"), time("17:45")).unwrap();
        assert!(w.is_empty());
    }

    #[test]
    fn window_missing_column() {
        let r = records(&["2024-03-01 20:00:00"]);
        let res = select_window(&r, "timestamp", day("01-03-2024"), time("06:00"), time("17:45"));
        assert_eq!(res, Err(LayoutError::MissingColumn("timestamp".to_string())));
    }
}
