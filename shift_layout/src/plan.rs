/*!
Planning of the three shifts of a run.

The users only choose when the day period starts and when the night period
starts. The three windows follow from these two boundaries:

| Shift | Start | End | Sources |
|---|---|---|---|
| Madrugada | `00:00` | day start − 1 slot | evening |
| Período Diurno | day start | night start − 1 slot | daytime |
| Período Noturno | night start | `23:45` | evening |
*/

use std::path::PathBuf;

use chrono::{Duration, NaiveTime};
use log::{info, warn};

use crate::config::*;
use crate::{compute_start_rows, date_range, format_day};

/// The two boundaries chosen for the day period.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct DayPeriod {
    /// The first slot of the day period.
    pub day_start: NaiveTime,
    /// The first slot of the night period.
    pub night_start: NaiveTime,
}

/// The files selected for each period and group. Any of them may be missing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SourceSelection {
    pub daytime_a: Option<PathBuf>,
    pub daytime_b: Option<PathBuf>,
    pub evening_a: Option<PathBuf>,
    pub evening_b: Option<PathBuf>,
}

impl SourceSelection {
    pub fn is_empty(&self) -> bool {
        self.all().next().is_none()
    }

    /// The selected files, in the order daytime A, daytime B, evening A, evening B.
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.daytime_a, &self.daytime_b, &self.evening_a, &self.evening_b]
            .into_iter()
            .flatten()
    }

    fn for_shift(&self, name: ShiftName) -> (Option<PathBuf>, Option<PathBuf>) {
        match name {
            ShiftName::Diurno => (self.daytime_a.clone(), self.daytime_b.clone()),
            ShiftName::Madrugada | ShiftName::Noturno => {
                (self.evening_a.clone(), self.evening_b.clone())
            }
        }
    }
}

/// The (start, end) window of each shift, both ends included.
///
/// A day period starting at midnight leaves no room for the early morning
/// shift, which is then left out.
pub fn shift_windows(
    period: &DayPeriod,
    geometry: &RowGeometry,
) -> Vec<(ShiftName, NaiveTime, NaiveTime)> {
    let slot = Duration::minutes(geometry.interval_minutes as i64);
    let midnight = NaiveTime::MIN;
    let mut res = Vec::with_capacity(3);
    if period.day_start > midnight {
        res.push((ShiftName::Madrugada, midnight, period.day_start - slot));
    }
    res.push((ShiftName::Diurno, period.day_start, period.night_start - slot));
    res.push((ShiftName::Noturno, period.night_start, midnight - slot));
    res
}

/// Builds the configurations of the three shifts, in processing order.
///
/// Only the first `geometry.day_count` day controls fit in the template; the
/// others are dropped.
pub fn build_shift_configs<'a>(
    period: &DayPeriod,
    sources: &SourceSelection,
    day_controls: &'a [DayControl],
    geometry: &RowGeometry,
) -> Result<Vec<ShiftConfig<'a>>, LayoutError> {
    let day_controls = if day_controls.len() > geometry.day_count {
        warn!(
            "{} days selected but the template only holds {}: dropping the days after {}",
            day_controls.len(),
            geometry.day_count,
            format_day(day_controls[geometry.day_count - 1].date)
        );
        &day_controls[..geometry.day_count]
    } else {
        day_controls
    };
    let dates = date_range(day_controls);

    let mut res: Vec<ShiftConfig<'a>> = Vec::new();
    for (name, start, end) in shift_windows(period, geometry) {
        let rows: Vec<u32> = compute_start_rows(start, geometry)
            .into_iter()
            .take(day_controls.len())
            .collect();
        let (source_a, source_b) = sources.for_shift(name);
        let config = ShiftConfig::new(
            name,
            start,
            end,
            rows,
            day_controls,
            GroupSources::for_dates(source_a, &dates),
            GroupSources::for_dates(source_b, &dates),
        )?;
        info!(
            "Planned shift {}: {} -> {}, rows {:?}",
            name, start, end, config.destination_rows
        );
        res.push(config);
    }
    Ok(res)
}
