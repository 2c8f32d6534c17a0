use crate::conv::io_csv::read_day_controls;
use crate::conv::*;

use serde::{Deserialize, Serialize};
use shift_layout::plan::{DayPeriod, SourceSelection};
use std::fs;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DayEntry {
    pub enabled: bool,
    /// DD-MM-YYYY
    pub date: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFiles {
    #[serde(rename = "daytimeA")]
    pub daytime_a: Option<String>,
    #[serde(rename = "daytimeB")]
    pub daytime_b: Option<String>,
    #[serde(rename = "eveningA")]
    pub evening_a: Option<String>,
    #[serde(rename = "eveningB")]
    pub evening_b: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "templatePath")]
    pub template_path: Option<String>,
    #[serde(rename = "outputFolder")]
    pub output_folder: Option<String>,
    #[serde(rename = "archiveFolder")]
    pub archive_folder: Option<String>,
    #[serde(rename = "archiveSources")]
    pub archive_sources: Option<bool>,
    #[serde(rename = "timestampColumn")]
    pub timestamp_column: Option<String>,
    #[serde(rename = "dayStart")]
    pub day_start: Option<String>,
    #[serde(rename = "dayEnd")]
    pub day_end: Option<String>,
    #[serde(default)]
    pub days: Vec<DayEntry>,
    #[serde(rename = "firstDate")]
    pub first_date: Option<String>,
    #[serde(rename = "dayCount")]
    pub day_count: Option<usize>,
    #[serde(default)]
    pub sources: SourceFiles,
}

/// Everything a run needs, after merging the configuration file and the
/// command line and checking the preconditions.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunPlan {
    pub template: PathBuf,
    pub output_folder: PathBuf,
    pub archive_folder: PathBuf,
    pub archive: bool,
    pub timestamp_column: String,
    pub period: DayPeriod,
    pub sources: SourceSelection,
    pub day_controls: Vec<DayControl>,
}

pub fn read_run_config(path: &str) -> ConvResult<RunConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RunConfig = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

// Empty strings count as not set.
fn non_empty(x: &Option<String>) -> Option<&str> {
    x.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// Command line paths are taken as given, configuration paths are relative to
// the configuration file.
fn pick_path(cli: &Option<String>, config: &Option<String>, root: &Path) -> Option<PathBuf> {
    if let Some(p) = non_empty(cli) {
        return Some(PathBuf::from(p));
    }
    non_empty(config).map(|p| {
        let p = Path::new(p);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    })
}

pub fn template_path(config: &RunConfig, root: &Path, args: &Args) -> Option<PathBuf> {
    pick_path(&args.template, &config.template_path, root)
}

pub fn output_folder(config: &RunConfig, root: &Path, args: &Args) -> PathBuf {
    pick_path(&args.output_folder, &config.output_folder, root).unwrap_or_else(|| PathBuf::from("."))
}

pub fn timestamp_column(config: &RunConfig, args: &Args) -> String {
    non_empty(&args.timestamp_column)
        .or_else(|| non_empty(&config.timestamp_column))
        .unwrap_or(DEFAULT_TIMESTAMP_COLUMN)
        .to_string()
}

fn shift_time(cli: &Option<String>, config: &Option<String>, which: &str) -> ConvResult<NaiveTime> {
    let s = non_empty(cli)
        .or_else(|| non_empty(config))
        .context(NoShiftTimeSnafu { which })?;
    parse_time_of_day(s).context(InvalidInputSnafu { what: which })
}

fn select_days(
    config: &RunConfig,
    args: &Args,
    sources: &SourceSelection,
    timestamp_column: &str,
) -> ConvResult<Vec<DayControl>> {
    if let Some(first) = non_empty(&args.first_date) {
        let first_date = parse_day(first).context(InvalidInputSnafu { what: "first date" })?;
        let count = args.day_count.or(config.day_count).unwrap_or(1);
        return Ok(explicit_day_controls(first_date, count));
    }
    if !config.days.is_empty() {
        let entries: Vec<(bool, String)> = config
            .days
            .iter()
            .map(|e| (e.enabled, e.date.clone()))
            .collect();
        return resolve_day_texts(&entries).context(InvalidInputSnafu { what: "days" });
    }
    if let Some(first) = non_empty(&config.first_date) {
        let first_date = parse_day(first).context(InvalidInputSnafu { what: "first date" })?;
        let count = args.day_count.or(config.day_count).unwrap_or(1);
        return Ok(explicit_day_controls(first_date, count));
    }
    match sources.all().next() {
        Some(source) => match read_day_controls(source, timestamp_column) {
            Ok(dcs) => {
                info!(
                    "Inferred {} days from {:?}: {:?}",
                    dcs.len(),
                    source,
                    dcs.iter().map(|dc| format_day(dc.date)).collect::<Vec<String>>()
                );
                Ok(dcs)
            }
            Err(e) => {
                warn!("Could not read the days of {:?}: {}", source, e);
                Ok(vec![])
            }
        },
        None => Ok(vec![]),
    }
}

/// Merges the configuration file with the command line, and checks that a run
/// can start: a template is chosen, at least one day is enabled, both period
/// boundaries are set and at least one source is selected.
pub fn resolve_run(config: &RunConfig, root: &Path, args: &Args) -> ConvResult<RunPlan> {
    let template = template_path(config, root, args).context(NoTemplateSnafu {})?;

    let sources = SourceSelection {
        daytime_a: pick_path(&args.daytime_a, &config.sources.daytime_a, root),
        daytime_b: pick_path(&args.daytime_b, &config.sources.daytime_b, root),
        evening_a: pick_path(&args.evening_a, &config.sources.evening_a, root),
        evening_b: pick_path(&args.evening_b, &config.sources.evening_b, root),
    };
    let timestamp_column = timestamp_column(config, args);

    let day_controls = select_days(config, args, &sources, &timestamp_column)?;
    ensure!(day_controls.iter().any(|dc| dc.enabled), NoDaySelectedSnafu {});

    let period = DayPeriod {
        day_start: shift_time(&args.day_start, &config.day_start, "day start")?,
        night_start: shift_time(&args.day_end, &config.day_end, "day end")?,
    };
    if period.night_start <= period.day_start {
        whatever!(
            "The day period must end after it starts: {} -> {}",
            period.day_start,
            period.night_start
        );
    }

    ensure!(!sources.is_empty(), NoSourceSelectedSnafu {});

    let output_folder = output_folder(config, root, args);
    let archive_folder = pick_path(&args.archive_folder, &config.archive_folder, root)
        .unwrap_or_else(|| output_folder.join("old"));

    Ok(RunPlan {
        template,
        output_folder,
        archive_folder,
        archive: args.archive || config.archive_sources.unwrap_or(false),
        timestamp_column,
        period,
        sources,
        day_controls,
    })
}
