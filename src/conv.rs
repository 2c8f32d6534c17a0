use log::{debug, info, warn};

use shift_layout::plan::build_shift_configs;
use shift_layout::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};

use crate::args::Args;
use crate::conv::config_reader::*;
use crate::conv::io_artifact::*;
use crate::conv::io_template::*;

mod archive;
pub mod config_reader;
mod io_artifact;
mod io_common;
mod io_csv;
mod io_template;

#[derive(Debug, Snafu)]
pub enum ConvError {
    #[snafu(display("Error opening csv file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("{path}: {source}"))]
    Layout { source: LayoutError, path: String },
    #[snafu(display("Error writing intermediate file {path}"))]
    WritingArtifact {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening template {path}"))]
    OpeningTemplate {
        source: umya_spreadsheet::reader::xlsx::XlsxError,
        path: String,
    },
    #[snafu(display("Error saving template {path}"))]
    SavingTemplate {
        source: umya_spreadsheet::writer::xlsx::XlsxError,
        path: String,
    },
    #[snafu(display("Cannot add the sheet {sheet} to the template: {message}"))]
    AddingSheet { sheet: String, message: String },
    #[snafu(display("Error deleting intermediate file {path}"))]
    RemovingArtifact {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Refusing to overwrite the template {path}"))]
    OverwritingTemplate { path: String },
    #[snafu(display("Error opening configuration {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration"))]
    ParsingJson { source: serde_json::Error },

    // Checked before any shift runs.
    #[snafu(display("No template workbook selected"))]
    NoTemplate {},
    #[snafu(display("No day selected"))]
    NoDaySelected {},
    #[snafu(display("Shift time not set: {which}"))]
    NoShiftTime { which: String },
    #[snafu(display("No report selected"))]
    NoSourceSelected {},
    #[snafu(display("Invalid {what}: {source}"))]
    InvalidInput { source: LayoutError, what: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ConvResult<T> = Result<T, ConvError>;

/// The phases of the processing of one shift.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ShiftState {
    Pending,
    Converting,
    Merging,
    Cleaning,
    Done,
}

/// A source that could not be used for one day. The other sources of the
/// shift are not affected.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceFailure {
    pub group: Group,
    pub source: PathBuf,
    pub date: NaiveDate,
    pub message: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ShiftReport {
    pub shift: ShiftName,
    pub state: ShiftState,
    pub failures: Vec<SourceFailure>,
    pub merged: MergeStats,
    /// The number of intermediate files deleted.
    pub removed: usize,
}

/// What does not change between the shifts of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunContext {
    pub template_path: PathBuf,
    pub output_folder: PathBuf,
    pub timestamp_column: String,
    pub layout: TemplateLayout,
}

fn advance(state: &mut ShiftState, next: ShiftState, shift: ShiftName) {
    debug!("process_shift: {}: {:?} -> {:?}", shift, state, next);
    *state = next;
}

/// Processes one shift from the sources to the template.
///
/// All the sources are converted first, then the template is opened, written
/// and released, and finally the intermediate files are deleted. A source that
/// fails is reported in the returned value and skipped. An error is returned
/// only if the template itself could not be written; the intermediate files
/// are deleted in this case too.
pub fn process_shift<S, F>(
    shift: &ShiftConfig,
    ctx: &RunContext,
    open_template: F,
) -> ConvResult<ShiftReport>
where
    S: TemplateSink,
    F: FnOnce() -> ConvResult<S>,
{
    let mut state = ShiftState::Pending;
    let mut failures: Vec<SourceFailure> = Vec::new();

    advance(&mut state, ShiftState::Converting, shift.name);
    // None: the conversion failed.
    let mut artifacts: HashMap<ArtifactKey, Option<Artifact>> = HashMap::new();
    // Intermediate file -> the source it holds. Two sources with the same
    // file name must not share it.
    let mut claimed: HashMap<PathBuf, ArtifactKey> = HashMap::new();
    let mut group_folders: BTreeSet<PathBuf> = BTreeSet::new();
    for group in [Group::A, Group::B] {
        for ds in shift.group(group).days.iter() {
            let (path, date) = match ds {
                DaySource::Present { path, date } => (path, *date),
                DaySource::Absent => continue,
            };
            let key = ArtifactKey {
                source: path.clone(),
                date: Some(date),
            };
            if artifacts.contains_key(&key) {
                continue;
            }
            let default_path = ctx.output_folder.join(artifact_name(path, Some(date)));
            let folder = match claimed.get(&default_path) {
                Some(other) if *other != key => {
                    let folder = group_folder(&ctx.output_folder, group);
                    debug!(
                        "{}: {:?} and {:?} share {:?}, using {:?}",
                        shift.name, other.source, path, default_path, folder
                    );
                    if let Err(e) = fs::create_dir_all(&folder) {
                        warn!("{}: cannot create {:?}: {}", shift.name, folder, e);
                    }
                    group_folders.insert(folder.clone());
                    folder
                }
                _ => ctx.output_folder.clone(),
            };
            let converted = convert(
                path,
                &folder,
                Some(date),
                shift.start_time,
                shift.end_time,
                &ctx.timestamp_column,
            );
            match converted {
                Ok(artifact) => {
                    info!(
                        "{}: group {}: {} -> {:?} ({} rows)",
                        shift.name,
                        group,
                        format_day(date),
                        artifact.path,
                        artifact.rows
                    );
                    claimed.insert(artifact.path.clone(), key.clone());
                    artifacts.insert(key, Some(artifact));
                }
                Err(e) => {
                    warn!("{}: error converting {:?}: {}", shift.name, path, e);
                    failures.push(SourceFailure {
                        group,
                        source: path.clone(),
                        date,
                        message: e.to_string(),
                    });
                    artifacts.insert(key, None);
                }
            }
        }
    }

    advance(&mut state, ShiftState::Merging, shift.name);
    let band = ctx.layout.artifact_band;
    let tables_a = load_group(shift, Group::A, &artifacts, band, &mut failures);
    let tables_b = load_group(shift, Group::B, &artifacts, band, &mut failures);
    let merged = open_template().and_then(|mut sink| {
        let stats = merge(
            &mut sink,
            &ctx.layout,
            shift,
            &ctx.template_path,
            &tables_a,
            &tables_b,
        )?;
        sink.finish()?;
        Ok(stats)
    });

    advance(&mut state, ShiftState::Cleaning, shift.name);
    let paths: BTreeSet<&PathBuf> = artifacts.values().flatten().map(|a| &a.path).collect();
    let mut removed = 0;
    for path in paths {
        match remove_artifact(path) {
            Ok(true) => {
                debug!("Deleted intermediate file {:?}", path);
                removed += 1;
            }
            Ok(false) => debug!("Intermediate file {:?} already gone", path),
            Err(e) => warn!("{}", e),
        }
    }
    for folder in group_folders {
        if let Err(e) = fs::remove_dir(&folder) {
            debug!("Cannot remove {:?}: {}", folder, e);
        }
    }

    let merged = merged?;
    advance(&mut state, ShiftState::Done, shift.name);
    Ok(ShiftReport {
        shift: shift.name,
        state,
        failures,
        merged,
        removed,
    })
}

// Where the intermediate files of a group go when their name is already taken
// by the other group.
fn group_folder(output_folder: &Path, group: Group) -> PathBuf {
    output_folder.join(format!("grupo_{}", group))
}

// One entry per day, None when the day contributes nothing.
fn load_group(
    shift: &ShiftConfig,
    group: Group,
    artifacts: &HashMap<ArtifactKey, Option<Artifact>>,
    band: (u32, u32),
    failures: &mut Vec<SourceFailure>,
) -> Vec<Option<DayTable>> {
    shift
        .group(group)
        .days
        .iter()
        .map(|ds| {
            let (path, date) = match ds {
                DaySource::Present { path, date } => (path, *date),
                DaySource::Absent => return None,
            };
            let key = ArtifactKey {
                source: path.clone(),
                date: Some(date),
            };
            let artifact = artifacts.get(&key)?.as_ref()?;
            match load_band(artifact, band) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("{}: error loading {:?}: {}", shift.name, artifact.path, e);
                    failures.push(SourceFailure {
                        group,
                        source: path.clone(),
                        date,
                        message: e.to_string(),
                    });
                    None
                }
            }
        })
        .collect()
}

/// Converts a whole export, without any filtering, into the output folder.
///
/// Fails without writing anything if the result would replace `template`.
pub fn export_full(
    source: &Path,
    output_folder: &Path,
    timestamp_column: &str,
    template: Option<&Path>,
) -> ConvResult<PathBuf> {
    let destination = output_folder.join(artifact_name(source, None));
    if let Some(template) = template {
        ensure!(
            !same_file(&destination, template),
            OverwritingTemplateSnafu {
                path: io_common::display_path(template)
            }
        );
    }
    if destination.exists() {
        warn!("Overwriting {:?}", destination);
    }
    let artifact = convert(
        source,
        output_folder,
        None,
        NaiveTime::MIN,
        NaiveTime::MIN,
        timestamp_column,
    )?;
    info!("Exported {} rows to {:?}", artifact.rows, artifact.path);
    Ok(artifact.path)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

pub fn run(args: &Args) -> ConvResult<()> {
    let (config, root) = match &args.config {
        Some(p) => {
            let config = read_run_config(p)?;
            let root = Path::new(p)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, root)
        }
        None => (RunConfig::default(), PathBuf::from(".")),
    };
    debug!("config: {:?}", config);

    if let Some(export) = &args.export {
        let output_folder = output_folder(&config, &root, args);
        let template = template_path(&config, &root, args);
        export_full(
            Path::new(export),
            &output_folder,
            timestamp_column(&config, args).as_str(),
            template.as_deref(),
        )?;
        return Ok(());
    }

    let plan = resolve_run(&config, &root, args)?;
    info!("plan: {:?}", plan);
    run_plan(&plan)?;
    Ok(())
}

/// Runs all the shifts of a plan, then archives the sources if requested.
pub fn run_plan(plan: &RunPlan) -> ConvResult<Vec<ShiftReport>> {
    let configs = build_shift_configs(
        &plan.period,
        &plan.sources,
        &plan.day_controls,
        &RowGeometry::DEFAULT,
    )
    .context(InvalidInputSnafu {
        what: "shift configuration".to_string(),
    })?;
    let ctx = RunContext {
        template_path: plan.template.clone(),
        output_folder: plan.output_folder.clone(),
        timestamp_column: plan.timestamp_column.clone(),
        layout: TemplateLayout::DEFAULT,
    };

    let mut reports: Vec<ShiftReport> = Vec::new();
    for shift in configs.iter() {
        info!("Starting the processing of {}...", shift.name);
        let report = process_shift(shift, &ctx, || TemplateWorkbook::open(&plan.template))?;
        for f in report.failures.iter() {
            warn!(
                "{}: group {}: {:?} skipped for {}: {}",
                shift.name,
                f.group,
                f.source,
                format_day(f.date),
                f.message
            );
        }
        info!(
            "Processing of {} done: {} blocks in A, {} blocks in B",
            shift.name,
            report.merged.blocks_a.len(),
            report.merged.blocks_b.len()
        );
        reports.push(report);
    }

    if plan.archive {
        let moved = archive::archive_sources(&configs, &plan.archive_folder);
        info!("Archived {} source files to {:?}", moved.len(), plan.archive_folder);
    }
    info!("Run complete.");
    Ok(reports)
}
