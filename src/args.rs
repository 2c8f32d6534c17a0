use clap::Parser;

/// Transcribes traffic-count exports (CSV) into the shift blocks of a workbook template.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the run: template, sources, day period and days.
    /// Relative paths in this file are resolved from its directory. All the other options override
    /// the values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The workbook template to fill. It must contain the sheets 'Títulos',
    /// 'Contagens A (EXCLUIR)' and 'Contagens B (EXCLUIR)'.
    #[clap(short, long, value_parser)]
    pub template: Option<String>,

    /// (directory, default '.') Where the intermediate files are written. They are deleted at the end
    /// of each shift.
    #[clap(short, long, value_parser)]
    pub output_folder: Option<String>,

    /// (directory, default '<output folder>/old') Where the sources are moved with --archive.
    #[clap(long, value_parser)]
    pub archive_folder: Option<String>,

    /// (HH:MM) The start of the day period. The early morning shift ends one slot before.
    #[clap(long, value_parser)]
    pub day_start: Option<String>,

    /// (HH:MM) The start of the night period. The day period ends one slot before.
    #[clap(long, value_parser)]
    pub day_end: Option<String>,

    /// (file path) Group A export for the day period.
    #[clap(long, value_parser)]
    pub daytime_a: Option<String>,

    /// (file path) Group B export for the day period.
    #[clap(long, value_parser)]
    pub daytime_b: Option<String>,

    /// (file path) Group A export for the early morning and night periods.
    #[clap(long, value_parser)]
    pub evening_a: Option<String>,

    /// (file path) Group B export for the early morning and night periods.
    #[clap(long, value_parser)]
    pub evening_b: Option<String>,

    /// (DD-MM-YYYY) The first day to process. Used with --day-count. If no days are given, they
    /// are inferred from the first selected export.
    #[clap(long, value_parser)]
    pub first_date: Option<String>,

    /// (number, at most 7) The number of consecutive days to process from --first-date.
    #[clap(long, value_parser)]
    pub day_count: Option<usize>,

    /// (default horaDas) The name of the timestamp column in the exports.
    #[clap(long, value_parser)]
    pub timestamp_column: Option<String>,

    /// (file path) Converts this export without any filtering into the output folder, and exits.
    #[clap(long, value_parser)]
    pub export: Option<String>,

    /// If passed as an argument, the sources are moved to the archive folder after the run.
    #[clap(long, takes_value = false)]
    pub archive: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
