use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, arg, value_parser};

use cellspace::batch::{
    BatchSpec, FileLoader, PhenotypePair, count_within_batch, count_within_field,
    list_field_files,
};
use cellspace::config::load_batch_config;
use cellspace::data::loader::load_file;
use cellspace::select::parse_phenotypes;
use cellspace::spatial::{DistanceMatrix, nearest_distances, with_nearest_columns};

pub const WITHIN_CMD: &str = "within";
pub const NEAREST_CMD: &str = "nearest";
pub const BATCH_CMD: &str = "batch";

// ---------------------------------------------------------------------------
// Argument definitions
// ---------------------------------------------------------------------------

pub fn create_within_cli() -> Command {
    Command::new(WITHIN_CMD)
        .about("Count cells of one phenotype within radii of another, in a single field.")
        .arg(Arg::new("table").required(true))
        .arg(arg!(--from <phenotype> "phenotype of the centre cells").required(true))
        .arg(arg!(--to <phenotype> "phenotype of the counted cells").required(true))
        .arg(
            arg!(--radius <microns> "radius to count within (repeatable)")
                .required(true)
                .action(ArgAction::Append)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--category <category> "restrict centre cells to a tissue category (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(arg!(--output <output> "CSV file to write (default: stdout)"))
}

pub fn create_nearest_cli() -> Command {
    Command::new(NEAREST_CMD)
        .about("Add nearest-neighbour distance columns to a cell table.")
        .arg(Arg::new("table").required(true))
        .arg(
            arg!(--phenotype <phenotype> "phenotype to measure distance to (repeatable)")
                .required(true)
                .action(ArgAction::Append),
        )
        .arg(arg!(--output <output> "CSV file to write (default: stdout)"))
}

pub fn create_batch_cli() -> Command {
    Command::new(BATCH_CMD)
        .about("Count within radii for every cell table in a directory.")
        .arg(Arg::new("dir").required(true))
        .arg(arg!(--config <job> "JSON job file with pairs, radii and rules").required(true))
        .arg(arg!(--output <output> "CSV file to write (default: stdout)"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub fn run_within(matches: &ArgMatches) -> Result<()> {
    let table_path = PathBuf::from(
        matches
            .get_one::<String>("table")
            .context("A path to a cell table is required.")?,
    );
    let from = matches.get_one::<String>("from").context("--from is required")?;
    let to = matches.get_one::<String>("to").context("--to is required")?;
    let radii: Vec<f64> = matches
        .get_many::<f64>("radius")
        .map(|r| r.copied().collect())
        .unwrap_or_default();
    let categories: Vec<String> = matches
        .get_many::<String>("category")
        .map(|c| c.cloned().collect())
        .unwrap_or_default();

    let spec = BatchSpec {
        pairs: vec![PhenotypePair::new(from, to)],
        radii,
        categories,
        rules: None,
    };
    let rules = spec.resolved_rules()?;
    let table = load_file(&table_path)?;
    let label = file_label(&table_path);
    let rows = count_within_field(&label, &table, &spec, &rules)?;

    let result = cellspace::BatchResult { rows };
    write_output(matches, |w| result.to_writer(w))
}

pub fn run_nearest(matches: &ArgMatches) -> Result<()> {
    let table_path = PathBuf::from(
        matches
            .get_one::<String>("table")
            .context("A path to a cell table is required.")?,
    );
    let phenotypes: Vec<String> = matches
        .get_many::<String>("phenotype")
        .map(|p| p.cloned().collect())
        .unwrap_or_default();

    let rules = parse_phenotypes(&phenotypes, None)?;
    let table = load_file(&table_path)?;
    let dm = DistanceMatrix::from_table(&table);
    let nearest = nearest_distances(&table, &rules, Some(&dm))?;
    let table = with_nearest_columns(table, &nearest)?;

    write_output(matches, |w| table.to_csv_writer(w))
}

pub fn run_batch(matches: &ArgMatches) -> Result<()> {
    let dir = PathBuf::from(
        matches
            .get_one::<String>("dir")
            .context("A directory of cell tables is required.")?,
    );
    let config = PathBuf::from(
        matches
            .get_one::<String>("config")
            .context("A job file is required.")?,
    );

    let spec = load_batch_config(&config)?;
    // validate the job before touching the directory
    spec.resolved_rules()?;
    let files = list_field_files(&dir)?;
    if files.is_empty() {
        anyhow::bail!("No cell tables found in {}", dir.display());
    }
    log::info!("processing {} files from {}", files.len(), dir.display());

    let result = count_within_batch(&files, &spec, &FileLoader)?;
    write_output(matches, |w| result.to_writer(w))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_output<F>(matches: &ArgMatches, write: F) -> Result<()>
where
    F: FnOnce(Box<dyn Write>) -> Result<()>,
{
    let writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("creating {path}"))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    write(writer)
}
