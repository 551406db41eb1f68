use clap::Args;
use common::config::components::global::WharfConfig;
use common::config::loader::read_config;
use common::error::WharfError;
use common::types::ColumnSpec;
use importer::{ImportService, TransformationService};
use ledger::{MemoryLedger, RunResult};
use sqlident::SchemaWhitelist;
use std::path::{Path, PathBuf};
use warehouse::create_warehouse_client;

#[derive(Args)]
pub struct ImportArgs {
    /// Name of the integration definition to run
    pub integration: String,
    /// CSV file with a header row naming the definition's columns
    #[arg(long = "input", short = 'i')]
    pub input: PathBuf,
}

#[derive(Args)]
pub struct TransformArgs {
    /// Name of the transformation definition to run
    pub transformation: String,
}

#[derive(Args)]
pub struct RunsArgs {
    #[arg(long, help = "only show the N most recent runs")]
    pub limit: Option<usize>,
}

pub fn handle_import(args: &ImportArgs, config_path: Option<PathBuf>) -> Result<(), WharfError> {
    let config = read_config(config_path).map_err(WharfError::init)?;
    let definition = config
        .get_integration(&args.integration)
        .map_err(WharfError::init)?;
    let rows = read_csv_rows(&args.input, &definition.columns)?;
    log::info!(
        "read {} rows from {} for integration '{}'",
        rows.len(),
        args.input.display(),
        definition.name
    );

    let whitelist =
        SchemaWhitelist::from_names(&config.project.allowed_schemas).map_err(WharfError::init)?;
    let ledger = open_ledger(&config)?;
    let details = config
        .warehouse_connection_details()
        .map_err(WharfError::init)?;
    let mut client = create_warehouse_client(&details).map_err(WharfError::init)?;

    let service = ImportService::new(
        ledger.clone(),
        whitelist,
        config.project.error_policy.clone(),
    );
    let outcome = service.run(&mut client, definition, &rows);
    // The ledger holds a record either way; persist it before surfacing
    // the run's own outcome.
    flush_ledger(&ledger, &config)?;

    let result = outcome.map_err(WharfError::import)?;
    print_result(&result, &definition.qualified_target());
    Ok(())
}

pub fn handle_transform(
    args: &TransformArgs,
    config_path: Option<PathBuf>,
) -> Result<(), WharfError> {
    let config = read_config(config_path).map_err(WharfError::init)?;
    let definition = config
        .get_transformation(&args.transformation)
        .map_err(WharfError::init)?;

    let whitelist =
        SchemaWhitelist::from_names(&config.project.allowed_schemas).map_err(WharfError::init)?;
    let ledger = open_ledger(&config)?;
    let details = config
        .warehouse_connection_details()
        .map_err(WharfError::init)?;
    let mut client = create_warehouse_client(&details).map_err(WharfError::init)?;

    let service = TransformationService::new(ledger.clone(), whitelist);
    let outcome = service.run(&mut client, definition);
    flush_ledger(&ledger, &config)?;

    let result = outcome.map_err(WharfError::transform)?;
    print_result(&result, &definition.qualified_target());
    Ok(())
}

pub fn handle_runs(args: &RunsArgs, config_path: Option<PathBuf>) -> Result<(), WharfError> {
    let config = read_config(config_path).map_err(WharfError::init)?;
    let ledger = open_ledger(&config)?;

    for record in ledger.list(args.limit) {
        let rows = record
            .rows_processed
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let finished = record
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<14}  {:<24}  {:<9}  rows={:<8}  finished={}",
            record.id,
            record.kind.to_string(),
            record.definition,
            record.status.to_string(),
            rows,
            finished
        );
        if let Some(reason) = &record.failure_reason {
            println!("    reason: {reason}");
        }
        for error in &record.errors {
            println!("    row {}: {}: {}", error.row_index, error.field, error.message);
        }
    }
    Ok(())
}

fn print_result(result: &RunResult, target: &str) {
    println!(
        "run {} {}: {} rows now in {}, {} validation errors",
        result.run_id,
        result.status,
        result.rows_processed,
        target,
        result.errors.len()
    );
}

fn open_ledger(config: &WharfConfig) -> Result<MemoryLedger, WharfError> {
    MemoryLedger::load_from(&config.project.ledger_path.to_string_lossy())
        .map_err(WharfError::init)
}

fn flush_ledger(ledger: &MemoryLedger, config: &WharfConfig) -> Result<(), WharfError> {
    ledger
        .flush_to(&config.project.ledger_path.to_string_lossy())
        .map_err(WharfError::init)
}

/// Read the feed file, reordering fields to the definition's column order
/// by header name. Missing columns are a hard error; extra columns in the
/// feed are ignored.
fn read_csv_rows(path: &Path, columns: &[ColumnSpec]) -> Result<Vec<Vec<String>>, WharfError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(WharfError::import)?;
    let headers = reader.headers().map_err(WharfError::import)?.clone();

    let positions = columns
        .iter()
        .map(|column| {
            headers.iter().position(|h| h == column.name).ok_or_else(|| {
                WharfError::import_msg(format!(
                    "{} has no '{}' column in its header row",
                    path.display(),
                    column.name
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(WharfError::import)?;
        rows.push(
            positions
                .iter()
                .map(|i| record.get(*i).unwrap_or("").to_string())
                .collect(),
        );
    }
    Ok(rows)
}
