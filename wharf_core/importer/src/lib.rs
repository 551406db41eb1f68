//! The truncate-and-reload pipeline: imports into the staging schema and
//! transformations into the curated schema.
//!
//! Both services follow the same shape: validate identifiers before any
//! I/O, then do all writes inside one transaction guarded by a
//! transaction-scoped advisory lock. A failed run leaves the target table
//! exactly as it was; the only other persistent effect is the ledger entry.

pub mod error;
pub mod sql;

pub use error::PipelineError;

use common::types::{ErrorPolicy, IntegrationDefinition, SqlValue, TransformationDefinition};
use ledger::{MemoryLedger, RunKind, RunResult, RunStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlident::{quote_columns, IdentifierError, SafeIdentifier, SafeTable, SchemaWhitelist};
use validation::RowValidator;
use warehouse::{SqlExecutor, WarehouseClient, WarehouseTransaction};

/// Loads one integration's rows into its staging table, replacing the
/// entire prior contents. Truncate-and-reload is the only load strategy:
/// the staging table is always a complete snapshot, never a mix.
pub struct ImportService {
    ledger: MemoryLedger,
    whitelist: SchemaWhitelist,
    policy: ErrorPolicy,
}

impl ImportService {
    pub fn new(ledger: MemoryLedger, whitelist: SchemaWhitelist, policy: ErrorPolicy) -> Self {
        Self {
            ledger,
            whitelist,
            policy,
        }
    }

    pub fn run<C: WarehouseClient>(
        &self,
        conn: &mut C,
        definition: &IntegrationDefinition,
        rows: &[Vec<String>],
    ) -> Result<RunResult, PipelineError> {
        let run_id = self.ledger.open(RunKind::Integration, &definition.name);
        self.ledger.mark_running(run_id)?;

        // Step 1: identifiers. Any failure aborts before a transaction
        // opens, with no partial effect.
        let prepared = match self.prepare(definition) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.ledger.fail(run_id, err.to_string(), Vec::new())?;
                return Err(err);
            }
        };

        // Step 2: row validation, still before any I/O.
        let validator = match RowValidator::new(&definition.columns) {
            Ok(v) => v,
            Err(err) => {
                let err = PipelineError::config(err.to_string());
                self.ledger.fail(run_id, err.to_string(), Vec::new())?;
                return Err(err);
            }
        };
        let report = validator.validate_batch(rows);
        if report.exceeds(&self.policy) {
            let err = PipelineError::threshold(report.failed_rows(), report.rows_scanned);
            self.ledger.fail(run_id, err.to_string(), report.errors)?;
            return Err(err);
        }

        let mut typed_rows = report.rows;
        if let Some(key_idx) = &prepared.key_indexes {
            typed_rows = sql::dedupe_last_wins(typed_rows, key_idx);
        }

        // Steps 3-7: one transaction around truncate + load + count.
        match self.load(conn, &prepared, &typed_rows) {
            Ok(rows_processed) => {
                log::info!(
                    "import '{}' loaded {} rows into {}",
                    definition.name,
                    rows_processed,
                    prepared.table
                );
                self.ledger
                    .complete(run_id, rows_processed, report.errors.clone())?;
                Ok(RunResult {
                    run_id,
                    status: RunStatus::Succeeded,
                    rows_processed,
                    errors: report.errors,
                })
            }
            Err(err) => {
                self.ledger.fail(run_id, err.to_string(), report.errors)?;
                Err(err)
            }
        }
    }

    fn prepare(&self, definition: &IntegrationDefinition) -> Result<PreparedImport, PipelineError> {
        let table = SafeTable::new(
            &definition.target_schema,
            &definition.target_table,
            &self.whitelist,
        )?;
        let column_names: Vec<&str> = definition.columns.iter().map(|c| c.name.as_str()).collect();
        let columns = quote_columns(&column_names)?;

        let (unique_key, key_indexes) = match &definition.unique_key {
            Some(key) => {
                let quoted = quote_columns(key)?;
                let indexes = sql::key_indexes(&definition.columns, key).ok_or_else(|| {
                    PipelineError::config(format!(
                        "unique key of '{}' names a column outside the layout",
                        definition.name
                    ))
                })?;
                (Some(quoted), Some(indexes))
            }
            None => (None, None),
        };

        Ok(PreparedImport {
            table,
            columns,
            unique_key,
            key_indexes,
        })
    }

    fn load<C: WarehouseClient>(
        &self,
        conn: &mut C,
        prepared: &PreparedImport,
        rows: &[Vec<SqlValue>],
    ) -> Result<i64, PipelineError> {
        let mut tx = conn.transaction()?;
        tx.batch_execute(&sql::advisory_lock_statement(&prepared.table))?;
        tx.batch_execute(&sql::truncate_statement(&prepared.table))?;

        let chunk_rows = sql::rows_per_chunk(prepared.columns.len());
        for chunk in rows.chunks(chunk_rows) {
            let statement = sql::insert_statement(
                &prepared.table,
                &prepared.columns,
                chunk.len(),
                prepared.unique_key.as_deref(),
            );
            let params: Vec<SqlValue> = chunk.iter().flatten().cloned().collect();
            tx.execute_params(&statement, &params)?;
        }

        let rows_processed = tx.query_count(&sql::count_statement(&prepared.table))?;
        tx.commit()?;
        Ok(rows_processed)
    }
}

struct PreparedImport {
    table: SafeTable,
    columns: Vec<SafeIdentifier>,
    unique_key: Option<Vec<SafeIdentifier>>,
    key_indexes: Option<Vec<usize>>,
}

/// Recomputes one curated table from the staging schema using a named SQL
/// recipe, inside the same truncate-and-reload envelope as an import.
pub struct TransformationService {
    ledger: MemoryLedger,
    whitelist: SchemaWhitelist,
}

static TABLE_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:FROM|JOIN|INTO)\b").expect("static pattern"));

/// A table reference at the head of the remaining text: an identifier with
/// an optional `.identifier` qualifier.
static TABLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*(\.\s*[A-Za-z_][A-Za-z0-9_]*)?")
        .expect("static pattern")
});

/// Keywords that end a FROM list; a bare word in alias position that is one
/// of these is clause structure, not an alias.
const LIST_END_KEYWORDS: &[&str] = &[
    "select", "on", "where", "group", "order", "having", "limit", "union", "join", "inner",
    "left", "right", "full", "cross", "set", "values",
];

/// Check every schema a recipe references in table position against the
/// whitelist, walking each comma-separated `FROM` list in full so trailing
/// references (`FROM a.t, b.u`) are covered, not just the first.
///
/// Quoted identifiers are rejected outright: quoting would let a reference
/// slip past this textual scan. Column aliases (`o.zip3`) never appear in
/// table position and do not match.
fn check_recipe_schemas(sql: &str, whitelist: &SchemaWhitelist) -> Result<(), PipelineError> {
    if sql.contains('"') {
        return Err(PipelineError::config(
            "recipe SQL may not contain quoted identifiers",
        ));
    }
    for keyword in TABLE_POSITION.find_iter(sql) {
        let mut rest = sql[keyword.end()..].trim_start();
        loop {
            let Some(reference) = TABLE_REF.captures(rest) else {
                break;
            };
            let head = &reference[1];
            if LIST_END_KEYWORDS.contains(&head.to_ascii_lowercase().as_str()) {
                break;
            }
            if reference.get(2).is_some() && !whitelist.is_allowed(head) {
                return Err(IdentifierError::schema_not_allowed(head).into());
            }
            rest = rest[reference.get(0).map_or(0, |m| m.end())..].trim_start();

            // Skip an optional alias (`t`, `AS t`) so the comma after it is
            // still seen as a list separator.
            loop {
                let Some(alias) = TABLE_REF.captures(rest) else {
                    break;
                };
                if alias.get(2).is_some() {
                    break;
                }
                let word = alias[1].to_ascii_lowercase();
                if word != "as" && LIST_END_KEYWORDS.contains(&word.as_str()) {
                    break;
                }
                rest = rest[alias.get(0).map_or(0, |m| m.end())..].trim_start();
                if word != "as" {
                    break;
                }
            }

            match rest.strip_prefix(',') {
                Some(after) => rest = after.trim_start(),
                None => break,
            }
        }
    }
    Ok(())
}

impl TransformationService {
    pub fn new(ledger: MemoryLedger, whitelist: SchemaWhitelist) -> Self {
        Self { ledger, whitelist }
    }

    pub fn run<C: WarehouseClient>(
        &self,
        conn: &mut C,
        definition: &TransformationDefinition,
    ) -> Result<RunResult, PipelineError> {
        let run_id = self.ledger.open(RunKind::Transformation, &definition.name);
        self.ledger.mark_running(run_id)?;

        let prepared = match self.prepare(definition) {
            Ok(p) => p,
            Err(err) => {
                self.ledger.fail(run_id, err.to_string(), Vec::new())?;
                return Err(err);
            }
        };

        match self.recompute(conn, definition, &prepared) {
            Ok(rows_processed) => {
                log::info!(
                    "transformation '{}' wrote {} rows into {}",
                    definition.name,
                    rows_processed,
                    prepared
                );
                self.ledger.complete(run_id, rows_processed, Vec::new())?;
                Ok(RunResult {
                    run_id,
                    status: RunStatus::Succeeded,
                    rows_processed,
                    errors: Vec::new(),
                })
            }
            Err(err) => {
                self.ledger.fail(run_id, err.to_string(), Vec::new())?;
                Err(err)
            }
        }
    }

    fn prepare(&self, definition: &TransformationDefinition) -> Result<SafeTable, PipelineError> {
        let table = SafeTable::new(
            &definition.target_schema,
            &definition.target_table,
            &self.whitelist,
        )?;
        // The recipe text is trusted configuration, but its referenced
        // schemas still go through the whitelist. Defense-in-depth against
        // internal misconfiguration, not only hostile input.
        check_recipe_schemas(&definition.sql, &self.whitelist)?;
        Ok(table)
    }

    fn recompute<C: WarehouseClient>(
        &self,
        conn: &mut C,
        definition: &TransformationDefinition,
        table: &SafeTable,
    ) -> Result<i64, PipelineError> {
        let recipe = definition.sql.trim();
        // get(..6) rather than a byte slice: recipe text is arbitrary UTF-8
        // and byte 6 need not be a char boundary.
        let statement = if recipe
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("insert"))
        {
            recipe.to_string()
        } else {
            // Bare SELECT recipes are wrapped against the validated target.
            format!("INSERT INTO {} {}", table.qualified(), recipe)
        };

        let mut tx = conn.transaction()?;
        tx.batch_execute(&sql::advisory_lock_statement(table))?;
        tx.batch_execute(&sql::truncate_statement(table))?;
        tx.batch_execute(&statement)?;

        let rows_processed = tx.query_count(&sql::count_statement(table))?;
        if let Some(expected_min) = definition.expected_min_rows {
            if rows_processed < expected_min {
                // Dropping the transaction rolls the truncate and load back.
                return Err(PipelineError::row_count_mismatch(
                    &definition.qualified_target(),
                    expected_min,
                    rows_processed,
                ));
            }
        }
        tx.commit()?;
        Ok(rows_processed)
    }
}
