//! In-memory warehouse double plus canned definitions for service tests.
//!
//! [`FakeWarehouse`] understands exactly the statement shapes the pipeline
//! emits (advisory lock, `TRUNCATE`, multi-row `INSERT`, `COUNT(*)`) and
//! models transaction semantics: staged writes only become visible through
//! `commit`, and a dropped transaction leaves the committed state alone.

use common::types::{
    ColumnSpec, ColumnType, IntegrationDefinition, SourceFormat, SqlValue,
    TransformationDefinition, ValueRule,
};
use std::collections::HashMap;
use warehouse::{SqlExecutor, WarehouseClient, WarehouseError, WarehouseTransaction};

#[derive(Default)]
pub struct FakeWarehouse {
    /// Committed row count per quoted qualified table name.
    pub tables: HashMap<String, i64>,
    /// Every statement handed to a transaction, in execution order,
    /// including the ones that failed. `commit` is recorded as `COMMIT`.
    pub statements: Vec<String>,
    /// When set, any statement containing this fragment errors.
    pub fail_on_contains: Option<String>,
    /// Row count a parameterless `INSERT` recipe pretends to write.
    pub recipe_rows: i64,
}

impl FakeWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, qualified: &str, rows: i64) -> Self {
        self.tables.insert(qualified.to_string(), rows);
        self
    }

    pub fn committed(&self, qualified: &str) -> i64 {
        self.tables.get(qualified).copied().unwrap_or(0)
    }
}

impl WarehouseClient for FakeWarehouse {
    type Transaction<'a> = FakeTransaction<'a>;

    fn transaction(&mut self) -> Result<FakeTransaction<'_>, WarehouseError> {
        Ok(FakeTransaction {
            base: self,
            staged: HashMap::new(),
        })
    }
}

pub struct FakeTransaction<'a> {
    base: &'a mut FakeWarehouse,
    staged: HashMap<String, i64>,
}

impl FakeTransaction<'_> {
    fn check(&mut self, sql: &str) -> Result<(), WarehouseError> {
        self.base.statements.push(sql.to_string());
        match &self.base.fail_on_contains {
            Some(needle) if sql.contains(needle.as_str()) => Err(WarehouseError::execution(
                format!("forced failure on statement containing '{needle}'"),
            )),
            _ => Ok(()),
        }
    }

    fn current(&self, table: &str) -> i64 {
        self.staged
            .get(table)
            .or_else(|| self.base.tables.get(table))
            .copied()
            .unwrap_or(0)
    }
}

fn table_after<'s>(sql: &'s str, prefix: &str) -> Option<&'s str> {
    sql.strip_prefix(prefix)
        .and_then(|rest| rest.split_whitespace().next())
}

impl SqlExecutor for FakeTransaction<'_> {
    fn batch_execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        self.check(sql)?;
        if sql.starts_with("SELECT pg_advisory_xact_lock(") {
            return Ok(());
        }
        if let Some(table) = table_after(sql, "TRUNCATE TABLE ") {
            self.staged.insert(table.to_string(), 0);
            return Ok(());
        }
        if let Some(table) = table_after(sql, "INSERT INTO ") {
            let rows = self.current(table) + self.base.recipe_rows;
            self.staged.insert(table.to_string(), rows);
            return Ok(());
        }
        Err(WarehouseError::execution(format!(
            "fake warehouse does not understand: {sql}"
        )))
    }

    fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, WarehouseError> {
        self.check(sql)?;
        let table = table_after(sql, "INSERT INTO ").ok_or_else(|| {
            WarehouseError::execution(format!("fake warehouse does not understand: {sql}"))
        })?;
        if params.is_empty() {
            return Err(WarehouseError::execution(
                "parameterized insert carried no parameters",
            ));
        }
        // One VALUES group per row; groups are joined with "), (".
        let rows = (sql.matches("), (").count() + 1) as i64;
        let total = self.current(table) + rows;
        self.staged.insert(table.to_string(), total);
        Ok(rows as u64)
    }

    fn query_count(&mut self, sql: &str) -> Result<i64, WarehouseError> {
        self.check(sql)?;
        match table_after(sql, "SELECT COUNT(*) FROM ") {
            Some(table) => Ok(self.current(table)),
            None => Err(WarehouseError::execution(format!(
                "fake warehouse does not understand: {sql}"
            ))),
        }
    }
}

impl WarehouseTransaction for FakeTransaction<'_> {
    fn commit(self) -> Result<(), WarehouseError> {
        self.base.statements.push("COMMIT".to_string());
        for (table, rows) in self.staged {
            self.base.tables.insert(table, rows);
        }
        Ok(())
    }
}

/// Three-column zip3 population feed used across service tests.
pub fn zip3_integration(unique_key: bool) -> IntegrationDefinition {
    IntegrationDefinition {
        name: "zip3_population".to_string(),
        source_format: SourceFormat::Csv,
        target_schema: "workspace".to_string(),
        target_table: "zip3_population".to_string(),
        columns: vec![
            ColumnSpec::new("zip3", ColumnType::Text)
                .with_rule(ValueRule::Pattern("^[0-9]{3}$".to_string())),
            ColumnSpec::new("state", ColumnType::Text).nullable(),
            ColumnSpec::new("population", ColumnType::Int),
        ],
        unique_key: unique_key.then(|| vec!["zip3".to_string()]),
    }
}

pub fn carrier_rollup_transformation(expected_min_rows: Option<i64>) -> TransformationDefinition {
    TransformationDefinition {
        name: "carrier_rollup".to_string(),
        target_schema: "reference".to_string(),
        target_table: "carrier_rollup".to_string(),
        sql: "SELECT carrier, COUNT(*) FROM workspace.shipments GROUP BY carrier".to_string(),
        expected_min_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_transaction_discards_staged_writes() {
        let mut wh = FakeWarehouse::new().with_table("\"workspace\".\"t\"", 5);
        {
            let mut tx = wh.transaction().unwrap();
            tx.batch_execute("TRUNCATE TABLE \"workspace\".\"t\"").unwrap();
            assert_eq!(tx.query_count("SELECT COUNT(*) FROM \"workspace\".\"t\"").unwrap(), 0);
        }
        assert_eq!(wh.committed("\"workspace\".\"t\""), 5);
    }

    #[test]
    fn commit_publishes_staged_writes() {
        let mut wh = FakeWarehouse::new();
        let mut tx = wh.transaction().unwrap();
        tx.execute_params(
            "INSERT INTO \"workspace\".\"t\" (\"a\") VALUES ($1), ($2)",
            &[SqlValue::Int(1), SqlValue::Int(2)],
        )
        .unwrap();
        tx.commit().unwrap();
        assert_eq!(wh.committed("\"workspace\".\"t\""), 2);
        assert_eq!(wh.statements.last().map(String::as_str), Some("COMMIT"));
    }
}
