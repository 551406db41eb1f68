//! Statement builders. Identifiers arrive here only as [`SafeTable`] /
//! [`SafeIdentifier`], so interpolation below cannot change SQL structure;
//! every value travels separately as a bound parameter.

use common::types::{ColumnSpec, SqlValue};
use sqlident::{SafeIdentifier, SafeTable};
use std::collections::HashMap;

/// The extended query protocol caps bind parameters per statement at
/// u16::MAX; chunk multi-row inserts below that.
pub const MAX_BIND_PARAMS: usize = 65_535;

pub fn rows_per_chunk(column_count: usize) -> usize {
    if column_count == 0 {
        return 1;
    }
    (MAX_BIND_PARAMS / column_count).max(1)
}

pub fn truncate_statement(table: &SafeTable) -> String {
    format!("TRUNCATE TABLE {}", table.qualified())
}

pub fn count_statement(table: &SafeTable) -> String {
    format!("SELECT COUNT(*) FROM {}", table.qualified())
}

/// Transaction-scoped advisory lock keyed by the unquoted `schema.table`.
/// Serializes overlapping runs against one target; released on
/// commit/rollback by the server, nothing to unlock on the failure path.
pub fn advisory_lock_statement(table: &SafeTable) -> String {
    format!(
        "SELECT pg_advisory_xact_lock({})",
        advisory_lock_key(&table.raw_key())
    )
}

/// FNV-1a, not the std hasher: the key must be stable across processes
/// and releases for concurrent runs to contend on the same lock.
pub fn advisory_lock_key(raw: &str) -> i64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in raw.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash as i64
}

/// Parameterized multi-row insert, optionally upserting on `unique_key`.
pub fn insert_statement(
    table: &SafeTable,
    columns: &[SafeIdentifier],
    row_count: usize,
    unique_key: Option<&[SafeIdentifier]>,
) -> String {
    let column_list = columns
        .iter()
        .map(SafeIdentifier::quoted)
        .collect::<Vec<_>>()
        .join(", ");

    let mut groups = Vec::with_capacity(row_count);
    let mut param = 1;
    for _ in 0..row_count {
        let placeholders = (0..columns.len())
            .map(|i| format!("${}", param + i))
            .collect::<Vec<_>>()
            .join(", ");
        param += columns.len();
        groups.push(format!("({placeholders})"));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.qualified(),
        column_list,
        groups.join(", ")
    );

    if let Some(key) = unique_key {
        let key_list = key
            .iter()
            .map(SafeIdentifier::quoted)
            .collect::<Vec<_>>()
            .join(", ");
        let updates = columns
            .iter()
            .filter(|c| !key.contains(*c))
            .map(|c| format!("{0} = EXCLUDED.{0}", c.quoted()))
            .collect::<Vec<_>>();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({key_list}) DO NOTHING"));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({key_list}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }
    }
    sql
}

/// Positions of the unique key columns within the definition's column
/// order. A key column that is not in the layout is a configuration error.
pub fn key_indexes(columns: &[ColumnSpec], unique_key: &[String]) -> Option<Vec<usize>> {
    unique_key
        .iter()
        .map(|key| columns.iter().position(|c| &c.name == key))
        .collect()
}

/// Merge duplicate keys within one batch, last occurrence wins.
///
/// `ON CONFLICT DO UPDATE` resolves conflicts against committed rows, but
/// Postgres rejects two conflicting rows inside a single statement, so the
/// batch itself must already be key-unique.
pub fn dedupe_last_wins(rows: Vec<Vec<SqlValue>>, key_indexes: &[usize]) -> Vec<Vec<SqlValue>> {
    let mut seen: HashMap<Vec<SqlValue>, usize> = HashMap::new();
    let mut out: Vec<Vec<SqlValue>> = Vec::with_capacity(rows.len());
    for row in rows {
        let key: Vec<SqlValue> = key_indexes.iter().map(|i| row[*i].clone()).collect();
        match seen.get(&key) {
            Some(pos) => out[*pos] = row,
            None => {
                seen.insert(key, out.len());
                out.push(row);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::ColumnType;
    use sqlident::{quote_columns, SchemaWhitelist};

    fn target() -> SafeTable {
        SafeTable::parse("workspace.zip3_population", "workspace", &SchemaWhitelist::default())
            .unwrap()
    }

    #[test]
    fn truncate_count_and_lock_statements() {
        let table = target();
        assert_eq!(
            truncate_statement(&table),
            "TRUNCATE TABLE \"workspace\".\"zip3_population\""
        );
        assert_eq!(
            count_statement(&table),
            "SELECT COUNT(*) FROM \"workspace\".\"zip3_population\""
        );
        let lock = advisory_lock_statement(&table);
        assert!(lock.starts_with("SELECT pg_advisory_xact_lock("));
        assert!(lock.ends_with(')'));
    }

    #[test]
    fn lock_key_is_stable_and_target_specific() {
        assert_eq!(
            advisory_lock_key("workspace.zip3_population"),
            advisory_lock_key("workspace.zip3_population")
        );
        assert_ne!(
            advisory_lock_key("workspace.zip3_population"),
            advisory_lock_key("reference.zip3_population")
        );
    }

    #[test]
    fn plain_insert_numbers_placeholders_row_major() {
        let table = target();
        let cols = quote_columns(&["zip3", "pop"]).unwrap();
        let sql = insert_statement(&table, &cols, 2, None);
        assert_eq!(
            sql,
            "INSERT INTO \"workspace\".\"zip3_population\" (\"zip3\", \"pop\") \
             VALUES ($1, $2), ($3, $4)"
        );
    }

    #[test]
    fn upsert_updates_non_key_columns_from_excluded() {
        let table = target();
        let cols = quote_columns(&["zip3", "pop"]).unwrap();
        let key = quote_columns(&["zip3"]).unwrap();
        let sql = insert_statement(&table, &cols, 1, Some(&key));
        assert_eq!(
            sql,
            "INSERT INTO \"workspace\".\"zip3_population\" (\"zip3\", \"pop\") \
             VALUES ($1, $2) ON CONFLICT (\"zip3\") DO UPDATE SET \"pop\" = EXCLUDED.\"pop\""
        );
    }

    #[test]
    fn upsert_with_all_key_columns_does_nothing_on_conflict() {
        let table = target();
        let cols = quote_columns(&["zip3"]).unwrap();
        let key = quote_columns(&["zip3"]).unwrap();
        let sql = insert_statement(&table, &cols, 1, Some(&key));
        assert!(sql.ends_with("ON CONFLICT (\"zip3\") DO NOTHING"));
    }

    #[test]
    fn chunk_size_respects_param_limit() {
        assert_eq!(rows_per_chunk(2), MAX_BIND_PARAMS / 2);
        assert_eq!(rows_per_chunk(MAX_BIND_PARAMS * 2), 1);
        assert_eq!(rows_per_chunk(0), 1);
    }

    #[test]
    fn key_indexes_resolve_in_column_order() {
        let columns = vec![
            ColumnSpec::new("zip3", ColumnType::Text),
            ColumnSpec::new("state", ColumnType::Text),
            ColumnSpec::new("pop", ColumnType::Int),
        ];
        let keys = vec!["pop".to_string(), "zip3".to_string()];
        assert_eq!(key_indexes(&columns, &keys), Some(vec![2, 0]));
        assert_eq!(key_indexes(&columns, &["missing".to_string()]), None);
    }

    #[test]
    fn dedupe_keeps_last_occurrence_in_first_position() {
        let rows = vec![
            vec![SqlValue::Text("100".into()), SqlValue::Int(100)],
            vec![SqlValue::Text("200".into()), SqlValue::Int(50)],
            vec![SqlValue::Text("100".into()), SqlValue::Int(200)],
        ];
        let deduped = dedupe_last_wins(rows, &[0]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0][1], SqlValue::Int(200));
        assert_eq!(deduped[1][0], SqlValue::Text("200".into()));
    }
}
