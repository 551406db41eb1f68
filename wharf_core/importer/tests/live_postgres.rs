//! Full-workflow tests against a live PostgreSQL instance. The connection
//! can be configured with `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASS` and
//! `PG_DB`; when not set, the defaults from `docker-compose.yml` are used.
//!
//! Run with `cargo test -- --ignored`.

use common::config::components::connections::{AdapterConnectionDetails, DatabaseAdapterType};
use common::types::ErrorPolicy;
use importer::{ImportService, PipelineError, TransformationService};
use ledger::{MemoryLedger, RunStatus};
use postgres::{Client, NoTls};
use sqlident::SchemaWhitelist;
use std::sync::Mutex;
use test_utils::zip3_integration;

static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn connection_details() -> AdapterConnectionDetails {
    let host = std::env::var("PG_HOST").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("PG_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("PG_USER").unwrap_or_else(|_| "postgres".into());
    let pass = std::env::var("PG_PASS").unwrap_or_else(|_| "password".into());
    let db = std::env::var("PG_DB").unwrap_or_else(|_| "wharf_dev".into());
    AdapterConnectionDetails::new(&host, &user, &db, &pass, &port, DatabaseAdapterType::Postgres)
}

fn raw_client(details: &AdapterConnectionDetails) -> Result<Client, postgres::Error> {
    let conn_str = format!(
        "host={} port={} user={} password={} dbname={}",
        details.host, details.port, details.user, details.password, details.database
    );
    Client::connect(&conn_str, NoTls)
}

fn reset_schemas(client: &mut Client) -> Result<(), postgres::Error> {
    client.batch_execute(
        "DROP SCHEMA IF EXISTS workspace CASCADE;
         DROP SCHEMA IF EXISTS reference CASCADE;
         CREATE SCHEMA workspace;
         CREATE SCHEMA reference;
         CREATE TABLE workspace.zip3_population (
             zip3 TEXT,
             state TEXT,
             population BIGINT
         );
         CREATE UNIQUE INDEX ON workspace.zip3_population (zip3);
         CREATE TABLE reference.carrier_rollup (
             carrier TEXT,
             shipment_count BIGINT
         );
         CREATE TABLE workspace.shipments (carrier TEXT, weight BIGINT);
         INSERT INTO workspace.shipments VALUES
             ('ups', 10), ('ups', 12), ('fedex', 7);",
    )
}

fn rows(raw: &[(&str, &str, &str)]) -> Vec<Vec<String>> {
    raw.iter()
        .map(|(a, b, c)| vec![a.to_string(), b.to_string(), c.to_string()])
        .collect()
}

#[test]
#[ignore]
fn import_is_idempotent_and_counts_match() -> Result<(), Box<dyn std::error::Error>> {
    let _lock = TEST_MUTEX.lock().unwrap();
    let details = connection_details();
    let mut verify = raw_client(&details)?;
    reset_schemas(&mut verify)?;

    let ledger = MemoryLedger::new();
    let service = ImportService::new(ledger.clone(), SchemaWhitelist::default(), ErrorPolicy::default());
    let mut client = warehouse::connect(&details)?;

    let batch = rows(&[("945", "CA", "120000"), ("946", "CA", "98000")]);
    let first = service.run(&mut client, &zip3_integration(false), &batch)?;
    let second = service.run(&mut client, &zip3_integration(false), &batch)?;
    assert_eq!(first.rows_processed, 2);
    assert_eq!(second.rows_processed, 2);

    let count: i64 = verify
        .query_one("SELECT COUNT(*) FROM workspace.zip3_population", &[])?
        .get(0);
    assert_eq!(count, first.rows_processed);
    Ok(())
}

#[test]
#[ignore]
fn upsert_resolves_duplicate_keys_last_wins() -> Result<(), Box<dyn std::error::Error>> {
    let _lock = TEST_MUTEX.lock().unwrap();
    let details = connection_details();
    let mut verify = raw_client(&details)?;
    reset_schemas(&mut verify)?;

    let ledger = MemoryLedger::new();
    let service = ImportService::new(ledger, SchemaWhitelist::default(), ErrorPolicy::default());
    let mut client = warehouse::connect(&details)?;

    let batch = rows(&[("945", "CA", "100"), ("945", "CA", "200")]);
    let result = service.run(&mut client, &zip3_integration(true), &batch)?;
    assert_eq!(result.rows_processed, 1);

    let population: i64 = verify
        .query_one(
            "SELECT population FROM workspace.zip3_population WHERE zip3 = '945'",
            &[],
        )?
        .get(0);
    assert_eq!(population, 200);
    Ok(())
}

#[test]
#[ignore]
fn failed_import_leaves_prior_contents_intact() -> Result<(), Box<dyn std::error::Error>> {
    let _lock = TEST_MUTEX.lock().unwrap();
    let details = connection_details();
    let mut verify = raw_client(&details)?;
    reset_schemas(&mut verify)?;
    verify.batch_execute(
        "INSERT INTO workspace.zip3_population VALUES ('900', 'CA', 55000)",
    )?;

    let ledger = MemoryLedger::new();
    let service = ImportService::new(ledger.clone(), SchemaWhitelist::default(), ErrorPolicy::default());
    let mut client = warehouse::connect(&details)?;

    // Two batch rows share zip3 '945' after dedup is bypassed: no unique
    // key is configured, so the unique index on the live table fires
    // mid-transaction.
    let batch = rows(&[("945", "CA", "100"), ("945", "CA", "200")]);
    let err = service
        .run(&mut client, &zip3_integration(false), &batch)
        .expect_err("unique index must reject the load");
    assert!(matches!(err, PipelineError::Database(_)));

    let count: i64 = verify
        .query_one("SELECT COUNT(*) FROM workspace.zip3_population", &[])?
        .get(0);
    assert_eq!(count, 1, "pre-run contents must survive the rollback");

    let record = &ledger.list(None)[0];
    assert_eq!(record.status, RunStatus::Failed);
    Ok(())
}

#[test]
#[ignore]
fn transformation_rolls_up_and_enforces_row_floor() -> Result<(), Box<dyn std::error::Error>> {
    let _lock = TEST_MUTEX.lock().unwrap();
    let details = connection_details();
    let mut verify = raw_client(&details)?;
    reset_schemas(&mut verify)?;

    let ledger = MemoryLedger::new();
    let service = TransformationService::new(ledger, SchemaWhitelist::default());
    let mut client = warehouse::connect(&details)?;

    let result = service.run(
        &mut client,
        &test_utils::carrier_rollup_transformation(None),
    )?;
    assert_eq!(result.rows_processed, 2); // ups + fedex

    let err = service
        .run(
            &mut client,
            &test_utils::carrier_rollup_transformation(Some(1000)),
        )
        .expect_err("floor of 1000 cannot be met");
    assert!(matches!(err, PipelineError::RowCountMismatch { .. }));

    // The failed run rolled back; the first run's output is still there.
    let count: i64 = verify
        .query_one("SELECT COUNT(*) FROM reference.carrier_rollup", &[])?
        .get(0);
    assert_eq!(count, 2);
    Ok(())
}
