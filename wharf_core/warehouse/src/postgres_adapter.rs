use crate::{SqlExecutor, WarehouseClient, WarehouseError, WarehouseTransaction};
use bytes::BytesMut;
use common::config::components::connections::AdapterConnectionDetails;
use common::types::SqlValue;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Transaction};

/// Synchronous Postgres connection. One run equals one blocking
/// transaction on this client.
pub struct PostgresWarehouse {
    client: Client,
}

pub fn connect(details: &AdapterConnectionDetails) -> Result<PostgresWarehouse, WarehouseError> {
    let port: u16 = details
        .port
        .parse()
        .map_err(|_| WarehouseError::invalid_connection(format!("bad port '{}'", details.port)))?;
    let conn_str = format!(
        "host={} port={} user={} password={} dbname={}",
        details.host, port, details.user, details.password, details.database
    );
    let client = Client::connect(&conn_str, NoTls)
        .map_err(|e| WarehouseError::invalid_connection(e.to_string()))?;
    log::info!(
        "connected to warehouse {}@{}:{}/{}",
        details.user,
        details.host,
        port,
        details.database
    );
    Ok(PostgresWarehouse { client })
}

impl WarehouseClient for PostgresWarehouse {
    type Transaction<'a>
        = PgTransaction<'a>
    where
        Self: 'a;

    fn transaction(&mut self) -> Result<PgTransaction<'_>, WarehouseError> {
        Ok(PgTransaction(self.client.transaction()?))
    }
}

/// Wrapper so a dropped transaction rolls back via the driver's own
/// drop semantics.
pub struct PgTransaction<'a>(Transaction<'a>);

impl SqlExecutor for PgTransaction<'_> {
    fn batch_execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        Ok(self.0.batch_execute(sql)?)
    }

    fn execute_params(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, WarehouseError> {
        let bound: Vec<PgValue<'_>> = params.iter().map(PgValue).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            bound.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        Ok(self.0.execute(sql, &refs)?)
    }

    fn query_count(&mut self, sql: &str) -> Result<i64, WarehouseError> {
        let row = self.0.query_one(sql, &[])?;
        row.try_get::<_, i64>(0)
            .map_err(|e| WarehouseError::unexpected(format!("count query returned no i64: {e}")))
    }
}

impl WarehouseTransaction for PgTransaction<'_> {
    fn commit(self) -> Result<(), WarehouseError> {
        Ok(self.0.commit()?)
    }
}

/// Binds a [`SqlValue`] through the driver's native encodings.
struct PgValue<'a>(&'a SqlValue);

impl std::fmt::Debug for PgValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl ToSql for PgValue<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Text(v) => v.to_sql(ty, out),
            SqlValue::Int(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::Date(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The target column types come from validated ColumnSpecs; let the
        // inner encodings fail loudly on a genuine mismatch.
        true
    }

    to_sql_checked!();
}
