// database/schema.rs - SchemaProvisioner
// Creates the tenant's isolated namespace inside the region database

use tracing::info;

use crate::database::error::DatabaseError;
use crate::database::pg::quote_identifier;
use crate::database::registry::TenantDatabase;
use crate::types::TenantPrefix;

/// Issue `CREATE SCHEMA "<prefix>"`.
///
/// Not idempotent: an already existing schema surfaces as an error from the
/// database. Callers run this once per tenant, guarded by the immutable
/// `db_schema` of its configuration detail.
pub async fn create_schema(db: &dyn TenantDatabase, prefix: &TenantPrefix) -> Result<(), DatabaseError> {
    let ddl = create_schema_ddl(prefix)?;
    db.execute(&ddl).await?;

    info!("Created schema {}", prefix);
    Ok(())
}

pub fn create_schema_ddl(prefix: &TenantPrefix) -> Result<String, DatabaseError> {
    // The prefix is interpolated into DDL; re-check the grammar here
    if !TenantPrefix::is_valid(prefix.as_str()) {
        return Err(DatabaseError::InvalidSchemaName(prefix.to_string()));
    }
    Ok(format!("CREATE SCHEMA {}", quote_identifier(prefix.as_str())))
}
