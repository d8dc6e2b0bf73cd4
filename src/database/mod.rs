pub mod error;
pub mod models;
pub mod pg;
pub mod registry;
pub mod schema;
pub mod store;

pub use error::DatabaseError;
pub use pg::{PgConnector, PgTenantDatabase};
pub use registry::{ConnectionError, ConnectionRegistry, DbHandle, TenantDatabase};
pub use store::{PgTenantStore, TenantStore};
