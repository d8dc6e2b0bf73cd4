pub mod config_detail;
pub mod groups;
pub mod region;
pub mod tenant;

pub use config_detail::{NewTenantConfigDetail, TenantConfigDetail};
pub use groups::*;
pub use region::{Region, RegionInput};
pub use tenant::{Tenant, TenantIdentity, TenantStatus};
