pub mod region;
pub mod tenant;
pub mod vault;
