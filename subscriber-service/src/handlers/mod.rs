pub mod addons;
pub mod billing;
pub mod customers;
pub mod dashboard;
pub mod odps;
pub mod routers;
