pub mod billing;
pub mod database;
pub mod metrics;
pub mod mikrotik;
