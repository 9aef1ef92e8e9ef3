//! Domain models for subscriber-service.

mod addon;
mod customer;
mod odp;
mod router;
mod router_command;
mod summary;
mod transaction;

pub use addon::{AddonItem, AddonState, AddonType, CreateAddon, UpdateAddon};
pub use customer::{
    BillingStatus, CreateCustomer, Customer, InstallationStatus, MikrotikStatus, ServiceStatus,
    UpdateCustomer,
};
pub use odp::{CreateOdp, Odp};
pub use router::{CreateRouter, Router};
pub use router_command::{CommandStatus, RouterCommand};
pub use summary::DashboardSummary;
pub use transaction::{
    AddonLine, BillBreakdown, BillTransaction, CreateBill, PackageLine, TransactionStatus,
};
