//! Router inventory model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A MikroTik router serving an area. Customers reference routers by name
/// when their PPP secret is disabled on suspension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Router {
    pub router_id: Uuid,
    pub name: String,
    pub ip_address: String,
    pub area: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for registering a router.
#[derive(Debug, Clone)]
pub struct CreateRouter {
    pub name: String,
    pub ip_address: String,
    pub area: Option<String>,
}
