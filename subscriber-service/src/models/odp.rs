//! Optical distribution point (ODP) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A fiber distribution point with a fixed number of subscriber slots.
///
/// Invariant: `used_slots + available_slots == total_slots` and
/// `0 <= used_slots <= total_slots`. The counters are mutated only through
/// the attach/detach/move operations on customers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Odp {
    pub odp_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub area: Option<String>,
    pub total_slots: i32,
    pub used_slots: i32,
    pub available_slots: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an ODP.
#[derive(Debug, Clone)]
pub struct CreateOdp {
    pub name: String,
    pub location: Option<String>,
    pub area: Option<String>,
    pub total_slots: i32,
}
