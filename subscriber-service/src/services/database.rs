//! Database service for subscriber-service.
//!
//! All slot-ledger mutations run inside a single transaction with row
//! locks on the ODP, so concurrent attaches cannot overcommit capacity.

use crate::models::{
    AddonItem, AddonState, BillTransaction, BillingStatus, CommandStatus, CreateAddon, CreateBill,
    CreateCustomer, CreateOdp, CreateRouter, Customer, DashboardSummary, MikrotikStatus, Odp,
    Router, RouterCommand, UpdateAddon, UpdateCustomer,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const CUSTOMER_COLUMNS: &str = "customer_id, customer_number, name, address, phone, package_name, package_price, discount, active_date, active_period, active_period_unit, is_pro_rata_applied, pro_rata_amount, status, billing_status, service_status, installation_status, odp_id, router_name, ppp_secret, mikrotik_status, last_billing_date, next_billing_date, last_suspend_date, created_utc, updated_utc";

const ODP_COLUMNS: &str =
    "odp_id, name, location, area, total_slots, used_slots, available_slots, created_utc, updated_utc";

const TRANSACTION_COLUMNS: &str =
    "transaction_id, customer_id, kind, amount, description, status, due_date, breakdown, created_utc";

const ADDON_COLUMNS: &str = "addon_id, customer_id, item_name, item_type, price, quantity, is_paid, state, description, created_utc, updated_utc";

const COMMAND_COLUMNS: &str = "command_id, customer_id, action, router_name, secret_name, status, attempts, last_error, created_utc, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscriber-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // ODP Operations
    // =========================================================================

    /// Create a new distribution point with all slots available.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_odp(&self, input: &CreateOdp) -> Result<Odp, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_odp"])
            .start_timer();

        let odp_id = Uuid::new_v4();
        let odp = sqlx::query_as::<_, Odp>(&format!(
            r#"
            INSERT INTO odps (odp_id, name, location, area, total_slots, used_slots, available_slots)
            VALUES ($1, $2, $3, $4, $5, 0, $5)
            RETURNING {ODP_COLUMNS}
            "#,
        ))
        .bind(odp_id)
        .bind(&input.name)
        .bind(&input.location)
        .bind(&input.area)
        .bind(input.total_slots)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create ODP: {}", e)))?;

        timer.observe_duration();
        info!(odp_id = %odp.odp_id, total_slots = odp.total_slots, "ODP created");

        Ok(odp)
    }

    /// Get a distribution point by ID.
    #[instrument(skip(self), fields(odp_id = %odp_id))]
    pub async fn get_odp(&self, odp_id: Uuid) -> Result<Option<Odp>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_odp"])
            .start_timer();

        let odp = sqlx::query_as::<_, Odp>(&format!(
            "SELECT {ODP_COLUMNS} FROM odps WHERE odp_id = $1"
        ))
        .bind(odp_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get ODP: {}", e)))?;

        timer.observe_duration();

        Ok(odp)
    }

    /// List all distribution points.
    #[instrument(skip(self))]
    pub async fn list_odps(&self) -> Result<Vec<Odp>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_odps"])
            .start_timer();

        let odps = sqlx::query_as::<_, Odp>(&format!(
            "SELECT {ODP_COLUMNS} FROM odps ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list ODPs: {}", e)))?;

        timer.observe_duration();

        Ok(odps)
    }

    // =========================================================================
    // Router Inventory Operations
    // =========================================================================

    /// Register a router.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_router(&self, input: &CreateRouter) -> Result<Router, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_router"])
            .start_timer();

        let router_id = Uuid::new_v4();
        let router = sqlx::query_as::<_, Router>(
            r#"
            INSERT INTO routers (router_id, name, ip_address, area)
            VALUES ($1, $2, $3, $4)
            RETURNING router_id, name, ip_address, area, created_utc, updated_utc
            "#,
        )
        .bind(router_id)
        .bind(&input.name)
        .bind(&input.ip_address)
        .bind(&input.area)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Router name already registered"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create router: {}", e)),
        })?;

        timer.observe_duration();
        info!(router_id = %router.router_id, name = %router.name, "Router registered");

        Ok(router)
    }

    /// List all routers.
    #[instrument(skip(self))]
    pub async fn list_routers(&self) -> Result<Vec<Router>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_routers"])
            .start_timer();

        let routers = sqlx::query_as::<_, Router>(
            "SELECT router_id, name, ip_address, area, created_utc, updated_utc FROM routers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list routers: {}", e)))?;

        timer.observe_duration();

        Ok(routers)
    }

    /// Look up a router by its inventory name.
    #[instrument(skip(self))]
    pub async fn get_router_by_name(&self, name: &str) -> Result<Option<Router>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_router_by_name"])
            .start_timer();

        let router = sqlx::query_as::<_, Router>(
            "SELECT router_id, name, ip_address, area, created_utc, updated_utc FROM routers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get router: {}", e)))?;

        timer.observe_duration();

        Ok(router)
    }

    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Create a new customer. When an ODP is requested, the slot is
    /// reserved in the same transaction as the insert.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_customer"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if let Some(odp_id) = input.odp_id {
            reserve_slot(&mut tx, odp_id).await?;
        }

        let seq: i64 = sqlx::query_scalar("SELECT nextval('customer_number_seq')")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to allocate customer number: {}", e))
            })?;
        let customer_number = format!("LTS{:04}", seq);

        let customer_id = Uuid::new_v4();
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (customer_id, customer_number, name, address, phone, package_name, package_price, discount, active_date, active_period, active_period_unit, installation_status, odp_id, router_name, ppp_secret)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(&customer_number)
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.package_name)
        .bind(input.package_price)
        .bind(input.discount)
        .bind(input.active_date)
        .bind(input.active_period)
        .bind(&input.active_period_unit)
        .bind(input.installation_status.as_str())
        .bind(input.odp_id)
        .bind(&input.router_name)
        .bind(&input.ppp_secret)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            customer_id = %customer.customer_id,
            customer_number = %customer.customer_number,
            "Customer created"
        );

        Ok(customer)
    }

    /// Get a customer by ID.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_customer"])
            .start_timer();

        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// List all customers, newest first.
    #[instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_utc DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list customers: {}", e)))?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Update a customer's subscription fields. ODP changes go through the
    /// attach/move/detach operations instead.
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_customer"])
            .start_timer();

        let service_status = input.service_status.map(|s| s.as_str().to_string());
        let installation_status = input.installation_status.map(|s| s.as_str().to_string());

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                package_name = COALESCE($5, package_name),
                package_price = COALESCE($6, package_price),
                discount = COALESCE($7, discount),
                active_date = COALESCE($8, active_date),
                service_status = COALESCE($9, service_status),
                installation_status = COALESCE($10, installation_status),
                router_name = COALESCE($11, router_name),
                ppp_secret = COALESCE($12, ppp_secret),
                updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.package_name)
        .bind(input.package_price)
        .bind(input.discount)
        .bind(input.active_date)
        .bind(service_status)
        .bind(installation_status)
        .bind(&input.router_name)
        .bind(&input.ppp_secret)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update customer: {}", e)))?;

        timer.observe_duration();

        Ok(customer)
    }

    /// Delete a customer, returning any held ODP slot in the same
    /// transaction.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_customer"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let odp_id: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT odp_id FROM customers WHERE customer_id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e))
                })?;

        let odp_id = match odp_id {
            Some(odp_id) => odp_id,
            None => return Err(AppError::NotFound(anyhow::anyhow!("Customer not found"))),
        };

        if let Some(odp_id) = odp_id {
            release_slot(&mut tx, odp_id).await?;
        }

        sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete customer: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(customer_id = %customer_id, "Customer deleted");

        Ok(())
    }

    // =========================================================================
    // Slot Ledger Operations
    // =========================================================================

    /// Attach a customer to a distribution point, consuming one slot.
    #[instrument(skip(self), fields(customer_id = %customer_id, odp_id = %odp_id))]
    pub async fn attach_customer_to_odp(
        &self,
        customer_id: Uuid,
        odp_id: Uuid,
    ) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_customer_to_odp"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let current: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT odp_id FROM customers WHERE customer_id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e))
                })?;

        match current {
            None => return Err(AppError::NotFound(anyhow::anyhow!("Customer not found"))),
            Some(Some(_)) => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Customer already attached to an ODP"
                )))
            }
            Some(None) => {}
        }

        reserve_slot(&mut tx, odp_id).await?;

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers SET odp_id = $2, updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(odp_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to attach customer: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(customer_id = %customer_id, odp_id = %odp_id, "Customer attached to ODP");

        Ok(customer)
    }

    /// Detach a customer from its distribution point, returning the slot.
    /// No-op when the customer has no ODP.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn detach_customer_from_odp(&self, customer_id: Uuid) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["detach_customer_from_odp"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let current: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT odp_id FROM customers WHERE customer_id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e))
                })?;

        let odp_id = match current {
            None => return Err(AppError::NotFound(anyhow::anyhow!("Customer not found"))),
            Some(odp_id) => odp_id,
        };

        if let Some(odp_id) = odp_id {
            release_slot(&mut tx, odp_id).await?;
        }

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers SET odp_id = NULL, updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to detach customer: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(customer_id = %customer_id, "Customer detached from ODP");

        Ok(customer)
    }

    /// Move a customer to another distribution point. Detach-then-attach
    /// in one transaction: when the new ODP is full, the whole operation
    /// rolls back and the old attachment stands.
    #[instrument(skip(self), fields(customer_id = %customer_id, new_odp_id = %new_odp_id))]
    pub async fn move_customer_odp(
        &self,
        customer_id: Uuid,
        new_odp_id: Uuid,
    ) -> Result<Customer, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["move_customer_odp"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let current: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT odp_id FROM customers WHERE customer_id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e))
                })?;

        let old_odp_id = match current {
            None => return Err(AppError::NotFound(anyhow::anyhow!("Customer not found"))),
            Some(odp_id) => odp_id,
        };

        if old_odp_id == Some(new_odp_id) {
            tx.rollback().await.ok();
            return self
                .get_customer(customer_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")));
        }

        // Lock both ODP rows in a stable order to avoid deadlock between
        // concurrent moves in opposite directions.
        let mut lock_ids: Vec<Uuid> = old_odp_id.into_iter().chain([new_odp_id]).collect();
        lock_ids.sort();
        sqlx::query("SELECT odp_id FROM odps WHERE odp_id = ANY($1) ORDER BY odp_id FOR UPDATE")
            .bind(&lock_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock ODPs: {}", e)))?;

        if let Some(old_odp_id) = old_odp_id {
            release_slot(&mut tx, old_odp_id).await?;
        }
        reserve_slot(&mut tx, new_odp_id).await?;

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers SET odp_id = $2, updated_utc = NOW()
            WHERE customer_id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(new_odp_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to move customer: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            customer_id = %customer_id,
            old_odp_id = ?old_odp_id,
            new_odp_id = %new_odp_id,
            "Customer moved between ODPs"
        );

        Ok(customer)
    }

    // =========================================================================
    // Add-on Operations
    // =========================================================================

    /// Create a billable add-on for a customer.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_addon(&self, input: &CreateAddon) -> Result<AddonItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_addon"])
            .start_timer();

        let addon_id = Uuid::new_v4();
        let addon = sqlx::query_as::<_, AddonItem>(&format!(
            r#"
            INSERT INTO addon_items (addon_id, customer_id, item_name, item_type, price, quantity, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ADDON_COLUMNS}
            "#,
        ))
        .bind(addon_id)
        .bind(input.customer_id)
        .bind(&input.item_name)
        .bind(input.item_type.as_str())
        .bind(input.price)
        .bind(input.quantity)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("Customer not found"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create add-on: {}", e)),
        })?;

        timer.observe_duration();
        info!(addon_id = %addon.addon_id, item_name = %addon.item_name, "Add-on created");

        Ok(addon)
    }

    /// List a customer's active add-ons.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_customer_addons(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<AddonItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customer_addons"])
            .start_timer();

        let addons = sqlx::query_as::<_, AddonItem>(&format!(
            r#"
            SELECT {ADDON_COLUMNS}
            FROM addon_items
            WHERE customer_id = $1 AND state = $2
            ORDER BY created_utc
            "#,
        ))
        .bind(customer_id)
        .bind(AddonState::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list add-ons: {}", e)))?;

        timer.observe_duration();

        Ok(addons)
    }

    /// Update an add-on's mutable fields.
    #[instrument(skip(self, input), fields(addon_id = %addon_id))]
    pub async fn update_addon(
        &self,
        addon_id: Uuid,
        input: &UpdateAddon,
    ) -> Result<Option<AddonItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_addon"])
            .start_timer();

        let addon = sqlx::query_as::<_, AddonItem>(&format!(
            r#"
            UPDATE addon_items
            SET item_name = COALESCE($2, item_name),
                price = COALESCE($3, price),
                quantity = COALESCE($4, quantity),
                description = COALESCE($5, description),
                updated_utc = NOW()
            WHERE addon_id = $1 AND state = 'active'
            RETURNING {ADDON_COLUMNS}
            "#,
        ))
        .bind(addon_id)
        .bind(&input.item_name)
        .bind(input.price)
        .bind(input.quantity)
        .bind(&input.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update add-on: {}", e)))?;

        timer.observe_duration();

        Ok(addon)
    }

    /// Deactivate an add-on. The row is kept for billing history.
    #[instrument(skip(self), fields(addon_id = %addon_id))]
    pub async fn deactivate_addon(&self, addon_id: Uuid) -> Result<Option<AddonItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_addon"])
            .start_timer();

        let addon = sqlx::query_as::<_, AddonItem>(&format!(
            r#"
            UPDATE addon_items
            SET state = $2, updated_utc = NOW()
            WHERE addon_id = $1 AND state = 'active'
            RETURNING {ADDON_COLUMNS}
            "#,
        ))
        .bind(addon_id)
        .bind(AddonState::Deactivated.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate add-on: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref a) = addon {
            info!(addon_id = %a.addon_id, "Add-on deactivated");
        }

        Ok(addon)
    }

    // =========================================================================
    // Billing Operations
    // =========================================================================

    /// Customers eligible for the monthly billing cycle.
    #[instrument(skip(self))]
    pub async fn list_billable_customers(&self) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_billable_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE status = 'active' AND service_status = 'active'
            ORDER BY customer_number
            "#,
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list billable customers: {}", e))
        })?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Whether a bill already exists for this customer in the current
    /// calendar month.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn bill_exists_since(
        &self,
        customer_id: Uuid,
        month_start_utc: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bill_exists_since"])
            .start_timer();

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE customer_id = $1 AND kind = 'bill' AND created_utc >= $2
            )
            "#,
        )
        .bind(customer_id)
        .bind(month_start_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check existing bill: {}", e))
        })?;

        timer.observe_duration();

        Ok(exists)
    }

    /// Persist a computed monthly bill. All effects land in one
    /// transaction: the idempotence re-check, the transaction insert,
    /// one-time add-ons marked paid, the pro-rata flag, and the customer's
    /// billing fields. Fails with `Conflict` when a bill for the month
    /// already exists.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn persist_bill(&self, input: &CreateBill) -> Result<BillTransaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["persist_bill"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Lock the customer row so concurrent billing runs serialize
        // per-customer, then re-check the month guard under the lock.
        sqlx::query("SELECT customer_id FROM customers WHERE customer_id = $1 FOR UPDATE")
            .bind(input.customer_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock customer: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE customer_id = $1 AND kind = 'bill' AND created_utc >= $2
            )
            "#,
        )
        .bind(input.customer_id)
        .bind(input.month_start_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check existing bill: {}", e))
        })?;

        if exists {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Bill already generated for this month"
            )));
        }

        let transaction_id = Uuid::new_v4();
        let bill = sqlx::query_as::<_, BillTransaction>(&format!(
            r#"
            INSERT INTO transactions (transaction_id, customer_id, kind, amount, description, status, due_date, breakdown)
            VALUES ($1, $2, 'bill', $3, $4, 'pending', $5, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(transaction_id)
        .bind(input.customer_id)
        .bind(input.amount)
        .bind(&input.description)
        .bind(input.due_date)
        .bind(&input.breakdown)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create bill: {}", e)))?;

        if !input.paid_addon_ids.is_empty() {
            sqlx::query(
                "UPDATE addon_items SET is_paid = TRUE, updated_utc = NOW() WHERE addon_id = ANY($1)",
            )
            .bind(&input.paid_addon_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to mark add-ons paid: {}", e))
            })?;
        }

        sqlx::query(
            r#"
            UPDATE customers
            SET is_pro_rata_applied = CASE WHEN $2::numeric IS NULL THEN is_pro_rata_applied ELSE TRUE END,
                pro_rata_amount = COALESCE($2, pro_rata_amount),
                last_billing_date = $3,
                next_billing_date = $4,
                billing_status = $5,
                updated_utc = NOW()
            WHERE customer_id = $1
            "#,
        )
        .bind(input.customer_id)
        .bind(input.pro_rata_amount)
        .bind(input.last_billing_date)
        .bind(input.next_billing_date)
        .bind(BillingStatus::BelumLunas.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update customer billing: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            transaction_id = %bill.transaction_id,
            customer_id = %bill.customer_id,
            amount = %bill.amount,
            "Monthly bill created"
        );

        Ok(bill)
    }

    /// List a customer's transactions, newest first.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_customer_transactions(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<BillTransaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_customer_transactions"])
            .start_timer();

        let transactions = sqlx::query_as::<_, BillTransaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE customer_id = $1
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(transactions)
    }

    // =========================================================================
    // Suspension Operations
    // =========================================================================

    /// Unpaid active customers holding a pending bill due strictly before
    /// `today`.
    #[instrument(skip(self))]
    pub async fn list_overdue_customers(&self, today: NaiveDate) -> Result<Vec<Customer>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_overdue_customers"])
            .start_timer();

        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT DISTINCT c.customer_id, c.customer_number, c.name, c.address, c.phone, c.package_name, c.package_price, c.discount, c.active_date, c.active_period, c.active_period_unit, c.is_pro_rata_applied, c.pro_rata_amount, c.status, c.billing_status, c.service_status, c.installation_status, c.odp_id, c.router_name, c.ppp_secret, c.mikrotik_status, c.last_billing_date, c.next_billing_date, c.last_suspend_date, c.created_utc, c.updated_utc
            FROM customers c
            JOIN transactions t ON t.customer_id = c.customer_id
            WHERE c.billing_status = $1
              AND c.service_status = 'active'
              AND t.kind = 'bill'
              AND t.status = 'pending'
              AND t.due_date < $2
            "#,
        ))
        .bind(BillingStatus::BelumLunas.as_str())
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list overdue customers: {}", e))
        })?;

        timer.observe_duration();

        Ok(customers)
    }

    /// Suspend an overdue customer. One transaction sets the billing
    /// status (guarded: only reachable from `belum_lunas`), marks the PPP
    /// secret disabled, and records the intended router command. The
    /// external call happens after commit.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn suspend_customer(
        &self,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Customer, Option<RouterCommand>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["suspend_customer"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET billing_status = $2, mikrotik_status = $3, last_suspend_date = $4, updated_utc = NOW()
            WHERE customer_id = $1 AND billing_status = $5
            RETURNING {CUSTOMER_COLUMNS}
            "#,
        ))
        .bind(customer_id)
        .bind(BillingStatus::Suspend.as_str())
        .bind(MikrotikStatus::Disabled.as_str())
        .bind(now)
        .bind(BillingStatus::BelumLunas.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to suspend customer: {}", e))
        })?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Customer is not in belum_lunas status, refusing to suspend"
            ))
        })?;

        let command = match (&customer.router_name, &customer.ppp_secret) {
            (Some(router_name), Some(ppp_secret)) => {
                let command_id = Uuid::new_v4();
                let command = sqlx::query_as::<_, RouterCommand>(&format!(
                    r#"
                    INSERT INTO router_commands (command_id, customer_id, action, router_name, secret_name)
                    VALUES ($1, $2, 'disable_ppp_secret', $3, $4)
                    RETURNING {COMMAND_COLUMNS}
                    "#,
                ))
                .bind(command_id)
                .bind(customer_id)
                .bind(router_name)
                .bind(ppp_secret)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to record router command: {}", e))
                })?;
                Some(command)
            }
            _ => None,
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(customer_id = %customer_id, "Customer suspended");

        Ok((customer, command))
    }

    /// Record the outcome of a router command delivery attempt.
    #[instrument(skip(self, error), fields(command_id = %command_id))]
    pub async fn mark_command_result(
        &self,
        command_id: Uuid,
        error: Option<&str>,
    ) -> Result<Option<RouterCommand>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_command_result"])
            .start_timer();

        let status = if error.is_none() {
            CommandStatus::Confirmed
        } else {
            CommandStatus::Failed
        };

        let command = sqlx::query_as::<_, RouterCommand>(&format!(
            r#"
            UPDATE router_commands
            SET status = $2, attempts = attempts + 1, last_error = $3, updated_utc = NOW()
            WHERE command_id = $1
            RETURNING {COMMAND_COLUMNS}
            "#,
        ))
        .bind(command_id)
        .bind(status.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update router command: {}", e))
        })?;

        timer.observe_duration();

        Ok(command)
    }

    /// Router commands still awaiting successful delivery.
    #[instrument(skip(self))]
    pub async fn list_unconfirmed_commands(&self) -> Result<Vec<RouterCommand>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_unconfirmed_commands"])
            .start_timer();

        let commands = sqlx::query_as::<_, RouterCommand>(&format!(
            r#"
            SELECT {COMMAND_COLUMNS}
            FROM router_commands
            WHERE status IN ('pending', 'failed')
            ORDER BY created_utc
            "#,
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list router commands: {}", e))
        })?;

        timer.observe_duration();

        Ok(commands)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Aggregate counts for the dashboard.
    #[instrument(skip(self))]
    pub async fn dashboard_summary(
        &self,
        month_start_utc: DateTime<Utc>,
    ) -> Result<DashboardSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_summary"])
            .start_timer();

        let (total, active, unpaid, suspended): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE billing_status = 'lunas' AND service_status = 'active'),
                   COUNT(*) FILTER (WHERE billing_status = 'belum_lunas'),
                   COUNT(*) FILTER (WHERE billing_status = 'suspend')
            FROM customers
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count customers: {}", e))
        })?;

        let (pending_bills, billed_this_month): (i64, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'pending'),
                   SUM(amount) FILTER (WHERE created_utc >= $1)
            FROM transactions
            WHERE kind = 'bill'
            "#,
        )
        .bind(month_start_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate transactions: {}", e))
        })?;

        timer.observe_duration();

        Ok(DashboardSummary {
            total_customers: total,
            active_customers: active,
            unpaid_customers: unpaid,
            suspended_customers: suspended,
            pending_bills,
            billed_this_month: billed_this_month.unwrap_or(Decimal::ZERO),
        })
    }
}

/// Reserve one slot on an ODP inside an open transaction. The row lock
/// serializes concurrent attaches so two writers cannot both observe the
/// last free slot.
async fn reserve_slot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    odp_id: Uuid,
) -> Result<(), AppError> {
    let available: Option<i32> =
        sqlx::query_scalar("SELECT available_slots FROM odps WHERE odp_id = $1 FOR UPDATE")
            .bind(odp_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock ODP: {}", e)))?;

    let available = available.ok_or_else(|| AppError::NotFound(anyhow::anyhow!("ODP not found")))?;

    if available <= 0 {
        return Err(AppError::CapacityExceeded(anyhow::anyhow!(
            "ODP has no available slots"
        )));
    }

    sqlx::query(
        r#"
        UPDATE odps
        SET used_slots = used_slots + 1, available_slots = available_slots - 1, updated_utc = NOW()
        WHERE odp_id = $1
        "#,
    )
    .bind(odp_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to reserve slot: {}", e)))?;

    Ok(())
}

/// Return one slot to an ODP inside an open transaction. Counters are
/// clamped against drift from prior corruption; the transaction
/// discipline, not the clamp, is the correctness mechanism.
async fn release_slot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    odp_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE odps
        SET used_slots = GREATEST(used_slots - 1, 0),
            available_slots = LEAST(available_slots + 1, total_slots),
            updated_utc = NOW()
        WHERE odp_id = $1
        "#,
    )
    .bind(odp_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to release slot: {}", e)))?;

    Ok(())
}
