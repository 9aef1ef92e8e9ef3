//! Subscriber management service: customer subscriptions, ODP fiber slot
//! allocation, monthly billing with pro-rata, and overdue suspension via
//! MikroTik router control.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application};
