pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

pub use client::{EntitlementApi, HttpEntitlementApi};
pub use config::Config;
pub use error::{Error, FetchError, Result};
pub use service::{EntitlementService, Gate, GateCombinator, PermissionEvaluator, SubscriptionEvaluator};
