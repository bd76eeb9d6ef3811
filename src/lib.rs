//! Waste-collection invoice reconciliation.
//!
//! Loads an invoice export, reprices every line against the bin tariff,
//! records discrepancies and summarises the result. The pipeline is
//! `loader` -> `evaluator` (via `validator`) -> `filter` -> `reports`, with
//! `state::AppState` owning the current dataset and selections.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod output;
pub mod reports;
pub mod state;
pub mod types;
pub mod util;
pub mod validator;

pub use config::{AggregateScope, BillingConfig, ExcessSource, PricingPolicy, ValidationFlags};
pub use error::ReconError;
pub use state::AppState;
pub use types::{BinCategory, Discrepancy, ProcessedRow, SummaryStatistics};
