//! Keeps a KPI Google Sheet in step with Google Ads reporting metrics.
//!
//! The core is the sync engine in [`sync`]: it computes rolling reporting windows, maps the
//! sheet's headers onto the metric key space, matches rows to ad accounts and writes each
//! account's row as a batch, tolerating failures of individual accounts.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod server;
pub mod sync;
mod utils;


pub use api::{
    Mode, Notification, Notifier, Reporting, Severity, Sheet, SheetRange, TestAccount,
    TestNotifier, TestReporting, TestSheet, TEST_MODE_ENV,
};
pub use config::{Config, NewConfig, ADS_TOKEN_ENV, SHEETS_TOKEN_ENV};
pub use error::Error;
pub use error::Result;
