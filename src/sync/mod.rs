//! The sync engine: reporting queries, the KPI table and the run that ties them together.
//!
//! A run reads the table once, picks the eligible accounts, and for each account aggregates the
//! metrics of every reporting window before writing them into the account's row as one batch.
//! Accounts are processed one at a time and a failure of one account never stops the others.

mod aggregator;
mod extractor;
mod orchestrator;
mod row_updater;
mod sheet_index;

pub use aggregator::{Aggregator, LAST_UPDATED_FORMAT};
pub use extractor::{DayResult, MetricExtractor, PeriodResult};
pub use orchestrator::Syncer;
pub use row_updater::{CellWrite, RowUpdater};
pub use sheet_index::{Eligibility, SheetIndex};
