//! Types that represent the core data model, such as `PeriodRanges`, `AccountId` and
//! `MetricRecord`.
mod account;
mod column;
mod dates;
mod metric;
mod outcome;

pub use account::AccountId;
pub use column::{column_index, column_letters, CellAddress, ColumnMapping};
pub use dates::{DateRange, MonthlyPeriod, Period, PeriodRanges};
pub use metric::{
    BaseMetric, MetricKey, MetricKeyError, MetricRecord, MetricValue, PeriodMetrics, Source,
};
pub use outcome::{SyncOutcome, SUMMARY_FAILURE_LIMIT};
