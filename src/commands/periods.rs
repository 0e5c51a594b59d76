use crate::commands::Out;
use crate::model::PeriodRanges;
use crate::Result;
use chrono::{Local, NaiveDate};
use std::fmt::Write;

/// Shows the reporting windows a sync on `date` (default: today) would use.
pub fn periods(date: Option<NaiveDate>) -> Result<Out<PeriodRanges>> {
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let ranges = PeriodRanges::compute(today);
    let mut message = format!("Reporting windows for {today}:");
    for (period, range) in ranges.iter() {
        write!(message, "\n  {:<16} {range}", period.to_string())?;
    }
    Ok(Out::new(message, ranges))
}
