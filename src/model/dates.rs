//! Date windows used for period-over-period KPI reporting.
//!
//! All windows are computed once per run from a single "today" so that every account in the run
//! is reported against the same dates.

use anyhow::ensure;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The date format used by the reporting query language.
const ISO_DATE: &str = "%Y-%m-%d";

/// An inclusive range of calendar dates where `start <= end`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// The unchecked serialized form of a `DateRange`.
#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = crate::Error;

    fn try_from(raw: RawDateRange) -> crate::Result<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Creates a new `DateRange`.
    ///
    /// # Errors
    /// - Returns an error if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        ensure!(
            start <= end,
            "A date range must not start ({start}) after it ends ({end})"
        );
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Renders the inclusive date predicate of a reporting query, e.g.
    /// `segments.date >= '2024-03-01' AND segments.date <= '2024-03-14'`.
    pub fn predicate(&self) -> String {
        format!(
            "segments.date >= '{}' AND segments.date <= '{}'",
            self.start.format(ISO_DATE),
            self.end.format(ISO_DATE)
        )
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(ISO_DATE),
            self.end.format(ISO_DATE)
        )
    }
}

/// The named reporting windows.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Current,
    LastMonth,
    TwoMonthsAgo,
    OneYearAgo,
    Yesterday,
    TwoDaysAgo,
    ThreeDaysAgo,
}

serde_plain::derive_display_from_serialize!(Period);
serde_plain::derive_fromstr_from_deserialize!(Period);

impl Period {
    pub const ALL: [Period; 7] = [
        Period::Current,
        Period::LastMonth,
        Period::TwoMonthsAgo,
        Period::OneYearAgo,
        Period::Yesterday,
        Period::TwoDaysAgo,
        Period::ThreeDaysAgo,
    ];
}

/// The month-sized windows that every base metric is reported for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyPeriod {
    Current,
    LastMonth,
    TwoMonthsAgo,
    OneYearAgo,
}

impl MonthlyPeriod {
    pub const ALL: [MonthlyPeriod; 4] = [
        MonthlyPeriod::Current,
        MonthlyPeriod::LastMonth,
        MonthlyPeriod::TwoMonthsAgo,
        MonthlyPeriod::OneYearAgo,
    ];

    /// The suffix appended to a base metric key, e.g. `cost` + `_last_month`.
    pub fn suffix(self) -> &'static str {
        match self {
            MonthlyPeriod::Current => "",
            MonthlyPeriod::LastMonth => "_last_month",
            MonthlyPeriod::TwoMonthsAgo => "_2_months_ago",
            MonthlyPeriod::OneYearAgo => "_1_year_ago",
        }
    }

    pub fn period(self) -> Period {
        match self {
            MonthlyPeriod::Current => Period::Current,
            MonthlyPeriod::LastMonth => Period::LastMonth,
            MonthlyPeriod::TwoMonthsAgo => Period::TwoMonthsAgo,
            MonthlyPeriod::OneYearAgo => Period::OneYearAgo,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Every `Period` bound to its `DateRange` for one run.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeriodRanges {
    current: DateRange,
    last_month: DateRange,
    two_months_ago: DateRange,
    one_year_ago: DateRange,
    yesterday: DateRange,
    two_days_ago: DateRange,
    three_days_ago: DateRange,
}

impl PeriodRanges {
    /// Computes all reporting windows relative to `today`.
    ///
    /// On the first day of a month the `current` window collapses to yesterday alone, so that a
    /// zero-day "month to date" is never reported.
    pub fn compute(today: NaiveDate) -> Self {
        let yesterday = days_before(today, 1);

        let current = if today.day() == 1 {
            DateRange::day(yesterday)
        } else {
            DateRange {
                start: first_of_month(today),
                end: yesterday,
            }
        };

        let last_month = month_ending_before(current.start);
        let two_months_ago = month_ending_before(last_month.start);

        let year_ago_start = current
            .start
            .checked_sub_months(Months::new(12))
            .unwrap_or(current.start);
        let one_year_ago = DateRange {
            start: year_ago_start,
            end: last_of_month(year_ago_start),
        };

        Self {
            current,
            last_month,
            two_months_ago,
            one_year_ago,
            yesterday: DateRange::day(yesterday),
            two_days_ago: DateRange::day(days_before(today, 2)),
            three_days_ago: DateRange::day(days_before(today, 3)),
        }
    }

    pub fn get(&self, period: Period) -> DateRange {
        match period {
            Period::Current => self.current,
            Period::LastMonth => self.last_month,
            Period::TwoMonthsAgo => self.two_months_ago,
            Period::OneYearAgo => self.one_year_ago,
            Period::Yesterday => self.yesterday,
            Period::TwoDaysAgo => self.two_days_ago,
            Period::ThreeDaysAgo => self.three_days_ago,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, DateRange)> + '_ {
        Period::ALL.into_iter().map(|p| (p, self.get(p)))
    }
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The last day of the month containing `date`: the day before the 1st of the following month.
fn last_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    match first.checked_add_months(Months::new(1)) {
        Some(next_first) => days_before(next_first, 1),
        None => NaiveDate::MAX,
    }
}

/// The whole month that ends on the day before `date`.
fn month_ending_before(date: NaiveDate) -> DateRange {
    let end = days_before(date, 1);
    DateRange {
        start: first_of_month(end),
        end,
    }
}
