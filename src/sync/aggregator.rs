use crate::api::Reporting;
use crate::model::{AccountId, MetricRecord, MonthlyPeriod, Period, PeriodRanges};
use crate::sync::extractor::MetricExtractor;
use crate::Result;
use anyhow::anyhow;
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// The format of the `last_updated` value.
pub const LAST_UPDATED_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

const NO_METRICS: &str = "No metrics returned";

/// Builds one `MetricRecord` per account from the monthly, single-day and budget queries.
pub struct Aggregator<'a> {
    extractor: MetricExtractor<'a>,
}

impl<'a> Aggregator<'a> {
    pub fn new(reporting: &'a dyn Reporting) -> Self {
        Self {
            extractor: MetricExtractor::new(reporting),
        }
    }

    /// Fields read as zero so far in this run.
    pub fn degraded(&self) -> usize {
        self.extractor.degraded()
    }

    /// Queries everything for `account`.
    ///
    /// A failed or empty query leaves its values out of the record. If no query produced a row
    /// the account fails, with the last query error if there was one.
    pub async fn aggregate(
        &mut self,
        account: &AccountId,
        ranges: &PeriodRanges,
        now: NaiveDateTime,
    ) -> Result<MetricRecord> {
        let mut record = MetricRecord::new(account.clone());
        let mut last_error: Option<String> = None;

        for monthly in MonthlyPeriod::ALL {
            let range = ranges.get(monthly.period());
            match self.extractor.period(account, range).await {
                Ok(Some(result)) => {
                    if monthly == MonthlyPeriod::Current {
                        record.set_account_name(result.account_name.unwrap_or_default());
                    }
                    record.set_period(monthly, result.metrics);
                }
                Ok(None) => debug!("No {} data for {account} ({range})", monthly.period()),
                Err(e) => {
                    warn!("Query for {} failed for {account}: {e:#}", monthly.period());
                    last_error = Some(format!("{e:#}"));
                }
            }
        }

        for period in [Period::Yesterday, Period::TwoDaysAgo, Period::ThreeDaysAgo] {
            let range = ranges.get(period);
            match self.extractor.day(account, range).await {
                Ok(Some(day)) => match period {
                    Period::Yesterday => {
                        record.set_spend_yesterday(day.cost);
                        record.set_conversions_yesterday(day.conversions);
                    }
                    Period::TwoDaysAgo => record.set_spend_2_days_ago(day.cost),
                    _ => record.set_spend_3_days_ago(day.cost),
                },
                Ok(None) => debug!("No {period} data for {account} ({range})"),
                Err(e) => {
                    warn!("Query for {period} failed for {account}: {e:#}");
                    last_error = Some(format!("{e:#}"));
                }
            }
        }

        if !record.has_report_data() {
            return Err(anyhow!(last_error.unwrap_or_else(|| NO_METRICS.to_string())));
        }

        let budget = self.extractor.daily_budget(account).await;
        record.set_daily_budget(budget);
        record.set_last_updated(now.format(LAST_UPDATED_FORMAT).to_string());
        debug!("Collected {} values for {account}", record.len());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestAccount, TestReporting};
    use crate::model::{BaseMetric, MetricKey, MetricValue};
    use crate::test::{campaign_row, customer_row, datetime};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_aggregate_full_record() {
        let reporting = TestReporting::default().with_account(
            "1234567890",
            TestAccount::default()
                .with_customer_rows(vec![customer_row("Acme Plumbing", "152340000", "1830")])
                .with_campaign_rows(vec![campaign_row("1", "9", false, "40000000")]),
        );
        let now = datetime(2024, 3, 15, 6, 30, 0);
        let ranges = PeriodRanges::compute(now.date());
        let mut aggregator = Aggregator::new(&reporting);
        let record = aggregator
            .aggregate(&AccountId::new("123-456-7890"), &ranges, now)
            .await
            .unwrap();

        assert_eq!(record.account_name(), Some("Acme Plumbing"));
        assert_eq!(
            record.get(MetricKey::CustomerId),
            Some(MetricValue::Text("1234567890".to_string()))
        );
        assert_eq!(
            record.get(MetricKey::LastUpdated),
            Some(MetricValue::Text("03/15/2024 06:30:00".to_string()))
        );
        assert_eq!(
            record.get(MetricKey::DailyBudget),
            Some(MetricValue::Decimal(Decimal::from(40)))
        );
        assert_eq!(
            record
                .get(MetricKey::Base(BaseMetric::Cost, MonthlyPeriod::OneYearAgo))
                .map(|v| v.to_string()),
            Some("152.34".to_string())
        );
        assert!(record.get(MetricKey::Spend3DaysAgo).is_some());
        assert_eq!(aggregator.degraded(), 0);

        // 4 monthly + 3 single-day + budget
        assert_eq!(reporting.queries().len(), 8);
    }

    #[tokio::test]
    async fn test_aggregate_no_rows_fails() {
        let reporting =
            TestReporting::default().with_account("1234567890", TestAccount::default());
        let now = datetime(2024, 3, 15, 6, 30, 0);
        let ranges = PeriodRanges::compute(now.date());
        let mut aggregator = Aggregator::new(&reporting);
        let err = aggregator
            .aggregate(&AccountId::new("1234567890"), &ranges, now)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No metrics returned");
    }

    #[tokio::test]
    async fn test_aggregate_query_failures_report_last_error() {
        let reporting = TestReporting::default()
            .with_account("1234567890", TestAccount::default().failing("quota exhausted"));
        let now = datetime(2024, 3, 15, 6, 30, 0);
        let ranges = PeriodRanges::compute(now.date());
        let mut aggregator = Aggregator::new(&reporting);
        let err = aggregator
            .aggregate(&AccountId::new("1234567890"), &ranges, now)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
        // The budget query is not attempted for an empty record.
        assert_eq!(reporting.queries().len(), 7);
    }

    #[tokio::test]
    async fn test_aggregate_failed_period_is_left_out() {
        let now = datetime(2024, 3, 15, 6, 30, 0);
        let ranges = PeriodRanges::compute(now.date());
        let reporting = TestReporting::default().with_account(
            "1234567890",
            TestAccount::default()
                .with_customer_rows(vec![customer_row("Acme Plumbing", "1000000", "77")])
                .failing_for(ranges.get(Period::LastMonth), "Request timed out")
                .empty_for(ranges.get(Period::TwoDaysAgo)),
        );
        let mut aggregator = Aggregator::new(&reporting);
        let record = aggregator
            .aggregate(&AccountId::new("1234567890"), &ranges, now)
            .await
            .unwrap();

        let clicks = |period| record.get(MetricKey::Base(BaseMetric::Clicks, period));
        assert_eq!(clicks(MonthlyPeriod::LastMonth), None);
        assert_eq!(clicks(MonthlyPeriod::Current).map(|v| v.to_string()), Some("77".to_string()));
        assert!(clicks(MonthlyPeriod::TwoMonthsAgo).is_some());
        assert!(clicks(MonthlyPeriod::OneYearAgo).is_some());
        assert_eq!(record.get(MetricKey::Spend2DaysAgo), None);
        assert!(record.get(MetricKey::Spend3DaysAgo).is_some());
        assert_eq!(record.account_name(), Some("Acme Plumbing"));
    }
}
