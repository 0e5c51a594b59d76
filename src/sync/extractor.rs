//! Reporting queries and the extraction of metric values from their JSON result rows.

use crate::api::Reporting;
use crate::model::{AccountId, BaseMetric, DateRange, MetricValue, PeriodMetrics, Source};
use crate::Result;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

const MICROS_PER_UNIT: i64 = 1_000_000;
const DESCRIPTIVE_NAME: &str = "customer.descriptive_name";
const COST: &str = "metrics.cost_micros";
const CONVERSIONS: &str = "metrics.conversions";

/// The metrics of one monthly period plus the account name read from the same row.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodResult {
    pub metrics: PeriodMetrics,
    pub account_name: Option<String>,
}

/// The single-day figures.
#[derive(Debug, Clone, PartialEq)]
pub struct DayResult {
    pub cost: MetricValue,
    pub conversions: MetricValue,
}

/// Identifies a budget for summing. Shared budgets are counted once no matter how many campaigns
/// use them; a non-shared budget belongs to exactly one campaign.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum DedupKey {
    Budget(String),
    Campaign(String),
    /// The row carried neither id; it is never merged with another row.
    Row(usize),
}

/// Runs reporting queries for one sync run and turns their first result row into metric values.
///
/// Field access never fails: a missing, null or non-scalar field reads as zero and is counted in
/// `degraded`.
pub struct MetricExtractor<'a> {
    reporting: &'a dyn Reporting,
    degraded: usize,
}

impl<'a> MetricExtractor<'a> {
    pub fn new(reporting: &'a dyn Reporting) -> Self {
        Self {
            reporting,
            degraded: 0,
        }
    }

    /// The number of fields that were read as zero because they could not be accessed.
    pub fn degraded(&self) -> usize {
        self.degraded
    }

    /// Runs `query` and returns its first result row, if any. Extra rows are ignored.
    pub async fn extract(&self, account: &AccountId, query: &str) -> Result<Option<Value>> {
        let rows = self.reporting.search(account, query).await?;
        if rows.len() > 1 {
            debug!("Ignoring {} extra rows for {account}", rows.len() - 1);
        }
        Ok(rows.into_iter().next())
    }

    /// Queries every base metric of `range`. `Ok(None)` means the query matched nothing.
    pub async fn period(
        &mut self,
        account: &AccountId,
        range: DateRange,
    ) -> Result<Option<PeriodResult>> {
        let Some(row) = self.extract(account, &period_query(range)).await? else {
            return Ok(None);
        };
        let mut metrics = PeriodMetrics::default();
        for metric in BaseMetric::ALL {
            let value = match metric.source() {
                Source::Field(path) => self.field(&row, path),
                Source::Unsupported => MetricValue::ZERO,
            };
            metrics.set(*metric, value);
        }
        let account_name = lookup(&row, DESCRIPTIVE_NAME)
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Some(PeriodResult {
            metrics,
            account_name,
        }))
    }

    /// Queries cost and conversions of a single day. `Ok(None)` means the query matched nothing.
    pub async fn day(&mut self, account: &AccountId, range: DateRange) -> Result<Option<DayResult>> {
        let query = format!("SELECT {COST}, {CONVERSIONS} FROM customer WHERE {}", range.predicate());
        let Some(row) = self.extract(account, &query).await? else {
            return Ok(None);
        };
        Ok(Some(DayResult {
            cost: self.field(&row, COST),
            conversions: self.field(&row, CONVERSIONS),
        }))
    }

    /// Sums the daily budgets of every enabled, serving campaign. Any failure reads as zero.
    pub async fn daily_budget(&mut self, account: &AccountId) -> Decimal {
        let rows = match self.reporting.search(account, BUDGET_QUERY).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Budget query failed for {account}: {e:#}");
                return Decimal::ZERO;
            }
        };

        let mut seen = HashSet::new();
        let mut total = Decimal::ZERO;
        for (i, row) in rows.iter().enumerate() {
            if !seen.insert(dedup_key(row, i)) {
                continue;
            }
            match self.field(row, "campaign_budget.amount_micros") {
                MetricValue::Decimal(amount) => total += amount,
                MetricValue::Integer(amount) => total += Decimal::from(amount),
                _ => {}
            }
        }
        total
    }

    /// Reads the value at the dotted `path`, or zero if it cannot be read.
    pub fn field(&mut self, row: &Value, path: &str) -> MetricValue {
        match lookup(row, path).and_then(|v| to_metric_value(path, v)) {
            Some(value) => value,
            None => {
                self.degraded += 1;
                debug!("Field {path} is unavailable, using 0");
                MetricValue::ZERO
            }
        }
    }
}

const BUDGET_QUERY: &str = "SELECT campaign.id, campaign_budget.id, \
    campaign_budget.amount_micros, campaign_budget.explicitly_shared \
    FROM campaign \
    WHERE campaign.status = 'ENABLED' AND campaign.serving_status = 'SERVING'";

fn period_query(range: DateRange) -> String {
    let fields: Vec<&str> = BaseMetric::fields().collect();
    format!(
        "SELECT {DESCRIPTIVE_NAME}, {} FROM customer WHERE {}",
        fields.join(", "),
        range.predicate()
    )
}

fn dedup_key(row: &Value, index: usize) -> DedupKey {
    let shared = lookup(row, "campaign_budget.explicitly_shared")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let budget_id = lookup(row, "campaign_budget.id").and_then(id_string);
    let campaign_id = lookup(row, "campaign.id").and_then(id_string);
    match (shared, budget_id, campaign_id) {
        (true, Some(budget), _) => DedupKey::Budget(budget),
        (_, _, Some(campaign)) => DedupKey::Campaign(campaign),
        _ => DedupKey::Row(index),
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Walks a dotted path over a result row. Each segment is tried in camelCase, the shape of the
/// REST transport, then as written.
fn lookup<'v>(row: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(row, |value, segment| {
        let object = value.as_object()?;
        object
            .get(&camel_case(segment))
            .or_else(|| object.get(segment))
    })
}

fn camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper = false;
    for c in segment.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts a scalar field. Values of `micros` fields are scaled to base units. The transport
/// encodes 64-bit integers as strings, so numeric strings are read as numbers.
fn to_metric_value(path: &str, value: &Value) -> Option<MetricValue> {
    if path.contains("micros") {
        let micros = match value {
            Value::Number(n) => parse_decimal(&n.to_string())?,
            Value::String(s) => parse_decimal(s)?,
            _ => return None,
        };
        return Some(MetricValue::Decimal(micros / Decimal::from(MICROS_PER_UNIT)));
    }
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(MetricValue::Integer(i)),
            None => n.as_f64().map(MetricValue::Float),
        },
        Value::String(s) => Some(if let Ok(i) = s.parse::<i64>() {
            MetricValue::Integer(i)
        } else if let Ok(x) = s.parse::<f64>() {
            MetricValue::Float(x)
        } else {
            MetricValue::Text(s.clone())
        }),
        Value::Bool(b) => Some(MetricValue::Integer(i64::from(*b))),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TestAccount, TestReporting};
    use crate::test::{campaign_row, customer_row};
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reporting_with(customer: Vec<Value>, campaign: Vec<Value>) -> TestReporting {
        TestReporting::default().with_account(
            "1234567890",
            TestAccount::default()
                .with_customer_rows(customer)
                .with_campaign_rows(campaign),
        )
    }

    #[test]
    fn test_lookup_camel_then_snake() {
        let row = json!({"metrics": {"costMicros": "1", "cost_micros": "2", "search_impression_share": 0.5}});
        assert_eq!(lookup(&row, "metrics.cost_micros"), Some(&json!("1")));
        assert_eq!(
            lookup(&row, "metrics.search_impression_share"),
            Some(&json!(0.5))
        );
        assert_eq!(lookup(&row, "metrics.clicks"), None);
        assert_eq!(lookup(&row, "metrics.cost_micros.deeper"), None);
    }

    #[test]
    fn test_field_conversions() {
        let reporting = TestReporting::default();
        let mut extractor = MetricExtractor::new(&reporting);
        let row = json!({
            "metrics": {
                "costMicros": "152340000",
                "activeViewMeasurableCostMicros": 1500000,
                "clicks": "1830",
                "ctr": 0.0747,
                "conversions": 42.0,
                "impressions": null,
                "interactions": {"nested": 1},
            }
        });
        assert_eq!(
            extractor.field(&row, "metrics.cost_micros").to_string(),
            "152.34"
        );
        assert_eq!(
            extractor
                .field(&row, "metrics.active_view_measurable_cost_micros")
                .to_string(),
            "1.5"
        );
        assert_eq!(
            extractor.field(&row, "metrics.clicks"),
            MetricValue::Integer(1830)
        );
        assert_eq!(
            extractor.field(&row, "metrics.ctr"),
            MetricValue::Float(0.0747)
        );
        assert_eq!(
            extractor.field(&row, "metrics.conversions"),
            MetricValue::Float(42.0)
        );
        assert_eq!(extractor.degraded(), 0);

        assert_eq!(extractor.field(&row, "metrics.impressions"), MetricValue::ZERO);
        assert_eq!(extractor.field(&row, "metrics.interactions"), MetricValue::ZERO);
        assert_eq!(extractor.field(&row, "metrics.engagements"), MetricValue::ZERO);
        assert_eq!(extractor.degraded(), 3);
    }

    #[tokio::test]
    async fn test_period_reads_first_row_only() {
        let reporting = reporting_with(
            vec![
                customer_row("Acme Plumbing", "152340000", "1830"),
                customer_row("Other", "1", "1"),
            ],
            vec![],
        );
        let mut extractor = MetricExtractor::new(&reporting);
        let account = AccountId::new("1234567890");
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 14)).unwrap();
        let result = extractor.period(&account, range).await.unwrap().unwrap();

        assert_eq!(result.account_name.as_deref(), Some("Acme Plumbing"));
        assert_eq!(result.metrics.len(), BaseMetric::COUNT);
        assert_eq!(
            result.metrics.get(BaseMetric::Clicks),
            Some(&MetricValue::Integer(1830))
        );
        assert_eq!(
            result.metrics.get(BaseMetric::PhoneCalls),
            Some(&MetricValue::ZERO)
        );
        assert_eq!(extractor.degraded(), 0);

        let queries = reporting.queries();
        assert_eq!(queries.len(), 1);
        let query = &queries[0].1;
        assert!(query.contains("FROM customer"));
        assert!(query.contains("customer.descriptive_name"));
        assert!(query.contains("metrics.conversions_from_interactions_rate"));
        assert!(!query.contains("phone_calls"));
        assert!(query
            .contains("segments.date >= '2024-03-01' AND segments.date <= '2024-03-14'"));
    }

    #[tokio::test]
    async fn test_period_without_rows() {
        let reporting = reporting_with(vec![], vec![]);
        let mut extractor = MetricExtractor::new(&reporting);
        let range = DateRange::day(date(2024, 3, 14));
        let result = extractor
            .period(&AccountId::new("1234567890"), range)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_day() {
        let reporting = reporting_with(vec![customer_row("A", "5000000", "3")], vec![]);
        let mut extractor = MetricExtractor::new(&reporting);
        let range = DateRange::day(date(2024, 3, 14));
        let day = extractor
            .day(&AccountId::new("1234567890"), range)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.cost.to_string(), "5");
        assert_eq!(day.conversions, MetricValue::Float(42.0));
    }

    #[tokio::test]
    async fn test_budget_shared_counts_once() {
        let reporting = reporting_with(
            vec![],
            vec![
                campaign_row("1", "77", true, "100000000"),
                campaign_row("2", "77", true, "100000000"),
            ],
        );
        let mut extractor = MetricExtractor::new(&reporting);
        let total = extractor
            .daily_budget(&AccountId::new("1234567890"))
            .await;
        assert_eq!(total, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_budget_distinct_non_shared_sum() {
        let reporting = reporting_with(
            vec![],
            vec![
                campaign_row("1", "77", false, "50000000"),
                campaign_row("2", "78", false, "60000000"),
            ],
        );
        let mut extractor = MetricExtractor::new(&reporting);
        let total = extractor
            .daily_budget(&AccountId::new("1234567890"))
            .await;
        assert_eq!(total, Decimal::from(110));
    }

    #[tokio::test]
    async fn test_budget_equal_amounts_are_not_merged() {
        let reporting = reporting_with(
            vec![],
            vec![
                campaign_row("1", "77", false, "50000000"),
                campaign_row("2", "78", false, "50000000"),
            ],
        );
        let mut extractor = MetricExtractor::new(&reporting);
        let total = extractor
            .daily_budget(&AccountId::new("1234567890"))
            .await;
        assert_eq!(total, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_budget_failure_is_zero() {
        let reporting = TestReporting::default()
            .with_account("1234567890", TestAccount::default().failing("boom"));
        let mut extractor = MetricExtractor::new(&reporting);
        let total = extractor
            .daily_budget(&AccountId::new("1234567890"))
            .await;
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("cost_micros"), "costMicros");
        assert_eq!(
            camel_case("all_conversions_from_interactions_rate"),
            "allConversionsFromInteractionsRate"
        );
        assert_eq!(camel_case("metrics"), "metrics");
    }
}
