//! The metric key space and the per-account metrics record.
//!
//! Base metrics are declared once in the schema table below. Each base metric is reported for
//! every `MonthlyPeriod`, and its flat key gets the period's suffix appended, e.g. `cost`,
//! `cost_last_month`, `cost_2_months_ago`, `cost_1_year_ago`. A handful of account-level keys
//! (`customer_id`, `daily_budget`, the single-day spend figures, ...) live outside that grid.

use crate::model::{AccountId, MonthlyPeriod};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Where the value of a base metric comes from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Source {
    /// A dotted field path in a reporting result row, e.g. `metrics.cost_micros`.
    Field(&'static str),
    /// The account-level resource has no field for this metric. Reported as an explicit zero.
    Unsupported,
}

use Source::{Field, Unsupported};

macro_rules! base_metrics {
    ($($variant:ident => $key:literal, $source:expr;)*) => {
        /// A metric reported once per `MonthlyPeriod`.
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum BaseMetric {
            $($variant,)*
        }

        impl BaseMetric {
            pub const ALL: &'static [BaseMetric] = &[$(BaseMetric::$variant,)*];
            pub const COUNT: usize = Self::ALL.len();

            /// The flat key without any period suffix.
            pub fn key(self) -> &'static str {
                match self {
                    $(BaseMetric::$variant => $key,)*
                }
            }

            pub fn source(self) -> Source {
                match self {
                    $(BaseMetric::$variant => $source,)*
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some(BaseMetric::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

base_metrics! {
    Cost => "cost", Field("metrics.cost_micros");
    Impressions => "impressions", Field("metrics.impressions");
    Clicks => "clicks", Field("metrics.clicks");
    Conversions => "conversions", Field("metrics.conversions");
    ConversionValue => "conversion_value", Field("metrics.conversions_value");
    AllConversions => "all_conversions", Field("metrics.all_conversions");
    AllConversionValue => "all_conversion_value", Field("metrics.all_conversions_value");
    Ctr => "ctr", Field("metrics.ctr");
    AverageCpc => "average_cpc", Field("metrics.average_cpc");
    AverageCpm => "average_cpm", Field("metrics.average_cpm");
    AverageCpv => "average_cpv", Unsupported;
    AverageCost => "average_cost", Field("metrics.average_cost");
    Interactions => "interactions", Field("metrics.interactions");
    InteractionRate => "interaction_rate", Field("metrics.interaction_rate");
    CostPerConversion => "cost_per_conversion", Field("metrics.cost_per_conversion");
    CostPerAllConversions => "cost_per_all_conversions", Field("metrics.cost_per_all_conversions");
    ConversionRate => "conversion_rate", Field("metrics.conversions_from_interactions_rate");
    AllConversionRate => "all_conversion_rate", Field("metrics.all_conversions_from_interactions_rate");
    SearchImpressionShare => "search_impression_share", Field("metrics.search_impression_share");
    SearchExactMatchImpressionShare => "search_exact_match_impression_share", Field("metrics.search_exact_match_impression_share");
    SearchBudgetLostImpressionShare => "search_budget_lost_impression_share", Field("metrics.search_budget_lost_impression_share");
    SearchRankLostImpressionShare => "search_rank_lost_impression_share", Field("metrics.search_rank_lost_impression_share");
    AbsoluteTopImpressionPercentage => "absolute_top_impression_percentage", Unsupported;
    TopImpressionPercentage => "top_impression_percentage", Unsupported;
    ContentImpressionShare => "content_impression_share", Field("metrics.content_impression_share");
    ContentBudgetLostImpressionShare => "content_budget_lost_impression_share", Field("metrics.content_budget_lost_impression_share");
    ContentRankLostImpressionShare => "content_rank_lost_impression_share", Field("metrics.content_rank_lost_impression_share");
    Engagements => "engagements", Field("metrics.engagements");
    EngagementRate => "engagement_rate", Field("metrics.engagement_rate");
    ActiveViewCpm => "active_view_cpm", Field("metrics.active_view_cpm");
    ActiveViewMeasurability => "active_view_measurability", Field("metrics.active_view_measurability");
    ActiveViewMeasurableCostMicros => "active_view_measurable_cost_micros", Field("metrics.active_view_measurable_cost_micros");
    InvalidClicks => "invalid_clicks", Field("metrics.invalid_clicks");
    InvalidClickRate => "invalid_click_rate", Field("metrics.invalid_click_rate");
    PhoneCalls => "phone_calls", Unsupported;
    PhoneImpressions => "phone_impressions", Unsupported;
    PhoneThroughRate => "phone_through_rate", Unsupported;
}

impl BaseMetric {
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// The dotted field paths of every supported base metric, in schema order.
    pub fn fields() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().filter_map(|m| match m.source() {
            Field(path) => Some(path),
            Unsupported => None,
        })
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MetricKeyError(String);

impl Display for MetricKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl StdError for MetricKeyError {}

/// A key in the flat metric namespace that column mappings refer to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MetricKey {
    CustomerId,
    AccountName,
    LastUpdated,
    DailyBudget,
    SpendYesterday,
    ConversionsYesterday,
    Spend2DaysAgo,
    Spend3DaysAgo,
    Base(BaseMetric, MonthlyPeriod),
}

impl MetricKey {
    fn fixed_key(&self) -> Option<&'static str> {
        Some(match self {
            MetricKey::CustomerId => "customer_id",
            MetricKey::AccountName => "account_name",
            MetricKey::LastUpdated => "last_updated",
            MetricKey::DailyBudget => "daily_budget",
            MetricKey::SpendYesterday => "spend_yesterday",
            MetricKey::ConversionsYesterday => "conversions_yesterday",
            MetricKey::Spend2DaysAgo => "spend_2_days_ago",
            MetricKey::Spend3DaysAgo => "spend_3_days_ago",
            MetricKey::Base(..) => return None,
        })
    }

    const FIXED: [MetricKey; 8] = [
        MetricKey::CustomerId,
        MetricKey::AccountName,
        MetricKey::LastUpdated,
        MetricKey::DailyBudget,
        MetricKey::SpendYesterday,
        MetricKey::ConversionsYesterday,
        MetricKey::Spend2DaysAgo,
        MetricKey::Spend3DaysAgo,
    ];
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKey::Base(metric, period) => write!(f, "{}{}", metric.key(), period.suffix()),
            fixed => f.write_str(fixed.fixed_key().unwrap_or_default()),
        }
    }
}

impl FromStr for MetricKey {
    type Err = MetricKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(fixed) = Self::FIXED.iter().find(|k| k.fixed_key() == Some(s)) {
            return Ok(*fixed);
        }
        for period in MonthlyPeriod::ALL.iter().rev() {
            let base = match period {
                MonthlyPeriod::Current => Some(s),
                _ => s.strip_suffix(period.suffix()),
            };
            if let Some(metric) = base.and_then(BaseMetric::from_key) {
                return Ok(MetricKey::Base(metric, *period));
            }
        }
        Err(MetricKeyError(format!("Unknown metric key '{s}'")))
    }
}

impl Serialize for MetricKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MetricKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MetricKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A single extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Integer(i64),
    /// A currency amount in base units, converted from micros.
    Decimal(Decimal),
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub const ZERO: MetricValue = MetricValue::Integer(0);
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Integer(i) => write!(f, "{i}"),
            MetricValue::Decimal(d) => write!(f, "{}", d.normalize()),
            MetricValue::Float(x) => write!(f, "{x}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<Decimal> for MetricValue {
    fn from(value: Decimal) -> Self {
        MetricValue::Decimal(value)
    }
}

/// The values of every base metric for one monthly period. `None` means the value was not
/// produced by this run.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMetrics {
    values: [Option<MetricValue>; BaseMetric::COUNT],
}

impl Default for PeriodMetrics {
    fn default() -> Self {
        Self {
            values: std::array::from_fn(|_| None),
        }
    }
}

impl PeriodMetrics {
    pub fn get(&self, metric: BaseMetric) -> Option<&MetricValue> {
        self.values[metric.index()].as_ref()
    }

    pub fn set(&mut self, metric: BaseMetric, value: MetricValue) {
        self.values[metric.index()] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the reporting API produced for one account in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    customer_id: AccountId,
    account_name: Option<String>,
    last_updated: Option<String>,
    daily_budget: Option<Decimal>,
    spend_yesterday: Option<MetricValue>,
    conversions_yesterday: Option<MetricValue>,
    spend_2_days_ago: Option<MetricValue>,
    spend_3_days_ago: Option<MetricValue>,
    periods: [Option<PeriodMetrics>; 4],
}

impl MetricRecord {
    pub fn new(customer_id: AccountId) -> Self {
        Self {
            customer_id,
            account_name: None,
            last_updated: None,
            daily_budget: None,
            spend_yesterday: None,
            conversions_yesterday: None,
            spend_2_days_ago: None,
            spend_3_days_ago: None,
            periods: [None, None, None, None],
        }
    }

    pub fn customer_id(&self) -> &AccountId {
        &self.customer_id
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    pub fn set_account_name(&mut self, name: impl Into<String>) {
        self.account_name = Some(name.into());
    }

    pub fn set_last_updated(&mut self, value: impl Into<String>) {
        self.last_updated = Some(value.into());
    }

    pub fn set_daily_budget(&mut self, value: Decimal) {
        self.daily_budget = Some(value);
    }

    pub fn set_spend_yesterday(&mut self, value: MetricValue) {
        self.spend_yesterday = Some(value);
    }

    pub fn set_conversions_yesterday(&mut self, value: MetricValue) {
        self.conversions_yesterday = Some(value);
    }

    pub fn set_spend_2_days_ago(&mut self, value: MetricValue) {
        self.spend_2_days_ago = Some(value);
    }

    pub fn set_spend_3_days_ago(&mut self, value: MetricValue) {
        self.spend_3_days_ago = Some(value);
    }

    pub fn period(&self, period: MonthlyPeriod) -> Option<&PeriodMetrics> {
        self.periods[period.index()].as_ref()
    }

    pub fn set_period(&mut self, period: MonthlyPeriod, metrics: PeriodMetrics) {
        self.periods[period.index()] = Some(metrics);
    }

    /// Whether any reporting query contributed to this record. The account-level fields
    /// (`customer_id`, `last_updated`, `daily_budget`) do not count.
    pub fn has_report_data(&self) -> bool {
        self.periods.iter().any(Option::is_some)
            || self.spend_yesterday.is_some()
            || self.conversions_yesterday.is_some()
            || self.spend_2_days_ago.is_some()
            || self.spend_3_days_ago.is_some()
    }

    /// Looks up the value for `key`, or `None` if this run did not produce it.
    pub fn get(&self, key: MetricKey) -> Option<MetricValue> {
        match key {
            MetricKey::CustomerId => Some(MetricValue::Text(self.customer_id.to_string())),
            MetricKey::AccountName => self.account_name.clone().map(MetricValue::Text),
            MetricKey::LastUpdated => self.last_updated.clone().map(MetricValue::Text),
            MetricKey::DailyBudget => self.daily_budget.map(MetricValue::Decimal),
            MetricKey::SpendYesterday => self.spend_yesterday.clone(),
            MetricKey::ConversionsYesterday => self.conversions_yesterday.clone(),
            MetricKey::Spend2DaysAgo => self.spend_2_days_ago.clone(),
            MetricKey::Spend3DaysAgo => self.spend_3_days_ago.clone(),
            MetricKey::Base(metric, period) => self
                .period(period)
                .and_then(|p| p.get(metric))
                .cloned(),
        }
    }

    /// The number of keys that have a value.
    pub fn len(&self) -> usize {
        let fixed = MetricKey::FIXED
            .iter()
            .filter(|k| self.get(**k).is_some())
            .count();
        let grid: usize = self.periods.iter().flatten().map(PeriodMetrics::len).sum();
        fixed + grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keys_are_unique() {
        let mut keys: Vec<&str> = BaseMetric::ALL.iter().map(|m| m.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), BaseMetric::COUNT);
        for metric in BaseMetric::ALL {
            assert_eq!(BaseMetric::from_key(metric.key()), Some(*metric));
        }
    }

    #[test]
    fn test_metric_key_parse() {
        let key: MetricKey = "cost".parse().unwrap();
        assert_eq!(key, MetricKey::Base(BaseMetric::Cost, MonthlyPeriod::Current));
        let key: MetricKey = "cost_last_month".parse().unwrap();
        assert_eq!(
            key,
            MetricKey::Base(BaseMetric::Cost, MonthlyPeriod::LastMonth)
        );
        let key: MetricKey = "search_rank_lost_impression_share_2_months_ago"
            .parse()
            .unwrap();
        assert_eq!(
            key,
            MetricKey::Base(
                BaseMetric::SearchRankLostImpressionShare,
                MonthlyPeriod::TwoMonthsAgo
            )
        );
        let key: MetricKey = "active_view_measurable_cost_micros_1_year_ago"
            .parse()
            .unwrap();
        assert_eq!(
            key,
            MetricKey::Base(
                BaseMetric::ActiveViewMeasurableCostMicros,
                MonthlyPeriod::OneYearAgo
            )
        );
        let key: MetricKey = "spend_2_days_ago".parse().unwrap();
        assert_eq!(key, MetricKey::Spend2DaysAgo);
        let key: MetricKey = "customer_id".parse().unwrap();
        assert_eq!(key, MetricKey::CustomerId);
    }

    #[test]
    fn test_metric_key_parse_typo() {
        assert!("cots".parse::<MetricKey>().is_err());
        assert!("cost_last_week".parse::<MetricKey>().is_err());
        assert!("spend_4_days_ago".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_metric_key_display_round_trips_every_key() {
        for metric in BaseMetric::ALL {
            for period in MonthlyPeriod::ALL {
                let key = MetricKey::Base(*metric, period);
                let parsed: MetricKey = key.to_string().parse().unwrap();
                assert_eq!(parsed, key);
            }
        }
        for key in MetricKey::FIXED {
            let parsed: MetricKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn test_metric_value_display() {
        assert_eq!(MetricValue::Integer(42).to_string(), "42");
        assert_eq!(
            MetricValue::Decimal(Decimal::new(12_500_000, 6)).to_string(),
            "12.5"
        );
        assert_eq!(MetricValue::Float(0.25).to_string(), "0.25");
        assert_eq!(MetricValue::Text("Acme".into()).to_string(), "Acme");
    }

    #[test]
    fn test_record_get_and_len() {
        let mut record = MetricRecord::new(AccountId::new("123-456-7890"));
        assert!(!record.has_report_data());
        assert_eq!(record.len(), 1);

        let mut current = PeriodMetrics::default();
        current.set(BaseMetric::Clicks, MetricValue::Integer(10));
        record.set_period(MonthlyPeriod::Current, current);
        record.set_daily_budget(Decimal::new(150, 0));

        assert!(record.has_report_data());
        assert_eq!(
            record.get(MetricKey::Base(BaseMetric::Clicks, MonthlyPeriod::Current)),
            Some(MetricValue::Integer(10))
        );
        assert_eq!(
            record.get(MetricKey::Base(BaseMetric::Clicks, MonthlyPeriod::LastMonth)),
            None
        );
        assert_eq!(
            record.get(MetricKey::CustomerId),
            Some(MetricValue::Text("1234567890".into()))
        );
        assert_eq!(record.len(), 3);
    }
}
