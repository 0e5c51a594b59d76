//! Implements the `Reporting` trait using in-memory data for testing purposes.
//!
//! Like the test sheet, this is compiled into the production binary so that `Mode::Test` can run
//! a complete sync without reaching Google.

use crate::api::Reporting;
use crate::model::{AccountId, DateRange};
use crate::Result;
use anyhow::bail;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// The canned responses of one account.
#[derive(Debug, Default, Clone)]
pub struct TestAccount {
    customer_rows: Vec<Value>,
    campaign_rows: Vec<Value>,
    failure: Option<String>,
    range_failures: Vec<(DateRange, String)>,
    empty_ranges: Vec<DateRange>,
}

impl TestAccount {
    /// Rows returned for every `FROM customer` query.
    pub fn with_customer_rows(mut self, rows: Vec<Value>) -> Self {
        self.customer_rows = rows;
        self
    }

    /// Rows returned for every `FROM campaign` query.
    pub fn with_campaign_rows(mut self, rows: Vec<Value>) -> Self {
        self.campaign_rows = rows;
        self
    }

    /// Every query for this account fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Only queries over exactly `range` fail with `message`.
    pub fn failing_for(mut self, range: DateRange, message: impl Into<String>) -> Self {
        self.range_failures.push((range, message.into()));
        self
    }

    /// Queries over exactly `range` return no rows.
    pub fn empty_for(mut self, range: DateRange) -> Self {
        self.empty_ranges.push(range);
        self
    }
}

/// A `Reporting` implementation that answers from canned rows and records every query it saw.
/// Clones share the query log.
#[derive(Debug, Default, Clone)]
pub struct TestReporting {
    accounts: HashMap<AccountId, TestAccount>,
    queries: Arc<Mutex<Vec<(AccountId, String)>>>,
}

impl TestReporting {
    pub fn with_account(mut self, account: impl Into<AccountId>, data: TestAccount) -> Self {
        self.accounts.insert(account.into(), data);
        self
    }

    /// Every `(account, query)` pair searched so far, in order.
    pub fn queries(&self) -> Vec<(AccountId, String)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Canned data for the accounts of the seeded test sheet. `3456789012` is not under
    /// management and has no data; `4567890123` fails every query.
    pub fn seeded() -> Self {
        Self::default()
            .with_account(
                "1234567890",
                TestAccount::default()
                    .with_customer_rows(vec![customer_row("Acme Plumbing", "152340000", "1830")])
                    .with_campaign_rows(vec![
                        campaign_row("11", "901", false, "40000000"),
                        campaign_row("12", "902", true, "25000000"),
                        campaign_row("13", "902", true, "25000000"),
                    ]),
            )
            .with_account(
                "2345678901",
                TestAccount::default()
                    .with_customer_rows(vec![customer_row("Bright Dental", "98760000", "912")])
                    .with_campaign_rows(vec![campaign_row("21", "903", false, "30000000")]),
            )
            .with_account(
                "4567890123",
                TestAccount::default().failing("PERMISSION_DENIED: The caller does not have permission"),
            )
    }
}

#[async_trait::async_trait]
impl Reporting for TestReporting {
    async fn search(&self, account: &AccountId, query: &str) -> Result<Vec<Value>> {
        trace!("test search for {account}");
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((account.clone(), query.to_string()));

        let Some(data) = self.accounts.get(account) else {
            bail!("Customer {account} not found");
        };
        if let Some(message) = &data.failure {
            bail!("{message}");
        }
        if let Some((_, message)) = data
            .range_failures
            .iter()
            .find(|(range, _)| query.contains(&range.predicate()))
        {
            bail!("{message}");
        }
        if data
            .empty_ranges
            .iter()
            .any(|range| query.contains(&range.predicate()))
        {
            return Ok(Vec::new());
        }
        if query.contains("FROM campaign") {
            Ok(data.campaign_rows.clone())
        } else {
            Ok(data.customer_rows.clone())
        }
    }
}

/// A `FROM customer` result row in the REST JSON shape: camelCase names, int64 values as strings.
pub(crate) fn customer_row(name: &str, cost_micros: &str, clicks: &str) -> Value {
    json!({
        "customer": {
            "resourceName": "customers/0",
            "descriptiveName": name,
        },
        "metrics": {
            "costMicros": cost_micros,
            "impressions": "24500",
            "clicks": clicks,
            "conversions": 42.0,
            "conversionsValue": 3150.5,
            "allConversions": 47.5,
            "allConversionsValue": 3380.25,
            "ctr": 0.0747,
            "averageCpc": 83245.9,
            "averageCpm": 6217959.2,
            "averageCost": 83245.9,
            "interactions": clicks,
            "interactionRate": 0.0747,
            "costPerConversion": 3627142.8,
            "costPerAllConversions": 3207157.8,
            "conversionsFromInteractionsRate": 0.0229,
            "allConversionsFromInteractionsRate": 0.0259,
            "searchImpressionShare": 0.4512,
            "searchExactMatchImpressionShare": 0.6203,
            "searchBudgetLostImpressionShare": 0.1288,
            "searchRankLostImpressionShare": 0.42,
            "contentImpressionShare": 0.0999,
            "contentBudgetLostImpressionShare": 0.05,
            "contentRankLostImpressionShare": 0.85,
            "engagements": "0",
            "engagementRate": 0.0,
            "activeViewCpm": 0.0,
            "activeViewMeasurability": 0.0,
            "activeViewMeasurableCostMicros": "0",
            "invalidClicks": "12",
            "invalidClickRate": 0.0065,
        }
    })
}

/// A `FROM campaign` result row in the REST JSON shape.
pub(crate) fn campaign_row(campaign_id: &str, budget_id: &str, shared: bool, amount_micros: &str) -> Value {
    json!({
        "campaign": {
            "resourceName": format!("customers/0/campaigns/{campaign_id}"),
            "id": campaign_id,
            "status": "ENABLED",
            "servingStatus": "SERVING",
        },
        "campaignBudget": {
            "resourceName": format!("customers/0/campaignBudgets/{budget_id}"),
            "id": budget_id,
            "explicitlyShared": shared,
            "amountMicros": amount_micros,
        }
    })
}
