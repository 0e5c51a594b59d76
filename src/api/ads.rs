//! Implements the `Reporting` trait over the Google Ads REST `searchStream` endpoint.

use crate::api::Reporting;
use crate::model::AccountId;
use crate::{Config, Result};
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

const BASE_URL: &str = "https://googleads.googleapis.com";
const TIMEOUT: Duration = Duration::from_secs(60);

pub(super) struct GoogleAds {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    developer_token: String,
    login_customer_id: Option<AccountId>,
    access_token: String,
}

/// One streamed batch. Batches for queries without matches carry no `results`.
#[derive(Debug, Deserialize)]
struct SearchStreamBatch {
    #[serde(default)]
    results: Vec<Value>,
}

impl GoogleAds {
    pub(super) async fn new(config: &Config) -> Result<Self> {
        let access_token = config.ads_token().await?;
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("Failed to create the reporting HTTP client")?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            api_version: config.api_version().to_string(),
            developer_token: config.developer_token().to_string(),
            login_customer_id: config.login_customer_id().cloned(),
            access_token,
        })
    }

    fn search_url(&self, account: &AccountId) -> String {
        format!(
            "{}/{}/customers/{account}/googleAds:searchStream",
            self.base_url, self.api_version
        )
    }
}

#[async_trait::async_trait]
impl Reporting for GoogleAds {
    async fn search(&self, account: &AccountId, query: &str) -> Result<Vec<Value>> {
        let url = self.search_url(account);
        trace!("searchStream for {account}: {query}");

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("developer-token", &self.developer_token)
            .json(&serde_json::json!({ "query": query }));
        if let Some(login) = &self.login_customer_id {
            request = request.header("login-customer-id", login.as_str());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Reporting request for {account} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Reporting API returned {status} for {account}: {body}");
        }

        let batches: Vec<SearchStreamBatch> = response
            .json()
            .await
            .with_context(|| format!("Unable to parse the reporting response for {account}"))?;
        Ok(flatten(batches))
    }
}

fn flatten(batches: Vec<SearchStreamBatch>) -> Vec<Value> {
    batches.into_iter().flat_map(|b| b.results).collect()
}
