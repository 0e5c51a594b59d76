//! Spreadsheet column addressing and the header → metric key mapping.

use crate::model::MetricKey;
use anyhow::{bail, Context};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// Converts a zero-based column index to A1 column letters: 0 → `A`, 25 → `Z`, 26 → `AA`,
/// 701 → `ZZ`, 702 → `AAA`. The scheme is bijective base-26, there is no zero digit.
pub fn column_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// The inverse of `column_letters`. Returns `None` for an empty or non-alphabetic string.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n - 1)
}

/// A single cell address in A1 notation on a named tab, e.g. `'GOOGLE DATA'!C5`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellAddress {
    sheet_name: String,
    /// Zero-based index into the table, where row 0 is the header.
    row: usize,
    /// Zero-based column index.
    col: usize,
}

impl CellAddress {
    pub fn new(sheet_name: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            row,
            col,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    /// Parses an address such as `'GOOGLE DATA'!AB12` or `Sheet1!A1`.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let (sheet, cell) = s
            .rsplit_once('!')
            .with_context(|| format!("Cell address '{s}' has no sheet name"))?;
        let sheet_name = sheet
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(sheet);
        let split = cell
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Cell address '{s}' has no row number"))?;
        let (letters, digits) = cell.split_at(split);
        let col = column_index(letters)
            .with_context(|| format!("Cell address '{s}' has an invalid column"))?;
        let row_number: usize = digits
            .parse()
            .with_context(|| format!("Cell address '{s}' has an invalid row number"))?;
        if row_number == 0 {
            bail!("Cell address '{s}' has row number zero, rows are 1-based");
        }
        Ok(Self::new(sheet_name, row_number - 1, col))
    }
}

impl Display for CellAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}'!{}{}",
            self.sheet_name,
            column_letters(self.col),
            self.row + 1
        )
    }
}

/// Maps spreadsheet header text to the metric key written under it.
///
/// The mapping is one-to-one: a header appears at most once and no two headers share a metric
/// key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnMapping {
    entries: HashMap<String, MetricKey>,
}

impl ColumnMapping {
    /// Create a new `ColumnMapping` from `(header, metric key)` pairs. Headers are trimmed.
    ///
    /// # Errors
    /// - A header is empty or appears twice
    /// - Two headers map to the same metric key
    /// - A metric key is unknown
    pub fn new<H, K, I>(pairs: I) -> crate::Result<Self>
    where
        H: AsRef<str>,
        K: AsRef<str>,
        I: IntoIterator<Item = (H, K)>,
    {
        let mut entries = HashMap::new();
        let mut seen_keys = HashSet::new();
        for (header, key) in pairs {
            let header = header.as_ref().trim();
            if header.is_empty() {
                bail!("A column mapping header must not be empty");
            }
            let key: MetricKey = key
                .as_ref()
                .parse()
                .with_context(|| format!("Invalid column mapping for header '{header}'"))?;
            if !seen_keys.insert(key) {
                bail!("Encountered a duplicate metric key '{key}' (header '{header}')");
            }
            if entries.insert(header.to_string(), key).is_some() {
                bail!("Encountered a duplicate header '{header}'");
            }
        }
        Ok(Self { entries })
    }

    /// Looks up the metric key for a header as it appears in the sheet.
    pub fn get(&self, header: &str) -> Option<MetricKey> {
        self.entries.get(header.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The KPI hub sheet layout.
    pub fn builtin() -> crate::Result<Self> {
        let mut pairs: Vec<(String, String)> = DEFAULT_FIXED
            .iter()
            .map(|(h, k)| (h.to_string(), k.to_string()))
            .collect();
        for (label, key) in DEFAULT_LABELS {
            for (header_suffix, key_suffix) in DEFAULT_PERIOD_LABELS {
                pairs.push((format!("{label}{header_suffix}"), format!("{key}{key_suffix}")));
            }
        }
        for (h, k) in DEFAULT_CURRENT_ONLY {
            pairs.push((h.to_string(), k.to_string()));
        }
        Self::new(pairs).context("The built-in column mapping is invalid")
    }
}

const DEFAULT_FIXED: &[(&str, &str)] = &[
    ("ACCOUNT-ID", "customer_id"),
    ("Account Name", "account_name"),
    ("Last Updated", "last_updated"),
    ("Current Daily Budget (Total)", "daily_budget"),
    ("Spend (Yesterday)", "spend_yesterday"),
    ("Spend (2 Days Ago)", "spend_2_days_ago"),
    ("Spend (3 Days Ago)", "spend_3_days_ago"),
    ("Conversions (Yesterday)", "conversions_yesterday"),
];

const DEFAULT_PERIOD_LABELS: &[(&str, &str)] = &[
    ("", ""),
    (" (Last Month)", "_last_month"),
    (" (2 Months Ago)", "_2_months_ago"),
    (" (1 Year Ago)", "_1_year_ago"),
];

/// Header labels that get one column per monthly period.
const DEFAULT_LABELS: &[(&str, &str)] = &[
    ("Total Spend", "cost"),
    ("CPA", "cost_per_conversion"),
    ("Conversions", "conversions"),
    ("Cost Per All Conversions", "cost_per_all_conversions"),
    ("Conversion Rate", "conversion_rate"),
    ("Conversion Value", "conversion_value"),
    ("All Conversions", "all_conversions"),
    ("All Conversion Rate", "all_conversion_rate"),
    ("All Conversion Value", "all_conversion_value"),
    ("Clicks", "clicks"),
    ("Interactions", "interactions"),
    ("Interaction Rate", "interaction_rate"),
    ("Impressions", "impressions"),
    ("CTR", "ctr"),
    ("Avg. CPC", "average_cpc"),
    ("Search Impression Share", "search_impression_share"),
    ("Search Exact Match IS", "search_exact_match_impression_share"),
    ("Search Lost IS: Budget", "search_budget_lost_impression_share"),
    ("Search Lost IS: Rank", "search_rank_lost_impression_share"),
    ("Impr. (Abs. Top) %", "absolute_top_impression_percentage"),
    ("Top Impression %", "top_impression_percentage"),
    ("Engagements", "engagements"),
    ("Engagement Rate", "engagement_rate"),
    ("Average CPM", "average_cpm"),
    ("Average CPV", "average_cpv"),
    ("Average Cost", "average_cost"),
    ("ActiveView CPM (Avg)", "active_view_cpm"),
    ("Measurable Rate", "active_view_measurability"),
    ("Measurable Cost", "active_view_measurable_cost_micros"),
    ("Invalid Clicks", "invalid_clicks"),
    ("Invalid Click Rate", "invalid_click_rate"),
    ("Phone Calls", "phone_calls"),
    ("Phone Impressions", "phone_impressions"),
    ("Phone Through Rate", "phone_through_rate"),
];

/// Headers that only exist for the current period.
const DEFAULT_CURRENT_ONLY: &[(&str, &str)] = &[
    ("Content Impression Share", "content_impression_share"),
    (
        "Content Budget Lost Impression Share",
        "content_budget_lost_impression_share",
    ),
    (
        "Content Rank Lost Impression Share",
        "content_rank_lost_impression_share",
    ),
];
