//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets.

use crate::api::{Sheet, SheetRange};
use crate::model::CellAddress;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

/// The tab name of the seed data.
pub(crate) const SEED_TAB: &str = "GOOGLE DATA";

/// An implementation of the `Sheet` trait that does not use Google sheets. Tabs are held in
/// memory, keyed by tab name. Clones share the same tabs so that a test can inspect what the code
/// under test wrote.
#[derive(Debug, Clone, Default)]
pub struct TestSheet {
    tabs: Arc<Mutex<HashMap<String, Vec<Vec<String>>>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl TestSheet {
    /// Create a new `TestSheet` using `tabs`. The map key is the tab name and the map value is the
    /// rows of the tab.
    pub fn new(tabs: HashMap<String, Vec<Vec<String>>>) -> Self {
        Self {
            tabs: Arc::new(Mutex::new(tabs)),
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// Create a `TestSheet` holding a single tab.
    pub fn with_tab<S: Into<String>>(name: &str, rows: Vec<Vec<S>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        let mut tabs = HashMap::new();
        tabs.insert(name.to_string(), rows);
        Self::new(tabs)
    }

    /// Makes every `get` fail.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Makes every `write_ranges` fail.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// The seeded KPI tab used when running in `Mode::Test`.
    pub fn seeded() -> Result<Self> {
        let mut tabs = HashMap::new();
        tabs.insert(SEED_TAB.to_string(), load_csv(SEED_DATA)?);
        Ok(Self::new(tabs))
    }

    /// A snapshot of the rows of tab `name`.
    pub fn tab(&self, name: &str) -> Option<Vec<Vec<String>>> {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The value of a cell, where `row` 0 is the header row. `None` if the cell does not exist.
    pub fn cell(&self, name: &str, row: usize, col: usize) -> Option<String> {
        self.tab(name)?.get(row)?.get(col).cloned()
    }
}

/// Strips quotes and any cell part from a range, e.g. `'GOOGLE DATA'!A:ZZ` -> `GOOGLE DATA`.
fn tab_name(range: &str) -> &str {
    let name = range.split('!').next().unwrap_or(range);
    name.strip_prefix('\'')
        .and_then(|n| n.strip_suffix('\''))
        .unwrap_or(name)
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        if self.fail_reads {
            bail!("Unable to read '{range}'");
        }
        let name = tab_name(range);
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .with_context(|| format!("Sheet '{name}' not found"))
            .cloned()
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Result<()> {
        if self.fail_writes {
            bail!("Unable to write {} ranges", data.len());
        }
        // Validate everything first so that a bad batch writes nothing.
        let addresses = data
            .iter()
            .map(|sr| CellAddress::parse(&sr.range))
            .collect::<Result<Vec<_>>>()?;

        let mut tabs = self.tabs.lock().unwrap_or_else(PoisonError::into_inner);
        for address in &addresses {
            if !tabs.contains_key(address.sheet_name()) {
                bail!("Sheet '{}' not found", address.sheet_name());
            }
        }
        for (address, sr) in addresses.iter().zip(data) {
            let Some(rows) = tabs.get_mut(address.sheet_name()) else {
                continue;
            };
            for (r, values) in sr.values.iter().enumerate() {
                let row_index = address.row() + r;
                if rows.len() <= row_index {
                    rows.resize(row_index + 1, Vec::new());
                }
                let row = &mut rows[row_index];
                for (c, value) in values.iter().enumerate() {
                    let col_index = address.col() + c;
                    if row.len() <= col_index {
                        row.resize(col_index + 1, String::new());
                    }
                    row[col_index] = value.clone();
                }
            }
        }
        Ok(())
    }
}

/// Loads data from a CSV-formatted string. Rows may have different lengths.
fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Unable to parse seed CSV")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed KPI sheet data. Account ids appear in the shapes humans and spreadsheets produce.
const SEED_DATA: &str = r##"ACCOUNT-ID,Account Name,Under Management,Last Updated,Current Daily Budget (Total),Spend (Yesterday),Conversions (Yesterday),Total Spend,Total Spend (Last Month),Clicks,Conversions,CTR,Phone Calls,Notes
123-456-7890,Acme Plumbing,Yes,,,,,,,,,,,Top client
2345678901.0,Bright Dental,yes ,,,,,,,,,,,
345-678-9012,Corner Bakery,No,,,,,,,,,,,Paused
 456-789-0123 ,Delta Roofing,YES,,,,,,,,,,,New this month
"##;
