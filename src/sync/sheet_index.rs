//! The KPI table as read from the sheet, and account lookups against it.

use crate::api::Sheet;
use crate::model::AccountId;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Normalized header names accepted for the account id column.
const ACCOUNT_HEADERS: [&str; 3] = ["ACCOUNT-ID", "ACCOUNT_ID", "ACCOUNTID"];

/// How accounts are chosen for a run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Eligibility {
    /// Only rows whose cell in this column reads `yes`.
    ManagementColumn(usize),
    /// The sheet has no management column, so every row with an account id is synced.
    AllAccounts,
}

/// The header row and body rows of the KPI tab. Row 0 is the header. Rows may be ragged.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SheetIndex {
    rows: Vec<Vec<String>>,
}

impl SheetIndex {
    /// Reads every row of `sheet_name`.
    ///
    /// # Errors
    /// - The tab cannot be read or holds no rows at all.
    pub async fn load(sheet: &mut dyn Sheet, sheet_name: &str) -> Result<Self> {
        let rows = sheet
            .get(&format!("'{sheet_name}'"))
            .await
            .with_context(|| format!("Unable to read sheet '{sheet_name}'"))?;
        Self::from_rows(rows).with_context(|| format!("Sheet '{sheet_name}' is empty"))
    }

    /// Wraps rows that were already read.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        if rows.is_empty() {
            bail!("No header row");
        }
        debug!("Loaded {} rows", rows.len());
        Ok(Self { rows })
    }

    pub fn headers(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or_default()
    }

    /// The number of rows, including the header.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The cell at `row`, `col`, or an empty string past the end of a ragged row.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The index of the account id column.
    ///
    /// # Errors
    /// - No header names the account id column.
    pub fn account_column(&self) -> Result<usize> {
        self.headers()
            .iter()
            .position(|h| {
                let normalized = h.trim().to_uppercase().replace(' ', "-");
                ACCOUNT_HEADERS.contains(&normalized.as_str())
            })
            .with_context(|| {
                format!(
                    "Account ID column not found; expected one of {}",
                    ACCOUNT_HEADERS.join(", ")
                )
            })
    }

    /// Finds the management column, the first header mentioning both `UNDER` and `MANAGEMENT`.
    pub fn eligibility(&self) -> Eligibility {
        self.headers()
            .iter()
            .position(|h| {
                let upper = h.to_uppercase();
                upper.contains("UNDER") && upper.contains("MANAGEMENT")
            })
            .map(Eligibility::ManagementColumn)
            .unwrap_or(Eligibility::AllAccounts)
    }

    /// The accounts to sync, in table order, each at most once.
    ///
    /// # Errors
    /// - The account id column is missing.
    pub fn eligible_accounts(&self) -> Result<Vec<AccountId>> {
        let account_col = self.account_column()?;
        let eligibility = self.eligibility();
        if eligibility == Eligibility::AllAccounts {
            warn!("No 'Under Management' column found, syncing every account in the sheet");
        }

        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        for row in 1..self.rows.len() {
            let account = AccountId::new(self.cell(row, account_col));
            if account.is_empty() {
                continue;
            }
            if let Eligibility::ManagementColumn(col) = eligibility {
                if self.cell(row, col).trim().to_lowercase() != "yes" {
                    continue;
                }
            }
            if seen.insert(account.clone()) {
                accounts.push(account);
            } else {
                debug!("Account {account} appears more than once, using the first row");
            }
        }
        Ok(accounts)
    }

    /// The index of the first body row holding `account`, where the header is row 0.
    ///
    /// # Errors
    /// - The account id column is missing.
    pub fn locate_row(&self, account: &AccountId) -> Result<Option<usize>> {
        let account_col = self.account_column()?;
        Ok((1..self.rows.len()).find(|&row| AccountId::new(self.cell(row, account_col)) == *account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheet;

    fn index(rows: Vec<Vec<&str>>) -> SheetIndex {
        SheetIndex::from_rows(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_account_column_variants() {
        for header in ["ACCOUNT-ID", " account id ", "Account_ID", "accountid"] {
            let index = index(vec![vec!["Name", header]]);
            assert_eq!(index.account_column().unwrap(), 1, "{header}");
        }
        let index = index(vec![vec!["Name", "Customer"]]);
        assert!(index.account_column().is_err());
        assert!(index.eligible_accounts().is_err());
    }

    #[test]
    fn test_eligible_accounts_with_management_column() {
        let index = index(vec![
            vec!["ACCOUNT-ID", "Name", "Under Management"],
            vec!["123-456-7890", "A", "Yes"],
            vec!["2345678901.0", "B", " yes "],
            vec!["345-678-9012", "C", "No"],
            vec!["", "D", "yes"],
            vec!["1234567890", "A again", "yes"],
            vec!["456-789-0123", "short row"],
        ]);
        assert_eq!(index.eligibility(), Eligibility::ManagementColumn(2));
        let accounts = index.eligible_accounts().unwrap();
        assert_eq!(
            accounts,
            vec![AccountId::new("1234567890"), AccountId::new("2345678901")]
        );
    }

    #[test]
    fn test_management_column_word_order() {
        let index = index(vec![
            vec!["ACCOUNT-ID", "Managed by", "management (under)", "Under Management 2"],
            vec!["123-456-7890", "yes", "YES", "no"],
            vec!["345-678-9012", "yes", "no", "yes"],
        ]);
        assert_eq!(index.eligibility(), Eligibility::ManagementColumn(2));
        assert_eq!(
            index.eligible_accounts().unwrap(),
            vec![AccountId::new("1234567890")]
        );
    }

    #[test]
    fn test_eligible_accounts_without_management_column() {
        let index = index(vec![
            vec!["Account ID", "Name"],
            vec!["123-456-7890", "A"],
            vec!["  ", "B"],
            vec!["345-678-9012"],
        ]);
        assert_eq!(index.eligibility(), Eligibility::AllAccounts);
        assert_eq!(index.eligible_accounts().unwrap().len(), 2);
    }

    #[test]
    fn test_locate_row() {
        let index = index(vec![
            vec!["Name", "ACCOUNT-ID"],
            vec!["A", " 123-456-7890 "],
            vec!["B", "2345678901.0"],
            vec!["B again", "234-567-8901"],
        ]);
        assert_eq!(
            index.locate_row(&AccountId::new("1234567890")).unwrap(),
            Some(1)
        );
        assert_eq!(
            index.locate_row(&AccountId::new("234-567-8901")).unwrap(),
            Some(2)
        );
        assert_eq!(index.locate_row(&AccountId::new("999")).unwrap(), None);
    }

    #[test]
    fn test_ragged_cells() {
        let index = index(vec![vec!["A", "B", "C"], vec!["x"]]);
        assert_eq!(index.cell(1, 0), "x");
        assert_eq!(index.cell(1, 2), "");
        assert_eq!(index.cell(9, 9), "");
        assert_eq!(index.headers().len(), 3);
    }

    #[tokio::test]
    async fn test_load() {
        let mut sheet = TestSheet::with_tab("GOOGLE DATA", vec![vec!["ACCOUNT-ID"], vec!["1"]]);
        let index = SheetIndex::load(&mut sheet, "GOOGLE DATA").await.unwrap();
        assert_eq!(index.len(), 2);

        let mut empty = TestSheet::with_tab::<String>("GOOGLE DATA", vec![]);
        assert!(SheetIndex::load(&mut empty, "GOOGLE DATA").await.is_err());
        assert!(SheetIndex::load(&mut sheet, "Missing").await.is_err());
    }
}
