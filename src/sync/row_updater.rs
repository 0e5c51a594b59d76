use crate::api::{Sheet, SheetRange};
use crate::model::{CellAddress, ColumnMapping, MetricRecord};
use crate::Result;
use anyhow::{bail, Context};
use tracing::trace;

/// A single cell value to write.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CellWrite {
    pub address: CellAddress,
    pub value: String,
}

/// Turns a `MetricRecord` into writes for the mapped columns of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowUpdater<'a> {
    sheet_name: &'a str,
    columns: &'a ColumnMapping,
}

impl<'a> RowUpdater<'a> {
    pub fn new(sheet_name: &'a str, columns: &'a ColumnMapping) -> Self {
        Self {
            sheet_name,
            columns,
        }
    }

    /// One write per mapped header. A mapped column without a value is cleared rather than
    /// skipped.
    pub fn build_updates(
        &self,
        row_index: usize,
        headers: &[String],
        record: &MetricRecord,
    ) -> Vec<CellWrite> {
        headers
            .iter()
            .enumerate()
            .filter_map(|(col, header)| {
                let key = self.columns.get(header)?;
                let value = record.get(key).map(|v| v.to_string()).unwrap_or_default();
                Some(CellWrite {
                    address: CellAddress::new(self.sheet_name, row_index, col),
                    value,
                })
            })
            .collect()
    }

    /// Writes all `writes` as one batch.
    ///
    /// # Errors
    /// - `writes` is empty or the batch is rejected.
    pub async fn apply(&self, sheet: &mut dyn Sheet, writes: &[CellWrite]) -> Result<()> {
        if writes.is_empty() {
            bail!("no mapped columns");
        }
        let ranges: Vec<SheetRange> = writes
            .iter()
            .map(|w| SheetRange::cell(w.address.to_string(), w.value.clone()))
            .collect();
        trace!("Writing {} cells", ranges.len());
        sheet
            .write_ranges(&ranges)
            .await
            .context("Failed to write the row")
    }
}
