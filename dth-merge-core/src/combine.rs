//! Concatenation of per-file tables into the merged table.

use tracing::info;

use crate::error::CombineError;
use crate::table::Table;

/// Concatenate `tables` in order. Columns are the union of all inputs in
/// first-appearance order; rows from a table lacking a column read empty
/// for it. Rows are neither deduplicated nor reordered.
pub fn combine(tables: Vec<Table>) -> Result<Table, CombineError> {
    if tables.is_empty() {
        return Err(CombineError::NoData);
    }
    let inputs = tables.len();
    let mut merged = Table::default();
    for table in tables {
        for column in table.columns {
            if !merged.has_column(&column) {
                merged.columns.push(column);
            }
        }
        merged.rows.extend(table.rows);
    }
    info!(
        inputs,
        total_rows = merged.total_rows(),
        total_columns = merged.total_columns(),
        "Combined tables"
    );
    Ok(merged)
}
