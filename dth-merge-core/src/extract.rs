//! Row extraction: one worksheet of one local spreadsheet file into a [`Table`].
//!
//! The source exports start with a banner block (report title, period,
//! agency) that is not tabular. The first `skip_rows` worksheet rows are
//! ignored, the next non-blank row is the header and every later non-blank
//! row is data.

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, error, info};

use crate::config::{ExtractOptions, SheetSelector};
use crate::error::{ReadError, ReadErrorKind};
use crate::table::{ColumnId, Row, Table, Value};

/// Read the configured worksheet of `path`.
pub fn extract_table(path: &Path, options: &ExtractOptions) -> Result<Table, ReadError> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!(path = %path.display(), sheet = ?options.sheet, skip_rows = options.skip_rows, "Opening workbook");

    let range = read_range(path, &options.sheet).map_err(|kind| {
        error!(file = %file, error = %kind, "Failed to open worksheet");
        ReadError::new(&file, kind)
    })?;

    let table = table_from_range(&range, options).map_err(|kind| {
        error!(file = %file, error = %kind, "Worksheet has no usable structure");
        ReadError::new(&file, kind)
    })?;

    info!(
        file = %file,
        rows = table.total_rows(),
        columns = table.total_columns(),
        "Extracted worksheet"
    );
    Ok(table)
}

fn read_range(path: &Path, sheet: &SheetSelector) -> Result<Range<Data>, ReadErrorKind> {
    let mut workbook = open_workbook_auto(path)?;
    match sheet {
        SheetSelector::Index(index) => match workbook.worksheet_range_at(*index) {
            Some(range) => Ok(range?),
            None => Err(ReadErrorKind::SheetNotFound(format!("#{index}"))),
        },
        SheetSelector::Name(name) => {
            if !workbook.sheet_names().iter().any(|n| n == name) {
                return Err(ReadErrorKind::SheetNotFound(format!("'{name}'")));
            }
            Ok(workbook.worksheet_range(name)?)
        }
    }
}

/// Build a table from a worksheet range, skipping the banner rows.
///
/// Row offsets are absolute worksheet rows: calamine trims leading empty
/// rows from the range, so `start()` is added back before skipping.
///
/// Header cells are trimmed, blank ones become `Unnamed: <col>` and repeats
/// get `.1`, `.2` suffixes. A column with a blank header and no data in any
/// row is dropped entirely instead of surfacing as an all-empty
/// `Unnamed: <col>` column.
pub fn table_from_range(range: &Range<Data>, options: &ExtractOptions) -> Result<Table, ReadErrorKind> {
    let missing_header = || ReadErrorKind::MissingHeader {
        skip_rows: options.skip_rows,
    };
    let (start_row, start_col) = range.start().ok_or_else(missing_header)?;

    let mut rows = range
        .rows()
        .enumerate()
        .filter(|(i, _)| start_row as usize + i >= options.skip_rows)
        .map(|(_, cells)| cells)
        .filter(|cells| !cells.iter().all(is_blank_cell));

    let header_cells = rows.next().ok_or_else(missing_header)?;
    let data: Vec<&[Data]> = rows.collect();

    let text_columns: HashSet<&str> = options.text_columns.iter().map(String::as_str).collect();
    let headers = header_names(header_cells, start_col as usize);

    // Unnamed columns with no data at all are formatting leftovers.
    let keep: Vec<usize> = (0..headers.len())
        .filter(|&c| {
            headers[c].1 || data.iter().any(|cells| cells.get(c).is_some_and(|d| !is_blank_cell(d)))
        })
        .collect();

    let columns: Vec<ColumnId> = keep.iter().map(|&c| ColumnId::parse(&headers[c].0)).collect();
    let mut table = Table::new(columns.clone());

    for cells in data {
        let mut row = Row::new();
        for (column, &c) in columns.iter().zip(&keep) {
            let as_text = text_columns.contains(column.name());
            let value = cells.get(c).map_or(Value::Empty, |d| cell_value(d, as_text));
            row.set(column, value);
        }
        table.push(row);
    }
    Ok(table)
}

/// Header names with pandas-style cleanup: trimmed, `Unnamed: <n>` for blank
/// cells and `.1`, `.2` suffixes for duplicates. The flag tells whether the
/// header cell had text.
fn header_names(cells: &[Data], start_col: usize) -> Vec<(String, bool)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let text = cell_value(cell, true)
                .render()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            let named = text.is_some();
            let base = text.unwrap_or_else(|| format!("Unnamed: {}", start_col + i));
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            (name, named)
        })
        .collect()
}

fn is_blank_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Convert a worksheet cell. Text columns keep numeric identifiers as their
/// full digit string instead of a float.
fn cell_value(cell: &Data, as_text: bool) -> Value {
    let value = match cell {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::String(s) if s.is_empty() => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    };
    if as_text {
        value.render().map_or(Value::Empty, Value::Text)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(cells: &[(u32, u32, Data)]) -> Range<Data> {
        let cells = cells
            .iter()
            .map(|(r, c, d)| calamine::Cell::new((*r, *c), d.clone()))
            .collect();
        Range::from_sparse(cells)
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn skips_banner_rows_counted_from_sheet_top() {
        // Banner on rows 2 and 3 only; the used range starts on row 2.
        let r = range(&[
            (1, 0, s("DAFTAR TRANSAKSI HARIAN")),
            (2, 0, s("Periode Maret 2024")),
            (4, 0, s("NAMA")),
            (4, 1, s("ID_BILLING")),
            (5, 0, s("a")),
            (5, 1, Data::Float(1234567890123.0)),
        ]);
        let table = table_from_range(&r, &ExtractOptions::default()).unwrap();
        assert_eq!(table.columns[0].name(), "NAMA");
        assert_eq!(table.total_rows(), 1);
        assert_eq!(
            table.column_values("ID_BILLING"),
            vec![Value::Text("1234567890123".into())]
        );
    }

    #[test]
    fn blank_rows_are_dropped_and_numbers_stay_numeric() {
        let r = range(&[
            (4, 0, s("NILAI_BELANJA_SP2D")),
            (5, 0, Data::Float(1500.75)),
            (7, 0, Data::Int(20)),
        ]);
        let table = table_from_range(&r, &ExtractOptions::default()).unwrap();
        assert_eq!(
            table.column_values("NILAI_BELANJA_SP2D"),
            vec![Value::Number(1500.75), Value::Int(20)]
        );
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let r = range(&[
            (4, 0, s("KET")),
            (4, 1, s(" KET ")),
            (4, 3, s("X")),
            (5, 0, s("a")),
            (5, 1, s("b")),
            (5, 2, s("c")),
            (5, 3, s("d")),
        ]);
        let table = table_from_range(&r, &ExtractOptions::default()).unwrap();
        let names: Vec<_> = table.columns.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["KET", "KET.1", "Unnamed: 2", "X"]);
    }

    #[test]
    fn unnamed_columns_without_data_are_dropped() {
        let r = range(&[
            (4, 0, s("NAMA")),
            (4, 2, s("X")),
            (4, 4, s("  ")),
            (5, 0, s("a")),
            (5, 2, s("c")),
            (5, 3, s("d")),
            (6, 0, s("e")),
        ]);
        let table = table_from_range(&r, &ExtractOptions::default()).unwrap();
        let names: Vec<_> = table.columns.iter().map(|c| c.name().to_string()).collect();
        // Column 1 and the blank-headed column 4 hold nothing; column 3 does.
        assert_eq!(names, vec!["NAMA", "X", "Unnamed: 3"]);
        assert_eq!(
            table.column_values("Unnamed: 3"),
            vec![Value::Text("d".into()), Value::Empty]
        );
    }

    #[test]
    fn missing_header_is_an_error() {
        let r = range(&[(0, 0, s("title only"))]);
        let err = table_from_range(&r, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, ReadErrorKind::MissingHeader { skip_rows: 4 }));
    }
}
