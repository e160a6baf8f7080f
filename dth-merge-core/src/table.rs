//! Tabular data model shared by every pipeline stage.
//!
//! A [`Table`] is an ordered list of columns plus rows. Rows keep the
//! rule-bearing columns ([`KnownColumn`]) in a typed map and everything else
//! in an overflow map keyed by header text, so normalization dispatch is an
//! exhaustive `match` while arbitrary extra columns still survive the merge.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single cell value as read from a worksheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Text form of the value, or `None` when the cell is empty.
    ///
    /// Integral floats render without a fractional part so numeric
    /// identifiers keep every digit (`1234567890123.0` -> `1234567890123`).
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Empty => None,
            Value::Text(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(render_float(*n)),
            Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

fn render_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e18 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render().as_deref().unwrap_or(""))
    }
}

/// Columns that carry a normalization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KnownColumn {
    NilaiBelanjaSp2d,
    JumlahPajak,
    KodeAkunBelanja,
    NpwpBendahara,
    IdBilling,
    KodeAkunPotonganPajak,
}

/// Semantic class of a known column; each class has exactly one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Currency,
    BudgetAccountCode,
    TaxIdentifier,
    BillingId,
    TaxDeductionCode,
}

impl KnownColumn {
    pub const ALL: [KnownColumn; 6] = [
        KnownColumn::NilaiBelanjaSp2d,
        KnownColumn::JumlahPajak,
        KnownColumn::KodeAkunBelanja,
        KnownColumn::NpwpBendahara,
        KnownColumn::IdBilling,
        KnownColumn::KodeAkunPotonganPajak,
    ];

    pub const fn header(&self) -> &'static str {
        match self {
            KnownColumn::NilaiBelanjaSp2d => "NILAI_BELANJA_SP2D",
            KnownColumn::JumlahPajak => "JUMLAH_PAJAK",
            KnownColumn::KodeAkunBelanja => "KODE_AKUN_BELANJA",
            KnownColumn::NpwpBendahara => "NPWP_BENDAHARA",
            KnownColumn::IdBilling => "ID_BILLING",
            KnownColumn::KodeAkunPotonganPajak => "KODE_AKUN_POTONGAN_PAJAK",
        }
    }

    pub const fn class(&self) -> ColumnClass {
        match self {
            KnownColumn::NilaiBelanjaSp2d | KnownColumn::JumlahPajak => ColumnClass::Currency,
            KnownColumn::KodeAkunBelanja => ColumnClass::BudgetAccountCode,
            KnownColumn::NpwpBendahara => ColumnClass::TaxIdentifier,
            KnownColumn::IdBilling => ColumnClass::BillingId,
            KnownColumn::KodeAkunPotonganPajak => ColumnClass::TaxDeductionCode,
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == header)
    }
}

/// Column identity: a rule-bearing column or any other header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnId {
    Known(KnownColumn),
    Other(String),
}

impl ColumnId {
    pub fn parse(header: &str) -> Self {
        match KnownColumn::from_header(header) {
            Some(known) => ColumnId::Known(known),
            None => ColumnId::Other(header.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ColumnId::Known(k) => k.header(),
            ColumnId::Other(name) => name,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One data row. Missing cells read as [`Value::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    known: BTreeMap<KnownColumn, Value>,
    overflow: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &ColumnId) -> &Value {
        static EMPTY: Value = Value::Empty;
        match column {
            ColumnId::Known(k) => self.known.get(k).unwrap_or(&EMPTY),
            ColumnId::Other(name) => self.overflow.get(name).unwrap_or(&EMPTY),
        }
    }

    pub fn set(&mut self, column: &ColumnId, value: Value) {
        match column {
            ColumnId::Known(k) => {
                self.known.insert(*k, value);
            }
            ColumnId::Other(name) => {
                self.overflow.insert(name.clone(), value);
            }
        }
    }

    pub fn known(&self, column: KnownColumn) -> &Value {
        self.get(&ColumnId::Known(column))
    }

    /// Builder-style setter, handy for assembling rows in tests.
    pub fn with(mut self, header: &str, value: Value) -> Self {
        self.set(&ColumnId::parse(header), value);
        self
    }

    pub(crate) fn known_mut(&mut self, column: KnownColumn) -> &mut Value {
        self.known.entry(column).or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.known.values().all(Value::is_empty) && self.overflow.values().all(Value::is_empty)
    }
}

/// Ordered columns plus rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<ColumnId>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<ColumnId>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_headers(headers: &[&str]) -> Self {
        Self::new(headers.iter().map(|h| ColumnId::parse(h)).collect())
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn total_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, column: &ColumnId) -> bool {
        self.columns.contains(column)
    }

    /// All values of a column in row order.
    pub fn column_values(&self, header: &str) -> Vec<Value> {
        let id = ColumnId::parse(header);
        self.rows.iter().map(|r| r.get(&id).clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_drops_integral_fraction() {
        assert_eq!(
            Value::Number(1234567890123.0).render().as_deref(),
            Some("1234567890123")
        );
        assert_eq!(Value::Number(12.5).render().as_deref(), Some("12.5"));
        assert_eq!(Value::Number(f64::NAN).render(), None);
        assert_eq!(Value::Empty.render(), None);
    }

    #[test]
    fn headers_map_to_known_columns() {
        assert_eq!(
            ColumnId::parse("ID_BILLING"),
            ColumnId::Known(KnownColumn::IdBilling)
        );
        assert_eq!(
            ColumnId::parse("NAMA_SATKER"),
            ColumnId::Other("NAMA_SATKER".into())
        );
        for column in KnownColumn::ALL {
            assert_eq!(KnownColumn::from_header(column.header()), Some(column));
        }
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let row = Row::new().with("NAMA_SATKER", Value::Text("A".into()));
        assert_eq!(row.get(&ColumnId::parse("ID_BILLING")), &Value::Empty);
        assert_eq!(row.get(&ColumnId::parse("OTHER")), &Value::Empty);
        assert!(!row.is_blank());
        assert!(Row::new().with("X", Value::Empty).is_blank());
    }
}
