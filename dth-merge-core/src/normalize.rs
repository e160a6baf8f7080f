//! Column normalization applied to the merged table.
//!
//! Each [`KnownColumn`] belongs to one [`ColumnClass`] and each class has one
//! rule. Columns missing from the table are left alone; columns without a
//! rule pass through unchanged. Every rule is idempotent.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::table::{ColumnClass, ColumnId, KnownColumn, Table, Value};

/// Apply every column rule to `table`.
pub fn normalize(mut table: Table) -> Table {
    for column in KnownColumn::ALL {
        if !table.has_column(&ColumnId::Known(column)) {
            continue;
        }
        let class = column.class();
        for row in &mut table.rows {
            let cell = row.known_mut(column);
            *cell = apply_rule(class, cell);
        }
        debug!(column = column.header(), ?class, rows = table.rows.len(), "Normalized column");
    }
    table
}

pub fn apply_rule(class: ColumnClass, value: &Value) -> Value {
    match class {
        ColumnClass::Currency => Value::Int(currency(value)),
        ColumnClass::BudgetAccountCode => Value::Text(budget_account_code(value)),
        ColumnClass::TaxIdentifier => Value::Text(tax_identifier(value)),
        ColumnClass::BillingId => Value::Text(billing_id(value)),
        ColumnClass::TaxDeductionCode => Value::Text(tax_deduction_code(value)),
    }
}

/// Whole currency units. Fractions are truncated toward zero; anything that
/// is not a finite number becomes zero.
pub fn currency(value: &Value) -> i64 {
    let number = match value {
        Value::Int(i) => return *i,
        Value::Number(n) => *n,
        Value::Bool(b) => return i64::from(*b),
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return 0,
        },
        Value::Empty | Value::DateTime(_) => return 0,
    };
    if number.is_finite() {
        number.trunc() as i64
    } else {
        0
    }
}

/// `"5.2.01.01 "` -> `"520101"`.
pub fn budget_account_code(value: &Value) -> String {
    value
        .render()
        .map(|s| s.replace('.', "").trim().to_string())
        .unwrap_or_default()
}

/// Digits only: `"12.345.678-9"` -> `"123456789"`.
pub fn tax_identifier(value: &Value) -> String {
    static NON_DIGIT: OnceLock<Regex> = OnceLock::new();
    let re = NON_DIGIT.get_or_init(|| Regex::new(r"[^\d]").expect("static pattern"));
    value
        .render()
        .map(|s| re.replace_all(&s, "").into_owned())
        .unwrap_or_default()
}

/// Drop the `.0` left behind by float-to-text conversion upstream.
pub fn billing_id(value: &Value) -> String {
    let Some(text) = value.render() else {
        return String::new();
    };
    let mut id = text.as_str();
    while let Some(stripped) = id.strip_suffix(".0") {
        id = stripped;
    }
    id.to_string()
}

/// `" 411211-100 "` -> `"411211"`.
pub fn tax_deduction_code(value: &Value) -> String {
    let Some(text) = value.render() else {
        return String::new();
    };
    let mut code = text.trim();
    while let Some(stripped) = code.strip_suffix("-100") {
        code = stripped.trim();
    }
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn currency_truncates_toward_zero() {
        assert_eq!(currency(&text("1500.75")), 1500);
        assert_eq!(currency(&text("-3.9")), -3);
        assert_eq!(currency(&Value::Number(99.99)), 99);
        assert_eq!(currency(&Value::Int(42)), 42);
    }

    #[test]
    fn currency_unparseable_becomes_zero() {
        assert_eq!(currency(&text("abc")), 0);
        assert_eq!(currency(&text("1,500")), 0);
        assert_eq!(currency(&Value::Empty), 0);
        assert_eq!(currency(&Value::Number(f64::NAN)), 0);
        assert_eq!(currency(&Value::Number(f64::INFINITY)), 0);
    }

    #[test]
    fn currency_rule_is_idempotent() {
        for input in [text("1500.75"), text("abc"), Value::Number(-12.5), Value::Empty] {
            let once = apply_rule(ColumnClass::Currency, &input);
            let twice = apply_rule(ColumnClass::Currency, &once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn tax_identifier_keeps_digits_only() {
        assert_eq!(tax_identifier(&text("12.345.678-9")), "123456789");
        assert_eq!(tax_identifier(&Value::Int(123)), "123");
        assert_eq!(tax_identifier(&Value::Empty), "");
    }

    #[test]
    fn billing_id_strips_float_artifact() {
        assert_eq!(billing_id(&text("1234567890123.0")), "1234567890123");
        assert_eq!(billing_id(&text("1234567890123")), "1234567890123");
        assert_eq!(billing_id(&text("12.05")), "12.05");
        assert_eq!(billing_id(&Value::Empty), "");
    }

    #[test]
    fn tax_deduction_code_strips_suffix_and_whitespace() {
        assert_eq!(tax_deduction_code(&text(" 411211-100 ")), "411211");
        assert_eq!(tax_deduction_code(&text("411211")), "411211");
        assert_eq!(tax_deduction_code(&Value::Empty), "");
    }

    #[test]
    fn budget_account_code_strips_dots() {
        assert_eq!(budget_account_code(&text(" 5.2.01.01 ")), "520101");
        assert_eq!(budget_account_code(&Value::Empty), "");
    }

    #[test]
    fn text_rules_are_idempotent() {
        let inputs = [
            text(" 411211-100-100 "),
            text("1.0.0"),
            text("12.345.678-9"),
            text(" 5.2.01 "),
            Value::Empty,
        ];
        for class in [
            ColumnClass::BudgetAccountCode,
            ColumnClass::TaxIdentifier,
            ColumnClass::BillingId,
            ColumnClass::TaxDeductionCode,
        ] {
            for input in &inputs {
                let once = apply_rule(class, input);
                assert_eq!(apply_rule(class, &once), once, "{class:?} on {input:?}");
            }
        }
    }

    #[test]
    fn absent_columns_are_not_added() {
        let mut table = Table::from_headers(&["NAMA", "ID_BILLING"]);
        table.push(
            Row::new()
                .with("NAMA", text("Satker A"))
                .with("ID_BILLING", text("77.0")),
        );
        let out = normalize(table);
        assert_eq!(out.total_columns(), 2);
        assert_eq!(out.column_values("ID_BILLING"), vec![text("77")]);
        assert_eq!(out.column_values("NAMA"), vec![text("Satker A")]);
        assert_eq!(out.rows[0].known(KnownColumn::JumlahPajak), &Value::Empty);
    }
}
