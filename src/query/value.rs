//! Predicate values.
//!
//! Users type predicate values as text. [`PredicateValue::parse`] turns that
//! text into a typed literal using the column's type, so that `5` against an
//! integer column renders as `5` while `5` against a text column renders as
//! `'5'`. Literals only ever reach SQL through [`Expr::Literal`], which
//! escapes them for the target dialect.

use serde::{Deserialize, Serialize};

use super::spec::Operator;
use crate::sql::{Expr, Literal};
use crate::types::ColumnType;

/// A typed predicate value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    /// No value: `IS NULL` / `IS NOT NULL`, or nothing entered yet.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Values of an `IN` list.
    List(Vec<PredicateValue>),
}

impl PredicateValue {
    /// Parse user-entered text for `operator` against a column of `column_type`.
    ///
    /// Surrounding single quotes are stripped. Numbers are only recognized
    /// for numeric columns and booleans only for boolean columns; anything
    /// else is kept as text. `IN` values are comma separated; a comma inside
    /// a quoted item belongs to the item. Blank text is no value at all
    /// (`''` is the empty string).
    pub fn parse(text: &str, column_type: ColumnType, operator: Operator) -> Self {
        if !operator.takes_value() || text.trim().is_empty() {
            return PredicateValue::None;
        }
        match operator {
            Operator::Like => PredicateValue::Text(unquote(text.trim()).to_string()),
            Operator::In => PredicateValue::List(
                split_list(text)
                    .into_iter()
                    .filter(|item| !item.is_empty())
                    .map(|item| scalar(item, column_type))
                    .collect(),
            ),
            _ => scalar(text.trim(), column_type),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PredicateValue::None)
    }

    /// The literal expression for a scalar value. Lists render their items
    /// through [`PredicateValue::to_exprs`].
    pub fn to_expr(&self) -> Expr {
        Expr::Literal(match self {
            PredicateValue::None | PredicateValue::List(_) => Literal::Null,
            PredicateValue::Bool(b) => Literal::Bool(*b),
            PredicateValue::Int(n) => Literal::Int(*n),
            PredicateValue::Float(f) => Literal::Float(*f),
            PredicateValue::Text(s) => Literal::String(s.clone()),
        })
    }

    /// Literal expressions for an `IN` list. A scalar is a one-item list.
    pub fn to_exprs(&self) -> Vec<Expr> {
        match self {
            PredicateValue::None => vec![],
            PredicateValue::List(items) => items
                .iter()
                .filter(|item| !item.is_none())
                .map(PredicateValue::to_expr)
                .collect(),
            scalar => vec![scalar.to_expr()],
        }
    }
}

impl std::fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateValue::None => Ok(()),
            PredicateValue::Bool(b) => write!(f, "{b}"),
            PredicateValue::Int(n) => write!(f, "{n}"),
            PredicateValue::Float(v) => write!(f, "{v}"),
            PredicateValue::Text(s) => write!(f, "{s}"),
            PredicateValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

fn scalar(text: &str, column_type: ColumnType) -> PredicateValue {
    let text = unquote(text);
    let typed = match column_type {
        ColumnType::Integer | ColumnType::Float => number(text),
        ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" => Some(PredicateValue::Bool(true)),
            "false" => Some(PredicateValue::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    typed.unwrap_or_else(|| PredicateValue::Text(text.to_string()))
}

fn number(text: &str) -> Option<PredicateValue> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(PredicateValue::Int(n));
    }
    // "nan" and "inf" parse as floats but have no SQL literal
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(PredicateValue::Float)
}

/// Split an `IN` list on commas that are not inside a quoted item.
fn split_list(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let end = quoted_item_end(rest)
            .or_else(|| rest.find(','))
            .unwrap_or(rest.len());
        items.push(rest[..end].trim());
        rest = rest[end..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    items
}

/// End of a leading `'...'` item: the first closing quote followed by a
/// comma or the end of the text.
fn quoted_item_end(text: &str) -> Option<usize> {
    if !text.starts_with('\'') {
        return None;
    }
    text.char_indices()
        .skip(1)
        .filter(|&(_, c)| c == '\'')
        .map(|(i, _)| i + 1)
        .find(|&end| {
            let after = text[end..].trim_start();
            after.is_empty() || after.starts_with(',')
        })
}

/// Strip one pair of surrounding single quotes.
fn unquote(text: &str) -> &str {
    text.strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text)
}
