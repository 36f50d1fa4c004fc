use serde_json::Value as JsonValue;

use crate::data::model::CellValue;
use crate::error::CellError;

use super::parser::parse_selector;

// ---------------------------------------------------------------------------
// Selector – the structured form of a phenotype description
// ---------------------------------------------------------------------------

/// A rule that picks a subset of the rows of a cell table.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every row (`Total Cells`, `All`).
    All,
    /// Rows whose phenotype is any of these names.
    AnyOf(Vec<String>),
    /// Rows matching every sub-selector.
    AllOf(Vec<Selector>),
    /// Rows satisfying an expression over table columns.
    Predicate(Predicate),
}

impl Selector {
    pub fn phenotype(name: &str) -> Self {
        Selector::AnyOf(vec![name.to_string()])
    }

    /// Convert a JSON selector description.
    ///
    /// * string → phenotype description grammar
    /// * array → conjunction of its elements
    /// * `{"any_of": [..]}` → phenotype names, OR-ed
    /// * any other object → [`Predicate`]
    pub fn from_json(value: &JsonValue) -> Result<Self, CellError> {
        match value {
            JsonValue::String(s) => parse_selector(s),
            JsonValue::Array(items) => items
                .iter()
                .map(Selector::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Selector::AllOf),
            JsonValue::Object(obj) => match obj.get("any_of") {
                Some(JsonValue::Array(names)) => names
                    .iter()
                    .map(|n| json_string(n, "phenotype name").map(|s| s.trim().to_string()))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Selector::AnyOf),
                Some(other) => Err(CellError::Type(format!(
                    "'any_of' expects a list of phenotype names, got {other}"
                ))),
                None => Predicate::from_json(value).map(Selector::Predicate),
            },
            other => Err(CellError::Type(format!(
                "expected a phenotype string, list or predicate object, got {other}"
            ))),
        }
    }
}

pub(crate) fn json_string<'a>(value: &'a JsonValue, what: &str) -> Result<&'a str, CellError> {
    value
        .as_str()
        .ok_or_else(|| CellError::Type(format!("{what} must be a string, got {value}")))
}

// ---------------------------------------------------------------------------
// Predicate – column expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "==" | "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub(crate) fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ord == Equal,
            CompareOp::Ne => ord != Equal,
            CompareOp::Lt => ord == Less,
            CompareOp::Le => ord != Greater,
            CompareOp::Gt => ord == Greater,
            CompareOp::Ge => ord != Less,
        }
    }
}

/// A boolean expression over the columns of a cell table, e.g.
/// `Entire Cell PDL1 Mean > 3`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: CellValue,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: &str, op: CompareOp, value: impl Into<CellValue>) -> Self {
        Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn gt(column: &str, value: impl Into<CellValue>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn lt(column: &str, value: impl Into<CellValue>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn eq(column: &str, value: impl Into<CellValue>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Columns this expression reads, in first-use order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_columns(out);
                }
            }
            Predicate::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Parse `{"column": .., "op": .., "value": ..}`, `{"and": [..]}`,
    /// `{"or": [..]}` or `{"not": ..}`.
    pub fn from_json(value: &JsonValue) -> Result<Self, CellError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CellError::Type(format!("predicate must be an object, got {value}")))?;

        if let Some(parts) = obj.get("and") {
            return Self::json_parts(parts).map(Predicate::And);
        }
        if let Some(parts) = obj.get("or") {
            return Self::json_parts(parts).map(Predicate::Or);
        }
        if let Some(inner) = obj.get("not") {
            return Self::from_json(inner).map(|p| Predicate::Not(Box::new(p)));
        }

        let column = obj
            .get("column")
            .ok_or_else(|| CellError::Type(format!("predicate {value} has no 'column'")))?;
        let column = json_string(column, "predicate column")?;
        let op_text = obj
            .get("op")
            .map(|op| json_string(op, "predicate op"))
            .transpose()?
            .unwrap_or("==");
        let op = CompareOp::parse(op_text)
            .ok_or_else(|| CellError::Type(format!("unknown comparison operator '{op_text}'")))?;
        let literal = match obj.get("value") {
            Some(JsonValue::String(s)) => CellValue::String(s.clone()),
            Some(JsonValue::Bool(b)) => CellValue::Bool(*b),
            Some(JsonValue::Number(n)) => match n.as_i64() {
                Some(i) => CellValue::Integer(i),
                None => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            other => {
                return Err(CellError::Type(format!(
                    "predicate value must be a string, number or bool, got {other:?}"
                )))
            }
        };

        Ok(Predicate::Compare {
            column: column.to_string(),
            op,
            value: literal,
        })
    }

    fn json_parts(parts: &JsonValue) -> Result<Vec<Predicate>, CellError> {
        parts
            .as_array()
            .ok_or_else(|| CellError::Type(format!("expected a list of predicates, got {parts}")))?
            .iter()
            .map(Predicate::from_json)
            .collect()
    }
}
