//! Predicate trees over document metadata

use crate::error::{RetrievalError, RetrievalResult};
use crate::schema::{SchemaRegistry, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

impl Comparator {
    pub const ALL: [Comparator; 8] = [
        Comparator::Eq,
        Comparator::Ne,
        Comparator::Gt,
        Comparator::Gte,
        Comparator::Lt,
        Comparator::Lte,
        Comparator::Contains,
        Comparator::In,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Contains => "contains",
            Comparator::In => "in",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte
        )
    }

    /// Whether this operator may be applied to a field of `value_type`.
    pub fn valid_for(&self, value_type: ValueType) -> bool {
        match self {
            Comparator::Eq | Comparator::Ne | Comparator::In => true,
            Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte => {
                value_type.is_numeric()
            }
            Comparator::Contains => {
                matches!(value_type, ValueType::String | ValueType::StringList)
            }
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal operand of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    List(Vec<Literal>),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::List(_) => "list",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) => Some(items),
            _ => None,
        }
    }

    fn all_strings(items: &[Literal]) -> bool {
        items.iter().all(|l| matches!(l, Literal::String(_)))
    }

    fn all_numbers(items: &[Literal]) -> bool {
        items.iter().all(Literal::is_number)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Integer(i as i64)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(items: Vec<T>) -> Self {
        Literal::List(items.into_iter().map(Into::into).collect())
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    match serde_json::to_string(s) {
        Ok(quoted) => f.write_str(&quoted),
        Err(_) => write!(f, "\"{}\"", s),
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write_quoted(f, s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A single `field op value` test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub op: Comparator,
    pub value: Literal,
}

/// Boolean expression tree over metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Comparison(Comparison),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: Comparator, value: impl Into<Literal>) -> Self {
        Predicate::Comparison(Comparison {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Lte, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, Comparator::Contains, value)
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Literal>) -> Self {
        Self::compare(field, Comparator::In, Literal::List(values))
    }

    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    pub fn negate(child: Predicate) -> Self {
        Predicate::Not(Box::new(child))
    }

    /// Check every comparison against the schema.
    ///
    /// Fails with `UnknownField` for undeclared fields and `TypeMismatch` for
    /// operators or literals that do not fit the field's declared type.
    pub fn validate(&self, schema: &SchemaRegistry) -> RetrievalResult<()> {
        match self {
            Predicate::Comparison(cmp) => {
                let spec = schema.resolve(&cmp.field)?;
                check_operand(spec.value_type, cmp.op, &cmp.value)
                    .map_err(|detail| RetrievalError::type_mismatch(&cmp.field, detail))
            }
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().try_for_each(|c| c.validate(schema))
            }
            Predicate::Not(child) => child.validate(schema),
        }
    }

    /// Field names referenced anywhere in the tree, in first-seen order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Comparison(cmp) => {
                if !out.contains(&cmp.field.as_str()) {
                    out.push(&cmp.field);
                }
            }
            Predicate::And(children) | Predicate::Or(children) => {
                for c in children {
                    c.collect_fields(out);
                }
            }
            Predicate::Not(child) => child.collect_fields(out),
        }
    }
}

/// Operator/literal compatibility for a declared value type.
pub(crate) fn check_operand(
    value_type: ValueType,
    op: Comparator,
    value: &Literal,
) -> Result<(), String> {
    if !op.valid_for(value_type) {
        return Err(format!("operator '{}' is not valid for {} fields", op, value_type));
    }

    let ok = match (value_type, op) {
        (_, Comparator::In) => match value.as_list() {
            Some(items) if value_type.is_numeric() => Literal::all_numbers(items),
            Some(items) => Literal::all_strings(items),
            None => false,
        },
        (ValueType::String, _) => matches!(value, Literal::String(_)),
        (ValueType::StringList, Comparator::Contains) => matches!(value, Literal::String(_)),
        (ValueType::StringList, _) => value.as_list().map_or(false, Literal::all_strings),
        (ValueType::Integer | ValueType::Float, _) => value.is_number(),
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "{} literal {} does not fit operator '{}' on {} field",
            value.kind(),
            value,
            op,
            value_type
        ))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(cmp) => {
                write!(f, "{}(", cmp.op)?;
                write_quoted(f, &cmp.field)?;
                write!(f, ", {})", cmp.value)
            }
            Predicate::And(children) | Predicate::Or(children) => {
                let name = if matches!(self, Predicate::And(_)) { "and" } else { "or" };
                write!(f, "{}(", name)?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str(")")
            }
            Predicate::Not(child) => write!(f, "not({})", child),
        }
    }
}
