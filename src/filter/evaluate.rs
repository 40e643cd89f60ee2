//! Predicate evaluation against a metadata record

use super::predicate::{check_operand, Comparator, Comparison, Literal, Predicate};
use crate::error::{RetrievalError, RetrievalResult};
use crate::schema::SchemaRegistry;
use crate::store::{Metadata, MetadataValue};
use std::cmp::Ordering;

/// Evaluates predicate trees.
///
/// Pure: no I/O and no state beyond the borrowed schema, which decides
/// whether a missing field is an error (required) or a false comparison
/// (optional).
#[derive(Debug, Clone, Copy)]
pub struct FilterEvaluator<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    /// Evaluate `predicate` against `metadata`.
    ///
    /// `And` and `Or` short-circuit left to right; an empty `And` is true and
    /// an empty `Or` is false.
    pub fn evaluate(&self, predicate: &Predicate, metadata: &Metadata) -> RetrievalResult<bool> {
        match predicate {
            Predicate::Comparison(cmp) => self.compare(cmp, metadata),
            Predicate::And(children) => {
                for child in children {
                    if !self.evaluate(child, metadata)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if self.evaluate(child, metadata)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(child) => Ok(!self.evaluate(child, metadata)?),
        }
    }

    fn compare(&self, cmp: &Comparison, metadata: &Metadata) -> RetrievalResult<bool> {
        let spec = self.schema.resolve(&cmp.field)?;
        check_operand(spec.value_type, cmp.op, &cmp.value)
            .map_err(|detail| RetrievalError::type_mismatch(&cmp.field, detail))?;

        let stored = match metadata.get(&cmp.field) {
            Some(v) => v,
            None if spec.optional => return Ok(false),
            None => {
                return Err(RetrievalError::type_mismatch(
                    &cmp.field,
                    "required field missing from metadata",
                ))
            }
        };
        if stored.value_type() != spec.value_type {
            return Err(RetrievalError::type_mismatch(
                &cmp.field,
                format!("stored {} value, schema declares {}", stored.value_type(), spec.value_type),
            ));
        }

        let result = match stored {
            MetadataValue::String(s) => compare_string(s, cmp.op, &cmp.value),
            MetadataValue::StringList(items) => compare_list(items, cmp.op, &cmp.value),
            MetadataValue::Integer(_) | MetadataValue::Float(_) => {
                compare_number(stored, cmp.op, &cmp.value)
            }
        };
        result.ok_or_else(|| {
            RetrievalError::type_mismatch(
                &cmp.field,
                format!("cannot apply '{}' to {} with {}", cmp.op, stored.value_type(), cmp.value),
            )
        })
    }
}

/// Evaluate with a borrowed schema in one call.
pub fn evaluate(
    predicate: &Predicate,
    metadata: &Metadata,
    schema: &SchemaRegistry,
) -> RetrievalResult<bool> {
    FilterEvaluator::new(schema).evaluate(predicate, metadata)
}

fn compare_string(stored: &str, op: Comparator, value: &Literal) -> Option<bool> {
    match op {
        Comparator::Eq => value.as_str().map(|v| stored == v),
        Comparator::Ne => value.as_str().map(|v| stored != v),
        Comparator::Contains => value.as_str().map(|v| stored.contains(v)),
        Comparator::In => value
            .as_list()
            .map(|set| set.iter().any(|l| l.as_str() == Some(stored))),
        _ => None,
    }
}

fn compare_list(stored: &[String], op: Comparator, value: &Literal) -> Option<bool> {
    match op {
        Comparator::Contains => value.as_str().map(|v| stored.iter().any(|s| s == v)),
        Comparator::In => value.as_list().map(|set| {
            stored
                .iter()
                .any(|s| set.iter().any(|l| l.as_str() == Some(s.as_str())))
        }),
        Comparator::Eq | Comparator::Ne => {
            let wanted: Option<Vec<&str>> = value
                .as_list()
                .map(|set| set.iter().filter_map(Literal::as_str).collect());
            wanted.map(|w| {
                let equal = w.len() == stored.len() && w.iter().zip(stored).all(|(a, b)| *a == b);
                equal == (op == Comparator::Eq)
            })
        }
        _ => None,
    }
}

fn compare_number(stored: &MetadataValue, op: Comparator, value: &Literal) -> Option<bool> {
    if op == Comparator::In {
        return value.as_list().map(|set| {
            set.iter()
                .any(|l| numeric_order(stored, l) == Some(Ordering::Equal))
        });
    }

    let ord = numeric_order(stored, value)?;
    match op {
        Comparator::Eq => Some(ord == Ordering::Equal),
        Comparator::Ne => Some(ord != Ordering::Equal),
        Comparator::Gt => Some(ord == Ordering::Greater),
        Comparator::Gte => Some(ord != Ordering::Less),
        Comparator::Lt => Some(ord == Ordering::Less),
        Comparator::Lte => Some(ord != Ordering::Greater),
        _ => None,
    }
}

/// Total order between a stored number and a literal number.
///
/// Integer pairs compare exactly; anything involving a float widens both
/// sides to f64 and uses `total_cmp`.
fn numeric_order(stored: &MetadataValue, value: &Literal) -> Option<Ordering> {
    match (stored, value) {
        (MetadataValue::Integer(a), Literal::Integer(b)) => Some(a.cmp(b)),
        (_, Literal::Integer(b)) => stored.as_f64().map(|a| a.total_cmp(&(*b as f64))),
        (_, Literal::Float(b)) => stored.as_f64().map(|a| a.total_cmp(b)),
        _ => None,
    }
}
