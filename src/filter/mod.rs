//! Metadata filtering: predicate trees, their textual grammar, and evaluation

mod evaluate;
mod parse;
mod predicate;

pub use evaluate::{evaluate, FilterEvaluator};
pub use parse::{parse_filter, FilterParseError, MAX_FILTER_DEPTH, NO_FILTER};
pub use predicate::{Comparator, Comparison, Literal, Predicate};
