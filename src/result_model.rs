//! Tagged result values and the expected-vs-actual comparator.
//!
//! Equality is asymmetric: [`ResultValue::Wildcard`] and
//! [`ResultValue::TypeOnly`] are patterns and may only appear on the expected
//! side. Floats compare with a tolerance instead of bit-exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;
use crate::gen::DEFAULT_EPSILON;

/// A failure reported by the subject under test. Only the category takes
/// part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub category: String,
    #[serde(default)]
    pub payload: String,
}

impl Failure {
    pub fn new(category: impl Into<String>, payload: impl Into<String>) -> Self {
        Failure {
            category: category.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    Unit,
    Int(i64),
    Float(f64),
    Aggregate(Vec<ResultValue>),
    Opaque(Failure),
    /// Matches anything.
    Wildcard,
    /// Matches any value of the same shape, ignoring concrete payloads.
    TypeOnly(Box<ResultValue>),
}

/// The shape of a [`ResultValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Unit,
    Int,
    Float,
    Aggregate,
    Opaque,
    Wildcard,
    TypeOnly,
}

impl ResultValue {
    pub fn kind(&self) -> Kind {
        match self {
            ResultValue::Unit => Kind::Unit,
            ResultValue::Int(_) => Kind::Int,
            ResultValue::Float(_) => Kind::Float,
            ResultValue::Aggregate(_) => Kind::Aggregate,
            ResultValue::Opaque(_) => Kind::Opaque,
            ResultValue::Wildcard => Kind::Wildcard,
            ResultValue::TypeOnly(_) => Kind::TypeOnly,
        }
    }

    pub fn failure(category: impl Into<String>, payload: impl Into<String>) -> Self {
        ResultValue::Opaque(Failure::new(category, payload))
    }

    pub fn type_only(pattern: ResultValue) -> Self {
        ResultValue::TypeOnly(Box::new(pattern))
    }

    pub fn floats<I: IntoIterator<Item = f64>>(values: I) -> Self {
        ResultValue::Aggregate(values.into_iter().map(ResultValue::Float).collect())
    }

    /// Whether this value is free of patterns, i.e. legal as an actual value.
    fn check_concrete(&self) -> Result<(), UsageError> {
        match self {
            ResultValue::Wildcard => Err(UsageError::WildcardInActual),
            ResultValue::TypeOnly(_) => Err(UsageError::TypeOnlyInActual),
            ResultValue::Aggregate(items) => items.iter().try_for_each(ResultValue::check_concrete),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Unit => write!(f, "()"),
            ResultValue::Int(n) => write!(f, "{}", n),
            ResultValue::Float(x) => write!(f, "{:?}", x),
            ResultValue::Aggregate(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ResultValue::Opaque(failure) if failure.payload.is_empty() => {
                write!(f, "<failure {}>", failure.category)
            }
            ResultValue::Opaque(failure) => {
                write!(f, "<failure {}: {}>", failure.category, failure.payload)
            }
            ResultValue::Wildcard => write!(f, "_"),
            ResultValue::TypeOnly(pattern) => write!(f, "type_of({})", pattern),
        }
    }
}

/// Structural comparison with a float tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    pub epsilon: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl Comparator {
    pub fn new(epsilon: f64) -> Self {
        Comparator { epsilon }
    }

    /// Compare `expected` (which may contain patterns) against a concrete
    /// `actual`. Fails if `actual` contains a pattern anywhere.
    pub fn try_matches(&self, expected: &ResultValue, actual: &ResultValue) -> Result<bool, UsageError> {
        actual.check_concrete()?;
        Ok(self.matches_concrete(expected, actual))
    }

    /// # Panics
    ///
    /// Panics with the [`UsageError`] as payload if `actual` contains a
    /// wildcard or type-only pattern. Inside a sandbox that payload aborts the
    /// run rather than being reported as a crash.
    pub fn matches(&self, expected: &ResultValue, actual: &ResultValue) -> bool {
        match self.try_matches(expected, actual) {
            Ok(matched) => matched,
            Err(err) => std::panic::panic_any(err),
        }
    }

    fn floats_match(&self, a: f64, b: f64) -> bool {
        a == b || (a.is_nan() && b.is_nan()) || (a - b).abs() < self.epsilon
    }

    fn matches_concrete(&self, expected: &ResultValue, actual: &ResultValue) -> bool {
        use ResultValue::*;
        match (expected, actual) {
            (Wildcard, _) => true,
            (TypeOnly(pattern), _) => shape_matches(pattern, actual),
            (Unit, Unit) => true,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => self.floats_match(*a, *b),
            (Aggregate(xs), Aggregate(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.matches_concrete(x, y))
            }
            (Opaque(a), Opaque(b)) => a.category == b.category,
            _ => false,
        }
    }
}

fn shape_matches(pattern: &ResultValue, actual: &ResultValue) -> bool {
    match (pattern, actual) {
        (ResultValue::Wildcard, _) => true,
        (ResultValue::TypeOnly(inner), _) => shape_matches(inner, actual),
        (ResultValue::Aggregate(xs), ResultValue::Aggregate(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| shape_matches(x, y))
        }
        _ => pattern.kind() == actual.kind(),
    }
}

/// [`Comparator::matches`] with the default tolerance.
pub fn matches(expected: &ResultValue, actual: &ResultValue) -> bool {
    Comparator::default().matches(expected, actual)
}
