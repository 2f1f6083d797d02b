//! Value-with-uncertainty model
//!
//! A measured quantity with optional asymmetric error bounds and a
//! provenance tag. Catalogs report the same physical quantity with very
//! different precision, so the merge policy needs a total "more precise
//! than" comparison between two measurements of the same field.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A measurement value with optional asymmetric error bounds.
///
/// Immutable once constructed. Equality compares `value` only; the error
/// bounds and the source tag are metadata, not identity. A missing
/// measurement is represented by the absence of the whole struct, never by
/// a zero value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub upper_error: Option<f64>,
    pub lower_error: Option<f64>,
    pub source: String,
}

/// Outcome of a precision comparison between two measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    MorePrecise,
    LessPrecise,
    Tie,
}

impl Measurement {
    /// Create a measurement, validating the value and error bounds.
    ///
    /// Fails with a row-validation error if the value is non-finite or if
    /// either bound is negative or non-finite.
    pub fn new(
        value: f64,
        upper_error: Option<f64>,
        lower_error: Option<f64>,
        source: impl Into<String>,
    ) -> Result<Self> {
        if !value.is_finite() {
            return Err(PipelineError::RowValidation(format!(
                "measurement value must be finite, got {}",
                value
            )));
        }
        for (label, bound) in [("upper", upper_error), ("lower", lower_error)] {
            if let Some(b) = bound {
                if !b.is_finite() || b < 0.0 {
                    return Err(PipelineError::RowValidation(format!(
                        "{} error bound must be finite and non-negative, got {}",
                        label, b
                    )));
                }
            }
        }
        Ok(Self {
            value,
            upper_error,
            lower_error,
            source: source.into(),
        })
    }

    /// A measurement with no error bounds.
    pub fn exact(value: f64, source: impl Into<String>) -> Result<Self> {
        Self::new(value, None, None, source)
    }

    pub fn has_bounds(&self) -> bool {
        self.upper_error.is_some() || self.lower_error.is_some()
    }

    /// Mean relative error `(upper + lower) / 2 / |value|`.
    ///
    /// When only one bound is known it stands in for both sides of the
    /// average. Returns `None` when no bound is known or the value is zero.
    pub fn relative_error(&self) -> Option<f64> {
        if !self.has_bounds() || self.value == 0.0 {
            return None;
        }
        let upper = self.upper_error.or(self.lower_error)?;
        let lower = self.lower_error.or(self.upper_error)?;
        Some((upper + lower) / 2.0 / self.value.abs())
    }

    /// Compare precision against another measurement of the same field.
    ///
    /// Smaller relative error wins when both sides have bounds; a bounded
    /// measurement beats an unbounded one; two unbounded measurements tie.
    pub fn compare_precision(&self, other: &Measurement) -> Precision {
        match (self.relative_error(), other.relative_error()) {
            (Some(a), Some(b)) if a < b => Precision::MorePrecise,
            (Some(a), Some(b)) if a > b => Precision::LessPrecise,
            (Some(_), Some(_)) => Precision::Tie,
            (Some(_), None) if !other.has_bounds() => Precision::MorePrecise,
            (None, Some(_)) if !self.has_bounds() => Precision::LessPrecise,
            _ => Precision::Tie,
        }
    }

    /// Structural equality across value, bounds and source.
    ///
    /// Used by the merge to recognize a re-ingested identical measurement;
    /// `PartialEq` deliberately ignores metadata and cannot serve here.
    pub fn same_record(&self, other: &Measurement) -> bool {
        self.value == other.value
            && self.upper_error == other.upper_error
            && self.lower_error == other.lower_error
            && self.source == other.source
    }
}

impl PartialEq for Measurement {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for Measurement {
    /// `value (+upper/-lower)` when asymmetric, `value (±err)` when
    /// symmetric, bare `value` when no bound is known.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.upper_error, self.lower_error) {
            (Some(u), Some(l)) if u == l => write!(f, "{} (±{})", self.value, u),
            (Some(u), Some(l)) => write!(f, "{} (+{}/-{})", self.value, u, l),
            (Some(u), None) => write!(f, "{} (+{})", self.value, u),
            (None, Some(l)) => write!(f, "{} (-{})", self.value, l),
            (None, None) => write!(f, "{}", self.value),
        }
    }
}
