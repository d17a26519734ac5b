//! Value format descriptors
//!
//! A data element may carry a format describing its expected value shape.
//! The `setdata` service uses it to reject writes before they reach the
//! write delegate.

use crate::{Variant, VariantKind};
use serde::{Deserialize, Serialize};

/// Expected shape and bounds of a data element's value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub kind: VariantKind,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Format {
    pub fn new(kind: VariantKind) -> Self {
        Format {
            kind,
            unit: None,
            min: None,
            max: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Check a value: the kind must match exactly, and numeric values must
    /// fall inside the configured range. Range bounds are ignored for
    /// non-numeric kinds.
    pub fn validate(&self, value: &Variant) -> bool {
        if value.kind() != self.kind {
            return false;
        }
        match value.as_f64() {
            Some(v) => {
                self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_must_match() {
        let format = Format::new(VariantKind::U32);
        assert!(format.validate(&Variant::U32(10)));
        assert!(!format.validate(&Variant::I32(10)));
        assert!(!format.validate(&Variant::Str("10".into())));
    }

    #[test]
    fn test_range_bounds() {
        let format = Format::new(VariantKind::F64)
            .with_unit("degC")
            .with_range(-40.0, 125.0);
        assert!(format.validate(&Variant::F64(21.5)));
        assert!(format.validate(&Variant::F64(-40.0)));
        assert!(!format.validate(&Variant::F64(126.0)));
    }

    #[test]
    fn test_range_ignored_for_strings() {
        let format = Format::new(VariantKind::Str).with_range(0.0, 1.0);
        assert!(format.validate(&Variant::Str("anything".into())));
    }
}
