pub mod conversation;
pub mod enums;
pub mod metric;
pub mod profile;

pub use conversation::*;
pub use enums::*;
pub use metric::*;
pub use profile::*;

use thiserror::Error;

/// Input-side rejection. Raised before any prompt is built; nothing is saved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {0}")]
    Required(&'static str),

    #[error("{field} out of range: {value} (expected {min} to {max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Systolic ({systolic}) must be higher than diastolic ({diastolic})")]
    PressureInverted { systolic: u16, diastolic: u16 },

    #[error("No {0} readings logged yet")]
    EmptySeries(&'static str),
}

/// Reject values outside `[min, max]` (and NaN).
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
