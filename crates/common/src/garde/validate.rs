//! Garde validation utilities.

use crate::domain::DomainError;
use garde::Validate;

/// Validate a value and fold the garde report into a `DomainError`.
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value.validate().map_err(|report| {
        let details = report
            .iter()
            .map(|(path, error)| {
                let path = path.to_string();
                if path.is_empty() {
                    error.message().to_string()
                } else {
                    format!("{}: {}", path, error.message())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        DomainError::ValidationError(details)
    })
}
