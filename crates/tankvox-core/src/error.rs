use thiserror::Error;

/// Errors raised while loading or validating configuration data.
/// The simulation itself never fails; only its inputs can be rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {what} RON: {message}")]
    Parse { what: &'static str, message: String },

    #[error("Material {0:?} has no definition")]
    MissingMaterial(crate::material::Material),

    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        expected: &'static str,
    },

    #[error("{0} validation errors: {1:?}")]
    Invalid(usize, Vec<String>),
}

impl ConfigError {
    /// Collapse a list of validation failures into a single error.
    pub fn from_list(mut errors: Vec<ConfigError>) -> ConfigError {
        if errors.len() == 1 {
            if let Some(only) = errors.pop() {
                return only;
            }
        }
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ConfigError::Invalid(messages.len(), messages)
    }
}

/// Push an `OutOfRange` error when `value` is not inside `[min, max]`.
pub fn check_range(
    errors: &mut Vec<ConfigError>,
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
    expected: &'static str,
) {
    if !(min..=max).contains(&value) {
        errors.push(ConfigError::OutOfRange {
            field,
            value,
            expected,
        });
    }
}
