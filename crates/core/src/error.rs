use thiserror::Error;

use crate::store::StoreError;
use crate::template::TemplateError;

/// Errors raised by the mapper.
///
/// Declaration problems surface when a model or collection is compiled;
/// the rest surface from the call that hit them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid key template: {0}")]
    Template(TemplateError),
    #[error("Invalid declaration: {0}")]
    Declaration(String),
    #[error("Missing value for key field: {field}")]
    MissingField { field: String },
    #[error("No access pattern of {model} on the {index} index can be resolved")]
    UnsatisfiedPattern { model: String, index: String },
    #[error("{model} declares no access pattern on the {index} index")]
    NoPatternForIndex { model: String, index: String },
    #[error("{model} takes at most {max} key arguments on the {index} index, got {given}")]
    TooManyArguments {
        model: String,
        index: String,
        given: usize,
        max: usize,
    },
    #[error("Cannot coerce {value:?} for field {field}: {reason}")]
    Coercion {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Key {key} does not match any access pattern of {model}")]
    UndecodableKey { model: String, key: String },
    #[error("Field {field} of {model} is {stored:?} but its key says {derived:?}")]
    Consistency {
        model: String,
        field: String,
        stored: String,
        derived: String,
    },
    #[error("Item belongs to domain {found:?}, expected {expected:?}")]
    DomainMismatch { expected: String, found: String },
    #[error("Item has no domain tag in attribute {attribute}")]
    MissingDomain { attribute: String },
    #[error("Incompatible collection members: {0}")]
    IncompatibleModels(String),
    #[error("Invalid {model}: {message}")]
    Validation { model: String, message: String },
    #[error("{model} not found: {key}")]
    NotFound { model: String, key: String },
    #[error("{model} already exists: {key}")]
    AlreadyExists { model: String, key: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TemplateError> for ModelError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::MissingField { field } => Self::MissingField { field },
            other => Self::Template(other),
        }
    }
}

/// Result type for mapper operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_from_template_error() {
        let error: ModelError = TemplateError::MissingField {
            field: "id".to_string(),
        }
        .into();
        assert_eq!(
            error,
            ModelError::MissingField {
                field: "id".to_string()
            }
        );
    }

    #[test]
    fn test_template_error_is_wrapped() {
        let source = TemplateError::InvalidPlaceholder {
            pattern: "user:{}".to_string(),
            name: String::new(),
        };
        let error: ModelError = source.clone().into();
        assert_eq!(error, ModelError::Template(source));
    }

    #[test]
    fn test_store_error_is_transparent() {
        let error: ModelError = StoreError::TableNotFound("app".to_string()).into();
        assert_eq!(error.to_string(), "Table not found: app");
    }

    #[test]
    fn test_too_many_arguments_display() {
        let error = ModelError::TooManyArguments {
            model: "User".to_string(),
            index: "primary".to_string(),
            given: 3,
            max: 1,
        };
        assert_eq!(
            error.to_string(),
            "User takes at most 1 key arguments on the primary index, got 3"
        );
    }

    #[test]
    fn test_consistency_display() {
        let error = ModelError::Consistency {
            model: "User".to_string(),
            field: "id".to_string(),
            stored: "a".to_string(),
            derived: "b".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Field id of User is \"a\" but its key says \"b\""
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = ModelError::NotFound {
            model: "User".to_string(),
            key: "PK=user:1".to_string(),
        };
        assert_eq!(error.to_string(), "User not found: PK=user:1");
    }
}
