use thiserror::Error;

/// Errors raised while compiling or rendering a key template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unbalanced brace at byte {position} in key template {pattern:?}")]
    UnbalancedBrace { pattern: String, position: usize },
    #[error("Invalid placeholder name {name:?} in key template {pattern:?}")]
    InvalidPlaceholder { pattern: String, name: String },
    #[error("Placeholder {name} appears more than once in key template {pattern:?}")]
    DuplicatePlaceholder { pattern: String, name: String },
    #[error("Placeholders {first} and {second} must be separated by a literal in key template {pattern:?}")]
    AdjacentPlaceholders {
        pattern: String,
        first: String,
        second: String,
    },
    #[error("Missing value for key field: {field}")]
    MissingField { field: String },
}
