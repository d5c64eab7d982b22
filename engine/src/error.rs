use crate::ast::Span;
use crate::value::ValueType;
use std::fmt;
use std::sync::Arc;

/// Detailed error information with source location
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub span: Span,
    pub source_id: String,
    pub source_text: Arc<str>,
    pub suggestion: Option<String>,
}

/// Error types of the engine
#[derive(Debug, Clone)]
pub enum SclError {
    /// Program text does not follow the grammar
    Parse(Box<ErrorDetails>),

    /// Program parsed but cannot be compiled (unknown relation, arity
    /// conflict, unbound variable, negation cycle)
    Compile(Box<ErrorDetails>),

    /// Failure while evaluating a compiled program
    Runtime(String),

    /// A relation was declared twice through the context API
    DuplicateRelation(String),

    /// A relation name that is neither declared nor derived
    UnknownRelation(String),

    /// A tuple whose length differs from the relation's arity
    ArityMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },

    /// A value that cannot be stored in a column of the declared type
    TypeMismatch {
        relation: String,
        position: usize,
        expected: ValueType,
        found: String,
    },

    ResourceLimitExceeded {
        limit_name: String,
        limit_value: String,
        actual_value: String,
        suggestion: String,
    },

    /// Misuse of the context API or other engine failure
    Engine(String),
}

impl SclError {
    /// Create a parse error with source information
    pub fn parse(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Parse(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: None,
        }))
    }

    /// Create a compile error with source information
    pub fn compile(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
    ) -> Self {
        Self::Compile(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: None,
        }))
    }

    /// Create a compile error with suggestion
    pub fn compile_with_suggestion(
        message: impl Into<String>,
        span: Span,
        source_id: impl Into<String>,
        source_text: Arc<str>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Compile(Box::new(ErrorDetails {
            message: message.into(),
            span,
            source_id: source_id.into(),
            source_text,
            suggestion: Some(suggestion.into()),
        }))
    }

    /// Whether the error reports an exhausted evaluation time budget
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SclError::ResourceLimitExceeded { limit_name, .. } if limit_name == "max_evaluation_time_ms"
        )
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            SclError::Parse(details) | SclError::Compile(details) => Some(details),
            _ => None,
        }
    }
}

impl fmt::Display for SclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SclError::Parse(details) => {
                write!(f, "Parse error: {}", details.message)?;
                if let Some(suggestion) = &details.suggestion {
                    write!(f, " (suggestion: {})", suggestion)?;
                }
                write!(
                    f,
                    " at {}:{}:{}",
                    details.source_id, details.span.line, details.span.col
                )
            }
            SclError::Compile(details) => {
                write!(f, "Compile error: {}", details.message)?;
                if let Some(suggestion) = &details.suggestion {
                    write!(f, " (suggestion: {})", suggestion)?;
                }
                write!(
                    f,
                    " at {}:{}:{}",
                    details.source_id, details.span.line, details.span.col
                )
            }
            SclError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            SclError::DuplicateRelation(name) => {
                write!(f, "Relation '{}' is already declared", name)
            }
            SclError::UnknownRelation(name) => write!(f, "Unknown relation '{}'", name),
            SclError::ArityMismatch {
                relation,
                expected,
                actual,
            } => write!(
                f,
                "Relation '{}' expects {} argument(s), got a tuple of {}",
                relation, expected, actual
            ),
            SclError::TypeMismatch {
                relation,
                position,
                expected,
                found,
            } => write!(
                f,
                "Relation '{}' argument {} expects {}, found {}",
                relation, position, expected, found
            ),
            SclError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
                suggestion,
            } => write!(
                f,
                "Resource limit exceeded: {} (limit: {}, actual: {}). {}",
                limit_name, limit_value, actual_value, suggestion
            ),
            SclError::Engine(msg) => write!(f, "Engine error: {}", msg),
        }
    }
}

impl std::error::Error for SclError {}

impl From<std::io::Error> for SclError {
    fn from(err: std::io::Error) -> Self {
        SclError::Engine(format!("I/O error: {}", err))
    }
}
