use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scl::SclError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong while handling one run request
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnknownType(String),

    #[error("{0}")]
    SchemaMismatch(String),

    #[error("{0}")]
    TypeCoercionError(String),

    #[error("relation '{0}' is declared more than once")]
    DuplicateRelation(String),

    #[error("{0}")]
    ProgramSyntaxError(SclError),

    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    #[error("evaluation did not finish within {timeout_ms}ms")]
    EvaluationTimeout { timeout_ms: u64 },

    #[error("{0}")]
    Internal(String),
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl RunError {
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::BadRequest(_) => "BadRequest",
            RunError::UnknownType(_) => "UnknownType",
            RunError::SchemaMismatch(_) => "SchemaMismatch",
            RunError::TypeCoercionError(_) => "TypeCoercionError",
            RunError::DuplicateRelation(_) => "DuplicateRelation",
            RunError::ProgramSyntaxError(_) => "ProgramSyntaxError",
            RunError::UnknownRelation(_) => "UnknownRelation",
            RunError::EvaluationTimeout { .. } => "EvaluationTimeout",
            RunError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RunError::BadRequest(_)
            | RunError::UnknownType(_)
            | RunError::SchemaMismatch(_)
            | RunError::TypeCoercionError(_)
            | RunError::DuplicateRelation(_) => StatusCode::BAD_REQUEST,
            RunError::ProgramSyntaxError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RunError::UnknownRelation(_) => StatusCode::NOT_FOUND,
            RunError::EvaluationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RunError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        }
    }

    /// Classify an engine error raised while loading facts, loading the
    /// program, evaluating or reading results
    pub fn from_engine(err: SclError, timeout_ms: u64) -> Self {
        match err {
            SclError::Parse(_) | SclError::Compile(_) => RunError::ProgramSyntaxError(err),
            SclError::DuplicateRelation(name) => RunError::DuplicateRelation(name),
            SclError::UnknownRelation(name) => RunError::UnknownRelation(name),
            SclError::ArityMismatch { .. } => RunError::SchemaMismatch(err.to_string()),
            SclError::TypeMismatch { .. } => RunError::TypeCoercionError(err.to_string()),
            SclError::ResourceLimitExceeded { ref limit_name, .. } => {
                let limit_name = limit_name.clone();
                match limit_name.as_str() {
                    "max_evaluation_time_ms" => RunError::EvaluationTimeout { timeout_ms },
                    "max_program_bytes" | "max_facts" => RunError::BadRequest(err.to_string()),
                    "max_disjuncts" | "max_expression_depth" => RunError::ProgramSyntaxError(err),
                    _ => RunError::Internal(err.to_string()),
                }
            }
            SclError::Runtime(_) | SclError::Engine(_) => RunError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for RunError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
