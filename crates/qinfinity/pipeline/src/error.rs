use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline has no steps")]
    EmptyPipeline,

    #[error("step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("integrity violated between {previous} and {next}: input hash does not match previous output")]
    HashLinkageBroken { previous: String, next: String },

    #[error("step {step} is missing required context: {key}")]
    MissingContext { step: String, key: String },

    #[error("execution trace not found: {0}")]
    TraceNotFound(String),

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::EmptyPipeline => ErrorKind::Validation,
            PipelineError::StepFailed { .. } => ErrorKind::Internal,
            PipelineError::HashLinkageBroken { .. } => ErrorKind::IntegrityViolation,
            PipelineError::MissingContext { .. } => ErrorKind::Validation,
            PipelineError::TraceNotFound(_) => ErrorKind::NotFound,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}
