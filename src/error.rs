use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable kind of a conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Template provider and root template
    NullTemplateProvider,
    NullOrEmptyRootTemplate,
    TemplateNotFound,
    TemplateLoadingError,
    TemplateSyntaxError,

    // Rendering
    TemplateRenderingError,
    TimeoutError,

    // Input parsing
    NullOrEmptyInput,
    InvalidHl7v2Message,
    InvalidCcdaDocument,

    // Post-processing
    JsonParsingError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NullTemplateProvider => "NullTemplateProvider",
            ErrorCode::NullOrEmptyRootTemplate => "NullOrEmptyRootTemplate",
            ErrorCode::TemplateNotFound => "TemplateNotFound",
            ErrorCode::TemplateLoadingError => "TemplateLoadingError",
            ErrorCode::TemplateSyntaxError => "TemplateSyntaxError",
            ErrorCode::TemplateRenderingError => "TemplateRenderingError",
            ErrorCode::TimeoutError => "TimeoutError",
            ErrorCode::NullOrEmptyInput => "NullOrEmptyInput",
            ErrorCode::InvalidHl7v2Message => "InvalidHl7v2Message",
            ErrorCode::InvalidCcdaDocument => "InvalidCcdaDocument",
            ErrorCode::JsonParsingError => "JsonParsingError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured conversion failure: a kind, a message and the underlying cause.
#[derive(Error, Debug)]
#[error("{code}: {message}")]
pub struct FhirConverterError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FhirConverterError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn template_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::TemplateNotFound,
            format!("Template '{name}' not found"),
        )
    }
}

/// Outcome of a failed `convert` call.
///
/// Cancellation is kept apart from the structured error so callers can tell
/// "conversion failed" from "conversion was called off".
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Conversion was cancelled")]
    Cancelled,

    #[error(transparent)]
    Converter(#[from] FhirConverterError),
}

impl ConvertError {
    /// Error code of the structured failure, `None` for cancellation.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ConvertError::Cancelled => None,
            ConvertError::Converter(err) => Some(err.code),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FhirConverterError>;

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;
