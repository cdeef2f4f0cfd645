//! # Pipeline Error Handling
//!
//! Error taxonomy for the encoding pipeline. Every stage-level operation returns
//! a [`PipelineResult`] instead of panicking across the GPU/CPU boundary, so that
//! the orchestration layer can decide per frame whether to skip, stop, or report.
//!
//! ## Architecture
//!
//! - **Error Types**: one enum, [`PipelineError`], with a variant per failure class
//! - **Error Traits**: retry budgets, severity and recovery suggestions
//! - **Error Context**: timestamps, operation names, recovery suggestions and metadata
//!
//! ## Error Classes
//!
//! | Class | Variants | Pipeline behaviour |
//! |-------|----------|--------------------|
//! | Initialization | `Init`, `Config`, `Validation` | encoder is never constructed |
//! | Per-frame transient | `DeviceLost`, `Dispatch`, `Resource` | frame dropped, previous result stays visible |
//! | Contract violation | `ContractViolation` | fail fast, loop stops |
//!
//! ## Usage
//!
//! ```rust
//! use gpujpeg_stream::error::{classify, PipelineError, Retryable};
//!
//! let error = PipelineError::dispatch("compute", "queue reported device removal")
//!     .with_context("encoding frame 12")
//!     .with_recovery_suggestion("Skip the frame and retry on the next one");
//!
//! assert!(classify::is_transient(&error));
//! assert!(error.is_retryable());
//! ```

use std::{collections::HashMap, error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Critical errors that require immediate attention
    Critical,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the encoding pipeline
#[derive(Debug)]
pub enum PipelineError {
    /// Configuration values that cannot be used
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Argument validation at an API boundary
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// Shader compilation, pipeline creation or missing backend
    Init {
        component: String,
        reason: String,
        context: ErrorContext,
    },
    /// GPU resource allocation failures
    Resource {
        resource: String,
        reason: String,
        context: ErrorContext,
    },
    /// The device stopped executing work
    DeviceLost {
        queue: String,
        reason: String,
        context: ErrorContext,
    },
    /// A submitted command failed for this frame only
    Dispatch {
        stage: String,
        reason: String,
        context: ErrorContext,
    },
    /// GPU and CPU stages disagree about buffer sizes or layout
    ContractViolation {
        what: String,
        expected: usize,
        actual: usize,
        context: ErrorContext,
    },
    /// Invalid state transitions
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an initialization error
    pub fn init(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Init {
            component: component.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a resource error
    pub fn resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a device-lost error
    pub fn device_lost(queue: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceLost {
            queue: queue.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Critical),
        }
    }

    /// Create a per-frame dispatch error
    pub fn dispatch(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            stage: stage.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a contract violation
    pub fn contract(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ContractViolation {
            what: what.into(),
            expected,
            actual,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Attach a path to an I/O error; no-op for other variants
    pub fn with_path(mut self, p: impl Into<String>) -> Self {
        if let Self::Io { path, .. } = &mut self {
            *path = Some(p.into());
        }
        self
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Init { context, .. } => context,
            Self::Resource { context, .. } => context,
            Self::DeviceLost { context, .. } => context,
            Self::Dispatch { context, .. } => context,
            Self::ContractViolation { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Init { context, .. } => context,
            Self::Resource { context, .. } => context,
            Self::DeviceLost { context, .. } => context,
            Self::Dispatch { context, .. } => context,
            Self::ContractViolation { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::Init { .. } => "init",
            Self::Resource { .. } => "resource",
            Self::DeviceLost { .. } => "device_lost",
            Self::Dispatch { .. } => "dispatch",
            Self::ContractViolation { .. } => "contract_violation",
            Self::State { .. } => "state",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            PipelineError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
            PipelineError::Init {
                component, reason, ..
            } => {
                write!(f, "Failed to initialize {}: {}", component, reason)
            }
            PipelineError::Resource {
                resource, reason, ..
            } => {
                write!(f, "Resource allocation failed for {}: {}", resource, reason)
            }
            PipelineError::DeviceLost { queue, reason, .. } => {
                write!(f, "Device lost on {} queue: {}", queue, reason)
            }
            PipelineError::Dispatch { stage, reason, .. } => {
                write!(f, "GPU {} stage failed: {}", stage, reason)
            }
            PipelineError::ContractViolation {
                what,
                expected,
                actual,
                ..
            } => {
                write!(
                    f,
                    "Contract violation in {}: expected {}, got {}",
                    what, expected, actual
                )
            }
            PipelineError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Invalid state '{}' when attempting '{}': {}",
                    current_state, attempted_operation, reason
                )
            }
            PipelineError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            PipelineError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using the pipeline error type
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the maximum number of retry attempts
    fn max_retries(&self) -> Option<usize> {
        None
    }
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Dispatch { .. } | Self::DeviceLost { .. } | Self::Resource { .. }
        )
    }

    // Counted in frames: a retry is simply the next loop iteration.
    fn max_retries(&self) -> Option<usize> {
        match self {
            Self::Dispatch { .. } => Some(usize::MAX),
            Self::Resource { .. } => Some(10),
            Self::DeviceLost { .. } => Some(3),
            _ => None,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for PipelineError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for PipelineError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Per-frame failures: the frame is abandoned and the loop continues.
    pub fn is_transient(error: &PipelineError) -> bool {
        matches!(
            error,
            PipelineError::DeviceLost { .. }
                | PipelineError::Dispatch { .. }
                | PipelineError::Resource { .. }
        )
    }

    /// Check if an error is fatal (cannot be recovered from)
    pub fn is_fatal(error: &PipelineError) -> bool {
        matches!(
            error,
            PipelineError::Init { .. }
                | PipelineError::Config { .. }
                | PipelineError::Validation { .. }
                | PipelineError::ContractViolation { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<surface_scale::plan::PlanError> for PipelineError {
    fn from(error: surface_scale::plan::PlanError) -> Self {
        Self::validation("surface_plan", error.to_string(), "")
    }
}

impl From<surface_scale::cpu::ScaleError> for PipelineError {
    fn from(error: surface_scale::cpu::ScaleError) -> Self {
        Self::dispatch("resample", error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}
