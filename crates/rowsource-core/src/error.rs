use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every fault that terminates a report run surfaces as one of these.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a session-origin persistence fault.
    ///
    /// Session implementations outside this crate report data-access failures
    /// through this constructor.
    pub fn session(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Persistence, ErrorOrigin::Session, message)
    }

    /// Construct a caller-input error for a specific origin.
    pub fn invalid_input(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidInput, origin, message)
    }

    /// Construct a render-origin evaluation fault.
    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Evaluation, ErrorOrigin::Render, message)
    }

    /// Construct a materializer-origin evaluation fault.
    pub(crate) fn materializer_evaluation(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Evaluation, ErrorOrigin::Materializer, message)
    }

    /// Construct a driver-origin invariant violation.
    pub(crate) fn driver_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Driver, message)
    }

    /// Construct a planner-origin input error.
    pub(crate) fn planner_input(message: impl Into<String>) -> Self {
        Self::invalid_input(ErrorOrigin::Planner, message)
    }

    /// Construct a session-origin unsupported error.
    pub(crate) fn session_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Session, message)
    }

    /// Prefix the message with caller context, keeping class and origin.
    #[must_use]
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self {
            message: format!("{context}: {}", self.message),
            ..self
        }
    }

    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self.class, ErrorClass::Persistence)
    }

    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self.class, ErrorClass::InvalidInput)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<FieldError> for InternalError {
    fn from(err: FieldError) -> Self {
        Self::invalid_input(ErrorOrigin::Driver, err.to_string())
    }
}

///
/// FieldError
///
/// Caller-input failures on a single field access.
/// These never abort iteration; the current row stays readable.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldError {
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("no current row (advance has not produced a row)")]
    NoCurrentRow,
}

impl FieldError {
    pub(crate) fn unknown(field: &str) -> Self {
        Self::UnknownField {
            field: field.to_string(),
        }
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The data-access layer failed; the report run cannot continue.
    Persistence,
    /// A sub-query or renderer failed while building a row.
    Evaluation,
    InvalidInput,
    InvariantViolation,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Persistence => "persistence",
            Self::Evaluation => "evaluation",
            Self::InvalidInput => "invalid_input",
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Session,
    Planner,
    Materializer,
    Render,
    Driver,
    Merge,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Session => "session",
            Self::Planner => "planner",
            Self::Materializer => "materializer",
            Self::Render => "render",
            Self::Driver => "driver",
            Self::Merge => "merge",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
