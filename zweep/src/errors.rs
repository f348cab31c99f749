use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for zweep operations.
///
/// Every failure the engine can signal falls into one of these categories.
/// The taxonomy is deliberately small: the join algorithms never retry,
/// never skip, and never suppress partial results, so a kind only needs to
/// tell the caller *what contract was broken*, not how to recover.
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::errors::{ZweepError, ErrorKind, ZweepResult};
///
/// fn example() -> ZweepResult<()> {
///     Err(ZweepError::new("probe arrays differ in length", ErrorKind::InvalidArgument))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Malformed input at a call site: mismatched predicate/probe arrays,
    /// probes hashing to different buckets in a multi-key query, negative or
    /// inconsistent capacity/memory values.
    InvalidArgument,
    /// The operation is not valid for the component's current configuration,
    /// e.g. expiration requested from a stream the sweep area refuses, or a
    /// non-monotonic element pushed onto a stack sweep area.
    InvalidState,
    /// The component can never perform the operation, regardless of state,
    /// e.g. `update` on a bag implementor.
    Unsupported,
    /// The component was used before `initialize` was called.
    NotInitialized,
    /// `initialize` was called a second time.
    AlreadyInitialized,
    /// The component was used after `close`.
    Closed,
    /// An element required by identity lookup was not present.
    NotFound,
    /// A code or coordinate could not be encoded/decoded.
    EncodingError,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::InvalidState => write!(f, "Invalid state"),
            ErrorKind::Unsupported => write!(f, "Unsupported operation"),
            ErrorKind::NotInitialized => write!(f, "Not initialized"),
            ErrorKind::AlreadyInitialized => write!(f, "Already initialized"),
            ErrorKind::Closed => write!(f, "Already closed"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The zweep error type.
///
/// `ZweepError` carries the error message, its [`ErrorKind`], and an optional
/// cause chain. A backtrace is captured at construction for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use zweep::errors::{ZweepError, ErrorKind};
///
/// let cause = ZweepError::new("bucket 7 missing", ErrorKind::NotFound);
/// let err = ZweepError::new_with_cause("update failed", ErrorKind::InvalidArgument, cause);
/// ```
#[derive(Clone)]
pub struct ZweepError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<ZweepError>>,
    backtrace: Atomic<Backtrace>,
}

impl ZweepError {
    /// Creates a new `ZweepError` with the specified message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ZweepError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `ZweepError` with a cause error attached.
    ///
    /// The cause is preserved for debugging and surfaces through
    /// [`Error::source`] and the `Debug` representation.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: ZweepError) -> Self {
        ZweepError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&ZweepError> {
        self.cause.as_deref()
    }
}

impl Display for ZweepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ZweepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for ZweepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for zweep operations.
///
/// `ZweepResult<T>` is shorthand for `Result<T, ZweepError>`. All fallible
/// engine operations return this type.
pub type ZweepResult<T> = Result<T, ZweepError>;

// From trait implementations for automatic error conversion
impl From<std::num::ParseIntError> for ZweepError {
    fn from(err: std::num::ParseIntError) -> Self {
        ZweepError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::num::ParseFloatError> for ZweepError {
    fn from(err: std::num::ParseFloatError) -> Self {
        ZweepError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::fmt::Error> for ZweepError {
    fn from(err: std::fmt::Error) -> Self {
        ZweepError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for ZweepError {
    fn from(msg: String) -> Self {
        ZweepError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for ZweepError {
    fn from(msg: &str) -> Self {
        ZweepError::new(msg, ErrorKind::InternalError)
    }
}
