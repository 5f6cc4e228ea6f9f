use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for quarry operations.
///
/// Every failure surfaced by the repository layer carries exactly one kind so
/// callers can branch on the category without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{ErrorKind, QuarryError, QuarryResult};
///
/// fn example() -> QuarryResult<()> {
///     Err(QuarryError::new("no member with id 7", ErrorKind::NotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Query construction
    /// A method name or query text could not be turned into a query
    QueryDerivationError,
    /// Supplied arguments do not match the query placeholders
    ParameterBindingError,
    /// Error during filter evaluation
    FilterError,

    // Result shaping
    /// A single result was required but none matched
    NotFound,
    /// At most one result was required but several matched
    AmbiguousResult,
    /// Page index or page size is out of range
    InvalidPageRequest,

    // Entity mapping
    /// Error mapping an object to or from a record
    ObjectMappingError,
    /// The entity carries no usable identity
    NotIdentifiable,

    // Lifecycle
    /// The operation is not valid in the current state
    InvalidOperation,
    /// Transaction boundary failure
    TransactionError,

    // Store
    /// The backing store cannot be reached
    StoreUnavailable,
    /// The backing store did not answer in time
    OperationTimeout,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::QueryDerivationError => write!(f, "Query derivation error"),
            ErrorKind::ParameterBindingError => write!(f, "Parameter binding error"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::AmbiguousResult => write!(f, "Ambiguous result"),
            ErrorKind::InvalidPageRequest => write!(f, "Invalid page request"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::NotIdentifiable => write!(f, "Not identifiable"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::TransactionError => write!(f, "Transaction error"),
            ErrorKind::StoreUnavailable => write!(f, "Store unavailable"),
            ErrorKind::OperationTimeout => write!(f, "Operation timeout"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom quarry error type.
///
/// `QuarryError` carries a message, an [`ErrorKind`], an optional cause and
/// the backtrace captured where the error was raised. The backtrace is
/// resolved lazily, the first time the error is debug-printed.
#[derive(Clone)]
pub struct QuarryError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<QuarryError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl QuarryError {
    /// Creates a new `QuarryError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `QuarryError` wrapping a cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: QuarryError) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&QuarryError> {
        self.cause.as_deref()
    }
}

impl Display for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "{} ({})\nCaused by: {:?}",
                self.message, self.error_kind, cause
            ),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{} ({})\n{:?}", self.message, self.error_kind, *backtrace)
            }
        }
    }
}

impl Error for QuarryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

#[cfg(feature = "serde")]
impl serde::de::Error for QuarryError {
    fn custom<T: Display>(msg: T) -> Self {
        QuarryError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Error for QuarryError {
    fn custom<T: Display>(msg: T) -> Self {
        QuarryError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

impl From<std::num::ParseIntError> for QuarryError {
    fn from(err: std::num::ParseIntError) -> Self {
        QuarryError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::QueryDerivationError,
        )
    }
}

impl From<std::num::ParseFloatError> for QuarryError {
    fn from(err: std::num::ParseFloatError) -> Self {
        QuarryError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::QueryDerivationError,
        )
    }
}

impl From<String> for QuarryError {
    fn from(msg: String) -> Self {
        QuarryError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for QuarryError {
    fn from(msg: &str) -> Self {
        QuarryError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarry_error_new_creates_error() {
        let error = QuarryError::new("An error occurred", ErrorKind::NotFound);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::NotFound);
        assert!(error.cause.is_none());
    }

    #[test]
    fn quarry_error_new_with_cause_creates_error() {
        let cause = QuarryError::new("connection refused", ErrorKind::StoreUnavailable);
        let error =
            QuarryError::new_with_cause("flush failed", ErrorKind::TransactionError, cause);
        assert_eq!(error.kind(), &ErrorKind::TransactionError);
        assert_eq!(error.cause().map(|c| c.kind()), Some(&ErrorKind::StoreUnavailable));
        assert!(error.source().is_some());
    }

    #[test]
    fn quarry_error_display_is_message() {
        let error = QuarryError::new("An error occurred", ErrorKind::InvalidOperation);
        assert_eq!(format!("{}", error), "An error occurred");
    }

    #[test]
    fn quarry_error_debug_includes_kind() {
        let error = QuarryError::new("page size must be positive", ErrorKind::InvalidPageRequest);
        let debug = format!("{:?}", error);
        assert!(debug.starts_with("page size must be positive (Invalid page request)"));
    }

    #[test]
    fn quarry_error_debug_includes_cause() {
        let cause = QuarryError::new("timed out", ErrorKind::OperationTimeout);
        let error = QuarryError::new_with_cause("query failed", ErrorKind::InternalError, cause);
        assert!(format!("{:?}", error).contains("Caused by: timed out"));
    }

    #[test]
    fn from_parse_int_error() {
        let err = "abc".parse::<i32>().unwrap_err();
        let error: QuarryError = err.into();
        assert_eq!(error.kind(), &ErrorKind::QueryDerivationError);
    }

    #[test]
    fn from_string() {
        let error: QuarryError = String::from("boom").into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
        assert_eq!(error.message(), "boom");
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::AmbiguousResult.to_string(), "Ambiguous result");
        assert_eq!(ErrorKind::ParameterBindingError.to_string(), "Parameter binding error");
    }
}
