use std::fmt::{Display, Formatter};

use crate::firestore::error::{FirestoreError, FirestoreErrorCode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelperErrorCode {
    NotFound,
    AlreadyExists,
    Validation,
    InvalidArgument,
    IndexRequired,
    Connection,
    Configuration,
    Unknown,
}

impl HelperErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelperErrorCode::NotFound => "firestore-helper/not-found",
            HelperErrorCode::AlreadyExists => "firestore-helper/already-exists",
            HelperErrorCode::Validation => "firestore-helper/validation",
            HelperErrorCode::InvalidArgument => "firestore-helper/invalid-argument",
            HelperErrorCode::IndexRequired => "firestore-helper/index-required",
            HelperErrorCode::Connection => "firestore-helper/connection",
            HelperErrorCode::Configuration => "firestore-helper/configuration",
            HelperErrorCode::Unknown => "firestore-helper/unknown",
        }
    }
}

#[derive(Clone, Debug)]
pub struct HelperError {
    pub code: HelperErrorCode,
    message: String,
}

impl HelperError {
    pub fn new(code: HelperErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HelperError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for HelperError {}

/// Store errors raised outside of a query context.
///
/// Store-side `not-found` and `already-exists` keep their meaning; argument errors stay argument
/// errors; everything else is reported as `unknown` with the store's message.
impl From<FirestoreError> for HelperError {
    fn from(err: FirestoreError) -> Self {
        let code = match err.code {
            FirestoreErrorCode::NotFound => HelperErrorCode::NotFound,
            FirestoreErrorCode::AlreadyExists => HelperErrorCode::AlreadyExists,
            FirestoreErrorCode::InvalidArgument => HelperErrorCode::InvalidArgument,
            _ => HelperErrorCode::Unknown,
        };
        HelperError::new(code, err.message())
    }
}

pub type HelperResult<T> = Result<T, HelperError>;

pub fn not_found(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::NotFound, message)
}

pub fn already_exists(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::AlreadyExists, message)
}

pub fn validation_error(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::Validation, message)
}

pub fn invalid_argument(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::InvalidArgument, message)
}

pub fn index_required(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::IndexRequired, message)
}

pub fn connection_error(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::Connection, message)
}

pub fn configuration_error(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::Configuration, message)
}

pub fn unknown_error(message: impl Into<String>) -> HelperError {
    HelperError::new(HelperErrorCode::Unknown, message)
}

/// Maps an error raised while running or listening to a query.
///
/// `failed-precondition` is how the store reports a missing composite index.
pub(crate) fn query_error(err: FirestoreError) -> HelperError {
    if err.is_failed_precondition() {
        return index_required(format!(
            "Query requires a composite index: {}",
            err.message()
        ));
    }
    match err.code {
        FirestoreErrorCode::InvalidArgument => invalid_argument(err.message()),
        _ => unknown_error(err.message()),
    }
}
