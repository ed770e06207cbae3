//! Error types for the data manager core.
//!
//! [`DataManagerError`] is `Clone` so a single creation failure can be handed to every
//! caller waiting on the same resource key. [`BatchError`] aggregates independent
//! failures (for example, one per resource during aggregate close) without dropping any.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataManagerError {
    #[error("Resource manager is closed")]
    ManagerClosed,
    #[error("Resource creation error: {0}")]
    ResourceCreation(String),
    #[error("Resource close error: {0}")]
    ResourceClose(String),
    #[error("Driver error: {0}")]
    DriverError(String),
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),
    #[error("Operation '{operation}' is not supported by the {transport} transport")]
    Unsupported { transport: String, operation: String },
    #[error("Service '{service}' failed to register: {message}")]
    ServiceRegistration { service: String, message: String },
    #[error("Service '{0}' is already registered")]
    DuplicateService(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Log store error: {0}")]
    LogStore(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Batch(BatchError),
}

impl DataManagerError {
    /// Shorthand for the error a transport returns when it has no read path.
    pub fn unsupported(transport: &str, operation: &str) -> Self {
        DataManagerError::Unsupported {
            transport: transport.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, DataManagerError::Unsupported { .. })
    }
}

impl From<sqlx::Error> for DataManagerError {
    fn from(err: sqlx::Error) -> Self {
        DataManagerError::DriverError(err.to_string())
    }
}

impl From<config::ConfigError> for DataManagerError {
    fn from(err: config::ConfigError) -> Self {
        DataManagerError::ConfigurationError(err.to_string())
    }
}

impl From<std::io::Error> for DataManagerError {
    fn from(err: std::io::Error) -> Self {
        DataManagerError::LogStore(err.to_string())
    }
}

impl From<BatchError> for DataManagerError {
    fn from(err: BatchError) -> Self {
        DataManagerError::Batch(err)
    }
}

pub type Result<T> = std::result::Result<T, DataManagerError>;

/// An ordered collection of independent failures.
///
/// An empty batch means "no error": [`BatchError::into_result`] turns it into `Ok(())`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchError {
    errors: Vec<DataManagerError>,
}

impl BatchError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one failure.
    pub fn add(&mut self, error: DataManagerError) {
        self.errors.push(error);
    }

    /// Append the error of a failed result; successful results are ignored.
    pub fn add_result<T>(&mut self, result: Result<T>) {
        if let Err(error) = result {
            self.add(error);
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[DataManagerError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<DataManagerError> {
        self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise the batch itself.
    pub fn into_result(self) -> std::result::Result<(), BatchError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{single}"),
            many => {
                write!(f, "{} errors occurred: ", many.len())?;
                for (index, error) in many.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BatchError {}

impl Extend<DataManagerError> for BatchError {
    fn extend<I: IntoIterator<Item = DataManagerError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl FromIterator<DataManagerError> for BatchError {
    fn from_iter<I: IntoIterator<Item = DataManagerError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}
