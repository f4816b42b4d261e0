// groupcache-emf - CloudWatch EMF exporter for groupcache statistics
// Copyright (C) 2025 groupcache-emf Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Exporter and sink error types

use std::io;
use thiserror::Error;

/// Result type alias for exporter construction and lifecycle
pub type ExporterResult<T> = Result<T, ExporterError>;

/// Result type alias for sink delivery
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors returned while building or stopping an exporter
#[derive(Error, Debug)]
pub enum ExporterError {
    /// The application name is required
    #[error("option field application is required")]
    MissingApplication,

    /// An option holds an unusable value
    #[error("invalid option {field}: {reason}")]
    InvalidOption {
        /// Option name
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The sink could not be constructed
    #[error("sink setup failed: {0}")]
    Sink(#[from] SinkError),

    /// The background worker panicked or was aborted
    #[error("exporter worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ExporterError {
    /// Create an InvalidOption error
    pub fn invalid_option(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ExporterError::InvalidOption {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing to the local stream failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A CloudWatch Logs call failed
    #[error("cloudwatch logs {operation} failed: {message}")]
    CloudWatch {
        /// API operation name, e.g. `PutLogEvents`
        operation: &'static str,
        /// Error with SDK context
        message: String,
    },

    /// Any other failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SinkError {
    /// Create a CloudWatch error for the named API operation
    pub fn cloudwatch(operation: &'static str, message: impl Into<String>) -> Self {
        SinkError::CloudWatch {
            operation,
            message: message.into(),
        }
    }

    /// Create a generic error from any error type that can convert to anyhow::Error
    pub fn other<E: Into<anyhow::Error>>(error: E) -> Self {
        SinkError::Other(error.into())
    }

    /// Whether a CloudWatch Logs call failed
    pub fn is_cloudwatch(&self) -> bool {
        matches!(self, SinkError::CloudWatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_application_message() {
        let err = ExporterError::MissingApplication;
        assert_eq!(err.to_string(), "option field application is required");
    }

    #[test]
    fn test_invalid_option() {
        let err = ExporterError::invalid_option("export_interval", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid option export_interval: must be greater than zero"
        );
    }

    #[test]
    fn test_cloudwatch_error() {
        let err = SinkError::cloudwatch("PutLogEvents", "throttled");
        assert!(err.is_cloudwatch());
        assert_eq!(err.to_string(), "cloudwatch logs PutLogEvents failed: throttled");
    }

    #[test]
    fn test_sink_error_converts_into_exporter_error() {
        let io_err = io::Error::other("broken pipe");
        let err = ExporterError::from(SinkError::from(io_err));
        assert!(matches!(err, ExporterError::Sink(SinkError::Io(_))));
    }
}
