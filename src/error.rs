//! Application-wide error types.
//!
//! [`AppError`] covers startup only (config, logger, runtime). Once the
//! session is running, backend failures travel as
//! [`crate::services::ServiceError`] inside an `Outcome` and never escape a
//! handler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
