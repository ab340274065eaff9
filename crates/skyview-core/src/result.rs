//! Convenience result type alias for Skyview.

use crate::error::AppError;

/// A specialized `Result` type for Skyview operations.
pub type AppResult<T> = Result<T, AppError>;
