//! HTTP handlers, grouped by the area of the portal they serve.
//!
//! Handlers never touch SQL: they validate input, call the `Repository`, and map
//! `RepoError::UniqueViolation` onto the user-facing message of the operation.

pub mod colleges;
pub mod exports;
pub mod judges;
pub mod lookup;
pub mod marks;
pub mod session;
pub mod students;

use crate::{config::MarkBounds, error::ApiError};

/// Trimmed value of a required text field, `None` when missing or blank.
pub(crate) fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rejects marks that are not finite or fall outside the configured bounds.
pub(crate) fn check_marks(bounds: MarkBounds, marks: f64) -> Result<f64, ApiError> {
    if bounds.contains(marks) {
        Ok(marks)
    } else {
        Err(ApiError::bad_request(format!(
            "Marks must be a number between {} and {}",
            bounds.min, bounds.max
        )))
    }
}

/// Name of an attachment download, for `Content-Disposition`.
pub(crate) fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', ""))
}
