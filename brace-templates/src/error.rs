//! Error handling for the template engine
//!
//! Two-tier model: almost every problem a template can have (mismatched
//! directives, ordering violations, unknown template names) is recovered and
//! recorded as a [`Diagnostic`] while processing continues. Only programmer
//! errors abort the call: an unknown escape filter name and blowing the
//! recursion ceiling.

use thiserror::Error;

/// Fatal conditions that abort an `apply_template` call.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unsupported escape filter \"{0}\"")]
    InvalidEscapeFilter(String),
    #[error("template recursion exceeded {0} levels")]
    RecursionLimit(usize),
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Severity of a recovered problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A recovered problem recorded while rendering.
///
/// Diagnostics are returned beside the output rather than replacing it;
/// templates are developer-authored and may be mid-edit, so the engine keeps
/// going and reports what it saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}
