//! Diagnostic types and message lookup for the lowering engine.
//!
//! Lowering never writes output itself; every failure becomes a `Diagnostic`
//! handed to a caller-controlled `DiagnosticSink`.

use serde::Serialize;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Error,
    /// Context attached to another diagnostic.
    Message,
    /// A bug in the compiler itself (upstream contract violation).
    InternalError,
}

/// Related information for a diagnostic (the declaration being lowered).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A lowering diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Related information spans (e.g., the declaration being lowered)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub fn error(
        file: impl Into<String>,
        start: u32,
        length: u32,
        message: impl Into<String>,
        code: u32,
    ) -> Self {
        Self::with_category(file, start, length, message, code, DiagnosticCategory::Error)
    }

    /// Create a diagnostic with an explicit category.
    #[must_use]
    pub fn with_category(
        file: impl Into<String>,
        start: u32,
        length: u32,
        message: impl Into<String>,
        code: u32,
        category: DiagnosticCategory,
    ) -> Self {
        Self {
            file: file.into(),
            start,
            length,
            message_text: message.into(),
            category,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(
        mut self,
        file: impl Into<String>,
        start: u32,
        length: u32,
        message: impl Into<String>,
    ) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            file: file.into(),
            start,
            length,
            message_text: message.into(),
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self.category,
            DiagnosticCategory::Error | DiagnosticCategory::InternalError
        )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Message => "message",
            DiagnosticCategory::InternalError => "internal error",
        };
        write!(
            f,
            "{}({}): {label} LU{}: {}",
            self.file, self.start, self.code, self.message_text
        )
    }
}

/// Receiver for diagnostics produced while lowering.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

// =============================================================================
// Message data
// =============================================================================

pub mod diagnostic_codes {
    pub const UNSUPPORTED_CONSTRUCT: u32 = 9001;
    pub const SEMANTIC_RESOLUTION_FAILURE: u32 = 9002;
    pub const FEATURE_DISABLED: u32 = 9003;
}

pub mod diagnostic_messages {
    pub const UNSUPPORTED_CONSTRUCT: &str = "'{0}' is not supported: {1}";
    pub const SEMANTIC_RESOLUTION_FAILURE: &str =
        "Could not resolve {0} '{1}'. This is a compiler bug, please report it.";
    pub const FEATURE_DISABLED: &str = "'{0}' requires the '{1}' feature. {2}";
}

static DIAGNOSTIC_CATEGORIES: &[(u32, DiagnosticCategory)] = &[
    (diagnostic_codes::UNSUPPORTED_CONSTRUCT, DiagnosticCategory::Error),
    (diagnostic_codes::SEMANTIC_RESOLUTION_FAILURE, DiagnosticCategory::InternalError),
    (diagnostic_codes::FEATURE_DISABLED, DiagnosticCategory::Error),
];

/// Get the category for a diagnostic code.
#[must_use]
pub fn get_diagnostic_category(code: u32) -> Option<DiagnosticCategory> {
    DIAGNOSTIC_CATEGORIES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_message_placeholders() {
        let text = format_message(diagnostic_messages::UNSUPPORTED_CONSTRUCT, &["yield", "x"]);
        assert_eq!(text, "'yield' is not supported: x");
    }

    #[test]
    fn test_resolution_failure_is_internal() {
        assert_eq!(
            get_diagnostic_category(diagnostic_codes::SEMANTIC_RESOLUTION_FAILURE),
            Some(DiagnosticCategory::InternalError)
        );
        assert!(get_diagnostic_category(1).is_none());
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.report(Diagnostic::error("a.cs", 3, 4, "boom", 9001));
        assert_eq!(sink.len(), 1);
        assert!(sink[0].is_error());
        assert_eq!(sink[0].to_string(), "a.cs(3): error LU9001: boom");
    }

    #[test]
    fn test_related_information_is_a_message() {
        let diag = Diagnostic::error("a.cs", 30, 4, "boom", 9001).with_related("a.cs", 0, 40, "in 'Main'");
        assert_eq!(diag.related_information.len(), 1);
        assert_eq!(diag.related_information[0].category, DiagnosticCategory::Message);
        assert_eq!(diag.related_information[0].start, 0);
    }
}
