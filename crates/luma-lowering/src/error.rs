//! Lowering failures and their diagnostic form.

use luma_common::diagnostics::{
    diagnostic_codes, diagnostic_messages, get_diagnostic_category,
};
use luma_common::{Diagnostic, DiagnosticCategory, Span, format_message};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoweringError {
    /// No lowering rule exists for the construct. Fatal to the file.
    #[error("'{construct}' is not supported: {detail}")]
    UnsupportedConstruct {
        construct: String,
        detail: String,
        span: Span,
    },

    /// The oracle could not answer a question lowering depends on.
    /// Always an upstream bug.
    #[error("Could not resolve {what} '{name}'. This is a compiler bug, please report it.")]
    SemanticResolutionFailure {
        what: &'static str,
        name: String,
        span: Span,
    },

    /// The construct needs an option that is turned off. Aborts the current
    /// declaration only.
    #[error("'{construct}' requires the '{feature}' feature. {remedy}")]
    FeatureDisabled {
        construct: String,
        feature: &'static str,
        remedy: String,
        span: Span,
    },
}

pub type LoweringResult<T> = Result<T, LoweringError>;

impl LoweringError {
    pub fn unsupported(construct: impl Into<String>, detail: impl Into<String>, span: Span) -> Self {
        LoweringError::UnsupportedConstruct {
            construct: construct.into(),
            detail: detail.into(),
            span,
        }
    }

    pub fn unresolved(what: &'static str, name: impl Into<String>, span: Span) -> Self {
        LoweringError::SemanticResolutionFailure {
            what,
            name: name.into(),
            span,
        }
    }

    pub fn feature_disabled(
        construct: impl Into<String>,
        feature: &'static str,
        remedy: impl Into<String>,
        span: Span,
    ) -> Self {
        LoweringError::FeatureDisabled {
            construct: construct.into(),
            feature,
            remedy: remedy.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LoweringError::UnsupportedConstruct { span, .. }
            | LoweringError::SemanticResolutionFailure { span, .. }
            | LoweringError::FeatureDisabled { span, .. } => *span,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            LoweringError::UnsupportedConstruct { .. } => diagnostic_codes::UNSUPPORTED_CONSTRUCT,
            LoweringError::SemanticResolutionFailure { .. } => {
                diagnostic_codes::SEMANTIC_RESOLUTION_FAILURE
            }
            LoweringError::FeatureDisabled { .. } => diagnostic_codes::FEATURE_DISABLED,
        }
    }

    /// Whether the file driver may continue with the next declaration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoweringError::FeatureDisabled { .. })
    }

    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        let message = match self {
            LoweringError::UnsupportedConstruct {
                construct, detail, ..
            } => format_message(
                diagnostic_messages::UNSUPPORTED_CONSTRUCT,
                &[construct.as_str(), detail.as_str()],
            ),
            LoweringError::SemanticResolutionFailure { what, name, .. } => format_message(
                diagnostic_messages::SEMANTIC_RESOLUTION_FAILURE,
                &[*what, name.as_str()],
            ),
            LoweringError::FeatureDisabled {
                construct,
                feature,
                remedy,
                ..
            } => format_message(
                diagnostic_messages::FEATURE_DISABLED,
                &[construct.as_str(), *feature, remedy.as_str()],
            ),
        };
        let code = self.code();
        let span = self.span();
        Diagnostic::with_category(
            file,
            span.start,
            span.len(),
            message,
            code,
            get_diagnostic_category(code).unwrap_or(DiagnosticCategory::Error),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_diagnostic_text() {
        let err = LoweringError::unsupported("goto statement", "goto done;", Span::new(10, 20));
        let diag = err.to_diagnostic("Main.cs");
        assert_eq!(diag.message_text, err.to_string());
        assert_eq!(diag.code, 9001);
        assert_eq!(diag.start, 10);
        assert_eq!(diag.length, 10);
    }

    #[test]
    fn test_resolution_failure_is_internal_error() {
        let err = LoweringError::unresolved("identifier", "x", Span::DUMMY);
        let diag = err.to_diagnostic("Main.cs");
        assert_eq!(diag.category, DiagnosticCategory::InternalError);
        assert!(diag.message_text.contains("compiler bug"));
        assert!(!err.is_recoverable());
    }
}
