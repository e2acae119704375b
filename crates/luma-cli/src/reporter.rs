use colored::Colorize;
use luma_common::{Diagnostic, DiagnosticCategory};
use rustc_hash::FxHashMap;

/// Renders diagnostics as `file:line:col - error LU9001: message`, with a
/// source snippet when the unit carried its text.
pub struct Reporter {
    color: bool,
    sources: FxHashMap<String, String>,
}

impl Reporter {
    pub fn new(color: bool) -> Self {
        Reporter {
            color,
            sources: FxHashMap::default(),
        }
    }

    pub fn add_source(&mut self, file: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(file.into(), text.into());
    }

    pub fn render(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();
        for (index, diagnostic) in diagnostics.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&self.format_diagnostic(diagnostic));
        }
        out
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let mut output = self
            .format_location(&diagnostic.file, diagnostic.start)
            .unwrap_or_else(|| diagnostic.file.clone());
        output.push_str(" - ");
        output.push_str(&self.format_category(diagnostic.category));
        output.push(' ');
        output.push_str(&self.format_code(diagnostic.code));
        output.push_str(": ");
        output.push_str(&diagnostic.message_text);

        if let Some(snippet) = self.format_snippet(&diagnostic.file, diagnostic.start, diagnostic.length) {
            output.push_str(&snippet);
        }

        for related in &diagnostic.related_information {
            let location = self
                .format_location(&related.file, related.start)
                .unwrap_or_else(|| related.file.clone());
            let prefix = if self.color {
                "  Related".dimmed().to_string()
            } else {
                "  Related".to_string()
            };
            output.push('\n');
            output.push_str(&format!("{prefix}: {location} - {}", related.message_text));
        }
        output
    }

    /// Example:
    ///     3   goto done;
    ///         ~~~~~~~~~~
    fn format_snippet(&self, file: &str, start: u32, length: u32) -> Option<String> {
        if length == 0 {
            return None;
        }
        let (line, column) = self.position_for(file, start)?;
        let line_text = self.sources.get(file)?.lines().nth((line - 1) as usize)?;

        let first = (column - 1) as usize;
        let mut underline = String::new();
        for (i, ch) in line_text.chars().enumerate() {
            let marker = if i < first {
                ' '
            } else if i < first + length as usize {
                '~'
            } else {
                break;
            };
            if ch == '\t' {
                underline.extend(std::iter::repeat_n(marker, 4));
            } else {
                underline.push(marker);
            }
        }
        if !underline.contains('~') {
            underline.push('~');
        }

        let underline = if self.color {
            underline.red().to_string()
        } else {
            underline
        };
        Some(format!("\n  {line:>3}   {line_text}\n        {underline}"))
    }

    fn format_location(&self, file: &str, offset: u32) -> Option<String> {
        let (line, column) = self.position_for(file, offset)?;
        Some(format!("{file}:{line}:{column}"))
    }

    /// 1-based line and column of a byte offset.
    fn position_for(&self, file: &str, offset: u32) -> Option<(u32, u32)> {
        let source = self.sources.get(file)?;
        let offset = (offset as usize).min(source.len());
        let before = source.get(..offset)?;
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() as u32 + 1;
        Some((line, column))
    }

    fn format_category(&self, category: DiagnosticCategory) -> String {
        let label = match category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Message => "message",
            DiagnosticCategory::InternalError => "internal error",
        };
        if !self.color {
            return label.to_string();
        }
        match category {
            DiagnosticCategory::Error | DiagnosticCategory::InternalError => label.red().bold().to_string(),
            DiagnosticCategory::Message => label.cyan().to_string(),
        }
    }

    fn format_code(&self, code: u32) -> String {
        let code = format!("LU{code}");
        if self.color { code.dimmed().to_string() } else { code }
    }
}

/// Diagnostics as a pretty-printed JSON array.
pub fn render_json(diagnostics: &[Diagnostic]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goto_diagnostic() -> Diagnostic {
        Diagnostic::error("Main.cs", 21, 10, "'goto' is not supported: use structured control flow", 9001)
    }

    #[test]
    fn test_location_and_snippet_from_source_text() {
        let mut reporter = Reporter::new(false);
        reporter.add_source("Main.cs", "class A {\nvoid M() {\ngoto done;\n}\n}\n");
        let rendered = reporter.render(&[goto_diagnostic()]);
        assert_eq!(
            rendered,
            "Main.cs:3:1 - error LU9001: 'goto' is not supported: use structured control flow\n    3   goto done;\n        ~~~~~~~~~~"
        );
    }

    #[test]
    fn test_related_declaration_is_listed_under_the_error() {
        let mut reporter = Reporter::new(false);
        reporter.add_source("Main.cs", "class A {\nvoid M() {\ngoto done;\n}\n}\n");
        let diagnostic = goto_diagnostic().with_related("Main.cs", 0, 36, "while lowering 'A'");
        let rendered = reporter.format_diagnostic(&diagnostic);
        assert!(
            rendered.ends_with("~~~~~~~~~~\n  Related: Main.cs:1:1 - while lowering 'A'"),
            "{rendered}"
        );
    }

    #[test]
    fn test_without_source_uses_file_name_only() {
        let reporter = Reporter::new(false);
        let rendered = reporter.format_diagnostic(&goto_diagnostic());
        assert!(rendered.starts_with("Main.cs - error LU9001: "), "{rendered}");
    }

    #[test]
    fn test_json_output_uses_field_names() {
        let json = render_json(&[goto_diagnostic()]).expect("serializable");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value[0]["code"], 9001);
        assert_eq!(value[0]["file"], "Main.cs");
        assert_eq!(value[0]["category"], "Error");
    }
}
