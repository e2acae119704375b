use anyhow::{Context, Result};
use luma_lowering::LoweringOptions;
use std::path::Path;

use crate::args::LowerArgs;

/// Parse an options file. Unknown keys are ignored, missing keys keep defaults.
pub fn parse_options(source: &str) -> Result<LoweringOptions> {
    serde_json::from_str(source).context("failed to parse lowering options")
}

pub fn load_options(path: &Path) -> Result<LoweringOptions> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {}", path.display()))?;
    parse_options(&source).with_context(|| format!("in {}", path.display()))
}

/// Options file (if any) with command-line flags applied on top.
pub fn resolve_options(args: &LowerArgs) -> Result<LoweringOptions> {
    let mut options = match &args.config {
        Some(path) => load_options(path)?,
        None => LoweringOptions::default(),
    };

    if args.iterator_helpers {
        options.iterator_helpers = true;
    }
    if let Some(runtime) = &args.runtime_library {
        options.runtime_library = runtime.clone();
    }
    if args.no_type_annotations {
        options.emit_type_annotations = false;
    }
    if args.no_reflection {
        options.emit_reflection_metadata = false;
    }

    tracing::debug!(?options, "[cli] resolved lowering options");
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("luma.json");
        std::fs::write(&path, r#"{ "runtimeLibrary": "Rt", "emitTypeAnnotations": false }"#)
            .expect("write options");

        let args = LowerArgs {
            config: Some(path),
            iterator_helpers: true,
            runtime_library: Some("Shared".into()),
            ..LowerArgs::default()
        };
        let options = resolve_options(&args).expect("options resolve");
        assert!(options.iterator_helpers);
        assert_eq!(options.runtime_library, "Shared");
        assert!(!options.emit_type_annotations);
        assert!(options.emit_reflection_metadata);
    }

    #[test]
    fn test_missing_options_file_is_an_error() {
        let args = LowerArgs {
            config: Some("does/not/exist.json".into()),
            ..LowerArgs::default()
        };
        let error = resolve_options(&args).expect_err("missing file");
        assert!(format!("{error:#}").contains("failed to read options file"));
    }

    #[test]
    fn test_malformed_options_are_rejected() {
        assert!(parse_options(r#"{ "iteratorHelpers": "yes" }"#).is_err());
    }
}
