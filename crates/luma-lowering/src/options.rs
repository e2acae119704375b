//! Lowering options.

use serde::{Deserialize, Serialize};

/// Options that change what lowering emits.
///
/// Loaded from the options file as camelCase JSON; every field is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoweringOptions {
    /// Name of the global runtime table referenced by lowered code.
    pub runtime_library: String,
    /// Allow iterator-helper macros (LINQ methods lowered to runtime calls).
    pub iterator_helpers: bool,
    /// Emit Luau type annotations and type aliases.
    pub emit_type_annotations: bool,
    /// Emit `registerType` calls carrying base/interface/attribute metadata.
    pub emit_reflection_metadata: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            runtime_library: "CS".to_string(),
            iterator_helpers: false,
            emit_type_annotations: true,
            emit_reflection_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts: LoweringOptions =
            serde_json::from_str(r#"{ "iteratorHelpers": true }"#).expect("valid options");
        assert!(opts.iterator_helpers);
        assert_eq!(opts.runtime_library, "CS");
        assert!(opts.emit_type_annotations);
    }
}
