//! JavaScript minification via oxc.
//!
//! Page scripts are classic scripts: their top-level names are globals that
//! inline handlers may reference, so only nested scopes are mangled. The
//! worker module is minified as an ES module.

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::minifier::{Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `<script>` without `type="module"`.
    Classic,
    /// ES module (the bundled worker).
    Module,
}

impl ScriptKind {
    pub(crate) fn source_type(self) -> SourceType {
        match self {
            ScriptKind::Classic => SourceType::cjs(),
            ScriptKind::Module => SourceType::mjs(),
        }
    }
}

/// Shrink a page script before it is inlined into its template.
pub fn compact_script(source: &str) -> Result<String, BuildError> {
    minify(source, ScriptKind::Classic, "page script")
}

/// Shrink the bundled worker module. Comments are dropped.
pub fn minify_module(source: &str) -> Result<String, BuildError> {
    minify(source, ScriptKind::Module, "worker module")
}

fn minify(source: &str, kind: ScriptKind, context: &str) -> Result<String, BuildError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, kind.source_type()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(BuildError::transform(context, join_errors(&parsed.errors)));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code;

    Ok(code)
}

pub(crate) fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    if errors.is_empty() {
        return "parser aborted".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compacts_whitespace_and_folds_constants() {
        let out = compact_script("const x = 1 + 2;\nconsole.log( x );\n").unwrap();
        assert!(!out.contains("const x = 1 + 2;"), "{out}");
        assert!(out.len() < "const x = 1 + 2;\nconsole.log( x );\n".len());
    }

    #[test]
    fn strips_comments() {
        let out = compact_script("// BPB panel logic\nfunction go() { /* todo */ return 1 }\ngo();")
            .unwrap();
        assert!(!out.contains("BPB"), "{out}");
        assert!(!out.contains("todo"), "{out}");
    }

    #[test]
    fn keeps_top_level_names_of_classic_scripts() {
        let out = compact_script("function submitLogin(form) { return form.value; }").unwrap();
        assert!(out.contains("submitLogin"), "{out}");
    }

    #[test]
    fn module_syntax_is_accepted_in_module_mode() {
        let out = minify_module("import { connect } from 'cloudflare:sockets';\nexport default { fetch() { return connect; } };")
            .unwrap();
        assert!(out.contains("cloudflare:sockets"), "{out}");
        assert!(out.contains("export default"), "{out}");
    }

    #[test]
    fn syntax_errors_are_transform_errors() {
        let err = compact_script("function (").unwrap_err();
        match err {
            BuildError::Transform { context, .. } => assert_eq!(context, "page script"),
            other => panic!("expected Transform, got {other:?}"),
        }
    }
}
