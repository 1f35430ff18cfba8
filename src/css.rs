//! Stylesheet minification.
//!
//! Uses lightningcss end to end: parse to an AST, run its minifier, print in
//! minified form. Invalid CSS is an error rather than being passed through.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::BuildError;

/// Minify one stylesheet.
pub fn minify_css(source: &str) -> Result<String, BuildError> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }

    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| BuildError::transform("stylesheet", format!("CSS parse error: {e}")))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| BuildError::transform("stylesheet", format!("CSS minify error: {e}")))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| BuildError::transform("stylesheet", format!("CSS print error: {e}")))?;

    Ok(printed.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minifies_simple_rule() {
        let out = minify_css("body {\n  color: red;\n}\n").unwrap();
        assert_eq!(out, "body{color:red}");
    }

    #[test]
    fn empty_stylesheet_is_empty() {
        assert_eq!(minify_css("  \n").unwrap(), "");
    }

    #[test]
    fn drops_css_comments() {
        let out = minify_css("/* BPB */ .a { margin: 0px; }").unwrap();
        assert!(!out.contains("BPB"), "{out}");
        assert!(out.contains(".a{margin:0"), "{out}");
    }
}
