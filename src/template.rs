//! Placeholder injection.
//!
//! A template carries bare markers (`__STYLE__`, `__SCRIPT__`) that are
//! swapped for their final content. Replacement is literal: resolved content
//! is never interpreted as a pattern.

pub const STYLE_MARKER: &str = "__STYLE__";
pub const SCRIPT_MARKER: &str = "__SCRIPT__";

/// One marker and the text it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub marker: String,
    pub content: String,
}

impl Placeholder {
    pub fn new(marker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            content: content.into(),
        }
    }
}

/// The standard markers of a page template, in resolution order.
pub fn page_placeholders(style: &str, script: &str) -> Vec<Placeholder> {
    vec![
        Placeholder::new(STYLE_MARKER, format!("<style>{style}</style>")),
        Placeholder::new(SCRIPT_MARKER, script),
    ]
}

/// Replace every occurrence of each marker, in list order.
///
/// Content inserted by an earlier placeholder is visible to later ones,
/// matching a sequence of global string replacements.
pub fn inject(template: &str, placeholders: &[Placeholder]) -> String {
    placeholders
        .iter()
        .filter(|p| !p.marker.is_empty())
        .fold(template.to_string(), |html, p| {
            html.replace(&p.marker, &p.content)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_style_and_script() {
        let html = "<head>__STYLE__</head><body><script>__SCRIPT__</script></body>";
        let out = inject(html, &page_placeholders("a{b:c}", "run()"));
        assert_eq!(
            out,
            "<head><style>a{b:c}</style></head><body><script>run()</script></body>"
        );
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = inject("__SCRIPT__|__SCRIPT__", &page_placeholders("", "x"));
        assert_eq!(out, "x|x");
    }

    #[test]
    fn dollar_signs_are_literal() {
        let out = inject("__SCRIPT__", &page_placeholders("", "s.replace(/a/, '$1')"));
        assert_eq!(out, "s.replace(/a/, '$1')");
    }

    #[test]
    fn extra_markers_extend_the_list() {
        let mut list = page_placeholders("", "");
        list.push(Placeholder::new("__ICON__", "data:image/x-icon;base64,AA=="));
        let out = inject("<link href=\"__ICON__\">", &list);
        assert_eq!(out, "<link href=\"data:image/x-icon;base64,AA==\">");
    }

    #[test]
    fn template_without_markers_is_unchanged() {
        let html = "<p>plain</p>";
        assert_eq!(inject(html, &page_placeholders("x", "y")), html);
    }
}
