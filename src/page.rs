//! Page sanitizer.
//!
//! Turns one template + stylesheet + compacted script into a single
//! self-contained HTML document with identifying text replaced, comments and
//! revealing meta tags removed, a decoy node inserted, and the whole document
//! minified.
//!
//! The literal scrubbing is best-effort de-identification: only the
//! configured literals are targeted, and a random replacement could in
//! principle reproduce one of them.

use std::fmt;
use std::sync::LazyLock;

use regex::{NoExpand, Regex, RegexBuilder};

use crate::config::IdentityMarkers;
use crate::random::random_identifier;
use crate::template::{inject, page_placeholders};
use crate::{css, BuildError};

pub const TITLE_ID_LEN: usize = 10;
pub const BRAND_ID_LEN: usize = 12;
pub const DISPLAY_NAME_ID_LEN: usize = 10;
pub const VERSION_TOKEN_ID_LEN: usize = 6;
pub const SEMVER_ID_LEN: usize = 6;
pub const DECOY_ID_LEN: usize = 16;

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title>.*?</title>").expect("title pattern"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"));
static REVEALING_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<meta[^>]+(?:generator|description|keywords)[^>]*>").expect("meta pattern")
});
static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body\b[^>]*>").expect("body pattern"));
static SEMVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)v\d+\.\d+\.\d+").expect("semver pattern"));

/// A finished page. Produced once per build and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPage(String);

impl ProcessedPage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The page as a JSON string literal, ready to be substituted into JS.
    pub fn to_js_literal(&self) -> String {
        serde_json::Value::String(self.0.clone()).to_string()
    }
}

impl fmt::Display for ProcessedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run every sanitizing step on one page. `script` must already be compacted.
pub fn sanitize_page(
    template: &str,
    style: &str,
    script: &str,
    markers: &IdentityMarkers,
) -> Result<ProcessedPage, BuildError> {
    let html = randomize_title(template);
    let html = scrub_identity(&html, markers)?;
    let html = strip_comments(&html);
    let html = strip_revealing_meta(&html);
    let html = insert_decoy(&html);
    let style = css::minify_css(style)?;
    let html = inject(&html, &page_placeholders(&style, script));
    let html = minify_document(&html)?;
    Ok(ProcessedPage(html))
}

/// Replace the content of the first `<title>` with a random identifier.
pub fn randomize_title(html: &str) -> String {
    let title = format!("<title>{}</title>", random_identifier(TITLE_ID_LEN));
    TITLE.replacen(html, 1, NoExpand(&title)).into_owned()
}

/// Replace every case-insensitive occurrence of each identity literal.
/// One identifier is drawn per literal class, not per occurrence.
pub fn scrub_identity(html: &str, markers: &IdentityMarkers) -> Result<String, BuildError> {
    let literals = [
        (&markers.brand, BRAND_ID_LEN),
        (&markers.display_name, DISPLAY_NAME_ID_LEN),
        (&markers.version_token, VERSION_TOKEN_ID_LEN),
    ];

    let mut html = html.to_string();
    for (literal, len) in literals {
        if literal.is_empty() {
            continue;
        }
        let pattern = RegexBuilder::new(&regex::escape(literal))
            .case_insensitive(true)
            .build()
            .map_err(|e| BuildError::ConfigError(format!("identity marker '{literal}': {e}")))?;
        let replacement = random_identifier(len);
        html = pattern
            .replace_all(&html, NoExpand(&replacement))
            .into_owned();
    }

    if markers.scrub_semver {
        let replacement = random_identifier(SEMVER_ID_LEN);
        html = SEMVER.replace_all(&html, NoExpand(&replacement)).into_owned();
    }
    Ok(html)
}

pub fn strip_comments(html: &str) -> String {
    COMMENT.replace_all(html, "").into_owned()
}

/// Drop `<meta>` tags mentioning generator, description or keywords.
pub fn strip_revealing_meta(html: &str) -> String {
    REVEALING_META.replace_all(html, "").into_owned()
}

/// Insert a hidden node with random content right after the opening `<body>`.
pub fn insert_decoy(html: &str) -> String {
    let Some(body) = BODY_OPEN.find(html) else {
        return html.to_string();
    };
    let decoy = format!(
        r#"<div style="display:none">{}</div>"#,
        random_identifier(DECOY_ID_LEN)
    );
    let mut out = String::with_capacity(html.len() + decoy.len());
    out.push_str(&html[..body.end()]);
    out.push_str(&decoy);
    out.push_str(&html[body.end()..]);
    out
}

/// Collapse whitespace, drop optional quotes and minify the CSS of real
/// `<style>` elements. Script bodies are left as they are.
pub fn minify_document(html: &str) -> Result<String, BuildError> {
    let cfg = minify_html::Cfg {
        minify_css: true,
        minify_js: false,
        keep_comments: false,
        ..minify_html::Cfg::default()
    };
    let minified = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8(minified)
        .map_err(|_| BuildError::transform("html document", "minification produced invalid UTF-8"))
}
