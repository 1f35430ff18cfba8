//! Page registry and compile-time constants.
//!
//! Sanitizer tasks write their pages into the [`PageRegistry`] concurrently;
//! each page directory owns exactly one key, so writes never conflict. Once
//! every page is in, the registry and the icon are frozen into
//! [`BuildConstants`], the symbol → literal table the bundler substitutes.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;

use crate::page::ProcessedPage;
use crate::BuildError;

/// Symbol holding the base64 favicon.
pub const ICON_SYMBOL: &str = "__ICON__";

const PAGE_SYMBOL_SUFFIX: &str = "_HTML_CONTENT__";

/// Literal substituted for page symbols with no discovered page.
pub const EMPTY_PAGE_LITERAL: &str = "\"\"";

// ---------------------------------------------------------------------------
// PageRegistry
// ---------------------------------------------------------------------------

/// Thread-safe map from page key to its processed HTML.
#[derive(Debug, Clone, Default)]
pub struct PageRegistry {
    pages: Arc<DashMap<String, ProcessedPage>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page. A key may only be written once per build.
    pub fn insert(&self, key: &str, page: ProcessedPage) -> Result<(), BuildError> {
        use dashmap::mapref::entry::Entry;

        match self.pages.entry(key.to_string()) {
            Entry::Occupied(_) => Err(BuildError::transform(
                "page registry",
                format!("page '{key}' was registered twice"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(page);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<ProcessedPage> {
        self.pages.get(key).map(|entry| entry.value().clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pages.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BuildConstants
// ---------------------------------------------------------------------------

/// Symbol → JS literal source text, e.g. `__LOGIN_HTML_CONTENT__` →
/// `"<!DOCTYPE html>…"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConstants {
    entries: BTreeMap<String, String>,
}

impl BuildConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per registered page plus the icon.
    pub fn from_pages(registry: &PageRegistry, icon: &[u8]) -> Self {
        let mut constants = Self::new();
        for key in registry.keys() {
            if let Some(page) = registry.get(&key) {
                constants.insert(page_symbol(&key), page.to_js_literal());
            }
        }
        constants.insert(ICON_SYMBOL, icon_literal(icon));
        constants
    }

    pub fn insert(&mut self, symbol: impl Into<String>, literal: impl Into<String>) {
        self.entries.insert(symbol.into(), literal.into());
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.entries.get(symbol).map(String::as_str)
    }

    /// Literal for `symbol`. Page symbols without a page resolve to `""`;
    /// any other unknown symbol has no value.
    pub fn resolve(&self, symbol: &str) -> Option<&str> {
        self.get(symbol)
            .or_else(|| is_page_symbol(symbol).then_some(EMPTY_PAGE_LITERAL))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `login` → `__LOGIN_HTML_CONTENT__`, `admin/secrets` → `__ADMIN_SECRETS_HTML_CONTENT__`.
pub fn page_symbol(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("__{stem}{PAGE_SYMBOL_SUFFIX}")
}

/// Whether `name` has the shape of a compile-time constant: `__UPPER_CASE__`.
pub fn is_constant_symbol(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix("__")
        .and_then(|rest| rest.strip_suffix("__"))
    else {
        return false;
    };
    inner.starts_with(|c: char| c.is_ascii_uppercase())
        && inner
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

pub fn is_page_symbol(name: &str) -> bool {
    is_constant_symbol(name) && name.ends_with(PAGE_SYMBOL_SUFFIX)
}

/// The icon bytes as a JSON string literal of their base64 encoding.
pub fn icon_literal(icon: &[u8]) -> String {
    serde_json::Value::String(STANDARD.encode(icon)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> ProcessedPage {
        crate::page::sanitize_page(html, "", "", &Default::default()).unwrap()
    }

    #[test]
    fn page_symbols() {
        assert_eq!(page_symbol("panel"), "__PANEL_HTML_CONTENT__");
        assert_eq!(page_symbol("admin/secrets"), "__ADMIN_SECRETS_HTML_CONTENT__");
        assert_eq!(page_symbol("sign-in"), "__SIGN_IN_HTML_CONTENT__");
    }

    #[test]
    fn constant_symbol_shape() {
        assert!(is_constant_symbol("__ICON__"));
        assert!(is_constant_symbol("__PANEL_HTML_CONTENT__"));
        assert!(!is_constant_symbol("__proto__"));
        assert!(!is_constant_symbol("__dirname"));
        assert!(!is_constant_symbol("____"));
        assert!(!is_constant_symbol("ICON"));
    }

    #[test]
    fn registry_rejects_duplicate_keys() {
        let registry = PageRegistry::new();
        registry.insert("login", page("<p>a</p>")).unwrap();
        assert!(registry.insert("login", page("<p>b</p>")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn constants_have_one_entry_per_page_plus_icon() {
        let registry = PageRegistry::new();
        registry.insert("panel", page("<p>panel</p>")).unwrap();
        registry.insert("login", page("<p>login</p>")).unwrap();

        let constants = BuildConstants::from_pages(&registry, &[0, 1, 2, 3]);
        let symbols: Vec<_> = constants.symbols().collect();
        assert_eq!(
            symbols,
            vec!["__ICON__", "__LOGIN_HTML_CONTENT__", "__PANEL_HTML_CONTENT__"]
        );
        assert_eq!(constants.get("__ICON__"), Some("\"AAECAw==\""));

        let login: String =
            serde_json::from_str(constants.get("__LOGIN_HTML_CONTENT__").unwrap()).unwrap();
        assert!(login.contains("login"));
    }

    #[test]
    fn missing_page_symbols_default_to_empty_string() {
        let constants = BuildConstants::from_pages(&PageRegistry::new(), &[]);
        assert_eq!(constants.resolve("__SECRETS_HTML_CONTENT__"), Some("\"\""));
        assert_eq!(constants.resolve("__API_KEY__"), None);
        assert_eq!(constants.resolve("__ICON__"), Some("\"\""));
    }
}
