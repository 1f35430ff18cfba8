//! Page asset discovery.
//!
//! Every directory under the asset root that holds an `index.html` is one
//! page. Its siblings `style.css` and `script.js` are mandatory, and its key
//! must map to a `__KEY_HTML_CONTENT__` constant the bundler can substitute.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::{is_constant_symbol, page_symbol};
use crate::BuildError;

pub const TEMPLATE_FILE: &str = "index.html";
pub const STYLE_FILE: &str = "style.css";
pub const SCRIPT_FILE: &str = "script.js";

/// The template/stylesheet/script trio of one page directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPageSet {
    /// Directory relative to the asset root, `/`-separated (e.g. `login`).
    pub key: String,
    pub dir: PathBuf,
}

/// Raw contents of an [`AssetPageSet`].
#[derive(Debug, Clone)]
pub struct PageSources {
    pub key: String,
    pub template: String,
    pub style: String,
    pub script: String,
}

impl AssetPageSet {
    pub fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_FILE)
    }

    pub fn style_path(&self) -> PathBuf {
        self.dir.join(STYLE_FILE)
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(SCRIPT_FILE)
    }

    /// Load all three files.
    pub async fn read(&self) -> Result<PageSources, BuildError> {
        let (template, style, script) = tokio::try_join!(
            read_asset(self.template_path()),
            read_asset(self.style_path()),
            read_asset(self.script_path()),
        )?;
        Ok(PageSources {
            key: self.key.clone(),
            template,
            style,
            script,
        })
    }
}

/// Find every page under `asset_root`, sorted by key.
///
/// Fails on the first directory that lacks one of the sibling files, so a
/// broken page never reaches the sanitizer.
pub fn discover_pages(asset_root: &Path) -> Result<Vec<AssetPageSet>, BuildError> {
    if !asset_root.is_dir() {
        return Err(BuildError::MissingAsset {
            path: asset_root.to_path_buf(),
        });
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(asset_root).follow_links(true) {
        let entry = entry.map_err(|e| {
            BuildError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("failed to walk {}: {e}", asset_root.display()),
            ))
        })?;

        if !entry.file_type().is_file() || entry.file_name() != TEMPLATE_FILE {
            continue;
        }

        let dir = match entry.path().parent() {
            Some(dir) => dir.to_path_buf(),
            None => continue,
        };
        let key = page_key(asset_root, &dir);
        let symbol = page_symbol(&key);
        if !is_constant_symbol(&symbol) {
            return Err(BuildError::ConfigError(format!(
                "page directory '{key}' maps to {symbol}, which is not a constant name; \
                 page directories must sit below the asset root and start with a letter"
            )));
        }
        let page = AssetPageSet { key, dir };

        for required in [page.style_path(), page.script_path()] {
            if !required.is_file() {
                return Err(BuildError::MissingAsset { path: required });
            }
        }
        pages.push(page);
    }

    pages.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(pages)
}

/// Directory name relative to the asset root, with forward slashes.
/// A template directly in the root gets the key `.`.
fn page_key(asset_root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(asset_root).unwrap_or(dir);
    let key = relative.to_string_lossy().replace('\\', "/");
    if key.is_empty() {
        ".".to_string()
    } else {
        key
    }
}

async fn read_asset(path: PathBuf) -> Result<String, BuildError> {
    tokio::fs::read_to_string(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BuildError::MissingAsset { path }
        } else {
            BuildError::IoError(e)
        }
    })
}
