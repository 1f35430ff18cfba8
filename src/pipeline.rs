//! Build orchestration.
//!
//! ```text
//! Discovering → SanitizingPages → ReadingIcon → Bundling
//!     → Minifying → Obfuscating      (production)
//!     → PassingThrough               (development)
//!     → Packaging → Done
//! ```
//!
//! Pages are sanitized concurrently; everything else runs in order. The
//! first failure aborts the build, tagged with the stage it happened in.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::assets::{discover_pages, AssetPageSet};
use crate::bundle::bundle_worker;
use crate::config::{BuildConfig, BuildMode, IdentityMarkers};
use crate::constants::{BuildConstants, PageRegistry};
use crate::minify::{compact_script, minify_module};
use crate::obfuscate::obfuscate;
use crate::pack::{package, BuildArtifact};
use crate::page::sanitize_page;
use crate::BuildError;

/// The stage a build is in. A failed build reports the stage it failed in
/// through [`BuildError::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Discovering,
    SanitizingPages,
    ReadingIcon,
    Bundling,
    Minifying,
    Obfuscating,
    PassingThrough,
    Packaging,
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Discovering => "discovering",
            BuildStage::SanitizingPages => "sanitizing pages",
            BuildStage::ReadingIcon => "reading icon",
            BuildStage::Bundling => "bundling",
            BuildStage::Minifying => "minifying",
            BuildStage::Obfuscating => "obfuscating",
            BuildStage::PassingThrough => "passing through",
            BuildStage::Packaging => "packaging",
            BuildStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub mode: BuildMode,
    /// Keys of the sanitized pages, sorted.
    pub pages: Vec<String>,
    /// Every constant made available to the bundler, sorted.
    pub constants: Vec<String>,
    /// Constants the worker graph actually referenced, sorted.
    pub used_constants: Vec<String>,
    pub bundle_bytes: usize,
    pub artifact: BuildArtifact,
}

impl BuildReport {
    pub fn module_path(&self) -> &PathBuf {
        &self.artifact.module_path
    }

    pub fn archive_path(&self) -> &PathBuf {
        &self.artifact.archive_path
    }
}

trait StageExt<T> {
    fn at(self, stage: BuildStage) -> Result<T, BuildError>;
}

impl<T> StageExt<T> for Result<T, BuildError> {
    fn at(self, stage: BuildStage) -> Result<T, BuildError> {
        self.map_err(|source| BuildError::Stage {
            stage,
            source: Box::new(source),
        })
    }
}

pub(crate) async fn run(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    info!(mode = %config.mode, root = %config.root.display(), "🚀 building worker");

    info!(stage = %BuildStage::Discovering, dir = %config.asset_dir.display());
    let sets = discover_pages(&config.asset_dir).at(BuildStage::Discovering)?;

    info!(stage = %BuildStage::SanitizingPages, pages = sets.len());
    let registry = sanitize_pages(sets, &config.markers)
        .await
        .at(BuildStage::SanitizingPages)?;

    info!(stage = %BuildStage::ReadingIcon, path = %config.icon_path.display());
    let icon = read_icon(config).await.at(BuildStage::ReadingIcon)?;

    let constants = BuildConstants::from_pages(&registry, &icon);
    let constant_names: Vec<String> = constants.symbols().map(str::to_string).collect();

    info!(stage = %BuildStage::Bundling, entry = %config.entry.display());
    let bundle = bundle_worker(&config.entry, constants, &config.externals)
        .await
        .at(BuildStage::Bundling)?;
    let bundle_bytes = bundle.code.len();

    let code = if config.mode.is_production() {
        info!(stage = %BuildStage::Minifying, bytes = bundle_bytes);
        let minified = minify_module(&bundle.code).at(BuildStage::Minifying)?;

        info!(stage = %BuildStage::Obfuscating, bytes = minified.len());
        let obfuscated = obfuscate(&minified, &config.obfuscator).at(BuildStage::Obfuscating)?;
        debug!(stats = ?obfuscated.stats);
        obfuscated.code
    } else {
        info!(stage = %BuildStage::PassingThrough, bytes = bundle_bytes);
        bundle.code
    };

    info!(stage = %BuildStage::Packaging, out_dir = %config.out_dir.display());
    let artifact = package(&code, config).await.at(BuildStage::Packaging)?;

    info!(
        stage = %BuildStage::Done,
        module = %artifact.module_path.display(),
        archive = %artifact.archive_path.display(),
        bytes = artifact.bytes,
        "✅ worker built"
    );

    Ok(BuildReport {
        mode: config.mode,
        pages: registry.keys(),
        constants: constant_names,
        used_constants: bundle.used_constants,
        bundle_bytes,
        artifact,
    })
}

/// Read, compact and sanitize every page. The CPU-bound work runs on the
/// blocking pool, one task per page.
async fn sanitize_pages(
    sets: Vec<AssetPageSet>,
    markers: &IdentityMarkers,
) -> Result<PageRegistry, BuildError> {
    let registry = PageRegistry::new();
    let markers = Arc::new(markers.clone());
    let mut tasks = JoinSet::new();

    for set in sets {
        let markers = Arc::clone(&markers);
        tasks.spawn(async move {
            let sources = set.read().await?;
            let page = tokio::task::spawn_blocking(move || {
                let script = compact_script(&sources.script)?;
                let page = sanitize_page(&sources.template, &sources.style, &script, &markers)?;
                Ok::<_, BuildError>((sources.key, page))
            })
            .await
            .map_err(|e| BuildError::transform("page task", e))??;
            Ok::<_, BuildError>(page)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (key, page) = joined.map_err(|e| BuildError::transform("page task", e))??;
        debug!(page = %key, bytes = page.as_str().len(), "page sanitized");
        registry.insert(&key, page)?;
    }
    Ok(registry)
}

async fn read_icon(config: &BuildConfig) -> Result<Vec<u8>, BuildError> {
    match tokio::fs::read(&config.icon_path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BuildError::MissingAsset {
            path: config.icon_path.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_keep_their_cause() {
        let err: Result<(), BuildError> = Err(BuildError::MissingAsset {
            path: PathBuf::from("a/style.css"),
        });
        let err = err.at(BuildStage::Discovering).unwrap_err();
        assert_eq!(err.stage(), Some(BuildStage::Discovering));
        assert!(matches!(err.root_cause(), BuildError::MissingAsset { .. }));
        assert_eq!(
            err.to_string(),
            "discovering stage failed: Missing asset: a/style.css"
        );
    }

    #[tokio::test]
    async fn missing_icon_is_a_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::new(dir.path(), BuildMode::Development);
        let err = read_icon(&config).await.unwrap_err();
        match err {
            BuildError::MissingAsset { path } => assert_eq!(path, config.icon_path),
            other => panic!("expected MissingAsset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pages_are_registered_by_key() {
        let dir = tempfile::tempdir().unwrap();
        for key in ["login", "panel"] {
            let page = dir.path().join(key);
            std::fs::create_dir_all(&page).unwrap();
            std::fs::write(
                page.join("index.html"),
                "<html><head><title>x</title>__STYLE__</head><body><script>__SCRIPT__</script></body></html>",
            )
            .unwrap();
            std::fs::write(page.join("style.css"), "body { color: red; }").unwrap();
            std::fs::write(page.join("script.js"), "console.log('hi');").unwrap();
        }

        let sets = discover_pages(dir.path()).unwrap();
        let registry = sanitize_pages(sets, &IdentityMarkers::default())
            .await
            .unwrap();
        assert_eq!(registry.keys(), vec!["login", "panel"]);
        let login = registry.get("login").unwrap();
        assert!(login.as_str().contains("color:red"));
        assert!(!login.as_str().contains("__SCRIPT__"));
    }
}
