//! Build configuration.
//!
//! A [`BuildConfig`] is constructed once per invocation and threaded through
//! every stage. Defaults describe the standard project layout; an optional
//! TOML file can override any of them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::obfuscate::ObfuscatorOptions;
use crate::BuildError;

// ---------------------------------------------------------------------------
// Build Mode
// ---------------------------------------------------------------------------

/// Selects which stages run after bundling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Raw bundle, no minification or obfuscation.
    Development,
    /// Minify, then obfuscate.
    Production,
}

impl BuildMode {
    /// Interpret an environment value the way `NODE_ENV` is interpreted:
    /// unset or `production` is a production build, anything else is not.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("production") => BuildMode::Production,
            Some(_) => BuildMode::Development,
        }
    }

    pub fn parse(value: &str) -> Result<Self, BuildError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(BuildMode::Development),
            "prod" | "production" => Ok(BuildMode::Production),
            other => Err(BuildError::ConfigError(format!(
                "unknown build mode '{other}' (expected development or production)"
            ))),
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity markers
// ---------------------------------------------------------------------------

/// Product-identifying literals scrubbed from every page template.
///
/// Each class gets one fresh identifier per page, so all occurrences of the
/// same literal inside one page are replaced consistently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityMarkers {
    pub brand: String,
    pub display_name: String,
    pub version_token: String,
    /// Also scrub anything shaped like `v1.2.3`.
    pub scrub_semver: bool,
}

impl Default for IdentityMarkers {
    fn default() -> Self {
        Self {
            brand: "BPB-Worker-Panel".into(),
            display_name: "BPB Panel".into(),
            version_token: "v__PANEL_VERSION__".into(),
            scrub_semver: true,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildConfig
// ---------------------------------------------------------------------------

/// Describes WHERE inputs live, WHERE outputs go, and HOW to transform.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub mode: BuildMode,
    /// Project root; every relative path below is resolved against it.
    pub root: PathBuf,
    pub asset_dir: PathBuf,
    pub icon_path: PathBuf,
    pub entry: PathBuf,
    pub out_dir: PathBuf,
    pub module_file_name: String,
    pub archive_file_name: String,
    /// Name of the single entry inside the archive.
    pub archive_entry_name: String,
    /// Import specifiers provided by the runtime; never bundled.
    pub externals: Vec<String>,
    pub markers: IdentityMarkers,
    pub obfuscator: ObfuscatorOptions,
}

/// On-disk overrides. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    mode: Option<BuildMode>,
    asset_dir: Option<PathBuf>,
    icon: Option<PathBuf>,
    entry: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    module_file_name: Option<String>,
    archive_file_name: Option<String>,
    archive_entry_name: Option<String>,
    externals: Option<Vec<String>>,
    markers: Option<IdentityMarkers>,
    obfuscator: Option<ObfuscatorOptions>,
}

impl BuildConfig {
    /// Standard layout under `root`.
    pub fn new(root: impl Into<PathBuf>, mode: BuildMode) -> Self {
        let root = root.into();
        Self {
            mode,
            asset_dir: root.join("src").join("assets"),
            icon_path: root.join("src").join("assets").join("favicon.ico"),
            entry: root.join("src").join("worker.js"),
            out_dir: root.join("dist"),
            root,
            module_file_name: "worker.js".into(),
            archive_file_name: "worker.zip".into(),
            archive_entry_name: "_worker.js".into(),
            externals: vec!["cloudflare:sockets".into()],
            markers: IdentityMarkers::default(),
            obfuscator: ObfuscatorOptions::default(),
        }
    }

    /// Standard layout, overridden by the TOML file at `config_path` if given.
    /// An explicit `mode` argument wins over the file's `mode`.
    pub fn load(
        root: impl Into<PathBuf>,
        mode: Option<BuildMode>,
        config_path: Option<&Path>,
    ) -> Result<Self, BuildError> {
        let root = root.into();
        let file = match config_path {
            Some(path) => {
                let path = resolve(&root, path);
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    BuildError::ConfigError(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::parse_file(&raw)?
            }
            None => ConfigFile::default(),
        };

        let mode = mode.or(file.mode).unwrap_or(BuildMode::Production);
        let mut config = Self::new(root, mode);
        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    fn parse_file(raw: &str) -> Result<ConfigFile, BuildError> {
        toml::from_str(raw).map_err(|e| BuildError::ConfigError(e.to_string()))
    }

    fn apply(&mut self, file: ConfigFile) {
        let root = self.root.clone();
        if let Some(p) = file.asset_dir {
            self.asset_dir = resolve(&root, &p);
        }
        if let Some(p) = file.icon {
            self.icon_path = resolve(&root, &p);
        }
        if let Some(p) = file.entry {
            self.entry = resolve(&root, &p);
        }
        if let Some(p) = file.out_dir {
            self.out_dir = resolve(&root, &p);
        }
        if let Some(name) = file.module_file_name {
            self.module_file_name = name;
        }
        if let Some(name) = file.archive_file_name {
            self.archive_file_name = name;
        }
        if let Some(name) = file.archive_entry_name {
            self.archive_entry_name = name;
        }
        if let Some(externals) = file.externals {
            self.externals = externals;
        }
        if let Some(markers) = file.markers {
            self.markers = markers;
        }
        if let Some(obfuscator) = file.obfuscator {
            self.obfuscator = obfuscator;
        }
    }

    fn validate(&self) -> Result<(), BuildError> {
        for (field, value) in [
            ("module_file_name", &self.module_file_name),
            ("archive_file_name", &self.archive_file_name),
            ("archive_entry_name", &self.archive_entry_name),
        ] {
            if value.trim().is_empty() {
                return Err(BuildError::ConfigError(format!("{field} must not be empty")));
            }
        }
        if self.module_file_name == self.archive_file_name {
            return Err(BuildError::ConfigError(
                "module_file_name and archive_file_name must differ".into(),
            ));
        }
        let threshold = self.obfuscator.dead_code_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(BuildError::ConfigError(format!(
                "obfuscator.dead_code_threshold must be within 0..=1, got {threshold}"
            )));
        }
        Ok(())
    }

    pub fn module_path(&self) -> PathBuf {
        self.out_dir.join(&self.module_file_name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.out_dir.join(&self.archive_file_name)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_env_value_follows_node_env() {
        assert_eq!(BuildMode::from_env_value(None), BuildMode::Production);
        assert_eq!(
            BuildMode::from_env_value(Some("production")),
            BuildMode::Production
        );
        assert_eq!(
            BuildMode::from_env_value(Some("development")),
            BuildMode::Development
        );
        assert_eq!(BuildMode::from_env_value(Some("test")), BuildMode::Development);
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        assert_eq!(BuildMode::parse("dev").unwrap(), BuildMode::Development);
        assert_eq!(BuildMode::parse("PROD").unwrap(), BuildMode::Production);
        assert!(BuildMode::parse("staging").is_err());
    }

    #[test]
    fn default_layout() {
        let config = BuildConfig::new("/proj", BuildMode::Development);
        assert_eq!(config.asset_dir, PathBuf::from("/proj/src/assets"));
        assert_eq!(config.entry, PathBuf::from("/proj/src/worker.js"));
        assert_eq!(config.module_path(), PathBuf::from("/proj/dist/worker.js"));
        assert_eq!(config.archive_path(), PathBuf::from("/proj/dist/worker.zip"));
        assert_eq!(config.archive_entry_name, "_worker.js");
        assert_eq!(config.externals, vec!["cloudflare:sockets".to_string()]);
    }

    #[test]
    fn file_overrides_resolve_against_root() {
        let file = BuildConfig::parse_file(
            r#"
            out_dir = "build"
            externals = ["cloudflare:sockets", "cloudflare:workers"]

            [markers]
            brand = "Acme"
            "#,
        )
        .unwrap();
        let mut config = BuildConfig::new("/proj", BuildMode::Production);
        config.apply(file);

        assert_eq!(config.out_dir, PathBuf::from("/proj/build"));
        assert_eq!(config.externals.len(), 2);
        assert_eq!(config.markers.brand, "Acme");
        // Unspecified marker fields keep their defaults.
        assert_eq!(config.markers.display_name, "BPB Panel");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BuildConfig::parse_file("outdir = \"x\"").is_err());
    }

    #[test]
    fn identical_output_names_are_rejected() {
        let mut config = BuildConfig::new("/proj", BuildMode::Production);
        config.archive_file_name = config.module_file_name.clone();
        assert!(config.validate().is_err());
    }
}
