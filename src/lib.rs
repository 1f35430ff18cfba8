//! # Worker Bundler
//!
//! Build pipeline for an edge worker: sanitizes the panel pages, bakes them
//! into the server module as compile-time constants, bundles the module with
//! Rolldown and (in production) minifies and obfuscates the result before
//! packaging it as `worker.js` + `worker.zip`.
//!
//! Every stage either succeeds or aborts the whole build. No output file is
//! touched until the packaging stage.

pub mod assets;
pub mod bundle;
pub mod config;
pub mod constants;
pub mod css;
pub mod minify;
pub mod obfuscate;
pub mod pack;
pub mod page;
pub mod pipeline;
pub mod plugin;
pub mod random;
pub mod template;
pub mod utils;

use std::path::PathBuf;

use thiserror::Error;

pub use config::{BuildConfig, BuildMode, IdentityMarkers};
pub use pack::BuildArtifact;
pub use page::ProcessedPage;
pub use pipeline::{BuildReport, BuildStage};

// ---------------------------------------------------------------------------
// BuildError
// ---------------------------------------------------------------------------

/// Errors that abort the build. None of them is recovered locally.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing asset: {}", path.display())]
    MissingAsset { path: PathBuf },

    #[error("Transform failed for {context}: {message}")]
    Transform { context: String, message: String },

    #[error("Unresolved compile-time constant `{symbol}` in {module}")]
    UnresolvedConstant { symbol: String, module: String },

    #[error("Build failed: {0}")]
    BundleError(String),

    #[error("Obfuscation failed: {0}")]
    ObfuscateError(String),

    #[error("Packaging failed: {0}")]
    PackageError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: BuildStage,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    pub(crate) fn transform(context: impl Into<String>, message: impl ToString) -> Self {
        BuildError::Transform {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// The stage the error was raised in, if the orchestrator tagged it.
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            BuildError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with stage wrappers removed.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            BuildError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a full build with the given configuration.
///
/// The stages run strictly in order; the first failure is returned tagged
/// with the stage it happened in and nothing is written to the output
/// directory.
pub async fn build_worker(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    pipeline::run(config).await
}
