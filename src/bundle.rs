//! Module bundling.
//!
//! Runs Rolldown over the graph rooted at the server entry module with the
//! [`WorkerLoader`] plugin, which keeps runtime modules external and bakes
//! the build constants into the source. The result is one ESM module.

use std::path::Path;
use std::sync::Arc;

use rolldown::{BundlerBuilder, BundlerOptions, InputItem};
use rolldown_common::OutputFormat;
use tracing::debug;

use crate::constants::BuildConstants;
use crate::plugin::{WorkerLoader, WorkerLoaderConfig};
use crate::utils;
use crate::BuildError;

/// The bundled worker.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub code: String,
    /// Constant symbols that were substituted somewhere in the graph, sorted.
    pub used_constants: Vec<String>,
}

/// Bundle `entry` into a single ES module.
pub async fn bundle_worker(
    entry: &Path,
    constants: BuildConstants,
    externals: &[String],
) -> Result<BundleOutput, BuildError> {
    // Pre-build: verify the entry exists (clean MissingAsset)
    if !entry.is_file() {
        return Err(BuildError::MissingAsset {
            path: entry.to_path_buf(),
        });
    }

    let loader = WorkerLoader::new(WorkerLoaderConfig {
        constants,
        externals: externals.to_vec(),
    });
    let used_constants = loader.used_constants();
    let failure = loader.failure();

    let rolldown_options = BundlerOptions {
        input: Some(vec![InputItem {
            name: Some("worker".into()),
            import: entry.to_string_lossy().to_string(),
        }]),
        format: Some(OutputFormat::Esm),
        platform: Some(rolldown_common::Platform::Browser),
        // No down-levelling target. Rolldown emits the syntax it was given,
        // which for the worker sources is ES2020, and the edge runtime runs
        // current V8. The obfuscator's own runtime is plain ES5.
        ..Default::default()
    };

    let mut bundler = BundlerBuilder::default()
        .with_options(rolldown_options)
        .with_plugins(vec![Arc::new(loader)])
        .build()
        .map_err(|e| BuildError::BundleError(format!("Rolldown init failed: {:?}", e)))?;

    let bundle_output = match bundler.generate().await {
        Ok(output) => output,
        Err(e) => {
            // Prefer the plugin's own error over Rolldown's rendering of it.
            let plugin_error = failure.lock().ok().and_then(|mut slot| slot.take());
            return Err(plugin_error.unwrap_or_else(|| {
                BuildError::BundleError(format!("Rolldown build failed: {:?}", e))
            }));
        }
    };

    bundler
        .close()
        .await
        .map_err(|e| BuildError::BundleError(format!("Rolldown close failed: {:?}", e)))?;

    let code = bundle_output
        .assets
        .iter()
        .find_map(|asset| match asset {
            rolldown_common::Output::Chunk(chunk) => Some(chunk.code.clone()),
            _ => None,
        })
        .ok_or_else(|| BuildError::BundleError("No entry chunk in Rolldown output".into()))?;

    let code = utils::strip_region_comments(&code);

    let mut used: Vec<String> = used_constants.iter().map(|r| r.key().clone()).collect();
    used.sort();
    debug!(bytes = code.len(), constants = ?used, "worker bundled");

    Ok(BundleOutput {
        code,
        used_constants: used,
    })
}
