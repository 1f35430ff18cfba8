//! Worker Loader: Rolldown plugin for the server entry module graph.
//!
//! Implements the Rolldown `Plugin` trait with:
//! - `resolve_id`: keep runtime-provided modules (e.g. `cloudflare:sockets`)
//!   as bare external imports
//! - `transform`: substitute compile-time constants in every JS module
//!
//! **Invariants:**
//! - External specifiers are never loaded or inlined
//! - A constant symbol with no value fails the build

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};

use arcstr::ArcStr;
use dashmap::DashMap;
use rolldown_common::ResolvedExternal;
use rolldown_plugin::{
    HookResolveIdArgs, HookResolveIdOutput, HookTransformArgs, HookTransformOutput, HookUsage,
    Plugin, SharedTransformPluginContext,
};

use crate::constants::BuildConstants;
use crate::plugin::define::substitute_constants;
use crate::BuildError;

/// Configuration for the worker loader plugin.
#[derive(Debug, Clone, Default)]
pub struct WorkerLoaderConfig {
    pub constants: BuildConstants,
    /// Specifiers resolved as external imports.
    pub externals: Vec<String>,
}

/// The worker loader Rolldown plugin.
pub struct WorkerLoader {
    constants: Arc<BuildConstants>,
    externals: Arc<Vec<String>>,
    /// Substitution counts per symbol, for the build report.
    used_constants: Arc<DashMap<String, usize>>,
    /// First hook failure, kept typed; Rolldown only sees its message.
    failure: Arc<Mutex<Option<BuildError>>>,
}

impl fmt::Debug for WorkerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLoader")
            .field("constants", &self.constants.len())
            .field("externals", &self.externals)
            .finish()
    }
}

impl WorkerLoader {
    pub fn new(config: WorkerLoaderConfig) -> Self {
        Self {
            constants: Arc::new(config.constants),
            externals: Arc::new(config.externals),
            used_constants: Arc::new(DashMap::new()),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Substitution counts, readable after the build.
    pub fn used_constants(&self) -> Arc<DashMap<String, usize>> {
        Arc::clone(&self.used_constants)
    }

    /// Handle to the first hook failure, readable after the build.
    pub fn failure(&self) -> Arc<Mutex<Option<BuildError>>> {
        Arc::clone(&self.failure)
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        self.externals.iter().any(|external| external == specifier)
    }
}

// ---------------------------------------------------------------------------
// Rolldown Plugin Trait Implementation
// ---------------------------------------------------------------------------

impl Plugin for WorkerLoader {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("worker-loader")
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Transform
    }

    /// Mark runtime-provided specifiers as external.
    fn resolve_id(
        &self,
        _ctx: &rolldown_plugin::PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = rolldown_plugin::HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let external = self.is_external(&specifier);

        async move {
            if !external {
                return Ok(None);
            }
            Ok(Some(HookResolveIdOutput {
                id: ArcStr::from(specifier),
                external: Some(ResolvedExternal::Bool(true)),
                ..Default::default()
            }))
        }
    }

    /// Replace constant symbols with their literals.
    fn transform(
        &self,
        _ctx: SharedTransformPluginContext,
        args: &HookTransformArgs<'_>,
    ) -> impl std::future::Future<Output = rolldown_plugin::HookTransformReturn> + Send {
        let id = args.id.to_string();
        let code = args.code.clone();
        let constants = Arc::clone(&self.constants);
        let used_constants = Arc::clone(&self.used_constants);
        let failure = Arc::clone(&self.failure);

        async move {
            let substitution = match substitute_constants(&code, &id, &constants) {
                Ok(Some(substitution)) => substitution,
                Ok(None) => return Ok(None),
                Err(err) => {
                    let message = err.to_string();
                    if let Ok(mut slot) = failure.lock() {
                        slot.get_or_insert(err);
                    }
                    return Err(anyhow::anyhow!(message));
                }
            };

            for symbol in substitution.symbols {
                *used_constants.entry(symbol).or_insert(0) += 1;
            }

            Ok(Some(HookTransformOutput {
                code: Some(substitution.code),
                ..Default::default()
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> WorkerLoader {
        WorkerLoader::new(WorkerLoaderConfig {
            constants: BuildConstants::new(),
            externals: vec!["cloudflare:sockets".into()],
        })
    }

    #[test]
    fn plugin_name() {
        assert_eq!(loader().name(), "worker-loader");
    }

    #[test]
    fn plugin_register_hooks() {
        let usage = loader().register_hook_usage();
        assert!(usage.contains(HookUsage::ResolveId));
        assert!(usage.contains(HookUsage::Transform));
        assert!(!usage.contains(HookUsage::Load));
    }

    #[test]
    fn externals_match_exactly() {
        let loader = loader();
        assert!(loader.is_external("cloudflare:sockets"));
        assert!(!loader.is_external("cloudflare:workers"));
        assert!(!loader.is_external("./sockets.js"));
    }
}
