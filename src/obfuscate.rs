//! Production obfuscation of the bundled worker module.
//!
//! - [`string_array`]: RC4 + base64 string table and its runtime decoder
//! - [`junk`]: numeric expressions and unreachable filler blocks
//! - [`transform`]: the AST walk that records the rewrites
//!
//! Every run draws fresh names, keys and filler, so two builds of the same
//! input differ. The output is parsed again before it is returned.

mod junk;
mod string_array;
mod transform;

use oxc::allocator::Allocator;
use oxc::ast_visit::Visit;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::minify::join_errors;
use crate::BuildError;

pub use string_array::{decode, encode, rc4};

/// Which rewrites run. Every rewrite is on by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObfuscatorOptions {
    /// Move string literals into an encoded array.
    pub string_array: bool,
    /// Replace integer literals with arithmetic.
    pub numbers_to_expressions: bool,
    /// Turn object literal keys into encoded computed keys. Needs `string_array`.
    pub transform_object_keys: bool,
    /// Rename top-level declarations that are not exported.
    pub rename_globals: bool,
    pub dead_code_injection: bool,
    /// Chance, per statement, of a filler block in front of it.
    pub dead_code_threshold: f64,
}

impl Default for ObfuscatorOptions {
    fn default() -> Self {
        Self {
            string_array: true,
            numbers_to_expressions: true,
            transform_object_keys: true,
            rename_globals: true,
            dead_code_injection: true,
            dead_code_threshold: 0.2,
        }
    }
}

/// Counts of what was rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObfuscationStats {
    pub strings: usize,
    pub numbers: usize,
    pub keys: usize,
    pub renamed: usize,
    pub dead_blocks: usize,
}

#[derive(Debug, Clone)]
pub struct Obfuscated {
    pub code: String,
    pub stats: ObfuscationStats,
}

/// Obfuscate one ES module.
pub fn obfuscate(source: &str, options: &ObfuscatorOptions) -> Result<Obfuscated, BuildError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(BuildError::ObfuscateError(format!(
            "cannot parse bundled module: {}",
            join_errors(&parsed.errors)
        )));
    }

    let semantic = SemanticBuilder::new().build(&parsed.program).semantic;
    let mut rewriter =
        transform::Rewriter::new(source, &parsed.program, semantic.scoping(), options);
    rewriter.visit_program(&parsed.program);

    let stats = rewriter.stats;
    let mut edits = rewriter.edits;
    if !rewriter.strings.is_empty() {
        // The runtime goes after any directive prologue.
        let runtime = rewriter.strings.runtime();
        match parsed.program.directives.last() {
            Some(directive) => edits.insert(directive.span.end, format!("\n{runtime}")),
            None => edits.insert(0, format!("{runtime}\n")),
        }
    }
    let code = edits.apply(source);

    verify(&code)?;
    debug!(?stats, bytes = code.len(), "module obfuscated");
    Ok(Obfuscated { code, stats })
}

fn verify(code: &str) -> Result<(), BuildError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(BuildError::ObfuscateError(format!(
            "rewritten module does not parse: {}",
            join_errors(&parsed.errors)
        )));
    }
    Ok(())
}
