//! Compile-time constant substitution.
//!
//! Every free identifier shaped like `__UPPER_CASE__` is replaced with its
//! literal from [`BuildConstants`]. Only references that resolve to no
//! binding are touched, so a local variable that happens to share a
//! constant's name keeps its meaning.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{Expression, IdentifierReference, ObjectProperty};
use oxc::ast_visit::{walk, Visit};
use oxc::parser::Parser;
use oxc::semantic::{Scoping, SemanticBuilder};
use oxc::span::SourceType;

use crate::constants::{is_constant_symbol, BuildConstants};
use crate::minify::join_errors;
use crate::utils::{needs_separator, SourceEdits};
use crate::BuildError;

/// Result of rewriting one module.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    pub code: String,
    /// Symbols that were replaced, in source order, with repeats.
    pub symbols: Vec<String>,
}

/// Substitute constants in one module.
///
/// Returns `Ok(None)` when the module is not JavaScript or references no
/// constant. An unknown constant symbol is an error.
pub fn substitute_constants(
    source: &str,
    module_id: &str,
    constants: &BuildConstants,
) -> Result<Option<Substitution>, BuildError> {
    let Ok(source_type) = SourceType::from_path(Path::new(module_id)) else {
        return Ok(None);
    };
    if !source.contains("__") {
        return Ok(None);
    }

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(BuildError::transform(module_id, join_errors(&parsed.errors)));
    }

    let semantic = SemanticBuilder::new().build(&parsed.program).semantic;
    let mut collector = FreeConstants {
        scoping: semantic.scoping(),
        source,
        constants,
        edits: SourceEdits::new(),
        symbols: Vec::new(),
        missing: None,
    };
    collector.visit_program(&parsed.program);

    if let Some(symbol) = collector.missing {
        return Err(BuildError::UnresolvedConstant {
            symbol,
            module: module_id.to_string(),
        });
    }
    if collector.symbols.is_empty() {
        return Ok(None);
    }

    let symbols = collector.symbols;
    let code = collector.edits.apply(source);
    Ok(Some(Substitution { code, symbols }))
}

struct FreeConstants<'s> {
    scoping: &'s Scoping,
    source: &'s str,
    constants: &'s BuildConstants,
    edits: SourceEdits,
    symbols: Vec<String>,
    missing: Option<String>,
}

impl FreeConstants<'_> {
    fn is_free_constant(&self, ident: &IdentifierReference) -> bool {
        if !is_constant_symbol(&ident.name) {
            return false;
        }
        match ident.reference_id.get() {
            Some(reference_id) => self
                .scoping
                .get_reference(reference_id)
                .symbol_id()
                .is_none(),
            None => true,
        }
    }
}

impl<'a> Visit<'a> for FreeConstants<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if self.missing.is_some() || !self.is_free_constant(ident) {
            return;
        }

        let Some(literal) = self.constants.resolve(&ident.name) else {
            self.missing = Some(ident.name.to_string());
            return;
        };

        let text = if needs_separator(self.source, ident.span.start) {
            format!(" {literal}")
        } else {
            literal.to_string()
        };
        self.edits.replace(ident.span.start, ident.span.end, text);
        self.symbols.push(ident.name.to_string());
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        // `{ __ICON__ }` must keep its key once the value becomes a literal.
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if self.is_free_constant(ident) {
                    self.edits
                        .insert(ident.span.start, format!("{}:", ident.name));
                }
            }
        }
        walk::walk_object_property(self, prop);
    }
}
