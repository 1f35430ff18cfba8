//! The rewriting pass.
//!
//! A read-only walk over the parsed module records span edits; nothing is
//! re-printed, so untouched code keeps its exact text. Module plumbing
//! (import and re-export specifiers, directives, class member names) is
//! never rewritten.

use std::collections::{HashMap, HashSet};

use oxc::ast::ast::{
    AccessorProperty, ArrowFunctionExpression, AssignmentTargetPropertyIdentifier,
    AssignmentTargetPropertyProperty, BindingIdentifier, BindingPattern, BindingPatternKind,
    BindingProperty, BlockStatement, Directive, ExportAllDeclaration, ExportNamedDeclaration,
    Expression, FunctionBody, IdentifierReference, ImportDeclaration, ImportExpression,
    MethodDefinition, ModuleExportName, NumericLiteral, ObjectProperty, Program, PropertyDefinition,
    PropertyKey, Statement, StringLiteral, TaggedTemplateExpression, TemplateLiteral,
};
use oxc::ast_visit::{walk, Visit};
use oxc::semantic::Scoping;
use oxc::span::{GetSpan, Span};
use oxc::syntax::symbol::SymbolId;
use rand::rngs::ThreadRng;
use rand::Rng;

use super::junk::{dead_code_block, is_expressible, number_expression};
use super::string_array::StringArray;
use super::{ObfuscationStats, ObfuscatorOptions};
use crate::random::random_hex_name;
use crate::utils::{needs_separator, SourceEdits};

/// Keys whose computed form changes semantics.
const RESERVED_KEYS: [&str; 2] = ["__proto__", "constructor"];

pub(super) struct Rewriter<'s> {
    source: &'s str,
    scoping: &'s Scoping,
    options: &'s ObfuscatorOptions,
    pub(super) strings: StringArray,
    renames: HashMap<SymbolId, String>,
    pub(super) edits: SourceEdits,
    pub(super) stats: ObfuscationStats,
    rng: ThreadRng,
    /// Set while the next property key belongs to a class member.
    class_key: bool,
}

impl<'s> Rewriter<'s> {
    pub(super) fn new(
        source: &'s str,
        program: &Program<'_>,
        scoping: &'s Scoping,
        options: &'s ObfuscatorOptions,
    ) -> Self {
        let mut taken: HashSet<String> = HashSet::new();
        let mut is_taken = |name: &str| source.contains(name) || !taken.insert(name.to_string());

        let strings = StringArray::new(&mut is_taken);
        let renames = if options.rename_globals {
            top_level_symbols(program)
                .into_iter()
                .map(|symbol| (symbol, fresh_name(&mut is_taken)))
                .collect()
        } else {
            HashMap::new()
        };

        Self {
            source,
            scoping,
            options,
            strings,
            stats: ObfuscationStats {
                renamed: renames.len(),
                ..Default::default()
            },
            renames,
            edits: SourceEdits::new(),
            rng: rand::rng(),
            class_key: false,
        }
    }

    fn separated(&self, pos: u32, text: String) -> String {
        if needs_separator(self.source, pos) {
            format!(" {text}")
        } else {
            text
        }
    }

    fn encode_string(&mut self, span: Span, value: &str) {
        if !self.options.string_array {
            return;
        }
        let call = self.strings.call_for(value);
        let text = self.separated(span.start, call);
        self.edits.replace(span.start, span.end, text);
        self.stats.strings += 1;
    }

    fn transforms_keys(&self) -> bool {
        self.options.transform_object_keys && self.options.string_array
    }

    /// `name` → `[decoder(…)]` for a non-computed key at `span`.
    fn computed_key(&mut self, span: Span, name: &str) {
        if !self.transforms_keys() || RESERVED_KEYS.contains(&name) {
            return;
        }
        let call = self.strings.call_for(name);
        self.edits.replace(span.start, span.end, format!("[{call}]"));
        self.stats.keys += 1;
    }

    fn literal_key(&mut self, key: &PropertyKey<'_>) {
        match key {
            PropertyKey::StaticIdentifier(ident) => self.computed_key(ident.span, &ident.name),
            PropertyKey::StringLiteral(lit) => self.computed_key(lit.span, &lit.value),
            _ => {}
        }
    }

    /// Key text to insert in front of a shorthand property named `name`,
    /// so that `{a}` survives both key encoding and renaming of `a`.
    fn shorthand_key(&mut self, name: &str, renamed: bool) -> Option<String> {
        if self.transforms_keys() && !RESERVED_KEYS.contains(&name) {
            let call = self.strings.call_for(name);
            self.stats.keys += 1;
            Some(format!("[{call}]:"))
        } else if renamed {
            Some(format!("{name}:"))
        } else {
            None
        }
    }

    fn reference_rename(&self, ident: &IdentifierReference<'_>) -> Option<&str> {
        let reference_id = ident.reference_id.get()?;
        let symbol_id = self.scoping.get_reference(reference_id).symbol_id()?;
        self.renames.get(&symbol_id).map(String::as_str)
    }

    fn binding_rename(&self, ident: &BindingIdentifier<'_>) -> Option<&str> {
        let symbol_id = ident.symbol_id.get()?;
        self.renames.get(&symbol_id).map(String::as_str)
    }

    fn inject_dead_code(&mut self, statements: &[Statement<'_>]) {
        if !self.options.dead_code_injection {
            return;
        }
        for statement in statements {
            if !self.rng.random_bool(self.options.dead_code_threshold) {
                continue;
            }
            let start = statement.span().start;
            let block = dead_code_block(&mut self.rng);
            let text = self.separated(start, block);
            self.edits.insert(start, text);
            self.stats.dead_blocks += 1;
        }
    }
}

impl<'a> Visit<'a> for Rewriter<'_> {
    // -- literals ---------------------------------------------------------

    fn visit_string_literal(&mut self, lit: &StringLiteral<'a>) {
        self.encode_string(lit.span, &lit.value);
    }

    fn visit_numeric_literal(&mut self, lit: &NumericLiteral<'a>) {
        if !self.options.numbers_to_expressions || !is_expressible(lit.value) {
            return;
        }
        let expression = number_expression(lit.value as u64, &mut self.rng);
        self.edits.replace(lit.span.start, lit.span.end, expression);
        self.stats.numbers += 1;
    }

    fn visit_template_literal(&mut self, lit: &TemplateLiteral<'a>) {
        if lit.expressions.is_empty() {
            let quasi = lit.quasis.first().filter(|q| !q.lone_surrogates);
            if let Some(cooked) = quasi.and_then(|q| q.value.cooked.as_ref()) {
                self.encode_string(lit.span, cooked);
                return;
            }
        }
        if self.options.string_array {
            // `a${x}b` → `${dec(0)}${x}${dec(1)}`
            for quasi in lit.quasis.iter().filter(|q| !q.lone_surrogates) {
                let Some(cooked) = quasi.value.cooked.as_ref().filter(|c| !c.is_empty()) else {
                    continue;
                };
                let call = self.strings.call_for(cooked);
                self.edits
                    .replace(quasi.span.start, quasi.span.end, format!("${{{call}}}"));
                self.stats.strings += 1;
            }
        }
        walk::walk_template_literal(self, lit);
    }

    fn visit_tagged_template_expression(&mut self, expr: &TaggedTemplateExpression<'a>) {
        // The tag receives the raw strings.
        self.visit_expression(&expr.tag);
        for expression in &expr.quasi.expressions {
            self.visit_expression(expression);
        }
    }

    fn visit_directive(&mut self, _directive: &Directive<'a>) {}

    // -- identifiers ------------------------------------------------------

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(name) = self.reference_rename(ident) {
            let name = name.to_string();
            self.edits.replace(ident.span.start, ident.span.end, name);
        }
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if let Some(name) = self.binding_rename(ident) {
            let name = name.to_string();
            self.edits.replace(ident.span.start, ident.span.end, name);
        }
    }

    // -- module plumbing --------------------------------------------------

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _decl: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if decl.source.is_some() {
            return;
        }
        if let Some(declaration) = &decl.declaration {
            self.visit_declaration(declaration);
        }
        for specifier in &decl.specifiers {
            let ModuleExportName::IdentifierReference(local) = &specifier.local else {
                continue;
            };
            let Some(name) = self.reference_rename(local) else {
                continue;
            };
            // `export { a }` carries one span for both names.
            let text = if specifier.exported.span() == local.span {
                format!("{name} as {}", local.name)
            } else {
                name.to_string()
            };
            self.edits.replace(local.span.start, local.span.end, text);
        }
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if matches!(expr.source, Expression::StringLiteral(_)) {
            return;
        }
        walk::walk_import_expression(self, expr);
    }

    // -- property keys ----------------------------------------------------

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                let renamed = self.reference_rename(ident).is_some();
                if let Some(key) = self.shorthand_key(&ident.name, renamed) {
                    self.edits.insert(ident.span.start, key);
                }
                self.visit_identifier_reference(ident);
                return;
            }
        }

        if prop.computed {
            self.visit_property_key(&prop.key);
        } else {
            self.literal_key(&prop.key);
        }
        self.visit_expression(&prop.value);
    }

    fn visit_binding_property(&mut self, prop: &BindingProperty<'a>) {
        if prop.shorthand {
            if let PropertyKey::StaticIdentifier(key) = &prop.key {
                let renamed = shorthand_binding(&prop.value)
                    .is_some_and(|binding| self.binding_rename(binding).is_some());
                if let Some(text) = self.shorthand_key(&key.name, renamed) {
                    self.edits.insert(key.span.start, text);
                }
                self.visit_binding_pattern(&prop.value);
                return;
            }
        }

        if prop.computed {
            self.visit_property_key(&prop.key);
        } else {
            self.literal_key(&prop.key);
        }
        self.visit_binding_pattern(&prop.value);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        prop: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        let renamed = self.reference_rename(&prop.binding).is_some();
        if let Some(key) = self.shorthand_key(&prop.binding.name, renamed) {
            self.edits.insert(prop.binding.span.start, key);
        }
        walk::walk_assignment_target_property_identifier(self, prop);
    }

    fn visit_assignment_target_property_property(
        &mut self,
        prop: &AssignmentTargetPropertyProperty<'a>,
    ) {
        if prop.computed {
            self.visit_property_key(&prop.name);
        } else {
            self.literal_key(&prop.name);
        }
        self.visit_assignment_target_maybe_default(&prop.binding);
    }

    fn visit_method_definition(&mut self, def: &MethodDefinition<'a>) {
        self.class_key = !def.computed;
        walk::walk_method_definition(self, def);
    }

    fn visit_property_definition(&mut self, def: &PropertyDefinition<'a>) {
        self.class_key = !def.computed;
        walk::walk_property_definition(self, def);
    }

    fn visit_accessor_property(&mut self, def: &AccessorProperty<'a>) {
        self.class_key = !def.computed;
        walk::walk_accessor_property(self, def);
    }

    fn visit_property_key(&mut self, key: &PropertyKey<'a>) {
        if std::mem::take(&mut self.class_key) {
            return;
        }
        walk::walk_property_key(self, key);
    }

    // -- dead code --------------------------------------------------------

    fn visit_function_body(&mut self, body: &FunctionBody<'a>) {
        self.inject_dead_code(&body.statements);
        walk::walk_function_body(self, body);
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.inject_dead_code(&block.body);
        walk::walk_block_statement(self, block);
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        if !arrow.expression {
            walk::walk_arrow_function_expression(self, arrow);
            return;
        }
        // `x => x + 1` has no statement list to hold a block.
        self.visit_formal_parameters(&arrow.params);
        for statement in &arrow.body.statements {
            self.visit_statement(statement);
        }
    }
}

/// Top-level declarations that are not exported.
fn top_level_symbols(program: &Program<'_>) -> Vec<SymbolId> {
    let mut symbols = Vec::new();
    for statement in &program.body {
        match statement {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    if let BindingPatternKind::BindingIdentifier(ident) = &declarator.id.kind {
                        symbols.extend(ident.symbol_id.get());
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(ident) = &func.id {
                    symbols.extend(ident.symbol_id.get());
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(ident) = &class.id {
                    symbols.extend(ident.symbol_id.get());
                }
            }
            _ => {}
        }
    }
    symbols
}

fn shorthand_binding<'b, 'a>(pattern: &'b BindingPattern<'a>) -> Option<&'b BindingIdentifier<'a>> {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => Some(ident),
        BindingPatternKind::AssignmentPattern(assign) => match &assign.left.kind {
            BindingPatternKind::BindingIdentifier(ident) => Some(ident),
            _ => None,
        },
        _ => None,
    }
}

fn fresh_name(is_taken: &mut impl FnMut(&str) -> bool) -> String {
    loop {
        let name = random_hex_name("_0x", 6);
        if !is_taken(&name) {
            return name;
        }
    }
}
