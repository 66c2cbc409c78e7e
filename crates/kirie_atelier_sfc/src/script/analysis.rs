//! Program analysis shared by the script transformer.
//!
//! [`ProgramInfo`] indexes top-level imports and declarations;
//! [`ScriptVisitor`] walks the whole program once and records, by span,
//! every macro call, lifecycle hook and compiler artifact it meets.

use super::static_eval::{eval_expression, static_key_name, StaticEnv};
use super::{ImportBinding, ImportedName, ALL_MACROS, PAGE_FLAG_HOOKS};
use kirie_carton::{FxHashMap, FxHashSet};
use oxc_ast::ast::{
    ArrowFunctionExpression, BindingPattern, BindingPatternKind, BindingProperty, CallExpression,
    Declaration, Expression, ExpressionStatement, Function, IdentifierReference,
    ImportDeclarationSpecifier, ImportOrExportKind, ModuleExportName, ObjectProperty, Program,
    Statement, TSInterfaceBody, TSType, VariableDeclarationKind,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};
use oxc_syntax::scope::ScopeFlags;

/// Name of an import/export specifier.
pub fn module_export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

/// Collect every name bound by a pattern.
pub fn binding_names(pattern: &BindingPattern<'_>, out: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => out.push(ident.name.to_string()),
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                binding_names(&prop.value, out);
            }
            if let Some(rest) = &obj.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                binding_names(element, out);
            }
            if let Some(rest) = &arr.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => binding_names(&assign.left, out),
    }
}

/// One top-level import declaration.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub span: Span,
    pub bindings: Vec<ImportBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Value,
    /// `interface` / `type` declarations
    Type,
}

/// One top-level declaration statement and what it refers to.
#[derive(Debug, Clone)]
pub struct TopLevelDecl {
    pub span: Span,
    pub names: Vec<String>,
    pub refs: FxHashSet<String>,
    pub kind: DeclKind,
}

/// A local type that props/emits declarations may refer to.
#[derive(Clone, Copy)]
pub enum TypeDecl<'b, 'a> {
    Interface(&'b TSInterfaceBody<'a>),
    Alias(&'b TSType<'a>),
}

pub type TypeLookup<'b, 'a> = FxHashMap<String, TypeDecl<'b, 'a>>;

/// Index of a program's top level.
pub struct ProgramInfo<'b, 'a> {
    pub imports: Vec<ImportInfo>,
    pub decls: Vec<TopLevelDecl>,
    /// Top-level `const` bindings with a statically known value
    pub const_env: StaticEnv,
    pub types: TypeLookup<'b, 'a>,
}

impl<'b, 'a> ProgramInfo<'b, 'a> {
    pub fn collect(program: &'b Program<'a>) -> Self {
        let mut info = ProgramInfo {
            imports: Vec::new(),
            decls: Vec::new(),
            const_env: StaticEnv::default(),
            types: TypeLookup::default(),
        };

        for stmt in &program.body {
            match stmt {
                Statement::ImportDeclaration(import) => {
                    let source = import.source.value.to_string();
                    let decl_type_only = import.import_kind == ImportOrExportKind::Type;
                    let mut bindings = Vec::new();
                    for specifier in import.specifiers.iter().flatten() {
                        let (local, imported, type_only) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(spec) => (
                                spec.local.name.to_string(),
                                ImportedName::Named(module_export_name(&spec.imported)),
                                spec.import_kind == ImportOrExportKind::Type,
                            ),
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                                (spec.local.name.to_string(), ImportedName::Default, false)
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                                (spec.local.name.to_string(), ImportedName::Namespace, false)
                            }
                        };
                        bindings.push(ImportBinding {
                            local,
                            imported,
                            source: source.clone(),
                            type_only: decl_type_only || type_only,
                        });
                    }
                    info.imports.push(ImportInfo {
                        span: import.span,
                        bindings,
                    });
                }
                Statement::ExportNamedDeclaration(export) => {
                    if let Some(declaration) = &export.declaration {
                        info.collect_declaration(declaration, export.span);
                    }
                }
                _ => {
                    if let Some(declaration) = stmt.as_declaration() {
                        info.collect_declaration(declaration, stmt.span());
                    }
                }
            }
        }

        info
    }

    fn collect_declaration(&mut self, declaration: &'b Declaration<'a>, span: Span) {
        let mut names = Vec::new();
        let mut kind = DeclKind::Value;
        match declaration {
            Declaration::VariableDeclaration(var) => {
                for declarator in &var.declarations {
                    binding_names(&declarator.id, &mut names);
                    if var.kind == VariableDeclarationKind::Const {
                        if let (BindingPatternKind::BindingIdentifier(ident), Some(init)) =
                            (&declarator.id.kind, &declarator.init)
                        {
                            if let Some(value) = eval_expression(init, &self.const_env) {
                                self.const_env.insert(ident.name.to_string(), value);
                            }
                        }
                    }
                }
            }
            Declaration::FunctionDeclaration(func) => {
                names.extend(func.id.as_ref().map(|id| id.name.to_string()));
            }
            Declaration::ClassDeclaration(class) => {
                names.extend(class.id.as_ref().map(|id| id.name.to_string()));
            }
            Declaration::TSInterfaceDeclaration(iface) => {
                kind = DeclKind::Type;
                names.push(iface.id.name.to_string());
                self.types
                    .insert(iface.id.name.to_string(), TypeDecl::Interface(&iface.body));
            }
            Declaration::TSTypeAliasDeclaration(alias) => {
                kind = DeclKind::Type;
                names.push(alias.id.name.to_string());
                self.types
                    .insert(alias.id.name.to_string(), TypeDecl::Alias(&alias.type_annotation));
            }
            Declaration::TSEnumDeclaration(decl) => names.push(decl.id.name.to_string()),
            _ => {}
        }

        let mut refs = ReferenceCollector::default();
        refs.visit_declaration(declaration);
        self.decls.push(TopLevelDecl {
            span,
            names,
            refs: refs.into_names(),
            kind,
        });
    }

    /// Value bindings declared at the top level (not imports, not types).
    pub fn value_names(&self) -> FxHashSet<&str> {
        self.decls
            .iter()
            .filter(|d| d.kind == DeclKind::Value)
            .flat_map(|d| d.names.iter().map(String::as_str))
            .collect()
    }
}

/// Counts identifier references in whatever it visits.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    pub counts: FxHashMap<String, usize>,
}

impl ReferenceCollector {
    pub fn of_expression(expr: &Expression<'_>) -> FxHashSet<String> {
        let mut collector = Self::default();
        collector.visit_expression(expr);
        collector.into_names()
    }

    pub fn into_names(self) -> FxHashSet<String> {
        self.counts.into_keys().collect()
    }
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        *self.counts.entry(it.name.to_string()).or_default() += 1;
    }
}

/// An identifier reference and where it sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSite {
    pub name: String,
    pub span: Span,
    /// Value of a shorthand property, `{ name }`
    pub shorthand: bool,
}

/// Collects identifier references by span.
#[derive(Debug, Default)]
pub struct IdentifierSites {
    pub sites: Vec<IdentifierSite>,
}

impl IdentifierSites {
    pub fn of_expression(expr: &Expression<'_>) -> Vec<IdentifierSite> {
        let mut collector = Self::default();
        collector.visit_expression(expr);
        collector.sites
    }
}

impl<'a> Visit<'a> for IdentifierSites {
    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                self.sites.push(IdentifierSite {
                    name: ident.name.to_string(),
                    span: ident.span,
                    shorthand: true,
                });
                return;
            }
        }
        walk::walk_object_property(self, it);
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.sites.push(IdentifierSite {
            name: it.name.to_string(),
            span: it.span,
            shorthand: false,
        });
    }
}

/// A macro call found anywhere in the program.
#[derive(Debug, Clone)]
pub struct MacroSite {
    pub name: &'static str,
    pub span: Span,
    /// Function nesting depth; 0 is module scope
    pub depth: u32,
}

/// Single pass over the whole program, recording spans only.
#[derive(Debug, Default)]
pub struct ScriptVisitor {
    function_depth: u32,
    pub macro_sites: Vec<MacroSite>,
    /// Page-flag hooks called or declared as options methods
    pub hooks: FxHashSet<&'static str>,
    /// `__expose()` statements
    pub expose_calls: Vec<Span>,
    /// `expose: __expose` in destructured setup parameters
    pub expose_params: Vec<Span>,
    /// `__name: '...'` properties
    pub name_props: Vec<Span>,
}

impl ScriptVisitor {
    pub fn run(program: &Program<'_>) -> Self {
        let mut visitor = Self::default();
        visitor.visit_program(program);
        visitor
    }

    fn note_hook(&mut self, name: &str) {
        if let Some((hook, _)) = PAGE_FLAG_HOOKS.iter().find(|(hook, _)| *hook == name) {
            self.hooks.insert(*hook);
        }
    }
}

impl<'a> Visit<'a> for ScriptVisitor {
    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        self.function_depth += 1;
        walk::walk_function(self, it, flags);
        self.function_depth -= 1;
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        self.function_depth += 1;
        walk::walk_arrow_function_expression(self, it);
        self.function_depth -= 1;
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            let name = callee.name.as_str();
            if let Some(macro_name) = ALL_MACROS.iter().find(|m| **m == name) {
                self.macro_sites.push(MacroSite {
                    name: *macro_name,
                    span: it.span,
                    depth: self.function_depth,
                });
            }
            self.note_hook(name);
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_expression_statement(&mut self, it: &ExpressionStatement<'a>) {
        if let Expression::CallExpression(call) = &it.expression {
            if matches!(&call.callee, Expression::Identifier(id) if id.name.as_str() == "__expose") {
                self.expose_calls.push(it.span);
            }
        }
        walk::walk_expression_statement(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if !it.computed {
            if let Some(key) = static_key_name(&it.key) {
                if key == "__name" {
                    self.name_props.push(it.span);
                }
                self.note_hook(&key);
            }
        }
        walk::walk_object_property(self, it);
    }

    fn visit_binding_property(&mut self, it: &BindingProperty<'a>) {
        let is_expose_key = !it.computed && static_key_name(&it.key).as_deref() == Some("expose");
        let binds_artifact = matches!(
            &it.value.kind,
            BindingPatternKind::BindingIdentifier(id) if id.name.as_str() == "__expose"
        );
        if is_expose_key && binds_artifact {
            self.expose_params.push(it.span);
        }
        walk::walk_binding_property(self, it);
    }
}
