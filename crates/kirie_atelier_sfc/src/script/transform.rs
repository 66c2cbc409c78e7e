//! Macro collection and output assembly.

use super::analysis::{
    binding_names, IdentifierSites, ProgramInfo, ReferenceCollector, ScriptVisitor,
};
use super::default_export::{
    declares_option, default_options_object, rewrite_default_export, setup_function,
    SetupFunction,
};
use super::edit::{extend_over_comma, extend_over_line, EditList};
use super::eval_module::build_eval_module;
use super::props::{
    apply_defaults, model_decl, render_emits, render_props, runtime_decl, typed_emits,
    typed_props, ModelDecl, RuntimeDecl,
};
use super::static_eval::{eval_expression, is_non_object_literal, static_key_name};
use super::*;
use crate::error::{CompileError, CompileResult};
use crate::style::css_modules_declaration;
use kirie_carton::hash::hash_fragments;
use kirie_carton::FxHashSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, CallExpression, Declaration, Expression,
    ImportOrExportKind, ObjectPropertyKind, Program, Statement, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde_json::Value;

/// Options keys `defineOptions()` may not set.
const RESERVED_OPTION_KEYS: &[&str] = &["props", "emits", "expose", "slots"];

/// Setup macros an Options-API `setup()` function may call.
const OPTIONS_SETUP_MACROS: &[&str] = &[DEFINE_PROPS, DEFINE_EMITS, DEFINE_EXPOSE, DEFINE_SLOTS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroScope {
    /// Top level of the script
    Module,
    /// Top level of the default export's `setup()` function
    OptionsSetup,
}

/// What the default export's `setup()` binds, for rebinding macros in it.
struct OptionsSetup {
    /// Name of the props parameter
    props: Option<String>,
    /// Expression reaching `emit`
    emit: Option<String>,
    /// Parameters and top-level declarations of the function body
    locals: FxHashSet<String>,
    declares_props: bool,
    declares_emits: bool,
}

impl OptionsSetup {
    fn new(setup: &SetupFunction<'_, '_>, declares_props: bool, declares_emits: bool) -> Self {
        let simple_name = |pattern: &BindingPattern<'_>| match &pattern.kind {
            BindingPatternKind::BindingIdentifier(id) => Some(id.name.to_string()),
            _ => None,
        };
        let props = setup.params.items.first().and_then(|p| simple_name(&p.pattern));
        let emit = setup.params.items.get(1).and_then(|param| match &param.pattern.kind {
            BindingPatternKind::BindingIdentifier(id) => Some(format!("{}.emit", id.name)),
            BindingPatternKind::ObjectPattern(object) => object
                .properties
                .iter()
                .find(|prop| !prop.computed && static_key_name(&prop.key).as_deref() == Some("emit"))
                .and_then(|prop| simple_name(&prop.value)),
            _ => None,
        });

        let mut names = Vec::new();
        for param in &setup.params.items {
            binding_names(&param.pattern, &mut names);
        }
        for stmt in &setup.body.statements {
            match stmt {
                Statement::VariableDeclaration(var) => {
                    for declarator in &var.declarations {
                        binding_names(&declarator.id, &mut names);
                    }
                }
                Statement::FunctionDeclaration(func) => {
                    names.extend(func.id.as_ref().map(|id| id.name.to_string()));
                }
                Statement::ClassDeclaration(class) => {
                    names.extend(class.id.as_ref().map(|id| id.name.to_string()));
                }
                _ => {}
            }
        }

        Self {
            props,
            emit,
            locals: names.into_iter().collect(),
            declares_props,
            declares_emits,
        }
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn macro_call<'b, 'a>(expr: &'b Expression<'a>) -> Option<(&'static str, &'b CallExpression<'a>)> {
    let Expression::CallExpression(call) = expr else {
        return None;
    };
    let Expression::Identifier(callee) = &call.callee else {
        return None;
    };
    let name = ALL_MACROS.iter().find(|m| **m == callee.name.as_str())?;
    Some((*name, call))
}

/// Transform one script block.
///
/// Macros are recognized at the top level of the script and, for an
/// options object, at the top level of its `setup()` function.
pub fn transform_script(
    source: &str,
    options: &ScriptTransformOptions<'_>,
) -> CompileResult<ScriptTransform> {
    let allocator = Allocator::default();
    let source_type = if options.is_ts {
        SourceType::ts()
    } else {
        SourceType::mjs()
    };
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(CompileError::SfcParse {
            filename: options.filename.to_string(),
            message: error.to_string(),
            line: options.start_line,
            column: 1,
        });
    }

    let program = &ret.program;
    let visitor = ScriptVisitor::run(program);
    let mut transformer = Transformer {
        source,
        options: *options,
        info: ProgramInfo::collect(program),
        edits: EditList::new(),
        macro_spans: visitor.macro_sites.iter().map(|site| site.span).collect(),
        handled: FxHashSet::default(),
        props_declared: false,
        emits_declared: false,
        props: None,
        emits: None,
        models: Vec::new(),
        hoisted_refs: Vec::new(),
        config_macros: Vec::new(),
        options_defined: false,
        options_fields: Vec::new(),
        options_setup: None,
    };

    transformer.collect_macros(program)?;
    transformer.check_sites(&visitor)?;
    transformer.strip_artifacts(&visitor);

    let macro_hash = hash_fragments(
        visitor
            .macro_sites
            .iter()
            .map(|site| &source[site.span.start as usize..site.span.end as usize]),
    );

    let (code, registers_component) = if options.setup {
        transformer.check_hoisted_refs(&transformer.info.value_names())?;
        (transformer.emit_setup(program, &visitor)?, true)
    } else {
        if let Some(setup) = &transformer.options_setup {
            let locals: FxHashSet<&str> = setup.locals.iter().map(String::as_str).collect();
            transformer.check_hoisted_refs(&locals)?;
        }
        transformer.emit_options(program, &visitor)
    };

    Ok(ScriptTransform {
        filename: options.filename.to_string(),
        macro_hash,
        config_macros: transformer.config_macros,
        imports: transformer
            .info
            .imports
            .iter()
            .flat_map(|import| import.bindings.iter().cloned())
            .collect(),
        registers_component,
        code,
    })
}

struct Transformer<'s, 'b, 'a> {
    source: &'s str,
    options: ScriptTransformOptions<'s>,
    info: ProgramInfo<'b, 'a>,
    edits: EditList,
    /// Every macro call in the program
    macro_spans: Vec<Span>,
    handled: FxHashSet<(u32, u32)>,
    props_declared: bool,
    emits_declared: bool,
    props: Option<RuntimeDecl>,
    emits: Option<RuntimeDecl>,
    models: Vec<ModelDecl>,
    /// Identifiers used by declarations that move out of `setup()`
    hoisted_refs: Vec<(&'static str, FxHashSet<String>)>,
    config_macros: Vec<ConfigMacro>,
    options_defined: bool,
    /// `defineOptions()` properties as source text
    options_fields: Vec<String>,
    options_setup: Option<OptionsSetup>,
}

impl<'s, 'b, 'a> Transformer<'s, 'b, 'a> {
    fn usage(&self, macro_name: &str, message: impl Into<String>) -> CompileError {
        CompileError::macro_usage(self.options.filename, macro_name, message)
    }

    fn line_of(&self, offset: u32) -> usize {
        let before = &self.source[..offset as usize];
        self.options.start_line + memchr::memchr_iter(b'\n', before.as_bytes()).count()
    }

    fn collect_macros(&mut self, program: &'b Program<'a>) -> CompileResult<()> {
        for stmt in &program.body {
            self.collect_statement(stmt, MacroScope::Module)?;
        }
        if self.options.setup {
            return Ok(());
        }

        let Some(object) = default_options_object(program) else {
            return Ok(());
        };
        let Some(setup) = setup_function(object) else {
            return Ok(());
        };
        self.options_setup = Some(OptionsSetup::new(
            &setup,
            declares_option(object, "props"),
            declares_option(object, "emits"),
        ));
        for stmt in &setup.body.statements {
            self.collect_statement(stmt, MacroScope::OptionsSetup)?;
        }
        Ok(())
    }

    fn collect_statement(&mut self, stmt: &'b Statement<'a>, scope: MacroScope) -> CompileResult<()> {
        match stmt {
            Statement::ExpressionStatement(expr_stmt) => {
                if let Some((name, call)) = macro_call(&expr_stmt.expression) {
                    self.handle_macro(name, call, None, scope)?;
                    let span = match scope {
                        MacroScope::Module => expr_stmt.span,
                        MacroScope::OptionsSetup => extend_over_line(self.source, expr_stmt.span),
                    };
                    self.edits.remove(span);
                }
            }
            Statement::VariableDeclaration(var) => self.collect_declarators(var, scope)?,
            Statement::ExportNamedDeclaration(export) if scope == MacroScope::Module => {
                if let Some(Declaration::VariableDeclaration(var)) = &export.declaration {
                    self.collect_declarators(var, scope)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn collect_declarators(
        &mut self,
        var: &'b VariableDeclaration<'a>,
        scope: MacroScope,
    ) -> CompileResult<()> {
        for declarator in &var.declarations {
            let Some((name, call)) = declarator.init.as_ref().and_then(macro_call) else {
                continue;
            };
            let Some(replacement) = self.handle_macro(name, call, Some(&declarator.id), scope)? else {
                continue;
            };
            // `const props = defineProps()` in `setup(props)` would redeclare
            // the parameter
            let rebinds_param = matches!(
                &declarator.id.kind,
                BindingPatternKind::BindingIdentifier(id) if id.name.as_str() == replacement
            );
            if !rebinds_param {
                self.edits.replace(call.span, replacement);
            } else if var.declarations.len() == 1 {
                self.edits.remove(extend_over_line(self.source, var.span));
            } else {
                return Err(self.usage(name, "must be declared on its own"));
            }
        }
        Ok(())
    }

    /// Record one macro call and return what a binding of it becomes.
    fn handle_macro(
        &mut self,
        name: &'static str,
        call: &'b CallExpression<'a>,
        binding: Option<&'b BindingPattern<'a>>,
        scope: MacroScope,
    ) -> CompileResult<Option<String>> {
        let allowed = self.options.setup
            || !SETUP_MACROS.contains(&name)
            || (scope == MacroScope::OptionsSetup && OPTIONS_SETUP_MACROS.contains(&name));
        if !allowed {
            return Err(self.usage(name, "is only available in <script setup>"));
        }
        self.handled.insert((call.span.start, call.span.end));

        let replacement = match name {
            DEFINE_PROPS => {
                let decl = self.props_decl(call)?;
                self.set_props(decl)?;
                self.setup_binding(name, scope, binding.is_some())?
            }
            WITH_DEFAULTS => {
                self.with_defaults(call)?;
                "__props".to_string()
            }
            DEFINE_EMITS => {
                self.emits_decl(call)?;
                self.setup_binding(name, scope, binding.is_some())?
            }
            DEFINE_MODEL => self.define_model(call, binding)?,
            DEFINE_SLOTS => "{}".to_string(),
            DEFINE_EXPOSE => "void 0".to_string(),
            DEFINE_OPTIONS => {
                if binding.is_some() {
                    return Err(self.usage(name, "must be used as a statement"));
                }
                self.define_options(call)?;
                return Ok(None);
            }
            _ => {
                self.config_macro(name, call)?;
                "void 0".to_string()
            }
        };
        Ok(binding.is_some().then_some(replacement))
    }

    /// What `defineProps()` / `defineEmits()` rebind to.
    fn setup_binding(&self, name: &str, scope: MacroScope, bound: bool) -> CompileResult<String> {
        if scope == MacroScope::Module {
            return Ok(if name == DEFINE_PROPS { "__props" } else { "__emit" }.to_string());
        }
        let Some(setup) = &self.options_setup else {
            return Err(self.usage(name, "must be called inside setup()"));
        };
        let (declared, option, found, missing) = if name == DEFINE_PROPS {
            (setup.declares_props, "props", &setup.props, "setup() must name its props parameter")
        } else {
            (setup.declares_emits, "emits", &setup.emit, "setup() must take its context as a parameter")
        };
        if declared {
            return Err(self.usage(name, format!("conflicts with the `{}` option", option)));
        }
        match found {
            Some(expr) => Ok(expr.clone()),
            None if !bound => Ok(String::new()),
            None => Err(self.usage(name, missing)),
        }
    }

    fn single_argument(
        &self,
        name: &str,
        call: &'b CallExpression<'a>,
    ) -> CompileResult<&'b Expression<'a>> {
        if call.arguments.len() != 1 {
            return Err(self.usage(name, "expects exactly one argument"));
        }
        call.arguments[0]
            .as_expression()
            .ok_or_else(|| self.usage(name, "spread arguments are not supported"))
    }

    fn hoist(&mut self, name: &'static str, expr: &Expression<'_>) {
        self.hoisted_refs
            .push((name, ReferenceCollector::of_expression(expr)));
    }

    fn props_decl(&mut self, call: &'b CallExpression<'a>) -> CompileResult<Option<RuntimeDecl>> {
        let type_arg = call
            .type_arguments
            .as_ref()
            .and_then(|params| params.params.first());
        match (type_arg, call.arguments.first()) {
            (Some(_), Some(_)) => Err(self.usage(
                DEFINE_PROPS,
                "cannot accept both type and non-type arguments",
            )),
            (Some(ty), None) => typed_props(ty, &self.info.types)
                .map(|props| Some(RuntimeDecl::Typed(props)))
                .map_err(|message| self.usage(DEFINE_PROPS, message)),
            (None, Some(_)) => {
                let arg = self.single_argument(DEFINE_PROPS, call)?;
                self.hoist(DEFINE_PROPS, arg);
                runtime_decl(arg, self.source)
                    .map(Some)
                    .map_err(|message| self.usage(DEFINE_PROPS, message))
            }
            (None, None) => Ok(None),
        }
    }

    fn set_props(&mut self, decl: Option<RuntimeDecl>) -> CompileResult<()> {
        if self.props_declared {
            return Err(self.usage(DEFINE_PROPS, "can only be called once"));
        }
        self.props_declared = true;
        self.props = decl;
        Ok(())
    }

    fn with_defaults(&mut self, call: &'b CallExpression<'a>) -> CompileResult<()> {
        let inner = match call.arguments.first().and_then(|arg| arg.as_expression()) {
            Some(expr) => macro_call(expr).filter(|(name, _)| *name == DEFINE_PROPS),
            None => None,
        };
        let Some((_, inner)) = inner else {
            return Err(self.usage(WITH_DEFAULTS, "first argument must be a defineProps() call"));
        };
        self.handled.insert((inner.span.start, inner.span.end));

        let Some(RuntimeDecl::Typed(mut props)) = self.props_decl(inner)? else {
            return Err(self.usage(
                WITH_DEFAULTS,
                "can only be used with type-based defineProps",
            ));
        };
        if let Some(defaults) = call.arguments.get(1) {
            let defaults = defaults
                .as_expression()
                .ok_or_else(|| self.usage(WITH_DEFAULTS, "spread arguments are not supported"))?;
            self.hoist(WITH_DEFAULTS, defaults);
            apply_defaults(&mut props, defaults, self.source)
                .map_err(|message| self.usage(WITH_DEFAULTS, message))?;
        }
        self.set_props(Some(RuntimeDecl::Typed(props)))
    }

    fn emits_decl(&mut self, call: &'b CallExpression<'a>) -> CompileResult<()> {
        if self.emits_declared {
            return Err(self.usage(DEFINE_EMITS, "can only be called once"));
        }
        self.emits_declared = true;
        let type_arg = call
            .type_arguments
            .as_ref()
            .and_then(|params| params.params.first());
        self.emits = match (type_arg, call.arguments.first()) {
            (Some(_), Some(_)) => {
                return Err(self.usage(
                    DEFINE_EMITS,
                    "cannot accept both type and non-type arguments",
                ))
            }
            (Some(ty), None) => Some(RuntimeDecl::Names(
                typed_emits(ty, &self.info.types)
                    .map_err(|message| self.usage(DEFINE_EMITS, message))?,
            )),
            (None, Some(_)) => {
                let arg = self.single_argument(DEFINE_EMITS, call)?;
                self.hoist(DEFINE_EMITS, arg);
                Some(
                    runtime_decl(arg, self.source)
                        .map_err(|message| self.usage(DEFINE_EMITS, message))?,
                )
            }
            (None, None) => None,
        };
        Ok(())
    }

    fn define_model(
        &mut self,
        call: &'b CallExpression<'a>,
        binding: Option<&'b BindingPattern<'a>>,
    ) -> CompileResult<String> {
        let model = model_decl(call, self.source, &self.info.types)
            .map_err(|message| self.usage(DEFINE_MODEL, message))?;
        if self.models.iter().any(|m| m.name == model.name) {
            return Err(self.usage(
                DEFINE_MODEL,
                format!("duplicate model name `{}`", model.name),
            ));
        }
        for arg in call.arguments.iter().filter_map(|arg| arg.as_expression()) {
            self.hoist(DEFINE_MODEL, arg);
        }

        let value = format!("_useModel(__props, {}, __emit)", quote(&model.name));
        let replacement = match binding.map(|pattern| &pattern.kind) {
            Some(BindingPatternKind::ArrayPattern(_)) => format!(
                "[{}, __props[{}] || {{}}]",
                value,
                quote(&model.modifiers_prop())
            ),
            _ => value,
        };
        self.models.push(model);
        Ok(replacement)
    }

    /// Splice the argument's properties into the options object.
    ///
    /// The options object lives outside `setup()`: statically known local
    /// `const`s are folded to their values, imports stay references, and any
    /// other local is an error.
    fn define_options(&mut self, call: &'b CallExpression<'a>) -> CompileResult<()> {
        if self.options_defined {
            return Err(self.usage(DEFINE_OPTIONS, "can only be called once"));
        }
        self.options_defined = true;
        let arg = self.single_argument(DEFINE_OPTIONS, call)?;
        let Expression::ObjectExpression(object) = arg.get_inner_expression() else {
            return Err(self.usage(DEFINE_OPTIONS, "argument must be an object literal"));
        };

        for prop in &object.properties {
            let ObjectPropertyKind::ObjectProperty(prop) = prop else {
                continue;
            };
            let key = if prop.computed { None } else { static_key_name(&prop.key) };
            if let Some(key) = key.filter(|k| RESERVED_OPTION_KEYS.contains(&k.as_str())) {
                return Err(self.usage(
                    DEFINE_OPTIONS,
                    format!("cannot declare `{}`; use the dedicated macro instead", key),
                ));
            }
        }

        let imported: FxHashSet<&str> = self
            .info
            .imports
            .iter()
            .flat_map(|import| &import.bindings)
            .filter(|binding| !binding.type_only)
            .map(|binding| binding.local.as_str())
            .collect();
        let locals = self.info.value_names();
        let mut folds = EditList::new();
        for site in IdentifierSites::of_expression(arg) {
            if imported.contains(site.name.as_str()) {
                continue;
            }
            if let Some(value) = self.info.const_env.get(&site.name) {
                let text = if site.shorthand {
                    format!("{}: {}", site.name, value)
                } else {
                    value.to_string()
                };
                folds.replace(site.span, text);
            } else if locals.contains(site.name.as_str()) {
                return Err(self.usage(
                    DEFINE_OPTIONS,
                    format!("cannot reference locally declared variable `{}`", site.name),
                ));
            }
        }

        self.options_fields = object
            .properties
            .iter()
            .map(|prop| {
                let span = prop.span();
                folds.apply_range(self.source, span.start, span.end)
            })
            .collect();
        Ok(())
    }

    fn config_macro(&mut self, name: &'static str, call: &'b CallExpression<'a>) -> CompileResult<()> {
        let Some(kind) = ConfigMacroKind::from_macro(name) else {
            return Err(self.usage(name, "is not a config macro"));
        };
        let arg = self.single_argument(name, call)?;
        let argument = self.macro_argument(name, arg)?;
        self.config_macros.push(ConfigMacro { kind, argument });
        Ok(())
    }

    fn macro_argument(&self, name: &str, arg: &Expression<'a>) -> CompileResult<MacroArgument> {
        if is_non_object_literal(arg) {
            return Err(self.usage(name, "argument must be an object"));
        }
        match eval_expression(arg, &self.info.const_env) {
            Some(value @ Value::Object(_)) => Ok(MacroArgument::Static(value)),
            Some(_) => Err(self.usage(name, "argument must be an object")),
            None => Ok(MacroArgument::Module(build_eval_module(
                &self.info,
                self.source,
                arg,
                &self.macro_spans,
                self.options.is_ts,
            ))),
        }
    }

    /// Every macro call must have been consumed at the top level of the
    /// script or of the default export's `setup()`.
    fn check_sites(&self, visitor: &ScriptVisitor) -> CompileResult<()> {
        for site in &visitor.macro_sites {
            if self.handled.contains(&(site.span.start, site.span.end)) {
                continue;
            }
            let message = if !self.options.setup && SETUP_MACROS.contains(&site.name) {
                "is only available in <script setup>"
            } else if site.depth > 0 {
                "must be called at the top level of the script"
            } else {
                "must be used as a statement or a variable initializer"
            };
            return Err(self.usage(site.name, message));
        }
        Ok(())
    }

    /// Props, emits and models move out of `setup()`, so their arguments
    /// cannot see its locals.
    fn check_hoisted_refs(&self, locals: &FxHashSet<&str>) -> CompileResult<()> {
        for (name, refs) in &self.hoisted_refs {
            let mut offending: Vec<&String> =
                refs.iter().filter(|r| locals.contains(r.as_str())).collect();
            offending.sort();
            if let Some(local) = offending.first() {
                return Err(self.usage(
                    name,
                    format!("cannot reference locally declared variable `{}`", local),
                ));
            }
        }
        Ok(())
    }

    fn strip_artifacts(&mut self, visitor: &ScriptVisitor) {
        for span in visitor.name_props.iter().chain(&visitor.expose_params) {
            let span = extend_over_comma(self.source, *span);
            self.edits.remove(extend_over_line(self.source, span));
        }
        for span in &visitor.expose_calls {
            self.edits.remove(extend_over_line(self.source, *span));
        }
    }

    fn page_flags(&self, visitor: &ScriptVisitor) -> Vec<&'static str> {
        if !self.options.route.is_page() {
            return Vec::new();
        }
        PAGE_FLAG_HOOKS
            .iter()
            .filter(|(hook, _)| visitor.hooks.contains(hook))
            .map(|(_, flag)| *flag)
            .collect()
    }

    fn css_modules(&self) -> Option<String> {
        self.options
            .css_modules
            .filter(|modules| !modules.is_empty())
            .map(css_modules_declaration)
    }

    fn runtime_import(&self, extra: &[&str]) -> String {
        let mut names = vec!["registerComponent"];
        names.extend_from_slice(extra);
        format!(
            "import {{ {} }} from {};\n",
            names.join(", "),
            quote(self.options.runtime_module)
        )
    }

    fn emit_setup(&self, program: &Program<'_>, visitor: &ScriptVisitor) -> CompileResult<String> {
        let mut module_level = String::new();
        let mut body = String::new();
        let mut prev_end = 0;

        for stmt in &program.body {
            let span = stmt.span();
            let chunk = self.edits.apply_range(self.source, prev_end, span.end);
            prev_end = span.end;
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            let target = match stmt {
                Statement::ImportDeclaration(_)
                | Statement::TSTypeAliasDeclaration(_)
                | Statement::TSInterfaceDeclaration(_)
                | Statement::TSModuleDeclaration(_) => &mut module_level,
                Statement::ExportNamedDeclaration(export)
                    if export.export_kind == ImportOrExportKind::Type
                        || matches!(
                            export.declaration,
                            Some(
                                Declaration::TSTypeAliasDeclaration(_)
                                    | Declaration::TSInterfaceDeclaration(_)
                            )
                        ) =>
                {
                    &mut module_level
                }
                Statement::ExportNamedDeclaration(_)
                | Statement::ExportDefaultDeclaration(_)
                | Statement::ExportAllDeclaration(_) => {
                    return Err(CompileError::SfcParse {
                        filename: self.options.filename.to_string(),
                        message: "<script setup> cannot contain ES module exports".to_string(),
                        line: self.line_of(span.start),
                        column: 1,
                    });
                }
                _ => &mut body,
            };
            target.push_str(chunk);
            target.push('\n');
        }

        let model_import: &[&str] = if self.models.is_empty() {
            &[]
        } else {
            &["useModel as _useModel"]
        };
        let mut out = self.runtime_import(model_import);
        out.push_str(&module_level);
        let css_modules = self.css_modules();
        if let Some(declaration) = &css_modules {
            out.push_str(declaration);
        }
        out.push_str("const ");
        out.push_str(SFC_MAIN);
        out.push_str(" = {\n");
        for field in &self.options_fields {
            out.push_str("  ");
            out.push_str(field);
            out.push_str(",\n");
        }

        if let Some(props) = render_props(self.props.as_ref(), &self.models) {
            out.push_str(&format!("  props: {},\n", props));
        }
        if let Some(emits) = render_emits(self.emits.as_ref(), &self.models) {
            out.push_str(&format!("  emits: {},\n", emits));
        }
        for flag in self.page_flags(visitor) {
            out.push_str(&format!("  {}: true,\n", flag));
        }
        if css_modules.is_some() {
            out.push_str("  cssModules: __cssModules,\n");
        }
        out.push_str("  setup(__props, { emit: __emit }) {\n");
        out.push_str(&body);

        let mut exposed: Vec<&str> = Vec::new();
        for decl in &self.info.decls {
            if decl.kind == super::analysis::DeclKind::Value {
                exposed.extend(decl.names.iter().map(String::as_str));
            }
        }
        for binding in self.info.imports.iter().flat_map(|i| &i.bindings) {
            let used = self
                .options
                .template_identifiers
                .map_or(true, |ids| ids.contains(&binding.local));
            if !binding.type_only && used {
                exposed.push(&binding.local);
            }
        }
        let mut seen = FxHashSet::default();
        exposed.retain(|name| seen.insert(*name));

        if exposed.is_empty() {
            out.push_str("    return {};\n");
        } else {
            out.push_str(&format!("    return {{ {} }};\n", exposed.join(", ")));
        }
        out.push_str("  },\n};\n");
        out.push_str(&format!("registerComponent({});\n", SFC_MAIN));
        Ok(out)
    }

    /// Returns the code and whether it registers a component.
    fn emit_options(&self, program: &Program<'_>, visitor: &ScriptVisitor) -> (String, bool) {
        let mut edits = self.edits.clone();
        let rewrite = rewrite_default_export(program, self.source, &mut edits);
        let Some(rewrite) = rewrite else {
            if edits.is_empty() {
                return (self.source.to_string(), false);
            }
            return (edits.apply(self.source), false);
        };

        let mut code = self.runtime_import(&[]);
        code.push_str(edits.apply(self.source).trim_end());
        code.push('\n');
        if let Some(epilogue) = &rewrite.epilogue {
            code.push_str(epilogue);
            code.push('\n');
        }

        let mut extra: Vec<String> = Vec::new();
        if let Some(props) = render_props(self.props.as_ref(), &[]) {
            extra.push(format!("props: {}", props));
        }
        if let Some(emits) = render_emits(self.emits.as_ref(), &[]) {
            extra.push(format!("emits: {}", emits));
        }
        extra.extend(
            self.page_flags(visitor)
                .into_iter()
                .map(|flag| format!("{}: true", flag)),
        );
        if let Some(declaration) = self.css_modules() {
            code.push_str(&declaration);
            extra.push("cssModules: __cssModules".to_string());
        }
        if extra.is_empty() {
            code.push_str(&format!("registerComponent({});\n", SFC_MAIN));
        } else {
            code.push_str(&format!(
                "registerComponent({{ ...{}, {} }});\n",
                SFC_MAIN,
                extra.join(", ")
            ));
        }
        (code, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::CssModules;
    use crate::types::RouteKind;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn options(setup: bool) -> ScriptTransformOptions<'static> {
        ScriptTransformOptions {
            filename: "/src/components/card.vue",
            is_ts: true,
            setup,
            route: RouteKind::Component,
            runtime_module: "@kirie/runtime",
            css_modules: None,
            template_identifiers: None,
            start_line: 1,
        }
    }

    fn compile(source: &str, setup: bool) -> String {
        transform_script(source, &options(setup)).unwrap().code
    }

    fn usage_error(source: &str, opts: &ScriptTransformOptions<'_>) -> (String, String) {
        match transform_script(source, opts) {
            Err(CompileError::MacroUsage {
                macro_name,
                message,
                ..
            }) => (macro_name, message),
            other => panic!("expected macro usage error, got {:?}", other.map(|r| r.code)),
        }
    }

    fn assert_no_macros(code: &str) {
        for name in ALL_MACROS {
            assert!(!code.contains(&format!("{}(", name)), "{} left in:\n{}", name, code);
        }
    }

    #[test]
    fn test_plain_script_is_untouched() {
        let source = "import { helper } from './util'\nhelper()\n";
        let result = transform_script(source, &options(false)).unwrap();
        assert!(!result.registers_component);
        assert!(result.macro_hash.is_none());
        assert_eq!(result.code, source);
    }

    #[test]
    fn test_options_component() {
        let source = r#"import { defineComponent } from 'vue'
export default defineComponent({
  __name: 'Card',
  data() { return { n: 1 } },
  setup(props, { expose: __expose }) {
    __expose();
    return {}
  },
})
"#;
        let code = compile(source, false);
        insta::assert_snapshot!(code, @r#"
        import { registerComponent } from "@kirie/runtime";
        const __sfc_main = {
          data() { return { n: 1 } },
          setup(props, {  }) {
            return {}
          },
        };
        registerComponent(__sfc_main);
        "#);
    }

    #[test]
    fn test_options_page_flags_and_css_modules() {
        let mut modules = CssModules::new();
        modules.insert(
            "$style".to_string(),
            BTreeMap::from([("title".to_string(), "a1_title".to_string())]),
        );
        let opts = ScriptTransformOptions {
            route: RouteKind::Page,
            css_modules: Some(&modules),
            ..options(false)
        };
        let source = "export default { onShareAppMessage() { return {} } }";
        let code = transform_script(source, &opts).unwrap().code;
        assert!(code.contains(r#"const __cssModules = {"$style":{"title":"a1_title"}};"#));
        assert!(code.ends_with(
            "registerComponent({ ...__sfc_main, enableOnShareAppMessage: true, cssModules: __cssModules });\n"
        ));
    }

    #[test]
    fn test_page_flags_only_for_pages() {
        let source = "onShareTimeline(() => ({}))\n";
        let component = compile(source, true);
        assert!(!component.contains("enableOnShareTimeline"));

        let opts = ScriptTransformOptions {
            route: RouteKind::Page,
            ..options(true)
        };
        let page = transform_script(source, &opts).unwrap().code;
        assert!(page.contains("  enableOnShareTimeline: true,\n"));
    }

    #[test]
    fn test_setup_component() {
        let source = r#"import { ref } from 'vue'
import Badge from './badge.vue'
interface Props { title: string; count?: number }
const props = withDefaults(defineProps<Props>(), { count: 0 })
const emit = defineEmits<{ (e: 'tap'): void }>()
const [value, modifiers] = defineModel<string>('value')
defineOptions({ options: { multipleSlots: true } })
definePageJson({ navigationBarTitleText: 'Card' })
const clicks = ref(0)
function onTap() { clicks.value++; emit('tap') }
"#;
        let result = transform_script(source, &options(true)).unwrap();
        assert_eq!(result.config_macros.len(), 1);
        assert_eq!(
            result.config_macros[0].argument,
            MacroArgument::Static(json!({"navigationBarTitleText": "Card"}))
        );
        let code = result.code;
        assert_no_macros(&code);
        insta::assert_snapshot!(code, @r#"
        import { registerComponent, useModel as _useModel } from "@kirie/runtime";
        import { ref } from 'vue'
        import Badge from './badge.vue'
        interface Props { title: string; count?: number }
        const __sfc_main = {
          options: { multipleSlots: true },
          props: {
            "title": { type: String, required: true },
            "count": { type: Number, required: false, default: 0 },
            "value": { type: String },
            "valueModifiers": {},
          },
          emits: ["tap","update:value"],
          setup(__props, { emit: __emit }) {
        const props = __props
        const emit = __emit
        const [value, modifiers] = [_useModel(__props, "value", __emit), __props["valueModifiers"] || {}]
        const clicks = ref(0)
        function onTap() { clicks.value++; emit('tap') }
            return { props, emit, value, modifiers, clicks, onTap, ref, Badge };
          },
        };
        registerComponent(__sfc_main);
        "#);
    }

    #[test]
    fn test_template_identifiers_filter_imports() {
        let ids: FxHashSet<String> = ["Badge".to_string()].into_iter().collect();
        let opts = ScriptTransformOptions {
            template_identifiers: Some(&ids),
            ..options(true)
        };
        let source = "import { ref } from 'vue'\nimport Badge from './badge.vue'\nconst n = ref(1)\n";
        let code = transform_script(source, &opts).unwrap().code;
        assert!(code.contains("    return { n, Badge };\n"));
    }

    #[test]
    fn test_dynamic_macro_argument_becomes_module() {
        let source = "import { title } from './meta'\ndefineComponentJson({ navigationBarTitleText: title })\n";
        let result = transform_script(source, &options(true)).unwrap();
        let MacroArgument::Module(module) = &result.config_macros[0].argument else {
            panic!("expected evaluation module");
        };
        assert_eq!(
            module.code,
            "import { title } from \"./meta\";\nexport default ({ navigationBarTitleText: title });\n"
        );
        assert!(module.is_ts);
    }

    #[test]
    fn test_static_fast_path_uses_consts() {
        let source = "const base = { styleIsolation: 'shared' }\ndefineComponentJson({ ...base, component: true })\n";
        let result = transform_script(source, &options(true)).unwrap();
        assert_eq!(
            result.config_macros[0].argument,
            MacroArgument::Static(json!({"styleIsolation": "shared", "component": true}))
        );
    }

    #[test]
    fn test_json_macro_in_options_script() {
        let source = "const cfg = definePageJson({ a: 1 })\nexport default { cfg }\n";
        let result = transform_script(source, &options(false)).unwrap();
        assert!(result.registers_component);
        let code = result.code;
        assert!(code.contains("const cfg = void 0\n"));
        assert_no_macros(&code);
    }

    #[test]
    fn test_macro_without_default_export() {
        let source = "// config only\ndefineAppJson({ pages: ['pages/index'] })\n";
        let result = transform_script(source, &options(false)).unwrap();
        assert!(!result.registers_component);
        assert_eq!(result.code, "// config only\n\n");
    }

    #[test]
    fn test_hash_tracks_macro_text_only() {
        let hash = |source: &str| {
            transform_script(source, &options(true))
                .unwrap()
                .macro_hash
        };
        let a = hash("const x = 1\ndefinePageJson({ a: 1 })\n");
        let b = hash("const x = 2\ndefinePageJson({ a: 1 })\n");
        let c = hash("const x = 1\ndefinePageJson({ a: 2 })\n");
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(hash("const x = 1\n"), None);
    }

    #[test]
    fn test_macro_usage_errors() {
        let error = |source: &str, setup: bool| usage_error(source, &options(setup));

        let (name, _) = error("definePageJson('title')\n", true);
        assert_eq!(name, "definePageJson");
        let (_, message) = error("defineProps(['a'])\n", false);
        assert!(message.contains("<script setup>"));
        let (_, message) = error("function f() { defineEmits(['a']) }\n", true);
        assert!(message.contains("top level"));
        let (_, message) = error("foo(defineAppJson({}))\n", true);
        assert!(message.contains("statement"));
        let (_, message) = error("const size = 1\ndefineProps({ a: { default: size } })\n", true);
        assert!(message.contains("`size`"));
        let (_, message) = error("defineProps(['a'])\ndefineProps(['b'])\n", true);
        assert!(message.contains("once"));
        let (name, _) = error("withDefaults(defineProps(['a']), {})\n", true);
        assert_eq!(name, "withDefaults");
    }

    #[test]
    fn test_define_options_reserved_key() {
        let (name, message) = usage_error("defineOptions({ props: ['a'] })\n", &options(true));
        assert_eq!(name, "defineOptions");
        assert!(message.contains("`props`"));
    }

    #[test]
    fn test_define_options_keeps_functions_and_imports() {
        let source = r#"import { format } from './format'
const prefix = 'item-'
const limit = 3
const count = ref(0)
defineOptions({
  options: { multipleSlots: true, prefix },
  observers: { 'a': function () { this.x = limit } },
  methods: { format },
})
"#;
        let code = compile(source, true);
        assert_no_macros(&code);
        assert!(code.contains(
            "const __sfc_main = {\n  options: { multipleSlots: true, prefix: \"item-\" },\n  observers: { 'a': function () { this.x = 3 } },\n  methods: { format },\n"
        ));
        assert!(code.contains("import { format } from './format'\n"));
    }

    #[test]
    fn test_define_options_rejects_setup_locals() {
        let source = "const count = ref(0)\ndefineOptions({ data() { return { count } } })\n";
        let (name, message) = usage_error(source, &options(true));
        assert_eq!(name, "defineOptions");
        assert!(message.contains("`count`"));
    }

    #[test]
    fn test_top_level_expose_in_setup_is_stripped() {
        let code = compile("const a = 1\n__expose();\nconst b = 2\n", true);
        assert!(!code.contains("__expose"));
        assert!(code.contains("  setup(__props, { emit: __emit }) {\nconst a = 1\nconst b = 2\n"));
    }

    #[test]
    fn test_config_macro_inside_options_setup() {
        let opts = ScriptTransformOptions {
            filename: "/src/pages/index.vue",
            route: RouteKind::Page,
            ..options(false)
        };
        let source = "export default {\n  setup() {\n    definePageJson({ navigationBarTitleText: 'x' })\n    return {}\n  },\n}\n";
        let result = transform_script(source, &opts).unwrap();
        assert_eq!(
            result.config_macros[0].argument,
            MacroArgument::Static(json!({"navigationBarTitleText": "x"}))
        );
        assert_no_macros(&result.code);
        assert!(result.code.contains("  setup() {\n    return {}\n  },\n"));
    }

    #[test]
    fn test_props_and_emits_inside_options_setup() {
        let source = r#"export default {
  setup(props, { emit }) {
    const p = defineProps(['title'])
    const e = defineEmits(['tap'])
    defineExpose({ p })
    return { p, e }
  },
}
"#;
        let code = compile(source, false);
        assert_no_macros(&code);
        assert!(code.contains("    const p = props\n    const e = emit\n    return { p, e }\n"));
        assert!(code.ends_with(
            "registerComponent({ ...__sfc_main, props: [\"title\"], emits: [\"tap\"] });\n"
        ));

        let source = "export default {\n  setup(props) {\n    const props = defineProps(['a'])\n    return {}\n  },\n}\n";
        let code = compile(source, false);
        assert!(code.contains("  setup(props) {\n    return {}\n  },\n"));
        assert!(code.contains("props: [\"a\"]"));
    }

    #[test]
    fn test_options_setup_macro_errors() {
        let error = |source: &str| usage_error(source, &options(false));

        let (_, message) = error("export default { setup() { const p = defineProps(['a']) } }");
        assert!(message.contains("props parameter"));
        let (_, message) = error("export default { props: ['b'], setup(props) { defineProps(['a']) } }");
        assert!(message.contains("`props` option"));
        let (_, message) = error("export default { setup() { defineModel() } }");
        assert!(message.contains("<script setup>"));
        let (_, message) = error("export default { setup() { if (a) { definePageJson({}) } } }");
        assert!(message.contains("top level"));
        let (_, message) = error("export default { setup(props) { defineProps({ a: { default: size } }); const size = 1 } }");
        assert!(message.contains("`size`"));
    }

    #[test]
    fn test_setup_rejects_exports() {
        let err = transform_script("const a = 1\nexport const b = 2\n", &options(true)).unwrap_err();
        match err {
            CompileError::SfcParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_idempotent() {
        let source = "const props = defineProps(['a'])\ndefinePageJson({ a: 1 })\nconst x = props.a\n";
        assert_eq!(compile(source, true), compile(source, true));
    }
}
