//! Rebind the default export to `__sfc_main`.
//!
//! Every shape is expressed as edits over the original text:
//!
//! * `export default <expr>` becomes `const __sfc_main = <expr>;`
//! * `export default function f() {}` keeps the declaration and binds `f`
//! * `export { x as default }` drops the specifier and binds `x`
//! * `export { x as default } from './m'` imports `x` under a private name
//!
//! `defineComponent(...)` around the options object is unwrapped, and its
//! import is dropped when nothing else uses it.

use super::analysis::{module_export_name, ReferenceCollector};
use super::edit::{extend_over_comma, extend_over_line, EditList};
use super::static_eval::static_key_name;
use super::SFC_MAIN;
use oxc_ast::ast::{
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, FormalParameters,
    FunctionBody, ImportDeclarationSpecifier, ModuleExportName, ObjectExpression,
    ObjectPropertyKind, Program, Statement,
};
use oxc_ast_visit::Visit;
use oxc_span::{GetSpan, Span};

const COMPONENT_WRAPPERS: &[&str] = &["defineComponent", "_defineComponent"];
const REEXPORTED_DEFAULT: &str = "__sfc_default";

#[derive(Debug, Default)]
pub struct DefaultExportRewrite {
    /// Binding for `__sfc_main`, emitted after the program body
    pub epilogue: Option<String>,
    /// Span of the options object literal when the export is one
    pub object_span: Option<Span>,
}

fn is_default_name(name: &ModuleExportName<'_>) -> bool {
    module_export_name(name) == "default"
}

fn ensure_semicolon(source: &str, end: u32, edits: &mut EditList) {
    if !source[..end as usize].trim_end().ends_with(';') {
        edits.insert(end, ";");
    }
}

/// Record the rewrite of the program's default export, if it has one.
pub fn rewrite_default_export(
    program: &Program<'_>,
    source: &str,
    edits: &mut EditList,
) -> Option<DefaultExportRewrite> {
    for stmt in &program.body {
        match stmt {
            Statement::ExportDefaultDeclaration(decl) => {
                let prefix = Span::new(decl.span.start, decl.declaration.span().start);
                let mut rewrite = DefaultExportRewrite::default();
                match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        match &func.id {
                            Some(id) => {
                                edits.remove(prefix);
                                rewrite.epilogue = Some(format!("const {} = {};", SFC_MAIN, id.name));
                            }
                            None => {
                                edits.replace(prefix, format!("const {} = ", SFC_MAIN));
                                ensure_semicolon(source, decl.span.end, edits);
                            }
                        }
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => match &class.id {
                        Some(id) => {
                            edits.remove(prefix);
                            rewrite.epilogue = Some(format!("const {} = {};", SFC_MAIN, id.name));
                        }
                        None => {
                            edits.replace(prefix, format!("const {} = ", SFC_MAIN));
                            ensure_semicolon(source, decl.span.end, edits);
                        }
                    },
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => continue,
                    other => {
                        let Some(expr) = other.as_expression() else {
                            continue;
                        };
                        edits.replace(prefix, format!("const {} = ", SFC_MAIN));
                        let expr = unwrap_component_wrapper(program, expr, source, edits);
                        if let Expression::ObjectExpression(obj) = expr.get_inner_expression() {
                            rewrite.object_span = Some(obj.span);
                        }
                        ensure_semicolon(source, decl.span.end, edits);
                    }
                }
                return Some(rewrite);
            }
            Statement::ExportNamedDeclaration(named) => {
                if let Some(rewrite) = rewrite_default_specifier(named, source, edits) {
                    return Some(rewrite);
                }
            }
            _ => {}
        }
    }
    None
}

fn rewrite_default_specifier(
    named: &ExportNamedDeclaration<'_>,
    source: &str,
    edits: &mut EditList,
) -> Option<DefaultExportRewrite> {
    let specifier = named
        .specifiers
        .iter()
        .find(|s| is_default_name(&s.exported))?;
    let local = module_export_name(&specifier.local);

    if named.specifiers.len() == 1 {
        edits.remove(named.span);
    } else {
        edits.remove(extend_over_comma(source, specifier.span));
    }

    let bound = match &named.source {
        Some(module) => {
            edits.insert(
                named.span.start,
                format!(
                    "import {{ {} as {} }} from {};\n",
                    local,
                    REEXPORTED_DEFAULT,
                    &source[module.span.start as usize..module.span.end as usize]
                ),
            );
            REEXPORTED_DEFAULT.to_string()
        }
        None => local,
    };

    Some(DefaultExportRewrite {
        epilogue: Some(format!("const {} = {};", SFC_MAIN, bound)),
        object_span: None,
    })
}

/// The options object literal of `export default`, looking through
/// `defineComponent(...)`.
pub fn default_options_object<'b, 'a>(program: &'b Program<'a>) -> Option<&'b ObjectExpression<'a>> {
    program.body.iter().find_map(|stmt| {
        let Statement::ExportDefaultDeclaration(decl) = stmt else {
            return None;
        };
        let mut expr = decl.declaration.as_expression()?;
        if let Expression::CallExpression(call) = expr {
            let wrapped = matches!(
                &call.callee,
                Expression::Identifier(callee) if COMPONENT_WRAPPERS.contains(&callee.name.as_str())
            );
            if wrapped && call.arguments.len() == 1 {
                expr = call.arguments[0].as_expression()?;
            }
        }
        match expr.get_inner_expression() {
            Expression::ObjectExpression(object) => Some(&**object),
            _ => None,
        }
    })
}

/// Whether an options object declares `key` directly.
pub fn declares_option(object: &ObjectExpression<'_>, key: &str) -> bool {
    object.properties.iter().any(|prop| match prop {
        ObjectPropertyKind::ObjectProperty(prop) => {
            !prop.computed && static_key_name(&prop.key).as_deref() == Some(key)
        }
        ObjectPropertyKind::SpreadProperty(_) => false,
    })
}

/// The `setup` function of an options object.
pub struct SetupFunction<'b, 'a> {
    pub params: &'b FormalParameters<'a>,
    pub body: &'b FunctionBody<'a>,
}

/// `setup() {}`, `setup: function () {}` or `setup: () => {}`.
pub fn setup_function<'b, 'a>(object: &'b ObjectExpression<'a>) -> Option<SetupFunction<'b, 'a>> {
    object.properties.iter().find_map(|prop| {
        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
            return None;
        };
        if prop.computed || static_key_name(&prop.key).as_deref() != Some("setup") {
            return None;
        }
        match &prop.value {
            Expression::FunctionExpression(func) => Some(SetupFunction {
                params: &func.params,
                body: func.body.as_deref()?,
            }),
            Expression::ArrowFunctionExpression(arrow) if !arrow.expression => Some(SetupFunction {
                params: &arrow.params,
                body: &arrow.body,
            }),
            _ => None,
        }
    })
}

/// Strip `defineComponent(` ... `)` around the exported expression.
fn unwrap_component_wrapper<'b, 'a>(
    program: &'b Program<'a>,
    expr: &'b Expression<'a>,
    source: &str,
    edits: &mut EditList,
) -> &'b Expression<'a> {
    let Expression::CallExpression(call) = expr else {
        return expr;
    };
    let Expression::Identifier(callee) = &call.callee else {
        return expr;
    };
    let name = callee.name.as_str();
    if !COMPONENT_WRAPPERS.contains(&name) || call.arguments.len() != 1 {
        return expr;
    }
    let Some(inner) = call.arguments[0].as_expression() else {
        return expr;
    };

    let inner_span = inner.span();
    edits.remove(Span::new(call.span.start, inner_span.start));
    edits.remove(Span::new(inner_span.end, call.span.end));

    let mut refs = ReferenceCollector::default();
    refs.visit_program(program);
    if refs.counts.get(name).copied().unwrap_or(0) <= 1 {
        remove_import_specifier(program, name, source, edits);
    }
    inner
}

fn remove_import_specifier(program: &Program<'_>, local: &str, source: &str, edits: &mut EditList) {
    for stmt in &program.body {
        let Statement::ImportDeclaration(import) = stmt else {
            continue;
        };
        let Some(specifiers) = &import.specifiers else {
            continue;
        };
        let Some(found) = specifiers.iter().find(|s| match s {
            ImportDeclarationSpecifier::ImportSpecifier(spec) => spec.local.name.as_str() == local,
            _ => false,
        }) else {
            continue;
        };
        if specifiers.len() == 1 {
            edits.remove(extend_over_line(source, import.span));
        } else {
            edits.remove(extend_over_comma(source, found.span()));
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn rewrite(source: &str) -> (String, Option<DefaultExportRewrite>) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::ts()).parse();
        let mut edits = EditList::new();
        let rewrite = rewrite_default_export(&ret.program, source, &mut edits);
        (edits.apply(source), rewrite)
    }

    #[test]
    fn test_object_export() {
        let (code, rewrite) = rewrite("import { ref } from 'vue'\nexport default {\n  name: 'A'\n}\n");
        assert_eq!(code, "import { ref } from 'vue'\nconst __sfc_main = {\n  name: 'A'\n};\n");
        let rewrite = rewrite.unwrap();
        assert!(rewrite.epilogue.is_none());
        assert!(rewrite.object_span.is_some());
    }

    #[test]
    fn test_setup_function_shapes() {
        let allocator = Allocator::default();
        let source = r#"
export default defineComponent({
  props: ['a'],
  setup(props, ctx) { return {} },
})
const arrow = { setup: (p) => { return {} } }
"#;
        let ret = Parser::new(&allocator, source, SourceType::ts()).parse();
        let object = default_options_object(&ret.program).unwrap();
        assert!(declares_option(object, "props"));
        assert!(!declares_option(object, "emits"));
        let setup = setup_function(object).unwrap();
        assert_eq!(setup.params.items.len(), 2);
        assert_eq!(setup.body.statements.len(), 1);

        let ret = Parser::new(&allocator, "export default { setup: () => ({}) }", SourceType::ts()).parse();
        let object = default_options_object(&ret.program).unwrap();
        assert!(setup_function(object).is_none());
    }

    #[test]
    fn test_named_class_and_function() {
        let (code, rewrite) = rewrite("export default class Foo {}");
        assert_eq!(code, "class Foo {}");
        assert_eq!(rewrite.unwrap().epilogue.as_deref(), Some("const __sfc_main = Foo;"));

        let (code, rewrite) = self::rewrite("export default function () { return {} }");
        assert_eq!(code, "const __sfc_main = function () { return {} };");
        assert!(rewrite.unwrap().epilogue.is_none());
    }

    #[test]
    fn test_default_specifier() {
        let (code, rewrite) = rewrite("export { a as default, b }\nconst a = {}\nconst b = 1");
        assert_eq!(code, "export { b }\nconst a = {}\nconst b = 1");
        assert_eq!(rewrite.unwrap().epilogue.as_deref(), Some("const __sfc_main = a;"));
    }

    #[test]
    fn test_default_reexport() {
        let (code, rewrite) = rewrite("export { default } from './impl'\n");
        assert_eq!(code, "import { default as __sfc_default } from './impl';\n\n");
        assert_eq!(
            rewrite.unwrap().epilogue.as_deref(),
            Some("const __sfc_main = __sfc_default;")
        );
    }

    #[test]
    fn test_unwraps_define_component_and_import() {
        let source = "import { defineComponent, ref } from 'vue'\nexport default defineComponent({ data() { return {} } })";
        let (code, rewrite) = rewrite(source);
        assert_eq!(
            code,
            "import { ref } from 'vue'\nconst __sfc_main = { data() { return {} } };"
        );
        assert!(rewrite.unwrap().object_span.is_some());
    }

    #[test]
    fn test_keeps_wrapper_import_when_used_elsewhere() {
        let source = "import { defineComponent } from 'vue'\nconst Inner = defineComponent({})\nexport default defineComponent({ components: { Inner } })";
        let (code, _) = rewrite(source);
        assert!(code.starts_with("import { defineComponent } from 'vue'"));
        assert!(code.ends_with("const __sfc_main = { components: { Inner } };"));
    }

    #[test]
    fn test_no_default_export() {
        let (code, rewrite) = rewrite("export const a = 1");
        assert_eq!(code, "export const a = 1");
        assert!(rewrite.is_none());
    }
}
