//! Props, emits and model declarations.
//!
//! Runtime declarations are taken verbatim from source; type-only
//! declarations are lowered to runtime constructors by walking the TS type
//! AST, resolving local `interface`/`type` declarations.

use super::analysis::{TypeDecl, TypeLookup};
use super::static_eval::static_key_name;
use oxc_ast::ast::{
    ArrayExpressionElement, CallExpression, Expression, ObjectPropertyKind, TSLiteral, TSSignature,
    TSType, TSTypeName,
};
use oxc_span::GetSpan;

const MAX_TYPE_DEPTH: u32 = 8;

pub const MODEL_VALUE: &str = "modelValue";

fn slice<'s>(source: &'s str, node: &impl GetSpan) -> &'s str {
    let span = node.span();
    &source[span.start as usize..span.end as usize]
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// One prop lowered from a type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedProp {
    pub key: String,
    /// Runtime constructors; `None` when the type is unknown at runtime
    pub types: Option<Vec<&'static str>>,
    pub required: bool,
    /// Source text of the `withDefaults` value
    pub default: Option<String>,
}

/// A props (or emits) declaration in one of its accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeDecl {
    /// `['a', 'b']`
    Names(Vec<String>),
    /// Object literal, kept as source text
    Source(String),
    /// Lowered from a type argument
    Typed(Vec<TypedProp>),
}

/// A `defineModel()` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: String,
    /// Options object source, e.g. `{ type: Number, default: 0 }`
    pub options: Option<String>,
    pub types: Option<Vec<&'static str>>,
}

impl ModelDecl {
    pub fn modifiers_prop(&self) -> String {
        if self.name == MODEL_VALUE {
            "modelModifiers".to_string()
        } else {
            format!("{}Modifiers", self.name)
        }
    }

    pub fn update_event(&self) -> String {
        format!("update:{}", self.name)
    }
}

/// `['a', 'b']` or `{ ... }` as a runtime declaration.
pub fn runtime_decl(arg: &Expression<'_>, source: &str) -> Result<RuntimeDecl, String> {
    match arg {
        Expression::ArrayExpression(arr) => {
            let mut names = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                match element {
                    ArrayExpressionElement::StringLiteral(lit) => names.push(lit.value.to_string()),
                    _ => return Err("array form only accepts string literals".into()),
                }
            }
            Ok(RuntimeDecl::Names(names))
        }
        Expression::ObjectExpression(_) => Ok(RuntimeDecl::Source(slice(source, arg).to_string())),
        _ => Err("expects an array or object literal".into()),
    }
}

/// Lower the type argument of `defineProps<T>()`.
pub fn typed_props(ty: &TSType<'_>, types: &TypeLookup<'_, '_>) -> Result<Vec<TypedProp>, String> {
    let mut props = Vec::new();
    collect_prop_members(ty, types, &mut props, 0)?;
    Ok(props)
}

fn collect_prop_members(
    ty: &TSType<'_>,
    types: &TypeLookup<'_, '_>,
    out: &mut Vec<TypedProp>,
    depth: u32,
) -> Result<(), String> {
    if depth > MAX_TYPE_DEPTH {
        return Err("type declaration nests too deeply".into());
    }
    match ty {
        TSType::TSTypeLiteral(lit) => collect_signatures(&lit.members, types, out),
        TSType::TSIntersectionType(inter) => {
            for member in &inter.types {
                collect_prop_members(member, types, out, depth + 1)?;
            }
            Ok(())
        }
        TSType::TSParenthesizedType(paren) => {
            collect_prop_members(&paren.type_annotation, types, out, depth + 1)
        }
        TSType::TSTypeReference(reference) => {
            let TSTypeName::IdentifierReference(ident) = &reference.type_name else {
                return Err("qualified type names are not supported".into());
            };
            match types.get(ident.name.as_str()) {
                Some(TypeDecl::Interface(body)) => collect_signatures(&body.body, types, out),
                Some(TypeDecl::Alias(alias)) => collect_prop_members(alias, types, out, depth + 1),
                None => Err(format!(
                    "type `{}` must be declared in the same script",
                    ident.name
                )),
            }
        }
        _ => Err("type argument must be an object type literal or a local type".into()),
    }
}

fn collect_signatures(
    members: &[TSSignature<'_>],
    types: &TypeLookup<'_, '_>,
    out: &mut Vec<TypedProp>,
) -> Result<(), String> {
    for member in members {
        let (key, optional, runtime) = match member {
            TSSignature::TSPropertySignature(prop) => {
                let Some(key) = static_key_name(&prop.key) else {
                    continue;
                };
                let runtime = prop
                    .type_annotation
                    .as_ref()
                    .and_then(|ann| runtime_types(&ann.type_annotation, types, 0));
                (key, prop.optional, runtime)
            }
            TSSignature::TSMethodSignature(method) => {
                let Some(key) = static_key_name(&method.key) else {
                    continue;
                };
                (key, method.optional, Some(vec!["Function"]))
            }
            _ => continue,
        };
        out.retain(|p| p.key != key);
        out.push(TypedProp {
            key,
            types: runtime,
            required: !optional,
            default: None,
        });
    }
    Ok(())
}

/// Runtime constructors a TS type checks against.
pub fn runtime_types(
    ty: &TSType<'_>,
    types: &TypeLookup<'_, '_>,
    depth: u32,
) -> Option<Vec<&'static str>> {
    if depth > MAX_TYPE_DEPTH {
        return None;
    }
    let single = |name: &'static str| Some(vec![name]);
    match ty {
        TSType::TSStringKeyword(_) | TSType::TSTemplateLiteralType(_) => single("String"),
        TSType::TSNumberKeyword(_) => single("Number"),
        TSType::TSBooleanKeyword(_) => single("Boolean"),
        TSType::TSBigIntKeyword(_) => single("BigInt"),
        TSType::TSSymbolKeyword(_) => single("Symbol"),
        TSType::TSObjectKeyword(_)
        | TSType::TSTypeLiteral(_)
        | TSType::TSMappedType(_)
        | TSType::TSIntersectionType(_) => single("Object"),
        TSType::TSArrayType(_) | TSType::TSTupleType(_) => single("Array"),
        TSType::TSFunctionType(_) | TSType::TSConstructorType(_) => single("Function"),
        TSType::TSLiteralType(lit) => match &lit.literal {
            TSLiteral::StringLiteral(_) | TSLiteral::TemplateLiteral(_) => single("String"),
            TSLiteral::NumericLiteral(_) | TSLiteral::UnaryExpression(_) => single("Number"),
            TSLiteral::BooleanLiteral(_) => single("Boolean"),
            _ => None,
        },
        TSType::TSParenthesizedType(paren) => runtime_types(&paren.type_annotation, types, depth + 1),
        TSType::TSUnionType(union) => {
            let mut out: Vec<&'static str> = Vec::new();
            for member in &union.types {
                if matches!(member, TSType::TSNullKeyword(_) | TSType::TSUndefinedKeyword(_)) {
                    continue;
                }
                for name in runtime_types(member, types, depth + 1)? {
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
            (!out.is_empty()).then_some(out)
        }
        TSType::TSTypeReference(reference) => {
            let TSTypeName::IdentifierReference(ident) = &reference.type_name else {
                return None;
            };
            match ident.name.as_str() {
                "String" => single("String"),
                "Number" => single("Number"),
                "Boolean" => single("Boolean"),
                "Array" | "ReadonlyArray" => single("Array"),
                "Function" => single("Function"),
                "Date" => single("Date"),
                "Map" => single("Map"),
                "Set" => single("Set"),
                "Promise" => single("Promise"),
                "Object" | "Record" | "Partial" | "Required" | "Readonly" | "Pick" | "Omit" => {
                    single("Object")
                }
                name => match types.get(name) {
                    Some(TypeDecl::Interface(_)) => single("Object"),
                    Some(TypeDecl::Alias(alias)) => runtime_types(alias, types, depth + 1),
                    None => None,
                },
            }
        }
        _ => None,
    }
}

/// Attach `withDefaults` values to typed props.
pub fn apply_defaults(
    props: &mut [TypedProp],
    defaults: &Expression<'_>,
    source: &str,
) -> Result<(), String> {
    let Expression::ObjectExpression(obj) = defaults else {
        return Err("defaults must be an object literal".into());
    };
    for prop in &obj.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = prop else {
            return Err("defaults cannot use spread".into());
        };
        let Some(key) = (!prop.computed).then(|| static_key_name(&prop.key)).flatten() else {
            return Err("default keys must be static".into());
        };
        let value = if prop.method {
            // `foo() { return [] }` -> a factory function
            let text = slice(source, prop.as_ref());
            format!("function {}", text.trim_start_matches("async ").trim_start_matches(&key))
        } else {
            slice(source, &prop.value).to_string()
        };
        match props.iter_mut().find(|p| p.key == key) {
            Some(target) => {
                target.default = Some(value);
                target.required = false;
            }
            None => return Err(format!("default given for undeclared prop `{}`", key)),
        }
    }
    Ok(())
}

/// Event names from the type argument of `defineEmits<T>()`.
pub fn typed_emits(ty: &TSType<'_>, types: &TypeLookup<'_, '_>) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    collect_event_names(ty, types, &mut names, 0)?;
    Ok(names)
}

fn collect_event_names(
    ty: &TSType<'_>,
    types: &TypeLookup<'_, '_>,
    out: &mut Vec<String>,
    depth: u32,
) -> Result<(), String> {
    if depth > MAX_TYPE_DEPTH {
        return Err("type declaration nests too deeply".into());
    }
    match ty {
        TSType::TSFunctionType(func) => {
            if let Some(ann) = func
                .params
                .items
                .first()
                .and_then(|param| param.pattern.type_annotation.as_ref())
            {
                literal_names(&ann.type_annotation, out);
            }
            Ok(())
        }
        TSType::TSTypeLiteral(lit) => {
            collect_event_signatures(&lit.members, out);
            Ok(())
        }
        TSType::TSUnionType(union) => {
            for member in &union.types {
                collect_event_names(member, types, out, depth + 1)?;
            }
            Ok(())
        }
        TSType::TSIntersectionType(inter) => {
            for member in &inter.types {
                collect_event_names(member, types, out, depth + 1)?;
            }
            Ok(())
        }
        TSType::TSParenthesizedType(paren) => {
            collect_event_names(&paren.type_annotation, types, out, depth + 1)
        }
        TSType::TSTypeReference(reference) => {
            let TSTypeName::IdentifierReference(ident) = &reference.type_name else {
                return Err("qualified type names are not supported".into());
            };
            match types.get(ident.name.as_str()) {
                Some(TypeDecl::Interface(body)) => {
                    collect_event_signatures(&body.body, out);
                    Ok(())
                }
                Some(TypeDecl::Alias(alias)) => collect_event_names(alias, types, out, depth + 1),
                None => Err(format!(
                    "type `{}` must be declared in the same script",
                    ident.name
                )),
            }
        }
        _ => Err("type argument must be a function type, call signatures or a local type".into()),
    }
}

fn collect_event_signatures(members: &[TSSignature<'_>], out: &mut Vec<String>) {
    for member in members {
        match member {
            // (e: 'change', value: string): void
            TSSignature::TSCallSignatureDeclaration(sig) => {
                if let Some(ann) = sig
                    .params
                    .items
                    .first()
                    .and_then(|param| param.pattern.type_annotation.as_ref())
                {
                    literal_names(&ann.type_annotation, out);
                }
            }
            // change: [value: string]
            TSSignature::TSPropertySignature(prop) => {
                if let Some(key) = static_key_name(&prop.key) {
                    push_unique(out, key);
                }
            }
            _ => {}
        }
    }
}

fn literal_names(ty: &TSType<'_>, out: &mut Vec<String>) {
    match ty {
        TSType::TSLiteralType(lit) => {
            if let TSLiteral::StringLiteral(s) = &lit.literal {
                push_unique(out, s.value.to_string());
            }
        }
        TSType::TSUnionType(union) => {
            for member in &union.types {
                literal_names(member, out);
            }
        }
        TSType::TSParenthesizedType(paren) => literal_names(&paren.type_annotation, out),
        _ => {}
    }
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if !out.contains(&name) {
        out.push(name);
    }
}

/// Parse the arguments of a `defineModel()` call.
pub fn model_decl(
    call: &CallExpression<'_>,
    source: &str,
    types: &TypeLookup<'_, '_>,
) -> Result<ModelDecl, String> {
    let mut args = call.arguments.iter().map(|a| a.as_expression());
    let mut name = MODEL_VALUE.to_string();
    let mut options = None;

    match args.next().flatten() {
        Some(Expression::StringLiteral(lit)) => {
            name = lit.value.to_string();
            if let Some(next) = args.next() {
                options = Some(model_options(next, source)?);
            }
        }
        Some(expr @ Expression::ObjectExpression(_)) => {
            options = Some(slice(source, expr).to_string());
        }
        Some(_) => return Err("first argument must be a string literal or options object".into()),
        None if !call.arguments.is_empty() => return Err("spread arguments are not supported".into()),
        None => {}
    }

    let types = call
        .type_arguments
        .as_ref()
        .and_then(|params| params.params.first())
        .and_then(|ty| runtime_types(ty, types, 0));

    Ok(ModelDecl {
        name,
        options,
        types,
    })
}

fn model_options(arg: Option<&Expression<'_>>, source: &str) -> Result<String, String> {
    match arg {
        Some(expr @ Expression::ObjectExpression(_)) => Ok(slice(source, expr).to_string()),
        _ => Err("options must be an object literal".into()),
    }
}

fn render_types(types: &Option<Vec<&'static str>>) -> String {
    match types {
        None => "null".to_string(),
        Some(list) if list.len() == 1 => list[0].to_string(),
        Some(list) => format!("[{}]", list.join(", ")),
    }
}

fn render_entries(entries: &[(String, String)]) -> String {
    if entries.is_empty() {
        return "{}".to_string();
    }
    let mut out = String::from("{\n");
    for (key, value) in entries {
        out.push_str("    ");
        out.push_str(&quote(key));
        out.push_str(": ");
        out.push_str(value);
        out.push_str(",\n");
    }
    out.push_str("  }");
    out
}

/// Render the `props` option, merging model props in.
pub fn render_props(decl: Option<&RuntimeDecl>, models: &[ModelDecl]) -> Option<String> {
    let model_entries = || {
        models.iter().flat_map(|model| {
            let value = match (&model.options, &model.types) {
                (Some(options), _) => options.clone(),
                (None, Some(_)) => format!("{{ type: {} }}", render_types(&model.types)),
                (None, None) => "{}".to_string(),
            };
            [(model.name.clone(), value), (model.modifiers_prop(), "{}".to_string())]
        })
    };

    match decl {
        None if models.is_empty() => None,
        None => Some(render_entries(&model_entries().collect::<Vec<_>>())),
        Some(RuntimeDecl::Names(names)) => {
            let mut all: Vec<String> = names.clone();
            for model in models {
                all.push(model.name.clone());
                all.push(model.modifiers_prop());
            }
            Some(serde_json::to_string(&all).unwrap_or_else(|_| "[]".into()))
        }
        Some(RuntimeDecl::Source(src)) if models.is_empty() => Some(src.clone()),
        Some(RuntimeDecl::Source(src)) => {
            let mut out = format!("{{\n    ...{},\n", src);
            for (key, value) in model_entries() {
                out.push_str("    ");
                out.push_str(&quote(&key));
                out.push_str(": ");
                out.push_str(&value);
                out.push_str(",\n");
            }
            out.push_str("  }");
            Some(out)
        }
        Some(RuntimeDecl::Typed(props)) => {
            let mut entries: Vec<(String, String)> = props
                .iter()
                .map(|prop| {
                    let mut value = format!(
                        "{{ type: {}, required: {}",
                        render_types(&prop.types),
                        prop.required
                    );
                    if let Some(default) = &prop.default {
                        value.push_str(", default: ");
                        value.push_str(default);
                    }
                    value.push_str(" }");
                    (prop.key.clone(), value)
                })
                .collect();
            entries.extend(model_entries());
            Some(render_entries(&entries))
        }
    }
}

/// Render the `emits` option, adding `update:<model>` events.
pub fn render_emits(decl: Option<&RuntimeDecl>, models: &[ModelDecl]) -> Option<String> {
    let updates: Vec<String> = models.iter().map(ModelDecl::update_event).collect();
    match decl {
        None if updates.is_empty() => None,
        None => Some(serde_json::to_string(&updates).unwrap_or_else(|_| "[]".into())),
        Some(RuntimeDecl::Names(names)) => {
            let mut all = names.clone();
            for update in updates {
                push_unique(&mut all, update);
            }
            Some(serde_json::to_string(&all).unwrap_or_else(|_| "[]".into()))
        }
        Some(RuntimeDecl::Source(src)) if updates.is_empty() => Some(src.clone()),
        Some(RuntimeDecl::Source(src)) => {
            let mut out = format!("{{\n    ...{},\n", src);
            for update in updates {
                out.push_str("    ");
                out.push_str(&quote(&update));
                out.push_str(": null,\n");
            }
            out.push_str("  }");
            Some(out)
        }
        // Emits are never lowered to typed props
        Some(RuntimeDecl::Typed(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::analysis::ProgramInfo;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::{Expression, Statement};
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    /// Run `f` on the first call expression of the last statement.
    fn with_call<R>(source: &str, f: impl FnOnce(&CallExpression<'_>, &TypeLookup<'_, '_>) -> R) -> R {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::ts()).parse();
        let info = ProgramInfo::collect(&ret.program);
        let Some(Statement::ExpressionStatement(stmt)) = ret.program.body.last() else {
            panic!("expected expression statement");
        };
        let Expression::CallExpression(call) = &stmt.expression else {
            panic!("expected call");
        };
        f(call, &info.types)
    }

    fn first_type_arg<'b, 'a>(call: &'b CallExpression<'a>) -> &'b TSType<'a> {
        &call.type_arguments.as_ref().unwrap().params[0]
    }

    #[test]
    fn test_typed_props_literal() {
        let props = with_call(
            "defineProps<{ title: string; count?: number; mode: 'a' | 'b'; tags: string[]; onTap: () => void; any: unknown }>()",
            |call, types| typed_props(first_type_arg(call), types).unwrap(),
        );
        let rendered = render_props(Some(&RuntimeDecl::Typed(props)), &[]).unwrap();
        assert!(rendered.contains(r#""title": { type: String, required: true }"#), "{}", rendered);
        assert!(rendered.contains(r#""count": { type: Number, required: false }"#));
        assert!(rendered.contains(r#""mode": { type: String, required: true }"#));
        assert!(rendered.contains(r#""tags": { type: Array, required: true }"#));
        assert!(rendered.contains(r#""onTap": { type: Function, required: true }"#));
        assert!(rendered.contains(r#""any": { type: null, required: true }"#));
    }

    #[test]
    fn test_typed_props_interface_and_union() {
        let props = with_call(
            "interface Props { id: string | number; meta?: Record<string, string> }\ndefineProps<Props>()",
            |call, types| typed_props(first_type_arg(call), types).unwrap(),
        );
        assert_eq!(props[0].types, Some(vec!["String", "Number"]));
        assert_eq!(props[1].types, Some(vec!["Object"]));
        assert!(!props[1].required);
    }

    #[test]
    fn test_unknown_type_reference_is_error() {
        let err = with_call("defineProps<Imported>()", |call, types| {
            typed_props(first_type_arg(call), types).unwrap_err()
        });
        assert!(err.contains("Imported"));
    }

    #[test]
    fn test_with_defaults() {
        let source = "withDefaults(defineProps<{ size?: number; list?: string[] }>(), { size: 3, list: () => [] })";
        let rendered = with_call(source, |call, types| {
            let Some(Expression::CallExpression(inner)) = call.arguments[0].as_expression() else {
                panic!("expected inner call");
            };
            let mut props = typed_props(first_type_arg(inner), types).unwrap();
            apply_defaults(&mut props, call.arguments[1].as_expression().unwrap(), source).unwrap();
            render_props(Some(&RuntimeDecl::Typed(props)), &[]).unwrap()
        });
        assert!(rendered.contains(r#""size": { type: Number, required: false, default: 3 }"#), "{}", rendered);
        assert!(rendered.contains(r#""list": { type: Array, required: false, default: () => [] }"#));
    }

    #[test]
    fn test_typed_emits_forms() {
        let names = with_call(
            "defineEmits<{ (e: 'change', v: string): void; (e: 'close' | 'open'): void }>()",
            |call, types| typed_emits(first_type_arg(call), types).unwrap(),
        );
        assert_eq!(names, vec!["change", "close", "open"]);

        let names = with_call("defineEmits<{ submit: [value: string]; reset: [] }>()", |call, types| {
            typed_emits(first_type_arg(call), types).unwrap()
        });
        assert_eq!(names, vec!["submit", "reset"]);

        let names = with_call("defineEmits<(e: 'tap') => void>()", |call, types| {
            typed_emits(first_type_arg(call), types).unwrap()
        });
        assert_eq!(names, vec!["tap"]);
    }

    #[test]
    fn test_model_decl_and_rendering() {
        let source = "defineModel('count', { type: Number, default: 0 })";
        let model = with_call(source, |call, types| model_decl(call, source, types).unwrap());
        assert_eq!(model.name, "count");
        assert_eq!(model.modifiers_prop(), "countModifiers");

        let plain = with_call("defineModel<string>()", |call, types| {
            model_decl(call, "defineModel<string>()", types).unwrap()
        });
        assert_eq!(plain.name, MODEL_VALUE);
        assert_eq!(plain.modifiers_prop(), "modelModifiers");

        let models = vec![model, plain];
        let props = render_props(Some(&RuntimeDecl::Names(vec!["a".into()])), &models).unwrap();
        assert_eq!(
            props,
            r#"["a","count","countModifiers","modelValue","modelModifiers"]"#
        );
        let emits = render_emits(None, &models).unwrap();
        assert_eq!(emits, r#"["update:count","update:modelValue"]"#);
        let only_models = render_props(None, &models[1..]).unwrap();
        assert!(only_models.contains(r#""modelValue": { type: String }"#));
        assert!(only_models.contains(r#""modelModifiers": {}"#));
    }

    #[test]
    fn test_runtime_decl() {
        let source = "defineEmits(['a', 'b'])";
        let decl = with_call(source, |call, _| {
            runtime_decl(call.arguments[0].as_expression().unwrap(), source).unwrap()
        });
        assert_eq!(decl, RuntimeDecl::Names(vec!["a".into(), "b".into()]));

        let source = "defineProps(someVar)";
        let err = with_call(source, |call, _| {
            runtime_decl(call.arguments[0].as_expression().unwrap(), source).unwrap_err()
        });
        assert!(err.contains("literal"));
    }
}
