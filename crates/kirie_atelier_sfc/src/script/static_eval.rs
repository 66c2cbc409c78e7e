//! Compile-time evaluation of literal expressions into JSON.
//!
//! Handles the subset of expressions whose value is known without running
//! any code: literals, object/array literals, template literals whose
//! substitutions are themselves static, unary sign/not, TS type wrappers,
//! and references to already-evaluated `const` bindings.

use kirie_carton::FxHashMap;
use oxc_ast::ast::{
    ArrayExpressionElement, Expression, ObjectPropertyKind, PropertyKey, PropertyKind,
    TemplateLiteral, UnaryOperator,
};
use serde_json::{Map, Number, Value};

/// Bindings visible to the evaluator, by name.
pub type StaticEnv = FxHashMap<String, Value>;

/// Evaluate `expr`, or `None` when it is not statically known.
pub fn eval_expression(expr: &Expression<'_>, env: &StaticEnv) -> Option<Value> {
    match expr {
        Expression::StringLiteral(lit) => Some(Value::String(lit.value.to_string())),
        Expression::NumericLiteral(lit) => number_value(lit.value),
        Expression::BooleanLiteral(lit) => Some(Value::Bool(lit.value)),
        Expression::NullLiteral(_) => Some(Value::Null),
        Expression::TemplateLiteral(tpl) => eval_template(tpl, env).map(Value::String),
        Expression::Identifier(ident) => env.get(ident.name.as_str()).cloned(),
        Expression::ObjectExpression(obj) => {
            let mut map = Map::new();
            for prop in &obj.properties {
                match prop {
                    ObjectPropertyKind::ObjectProperty(prop) => {
                        if prop.method || prop.kind != PropertyKind::Init {
                            return None;
                        }
                        let key = if prop.computed {
                            match prop.key.as_expression().and_then(|e| eval_expression(e, env))? {
                                Value::String(s) => s,
                                Value::Number(n) => n.to_string(),
                                _ => return None,
                            }
                        } else {
                            static_key_name(&prop.key)?
                        };
                        map.insert(key, eval_expression(&prop.value, env)?);
                    }
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        match eval_expression(&spread.argument, env)? {
                            Value::Object(inner) => map.extend(inner),
                            _ => return None,
                        }
                    }
                }
            }
            Some(Value::Object(map))
        }
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                match element {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        match eval_expression(&spread.argument, env)? {
                            Value::Array(inner) => items.extend(inner),
                            _ => return None,
                        }
                    }
                    ArrayExpressionElement::Elision(_) => items.push(Value::Null),
                    other => items.push(eval_expression(other.as_expression()?, env)?),
                }
            }
            Some(Value::Array(items))
        }
        Expression::UnaryExpression(unary) => {
            let value = eval_expression(&unary.argument, env)?;
            match (unary.operator, value) {
                (UnaryOperator::UnaryNegation, Value::Number(n)) => number_value(-n.as_f64()?),
                (UnaryOperator::UnaryPlus, Value::Number(n)) => Some(Value::Number(n)),
                (UnaryOperator::LogicalNot, Value::Bool(b)) => Some(Value::Bool(!b)),
                _ => None,
            }
        }
        Expression::ParenthesizedExpression(paren) => eval_expression(&paren.expression, env),
        Expression::TSAsExpression(ts) => eval_expression(&ts.expression, env),
        Expression::TSSatisfiesExpression(ts) => eval_expression(&ts.expression, env),
        Expression::TSNonNullExpression(ts) => eval_expression(&ts.expression, env),
        Expression::TSTypeAssertion(ts) => eval_expression(&ts.expression, env),
        _ => None,
    }
}

fn eval_template(tpl: &TemplateLiteral<'_>, env: &StaticEnv) -> Option<String> {
    let mut out = String::new();
    for (i, quasi) in tpl.quasis.iter().enumerate() {
        out.push_str(quasi.value.cooked.as_ref()?.as_str());
        if let Some(expr) = tpl.expressions.get(i) {
            match eval_expression(expr, env)? {
                Value::String(s) => out.push_str(&s),
                Value::Number(n) => out.push_str(&n.to_string()),
                Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                Value::Null => out.push_str("null"),
                _ => return None,
            }
        }
    }
    Some(out)
}

/// Integers stay integers so `1` serializes as `1`, not `1.0`.
fn number_value(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Some(Value::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number)
    }
}

/// Name of a non-computed property key.
pub fn static_key_name(key: &PropertyKey<'_>) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.to_string()),
        PropertyKey::StringLiteral(lit) => Some(lit.value.to_string()),
        PropertyKey::NumericLiteral(lit) => number_value(lit.value).map(|v| v.to_string()),
        _ => None,
    }
}

/// Whether `expr` is a literal that can never evaluate to a plain object.
pub fn is_non_object_literal(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::StringLiteral(_)
        | Expression::NumericLiteral(_)
        | Expression::BooleanLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::TemplateLiteral(_)
        | Expression::BigIntLiteral(_)
        | Expression::RegExpLiteral(_)
        | Expression::ArrayExpression(_) => true,
        Expression::ParenthesizedExpression(paren) => is_non_object_literal(&paren.expression),
        Expression::TSAsExpression(ts) => is_non_object_literal(&ts.expression),
        Expression::TSSatisfiesExpression(ts) => is_non_object_literal(&ts.expression),
        _ => false,
    }
}
