//! Standalone modules for macro arguments that are not statically known.
//!
//! The module re-imports what the argument uses, copies the top-level
//! declarations it (transitively) references, then default-exports it.

use super::analysis::{ProgramInfo, ReferenceCollector};
use super::{EvalModule, ImportBinding, ImportedName};
use kirie_carton::FxHashSet;
use oxc_ast::ast::Expression;
use oxc_span::{GetSpan, Span};

fn render_import(binding: &ImportBinding) -> String {
    let source = serde_json::to_string(&binding.source).unwrap_or_else(|_| format!("'{}'", binding.source));
    match &binding.imported {
        ImportedName::Default => format!("import {} from {};\n", binding.local, source),
        ImportedName::Namespace => format!("import * as {} from {};\n", binding.local, source),
        ImportedName::Named(name) if *name == binding.local => {
            format!("import {{ {} }} from {};\n", name, source)
        }
        ImportedName::Named(name) => {
            format!("import {{ {} as {} }} from {};\n", name, binding.local, source)
        }
    }
}

/// Build the evaluation module for `arg`.
///
/// Declarations containing one of the `excluded` spans (macro calls) are
/// never copied.
pub fn build_eval_module(
    info: &ProgramInfo<'_, '_>,
    source: &str,
    arg: &Expression<'_>,
    excluded: &[Span],
    is_ts: bool,
) -> EvalModule {
    let mut pending: Vec<String> = ReferenceCollector::of_expression(arg).into_iter().collect();
    let mut seen: FxHashSet<String> = pending.iter().cloned().collect();
    let mut decls = FxHashSet::default();

    while let Some(name) = pending.pop() {
        let Some((index, decl)) = info
            .decls
            .iter()
            .enumerate()
            .find(|(_, d)| d.names.iter().any(|n| *n == name))
        else {
            continue;
        };
        let holds_macro = excluded
            .iter()
            .any(|span| decl.span.start <= span.start && span.end <= decl.span.end);
        if holds_macro || !decls.insert(index) {
            continue;
        }
        for reference in &decl.refs {
            if seen.insert(reference.clone()) {
                pending.push(reference.clone());
            }
        }
    }

    let mut code = String::new();
    for binding in info.imports.iter().flat_map(|i| &i.bindings) {
        if !binding.type_only && seen.contains(&binding.local) {
            code.push_str(&render_import(binding));
        }
    }

    let mut ordered: Vec<usize> = decls.into_iter().collect();
    ordered.sort_unstable();
    for index in ordered {
        let span = info.decls[index].span;
        let text = &source[span.start as usize..span.end as usize];
        // Exports are irrelevant inside the module
        code.push_str(text.strip_prefix("export ").unwrap_or(text));
        code.push('\n');
    }

    let arg_span = arg.span();
    code.push_str("export default (");
    code.push_str(&source[arg_span.start as usize..arg_span.end as usize]);
    code.push_str(");\n");

    EvalModule { code, is_ts }
}
