//! Export analysis of plain script modules.
//!
//! Used to follow barrel files (`index.ts` re-exporting components) back to
//! the component file that actually defines an export.

use crate::script::analysis::{binding_names, module_export_name, ProgramInfo};
use crate::script::{ImportBinding, ImportedName};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Declaration, ExportDefaultDeclarationKind, Expression, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntry {
    /// `export { local as exported }`, `export const exported`, `export default local`
    Local { exported: String, local: String },
    /// `export { imported as exported } from 'source'`
    Reexport {
        exported: String,
        imported: String,
        source: String,
    },
    /// `export * from 'source'`
    Star { source: String },
}

#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    pub entries: Vec<ExportEntry>,
    pub imports: Vec<ImportBinding>,
}

/// Where an export of a module comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOrigin<'m> {
    /// Export `name` of module `source`
    Forwarded { source: &'m str, name: String },
    /// Defined in the module itself
    Defined,
}

impl ModuleExports {
    /// Trace `name` one hop. `None` when the module does not export it
    /// directly; `export *` sources are listed by [`ModuleExports::star_sources`].
    pub fn origin(&self, name: &str) -> Option<ExportOrigin<'_>> {
        for entry in &self.entries {
            match entry {
                ExportEntry::Reexport {
                    exported,
                    imported,
                    source,
                } if exported == name => {
                    return Some(ExportOrigin::Forwarded {
                        source,
                        name: imported.clone(),
                    });
                }
                ExportEntry::Local { exported, local } if exported == name => {
                    let origin = match self.imports.iter().find(|b| b.local == *local) {
                        Some(binding) => ExportOrigin::Forwarded {
                            source: &binding.source,
                            name: match &binding.imported {
                                ImportedName::Default => "default".to_string(),
                                ImportedName::Named(imported) => imported.clone(),
                                // Namespace objects are not components
                                ImportedName::Namespace => return Some(ExportOrigin::Defined),
                            },
                        },
                        None => ExportOrigin::Defined,
                    };
                    return Some(origin);
                }
                _ => {}
            }
        }
        None
    }

    pub fn star_sources(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            ExportEntry::Star { source } => Some(source.as_str()),
            _ => None,
        })
    }
}

/// Collect the exports of a module. `None` when it does not parse.
pub fn analyze_exports(source: &str, is_ts: bool) -> Option<ModuleExports> {
    let allocator = Allocator::default();
    let source_type = if is_ts {
        SourceType::ts()
    } else {
        SourceType::mjs()
    };
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }

    let info = ProgramInfo::collect(&ret.program);
    let mut entries = Vec::new();
    for stmt in &ret.program.body {
        match stmt {
            Statement::ExportNamedDeclaration(export) => {
                if let Some(declaration) = &export.declaration {
                    let mut names = Vec::new();
                    match declaration {
                        Declaration::VariableDeclaration(var) => {
                            for declarator in &var.declarations {
                                binding_names(&declarator.id, &mut names);
                            }
                        }
                        Declaration::FunctionDeclaration(func) => {
                            names.extend(func.id.as_ref().map(|id| id.name.to_string()));
                        }
                        Declaration::ClassDeclaration(class) => {
                            names.extend(class.id.as_ref().map(|id| id.name.to_string()));
                        }
                        _ => {}
                    }
                    entries.extend(names.into_iter().map(|name| ExportEntry::Local {
                        exported: name.clone(),
                        local: name,
                    }));
                }
                for specifier in &export.specifiers {
                    let exported = module_export_name(&specifier.exported);
                    let local = module_export_name(&specifier.local);
                    entries.push(match &export.source {
                        Some(module) => ExportEntry::Reexport {
                            exported,
                            imported: local,
                            source: module.value.to_string(),
                        },
                        None => ExportEntry::Local { exported, local },
                    });
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                let local = match &export.declaration {
                    ExportDefaultDeclarationKind::Identifier(ident) => ident.name.to_string(),
                    kind => match kind.as_expression().map(Expression::get_inner_expression) {
                        Some(Expression::Identifier(ident)) => ident.name.to_string(),
                        _ => "default".to_string(),
                    },
                };
                entries.push(ExportEntry::Local {
                    exported: "default".to_string(),
                    local,
                });
            }
            Statement::ExportAllDeclaration(export) => match &export.exported {
                Some(name) => entries.push(ExportEntry::Reexport {
                    exported: module_export_name(name),
                    imported: "*".to_string(),
                    source: export.source.value.to_string(),
                }),
                None => entries.push(ExportEntry::Star {
                    source: export.source.value.to_string(),
                }),
            },
            _ => {}
        }
    }

    Some(ModuleExports {
        entries,
        imports: info
            .imports
            .into_iter()
            .flat_map(|import| import.bindings)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexport_forms() {
        let exports = analyze_exports(
            r#"
export { default as Button } from './button/button.vue'
export { Card } from './card'
import Dialog from './dialog.vue'
export { Dialog }
export * from './more'
export const version = '1'
"#,
            true,
        )
        .unwrap();

        assert_eq!(
            exports.origin("Button"),
            Some(ExportOrigin::Forwarded {
                source: "./button/button.vue",
                name: "default".into()
            })
        );
        assert_eq!(
            exports.origin("Card"),
            Some(ExportOrigin::Forwarded {
                source: "./card",
                name: "Card".into()
            })
        );
        assert_eq!(
            exports.origin("Dialog"),
            Some(ExportOrigin::Forwarded {
                source: "./dialog.vue",
                name: "default".into()
            })
        );
        assert_eq!(exports.origin("version"), Some(ExportOrigin::Defined));
        assert_eq!(exports.origin("Missing"), None);
        assert_eq!(exports.star_sources().collect::<Vec<_>>(), vec!["./more"]);
    }

    #[test]
    fn test_default_identifier_export() {
        let exports =
            analyze_exports("import Impl from './impl.vue'\nexport default Impl\n", false).unwrap();
        assert_eq!(
            exports.origin("default"),
            Some(ExportOrigin::Forwarded {
                source: "./impl.vue",
                name: "default".into()
            })
        );
    }

    #[test]
    fn test_unparsable_module() {
        assert!(analyze_exports("export {", false).is_none());
    }
}
