//! Semantic checks over a resolved document.
//!
//! Every check is a pure function of the resolved document and the language
//! configuration. The checks do not see each other's output, so their order only
//! matters for how equal-span diagnostics are listed.

use crate::ast::{DeclKind, Declaration, Document, Enum, ImportStatus, Message, Resolution};
use crate::config::LanguageConfig;
use crate::error::{sort_diagnostics, Diagnostic, ErrorKind};
use crate::lexer::Span;
use crate::resolver::ResolvedDocument;
use std::collections::{BTreeMap, HashMap, HashSet};

type Check = fn(&ResolvedDocument, &LanguageConfig) -> Vec<Diagnostic>;

/// The checks `validate` runs, in order.
pub const CHECKS: &[(&str, Check)] = &[
    ("duplicate_declarations", duplicate_declarations),
    ("duplicate_field_names", duplicate_field_names),
    ("duplicate_field_tags", duplicate_field_tags),
    ("duplicate_variant_names", duplicate_variant_names),
    ("duplicate_enum_values", duplicate_enum_values),
    ("reserved_identifiers", reserved_identifiers),
    ("circular_types", circular_types),
    ("imports", imports),
];

/// Runs every check and returns their findings sorted by span.
pub fn validate(resolved: &ResolvedDocument, config: &LanguageConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (name, check) in CHECKS {
        let found = check(resolved, config);
        log::trace!("check '{}' found {} problems", name, found.len());
        diagnostics.extend(found);
    }
    log::debug!(
        "validated '{}': {} diagnostics",
        resolved.document.name,
        diagnostics.len()
    );
    sort_diagnostics(&mut diagnostics);
    diagnostics
}

/// Reports every repeat of a name after its first occurrence. Empty names come from
/// recovered syntax errors and are skipped.
fn repeated_names<'a>(names: impl Iterator<Item = (&'a str, Span)>) -> Vec<(&'a str, Span)> {
    let mut seen = HashSet::new();
    names
        .filter(|(name, _)| !name.is_empty())
        .filter(|(name, _)| !seen.insert(*name))
        .collect()
}

pub fn duplicate_declarations(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    let document = &resolved.document;
    let types = document
        .declarations
        .iter()
        .filter(|d| d.kind().is_some())
        .map(|d| (d.name(), d.name_span()));
    let mut diagnostics: Vec<Diagnostic> = repeated_names(types)
        .into_iter()
        .map(|(name, span)| {
            Diagnostic::new(
                ErrorKind::DuplicateDeclaration {
                    name: name.to_string(),
                },
                span,
            )
        })
        .collect();

    let imports = document.imports().map(|i| (i.name.as_str(), i.name_span));
    diagnostics.extend(repeated_names(imports).into_iter().map(|(name, span)| {
        Diagnostic::new(
            ErrorKind::DuplicateImport {
                name: name.to_string(),
            },
            span,
        )
    }));
    diagnostics
}

pub fn duplicate_field_names(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    resolved
        .document
        .messages()
        .flat_map(|message| {
            let fields = message.fields.iter().map(|f| (f.name.as_str(), f.name_span));
            repeated_names(fields).into_iter().map(move |(field, span)| {
                Diagnostic::new(
                    ErrorKind::DuplicateFieldName {
                        message: message.name.clone(),
                        field: field.to_string(),
                    },
                    span,
                )
            })
        })
        .collect()
}

pub fn duplicate_field_tags(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for message in resolved.document.messages() {
        let mut first_use: HashMap<u32, &str> = HashMap::new();
        for field in &message.fields {
            let Some(tag) = field.tag else {
                continue;
            };
            match first_use.get(&tag) {
                Some(first) => diagnostics.push(Diagnostic::new(
                    ErrorKind::DuplicateFieldTag {
                        message: message.name.clone(),
                        tag,
                        first: first.to_string(),
                    },
                    field.span,
                )),
                None => {
                    first_use.insert(tag, &field.name);
                }
            }
        }
    }
    diagnostics
}

pub fn duplicate_variant_names(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    resolved
        .document
        .enums()
        .flat_map(|enum_def| {
            let variants = enum_def
                .variants
                .iter()
                .map(|v| (v.name.as_str(), v.name_span));
            repeated_names(variants).into_iter().map(move |(variant, span)| {
                Diagnostic::new(
                    ErrorKind::DuplicateVariantName {
                        enum_name: enum_def.name.clone(),
                        variant: variant.to_string(),
                    },
                    span,
                )
            })
        })
        .collect()
}

pub fn duplicate_enum_values(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    resolved
        .document
        .enums()
        .flat_map(duplicate_values_in)
        .collect()
}

fn duplicate_values_in(enum_def: &Enum) -> Vec<Diagnostic> {
    let mut first_use: HashMap<i64, &str> = HashMap::new();
    let mut diagnostics = Vec::new();
    for variant in &enum_def.variants {
        let (Some(value), Some(value_span)) = (variant.value, variant.value_span) else {
            continue;
        };
        if let Some(first) = first_use.get(&value) {
            diagnostics.push(Diagnostic::new(
                ErrorKind::DuplicateEnumValue {
                    enum_name: enum_def.name.clone(),
                    value,
                    first: first.to_string(),
                },
                value_span,
            ));
        } else {
            first_use.insert(value, &variant.name);
        }
    }
    diagnostics
}

pub fn reserved_identifiers(resolved: &ResolvedDocument, config: &LanguageConfig) -> Vec<Diagnostic> {
    let mut names: Vec<(&str, Span)> = Vec::new();
    for declaration in &resolved.document.declarations {
        if declaration.kind().is_some() {
            let name = declaration.name();
            if config.is_builtin(name) || config.is_reserved(name) {
                names.push((name, declaration.name_span()));
            }
        }
        match declaration {
            Declaration::Import(_) => {}
            Declaration::Message(message) => names.extend(
                message
                    .fields
                    .iter()
                    .map(|f| (f.name.as_str(), f.name_span))
                    .filter(|(name, _)| config.is_reserved(name)),
            ),
            Declaration::Enum(enum_def) => names.extend(
                enum_def
                    .variants
                    .iter()
                    .map(|v| (v.name.as_str(), v.name_span))
                    .filter(|(name, _)| config.is_reserved(name)),
            ),
        }
    }

    names
        .into_iter()
        .map(|(name, span)| {
            Diagnostic::new(
                ErrorKind::ReservedIdentifier {
                    name: name.to_string(),
                },
                span,
            )
        })
        .collect()
}

/// Flags fields that make a message contain itself.
///
/// Only fields without a modifier or marked `required` count: an optional or
/// repeated field may be empty, which ends the recursion. Every such field lying
/// on a cycle is reported at its type reference.
pub fn circular_types(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    let document = &resolved.document;

    // message index -> messages it must contain, each with the field that does so
    let mut edges: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    for (index, declaration) in document.declarations.iter().enumerate() {
        if let Declaration::Message(message) = declaration {
            edges.insert(index, direct_containment(document, message));
        }
    }

    let mut diagnostics = Vec::new();
    for (&from, targets) in &edges {
        let Some(Declaration::Message(message)) = document.declarations.get(from) else {
            continue;
        };
        for &(to, field_index) in targets {
            if !reaches(&edges, to, from) {
                continue;
            }
            let field = &message.fields[field_index];
            let span = field.type_ref.as_ref().map_or(field.span, |t| t.span);
            diagnostics.push(Diagnostic::new(
                ErrorKind::CircularType {
                    message: message.name.clone(),
                    field: field.name.clone(),
                },
                span,
            ));
        }
    }
    diagnostics
}

/// `(target message index, field index)` for every field of `message` that holds a
/// local message by value.
fn direct_containment(document: &Document, message: &Message) -> Vec<(usize, usize)> {
    message
        .fields
        .iter()
        .enumerate()
        .filter(|(_, field)| !field.modifier.is_some_and(|m| m.is_indirect()))
        .filter_map(|(field_index, field)| match &field.type_ref.as_ref()?.resolution {
            Resolution::Declaration(id)
                if id.kind == DeclKind::Message && id.document == document.name =>
            {
                Some((id.index, field_index))
            }
            _ => None,
        })
        .collect()
}

fn reaches(edges: &BTreeMap<usize, Vec<(usize, usize)>>, start: usize, goal: usize) -> bool {
    let mut stack = vec![start];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == goal {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(targets) = edges.get(&node) {
            stack.extend(targets.iter().map(|(to, _)| *to));
        }
    }
    false
}

pub fn imports(resolved: &ResolvedDocument, _: &LanguageConfig) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();
    for import in resolved.document.imports() {
        if import.name.is_empty()
            || import.status == ImportStatus::Recovered
            || !seen.insert(import.name.as_str())
        {
            continue;
        }
        let kind = match import.status {
            ImportStatus::Missing => ErrorKind::UnknownImport {
                name: import.name.clone(),
            },
            ImportStatus::Found { used: false } => ErrorKind::UnusedImport {
                name: import.name.clone(),
            },
            ImportStatus::Found { used: true } | ImportStatus::Unchecked | ImportStatus::Recovered => {
                continue
            }
        };
        diagnostics.push(Diagnostic::new(kind, import.name_span));
    }
    diagnostics
}
