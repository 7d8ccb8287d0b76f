use crate::ast::{DeclId, DeclKind, Declaration, Document, Node, Resolution};
use crate::lexer::Span;
use crate::resolver::Imports;
use serde::Serialize;

/// A place in some document: the target of "go to definition".
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Location {
    pub document: String,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum SemanticTokenType {
    Message,
    Enum,
    Field,
    Variant,
    Import,
    Type, // For built-in types like Int, String, etc.
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct SemanticToken {
    pub span: Span,
    pub token_type: SemanticTokenType,
}

/// The most specific AST node that contains `offset`.
pub fn find_node_at(document: &Document, offset: usize) -> Option<Node<'_>> {
    // Pre-order visits parents before children, so the last hit is the innermost.
    document
        .walk()
        .into_iter()
        .filter(|node| node.span().contains_offset(offset))
        .last()
}

/// The declaration a cursor at `offset` is about: the one whose name it is on, or
/// the one the type reference under it resolves to.
fn target_at(document: &Document, offset: usize) -> Option<DeclId> {
    match find_node_at(document, offset)? {
        Node::TypeRef(type_ref) => match &type_ref.resolution {
            Resolution::Declaration(id) => Some(id.clone()),
            _ => None,
        },
        Node::Message(message) if message.name_span.contains_offset(offset) => {
            document.find_type(&message.name)
        }
        Node::Enum(enum_def) if enum_def.name_span.contains_offset(offset) => {
            document.find_type(&enum_def.name)
        }
        _ => None,
    }
}

pub fn definition_at(document: &Document, imports: &Imports, offset: usize) -> Option<Location> {
    if let Some(Node::Import(import)) = find_node_at(document, offset) {
        let imported = imports.get(&import.name)?;
        return Some(Location {
            document: imported.name.clone(),
            span: imported.span.empty_at_start(),
        });
    }

    let id = target_at(document, offset)?;
    let declaration = if id.document == document.name {
        document.declaration(&id)?
    } else {
        imports.find_document(&id.document)?.declaration(&id)?
    };
    Some(Location {
        document: id.document,
        span: declaration.name_span(),
    })
}

pub fn references_to(document: &Document, offset: usize) -> Vec<Span> {
    let Some(target) = target_at(document, offset) else {
        return Vec::new();
    };
    document
        .type_refs()
        .filter(|t| t.resolution == Resolution::Declaration(target.clone()))
        .map(|t| t.span)
        .collect()
}

pub fn generate_semantic_tokens(document: &Document) -> Vec<SemanticToken> {
    let mut tokens = Vec::new();
    for node in document.walk() {
        let (span, token_type) = match node {
            Node::Document(_) => continue,
            Node::Import(import) => (import.name_span, SemanticTokenType::Import),
            Node::Message(message) => (message.name_span, SemanticTokenType::Message),
            Node::Field(field) => (field.name_span, SemanticTokenType::Field),
            Node::Enum(enum_def) => (enum_def.name_span, SemanticTokenType::Enum),
            Node::Variant(variant) => (variant.name_span, SemanticTokenType::Variant),
            Node::TypeRef(type_ref) => match &type_ref.resolution {
                Resolution::Builtin => (type_ref.span, SemanticTokenType::Type),
                Resolution::Declaration(id) => match id.kind {
                    DeclKind::Message => (type_ref.span, SemanticTokenType::Message),
                    DeclKind::Enum => (type_ref.span, SemanticTokenType::Enum),
                },
                Resolution::Unresolved => continue,
            },
        };
        // Placeholders for missing names have nothing to highlight.
        if !span.is_empty() {
            tokens.push(SemanticToken { span, token_type });
        }
    }
    tokens
}

/// Names of every message and enum in `document`, for completion lists.
pub fn declared_type_names(document: &Document) -> Vec<&str> {
    document
        .declarations
        .iter()
        .filter(|d| !matches!(d, Declaration::Import(_)) && !d.name().is_empty())
        .map(Declaration::name)
        .collect()
}
