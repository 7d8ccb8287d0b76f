//! Turns the concrete syntax tree into the typed AST.
//!
//! One visit function per [`SyntaxKind`]. Punctuation and keywords are dropped,
//! spans are kept. Shape problems the grammar cannot rule out (a field without a
//! type, a tag that is not a `u32`, ...) are reported here, except inside nodes
//! where the parser already recovered from a syntax error.

use crate::ast::{
    Declaration, Document, Enum, Field, Import, ImportStatus, Message, Modifier, Resolution,
    TypeRef, Variant,
};
use crate::cst::{SyntaxElement, SyntaxKind, SyntaxNode};
use crate::error::{sort_diagnostics, Diagnostic, ErrorKind};
use crate::lexer::{integer_value, unescape, Span, Token, TokenType};

/// Builds the AST for the document called `name` from its CST.
pub fn build(cst: &SyntaxNode, name: &str) -> (Document, Vec<Diagnostic>) {
    let mut builder = Builder {
        diagnostics: Vec::new(),
    };
    let document = builder.visit_document(cst, name);
    log::debug!(
        "built '{}' with {} declarations and {} structural diagnostics",
        document.name,
        document.declarations.len(),
        builder.diagnostics.len()
    );
    let mut diagnostics = builder.diagnostics;
    sort_diagnostics(&mut diagnostics);
    (document, diagnostics)
}

struct Builder {
    diagnostics: Vec<Diagnostic>,
}

impl Builder {
    fn report(&mut self, node: &SyntaxNode, kind: ErrorKind, span: Span) {
        if node.has_error() {
            return;
        }
        self.diagnostics.push(Diagnostic::new(kind, span));
    }

    fn visit_document(&mut self, node: &SyntaxNode, name: &str) -> Document {
        let declarations = node
            .nodes()
            .filter_map(|child| match child.kind {
                SyntaxKind::Import => Some(Declaration::Import(self.visit_import(child))),
                SyntaxKind::Message => Some(Declaration::Message(self.visit_message(child))),
                SyntaxKind::Enum => Some(Declaration::Enum(self.visit_enum(child))),
                _ => None,
            })
            .collect();

        Document {
            name: name.to_string(),
            declarations,
            span: node.span,
        }
    }

    fn visit_import(&mut self, node: &SyntaxNode) -> Import {
        let mut target: Vec<&Token> = node
            .tokens()
            .filter(|t| {
                matches!(
                    t.ttype,
                    TokenType::String | TokenType::Identifier | TokenType::Dot
                )
            })
            .collect();
        while target.last().is_some_and(|t| t.ttype == TokenType::Dot) {
            target.pop();
        }
        let recovered = node.has_error() || target.iter().any(|t| t.error.is_some());

        let (name, name_span) = match target.first() {
            Some(token) if token.ttype == TokenType::String => {
                let name = unescape(&token.lexeme);
                if name.trim().is_empty() && token.error.is_none() {
                    self.report(node, ErrorKind::EmptyImportName, token.span);
                }
                (name, token.span)
            }
            Some(first) => {
                let name: String = target.iter().map(|t| t.lexeme.as_str()).collect();
                let span = target
                    .iter()
                    .fold(first.span, |span, t| span.union(&t.span));
                (name, span)
            }
            // The parser has already reported the missing name.
            None => (String::new(), placeholder_after(node, TokenType::Import)),
        };

        Import {
            name,
            name_span,
            status: if recovered {
                ImportStatus::Recovered
            } else {
                ImportStatus::Unchecked
            },
            span: node.span,
        }
    }

    fn visit_message(&mut self, node: &SyntaxNode) -> Message {
        let (name, name_span) = declared_name(node, TokenType::Message);
        let fields = node
            .nodes()
            .filter(|n| n.kind == SyntaxKind::Field)
            .map(|n| self.visit_field(n))
            .collect();

        Message {
            name,
            name_span,
            fields,
            span: node.span,
        }
    }

    fn visit_field(&mut self, node: &SyntaxNode) -> Field {
        let (name, name_span) = declared_name(node, TokenType::Field);

        let mut modifier = None;
        for token in node.tokens().filter(|t| t.ttype.is_modifier()) {
            if modifier.is_some() {
                self.report(
                    node,
                    ErrorKind::ConflictingModifiers {
                        field: name.clone(),
                        modifier: token.lexeme.clone(),
                    },
                    token.span,
                );
                continue;
            }
            modifier = Some(match token.ttype {
                TokenType::Required => Modifier::Required,
                TokenType::Optional => Modifier::Optional,
                _ => Modifier::Repeated,
            });
        }

        let type_node = node.first_node(SyntaxKind::TypeRef);
        let type_ref = match type_node {
            Some(type_node) if !type_node.has_error() => Some(self.visit_type_ref(type_node)),
            Some(_) => None,
            None => {
                self.report(
                    node,
                    ErrorKind::MissingType {
                        field: name.clone(),
                    },
                    name_span,
                );
                None
            }
        };

        let mut tag = None;
        let tag_token = node.token_after(TokenType::Equals);
        if let Some(token) = tag_token {
            tag = integer_value(&token.lexeme).and_then(|v| u32::try_from(v).ok());
            if tag.is_none() && token.error.is_none() {
                self.report(
                    node,
                    ErrorKind::InvalidTag {
                        lexeme: token.lexeme.clone(),
                    },
                    token.span,
                );
            }
        }

        Field {
            name,
            name_span,
            modifier,
            type_ref,
            tag,
            tag_span: tag_token.map(|t| t.span),
            span: node.span,
        }
    }

    fn visit_enum(&mut self, node: &SyntaxNode) -> Enum {
        let (name, name_span) = declared_name(node, TokenType::Enum);
        let variants = node
            .nodes()
            .filter(|n| n.kind == SyntaxKind::Variant)
            .map(|n| self.visit_variant(n))
            .collect();

        Enum {
            name,
            name_span,
            variants,
            span: node.span,
        }
    }

    fn visit_variant(&mut self, node: &SyntaxNode) -> Variant {
        let (name, name_span) = match node.first_token(TokenType::Identifier) {
            Some(token) => (token.lexeme.clone(), token.span),
            None => (String::new(), node.span.empty_at_start()),
        };

        let value_token = node.token_after(TokenType::Equals);
        let value = match value_token {
            Some(token) => {
                let value = integer_value(&token.lexeme).and_then(|v| i64::try_from(v).ok());
                if value.is_none() && token.error.is_none() {
                    self.report(
                        node,
                        ErrorKind::InvalidEnumValue {
                            lexeme: token.lexeme.clone(),
                        },
                        token.span,
                    );
                }
                value
            }
            None => {
                self.report(
                    node,
                    ErrorKind::MissingVariantValue {
                        variant: name.clone(),
                    },
                    name_span,
                );
                None
            }
        };

        Variant {
            name,
            name_span,
            value,
            value_span: value_token.map(|t| t.span),
            span: node.span,
        }
    }

    fn visit_type_ref(&mut self, node: &SyntaxNode) -> TypeRef {
        let raw: String = node.tokens().map(|t| t.lexeme.as_str()).collect();
        TypeRef {
            raw,
            resolution: Resolution::Unresolved,
            span: node.span,
        }
    }
}

/// The identifier right after `keyword`, or an empty placeholder name at the
/// position where it was expected.
fn declared_name(node: &SyntaxNode, keyword: TokenType) -> (String, Span) {
    match node.token_after(keyword) {
        Some(token) if token.ttype == TokenType::Identifier => (token.lexeme.clone(), token.span),
        _ => (String::new(), placeholder_after(node, keyword)),
    }
}

/// A zero-width span where the element following `keyword` starts, or at the end
/// of `node` when nothing follows.
fn placeholder_after(node: &SyntaxNode, keyword: TokenType) -> Span {
    let mut elements = node
        .children
        .iter()
        .skip_while(|e| !matches!(e, SyntaxElement::Token(t) if t.ttype == keyword));
    match (elements.next(), elements.next()) {
        (_, Some(next)) => next.span().empty_at_start(),
        (Some(SyntaxElement::Token(keyword)), None) => point_after(keyword),
        _ => node.span.empty_at_start(),
    }
}

fn point_after(token: &Token) -> Span {
    Span::new(
        token.span.end,
        token.span.end,
        token.span.line,
        token.span.column + token.lexeme.chars().count(),
    )
}
