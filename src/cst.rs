//! Concrete syntax tree produced by the parser.
//!
//! Nodes keep every significant token in source order (whitespace and comments are
//! not part of the tree). Input skipped during error recovery is kept under
//! [`SyntaxKind::Error`] nodes so it can still be highlighted, but no later stage
//! reads meaning out of it.

use crate::lexer::{Span, Token, TokenType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyntaxKind {
    Document,
    Import,
    Message,
    Field,
    Enum,
    Variant,
    TypeRef,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(Token),
}

impl SyntaxElement {
    pub fn span(&self) -> Span {
        match self {
            SyntaxElement::Node(node) => node.span,
            SyntaxElement::Token(token) => token.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub children: Vec<SyntaxElement>,
    pub span: Span,
}

impl SyntaxNode {
    /// Builds a node whose span is the union of its children. A node without children
    /// gets the zero-width `fallback` span.
    pub fn new(kind: SyntaxKind, children: Vec<SyntaxElement>, fallback: Span) -> Self {
        let span = children
            .iter()
            .map(SyntaxElement::span)
            .reduce(|acc, span| acc.union(&span))
            .unwrap_or(fallback);
        SyntaxNode {
            kind,
            children,
            span,
        }
    }

    pub fn with_span(kind: SyntaxKind, children: Vec<SyntaxElement>, span: Span) -> Self {
        SyntaxNode {
            kind,
            children,
            span,
        }
    }

    /// Direct child nodes, in source order.
    pub fn nodes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter_map(|child| match child {
            SyntaxElement::Node(node) => Some(node),
            SyntaxElement::Token(_) => None,
        })
    }

    /// Direct child tokens, in source order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.children.iter().filter_map(|child| match child {
            SyntaxElement::Token(token) => Some(token),
            SyntaxElement::Node(_) => None,
        })
    }

    pub fn first_token(&self, ttype: TokenType) -> Option<&Token> {
        self.tokens().find(|t| t.ttype == ttype)
    }

    pub fn first_node(&self, kind: SyntaxKind) -> Option<&SyntaxNode> {
        self.nodes().find(|n| n.kind == kind)
    }

    /// The first direct token after the first direct token of type `after`.
    pub fn token_after(&self, after: TokenType) -> Option<&Token> {
        let mut tokens = self.tokens().skip_while(|t| t.ttype != after);
        tokens.next()?;
        tokens.next()
    }

    /// Whether recovery happened directly inside this node.
    pub fn has_error(&self) -> bool {
        self.nodes().any(|n| n.kind == SyntaxKind::Error)
    }

    /// Every token under this node, depth first, in source order.
    pub fn descendant_tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        collect_tokens(self, &mut tokens);
        tokens
    }
}

fn collect_tokens<'a>(node: &'a SyntaxNode, tokens: &mut Vec<&'a Token>) {
    for child in &node.children {
        match child {
            SyntaxElement::Token(token) => tokens.push(token),
            SyntaxElement::Node(inner) => collect_tokens(inner, tokens),
        }
    }
}
