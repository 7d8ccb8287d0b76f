use crate::cst::{SyntaxElement, SyntaxKind, SyntaxNode};
use crate::error::{sort_diagnostics, Diagnostic, ErrorKind};
use crate::lexer::{tokenize, Span, Token, TokenType};

/// Tokens that can open a field declaration.
const FIELD_START: &[TokenType] = &[
    TokenType::Field,
    TokenType::Required,
    TokenType::Optional,
    TokenType::Repeated,
];

/// Where a skipped region may end inside a message body.
const FIELD_RECOVERY: &[TokenType] = &[
    TokenType::RBrace,
    TokenType::Field,
    TokenType::Required,
    TokenType::Optional,
    TokenType::Repeated,
    TokenType::Message,
    TokenType::Enum,
    TokenType::Import,
];

/// Where a skipped region may end inside an enum body.
const VARIANT_RECOVERY: &[TokenType] = &[
    TokenType::RBrace,
    TokenType::Message,
    TokenType::Enum,
    TokenType::Import,
];

/// Where a skipped region may end between declarations.
const DECLARATION_RECOVERY: &[TokenType] =
    &[TokenType::Message, TokenType::Enum, TokenType::Import];

/// A recursive descent parser for mspec, built according to the grammar:
///
/// ```text
/// document    ::= { declaration } EOF
/// declaration ::= import | message | enum
/// import      ::= "import" ( IDENT { "." IDENT } | STRING ) ";"
/// message     ::= "message" IDENT "{" { field } "}"
/// field       ::= { modifier } "field" IDENT [ ":" type_ref ] [ "=" NUMBER ] ";"
/// enum        ::= "enum" IDENT "{" { variant } "}"
/// variant     ::= IDENT [ "=" NUMBER ] ";"
/// type_ref    ::= IDENT { "." IDENT }
/// ```
///
/// The parser never fails. On an unexpected token it reports once, then skips
/// input up to the next synchronization token (panic mode) and carries on.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    diagnostics: Vec<Diagnostic>,
    panicking: bool,
}

impl Parser {
    /// Takes a token stream as produced by [`tokenize`]. Lexical problems carried by the
    /// tokens are reported here; `Error` tokens and trivia never reach the grammar.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut diagnostics = Vec::new();
        let mut significant = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Some(kind) = &token.error {
                diagnostics.push(Diagnostic::new(kind.clone(), token.span));
            }
            if token.ttype.is_trivia() || token.ttype == TokenType::Error {
                continue;
            }
            let is_eof = token.ttype == TokenType::Eof;
            significant.push(token);
            if is_eof {
                break;
            }
        }

        if significant.last().map(|t| t.ttype) != Some(TokenType::Eof) {
            let end = significant
                .last()
                .map(|t| Span::new(t.span.end, t.span.end, t.span.line, t.span.column + t.lexeme.chars().count()))
                .unwrap_or(Span::new(0, 0, 1, 1));
            significant.push(Token::new(TokenType::Eof, "", end));
        }

        Self {
            tokens: significant,
            position: 0,
            diagnostics,
            panicking: false,
        }
    }

    pub fn from_source(source_text: &str) -> Self {
        Self::new(tokenize(source_text))
    }

    // === Main Parsing Methods ===

    /// document ::= { declaration } EOF
    pub fn parse_document(mut self) -> (SyntaxNode, Vec<Diagnostic>) {
        let mut children = Vec::new();
        loop {
            match self.current().ttype {
                TokenType::Eof => {
                    self.bump(&mut children);
                    break;
                }
                TokenType::Import => children.push(SyntaxElement::Node(self.parse_import())),
                TokenType::Message => children.push(SyntaxElement::Node(self.parse_message())),
                TokenType::Enum => children.push(SyntaxElement::Node(self.parse_enum())),
                _ => {
                    self.error_unexpected("a declaration ('message', 'enum' or 'import')");
                    self.recover(&mut children, DECLARATION_RECOVERY);
                }
            }
        }

        let end = children.last().map(|c| c.span().end).unwrap_or(0);
        let document = SyntaxNode::with_span(SyntaxKind::Document, children, Span::new(0, end, 1, 1));

        log::debug!(
            "parsed {} declarations with {} diagnostics",
            document.nodes().filter(|n| n.kind != SyntaxKind::Error).count(),
            self.diagnostics.len()
        );

        let mut diagnostics = self.diagnostics;
        sort_diagnostics(&mut diagnostics);
        (document, diagnostics)
    }

    /// import ::= "import" ( IDENT { "." IDENT } | STRING ) ";"
    fn parse_import(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();
        self.bump(&mut children); // 'import'

        match self.current().ttype {
            TokenType::String => self.bump(&mut children),
            TokenType::Identifier => {
                if !self.parse_dotted_name(&mut children) {
                    self.recover(&mut children, DECLARATION_RECOVERY);
                    return SyntaxNode::new(SyntaxKind::Import, children, fallback);
                }
            }
            _ => self.missing_name("import name"),
        }

        if !self.expect(&mut children, TokenType::Semicolon) {
            self.recover(&mut children, DECLARATION_RECOVERY);
        }
        SyntaxNode::new(SyntaxKind::Import, children, fallback)
    }

    /// message ::= "message" IDENT "{" { field } "}"
    fn parse_message(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();
        self.bump(&mut children); // 'message'
        self.parse_declaration_name(&mut children, "message name");

        if !self.open_body(&mut children, FIELD_START) {
            return SyntaxNode::new(SyntaxKind::Message, children, fallback);
        }

        loop {
            let ttype = self.current().ttype;
            match ttype {
                TokenType::RBrace => {
                    self.bump(&mut children);
                    break;
                }
                TokenType::Field | TokenType::Required | TokenType::Optional | TokenType::Repeated => {
                    children.push(SyntaxElement::Node(self.parse_field()));
                }
                t if t == TokenType::Eof || t.is_declaration_keyword() => {
                    // Unclosed body; the next declaration still parses.
                    self.error_unexpected("'}' to close the message");
                    break;
                }
                _ => {
                    self.error_unexpected("a field declaration or '}'");
                    self.recover(&mut children, FIELD_RECOVERY);
                }
            }
        }
        SyntaxNode::new(SyntaxKind::Message, children, fallback)
    }

    /// field ::= { modifier } "field" IDENT [ ":" type_ref ] [ "=" NUMBER ] ";"
    fn parse_field(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();

        while self.current().ttype.is_modifier() {
            self.bump(&mut children);
        }
        if !self.expect(&mut children, TokenType::Field) {
            self.recover(&mut children, FIELD_RECOVERY);
            return SyntaxNode::new(SyntaxKind::Field, children, fallback);
        }

        self.parse_declaration_name(&mut children, "field name");

        if self.eat(&mut children, TokenType::Colon) {
            if self.check(TokenType::Identifier) {
                children.push(SyntaxElement::Node(self.parse_type_ref()));
            } else {
                self.error_unexpected("a type name");
                self.recover(&mut children, FIELD_RECOVERY);
                return SyntaxNode::new(SyntaxKind::Field, children, fallback);
            }
        }

        if self.eat(&mut children, TokenType::Equals)
            && !self.eat_number(&mut children, "a field tag")
        {
            self.recover(&mut children, FIELD_RECOVERY);
            return SyntaxNode::new(SyntaxKind::Field, children, fallback);
        }

        if !self.expect(&mut children, TokenType::Semicolon) {
            self.recover(&mut children, FIELD_RECOVERY);
        }
        SyntaxNode::new(SyntaxKind::Field, children, fallback)
    }

    /// enum ::= "enum" IDENT "{" { variant } "}"
    fn parse_enum(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();
        self.bump(&mut children); // 'enum'
        self.parse_declaration_name(&mut children, "enum name");

        if !self.open_body(&mut children, &[]) {
            return SyntaxNode::new(SyntaxKind::Enum, children, fallback);
        }

        loop {
            match self.current().ttype {
                TokenType::RBrace => {
                    self.bump(&mut children);
                    break;
                }
                TokenType::Identifier => children.push(SyntaxElement::Node(self.parse_variant())),
                t if t == TokenType::Eof || t.is_declaration_keyword() => {
                    self.error_unexpected("'}' to close the enum");
                    break;
                }
                _ => {
                    self.error_unexpected("an enum variant or '}'");
                    self.recover(&mut children, VARIANT_RECOVERY);
                }
            }
        }
        SyntaxNode::new(SyntaxKind::Enum, children, fallback)
    }

    /// variant ::= IDENT [ "=" NUMBER ] ";"
    fn parse_variant(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();
        self.bump(&mut children); // name

        if self.eat(&mut children, TokenType::Equals) && !self.eat_number(&mut children, "a variant value") {
            self.recover(&mut children, VARIANT_RECOVERY);
            return SyntaxNode::new(SyntaxKind::Variant, children, fallback);
        }

        if !self.expect(&mut children, TokenType::Semicolon) {
            self.recover(&mut children, VARIANT_RECOVERY);
        }
        SyntaxNode::new(SyntaxKind::Variant, children, fallback)
    }

    /// type_ref ::= IDENT { "." IDENT }
    fn parse_type_ref(&mut self) -> SyntaxNode {
        let fallback = self.current().span.empty_at_start();
        let mut children = Vec::new();
        if !self.parse_dotted_name(&mut children) {
            // Keep the broken tail inside the reference so the builder sees it.
            let at = self.current().span.empty_at_start();
            children.push(SyntaxElement::Node(SyntaxNode::new(SyntaxKind::Error, vec![], at)));
        }
        SyntaxNode::new(SyntaxKind::TypeRef, children, fallback)
    }

    // === Grammar Sub-Rules ===

    /// IDENT { "." IDENT }, the current token known to be an identifier.
    fn parse_dotted_name(&mut self, children: &mut Vec<SyntaxElement>) -> bool {
        self.bump(children);
        while self.eat(children, TokenType::Dot) {
            if !self.expect(children, TokenType::Identifier) {
                return false;
            }
        }
        true
    }

    /// A missing name is reported but nothing is skipped, so `message { }` still
    /// yields a message node.
    fn parse_declaration_name(&mut self, children: &mut Vec<SyntaxElement>, what: &str) {
        if self.check(TokenType::Identifier) {
            self.bump(children);
        } else {
            self.missing_name(what);
        }
    }

    /// Consumes the `{` of a body. When it is missing but the body plainly starts
    /// anyway, parsing continues as if it had been written.
    fn open_body(&mut self, children: &mut Vec<SyntaxElement>, body_start: &[TokenType]) -> bool {
        if self.expect(children, TokenType::LBrace) {
            return true;
        }
        let ttype = self.current().ttype;
        if ttype == TokenType::RBrace || body_start.contains(&ttype) {
            return true;
        }
        self.recover(children, DECLARATION_RECOVERY);
        false
    }

    fn eat_number(&mut self, children: &mut Vec<SyntaxElement>, what: &str) -> bool {
        if matches!(self.current().ttype, TokenType::Integer | TokenType::Float) {
            self.bump(children);
            true
        } else {
            self.error_unexpected(what);
            false
        }
    }

    // === Error Recovery ===

    /// Panic mode: skip tokens into an `Error` node until a token in `recovery`, or
    /// through a `;` which ends the broken statement.
    fn recover(&mut self, children: &mut Vec<SyntaxElement>, recovery: &[TokenType]) {
        let fallback = self.current().span.empty_at_start();
        let mut skipped = Vec::new();
        loop {
            let ttype = self.current().ttype;
            if ttype == TokenType::Eof || recovery.contains(&ttype) {
                break;
            }
            skipped.push(SyntaxElement::Token(self.current().clone()));
            self.position += 1;
            if ttype == TokenType::Semicolon {
                self.panicking = false;
                break;
            }
        }
        log::trace!(
            "recovered by skipping {} tokens at offset {}",
            skipped.len(),
            fallback.start
        );
        children.push(SyntaxElement::Node(SyntaxNode::new(
            SyntaxKind::Error,
            skipped,
            fallback,
        )));
    }

    fn report(&mut self, kind: ErrorKind, span: Span) {
        if self.panicking {
            return;
        }
        self.panicking = true;
        self.diagnostics.push(Diagnostic::new(kind, span));
    }

    fn error_unexpected(&mut self, expected: &str) {
        let token = self.current();
        let found = match token.ttype {
            TokenType::Eof => token.ttype.describe().to_string(),
            _ => format!("'{}'", token.lexeme),
        };
        let span = token.span;
        self.report(
            ErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found,
            },
            span,
        );
    }

    fn missing_name(&mut self, what: &str) {
        let span = self.current().span.empty_at_start();
        self.report(
            ErrorKind::MissingName {
                what: what.to_string(),
            },
            span,
        );
    }

    // === Token Helper Methods ===

    fn current(&self) -> &Token {
        // The stream always ends with Eof and the parser never moves past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self, children: &mut Vec<SyntaxElement>) {
        children.push(SyntaxElement::Token(self.current().clone()));
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        self.panicking = false;
    }

    fn check(&self, ttype: TokenType) -> bool {
        self.current().ttype == ttype
    }

    fn eat(&mut self, children: &mut Vec<SyntaxElement>, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.bump(children);
            true
        } else {
            false
        }
    }

    fn expect(&mut self, children: &mut Vec<SyntaxElement>, ttype: TokenType) -> bool {
        if self.eat(children, ttype) {
            true
        } else {
            self.error_unexpected(ttype.describe());
            false
        }
    }
}

/// Parses a token stream into a concrete syntax tree plus syntax diagnostics.
pub fn parse(tokens: Vec<Token>) -> (SyntaxNode, Vec<Diagnostic>) {
    Parser::new(tokens).parse_document()
}
