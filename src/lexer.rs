use crate::error::ErrorKind;
use miette::SourceSpan;
use serde::Serialize;

/// A region of source text. Offsets are bytes, `line` and `column` are 1-based and
/// describe `start` (columns count characters, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    /// A zero-width span sitting at the start of `self`.
    pub fn empty_at_start(&self) -> Span {
        Span::new(self.start, self.start, self.line, self.column)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// The smallest span covering both. Line and column follow whichever starts first.
    pub fn union(&self, other: &Span) -> Span {
        let first = if other.start < self.start { other } else { self };
        Span::new(
            first.start,
            self.end.max(other.end),
            first.line,
            first.column,
        )
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.len()).into()
    }
}

/// Represents the different kinds of tokens that the lexer can produce.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize)]
pub enum TokenType {
    // == Special Tokens ==
    /// End of input. Always the last token of a stream.
    Eof,
    /// One or more whitespace characters.
    Whitespace,
    /// A `// line` or `/* block */` comment.
    Comment,
    /// Input the lexer could not make sense of: a stray character or an unterminated block comment.
    Error,

    // == Literals ==
    Identifier,
    /// Decimal or `0x` hexadecimal integer, optionally negative.
    Integer,
    Float,
    /// A double quoted string. The lexeme keeps the quotes and escapes as written.
    String,

    // == Keywords ==
    Message,
    Enum,
    Import,
    Field,
    Required,
    Optional,
    Repeated,

    // == Punctuation ==
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Equals,
}

/// Coarse token classes a host can map onto its highlighting scheme.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Comment,
    String,
    Number,
    Operator,
    Bracket,
    Whitespace,
    Unknown,
}

impl TokenType {
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenType::Whitespace | TokenType::Comment)
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenType::Required | TokenType::Optional | TokenType::Repeated
        )
    }

    /// Keywords that can only start a top-level declaration.
    pub fn is_declaration_keyword(self) -> bool {
        matches!(self, TokenType::Message | TokenType::Enum | TokenType::Import)
    }

    pub fn keyword(ident: &str) -> Option<TokenType> {
        match ident {
            "message" => Some(TokenType::Message),
            "enum" => Some(TokenType::Enum),
            "import" => Some(TokenType::Import),
            "field" => Some(TokenType::Field),
            "required" => Some(TokenType::Required),
            "optional" => Some(TokenType::Optional),
            "repeated" => Some(TokenType::Repeated),
            _ => None,
        }
    }

    /// Human readable name used in parser messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenType::Eof => "end of file",
            TokenType::Whitespace => "whitespace",
            TokenType::Comment => "comment",
            TokenType::Error => "invalid input",
            TokenType::Identifier => "identifier",
            TokenType::Integer => "integer",
            TokenType::Float => "number",
            TokenType::String => "string",
            TokenType::Message => "'message'",
            TokenType::Enum => "'enum'",
            TokenType::Import => "'import'",
            TokenType::Field => "'field'",
            TokenType::Required => "'required'",
            TokenType::Optional => "'optional'",
            TokenType::Repeated => "'repeated'",
            TokenType::LBrace => "'{'",
            TokenType::RBrace => "'}'",
            TokenType::LBracket => "'['",
            TokenType::RBracket => "']'",
            TokenType::LParen => "'('",
            TokenType::RParen => "')'",
            TokenType::Colon => "':'",
            TokenType::Semicolon => "';'",
            TokenType::Comma => "','",
            TokenType::Dot => "'.'",
            TokenType::Equals => "'='",
        }
    }

    pub fn category(self) -> TokenCategory {
        match self {
            TokenType::Eof | TokenType::Error => TokenCategory::Unknown,
            TokenType::Whitespace => TokenCategory::Whitespace,
            TokenType::Comment => TokenCategory::Comment,
            TokenType::Identifier => TokenCategory::Identifier,
            TokenType::Integer | TokenType::Float => TokenCategory::Number,
            TokenType::String => TokenCategory::String,
            TokenType::Message
            | TokenType::Enum
            | TokenType::Import
            | TokenType::Field
            | TokenType::Required
            | TokenType::Optional
            | TokenType::Repeated => TokenCategory::Keyword,
            TokenType::LBrace
            | TokenType::RBrace
            | TokenType::LBracket
            | TokenType::RBracket
            | TokenType::LParen
            | TokenType::RParen => TokenCategory::Bracket,
            TokenType::Colon
            | TokenType::Semicolon
            | TokenType::Comma
            | TokenType::Dot
            | TokenType::Equals => TokenCategory::Operator,
        }
    }
}

/// A token with its type, text and position. A token whose text is malformed still
/// carries a best-effort lexeme; the problem rides along in `error` until the parser
/// surfaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub ttype: TokenType,
    pub lexeme: String,
    pub span: Span,
    #[serde(skip)]
    pub error: Option<ErrorKind>,
}

impl Token {
    pub fn new(ttype: TokenType, lexeme: impl Into<String>, span: Span) -> Token {
        Token {
            ttype,
            lexeme: lexeme.into(),
            span,
            error: None,
        }
    }

    pub fn category(&self) -> TokenCategory {
        self.ttype.category()
    }
}

/// Lazily turns source text into tokens. Iterating yields every token including
/// whitespace and comments, ending with exactly one `Eof`.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            position: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.ttype == TokenType::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;
        let (line, column) = (self.line, self.column);

        let (ttype, error) = if let Some(char) = self.advance() {
            match char {
                '{' => (TokenType::LBrace, None),
                '}' => (TokenType::RBrace, None),
                '[' => (TokenType::LBracket, None),
                ']' => (TokenType::RBracket, None),
                '(' => (TokenType::LParen, None),
                ')' => (TokenType::RParen, None),
                ':' => (TokenType::Colon, None),
                ';' => (TokenType::Semicolon, None),
                ',' => (TokenType::Comma, None),
                '.' => (TokenType::Dot, None),
                '=' => (TokenType::Equals, None),

                '/' => match self.peek() {
                    Some('/') => self.read_line_comment(),
                    Some('*') => self.read_block_comment(),
                    _ => (
                        TokenType::Error,
                        Some(ErrorKind::UnexpectedCharacter { ch: '/' }),
                    ),
                },
                '"' => self.read_string(),
                c if c.is_whitespace() => self.read_whitespace(),
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(start_pos),
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek().is_some_and(|c| c.is_ascii_digit())) =>
                {
                    self.read_number(start_pos)
                }

                c => (
                    TokenType::Error,
                    Some(ErrorKind::UnexpectedCharacter { ch: c }),
                ),
            }
        } else {
            self.finished = true;
            (TokenType::Eof, None)
        };

        Token {
            ttype,
            lexeme: self.input[start_pos..self.position].to_string(),
            span: Span::new(start_pos, self.position, line, column),
            error,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn read_whitespace(&mut self) -> (TokenType, Option<ErrorKind>) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
        (TokenType::Whitespace, None)
    }

    fn read_line_comment(&mut self) -> (TokenType, Option<ErrorKind>) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
        (TokenType::Comment, None)
    }

    fn read_block_comment(&mut self) -> (TokenType, Option<ErrorKind>) {
        self.advance(); // Consume the '*'
        while let Some(c) = self.advance() {
            if c == '*' && self.peek() == Some('/') {
                self.advance();
                return (TokenType::Comment, None);
            }
        }
        // Unterminated comments swallow the rest of the input; keep them visible to the parser.
        (TokenType::Error, Some(ErrorKind::UnterminatedComment))
    }

    fn read_string(&mut self) -> (TokenType, Option<ErrorKind>) {
        let mut error = None;
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.advance(); // Consume the closing quote
                    return (TokenType::String, error);
                }
                '\n' => break,
                '\\' => {
                    self.advance(); // Consume the backslash
                    let escape_error = match self.peek() {
                        Some('"' | '\\' | 'n' | 'r' | 't' | '0' | '\'') => {
                            self.advance();
                            None
                        }
                        Some('u') => {
                            self.advance();
                            self.read_unicode_escape()
                        }
                        Some('\n') | None => Some(ErrorKind::InvalidEscape {
                            escape: "\\".to_string(),
                        }),
                        Some(other) => {
                            self.advance();
                            Some(ErrorKind::InvalidEscape {
                                escape: format!("\\{other}"),
                            })
                        }
                    };
                    // Only the first problem in a literal is reported.
                    if error.is_none() {
                        error = escape_error;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        (TokenType::String, Some(ErrorKind::UnterminatedString))
    }

    /// Reads the `{XXXX}` part of a `\u{XXXX}` escape, the `\u` already consumed.
    fn read_unicode_escape(&mut self) -> Option<ErrorKind> {
        let mut escape = String::from("\\u");
        if self.peek() != Some('{') {
            return Some(ErrorKind::InvalidEscape { escape });
        }
        escape.push('{');
        self.advance();
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_hexdigit() {
                digits.push(c);
                escape.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() != Some('}') {
            return Some(ErrorKind::InvalidEscape { escape });
        }
        self.advance();
        escape.push('}');
        let valid = !digits.is_empty()
            && digits.len() <= 6
            && u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .is_some();
        if valid {
            None
        } else {
            Some(ErrorKind::InvalidEscape { escape })
        }
    }

    fn read_identifier(&mut self, start_pos: usize) -> (TokenType, Option<ErrorKind>) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let ident = &self.input[start_pos..self.position];
        (
            TokenType::keyword(ident).unwrap_or(TokenType::Identifier),
            None,
        )
    }

    fn read_number(&mut self, start_pos: usize) -> (TokenType, Option<ErrorKind>) {
        let mut has_dot = false;
        let mut is_hex = false;

        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                    let prev = self.input[start_pos..self.position].chars().last();
                    self.advance();
                    if (c == 'x' || c == 'X') && matches!(prev, Some('0')) {
                        is_hex = true;
                    }
                    // Optional sign after an exponent marker
                    if !is_hex && (c == 'e' || c == 'E') {
                        if let Some('+' | '-') = self.peek() {
                            self.advance();
                        }
                    }
                }
                Some('.') if !has_dot && !is_hex => {
                    has_dot = true;
                    self.advance();
                }
                _ => break,
            }
        }

        let lexeme = &self.input[start_pos..self.position];
        match classify_number(lexeme) {
            Some(ttype) => (ttype, None),
            None => {
                let ttype = if has_dot {
                    TokenType::Float
                } else {
                    TokenType::Integer
                };
                (
                    ttype,
                    Some(ErrorKind::MalformedNumber {
                        lexeme: lexeme.to_string(),
                    }),
                )
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            None
        } else {
            Some(self.next_token())
        }
    }
}

/// Digits separated by single underscores, never leading or trailing.
fn is_grouped_digits(digits: &str, radix: u32) -> bool {
    !digits.is_empty()
        && !digits.starts_with('_')
        && !digits.ends_with('_')
        && !digits.contains("__")
        && digits.chars().all(|c| c == '_' || c.is_digit(radix))
}

fn classify_number(lexeme: &str) -> Option<TokenType> {
    let unsigned = lexeme.strip_prefix('-').unwrap_or(lexeme);
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        return is_grouped_digits(hex, 16).then_some(TokenType::Integer);
    }

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(index) => (&unsigned[..index], Some(&unsigned[index + 1..])),
        None => (unsigned, None),
    };
    let (integral, fraction) = match mantissa.split_once('.') {
        Some((integral, fraction)) => (integral, Some(fraction)),
        None => (mantissa, None),
    };

    if !is_grouped_digits(integral, 10) {
        return None;
    }
    if let Some(fraction) = fraction {
        if !is_grouped_digits(fraction, 10) {
            return None;
        }
    }
    if let Some(exponent) = exponent {
        let digits = exponent
            .strip_prefix(['+', '-'])
            .unwrap_or(exponent);
        if !is_grouped_digits(digits, 10) {
            return None;
        }
    }

    if fraction.is_some() || exponent.is_some() {
        Some(TokenType::Float)
    } else {
        Some(TokenType::Integer)
    }
}

/// Value of an integer lexeme (`-12`, `1_000`, `0xFF`). `None` for anything that is not a
/// well-formed integer or does not fit in an `i128`.
pub fn integer_value(lexeme: &str) -> Option<i128> {
    if classify_number(lexeme) != Some(TokenType::Integer) {
        return None;
    }
    let (negative, unsigned) = match lexeme.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexeme),
    };
    let digits: String = unsigned.chars().filter(|c| *c != '_').collect();
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Decodes the contents of a string lexeme. Malformed escapes are kept as written so the
/// result is always usable.
pub fn unescape(lexeme: &str) -> String {
    let inner = lexeme.strip_prefix('"').unwrap_or(lexeme);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut value = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => value.push('"'),
            Some('\\') => value.push('\\'),
            Some('\'') => value.push('\''),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some('0') => value.push('\0'),
            Some('u') if chars.peek() == Some(&'{') => {
                chars.next();
                let digits: String = chars.by_ref().take_while(|c| *c != '}').collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => value.push(decoded),
                    None => {
                        value.push_str("\\u{");
                        value.push_str(&digits);
                        value.push('}');
                    }
                }
            }
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }
    value
}

/// The parser-facing token stream: every token except whitespace and comments,
/// terminated by `Eof`.
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer::new(text).filter(|t| !t.ttype.is_trivia()).collect()
}

/// Like [`tokenize`] but keeps whitespace and comments, so the concatenated lexemes
/// reproduce the input exactly.
pub fn tokenize_with_trivia(text: &str) -> Vec<Token> {
    Lexer::new(text).lex()
}
