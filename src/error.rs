use crate::lexer::Span;
use miette::{GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, Report};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// How serious a [`Diagnostic`] is. Nothing in the pipeline is fatal, so this only
/// tells the host how to present the finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl From<Severity> for miette::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        }
    }
}

/// Every problem the front end knows how to report, grouped by the stage that finds it.
#[derive(Error, Debug, miette::Diagnostic, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // == Input ==
    #[error("Source text is not valid UTF-8 (first invalid byte at offset {offset})")]
    #[diagnostic(
        code(input::invalid_encoding),
        help("mspec sources must be UTF-8 encoded.")
    )]
    InvalidEncoding { offset: usize },

    // == Lexical ==
    #[error("Unrecognized character '{ch}'")]
    #[diagnostic(
        code(lexer::unexpected_character),
        help("This character is not part of the mspec language and was ignored.")
    )]
    UnexpectedCharacter { ch: char },

    #[error("Malformed number literal '{lexeme}'")]
    #[diagnostic(
        code(lexer::malformed_number),
        help("Numbers are decimal or `0x` hexadecimal; `_` may only separate two digits.")
    )]
    MalformedNumber { lexeme: String },

    #[error("Invalid escape sequence '{escape}' in string literal")]
    #[diagnostic(
        code(lexer::invalid_escape),
        help("Supported escapes are \\\" \\\\ \\n \\r \\t \\0 \\' and \\u{{XXXX}}.")
    )]
    InvalidEscape { escape: String },

    #[error("Unterminated string literal")]
    #[diagnostic(
        code(lexer::unterminated_string),
        help("Add a closing '\"' before the end of the line.")
    )]
    UnterminatedString,

    #[error("Unterminated block comment")]
    #[diagnostic(
        code(lexer::unterminated_comment),
        help("Block comments must be closed with '*/'.")
    )]
    UnterminatedComment,

    // == Syntactic ==
    #[error("Expected {expected}, found {found}")]
    #[diagnostic(
        code(parser::unexpected_token),
        help("The parser skipped input up to the next ';', '}}' or declaration keyword.")
    )]
    UnexpectedToken { expected: String, found: String },

    #[error("Missing {what}")]
    #[diagnostic(
        code(parser::missing_name),
        help("Declarations need a name directly after their keyword.")
    )]
    MissingName { what: String },

    // == Structural ==
    #[error("Field '{field}' is missing a type")]
    #[diagnostic(
        code(builder::missing_type),
        help("Declare the type after a colon, e.g. `field {field}: Int;`.")
    )]
    MissingType { field: String },

    #[error("Enum variant '{variant}' is missing a value")]
    #[diagnostic(
        code(builder::missing_variant_value),
        help("Give the variant an explicit value, e.g. `{variant} = 0;`.")
    )]
    MissingVariantValue { variant: String },

    #[error("Invalid field tag '{lexeme}'")]
    #[diagnostic(
        code(builder::invalid_tag),
        help("Field tags are non-negative integers that fit in 32 bits.")
    )]
    InvalidTag { lexeme: String },

    #[error("Invalid enum value '{lexeme}'")]
    #[diagnostic(
        code(builder::invalid_enum_value),
        help("Enum values are integers that fit in 64 bits.")
    )]
    InvalidEnumValue { lexeme: String },

    #[error("Conflicting modifier '{modifier}' on field '{field}'")]
    #[diagnostic(
        code(builder::conflicting_modifiers),
        help("A field takes at most one of `required`, `optional` or `repeated`.")
    )]
    ConflictingModifiers { field: String, modifier: String },

    #[error("Import name is empty")]
    #[diagnostic(
        code(builder::empty_import_name),
        help("Name the document to import, e.g. `import common;`.")
    )]
    EmptyImportName,

    // == Semantic ==
    #[error("Unresolved type '{name}'")]
    #[diagnostic(
        code(resolver::unresolved_type),
        help("Declare '{name}' as a message or enum, or import the document that declares it.")
    )]
    UnresolvedType { name: String },

    #[error("Import '{import}' leads back to this document")]
    #[diagnostic(
        code(resolver::import_cycle),
        help("Import graphs should be acyclic; lookups through the cycle are ignored.")
    )]
    ImportCycle { import: String },

    #[error("Duplicate declaration '{name}'")]
    #[diagnostic(
        code(validator::duplicate_declaration),
        help("Message and enum names share one namespace per document.")
    )]
    DuplicateDeclaration { name: String },

    #[error("Duplicate field '{field}' in message '{message}'")]
    #[diagnostic(code(validator::duplicate_field_name))]
    DuplicateFieldName { message: String, field: String },

    #[error("Field tag {tag} in message '{message}' is already used by field '{first}'")]
    #[diagnostic(
        code(validator::duplicate_field_tag),
        help("Every field tag must be unique within its message.")
    )]
    DuplicateFieldTag {
        message: String,
        tag: u32,
        first: String,
    },

    #[error("Duplicate variant '{variant}' in enum '{enum_name}'")]
    #[diagnostic(code(validator::duplicate_variant_name))]
    DuplicateVariantName { enum_name: String, variant: String },

    #[error("Value {value} in enum '{enum_name}' is already used by variant '{first}'")]
    #[diagnostic(
        code(validator::duplicate_enum_value),
        help("Every variant value must be unique within its enum.")
    )]
    DuplicateEnumValue {
        enum_name: String,
        value: i64,
        first: String,
    },

    #[error("'{name}' is a reserved identifier")]
    #[diagnostic(
        code(validator::reserved_identifier),
        help("Pick another name; this one is a builtin type or reserved for future use.")
    )]
    ReservedIdentifier { name: String },

    #[error("Field '{field}' makes message '{message}' contain itself")]
    #[diagnostic(
        code(validator::circular_type),
        help("Break the cycle by marking one field of the cycle `optional` or `repeated`.")
    )]
    CircularType { message: String, field: String },

    #[error("Unknown import '{name}'")]
    #[diagnostic(
        code(validator::unknown_import),
        help("The host did not supply a document for this import.")
    )]
    UnknownImport { name: String },

    #[error("Import '{name}' is never used")]
    #[diagnostic(code(validator::unused_import))]
    UnusedImport { name: String },

    #[error("Document '{name}' is imported more than once")]
    #[diagnostic(code(validator::duplicate_import))]
    DuplicateImport { name: String },
}

impl ErrorKind {
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::ImportCycle { .. }
            | ErrorKind::UnusedImport { .. }
            | ErrorKind::DuplicateImport { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedToken { .. } => "unexpected input starts here",
            ErrorKind::MissingName { .. } => "name expected here",
            ErrorKind::UnresolvedType { .. } => "referenced here",
            ErrorKind::DuplicateDeclaration { .. }
            | ErrorKind::DuplicateFieldName { .. }
            | ErrorKind::DuplicateVariantName { .. }
            | ErrorKind::DuplicateImport { .. } => "declared again here",
            ErrorKind::DuplicateFieldTag { .. } | ErrorKind::DuplicateEnumValue { .. } => {
                "reused here"
            }
            _ => "here",
        }
    }
}

/// A single finding attached to a region of the source text.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable identifier such as `validator::duplicate_field_tag`.
    pub code: String,
    pub message: String,
    pub span: Span,
    #[serde(skip)]
    pub kind: ErrorKind,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let code = miette::Diagnostic::code(&kind)
            .map(|code| code.to_string())
            .unwrap_or_default();
        Diagnostic {
            severity: kind.severity(),
            code,
            message: kind.to_string(),
            span,
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(&self.code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity.into())
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        miette::Diagnostic::help(&self.kind)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.kind.label().to_string()),
            self.span,
        ))))
    }
}

/// Orders diagnostics by position. The sort is stable so findings at the same
/// span keep the order in which their stage produced them.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
}

/// Renders diagnostics against their source the way `miette` reports do, one after the other.
pub fn render_diagnostics(file_name: &str, source: &str, diagnostics: &[Diagnostic]) -> String {
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    let mut buffer = String::new();
    for diagnostic in diagnostics {
        let report = Report::new(diagnostic.clone())
            .with_source_code(NamedSource::new(file_name, source.to_string()));
        if handler.render_report(&mut buffer, &*report).is_err() {
            // plain text fallback
            buffer.push_str(&format!("{}: {}\n", diagnostic.code, diagnostic.message));
        }
    }
    buffer
}
