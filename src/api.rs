use crate::ast::Document;
use crate::builder::build;
use crate::config::LanguageConfig;
use crate::error::{render_diagnostics, sort_diagnostics, Diagnostic, ErrorKind};
use crate::lexer::{tokenize, Span};
use crate::parser::parse;
use crate::resolver::{resolve, Imports, SymbolTable};
use crate::validator::validate;
use serde::Serialize;
use std::sync::Arc;

#[cfg(feature = "lsp")]
use crate::lsp::{self, Location, SemanticToken};

/// The outcome of analyzing one mspec document.
///
/// Analysis never fails: the document is always there, possibly partial, and
/// every problem found along the way is in `diagnostics`, sorted by position.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub document: Document,
    #[serde(skip)]
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    /// Serializes the document and its diagnostics into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the document and its diagnostics into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Renders every diagnostic against `source` for terminal output.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        render_diagnostics(&self.document.name, source, &self.diagnostics)
    }

    #[cfg(feature = "lsp")]
    /// Where the type referenced (or the document imported) at `offset` is declared.
    /// This is the core of "go to definition".
    #[must_use]
    pub fn definition_at(&self, offset: usize, imports: &Imports) -> Option<Location> {
        lsp::definition_at(&self.document, imports, offset)
    }

    #[cfg(feature = "lsp")]
    /// Every type reference in this document that points at the declaration under
    /// `offset`, which may be the declaration's name or one of its references.
    #[must_use]
    pub fn references_to(&self, offset: usize) -> Vec<Span> {
        lsp::references_to(&self.document, offset)
    }

    #[cfg(feature = "lsp")]
    #[must_use]
    pub fn semantic_tokens(&self) -> Vec<SemanticToken> {
        lsp::generate_semantic_tokens(&self.document)
    }
}

/// Runs the front end with one language configuration.
///
/// Cloning is cheap and clones share the configuration, so a host can hand one
/// analyzer to each worker thread.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Arc<LanguageConfig>,
}

impl Analyzer {
    pub fn new(config: LanguageConfig) -> Self {
        Analyzer {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    /// Lexes, parses, builds, resolves and validates `source`.
    ///
    /// # Arguments
    ///
    /// * `source` - The mspec source code.
    /// * `file_name` - Name of the document, used for declaration identities and reports.
    /// * `imports` - Already analyzed documents, keyed by the names `source` imports them by.
    pub fn analyze(&self, source: &str, file_name: &str, imports: &Imports) -> AnalysisResult {
        let tokens = tokenize(source);
        log::debug!("lexed '{}' into {} tokens", file_name, tokens.len());

        let (cst, mut diagnostics) = parse(tokens);
        let (document, structural) = build(&cst, file_name);
        diagnostics.extend(structural);

        let (resolved, semantic) = resolve(document, imports, &self.config);
        diagnostics.extend(semantic);
        diagnostics.extend(validate(&resolved, &self.config));
        sort_diagnostics(&mut diagnostics);

        log::debug!(
            "analyzed '{}': {} diagnostics ({} errors)",
            file_name,
            diagnostics.len(),
            diagnostics.iter().filter(|d| d.is_error()).count()
        );

        AnalysisResult {
            document: resolved.document,
            symbols: resolved.symbols,
            diagnostics,
        }
    }

    /// Like [`Analyzer::analyze`] for raw bytes. Input that is not UTF-8 is rejected
    /// with a single diagnostic and an empty document.
    pub fn analyze_bytes(&self, bytes: &[u8], file_name: &str, imports: &Imports) -> AnalysisResult {
        match std::str::from_utf8(bytes) {
            Ok(source) => self.analyze(source, file_name, imports),
            Err(error) => {
                let offset = error.valid_up_to();
                let prefix = std::str::from_utf8(&bytes[..offset]).unwrap_or_default();
                let line = prefix.matches('\n').count() + 1;
                let column = prefix
                    .rsplit('\n')
                    .next()
                    .map_or(0, |last| last.chars().count())
                    + 1;
                let end = offset + error.error_len().unwrap_or(bytes.len() - offset);
                log::debug!("rejected '{}': invalid UTF-8 at byte {}", file_name, offset);

                AnalysisResult {
                    document: Document::empty(file_name),
                    symbols: SymbolTable::default(),
                    diagnostics: vec![Diagnostic::new(
                        ErrorKind::InvalidEncoding { offset },
                        Span::new(offset, end, line, column),
                    )],
                }
            }
        }
    }
}

/// Analyzes `source` with the default language configuration.
///
/// This is the primary entry point for processing mspec documents.
pub fn analyze(source: &str, file_name: &str, imports: &Imports) -> AnalysisResult {
    Analyzer::default().analyze(source, file_name, imports)
}

/// Analyzes raw bytes with the default language configuration.
pub fn analyze_bytes(bytes: &[u8], file_name: &str, imports: &Imports) -> AnalysisResult {
    Analyzer::default().analyze_bytes(bytes, file_name, imports)
}
