pub mod api;
pub mod ast;
pub mod builder;
pub mod config;
pub mod cst;
pub mod error;
pub mod lexer;
#[cfg(feature = "lsp")]
pub mod lsp;
pub mod parser;
pub mod resolver;
pub mod validator;

pub use api::{analyze, analyze_bytes, AnalysisResult, Analyzer};
pub use config::LanguageConfig;
pub use error::{Diagnostic, Severity};
pub use lexer::{tokenize, Token, TokenType};
pub use resolver::Imports;
