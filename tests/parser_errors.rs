// Parser error path tests
// Every case must still produce a document; these check what survives and what is reported.

use mspec_core::analyze;
use mspec_core::ast::{Document, ImportStatus};
use mspec_core::cst::SyntaxKind;
use mspec_core::parser::parse;
use mspec_core::{tokenize, Imports};

fn codes(source: &str) -> Vec<String> {
    analyze(source, "test.mspec", &Imports::new())
        .diagnostics
        .into_iter()
        .map(|d| d.code)
        .collect()
}

fn document(source: &str) -> Document {
    analyze(source, "test.mspec", &Imports::new()).document
}

fn message_names(document: &Document) -> Vec<&str> {
    document.messages().map(|m| m.name.as_str()).collect()
}

#[test]
fn test_parser_error_missing_closing_brace() {
    assert_eq!(codes("message M { field f: Int = 1;"), vec!["parser::unexpected_token"]);
}

#[test]
fn test_parser_error_missing_semicolon() {
    let source = "message M { field f: Int = 1 field g: Int = 2; }";
    assert_eq!(codes(source), vec!["parser::unexpected_token"]);
    // Recovery stops at the next `field`, so `g` survives.
    let document = document(source);
    let message = document.messages().next().unwrap();
    let fields: Vec<&str> = message.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["f", "g"]);
}

#[test]
fn test_parser_error_missing_colon() {
    assert_eq!(codes("message M { field f Int = 1; }"), vec!["parser::unexpected_token"]);
}

#[test]
fn test_parser_error_unexpected_eof() {
    assert_eq!(codes("message M { field f:"), vec!["parser::unexpected_token"]);
}

#[test]
fn test_parser_error_missing_field_name() {
    let codes = codes("message M { field : Int = 1; }");
    assert_eq!(codes, vec!["parser::missing_name"]);
}

#[test]
fn test_parser_error_missing_enum_value() {
    assert_eq!(codes("enum E { A = ; }"), vec!["parser::unexpected_token"]);
}

#[test]
fn test_parser_error_modifier_without_field() {
    assert_eq!(codes("message M { required ; }"), vec!["parser::unexpected_token"]);
}

#[test]
fn test_parser_error_stray_top_level_tokens() {
    let source = "field f: Int; message M { }";
    assert_eq!(codes(source), vec!["parser::unexpected_token"]);
    assert_eq!(message_names(&document(source)), vec!["M"]);
}

#[test]
fn test_sibling_messages_survive_a_broken_one() {
    let source = r#"
        message First { field a: Int = 1; }
        message Broken { field b: Int = = = ; field c: ; }
        message Last { field d: Int = 1; }
    "#;
    let document = document(source);
    assert_eq!(message_names(&document), vec!["First", "Broken", "Last"]);
    let last = document.messages().last().unwrap();
    assert_eq!(last.fields.len(), 1);
    assert_eq!(last.fields[0].tag, Some(1));
}

#[test]
fn test_one_diagnostic_per_bad_region() {
    // A run of garbage is one region, however many tokens it has.
    assert_eq!(codes("message M { } ] ] ] ] ;"), vec!["parser::unexpected_token"]);
    // Two regions separated by a good declaration are reported separately.
    assert_eq!(
        codes("] ; message M { } ] ;"),
        vec!["parser::unexpected_token", "parser::unexpected_token"]
    );
}

#[test]
fn test_unclosed_enum_before_message() {
    let source = "enum E { A = 1;\nmessage M { field e: E = 1; }";
    assert_eq!(codes(source), vec!["parser::unexpected_token"]);
    let document = document(source);
    assert_eq!(document.enums().count(), 1);
    assert_eq!(message_names(&document), vec!["M"]);
    assert!(document.type_refs().next().unwrap().is_resolved());
}

#[test]
fn test_lexical_errors() {
    assert_eq!(codes("message M { } #"), vec!["lexer::unexpected_character"]);
    assert_eq!(
        codes("import \"abc"),
        vec!["lexer::unterminated_string", "parser::unexpected_token"]
    );
    assert_eq!(codes("enum E { A = 1_; }"), vec!["lexer::malformed_number"]);
    assert_eq!(codes("import \"a\\qb\";"), vec!["lexer::invalid_escape"]);
    assert_eq!(codes("message M { } /* open"), vec!["lexer::unterminated_comment"]);
}

#[test]
fn test_error_nodes_keep_skipped_tokens() {
    let (cst, diagnostics) = parse(tokenize("message M { } oops ; enum E { }"));
    assert_eq!(diagnostics.len(), 1);
    let error = cst.first_node(SyntaxKind::Error).unwrap();
    let skipped: Vec<&str> = error.tokens().map(|t| t.lexeme.as_str()).collect();
    assert_eq!(skipped, vec!["oops", ";"]);
}

#[test]
fn test_keywords_are_not_names() {
    // The second keyword starts a new declaration, which is nameless too.
    assert_eq!(
        codes("message message { }"),
        vec!["parser::missing_name", "parser::missing_name"]
    );
    assert_eq!(document("message message { }").messages().count(), 2);
}

#[test]
fn test_broken_import_is_reported_once() {
    assert_eq!(codes("import a.;"), vec!["parser::unexpected_token"]);
    assert_eq!(
        codes("import \"abc\nmessage M { }"),
        vec!["lexer::unterminated_string", "parser::unexpected_token"]
    );
    let document = document("import a.;\nmessage M { }");
    let import = document.imports().next().unwrap();
    assert_eq!(import.name, "a");
    assert_eq!(import.status, ImportStatus::Recovered);
}
