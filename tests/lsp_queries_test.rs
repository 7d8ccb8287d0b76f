#![cfg(feature = "lsp")]

use mspec_core::api::analyze;
use mspec_core::lsp::{declared_type_names, SemanticTokenType};
use mspec_core::{AnalysisResult, Imports};

const SHARED: &str = "message Address { field line: String = 1; }\nenum Country { NL = 1; BE = 2; }";

const PEOPLE: &str = r#"import shared;

message Person {
    field home: Address = 1;
    optional field work: shared.Address = 2;
    field country: Country = 3;
    repeated field friends: Person = 4;
}
"#;

fn shared_imports() -> Imports {
    let shared = analyze(SHARED, "shared", &Imports::new());
    assert!(shared.diagnostics.is_empty(), "{:#?}", shared.diagnostics);
    Imports::new().with("shared", shared.document)
}

fn people(imports: &Imports) -> AnalysisResult {
    let result = analyze(PEOPLE, "people", imports);
    assert!(result.diagnostics.is_empty(), "{:#?}", result.diagnostics);
    result
}

#[test]
fn test_get_definition_across_documents() {
    let imports = shared_imports();
    let result = people(&imports);

    let offset = PEOPLE.find("Address = 1").unwrap() + 2;
    let location = result.definition_at(offset, &imports).unwrap();
    assert_eq!(location.document, "shared");
    assert_eq!(location.span.start, SHARED.find("Address").unwrap());
    assert_eq!(location.span.len(), "Address".len());

    let offset = PEOPLE.find("Country =").unwrap();
    let location = result.definition_at(offset, &imports).unwrap();
    assert_eq!(location.document, "shared");
    assert_eq!(location.span.start, SHARED.find("Country").unwrap());
}

#[test]
fn test_get_definition_of_qualified_type() {
    let imports = shared_imports();
    let result = people(&imports);

    // Anywhere on the dotted name, qualifier included.
    for needle in ["shared.Address", "Address = 2"] {
        let offset = PEOPLE.find(needle).unwrap();
        let location = result.definition_at(offset, &imports).unwrap();
        assert_eq!(location.document, "shared");
        assert_eq!(location.span.start, SHARED.find("Address").unwrap());
    }
}

#[test]
fn test_get_definition_of_import_opens_the_document() {
    let imports = shared_imports();
    let result = people(&imports);

    let offset = PEOPLE.find("shared;").unwrap();
    let location = result.definition_at(offset, &imports).unwrap();
    assert_eq!(location.document, "shared");
    assert_eq!(location.span.start, 0);
    assert!(location.span.is_empty());
}

#[test]
fn test_get_definition_in_same_document() {
    let imports = shared_imports();
    let result = people(&imports);

    let offset = PEOPLE.rfind("Person").unwrap();
    let location = result.definition_at(offset, &imports).unwrap();
    assert_eq!(location.document, "people");
    assert_eq!(location.span.start, PEOPLE.find("Person").unwrap());
}

#[test]
fn test_no_definition_for_builtins_or_whitespace() {
    let imports = shared_imports();
    let result = analyze("message M { field s: String = 1; }", "m", &imports);
    let source = "message M { field s: String = 1; }";

    assert!(result
        .definition_at(source.find("String").unwrap(), &imports)
        .is_none());
    assert!(result.definition_at(0, &imports).is_none());
}

#[test]
fn test_find_references() {
    let source = "enum Kind { A = 1; }\nmessage M {\n    field a: Kind = 1;\n    field b: Kind = 2;\n    field c: Int = 3;\n}";
    let result = analyze(source, "kinds", &Imports::new());

    let first = source.find("Kind = 1").unwrap();
    let second = source.find("Kind = 2").unwrap();

    let from_declaration = result.references_to(source.find("Kind").unwrap());
    let starts: Vec<usize> = from_declaration.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![first, second]);

    let from_usage = result.references_to(second);
    assert_eq!(from_usage, from_declaration);
}

#[test]
fn test_find_references_to_imported_type() {
    let imports = shared_imports();
    let result = people(&imports);

    let references = result.references_to(PEOPLE.find("Address = 1").unwrap());
    let starts: Vec<usize> = references.iter().map(|s| s.start).collect();
    assert_eq!(
        starts,
        vec![
            PEOPLE.find("Address = 1").unwrap(),
            PEOPLE.find("shared.Address").unwrap(),
        ]
    );
}

#[test]
fn test_semantic_tokens() {
    let imports = shared_imports();
    let result = people(&imports);

    let tokens: Vec<(&str, SemanticTokenType)> = result
        .semantic_tokens()
        .into_iter()
        .map(|t| (&PEOPLE[t.span.start..t.span.end], t.token_type))
        .collect();

    assert_eq!(
        tokens,
        vec![
            ("shared", SemanticTokenType::Import),
            ("Person", SemanticTokenType::Message),
            ("home", SemanticTokenType::Field),
            ("Address", SemanticTokenType::Message),
            ("work", SemanticTokenType::Field),
            ("shared.Address", SemanticTokenType::Message),
            ("country", SemanticTokenType::Field),
            ("Country", SemanticTokenType::Enum),
            ("friends", SemanticTokenType::Field),
            ("Person", SemanticTokenType::Message),
        ]
    );
}

#[test]
fn test_queries_work_on_broken_documents() {
    let source = "message M {\n    field a: Kind = = ;\n    field b: Kind = 2;\n}\nenum Kind { A = 1; }";
    let result = analyze(source, "broken", &Imports::new());
    assert!(result.has_errors());

    let location = result
        .definition_at(source.find("Kind = 2").unwrap(), &Imports::new())
        .unwrap();
    assert_eq!(location.span.start, source.rfind("Kind").unwrap());
    assert_eq!(declared_type_names(&result.document), vec!["M", "Kind"]);
}
