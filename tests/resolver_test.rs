use mspec_core::ast::{DeclKind, Document, ImportStatus, Resolution};
use mspec_core::config::LanguageConfig;
use mspec_core::resolver::{resolve, Imports};
use mspec_core::{analyze, Analyzer};
use std::sync::Arc;

fn document_ok(source: &str, name: &str, imports: &Imports) -> Document {
    let result = analyze(source, name, imports);
    assert!(
        result.diagnostics.is_empty(),
        "{} should analyze cleanly: {:#?}",
        name,
        result.diagnostics
    );
    result.document
}

fn resolved_documents(document: &Document) -> Vec<String> {
    document
        .type_refs()
        .map(|t| match &t.resolution {
            Resolution::Declaration(id) => id.document.clone(),
            Resolution::Builtin => "<builtin>".to_string(),
            Resolution::Unresolved => "<unresolved>".to_string(),
        })
        .collect()
}

#[test]
fn test_local_declarations_shadow_imports() {
    let shared = document_ok("message Address { field line: String = 1; }", "shared", &Imports::new());
    let imports = Imports::new().with("shared", shared);
    let result = analyze(
        "import shared;\nmessage Address { }\nmessage Person { field home: Address = 1; }",
        "people",
        &imports,
    );
    assert_eq!(resolved_documents(&result.document), vec!["people"]);
    // Nothing resolved through the import, so it is reported as unused.
    let codes: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["validator::unused_import"]);
}

#[test]
fn test_builtins_win_over_everything() {
    let shared = document_ok("message Text { }", "shared", &Imports::new());
    let imports = Imports::new().with("shared", shared);
    let result = analyze("import shared;\nmessage M { field t: String = 1; field u: Text = 2; }", "m", &imports);
    assert_eq!(resolved_documents(&result.document), vec!["<builtin>", "shared"]);
}

#[test]
fn test_qualified_references() {
    let geo = document_ok("message Point { }\nenum Unit { M = 1; }", "geo", &Imports::new());
    let imports = Imports::new().with("geo", geo);
    let document = document_ok(
        "import geo;\nmessage Shape { field origin: geo.Point = 1; field unit: geo.Unit = 2; }",
        "shapes",
        &imports,
    );
    let kinds: Vec<DeclKind> = document
        .type_refs()
        .map(|t| match &t.resolution {
            Resolution::Declaration(id) => id.kind,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(kinds, vec![DeclKind::Message, DeclKind::Enum]);
}

#[test]
fn test_dotted_import_names() {
    let types = document_ok("enum Level { Low = 0; High = 1; }", "common.types", &Imports::new());
    let imports = Imports::new().with("common.types", types);
    let document = document_ok(
        "import common.types;\nmessage Alarm { field level: common.types.Level = 1; field other: Level = 2; }",
        "alarms",
        &imports,
    );
    assert_eq!(resolved_documents(&document), vec!["common.types", "common.types"]);
}

#[test]
fn test_string_import_names() {
    let lib = document_ok("message Thing { }", "lib/things.mspec", &Imports::new());
    let imports = Imports::new().with("lib/things.mspec", lib);
    let document = document_ok(
        "import \"lib/things.mspec\";\nmessage Box { repeated field items: Thing = 1; }",
        "box",
        &imports,
    );
    assert_eq!(resolved_documents(&document), vec!["lib/things.mspec"]);
}

#[test]
fn test_transitive_imports_resolve_depth_first() {
    let base = document_ok("message Id { }", "base", &Imports::new());
    let imports = Imports::new().with("base", base);
    let middle = document_ok("import base;\nmessage Record { field id: Id = 1; }", "middle", &imports);
    let other = document_ok("message Id { }", "other", &Imports::new());
    let imports = imports.with("middle", middle).with("other", other);

    let document = document_ok(
        "import middle;\nimport other;\nmessage Top { field id: Id = 1; field r: Record = 2; field o: other.Id = 3; }",
        "top",
        &imports,
    );
    // `middle` comes first and reaches `base` before `other` is looked at.
    assert_eq!(resolved_documents(&document), vec!["base", "middle", "other"]);
}

#[test]
fn test_missing_import_marks_status_and_reports() {
    let result = analyze("import ghost;\nmessage M { field g: Ghost = 1; }", "m", &Imports::new());
    let import = result.document.imports().next().unwrap();
    assert_eq!(import.status, ImportStatus::Missing);
    let codes: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["validator::unknown_import", "resolver::unresolved_type"]);
}

#[test]
fn test_import_cycles_are_tolerated() {
    // `a` was analyzed before `b` existed; now `b` imports `a` and `a` imports `b`.
    let old_a = analyze("import b;\nmessage FromA { }", "a", &Imports::new()).document;
    let b = analyze("import a;\nmessage FromB { field x: FromA = 1; }", "b", &Imports::new().with("a", old_a)).document;
    let imports = Imports::new().with("b", b);

    let result = analyze("import b;\nmessage FromA { field y: FromB = 1; field z: Missing = 2; }", "a", &imports);
    let codes: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["resolver::import_cycle", "resolver::unresolved_type"]);
    assert_eq!(resolved_documents(&result.document), vec!["b", "<unresolved>"]);
}

#[test]
fn test_self_import_is_a_cycle() {
    let result = analyze("import me;\nmessage M { }", "me", &Imports::new());
    let codes: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["resolver::import_cycle", "validator::unknown_import"]);
}

#[test]
fn test_shared_imports_across_threads() {
    let common = document_ok("message Shared { }", "common", &Imports::new());
    let imports = Arc::new(Imports::new().with("common", common));
    let analyzer = Analyzer::default();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let imports = Arc::clone(&imports);
            let analyzer = analyzer.clone();
            std::thread::spawn(move || {
                let source = format!("import common;\nmessage M{i} {{ field s: Shared = 1; }}");
                analyzer.analyze(&source, &format!("doc{i}"), &imports)
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert!(result.diagnostics.is_empty());
        assert_eq!(resolved_documents(&result.document), vec!["common"]);
    }
}

#[test]
fn test_resolve_with_custom_config() {
    let document = analyze("message M { field id: Uuid = 1; }", "m", &Imports::new()).document;
    let config = LanguageConfig::default().with_builtin("Uuid");
    let (resolved, diagnostics) = resolve(document, &Imports::new(), &config);
    assert!(diagnostics.is_empty());
    assert_eq!(resolved_documents(&resolved.document), vec!["<builtin>"]);
}
