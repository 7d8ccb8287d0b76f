// Properties that must hold for any input, checked over deterministic noise.

use mspec_core::ast::Node;
use mspec_core::{analyze, Analyzer, Imports};

const FRAGMENTS: &[&str] = &[
    "message", "enum", "field", "import", "required", "optional", "repeated", "{", "}", ";", ":",
    "=", ".", "A", "b", "Int", "42", "0x1F", "-", "\"s\"", "@", "#", " ", "\n", "//c\n", "é",
    "/*", "*/",
];

/// A tiny linear congruential generator; the tests must not depend on a seed source.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as usize
    }
}

fn noise(seed: u64, fragments: &[&str]) -> String {
    let mut rng = Lcg(seed);
    let count = rng.next() % 40;
    (0..count)
        .map(|_| fragments[rng.next() % fragments.len()])
        .collect()
}

fn samples() -> impl Iterator<Item = String> {
    std::iter::once(String::new()).chain((0..300).map(|seed| noise(seed, FRAGMENTS)))
}

#[test]
fn test_analysis_is_total() {
    for source in samples() {
        let result = analyze(&source, "noise.mspec", &Imports::new());
        for diagnostic in &result.diagnostics {
            assert!(
                diagnostic.span.start <= diagnostic.span.end && diagnostic.span.end <= source.len(),
                "diagnostic outside of {source:?}: {diagnostic:#?}"
            );
        }
        assert!(result.to_json().is_ok());
    }
}

#[test]
fn test_children_nest_inside_parents_in_order() {
    for source in samples() {
        let result = analyze(&source, "noise.mspec", &Imports::new());
        for node in result.document.walk() {
            let parent = node.span();
            let children = node.children();
            for child in &children {
                let span = child.span();
                assert!(
                    parent.start <= span.start && span.end <= parent.end,
                    "{span:?} escapes {parent:?} in {source:?}"
                );
            }
            for pair in children.windows(2) {
                assert!(
                    pair[0].span().end <= pair[1].span().start,
                    "siblings out of order in {source:?}"
                );
            }
        }
    }
}

#[test]
fn test_diagnostics_are_sorted() {
    for source in samples() {
        let result = analyze(&source, "noise.mspec", &Imports::new());
        for pair in result.diagnostics.windows(2) {
            let a = (pair[0].span.start, pair[0].span.end);
            let b = (pair[1].span.start, pair[1].span.end);
            assert!(a <= b, "unsorted diagnostics for {source:?}");
        }
    }
}

#[test]
fn test_analysis_is_deterministic() {
    let lib = analyze("message L { }\nenum K { A = 1; }", "lib", &Imports::new()).document;
    let imports = Imports::new().with("lib", lib);
    let analyzer = Analyzer::default();

    for seed in 0..100 {
        let source = format!("import lib;\n{}\nmessage Z {{ field l: L = 1; }}", noise(seed, FRAGMENTS));
        let first = analyzer.analyze(&source, "noise.mspec", &imports);
        let second = analyzer.clone().analyze(&source, "noise.mspec", &imports);
        assert_eq!(first.document, second.document);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.symbols, second.symbols);
    }
}

#[test]
fn test_errors_stay_local() {
    // Block comment delimiters could swallow the tail, which is not a recovery failure.
    let fragments: Vec<&str> = FRAGMENTS
        .iter()
        .copied()
        .filter(|f| !f.contains('*'))
        .collect();

    for seed in 0..300 {
        let prefix = format!("{}\n", noise(seed, &fragments));
        let tail_start = prefix.len();
        let source = format!("{prefix}message Tail {{ field t: Int = 1; }}");
        let result = analyze(&source, "noise.mspec", &Imports::new());

        let tail = result
            .document
            .messages()
            .find(|m| m.name == "Tail")
            .unwrap_or_else(|| panic!("Tail lost after {prefix:?}"));
        assert_eq!(tail.fields.len(), 1, "after {prefix:?}");
        assert_eq!(tail.fields[0].name, "t");
        assert_eq!(tail.fields[0].tag, Some(1));
        assert!(tail.fields[0].type_ref.as_ref().is_some_and(|t| t.is_resolved()));

        // An unclosed body before the tail is reported at its keyword, never inside it.
        assert!(
            result
                .diagnostics
                .iter()
                .all(|d| d.span.start <= tail_start),
            "diagnostics leaked into the tail after {prefix:?}: {:#?}",
            result.diagnostics
        );
    }
}

#[test]
fn test_walk_visits_every_type_ref() {
    for source in samples() {
        let result = analyze(&source, "noise.mspec", &Imports::new());
        let walked = result
            .document
            .walk()
            .into_iter()
            .filter(|n| matches!(n, Node::TypeRef(_)))
            .count();
        assert_eq!(walked, result.document.type_refs().count());
    }
}
