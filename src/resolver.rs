use crate::ast::{DeclId, Declaration, Document, ImportStatus, Resolution, TypeRef};
use crate::config::LanguageConfig;
use crate::error::{sort_diagnostics, Diagnostic, ErrorKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Documents the host has already analyzed, keyed by the name used in `import`.
///
/// The resolver only reads them, so one set can back many concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Imports {
    documents: BTreeMap<String, Arc<Document>>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        document: impl Into<Arc<Document>>,
    ) -> Option<Arc<Document>> {
        self.documents.insert(name.into(), document.into())
    }

    pub fn with(mut self, name: impl Into<String>, document: impl Into<Arc<Document>>) -> Self {
        self.insert(name, document);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Document>> {
        self.documents.get(name)
    }

    /// The document whose own name is `name`, whatever key it was stored under.
    /// When several keys hold documents of that name, the smallest key wins.
    pub fn find_document(&self, name: &str) -> Option<&Arc<Document>> {
        self.documents
            .get(name)
            .filter(|d| d.name == name)
            .or_else(|| self.documents.values().find(|d| d.name == name))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// The types one document declares, by name. The first declaration of a name wins;
/// later ones are reported by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolTable {
    types: BTreeMap<String, DeclId>,
}

impl SymbolTable {
    pub fn collect(document: &Document) -> Self {
        let mut types = BTreeMap::new();
        for (index, declaration) in document.declarations.iter().enumerate() {
            let Some(kind) = declaration.kind() else {
                continue;
            };
            if declaration.name().is_empty() {
                continue;
            }
            types
                .entry(declaration.name().to_string())
                .or_insert_with(|| DeclId {
                    document: document.name.clone(),
                    index,
                    kind,
                });
        }
        SymbolTable { types }
    }

    pub fn get(&self, name: &str) -> Option<&DeclId> {
        self.types.get(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeclId)> {
        self.types.iter().map(|(name, id)| (name.as_str(), id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A document whose type references and imports have been resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDocument {
    pub document: Document,
    pub symbols: SymbolTable,
}

pub struct Resolver<'a> {
    imports: &'a Imports,
    config: &'a LanguageConfig,
    // Name of the document being resolved; reaching it again through imports is a cycle
    document_name: String,
    symbols: SymbolTable,
    // Import names in declaration order, duplicates dropped
    import_order: Vec<String>,
    // Imports through which at least one reference resolved
    used: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    pub fn new(imports: &'a Imports, config: &'a LanguageConfig) -> Self {
        Resolver {
            imports,
            config,
            document_name: String::new(),
            symbols: SymbolTable::default(),
            import_order: Vec::new(),
            used: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Collects the document's declarations, then resolves every type reference
    /// against them.
    pub fn resolve(mut self, mut document: Document) -> (ResolvedDocument, Vec<Diagnostic>) {
        // 1. Collect
        self.document_name = document.name.clone();
        self.symbols = SymbolTable::collect(&document);
        for import in document.imports() {
            if !import.name.is_empty() && !self.import_order.contains(&import.name) {
                self.import_order.push(import.name.clone());
            }
        }
        self.check_import_cycles(&document);

        // 2. Resolve
        let mut total = 0;
        let mut resolved = 0;
        for declaration in &mut document.declarations {
            let Declaration::Message(message) = declaration else {
                continue;
            };
            for type_ref in message.fields.iter_mut().filter_map(|f| f.type_ref.as_mut()) {
                total += 1;
                type_ref.resolution = self.lookup(type_ref);
                if type_ref.is_resolved() {
                    resolved += 1;
                } else {
                    log::trace!("unresolved type '{}' at {}", type_ref.raw, type_ref.span.start);
                    self.diagnostics.push(Diagnostic::new(
                        ErrorKind::UnresolvedType {
                            name: type_ref.raw.clone(),
                        },
                        type_ref.span,
                    ));
                }
            }
        }

        // 3. Record what happened to each import
        for declaration in &mut document.declarations {
            if let Declaration::Import(import) = declaration {
                if import.status == ImportStatus::Recovered {
                    continue;
                }
                import.status = if self.imports.get(&import.name).is_some() {
                    ImportStatus::Found {
                        used: self.used.contains(&import.name),
                    }
                } else {
                    ImportStatus::Missing
                };
            }
        }

        log::debug!(
            "resolved {}/{} type references in '{}' ({} imports used)",
            resolved,
            total,
            self.document_name,
            self.used.len()
        );

        let mut diagnostics = self.diagnostics;
        sort_diagnostics(&mut diagnostics);
        (
            ResolvedDocument {
                document,
                symbols: self.symbols,
            },
            diagnostics,
        )
    }

    fn lookup(&mut self, type_ref: &TypeRef) -> Resolution {
        let name = type_ref.base_name();

        if let Some(qualifier) = type_ref.qualifier() {
            // `B.Foo` only looks at what `B` itself declares
            if !self.import_order.iter().any(|i| i == qualifier) {
                return Resolution::Unresolved;
            }
            let Some(id) = self.imports.get(qualifier).and_then(|d| d.find_type(name)) else {
                return Resolution::Unresolved;
            };
            self.used.insert(qualifier.to_string());
            return Resolution::Declaration(id);
        }

        if let Some(id) = self.symbols.get(name) {
            return Resolution::Declaration(id.clone());
        }
        if self.config.is_builtin(name) {
            return Resolution::Builtin;
        }

        let found = self.import_order.iter().find_map(|key| {
            let mut visited = HashSet::from([self.document_name.clone()]);
            self.find_through_import(key, name, &mut visited)
                .map(|id| (key.clone(), id))
        });
        match found {
            Some((key, id)) => {
                self.used.insert(key);
                Resolution::Declaration(id)
            }
            None => Resolution::Unresolved,
        }
    }

    /// Depth-first search through the import named `key` and, in declaration order,
    /// everything it imports.
    fn find_through_import(
        &self,
        key: &str,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Option<DeclId> {
        if !visited.insert(key.to_string()) {
            return None;
        }
        let document = self.imports.get(key)?;
        if document.name == self.document_name {
            return None;
        }
        if let Some(id) = document.find_type(name) {
            return Some(id);
        }
        document
            .imports()
            .find_map(|import| self.find_through_import(&import.name, name, visited))
    }

    fn check_import_cycles(&mut self, document: &Document) {
        for import in document.imports() {
            if import.status == ImportStatus::Recovered || !self.import_order.contains(&import.name) {
                continue;
            }
            let mut visited = HashSet::new();
            if self.reaches_self(&import.name, &mut visited) {
                log::debug!(
                    "import '{}' of '{}' is part of a cycle",
                    import.name,
                    self.document_name
                );
                self.diagnostics.push(Diagnostic::new(
                    ErrorKind::ImportCycle {
                        import: import.name.clone(),
                    },
                    import.name_span,
                ));
            }
        }
    }

    fn reaches_self(&self, key: &str, visited: &mut HashSet<String>) -> bool {
        if key == self.document_name {
            return true;
        }
        if !visited.insert(key.to_string()) {
            return false;
        }
        let Some(document) = self.imports.get(key) else {
            return false;
        };
        document.name == self.document_name
            || document
                .imports()
                .any(|import| self.reaches_self(&import.name, visited))
    }
}

/// Resolves `document` against the host-supplied `imports`.
pub fn resolve(
    document: Document,
    imports: &Imports,
    config: &LanguageConfig,
) -> (ResolvedDocument, Vec<Diagnostic>) {
    Resolver::new(imports, config).resolve(document)
}
