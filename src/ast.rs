use crate::lexer::Span;
use serde::Serialize;

/// The root of the typed tree built for one source file.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Document {
    pub name: String,
    pub declarations: Vec<Declaration>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Declaration {
    Import(Import),
    Message(Message),
    Enum(Enum),
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Import {
    /// Dotted name or the decoded string literal, as the host keys its documents.
    pub name: String,
    pub name_span: Span,
    pub status: ImportStatus,
    pub span: Span,
}

/// What the resolver found out about an import.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum ImportStatus {
    /// Not looked at yet.
    Unchecked,
    /// The host supplied no document under this name.
    Missing,
    Found { used: bool },
    /// The import itself has a syntax or lexical error. Its name may be cut short,
    /// so it is neither checked against the host's documents nor reported again.
    Recovered,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Message {
    /// Empty when the name was missing in the source.
    pub name: String,
    pub name_span: Span,
    pub fields: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Field {
    pub name: String,
    pub name_span: Span,
    pub modifier: Option<Modifier>,
    pub type_ref: Option<TypeRef>,
    pub tag: Option<u32>,
    pub tag_span: Option<Span>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Modifier {
    Required,
    Optional,
    Repeated,
}

impl Modifier {
    /// Optional and repeated fields can be empty, so they never force a value to
    /// contain itself.
    pub fn is_indirect(self) -> bool {
        matches!(self, Modifier::Optional | Modifier::Repeated)
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Enum {
    pub name: String,
    pub name_span: Span,
    pub variants: Vec<Variant>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Variant {
    pub name: String,
    pub name_span: Span,
    pub value: Option<i64>,
    pub value_span: Option<Span>,
    pub span: Span,
}

/// A type name as written in a field declaration, `Foo` or `common.Foo`.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct TypeRef {
    pub raw: String,
    pub resolution: Resolution,
    pub span: Span,
}

impl TypeRef {
    /// The import name in front of the last dot, if any.
    pub fn qualifier(&self) -> Option<&str> {
        self.raw.rsplit_once('.').map(|(qualifier, _)| qualifier)
    }

    /// The declaration name after the last dot.
    pub fn base_name(&self) -> &str {
        self.raw
            .rsplit_once('.')
            .map_or(self.raw.as_str(), |(_, name)| name)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unresolved
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub enum Resolution {
    Unresolved,
    Builtin,
    Declaration(DeclId),
}

/// Identity of a message or enum: the document declaring it and its index in
/// that document's `declarations`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord, Serialize)]
pub struct DeclId {
    pub document: String,
    pub index: usize,
    pub kind: DeclKind,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum DeclKind {
    Message,
    Enum,
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Import(import) => &import.name,
            Declaration::Message(message) => &message.name,
            Declaration::Enum(enum_def) => &enum_def.name,
        }
    }

    pub fn name_span(&self) -> Span {
        match self {
            Declaration::Import(import) => import.name_span,
            Declaration::Message(message) => message.name_span,
            Declaration::Enum(enum_def) => enum_def.name_span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Import(import) => import.span,
            Declaration::Message(message) => message.span,
            Declaration::Enum(enum_def) => enum_def.span,
        }
    }

    /// `None` for imports, which declare no type.
    pub fn kind(&self) -> Option<DeclKind> {
        match self {
            Declaration::Import(_) => None,
            Declaration::Message(_) => Some(DeclKind::Message),
            Declaration::Enum(_) => Some(DeclKind::Enum),
        }
    }
}

impl Document {
    pub fn empty(name: impl Into<String>) -> Self {
        Document {
            name: name.into(),
            declarations: Vec::new(),
            span: Span::new(0, 0, 1, 1),
        }
    }

    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Message(message) => Some(message),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &Enum> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Enum(enum_def) => Some(enum_def),
            _ => None,
        })
    }

    /// The first message or enum called `name`.
    pub fn find_type(&self, name: &str) -> Option<DeclId> {
        self.declarations
            .iter()
            .enumerate()
            .find_map(|(index, declaration)| {
                let kind = declaration.kind()?;
                (declaration.name() == name).then(|| DeclId {
                    document: self.name.clone(),
                    index,
                    kind,
                })
            })
    }

    /// The declaration `id` points at, if `id` belongs to this document.
    pub fn declaration(&self, id: &DeclId) -> Option<&Declaration> {
        if id.document != self.name {
            return None;
        }
        self.declarations.get(id.index)
    }

    /// Every type reference in source order.
    pub fn type_refs(&self) -> impl Iterator<Item = &TypeRef> {
        self.messages()
            .flat_map(|m| m.fields.iter())
            .filter_map(|f| f.type_ref.as_ref())
    }

    /// All nodes of the tree in pre-order, which is also source order.
    pub fn walk(&self) -> Vec<Node<'_>> {
        let mut nodes = Vec::new();
        Node::Document(self).collect_into(&mut nodes);
        nodes
    }
}

/// A borrowed view of any AST node, for code that walks the tree generically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Document(&'a Document),
    Import(&'a Import),
    Message(&'a Message),
    Field(&'a Field),
    Enum(&'a Enum),
    Variant(&'a Variant),
    TypeRef(&'a TypeRef),
}

impl<'a> Node<'a> {
    pub fn span(&self) -> Span {
        match self {
            Node::Document(n) => n.span,
            Node::Import(n) => n.span,
            Node::Message(n) => n.span,
            Node::Field(n) => n.span,
            Node::Enum(n) => n.span,
            Node::Variant(n) => n.span,
            Node::TypeRef(n) => n.span,
        }
    }

    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Document(document) => document
                .declarations
                .iter()
                .map(|d| match d {
                    Declaration::Import(import) => Node::Import(import),
                    Declaration::Message(message) => Node::Message(message),
                    Declaration::Enum(enum_def) => Node::Enum(enum_def),
                })
                .collect(),
            Node::Message(message) => message.fields.iter().map(Node::Field).collect(),
            Node::Field(field) => field.type_ref.iter().map(Node::TypeRef).collect(),
            Node::Enum(enum_def) => enum_def.variants.iter().map(Node::Variant).collect(),
            Node::Import(_) | Node::Variant(_) | Node::TypeRef(_) => Vec::new(),
        }
    }

    fn collect_into(self, nodes: &mut Vec<Node<'a>>) {
        nodes.push(self);
        for child in self.children() {
            child.collect_into(nodes);
        }
    }
}
