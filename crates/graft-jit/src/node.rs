//! Arena-backed source tree.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`]
//! indices, so a patcher can rewrite a later sibling while it is still
//! iterating an earlier one. Only `body`, `close` and the child lists are
//! ever mutated after parsing.

use indexmap::IndexMap;
use std::fmt;

/// Stable index of a node inside its [`NodeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a source chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Tree root; has no text of its own.
    File,
    /// Inline text outside `<?php ... ?>`.
    Plain,
    /// `<?php` or `<?=` opening tag.
    Open,
    /// `?>` closing tag.
    Close,
    /// Executable PHP code.
    Code,
    /// Line or block comment.
    Comment,
    /// Quoted string, heredoc, nowdoc or backtick literal.
    String,
    /// `#[...]` attribute group.
    Attribute,
    /// `namespace` declaration; owns the nodes it scopes.
    Namespace,
    /// Top-level `use` import statement.
    Use,
    /// Leading `declare(...);` statement.
    Declare,
    /// `class` declaration, named or anonymous.
    Class,
    /// `interface` declaration.
    Interface,
    /// `trait` declaration.
    Trait,
    /// `enum` declaration.
    Enum,
    /// Function, method or closure.
    Function,
}

impl NodeKind {
    /// Lowercase name used in logs and debug dumps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Plain => "plain",
            Self::Open => "open",
            Self::Close => "close",
            Self::Code => "code",
            Self::Comment => "comment",
            Self::String => "string",
            Self::Attribute => "attribute",
            Self::Namespace => "namespace",
            Self::Use => "use",
            Self::Declare => "declare",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Enum => "enum",
            Self::Function => "function",
        }
    }

    /// Whether this kind declares methods.
    #[must_use]
    pub const fn is_class_like(self) -> bool {
        matches!(
            self,
            Self::Class | Self::Interface | Self::Trait | Self::Enum
        )
    }
}

/// Imports declared by `use` statements in one namespace.
///
/// Keys are the local alias, values the fully-qualified target without a
/// leading backslash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uses {
    /// `use A\B;` and `use A\B as C;`
    pub classes: IndexMap<String, String>,
    /// `use function A\b;`
    pub functions: IndexMap<String, String>,
    /// `use const A\B;`
    pub constants: IndexMap<String, String>,
}

impl Uses {
    /// Whether no import has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.functions.is_empty() && self.constants.is_empty()
    }
}

/// One chunk of source text.
#[derive(Debug, Clone)]
pub struct Node {
    /// Chunk kind.
    pub kind: NodeKind,
    /// Raw text preceding the children.
    pub body: String,
    /// Raw text following the children (a container's closing `}`).
    pub close: String,
    /// Whether patchers may rewrite `body`.
    pub processable: bool,
    /// Class-like container.
    pub has_methods: bool,
    /// Function declared directly inside a class-like container.
    pub is_method: bool,
    /// Anonymous function.
    pub is_closure: bool,
    /// Function without a body, or declared `abstract`.
    pub is_abstract: bool,
    /// Function whose own body contains `yield`.
    pub is_generator: bool,
    /// Created while inside `<?php ... ?>`.
    pub in_php: bool,
    /// Declared name for namespaces, classes and functions.
    pub name: Option<String>,
    /// Declared return type of a function, as written.
    pub return_type: Option<String>,
    /// Imports, recorded on namespace nodes and on the root.
    pub uses: Uses,
    /// Owning node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Enclosing namespace node, or the root for global code.
    pub namespace: Option<NodeId>,
    /// Enclosing function node.
    pub function: Option<NodeId>,
    /// Children in source order.
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a detached node of the given kind.
    #[must_use]
    pub fn new(kind: NodeKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            close: String::new(),
            processable: matches!(kind, NodeKind::Code),
            has_methods: kind.is_class_like(),
            is_method: false,
            is_closure: false,
            is_abstract: false,
            is_generator: false,
            in_php: true,
            name: None,
            return_type: None,
            uses: Uses::default(),
            parent: None,
            namespace: None,
            function: None,
            children: Vec::new(),
        }
    }

    /// Whether this is a rewritable code chunk.
    #[must_use]
    pub fn is_patchable_code(&self) -> bool {
        self.kind == NodeKind::Code && self.processable
    }
}

/// Source tree with arena storage.
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    /// Create a tree holding only an empty root.
    #[must_use]
    pub fn new() -> Self {
        let mut root = Node::new(NodeKind::File, "");
        root.processable = false;
        root.in_php = false;
        Self { nodes: vec![root] }
    }

    /// The root node id.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, including detached ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Borrow a node.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Children of `id` in source order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Append `node` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node: Node) -> NodeId {
        let len = self.nodes[parent.0].children.len();
        self.insert(parent, len, node)
    }

    /// Insert `node` as the first child of `parent`.
    pub fn unshift(&mut self, parent: NodeId, node: Node) -> NodeId {
        self.insert(parent, 0, node)
    }

    /// Insert `node` at `index` in the child list of `parent`.
    ///
    /// # Panics
    /// Panics if `index` is past the end of the child list.
    pub fn insert(&mut self, parent: NodeId, index: usize, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.insert(index, id);
        id
    }

    /// Namespace name in effect for `id`; `None` in the global namespace.
    #[must_use]
    pub fn namespace_name(&self, id: NodeId) -> Option<&str> {
        self.get(id)
            .namespace
            .and_then(|ns| self.get(ns).name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Imports in effect for `id`.
    #[must_use]
    pub fn uses(&self, id: NodeId) -> &Uses {
        let scope = self.get(id).namespace.unwrap_or_else(|| self.root());
        &self.get(scope).uses
    }

    /// Every node id below `id` in document order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Full text of `id`: body, children, then close.
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out);
        out
    }

    fn write_text(&self, id: NodeId, out: &mut String) {
        let node = self.get(id);
        out.push_str(&node.body);
        for child in &node.children {
            self.write_text(*child, out);
        }
        out.push_str(&node.close);
    }

    /// Serialize the whole tree back to source text.
    #[must_use]
    pub fn render(&self) -> String {
        self.text(self.root())
    }

    /// Indented outline of the tree, for debugging.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = self.get(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(node.kind.as_str());
        if let Some(name) = &node.name {
            out.push_str(&format!(" {name}"));
        }
        out.push_str(&format!(" {:?}\n", node.body));
        for child in &node.children {
            self.dump_node(*child, depth + 1, out);
        }
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}
