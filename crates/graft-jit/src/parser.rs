//! PHP source chunking.
//!
//! The parser does not build a grammar-level AST. It cuts source text into
//! the chunks the patchers care about (code, strings, comments, namespaces,
//! imports, class-likes and functions) and keeps every byte, so
//! `unparse(parse(s)) == s` for any input.
//!
//! Like the classmap scanner this is a single forward byte scan: comments
//! and literals are skipped as opaque chunks, keywords are only recognised
//! at statement positions, and braces are counted per open container.

use crate::node::{Node, NodeId, NodeKind, NodeTree, Uses};
use graft_core::php::{is_identifier_byte, is_identifier_start};
use graft_core::{Error, Result};
use memchr::memmem;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

/// Declaration modifiers that belong to the declaration that follows them.
static TRAILING_MODIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:abstract|final|readonly|public|protected|private|static|var)\s+)+$")
        .unwrap()
});

/// Turns source text into a [`NodeTree`] and back.
pub trait SourceParser: fmt::Debug + Send + Sync {
    /// Parse source text into a tree.
    fn parse(&self, source: &str) -> Result<NodeTree>;

    /// Serialize a tree back to source text.
    fn unparse(&self, tree: &NodeTree) -> String {
        tree.render()
    }

    /// Parse raw file bytes, rejecting non UTF-8 input.
    fn parse_bytes(&self, bytes: &[u8], path: Option<&Path>) -> Result<NodeTree> {
        let source = std::str::from_utf8(bytes).map_err(|e| {
            Error::parse(path.map(Path::to_path_buf), format!("invalid UTF-8: {e}"))
        })?;
        self.parse(source)
            .map_err(|e| match path {
                Some(p) => e.with_path(p),
                None => e,
            })
    }
}

/// Default chunking parser for PHP sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpParser;

impl PhpParser {
    /// Create a parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SourceParser for PhpParser {
    fn parse(&self, source: &str) -> Result<NodeTree> {
        let tree = Builder::new(source).run();
        trace!(nodes = tree.len(), bytes = source.len(), "parsed source");
        Ok(tree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Root,
    Namespace { braced: bool },
    ClassLike,
    Function,
}

#[derive(Debug)]
struct Frame {
    node: NodeId,
    scope: Scope,
    /// Unmatched `{` opened inside this container's code.
    depth: usize,
}

#[derive(Debug)]
struct Builder<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Start of the code chunk not yet emitted.
    mark: usize,
    in_php: bool,
    tree: NodeTree,
    stack: Vec<Frame>,
}

impl<'a> Builder<'a> {
    fn new(src: &'a str) -> Self {
        let tree = NodeTree::new();
        let root = tree.root();
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            mark: 0,
            in_php: false,
            tree,
            stack: vec![Frame {
                node: root,
                scope: Scope::Root,
                depth: 0,
            }],
        }
    }

    fn run(mut self) -> NodeTree {
        while self.pos < self.bytes.len() {
            if !self.in_php {
                self.inline();
                continue;
            }
            let b = self.bytes[self.pos];
            if b == b'?' && self.peek(1) == Some(b'>') {
                self.close_tag();
            } else if let Some((kind, end)) = self.literal_at(self.pos) {
                self.emit(kind, self.pos, end);
            } else if b == b'$' {
                self.pos += 1;
                self.pos = self.identifier_end(self.pos);
            } else if b == b'\\' {
                self.pos = self.qualified_end(self.pos + 1);
            } else if b == b'{' {
                self.top_mut().depth += 1;
                self.pos += 1;
            } else if b == b'}' {
                self.close_brace();
            } else if is_identifier_start(b) {
                self.word();
            } else {
                self.pos += 1;
            }
        }
        self.flush_code(self.bytes.len());
        self.tree
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn top(&self) -> &Frame {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn current_namespace(&self) -> NodeId {
        self.stack
            .iter()
            .rev()
            .find(|f| matches!(f.scope, Scope::Namespace { .. }))
            .map_or_else(|| self.tree.root(), |f| f.node)
    }

    fn current_function(&self) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .find(|f| f.scope == Scope::Function)
            .map(|f| f.node)
    }

    fn push_node(&mut self, mut node: Node) -> NodeId {
        node.namespace = Some(self.current_namespace());
        node.function = self.current_function();
        let parent = self.top().node;
        self.tree.append(parent, node)
    }

    /// Emit pending code up to `end`.
    fn flush_code(&mut self, end: usize) {
        if end <= self.mark {
            return;
        }
        let mut node = Node::new(NodeKind::Code, &self.src[self.mark..end]);
        node.processable = self.top().scope != Scope::ClassLike;
        node.in_php = true;
        self.push_node(node);
        self.mark = end;
    }

    /// Emit `[start, end)` as a node of `kind`, flushing code before it.
    fn emit(&mut self, kind: NodeKind, start: usize, end: usize) -> NodeId {
        self.flush_code(start);
        let mut node = Node::new(kind, &self.src[start..end]);
        node.processable = false;
        node.in_php = self.in_php;
        let id = self.push_node(node);
        self.pos = end;
        self.mark = end;
        id
    }

    /// Text outside PHP tags, up to and including the next opening tag.
    fn inline(&mut self) {
        let Some((tag_start, tag_end)) = self.find_open_tag(self.pos) else {
            self.emit(NodeKind::Plain, self.pos, self.bytes.len());
            return;
        };
        if tag_start > self.pos {
            self.emit(NodeKind::Plain, self.pos, tag_start);
        }
        self.emit(NodeKind::Open, tag_start, tag_end);
        self.in_php = true;
    }

    fn find_open_tag(&self, from: usize) -> Option<(usize, usize)> {
        let mut at = from;
        while let Some(offset) = memmem::find(&self.bytes[at..], b"<?") {
            let start = at + offset;
            let rest = &self.bytes[start + 2..];
            if rest.first() == Some(&b'=') {
                return Some((start, start + 3));
            }
            if rest.len() >= 3 && rest[..3].eq_ignore_ascii_case(b"php") {
                let mut end = start + 5;
                match self.bytes.get(end) {
                    Some(b'\r') if self.bytes.get(end + 1) == Some(&b'\n') => end += 2,
                    Some(b' ' | b'\t' | b'\n') => end += 1,
                    None => {}
                    Some(_) => {
                        at = start + 2;
                        continue;
                    }
                }
                return Some((start, end));
            }
            at = start + 2;
        }
        None
    }

    fn close_tag(&mut self) {
        let start = self.pos;
        let mut end = start + 2;
        match self.bytes.get(end) {
            Some(b'\n') => end += 1,
            Some(b'\r') if self.bytes.get(end + 1) == Some(&b'\n') => end += 2,
            _ => {}
        }
        self.emit(NodeKind::Close, start, end);
        self.in_php = false;
    }

    fn close_brace(&mut self) {
        let frame = self.top_mut();
        if frame.depth > 0 {
            frame.depth -= 1;
            self.pos += 1;
            return;
        }
        match frame.scope {
            Scope::Root | Scope::Namespace { braced: false } => self.pos += 1,
            Scope::Namespace { braced: true } | Scope::ClassLike | Scope::Function => {
                self.flush_code(self.pos);
                let node = self.top().node;
                self.tree.get_mut(node).close = "}".to_string();
                self.stack.pop();
                self.pos += 1;
                self.mark = self.pos;
            }
        }
    }

    /// Comment, string or attribute starting at `i`, with its end offset.
    fn literal_at(&self, i: usize) -> Option<(NodeKind, usize)> {
        let b = *self.bytes.get(i)?;
        let next = self.bytes.get(i + 1).copied();
        match (b, next) {
            (b'#', Some(b'[')) => Some((NodeKind::Attribute, self.attribute_end(i))),
            (b'#', _) | (b'/', Some(b'/')) => Some((NodeKind::Comment, self.line_comment_end(i))),
            (b'/', Some(b'*')) => {
                let end = memmem::find(&self.bytes[i + 2..], b"*/")
                    .map_or(self.bytes.len(), |p| i + 2 + p + 2);
                Some((NodeKind::Comment, end))
            }
            (b'\'' | b'"' | b'`', _) => Some((NodeKind::String, self.quoted_end(i))),
            (b'<', Some(b'<')) if self.bytes.get(i + 2) == Some(&b'<') => {
                self.heredoc_end(i).map(|end| (NodeKind::String, end))
            }
            _ => None,
        }
    }

    fn line_comment_end(&self, i: usize) -> usize {
        let mut j = i;
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\n' => return j,
                b'?' if self.bytes.get(j + 1) == Some(&b'>') => return j,
                _ => j += 1,
            }
        }
        j
    }

    fn quoted_end(&self, i: usize) -> usize {
        let quote = self.bytes[i];
        let mut j = i + 1;
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\\' => j += 2,
                b if b == quote => return j + 1,
                _ => j += 1,
            }
        }
        self.bytes.len()
    }

    fn attribute_end(&self, i: usize) -> usize {
        let mut depth = 0usize;
        let mut j = i + 1;
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\'' | b'"' => {
                    j = self.quoted_end(j);
                    continue;
                }
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return j + 1;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        self.bytes.len()
    }

    /// End of a heredoc or nowdoc starting at `i`, if `i` really starts one.
    fn heredoc_end(&self, i: usize) -> Option<usize> {
        let mut j = i + 3;
        while matches!(self.bytes.get(j), Some(b' ' | b'\t')) {
            j += 1;
        }
        let quote = match self.bytes.get(j) {
            Some(q @ (b'\'' | b'"')) => {
                j += 1;
                Some(*q)
            }
            _ => None,
        };
        let ident_start = j;
        let ident_end = self.identifier_end(j);
        if ident_end == ident_start {
            return None;
        }
        let ident = &self.bytes[ident_start..ident_end];
        j = ident_end;
        if let Some(q) = quote {
            if self.bytes.get(j) != Some(&q) {
                return None;
            }
            j += 1;
        }
        let line_end = memchr::memchr(b'\n', &self.bytes[j..])? + j;

        let mut line = line_end + 1;
        while line < self.bytes.len() {
            let mut k = line;
            while matches!(self.bytes.get(k), Some(b' ' | b'\t')) {
                k += 1;
            }
            if self.bytes[k..].starts_with(ident)
                && !self
                    .bytes
                    .get(k + ident.len())
                    .is_some_and(|b| is_identifier_byte(*b))
            {
                return Some(k + ident.len());
            }
            line = match memchr::memchr(b'\n', &self.bytes[line..]) {
                Some(p) => line + p + 1,
                None => break,
            };
        }
        Some(self.bytes.len())
    }

    fn identifier_end(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.bytes.len() && is_identifier_byte(self.bytes[j]) {
            j += 1;
        }
        j
    }

    fn qualified_end(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.bytes.len() && (is_identifier_byte(self.bytes[j]) || self.bytes[j] == b'\\')
        {
            j += 1;
        }
        j
    }

    fn skip_ws(&self, from: usize) -> usize {
        let mut j = from;
        while j < self.bytes.len() && self.bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        j
    }

    /// Whether the word at `start` is a member or part of a qualified name.
    fn is_member_context(&self, start: usize) -> bool {
        if start == 0 {
            return false;
        }
        if matches!(self.bytes[start - 1], b'\\' | b'$') {
            return true;
        }
        let mut j = start;
        while j > 0 && self.bytes[j - 1].is_ascii_whitespace() {
            j -= 1;
        }
        j >= 2 && matches!(&self.bytes[j - 2..j], b"->" | b"::")
    }

    fn previous_word(&self, start: usize) -> &str {
        let mut end = start;
        while end > 0 && self.bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        let mut begin = end;
        while begin > 0 && is_identifier_byte(self.bytes[begin - 1]) {
            begin -= 1;
        }
        &self.src[begin..end]
    }

    /// Index of the `)` matching the `(` at `open`.
    fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = open;
        while j < self.bytes.len() {
            if let Some((_, end)) = self.literal_at(j) {
                j = end;
                continue;
            }
            match self.bytes[j] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// First `{` (or `;` when allowed) outside parentheses, starting at `from`.
    fn header_end(&self, from: usize, allow_semicolon: bool) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = from;
        while j < self.bytes.len() {
            if let Some((_, end)) = self.literal_at(j) {
                j = end;
                continue;
            }
            match self.bytes[j] {
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.checked_sub(1)?,
                b'{' if depth == 0 => return Some(j),
                b';' if depth == 0 => return allow_semicolon.then_some(j),
                b'}' if depth == 0 => return None,
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// Start of the declaration modifiers written right before `start`.
    fn modifiers_start(&self, start: usize) -> usize {
        let pending = &self.src[self.mark..start];
        TRAILING_MODIFIERS
            .find(pending)
            .map_or(start, |m| self.mark + m.start())
    }

    fn at_statement_level(&self) -> bool {
        let frame = self.top();
        frame.depth == 0 && matches!(frame.scope, Scope::Root | Scope::Namespace { .. })
    }

    fn word(&mut self) {
        let start = self.pos;
        let end = self.identifier_end(start);
        self.pos = end;
        if self.bytes.get(end) == Some(&b'\\') {
            self.pos = self.qualified_end(end);
            return;
        }
        if self.is_member_context(start) {
            return;
        }
        let word = self.src[start..end].to_ascii_lowercase();
        match word.as_str() {
            "namespace" => self.namespace(start),
            "use" => self.import(start),
            "declare" => self.declare(start),
            "class" => self.class_like(start, NodeKind::Class),
            "interface" => self.class_like(start, NodeKind::Interface),
            "trait" => self.class_like(start, NodeKind::Trait),
            "enum" => self.class_like(start, NodeKind::Enum),
            "function" => self.function(start),
            "yield" => {
                if let Some(func) = self.current_function() {
                    self.tree.get_mut(func).is_generator = true;
                }
            }
            _ => {}
        }
    }

    fn namespace(&mut self, start: usize) {
        let frame = self.top();
        let allowed = frame.depth == 0
            && matches!(frame.scope, Scope::Root | Scope::Namespace { braced: false });
        if !allowed {
            return;
        }
        let name_start = self.skip_ws(self.pos);
        if self.bytes.get(name_start) == Some(&b'\\') {
            return;
        }
        let name_end = self.qualified_end(name_start);
        let terminator = self.skip_ws(name_end);
        let braced = match self.bytes.get(terminator) {
            Some(b'{') => true,
            Some(b';') => false,
            _ => return,
        };

        self.flush_code(start);
        if matches!(self.top().scope, Scope::Namespace { braced: false }) {
            self.stack.pop();
        }
        let mut node = Node::new(NodeKind::Namespace, &self.src[start..=terminator]);
        node.processable = false;
        node.name = Some(self.src[name_start..name_end].to_string());
        let id = self.push_node(node);
        self.tree.get_mut(id).namespace = Some(id);
        self.stack.push(Frame {
            node: id,
            scope: Scope::Namespace { braced },
            depth: 0,
        });
        self.pos = terminator + 1;
        self.mark = self.pos;
    }

    fn import(&mut self, start: usize) {
        if !self.at_statement_level() {
            return;
        }
        let Some(semicolon) = memchr::memchr(b';', &self.bytes[self.pos..]).map(|p| self.pos + p)
        else {
            return;
        };
        let clause = &self.src[self.pos..semicolon];
        let scope = self.current_namespace();
        parse_imports(clause, &mut self.tree.get_mut(scope).uses);
        self.emit(NodeKind::Use, start, semicolon + 1);
    }

    fn declare(&mut self, start: usize) {
        if !self.at_statement_level() {
            return;
        }
        let open = self.skip_ws(self.pos);
        if self.bytes.get(open) != Some(&b'(') {
            return;
        }
        let Some(close) = self.matching_paren(open) else {
            return;
        };
        let semicolon = self.skip_ws(close + 1);
        if self.bytes.get(semicolon) != Some(&b';') {
            return;
        }
        self.emit(NodeKind::Declare, start, semicolon + 1);
    }

    fn class_like(&mut self, start: usize, kind: NodeKind) {
        let anonymous = kind == NodeKind::Class && self.previous_word(start).eq_ignore_ascii_case("new");
        let name_start = self.skip_ws(self.pos);
        let name = if anonymous {
            None
        } else {
            if !self.bytes.get(name_start).is_some_and(|b| is_identifier_start(*b)) {
                return;
            }
            Some(self.src[name_start..self.identifier_end(name_start)].to_string())
        };
        let Some(brace) = self.header_end(self.pos, false) else {
            return;
        };

        let body_start = if anonymous {
            start
        } else {
            self.modifiers_start(start)
        };
        self.flush_code(body_start);
        let mut node = Node::new(kind, &self.src[body_start..=brace]);
        node.processable = true;
        node.name = name;
        let id = self.push_node(node);
        self.stack.push(Frame {
            node: id,
            scope: Scope::ClassLike,
            depth: 0,
        });
        self.pos = brace + 1;
        self.mark = self.pos;
    }

    fn function(&mut self, start: usize) {
        let mut i = self.skip_ws(self.pos);
        if self.bytes.get(i) == Some(&b'&') {
            i = self.skip_ws(i + 1);
        }
        let name = if self.bytes.get(i).is_some_and(|b| is_identifier_start(*b)) {
            let end = self.identifier_end(i);
            let name = self.src[i..end].to_string();
            i = self.skip_ws(end);
            Some(name)
        } else {
            None
        };
        if self.bytes.get(i) != Some(&b'(') {
            return;
        }
        let Some(params_end) = self.matching_paren(i) else {
            return;
        };
        let Some(end) = self.header_end(params_end + 1, true) else {
            return;
        };

        let in_class = self.top().scope == Scope::ClassLike;
        let body_start = if in_class {
            self.modifiers_start(start)
        } else {
            start
        };
        let modifiers = self.src[body_start..start].to_ascii_lowercase();
        let has_body = self.bytes[end] == b'{';

        self.flush_code(body_start);
        let mut node = Node::new(NodeKind::Function, &self.src[body_start..=end]);
        node.processable = true;
        node.is_closure = name.is_none();
        node.is_method = in_class && name.is_some();
        node.is_abstract = !has_body || modifiers.split_whitespace().any(|m| m == "abstract");
        node.return_type = return_type(&self.src[params_end + 1..end]);
        node.name = name;
        let id = self.push_node(node);
        if has_body {
            self.stack.push(Frame {
                node: id,
                scope: Scope::Function,
                depth: 0,
            });
        }
        self.pos = end + 1;
        self.mark = self.pos;
    }
}

/// Declared return type in the text between `)` and the body.
fn return_type(tail: &str) -> Option<String> {
    let mut depth = 0usize;
    for (i, b) in tail.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => {
                let ty = tail[i + 1..].trim();
                return (!ty.is_empty()).then(|| ty.to_string());
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportKind {
    Class,
    Function,
    Const,
}

fn split_import_kind(text: &str) -> (ImportKind, &str) {
    let trimmed = text.trim_start();
    let lower = trimmed.get(..9).unwrap_or(trimmed).to_ascii_lowercase();
    if lower.starts_with("function") && trimmed[8..].starts_with(char::is_whitespace) {
        (ImportKind::Function, trimmed[8..].trim_start())
    } else if lower.starts_with("const") && trimmed[5..].starts_with(char::is_whitespace) {
        (ImportKind::Const, trimmed[5..].trim_start())
    } else {
        (ImportKind::Class, trimmed)
    }
}

/// Record the imports of one `use` clause (the text between `use` and `;`).
fn parse_imports(clause: &str, uses: &mut Uses) {
    let (kind, rest) = split_import_kind(clause);
    if let Some(open) = rest.find('{') {
        let prefix = rest[..open].trim().trim_end_matches('\\');
        let inner = rest[open + 1..].trim_end().trim_end_matches('}');
        for item in inner.split(',') {
            let (item_kind, item) = split_import_kind(item);
            let item_kind = if item_kind == ImportKind::Class {
                kind
            } else {
                item_kind
            };
            let item = item.trim();
            if !item.is_empty() {
                record_import(item_kind, &format!("{prefix}\\{item}"), uses);
            }
        }
    } else {
        for item in rest.split(',') {
            let item = item.trim();
            if !item.is_empty() {
                record_import(kind, item, uses);
            }
        }
    }
}

fn record_import(kind: ImportKind, item: &str, uses: &mut Uses) {
    let mut parts = item.split_whitespace();
    let Some(name) = parts.next() else {
        return;
    };
    let name = name.trim_start_matches('\\');
    let alias = match (parts.next(), parts.next()) {
        (Some(as_kw), Some(alias)) if as_kw.eq_ignore_ascii_case("as") => alias,
        _ => name.rsplit('\\').next().unwrap_or(name),
    };
    let map = match kind {
        ImportKind::Class => &mut uses.classes,
        ImportKind::Function => &mut uses.functions,
        ImportKind::Const => &mut uses.constants,
    };
    map.insert(alias.to_string(), name.to_string());
}
