//! Call-site redirection.
//!
//! Function calls, static calls and `new` expressions in code nodes are
//! routed through indirection variables that the runtime resolver fills in,
//! so tests can swap the target of a call without touching call syntax:
//!
//! ```php
//! rand(1, 2);          // $__GRAFT__0(1, 2);
//! Foo::bar();          // $__GRAFT__1::bar();
//! new Baz($x);         // ($__GRAFT__2__ ? $__GRAFT__2__ : new $__GRAFT__2($x));
//! ```
//!
//! The variables are declared by a one-line prologue unshifted at the front
//! of the function, namespace or file that owns the call site.

use crate::node::{Node, NodeId, NodeKind, NodeTree};
use crate::patcher::{BacktraceOptions, Frame, Patcher};
use crate::scan::{BalanceScanner, ScanState};
use ahash::AHashSet;
use graft_core::php::is_identifier_byte;
use graft_core::{Result, export_string};
use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Default indirection variable prefix.
pub const DEFAULT_PREFIX: &str = "GRAFT";

/// Default runtime resolver class.
pub const DEFAULT_RESOLVER: &str = "\\Graft\\Monkey";

/// Default number of sibling nodes a `new` argument list may span.
pub const DEFAULT_MAX_SCAN_NODES: usize = 64;

/// Language constructs and keywords that look like calls but never are.
pub const BLACKLIST: &[&str] = &[
    "__halt_compiler",
    "and",
    "array",
    "catch",
    "case",
    "class",
    "clone",
    "compact",
    "declare",
    "die",
    "do",
    "echo",
    "else",
    "elseif",
    "empty",
    "eval",
    "exit",
    "extract",
    "fn",
    "for",
    "foreach",
    "from",
    "func_get_arg",
    "func_get_args",
    "func_num_args",
    "function",
    "get_called_class",
    "global",
    "goto",
    "if",
    "include",
    "include_once",
    "instanceof",
    "isset",
    "list",
    "match",
    "namespace",
    "new",
    "or",
    "parent",
    "print",
    "require",
    "require_once",
    "return",
    "self",
    "static",
    "switch",
    "throw",
    "unset",
    "use",
    "while",
    "xor",
    "yield",
];

/// Candidate call sites. The character before a match is checked by hand
/// since the regex engine has no lookbehind.
static CALL_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<new>(?i:new)\s+)?
        (?P<name>\\?[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}\\]*)
        \s*
        (?P<tail>
            ::\s*[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*\s*\(
            | [(;,)\]]
        )",
    )
    .unwrap()
});

/// How a symbol is used at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `foo(...)`
    Function,
    /// `Foo::bar(...)`
    Static,
    /// `new Foo(...)` or `new Foo`
    New,
}

/// Arguments passed to the runtime resolver for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionArgs {
    /// `None` for root-qualified and imported names; otherwise the
    /// namespace the call site sits in (empty for the global namespace).
    pub namespace: Option<String>,
    /// Symbol name, relative to `namespace` when one is set.
    pub name: String,
    /// Unqualified function call: try the namespaced function, then the
    /// global one.
    pub is_function: bool,
}

/// Resolve `name` as written at a call site inside node `id`.
#[must_use]
pub fn resolve(tree: &NodeTree, id: NodeId, name: &str, kind: CallKind) -> ResolutionArgs {
    if let Some(stripped) = name.strip_prefix('\\') {
        return ResolutionArgs {
            namespace: None,
            name: stripped.to_string(),
            is_function: false,
        };
    }

    let uses = tree.uses(id);
    let (first, rest) = match name.split_once('\\') {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };

    if kind == CallKind::Function && rest.is_none() {
        if let Some(target) = lookup(&uses.functions, name) {
            return ResolutionArgs {
                namespace: None,
                name: target.to_string(),
                is_function: false,
            };
        }
    } else if let Some(target) = lookup(&uses.classes, first) {
        return ResolutionArgs {
            namespace: None,
            name: rest.map_or_else(|| target.to_string(), |rest| format!("{target}\\{rest}")),
            is_function: false,
        };
    }

    ResolutionArgs {
        namespace: Some(tree.namespace_name(id).unwrap_or_default().to_string()),
        name: name.to_string(),
        is_function: kind == CallKind::Function && rest.is_none(),
    }
}

fn lookup<'a>(map: &'a IndexMap<String, String>, alias: &str) -> Option<&'a str> {
    map.get(alias)
        .or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(alias))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// One synthesized indirection variable.
#[derive(Debug, Clone)]
struct Indirection {
    variable: String,
    args: ResolutionArgs,
    is_instance: bool,
    is_static: bool,
}

impl Indirection {
    fn guard(&self) -> String {
        format!("{}__", self.variable)
    }

    fn declaration(&self, resolver: &str) -> String {
        let namespace = if self.args.namespace.is_some() {
            "__NAMESPACE__"
        } else {
            "null"
        };
        let mut call = format!(
            "{} = {resolver}::patched({namespace}, {}, {}",
            self.variable,
            export_string(&self.args.name),
            self.args.is_function
        );
        if self.is_instance {
            call = format!(
                "{} = null; {call}, {}, {}",
                self.guard(),
                self.is_static,
                self.guard()
            );
        } else if self.is_static {
            call.push_str(", true");
        }
        call.push_str(");");
        call
    }
}

/// Text edit on a node body, in byte offsets of the unedited body.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

fn apply_edits(body: &mut String, mut edits: Vec<Edit>) {
    edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    for edit in edits {
        body.replace_range(edit.start..edit.end, &edit.text);
    }
}

/// Where the argument list of a `new` expression closes.
#[derive(Debug, Clone, Copy)]
enum Closing {
    /// Offset of `)` in the current body.
    Here(usize),
    /// Offset of `)` in a later sibling's body.
    Sibling(NodeId, usize),
}

/// Call-site redirection patcher.
#[derive(Debug, Clone)]
pub struct Monkey {
    prefix: String,
    resolver: String,
    max_scan_nodes: usize,
    blacklist: AHashSet<String>,
    ignored: AHashSet<String>,
    counter: usize,
}

impl Default for Monkey {
    fn default() -> Self {
        Self::new()
    }
}

impl Monkey {
    /// Patcher with the default prefix, resolver and blacklist.
    #[must_use]
    pub fn new() -> Self {
        let mut monkey = Self {
            prefix: DEFAULT_PREFIX.to_string(),
            resolver: String::new(),
            max_scan_nodes: DEFAULT_MAX_SCAN_NODES,
            blacklist: BLACKLIST.iter().map(|s| (*s).to_string()).collect(),
            ignored: AHashSet::new(),
            counter: 0,
        };
        monkey.set_resolver(DEFAULT_RESOLVER);
        monkey
    }

    /// Use `prefix` in variable names (`$__<prefix>__<n>`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Route calls through `class` instead of the default resolver.
    #[must_use]
    pub fn with_resolver(mut self, class: &str) -> Self {
        self.set_resolver(class);
        self
    }

    /// Bound the number of siblings a `new` argument list may span.
    #[must_use]
    pub fn with_max_scan_nodes(mut self, max: usize) -> Self {
        self.max_scan_nodes = max;
        self
    }

    /// Never redirect these names (case-insensitive).
    #[must_use]
    pub fn with_blacklisted<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist
            .extend(names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()));
        self
    }

    /// Leave calls on `class` untouched, like calls on the resolver itself.
    #[must_use]
    pub fn with_ignored_class(mut self, class: &str) -> Self {
        self.ignored
            .insert(class.trim_start_matches('\\').to_ascii_lowercase());
        self
    }

    fn set_resolver(&mut self, class: &str) {
        let bare = class.trim_start_matches('\\');
        self.ignored.insert(bare.to_ascii_lowercase());
        self.resolver = format!("\\{bare}");
    }

    /// Variable prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolver class, root-qualified.
    #[must_use]
    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    /// Whether `name` is a blacklisted construct.
    #[must_use]
    pub fn is_blacklisted(&self, name: &str) -> bool {
        let bare = name.trim_start_matches('\\').to_ascii_lowercase();
        self.blacklist.contains(&bare)
            || bare.split('\\').next().is_some_and(|first| first == "namespace")
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored
            .contains(&name.trim_start_matches('\\').to_ascii_lowercase())
    }

    fn next_variable(&mut self) -> String {
        let variable = format!("$__{}__{}", self.prefix, self.counter);
        self.counter += 1;
        variable
    }

    /// Rewrite the call sites of one code node, registering the variables it
    /// needs in `scope`.
    fn rewrite_node(
        &mut self,
        tree: &mut NodeTree,
        id: NodeId,
        scope: &mut IndexMap<ResolutionArgs, Indirection>,
    ) {
        let body = tree.get(id).body.clone();
        let mut edits = Vec::new();
        let mut sibling_edits: Vec<(NodeId, usize)> = Vec::new();

        for caps in CALL_SITE.captures_iter(&body) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(name) = caps.name("name") else { continue };
            let Some(tail) = caps.name("tail") else { continue };
            let is_new = caps.name("new").is_some();
            let is_static = tail.as_str().starts_with("::");

            if !is_call_position(&body, whole.start()) {
                continue;
            }
            if self.is_blacklisted(name.as_str()) || self.is_ignored(name.as_str()) {
                continue;
            }
            let kind = match (is_new, is_static, tail.as_str()) {
                (true, true, _) => continue,
                (true, false, _) => CallKind::New,
                (false, true, _) => CallKind::Static,
                (false, false, "(") => CallKind::Function,
                (false, false, _) => continue,
            };

            let args = resolve(tree, id, name.as_str(), kind);
            match kind {
                CallKind::Function | CallKind::Static => {
                    let var = self.variable(scope, args, kind);
                    edits.push(Edit {
                        start: name.start(),
                        end: name.end(),
                        text: var.variable.clone(),
                    });
                }
                CallKind::New if tail.as_str() == "(" => {
                    let Some(closing) = self.closing_paren(tree, id, &body, tail.start()) else {
                        debug!(
                            node = %id,
                            symbol = name.as_str(),
                            "unbalanced constructor arguments, leaving call site untouched"
                        );
                        continue;
                    };
                    let var = self.variable(scope, args, kind);
                    let guard = var.guard();
                    edits.push(Edit {
                        start: whole.start(),
                        end: name.end(),
                        text: format!("({guard} ? {guard} : new {}", var.variable),
                    });
                    match closing {
                        Closing::Here(offset) => edits.push(Edit {
                            start: offset + 1,
                            end: offset + 1,
                            text: ")".to_string(),
                        }),
                        Closing::Sibling(sibling, offset) => sibling_edits.push((sibling, offset)),
                    }
                }
                CallKind::New => {
                    let var = self.variable(scope, args, kind);
                    let guard = var.guard();
                    edits.push(Edit {
                        start: whole.start(),
                        end: name.end(),
                        text: format!("({guard} ? {guard} : new {})", var.variable),
                    });
                }
            }
        }

        if edits.is_empty() {
            return;
        }
        trace!(node = %id, edits = edits.len(), "rewriting call sites");
        apply_edits(&mut tree.get_mut(id).body, edits);

        let mut by_sibling: IndexMap<NodeId, Vec<Edit>> = IndexMap::new();
        for (sibling, offset) in sibling_edits {
            by_sibling.entry(sibling).or_default().push(Edit {
                start: offset + 1,
                end: offset + 1,
                text: ")".to_string(),
            });
        }
        for (sibling, edits) in by_sibling {
            apply_edits(&mut tree.get_mut(sibling).body, edits);
        }
    }

    /// Variable for `args` in `scope`, created on first use.
    fn variable(
        &mut self,
        scope: &mut IndexMap<ResolutionArgs, Indirection>,
        args: ResolutionArgs,
        kind: CallKind,
    ) -> Indirection {
        if !scope.contains_key(&args) {
            let variable = self.next_variable();
            scope.insert(
                args.clone(),
                Indirection {
                    variable,
                    args: args.clone(),
                    is_instance: false,
                    is_static: false,
                },
            );
        }
        let entry = &mut scope[&args];
        entry.is_instance |= kind == CallKind::New;
        entry.is_static |= kind == CallKind::Static;
        entry.clone()
    }

    /// Find the `)` closing the argument list that opens at `open`,
    /// continuing into later code siblings when the list spans them.
    fn closing_paren(
        &self,
        tree: &NodeTree,
        id: NodeId,
        body: &str,
        open: usize,
    ) -> Option<Closing> {
        let mut scanner = BalanceScanner::new();
        if let Some(offset) = scanner.feed(&body[open..]) {
            return Some(Closing::Here(open + offset));
        }
        if scanner.state() == ScanState::Unbalanced {
            return None;
        }

        let parent = tree.get(id).parent?;
        let siblings = tree.children(parent);
        let index = siblings.iter().position(|s| *s == id)?;
        for sibling in siblings.iter().skip(index + 1).take(self.max_scan_nodes) {
            let node = tree.get(*sibling);
            match node.kind {
                NodeKind::Code => {
                    if let Some(offset) = scanner.feed(&node.body) {
                        return Some(Closing::Sibling(*sibling, offset));
                    }
                    if scanner.is_done() {
                        return None;
                    }
                }
                NodeKind::String
                | NodeKind::Comment
                | NodeKind::Attribute
                | NodeKind::Function
                | NodeKind::Class => {}
                _ => return None,
            }
        }
        scanner.abandon();
        None
    }
}

/// Whether the match starting at `start` is in call position rather than a
/// member access, variable or part of a longer name.
fn is_call_position(body: &str, start: usize) -> bool {
    let bytes = body.as_bytes();
    let Some(&prev) = start.checked_sub(1).and_then(|i| bytes.get(i)) else {
        return true;
    };
    if prev == b'$' || prev == b'\\' || is_identifier_byte(prev) {
        return false;
    }
    let before = body[..start].trim_end();
    if before.ends_with("->") || before.ends_with("::") {
        return false;
    }
    let word_start = before
        .bytes()
        .rposition(|b| !is_identifier_byte(b))
        .map_or(0, |i| i + 1);
    !before[word_start..].eq_ignore_ascii_case("function")
}

/// Index in `scope`'s children where a prologue goes.
///
/// At file level this is after the opening tag and any `declare`
/// statements, so `declare(strict_types=1)` stays first.
fn prologue_index(tree: &NodeTree, scope: NodeId) -> usize {
    if scope != tree.root() {
        return 0;
    }
    let mut index = 0;
    for (i, child) in tree.children(scope).iter().enumerate() {
        let node = tree.get(*child);
        match node.kind {
            NodeKind::Open if !node.body.starts_with("<?=") => index = i + 1,
            NodeKind::Declare => index = i + 1,
            NodeKind::Plain | NodeKind::Comment => {}
            NodeKind::Code if node.body.trim().is_empty() => {}
            _ => break,
        }
    }
    index
}

fn insertion_in_php(tree: &NodeTree, scope: NodeId, index: usize) -> bool {
    match index.checked_sub(1) {
        None => tree.get(scope).in_php,
        Some(prev) => {
            let prev = tree.get(tree.children(scope)[prev]);
            !matches!(prev.kind, NodeKind::Plain | NodeKind::Close)
        }
    }
}

impl Patcher for Monkey {
    fn process(&mut self, tree: &mut NodeTree, path: Option<&Path>) -> Result<()> {
        self.counter = 0;
        let mut scopes: IndexMap<NodeId, IndexMap<ResolutionArgs, Indirection>> = IndexMap::new();

        for id in tree.descendants(tree.root()) {
            if !tree.get(id).is_patchable_code() {
                continue;
            }
            let node = tree.get(id);
            let owner = node
                .function
                .or(node.namespace)
                .unwrap_or_else(|| tree.root());
            let scope = scopes.entry(owner).or_default();
            self.rewrite_node(tree, id, scope);
        }

        for (owner, variables) in scopes {
            if variables.is_empty() {
                continue;
            }
            let declarations: Vec<String> = variables
                .values()
                .map(|v| v.declaration(&self.resolver))
                .collect();
            let index = prologue_index(tree, owner);
            let in_php = insertion_in_php(tree, owner, index);
            let mut text = declarations.join(" ");
            if !in_php {
                text = format!("<?php {text} ?>");
            }
            let mut prologue = Node::new(NodeKind::Code, text);
            prologue.processable = false;
            prologue.in_php = in_php;
            let scope_node = tree.get(owner);
            prologue.namespace = if scope_node.kind == NodeKind::Namespace {
                Some(owner)
            } else {
                scope_node.namespace
            };
            prologue.function = (scope_node.kind == NodeKind::Function).then_some(owner);
            tree.insert(owner, index, prologue);
        }

        debug!(
            path = ?path,
            variables = self.counter,
            "monkey patched call sites"
        );
        Ok(())
    }

    fn process_backtrace(&self, options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
        if options.include_synthetic {
            return frames;
        }
        frames
            .into_iter()
            .filter(|f| !f.is_in_class(&self.resolver))
            .collect()
    }
}
