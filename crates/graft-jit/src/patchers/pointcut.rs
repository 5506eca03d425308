//! Method entry interception.
//!
//! Every concrete method of a class, trait or enum starts with a hook call.
//! When the hook returns a callable, the method returns that callable's
//! result instead of running its own body.

use crate::node::{Node, NodeId, NodeKind, NodeTree};
use crate::patcher::{BacktraceOptions, Frame, Patcher};
use graft_core::Result;
use std::path::Path;
use tracing::debug;

/// Default hook class.
pub const DEFAULT_POINTCUT: &str = "\\Graft\\Pointcut";

/// Method entry patcher.
#[derive(Debug, Clone)]
pub struct Pointcut {
    class: String,
    prefix: String,
}

impl Default for Pointcut {
    fn default() -> Self {
        Self::new()
    }
}

impl Pointcut {
    /// Patcher calling the default hook class.
    #[must_use]
    pub fn new() -> Self {
        Self {
            class: DEFAULT_POINTCUT.to_string(),
            prefix: super::monkey::DEFAULT_PREFIX.to_string(),
        }
    }

    /// Call `before()` on `class` instead.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.class = format!("\\{}", class.trim_start_matches('\\'));
        self
    }

    /// Use `prefix` in the prologue's local variable names.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Hook class, root-qualified.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    fn prologue(&self, method: &Node) -> String {
        let args = format!("$__{}_ARGS__", self.prefix);
        let this = format!("$__{}_SELF__", self.prefix);
        let hook = format!("$__{}_HOOK__", self.prefix);
        let call = format!("{hook}({args}, {this})");
        let exit = match method.return_type.as_deref().map(str::to_ascii_lowercase) {
            _ if method.is_generator => format!("yield {call}; return;"),
            Some(ty) if ty == "void" => format!("{call}; return;"),
            Some(ty) if ty == "never" => format!(
                "{call}; throw new \\LogicException('never-returning method returned from its hook');"
            ),
            _ => format!("return {call};"),
        };
        format!(
            "{args} = func_get_args(); {this} = isset($this) ? $this : get_called_class(); \
             if ({hook} = {}::before(__METHOD__, {this}, {args})) {{ {exit} }}",
            self.class
        )
    }

    fn methods(tree: &NodeTree) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|id| {
                let node = tree.get(*id);
                matches!(node.kind, NodeKind::Class | NodeKind::Trait | NodeKind::Enum)
            })
            .flat_map(|class| tree.children(class).to_vec())
            .filter(|id| {
                let node = tree.get(*id);
                node.kind == NodeKind::Function
                    && node.is_method
                    && node.processable
                    && !node.is_abstract
            })
            .collect()
    }
}

impl Patcher for Pointcut {
    fn process(&mut self, tree: &mut NodeTree, path: Option<&Path>) -> Result<()> {
        let methods = Self::methods(tree);
        for method in &methods {
            let node = tree.get(*method);
            let mut prologue = Node::new(NodeKind::Code, self.prologue(node));
            prologue.processable = false;
            prologue.namespace = node.namespace;
            prologue.function = Some(*method);
            tree.unshift(*method, prologue);
        }
        debug!(path = ?path, methods = methods.len(), "pointcut hooks injected");
        Ok(())
    }

    fn process_backtrace(&self, options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
        if options.include_synthetic {
            return frames;
        }
        frames
            .into_iter()
            .filter(|f| !f.is_in_class(&self.class))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PhpParser, SourceParser};
    use pretty_assertions::assert_eq;

    fn patch(src: &str) -> String {
        let parser = PhpParser::new();
        let mut tree = parser.parse(src).unwrap();
        Pointcut::new().process(&mut tree, None).unwrap();
        parser.unparse(&tree)
    }

    const HOOK: &str = "$__GRAFT_ARGS__ = func_get_args(); $__GRAFT_SELF__ = isset($this) ? $this : get_called_class(); if ($__GRAFT_HOOK__ = \\Graft\\Pointcut::before(__METHOD__, $__GRAFT_SELF__, $__GRAFT_ARGS__)) { ";

    #[test]
    fn prepends_hook_to_concrete_methods() {
        let src = "<?php\nclass Foo {\n    public function bar($x) {\n        return $x;\n    }\n}\n";
        let expected = format!(
            "<?php\nclass Foo {{\n    public function bar($x) {{{HOOK}return $__GRAFT_HOOK__($__GRAFT_ARGS__, $__GRAFT_SELF__); }}\n        return $x;\n    }}\n}}\n"
        );
        assert_eq!(patch(src), expected);
    }

    #[test]
    fn generator_methods_yield() {
        let out = patch("<?php\ntrait T {\n    public function items() { yield 1; }\n}\n");
        assert!(out.contains("{ yield $__GRAFT_HOOK__($__GRAFT_ARGS__, $__GRAFT_SELF__); return; }"));
    }

    #[test]
    fn void_methods_return_nothing() {
        let out = patch("<?php\nenum E {\n    public function log(): void { }\n}\n");
        assert!(out.contains("{ $__GRAFT_HOOK__($__GRAFT_ARGS__, $__GRAFT_SELF__); return; }"));
    }

    #[test]
    fn never_methods_do_not_return() {
        let out = patch("<?php\nclass A {\n    public function fail(): never { throw new E(); }\n}\n");
        assert!(out.contains("throw new \\LogicException("));
        assert!(!out.contains("return"));
    }

    #[test]
    fn skips_abstract_interface_and_free_functions() {
        let src = "<?php\ninterface I {\n    public function a();\n}\nabstract class B {\n    abstract public function b();\n}\nfunction c() { return 1; }\n$d = function () { return 2; };\n";
        assert_eq!(patch(src), src);
    }

    #[test]
    fn closures_inside_methods_are_not_hooked() {
        let out = patch("<?php\nclass A {\n    public function run() {\n        return function () { return 1; };\n    }\n}\n");
        assert_eq!(out.matches("::before(").count(), 1);
    }

    #[test]
    fn custom_class_and_prefix() {
        let mut pointcut = Pointcut::new().with_class("Kahlan\\Plugin\\Pointcut").with_prefix("K");
        let parser = PhpParser::new();
        let mut tree = parser
            .parse("<?php\nclass A { function b() {} }\n")
            .unwrap();
        pointcut.process(&mut tree, None).unwrap();
        let out = parser.unparse(&tree);
        assert!(out.contains("$__K_HOOK__ = \\Kahlan\\Plugin\\Pointcut::before(__METHOD__"));
    }

    #[test]
    fn backtrace_elides_hook_frames() {
        let frames = vec![Frame::method("Graft\\Pointcut", "before"), Frame::function("f")];
        let filtered = Pointcut::new().process_backtrace(&BacktraceOptions::default(), frames);
        assert_eq!(filtered, vec![Frame::function("f")]);
    }
}
