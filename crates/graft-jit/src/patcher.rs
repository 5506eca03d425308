//! Patcher capability and the ordered pipeline that runs them.

use crate::node::NodeTree;
use crate::parser::SourceParser;
use graft_core::{Error, Result};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Resolves a class name to the file that declares it.
pub trait ClassLocator: fmt::Debug {
    /// Path of the file declaring `class`, if one exists.
    fn find_file(&self, class: &str) -> Option<PathBuf>;
}

/// One stack frame as reported by the host runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// File the frame executes in.
    pub file: Option<PathBuf>,
    /// Line number in `file`.
    pub line: Option<u32>,
    /// Function or method name.
    pub function: Option<String>,
    /// Declaring class for method frames.
    pub class: Option<String>,
}

impl Frame {
    /// Frame for a method call.
    #[must_use]
    pub fn method(class: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            function: Some(function.into()),
            ..Self::default()
        }
    }

    /// Frame for a plain function call.
    #[must_use]
    pub fn function(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            ..Self::default()
        }
    }

    /// Whether the frame belongs to `class` (compared without a leading `\`).
    #[must_use]
    pub fn is_in_class(&self, class: &str) -> bool {
        let class = class.trim_start_matches('\\');
        self.class
            .as_deref()
            .is_some_and(|c| c.trim_start_matches('\\').eq_ignore_ascii_case(class))
    }
}

/// Options for [`Patchers::process_backtrace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacktraceOptions {
    /// Keep frames injected by patchers.
    pub include_synthetic: bool,
    /// Keep at most this many frames.
    pub depth: Option<usize>,
}

/// A pluggable source rewriter.
///
/// Every hook but [`Patcher::process`] has a pass-through default.
pub trait Patcher: fmt::Debug + Send {
    /// Override the file resolved for `class`. `file` is the candidate
    /// produced so far by the locator and earlier patchers.
    fn find_file(
        &self,
        locator: &dyn ClassLocator,
        class: &str,
        file: Option<PathBuf>,
    ) -> Option<PathBuf> {
        let _ = (locator, class);
        file
    }

    /// Whether this patcher accepts `class`.
    fn patchable(&self, class: &str) -> bool {
        let _ = class;
        true
    }

    /// Rewrite `tree` in place. `path` is the original source location.
    fn process(&mut self, tree: &mut NodeTree, path: Option<&Path>) -> Result<()>;

    /// Remove frames this patcher injected into the call stack.
    fn process_backtrace(&self, options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
        let _ = options;
        frames
    }
}

/// Ordered, named registry of patchers.
///
/// Registration order is execution order: each patcher sees the nodes
/// injected by the ones before it.
#[derive(Default)]
pub struct Patchers {
    patchers: IndexMap<String, Box<dyn Patcher>>,
}

impl fmt::Debug for Patchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patchers")
            .field("names", &self.patchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Patchers {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `patcher` under `name`. Re-registering a name replaces the
    /// patcher but keeps its original position.
    pub fn add(&mut self, name: impl Into<String>, patcher: impl Patcher + 'static) -> &mut Self {
        self.add_boxed(name, Box::new(patcher))
    }

    /// Register an already boxed patcher.
    pub fn add_boxed(&mut self, name: impl Into<String>, patcher: Box<dyn Patcher>) -> &mut Self {
        let name = name.into();
        debug!(patcher = %name, "registered patcher");
        self.patchers.insert(name, patcher);
        self
    }

    /// Patcher registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Patcher> {
        self.patchers.get(name).map(|p| &**p)
    }

    /// Mutable access to the patcher registered under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Patcher>> {
        self.patchers.get_mut(name)
    }

    /// Whether a patcher is registered under `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.patchers.contains_key(name)
    }

    /// Unregister `name`, keeping the order of the remaining patchers.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Patcher>> {
        self.patchers.shift_remove(name)
    }

    /// Unregister every patcher.
    pub fn clear(&mut self) {
        self.patchers.clear();
    }

    /// Registered names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patchers.keys().map(String::as_str)
    }

    /// Number of registered patchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patchers.len()
    }

    /// Whether no patcher is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patchers.is_empty()
    }

    /// Run every patcher over `tree` in registration order.
    ///
    /// The first failure aborts the run and names the failing patcher.
    pub fn process(&mut self, tree: &mut NodeTree, path: Option<&Path>) -> Result<()> {
        for (name, patcher) in &mut self.patchers {
            trace!(patcher = %name, path = ?path, "running patcher");
            patcher.process(tree, path).map_err(|e| match e {
                Error::Patcher { .. } => e,
                other => Error::patcher(name.clone(), path.map(Path::to_path_buf), other.to_string()),
            })?;
        }
        Ok(())
    }

    /// Parse `source`, run the pipeline and render the result.
    pub fn patch_source(
        &mut self,
        parser: &dyn SourceParser,
        source: &str,
        path: Option<&Path>,
    ) -> Result<String> {
        let mut tree = parser.parse(source).map_err(|e| match path {
            Some(p) => e.with_path(p),
            None => e,
        })?;
        self.process(&mut tree, path)?;
        Ok(parser.unparse(&tree))
    }

    /// Resolve the file for `class`, letting each patcher override the
    /// candidate in turn.
    pub fn find_file(&self, locator: &dyn ClassLocator, class: &str) -> Option<PathBuf> {
        let initial = locator.find_file(class);
        self.patchers
            .values()
            .fold(initial, |file, patcher| patcher.find_file(locator, class, file))
    }

    /// Whether every patcher accepts `class`.
    #[must_use]
    pub fn patchable(&self, class: &str) -> bool {
        self.patchers.values().all(|p| p.patchable(class))
    }

    /// Let each patcher elide its synthetic frames, then truncate to the
    /// requested depth.
    #[must_use]
    pub fn process_backtrace(&self, options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
        let mut frames = self
            .patchers
            .values()
            .fold(frames, |frames, p| p.process_backtrace(options, frames));
        if let Some(depth) = options.depth {
            frames.truncate(depth);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};
    use crate::parser::PhpParser;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Append {
        text: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Patcher for Append {
        fn process(&mut self, tree: &mut NodeTree, _path: Option<&Path>) -> Result<()> {
            self.log.lock().unwrap().push(self.text);
            let root = tree.root();
            tree.append(root, Node::new(NodeKind::Code, self.text));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Patcher for Failing {
        fn process(&mut self, _tree: &mut NodeTree, _path: Option<&Path>) -> Result<()> {
            Err(Error::invalid_tree("no namespace reference"))
        }

        fn patchable(&self, class: &str) -> bool {
            !class.starts_with("Vendor\\")
        }
    }

    #[derive(Debug)]
    struct Redirect;

    impl Patcher for Redirect {
        fn find_file(
            &self,
            _locator: &dyn ClassLocator,
            class: &str,
            file: Option<PathBuf>,
        ) -> Option<PathBuf> {
            if class == "Moved" {
                Some(PathBuf::from("/moved.php"))
            } else {
                file
            }
        }

        fn process(&mut self, _tree: &mut NodeTree, _path: Option<&Path>) -> Result<()> {
            Ok(())
        }

        fn process_backtrace(&self, _options: &BacktraceOptions, frames: Vec<Frame>) -> Vec<Frame> {
            frames.into_iter().filter(|f| !f.is_in_class("Hidden")).collect()
        }
    }

    #[derive(Debug)]
    struct MapLocator;

    impl ClassLocator for MapLocator {
        fn find_file(&self, class: &str) -> Option<PathBuf> {
            (class != "Missing").then(|| PathBuf::from(format!("/src/{class}.php")))
        }
    }

    fn logging(text: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Append {
        Append {
            text,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn process_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut patchers = Patchers::new();
        patchers.add("b", logging("b", &log));
        patchers.add("a", logging("a", &log));

        let mut tree = NodeTree::new();
        patchers.process(&mut tree, None).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
        assert_eq!(tree.render(), "ba");
    }

    #[test]
    fn remove_keeps_order_and_re_add_keeps_position() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut patchers = Patchers::new();
        patchers.add("one", logging("1", &log));
        patchers.add("two", logging("2", &log));
        patchers.add("three", logging("3", &log));
        assert!(patchers.remove("two").is_some());
        patchers.add("one", logging("!", &log));

        assert_eq!(patchers.names().collect::<Vec<_>>(), vec!["one", "three"]);
        assert!(patchers.get("three").is_some());
        assert!(patchers.get("two").is_none());

        patchers.clear();
        assert!(patchers.is_empty());
    }

    #[test]
    fn failure_aborts_and_names_patcher() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut patchers = Patchers::new();
        patchers.add("broken", Failing);
        patchers.add("after", logging("after", &log));

        let mut tree = NodeTree::new();
        let err = patchers
            .process(&mut tree, Some(Path::new("/src/Foo.php")))
            .unwrap_err();

        assert_eq!(err.code(), graft_core::ErrorCode::E0201);
        assert!(err.to_string().contains("'broken'"));
        assert_eq!(err.path(), Some(Path::new("/src/Foo.php")));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn find_file_chains_through_patchers() {
        let mut patchers = Patchers::new();
        patchers.add("redirect", Redirect);

        assert_eq!(
            patchers.find_file(&MapLocator, "Foo"),
            Some(PathBuf::from("/src/Foo.php"))
        );
        assert_eq!(
            patchers.find_file(&MapLocator, "Moved"),
            Some(PathBuf::from("/moved.php"))
        );
        assert_eq!(patchers.find_file(&MapLocator, "Missing"), None);
    }

    #[test]
    fn patchable_requires_every_patcher() {
        let mut patchers = Patchers::new();
        patchers.add("redirect", Redirect);
        assert!(patchers.patchable("Vendor\\Lib"));
        patchers.add("picky", Failing);
        assert!(!patchers.patchable("Vendor\\Lib"));
        assert!(patchers.patchable("App\\Lib"));
    }

    #[test]
    fn backtrace_filters_then_truncates() {
        let mut patchers = Patchers::new();
        patchers.add("redirect", Redirect);
        let frames = vec![
            Frame::method("\\Hidden", "patched"),
            Frame::function("a"),
            Frame::function("b"),
            Frame::function("c"),
        ];
        let options = BacktraceOptions {
            include_synthetic: false,
            depth: Some(2),
        };

        let frames = patchers.process_backtrace(&options, frames);
        assert_eq!(frames, vec![Frame::function("a"), Frame::function("b")]);
    }

    #[test]
    fn patch_source_round_trips_without_patchers() {
        let mut patchers = Patchers::new();
        let src = "<?php\nnamespace A;\nfoo();\n";
        assert_eq!(patchers.patch_source(&PhpParser::new(), src, None).unwrap(), src);
    }
}
