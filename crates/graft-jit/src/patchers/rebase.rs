//! `__DIR__` and `__FILE__` rebasing.
//!
//! Patched files run from the cache directory, so the magic path constants
//! are replaced with literals naming the original location.

use crate::node::{NodeKind, NodeTree};
use crate::patcher::Patcher;
use graft_core::php::is_identifier_byte;
use graft_core::{Result, export_string};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

static MAGIC_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b__(?P<which>dir|file)__\b").unwrap());

/// Path constant patcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rebase;

impl Rebase {
    /// Create the patcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Replace the magic constants in `text`.
    #[must_use]
    pub fn rebase(text: &str, dir: &str, file: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in MAGIC_PATH.captures_iter(text) {
            let (Some(whole), Some(which)) = (caps.get(0), caps.name("which")) else {
                continue;
            };
            if !is_constant_position(text, whole.start()) {
                continue;
            }
            out.push_str(&text[last..whole.start()]);
            if which.as_str().eq_ignore_ascii_case("dir") {
                out.push_str(dir);
            } else {
                out.push_str(file);
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

fn is_constant_position(text: &str, start: usize) -> bool {
    let before = &text[..start];
    let Some(prev) = before.bytes().last() else {
        return true;
    };
    if prev == b'$' || prev == b'\\' || is_identifier_byte(prev) {
        return false;
    }
    let before = before.trim_end();
    !(before.ends_with("->") || before.ends_with("::"))
}

impl Patcher for Rebase {
    fn process(&mut self, tree: &mut NodeTree, path: Option<&Path>) -> Result<()> {
        let Some(path) = path else {
            return Ok(());
        };
        let file = export_string(&path.to_string_lossy());
        let dir = export_string(
            &path
                .parent()
                .map_or_else(|| ".".into(), |p| p.to_string_lossy()),
        );

        for id in tree.descendants(tree.root()) {
            let node = tree.get(id);
            // Includes class bodies and signatures.
            if !matches!(node.kind, NodeKind::Code | NodeKind::Function) {
                continue;
            }
            if !MAGIC_PATH.is_match(&node.body) {
                continue;
            }
            let rebased = Self::rebase(&node.body, &dir, &file);
            if rebased != node.body {
                trace!(node = %id, "rebased path constants");
                tree.get_mut(id).body = rebased;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PhpParser, SourceParser};
    use pretty_assertions::assert_eq;

    fn patch(src: &str, path: Option<&Path>) -> String {
        let parser = PhpParser::new();
        let mut tree = parser.parse(src).unwrap();
        Rebase::new().process(&mut tree, path).unwrap();
        parser.unparse(&tree)
    }

    #[test]
    fn replaces_both_constants() {
        let out = patch(
            "<?php\nrequire __DIR__ . '/boot.php';\necho __FILE__;\n",
            Some(Path::new("/app/src/index.php")),
        );
        assert_eq!(
            out,
            "<?php\nrequire '/app/src' . '/boot.php';\necho '/app/src/index.php';\n"
        );
    }

    #[test]
    fn escapes_quotes_in_paths() {
        let out = patch("<?php\n$a = __DIR__;\n", Some(Path::new("/it's/a.php")));
        assert_eq!(out, "<?php\n$a = '/it\\'s';\n");
    }

    #[test]
    fn rewrites_class_constants_and_defaults() {
        let out = patch(
            "<?php\nclass A {\n    const ROOT = __DIR__;\n    function f($p = __FILE__) {}\n}\n",
            Some(Path::new("/x/A.php")),
        );
        assert!(out.contains("const ROOT = '/x';"));
        assert!(out.contains("function f($p = '/x/A.php') {}"));
    }

    #[test]
    fn leaves_strings_comments_and_members_alone() {
        let src = "<?php\n// __DIR__\n$a = '__FILE__'; $b = $__DIR__; $c->__DIR__; X::__FILE__; $d = __DIRX__;\n";
        assert_eq!(patch(src, Some(Path::new("/x/a.php"))), src);
    }

    #[test]
    fn case_insensitive() {
        let out = patch("<?php\n$a = __dir__;\n", Some(Path::new("/x/a.php")));
        assert_eq!(out, "<?php\n$a = '/x';\n");
    }

    #[test]
    fn no_path_is_a_no_op() {
        let src = "<?php\n$a = __DIR__;\n";
        assert_eq!(patch(src, None), src);
    }
}
