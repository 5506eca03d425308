//! `exit` / `die` interception.

use crate::node::NodeTree;
use crate::patcher::{BacktraceOptions, Frame, Patcher};
use graft_core::Result;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::trace;

/// Default quit class.
pub const DEFAULT_QUIT: &str = "\\Graft\\Quit";

static TERMINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<kw>exit|die)\b(?P<ws>\s*)(?P<next>[(;),\]]|$)").unwrap()
});

/// Termination call patcher.
#[derive(Debug, Clone)]
pub struct Quit {
    class: String,
}

impl Default for Quit {
    fn default() -> Self {
        Self::new()
    }
}

impl Quit {
    /// Patcher calling the default quit class.
    #[must_use]
    pub fn new() -> Self {
        Self {
            class: DEFAULT_QUIT.to_string(),
        }
    }

    /// Call `quit()` on `class` instead.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.class = format!("\\{}", class.trim_start_matches('\\'));
        self
    }

    /// Quit class, root-qualified.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Rewrite termination calls in `text`.
    #[must_use]
    pub fn rewrite(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in TERMINATION.captures_iter(text) {
            let (Some(kw), Some(next)) = (caps.name("kw"), caps.name("next")) else {
                continue;
            };
            if !is_call_position(text, kw.start()) {
                continue;
            }
            out.push_str(&text[last..kw.start()]);
            out.push_str(&self.class);
            out.push_str("::quit");
            if next.as_str() != "(" {
                out.push_str("()");
            }
            last = kw.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

fn is_call_position(text: &str, start: usize) -> bool {
    let before = &text[..start];
    if before.ends_with('$') || before.ends_with('\\') {
        return false;
    }
    let before = before.trim_end();
    !(before.ends_with("->") || before.ends_with("::") || before.ends_with("function"))
}

impl Patcher for Quit {
    fn process(&mut self, tree: &mut NodeTree, _path: Option<&Path>) -> Result<()> {
        for id in tree.descendants(tree.root()) {
            let node = tree.get(id);
            if !node.is_patchable_code() || !TERMINATION.is_match(&node.body) {
                continue;
            }
            let rewritten = self.rewrite(&node.body);
            if rewritten != node.body {
                trace!(node = %id, "rewrote termination calls");
                tree.get_mut(id).body = rewritten;
            }
        }
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
    use test_case::test_case;

    fn patch(src: &str) -> String {
        let parser = PhpParser::new();
        let mut tree = parser.parse(src).unwrap();
        Quit::new().process(&mut tree, None).unwrap();
        parser.unparse(&tree)
    }

    #[test_case("exit(1);", "\\Graft\\Quit::quit(1);" ; "exit with code")]
    #[test_case("die('bye');", "\\Graft\\Quit::quit('bye');" ; "die with message")]
    #[test_case("exit;", "\\Graft\\Quit::quit();" ; "bare exit")]
    #[test_case("EXIT ();", "\\Graft\\Quit::quit ();" ; "uppercase with space")]
    #[test_case("$f or die;", "$f or \\Graft\\Quit::quit();" ; "or die")]
    #[test_case("foo(exit, 1);", "foo(\\Graft\\Quit::quit(), 1);" ; "as argument")]
    fn rewrites(statement: &str, expected: &str) {
        let src = format!("<?php\n{statement}\n");
        assert_eq!(patch(&src), format!("<?php\n{expected}\n"));
    }

    #[test_case("$obj->exit();" ; "method")]
    #[test_case("Foo::die();" ; "static method")]
    #[test_case("$exit = 1;" ; "variable")]
    #[test_case("exiting();" ; "longer name")]
    #[test_case("echo 'exit;';" ; "string")]
    #[test_case("// die;" ; "comment")]
    fn leaves_untouched(statement: &str) {
        let src = format!("<?php\n{statement}\n");
        assert_eq!(patch(&src), src);
    }

    #[test]
    fn exit_before_close_tag() {
        assert_eq!(patch("<?php exit ?>x"), "<?php \\Graft\\Quit::quit() ?>x");
    }

    #[test]
    fn custom_class() {
        let quit = Quit::new().with_class("Kahlan\\Plugin\\Quit");
        assert_eq!(quit.rewrite("exit(2);"), "\\Kahlan\\Plugin\\Quit::quit(2);");
    }

    #[test]
    fn backtrace_elides_quit_frames() {
        let frames = vec![Frame::function("f"), Frame::method("\\Graft\\Quit", "quit")];
        let filtered = Quit::new().process_backtrace(&BacktraceOptions::default(), frames);
        assert_eq!(filtered, vec![Frame::function("f")]);
    }
}
