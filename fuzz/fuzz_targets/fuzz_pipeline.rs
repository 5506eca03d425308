#![no_main]

use arbitrary::Arbitrary;
use graft_jit::{Monkey, Patchers, PhpParser, Pointcut, Quit, Rebase};
use libfuzzer_sys::fuzz_target;
use std::path::Path;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    source: &'a str,
    max_scan_nodes: u8,
    with_path: bool,
}

fuzz_target!(|input: Input<'_>| {
    let mut patchers = Patchers::new();
    patchers
        .add(
            "monkey",
            Monkey::new().with_max_scan_nodes(usize::from(input.max_scan_nodes.max(1))),
        )
        .add("pointcut", Pointcut::new())
        .add("rebase", Rebase::new())
        .add("quit", Quit::new());

    let path = input.with_path.then(|| Path::new("/srv/app/src/Fuzz.php"));
    if let Ok(out) = patchers.patch_source(&PhpParser::new(), input.source, path) {
        assert_eq!(
            out.matches('\n').count(),
            input.source.matches('\n').count(),
            "patching must not move code across lines"
        );
    }
});
