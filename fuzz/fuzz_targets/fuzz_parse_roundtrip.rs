#![no_main]

use graft_jit::{PhpParser, SourceParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parser = PhpParser::new();
    let Ok(tree) = parser.parse_bytes(data, None) else {
        return;
    };
    // Rendering an untouched tree must reproduce the input exactly.
    let rendered = parser.unparse(&tree);
    assert_eq!(rendered.as_bytes(), data);
});
