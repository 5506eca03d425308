//! PHP literal and identifier helpers.

/// Render `value` as a single-quoted PHP string literal.
///
/// Matches `var_export()` output for strings: backslashes and single quotes
/// are escaped, nothing else is.
#[must_use]
pub fn export_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\\' || ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Whether `byte` may start a PHP identifier.
#[must_use]
pub const fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80
}

/// Whether `byte` may continue a PHP identifier.
#[must_use]
pub const fn is_identifier_byte(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

/// Whether `name` is a bare PHP identifier (`Foo`, `_bar2`).
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((first, rest)) => {
            is_identifier_start(*first) && rest.iter().all(|b| is_identifier_byte(*b))
        }
        None => false,
    }
}

/// Whether `name` is a namespace-qualified name (`\A\B`, `A\B`, `B`).
#[must_use]
pub fn is_qualified_name(name: &str) -> bool {
    let name = name.strip_prefix('\\').unwrap_or(name);
    !name.is_empty() && name.split('\\').all(is_identifier)
}
