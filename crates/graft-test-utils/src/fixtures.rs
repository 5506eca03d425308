//! PHP source fixtures.

/// Collection of pre-built PHP sources.
#[derive(Debug)]
pub struct Fixtures;

impl Fixtures {
    /// Minimal class declaration.
    #[must_use]
    pub fn php_class_content(namespace: &str, class_name: &str) -> String {
        if namespace.is_empty() {
            format!("<?php\n\nclass {class_name}\n{{\n}}\n")
        } else {
            format!("<?php\n\nnamespace {namespace};\n\nclass {class_name}\n{{\n}}\n")
        }
    }

    /// Class touching every patcher: a function call, a static call, an
    /// instantiation, a path constant and an `exit`.
    #[must_use]
    pub fn service_class(namespace: &str, class_name: &str) -> String {
        format!(
            r"<?php

namespace {namespace};

use Psr\Log\LoggerInterface;

class {class_name}
{{
    public function __construct(private LoggerInterface $logger)
    {{
    }}

    public function roll(): int
    {{
        $value = rand(1, 6);
        $this->logger->info(sprintf('rolled %d', $value));
        return $value;
    }}

    public function clock(): \DateTimeImmutable
    {{
        return new \DateTimeImmutable('now');
    }}

    public function template(): string
    {{
        return file_get_contents(__DIR__ . '/template.txt');
    }}

    public function abort(string $reason): void
    {{
        Logger::emergency($reason);
        exit(1);
    }}
}}
"
        )
    }

    /// Namespaced free function calling a global function, as used by the
    /// end-to-end rewrite scenario.
    #[must_use]
    pub fn rand_function(namespace: &str) -> String {
        format!("<?php\nnamespace {namespace};\n\nfunction foo() {{ rand(1, 2); }}\n")
    }

    /// Multi-line constructor call.
    #[must_use]
    pub fn multiline_new() -> &'static str {
        "<?php\nfunction make() {\n    return new Client(\n        $endpoint,\n        ['timeout' => 3]\n    );\n}\n"
    }

    /// File mixing inline HTML and PHP blocks.
    #[must_use]
    pub fn template_file() -> &'static str {
        "<html>\n<body>\n<?php if (is_admin()) { ?>\n<p><?= h($name) ?></p>\n<?php } ?>\n</body>\n</html>\n"
    }

    /// Source that is not valid UTF-8.
    #[must_use]
    pub fn invalid_utf8() -> &'static [u8] {
        b"<?php\necho '\xff\xfe';\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_content_has_namespace() {
        let content = Fixtures::php_class_content("App\\Models", "User");
        assert!(content.contains("namespace App\\Models;"));
        assert!(content.contains("class User"));
    }

    #[test]
    fn class_content_without_namespace() {
        let content = Fixtures::php_class_content("", "Boot");
        assert!(!content.contains("namespace"));
    }

    #[test]
    fn service_class_is_complete() {
        let content = Fixtures::service_class("App", "Dice");
        assert!(content.starts_with("<?php"));
        assert!(content.contains("class Dice"));
        assert_eq!(content.matches('{').count(), content.matches('}').count());
    }

    #[test]
    fn invalid_utf8_is_invalid() {
        assert!(std::str::from_utf8(Fixtures::invalid_utf8()).is_err());
    }
}
