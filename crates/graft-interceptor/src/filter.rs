//! Namespace include/exclude rules.

/// Prefix that matches every class.
pub const WILDCARD: &str = "*";

/// Decides which classes may be patched.
///
/// Exclusions are checked first and win. A `*` entry matches every class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Default for NamespaceFilter {
    fn default() -> Self {
        Self::new([WILDCARD], std::iter::empty::<&str>())
    }
}

impl NamespaceFilter {
    /// Filter from include and exclude prefixes. Leading `\` is ignored.
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            include: include.into_iter().map(|p| normalize(p.as_ref())).collect(),
            exclude: exclude.into_iter().map(|p| normalize(p.as_ref())).collect(),
        }
    }

    /// Whether `class` passes the rules.
    #[must_use]
    pub fn allowed(&self, class: &str) -> bool {
        let class = class.trim_start_matches('\\');
        if self.exclude.iter().any(|p| matches(p, class)) {
            return false;
        }
        self.include.iter().any(|p| matches(p, class))
    }

    /// Included prefixes.
    #[must_use]
    pub fn include(&self) -> &[String] {
        &self.include
    }

    /// Excluded prefixes.
    #[must_use]
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }
}

fn normalize(prefix: &str) -> String {
    prefix.trim_start_matches('\\').to_string()
}

fn matches(prefix: &str, class: &str) -> bool {
    prefix == WILDCARD || class.starts_with(prefix)
}
