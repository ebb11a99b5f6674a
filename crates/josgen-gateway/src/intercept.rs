//! Outbound request interceptor
//!
//! Decides whether a request carries `Authorization: Bearer <token>`. Paths on
//! the skip-list (login, register, refresh, password reset) never do, and a
//! 401 on them is reported as-is instead of starting a refresh.

use josgen_auth::{SKIP_AUTH_PATHS, TokenStore};

/// Paths exempt from the bearer header and the 401 refresh flow.
///
/// `paths` match exactly; `patterns` ending in `*` match by prefix, other
/// patterns match exactly. Query strings and a trailing slash are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipList {
    paths: Vec<String>,
    patterns: Vec<String>,
}

impl Default for SkipList {
    fn default() -> Self {
        Self {
            paths: SKIP_AUTH_PATHS.iter().map(|p| p.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

impl SkipList {
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn with_patterns<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        patterns
            .into_iter()
            .fold(self, |list, pattern| list.with_pattern(pattern))
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        if self.paths.iter().any(|p| normalize(p) == path) {
            return true;
        }
        self.patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => normalize(pattern) == path,
        })
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

/// Access token to attach to a request for `path`, if any.
pub fn outbound_token(skip_list: &SkipList, tokens: &TokenStore, path: &str) -> Option<String> {
    if skip_list.matches(path) {
        return None;
    }
    tokens.access_token()
}
