//! Glob pattern matching for object keys.
//!
//! Key patterns follow shell `fnmatch` rules rather than path-aware globbing:
//! - `*` matches any sequence of characters, including `/`
//! - `?` matches any single character
//! - `[abc]` / `[!abc]` match character classes
//! - a backslash escapes the next character
//!
//! ## Literal keys
//!
//! Keys that legitimately contain metacharacters can be matched literally by
//! escaping them first:
//!
//! ```
//! use rusty_s3access_query::glob::{escape_glob, GlobPattern};
//!
//! let pattern = GlobPattern::new(&format!("{}/*.csv", escape_glob("run[1]"))).unwrap();
//!
//! assert!(pattern.matches("run[1]/part-0.csv"));
//! assert!(!pattern.matches("run1/part-0.csv"));
//! ```

use globset::{GlobBuilder, GlobMatcher};

use crate::error::QueryError;

/// Characters with a special meaning in a key pattern.
const GLOB_METACHARACTERS: [char; 4] = ['*', '?', '[', ']'];

/// Escape glob metacharacters so the string matches only itself.
///
/// # Arguments
/// * `s` - String to escape
///
/// # Returns
/// A new string with `* ? [ ]` and backslashes escaped.
///
/// # Example
/// ```
/// use rusty_s3access_query::glob::escape_glob;
///
/// assert_eq!(escape_glob("file[1].csv"), r"file\[1\].csv");
/// assert_eq!(escape_glob("part*.csv"), r"part\*.csv");
/// ```
pub fn escape_glob(s: &str) -> String {
    let mut escaped: String = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '\\' || GLOB_METACHARACTERS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Check whether a key contains any unescaped glob metacharacter.
///
/// # Arguments
/// * `key` - Object key or key pattern
pub fn is_glob(key: &str) -> bool {
    first_metacharacter(key).is_some()
}

/// Byte offset of the first unescaped metacharacter in `key`.
fn first_metacharacter(key: &str) -> Option<usize> {
    let mut escaped: bool = false;
    for (idx, ch) in key.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if GLOB_METACHARACTERS.contains(&ch) {
            return Some(idx);
        }
    }
    None
}

/// Remove escaping backslashes.
fn unescape(s: &str) -> String {
    let mut out: String = String::with_capacity(s.len());
    let mut escaped: bool = false;
    for ch in s.chars() {
        if !escaped && ch == '\\' {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(ch);
    }
    out
}

/// Literal listing prefix of a key pattern.
///
/// The pattern is cut at its first unescaped metacharacter and the remainder
/// is unescaped, so the result can be sent as a flat listing prefix. Every key
/// matching the pattern starts with this prefix.
///
/// # Arguments
/// * `key` - Key pattern
///
/// # Returns
/// The literal prefix, or the whole unescaped key if it has no metacharacter.
pub fn glob_prefix(key: &str) -> String {
    match first_metacharacter(key) {
        Some(idx) => unescape(&key[..idx]),
        None => unescape(key),
    }
}

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    matcher: GlobMatcher,
}

impl GlobPattern {
    /// Compile a key pattern.
    ///
    /// # Arguments
    /// * `pattern` - Key pattern with `fnmatch` semantics
    ///
    /// # Errors
    /// Returns `QueryError::InvalidGlobPattern` if the pattern does not compile,
    /// e.g. an unclosed character class.
    pub fn new(pattern: &str) -> Result<Self, QueryError> {
        // Braces are literal in fnmatch but alternations in globset.
        let mut translated: String = String::with_capacity(pattern.len());
        let mut escaped: bool = false;
        for ch in pattern.chars() {
            if !escaped && (ch == '{' || ch == '}') {
                translated.push('\\');
            }
            escaped = !escaped && ch == '\\';
            translated.push(ch);
        }

        let matcher: GlobMatcher = GlobBuilder::new(&translated)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| QueryError::InvalidGlobPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Check whether a key matches the whole pattern.
    ///
    /// # Arguments
    /// * `key` - Candidate object key
    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    /// The literal listing prefix of this pattern.
    pub fn prefix(&self) -> String {
        glob_prefix(&self.pattern)
    }

    /// The pattern as given.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob() {
        assert!(is_glob("data/*.csv"));
        assert!(is_glob("data/part-?.csv"));
        assert!(is_glob("data/[ab].csv"));
        assert!(is_glob("data/]"));
        assert!(!is_glob("data/file.csv"));
        assert!(!is_glob(r"data/file\*.csv"));
        assert!(!is_glob(""));
    }

    #[test]
    fn test_glob_prefix_cuts_at_first_star() {
        assert_eq!(glob_prefix("year=2020/*/data.csv"), "year=2020/");
        assert_eq!(glob_prefix("*"), "");
        assert_eq!(glob_prefix("plain/key"), "plain/key");
    }

    #[test]
    fn test_glob_prefix_cuts_at_other_metacharacters() {
        assert_eq!(glob_prefix("logs/day-?/*.csv"), "logs/day-");
        assert_eq!(glob_prefix("logs/[0-9]*"), "logs/");
    }

    #[test]
    fn test_glob_prefix_unescapes() {
        assert_eq!(glob_prefix(r"odd\*name/*.csv"), "odd*name/");
    }

    #[test]
    fn test_star_crosses_separator() {
        let pattern: GlobPattern = GlobPattern::new("table/*.csv").unwrap();
        assert!(pattern.matches("table/a.csv"));
        assert!(pattern.matches("table/country=USA/a.csv"));
        assert!(!pattern.matches("table/a.json"));
        assert!(!pattern.matches("other/a.csv"));
    }

    #[test]
    fn test_question_mark_and_class() {
        let pattern: GlobPattern = GlobPattern::new("p/part-?[0-3].csv").unwrap();
        assert!(pattern.matches("p/part-a1.csv"));
        assert!(!pattern.matches("p/part-a7.csv"));
        assert!(!pattern.matches("p/part-ab1.csv"));
    }

    #[test]
    fn test_braces_are_literal() {
        let pattern: GlobPattern = GlobPattern::new("p/{a,b}*").unwrap();
        assert!(pattern.matches("p/{a,b}.csv"));
        assert!(!pattern.matches("p/a.csv"));
    }

    #[test]
    fn test_escape_round_trip() {
        let literal: &str = "run[1]/out*.csv";
        let pattern: GlobPattern = GlobPattern::new(&escape_glob(literal)).unwrap();
        assert!(pattern.matches(literal));
        assert!(!pattern.matches("run1/out.csv"));
        assert!(!is_glob(&escape_glob(literal)));
    }

    #[test]
    fn test_invalid_pattern() {
        let result: Result<GlobPattern, QueryError> = GlobPattern::new("data/[abc");
        assert!(matches!(
            result,
            Err(QueryError::InvalidGlobPattern { .. })
        ));
    }

    #[test]
    fn test_pattern_prefix() {
        let pattern: GlobPattern = GlobPattern::new("a/b=1/*").unwrap();
        assert_eq!(pattern.prefix(), "a/b=1/");
        assert_eq!(pattern.as_str(), "a/b=1/*");
    }
}
