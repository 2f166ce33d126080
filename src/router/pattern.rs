//! Route pattern compilation.
//!
//! A route format is a `/`-separated path in which a whole segment may be a
//! typed placeholder:
//!
//! | Token | Matches                                 | Example match |
//! |-------|-----------------------------------------|---------------|
//! | `%d`  | one or more ASCII digits                | `42`          |
//! | `%s`  | one or more ASCII alphanumerics or `_`  | `hello_1`     |
//!
//! The format is turned into an anchored regular expression. Literal text is
//! handed to the regex engine as written, so a format containing characters
//! the engine treats specially (an unbalanced `(`, say) fails to compile.

use regex::Regex;
use thiserror::Error;

const DIGITS: &str = "[0-9]+";
const WORD: &str = "[0-9A-Za-z_]+";

/// Errors raised while registering a route.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid route pattern {format:?}: {source}")]
    Invalid {
        format: String,
        #[source]
        source: regex::Error,
    },
}

/// One `/`-separated piece of a route format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// A segment starting with `%`; its path counterpart is captured by scan.
    Placeholder(String),
}

/// A compiled route format.
///
/// # Examples
///
/// ```
/// use baton::router::pattern::Pattern;
///
/// let pattern = Pattern::compile("/api/site/%d/%s").unwrap();
/// assert!(pattern.is_match("/api/site/1/hello"));
/// assert!(!pattern.is_match("/api/site/one/hello"));
/// assert!(!pattern.is_match("/api/site/1/hello/extra"));
/// assert_eq!(pattern.placeholder_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    format: String,
    matcher: Regex,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile `format` into a matcher.
    ///
    /// # Errors
    ///
    /// [`PatternError::Invalid`] when the generated expression is rejected by
    /// the regex engine.
    pub fn compile(format: &str) -> Result<Self, PatternError> {
        let expr = format!(
            "^{}$",
            format.replace("%d", DIGITS).replace("%s", WORD)
        );

        let matcher = Regex::new(&expr).map_err(|source| PatternError::Invalid {
            format: format.to_owned(),
            source,
        })?;

        Ok(Self {
            format: format.to_owned(),
            matcher,
            segments: split_segments(format)
                .map(|s| {
                    if s.starts_with('%') {
                        Segment::Placeholder(s.to_owned())
                    } else {
                        Segment::Literal(s.to_owned())
                    }
                })
                .collect(),
        })
    }

    /// Returns `true` if `path` matches the whole pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// The format string this pattern was compiled from.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder(_)))
            .count()
    }
}

/// Splits a path or format on `/` after dropping one leading slash.
pub(crate) fn split_segments(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_only_itself() {
        let p = Pattern::compile("/login").unwrap();
        assert!(p.is_match("/login"));
        assert!(!p.is_match("/login/"));
        assert!(!p.is_match("/logins"));
        assert!(!p.is_match("/api/login"));
    }

    #[test]
    fn root_pattern() {
        let p = Pattern::compile("/").unwrap();
        assert!(p.is_match("/"));
        assert!(!p.is_match("/x"));
        assert_eq!(p.segments(), &[Segment::Literal(String::new())]);
    }

    #[test]
    fn digit_placeholder_rejects_letters() {
        let p = Pattern::compile("/n/%d").unwrap();
        assert!(p.is_match("/n/0"));
        assert!(p.is_match("/n/4294967296"));
        assert!(!p.is_match("/n/"));
        assert!(!p.is_match("/n/-1"));
        assert!(!p.is_match("/n/12a"));
    }

    #[test]
    fn word_placeholder_character_class() {
        let p = Pattern::compile("/u/%s").unwrap();
        assert!(p.is_match("/u/Alice_01"));
        assert!(!p.is_match("/u/al-ice"));
        assert!(!p.is_match("/u/a.b"));
        assert!(!p.is_match("/u/a/b"));
    }

    #[test]
    fn segment_count_must_agree() {
        let p = Pattern::compile("/api/site/%d/%s").unwrap();
        assert!(p.is_match("/api/site/1/hello"));
        assert!(!p.is_match("/api/site/1"));
        assert!(!p.is_match("/api/site/1/hello/2"));
        assert!(!p.is_match("/prefix/api/site/1/hello"));
    }

    #[test]
    fn segments_record_placeholder_positions() {
        let p = Pattern::compile("/api/site/%d/%s").unwrap();
        assert_eq!(
            p.segments(),
            &[
                Segment::Literal("api".into()),
                Segment::Literal("site".into()),
                Segment::Placeholder("%d".into()),
                Segment::Placeholder("%s".into()),
            ]
        );
        assert_eq!(p.placeholder_count(), 2);
        assert_eq!(p.format(), "/api/site/%d/%s");
    }

    #[test]
    fn unbalanced_literal_is_invalid() {
        let err = Pattern::compile("/files/(%d").unwrap_err();
        let PatternError::Invalid { format, .. } = &err;
        assert_eq!(format, "/files/(%d");
        assert!(err.to_string().starts_with("invalid route pattern"));
    }
}
