//! Filename pattern matching.
//!
//! Patterns are regular expressions matched (unanchored) against the final
//! path component. The literal `*` and the empty string match every name.

use regex::Regex;

/// The pattern meaning "match all".
pub const MATCH_ALL: &str = "*";

/// A compiled filename pattern.
#[derive(Debug, Clone, Default)]
pub enum NamePattern {
    /// Matches every filename.
    #[default]
    Any,
    /// Matches filenames containing a match of the regex.
    Regex(Regex),
}

impl NamePattern {
    /// Compile a pattern string.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern is not `*`/empty and fails to compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupsweep::scanner::NamePattern;
    ///
    /// assert!(NamePattern::parse("*").unwrap().is_match("anything"));
    /// assert!(NamePattern::parse(r"\.jpe?g$").unwrap().is_match("photo.jpeg"));
    /// assert!(NamePattern::parse("(").is_err());
    /// ```
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == MATCH_ALL {
            return Ok(Self::Any);
        }
        Regex::new(trimmed).map(Self::Regex)
    }

    /// Check whether a filename passes the pattern.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Regex(re) => re.is_match(name),
        }
    }

    /// The source text of the pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => MATCH_ALL,
            Self::Regex(re) => re.as_str(),
        }
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
