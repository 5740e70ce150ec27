//! Count extraction from aggregate responses.
//!
//! The aggregate endpoint groups matching entries by `log.source`. The body is
//! scanned as text for the first `"<source>": <int>` pair instead of being
//! deserialized, so the extractor does not depend on the response layout.
//! A source missing from the body means no entries matched.

use regex::Regex;

use crate::error::Result;

/// Extracts the entry count of one source from aggregate response bodies.
#[derive(Debug, Clone)]
pub struct CountExtractor {
    source: String,
    pattern: Regex,
}

impl CountExtractor {
    /// Compiles the count pattern for `source`.
    ///
    /// The source is matched in its JSON-escaped form, the way it appears as a
    /// key in the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern cannot be compiled.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let key = serde_json::to_string(&source)?;
        let pattern = Regex::new(&format!(r"{}:\s?([0-9]+)", regex::escape(&key)))?;
        Ok(Self { source, pattern })
    }

    /// The source this extractor counts.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the count attributed to the source, or 0 if it is absent.
    ///
    /// Only ASCII digits form a count. Counts too large for `u64` saturate.
    #[must_use]
    pub fn extract(&self, body: &str) -> u64 {
        self.pattern
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map_or(0, |m| m.as_str().parse().unwrap_or(u64::MAX))
    }
}
