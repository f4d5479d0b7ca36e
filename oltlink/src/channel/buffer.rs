//! Pattern buffer with tail-search optimization.
//!
//! Only the last N bytes of the buffer are searched for the expected marker.
//! A full `display ont info 0 all` on a busy chassis runs to hundreds of
//! kilobytes, and rescanning it after every chunk would be quadratic.

use regex::bytes::Regex;

/// What a command waits for before its output is considered complete.
#[derive(Debug, Clone)]
pub struct Expect {
    pattern: Regex,
    source: String,
}

impl Expect {
    /// Wait for a literal string.
    pub fn literal(text: &str) -> Self {
        Self {
            pattern: Regex::new(&regex::escape(text)).expect("escaped literal is a valid regex"),
            source: text.to_string(),
        }
    }

    /// Wait for a regular expression.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            source: pattern.to_string(),
        })
    }

    /// The literal or pattern text this was built from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The compiled pattern.
    pub fn regex(&self) -> &Regex {
        &self.pattern
    }
}

/// Buffer for accumulating raw output and searching its tail.
#[derive(Debug)]
pub struct PatternBuffer {
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append raw device output.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Whether the tail of the buffer matches `expect`.
    ///
    /// The search window is widened to cover the marker itself, so a marker
    /// longer than `search_depth` is still found.
    pub fn tail_matches(&self, expect: &Expect) -> bool {
        let depth = self.search_depth.max(expect.as_str().len() * 2);
        let start = self.buffer.len().saturating_sub(depth);
        expect.regex().is_match(&self.buffer[start..])
    }

    /// Whether the marker appears anywhere in the buffer.
    pub fn contains(&self, expect: &Expect) -> bool {
        expect.regex().is_match(&self.buffer)
    }

    /// The last line holding anything other than whitespace.
    pub fn last_line(&self) -> Option<String> {
        self.as_str_lossy()
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    /// Take the contents as a string (lossy UTF-8) and reset.
    pub fn take_string(&mut self) -> String {
        let bytes = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_search() {
        let mut buffer = PatternBuffer::new(20);
        buffer.extend(&[b'x'; 100]);
        buffer.extend(b"\nMA5800-X7(config)#");

        assert!(buffer.tail_matches(&Expect::literal("(config)#")));
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"(y/n)[n]:");
        buffer.extend(&[b'x'; 100]);

        let expect = Expect::literal("(y/n)");
        assert!(!buffer.tail_matches(&expect));
        assert!(buffer.contains(&expect));
    }

    #[test]
    fn test_literal_is_escaped() {
        let expect = Expect::literal("[confirm]");
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"Proceed? c");
        assert!(!buffer.tail_matches(&expect));
        buffer.extend(b" [confirm]");
        assert!(buffer.tail_matches(&expect));
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        let mut buffer = PatternBuffer::default();
        buffer.extend(b"Welcome\r\n\r\nZXAN#  \r\n\r\n");
        assert_eq!(buffer.last_line().as_deref(), Some("ZXAN#"));

        let empty = PatternBuffer::default();
        assert_eq!(empty.last_line(), None);
    }

    #[test]
    fn test_take_string_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take_string(), "test data");
        assert!(buffer.is_empty());
    }
}
