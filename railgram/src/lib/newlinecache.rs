use std::str::FromStr;

use crate::Span;

/// Cache newlines from an input. These can be used to turn UTF-8 byte offsets into human-friendly
/// line numbers (and vice versa) without having to store the full input.
pub struct NewlineCache {
    /// Byte offsets of the start of each line (the first line always starts at 0).
    newlines: Vec<usize>,
    trailing_bytes: usize,
}

impl NewlineCache {
    /// Create an empty `NewlineCache`.
    pub fn new() -> Self {
        NewlineCache {
            newlines: vec![0],
            trailing_bytes: 0,
        }
    }

    /// Feed more input into the cache, calculating newlines data from it. The `src` string given
    /// is treated as if it was concatenated with the previous calls to `feed`.
    pub fn feed(&mut self, src: &str) {
        let start_pos = self.input_length();
        for (off, c) in src.char_indices() {
            if c == '\n' {
                self.trailing_bytes = 0;
                self.newlines.push(start_pos + off + 1);
            } else {
                self.trailing_bytes += c.len_utf8();
            }
        }
    }

    /// Total known input length.
    fn input_length(&self) -> usize {
        // `newlines` is never empty.
        self.newlines[self.newlines.len() - 1] + self.trailing_bytes
    }

    /// Convert a byte offset in the input to a logical line number (starting at 1). Returns
    /// `None` if the byte offset exceeds the known input length.
    pub fn byte_to_line_num(&self, byte: usize) -> Option<usize> {
        if byte > self.input_length() {
            return None;
        }
        match self.newlines.binary_search(&byte) {
            Ok(i) => Some(i + 1),
            Err(i) => Some(i),
        }
    }

    /// Convert a logical line number into the byte offset of the start of that line. Returns
    /// `None` if the line number is zero or exceeds the known line count.
    fn line_num_to_byte(&self, line_num: usize) -> Option<usize> {
        if line_num == 0 || line_num > self.newlines.len() {
            None
        } else {
            Some(self.newlines[line_num - 1])
        }
    }

    /// Given a `src` string, which should be the strings previously passed to `feed`
    /// concatenated together, convert the `byte` offset into logical line and column numbers
    /// (both starting at 1). A `\r\n` pair occupies a single column. Returns `None` if the byte
    /// offset exceeds the known input length, does not fall on a character boundary, or `src`
    /// and the known input length differ.
    pub fn byte_to_line_num_and_col_num(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if byte > self.input_length() || src.len() != self.input_length() {
            return None;
        }
        let line_num = self.byte_to_line_num(byte)?;
        let line_byte = self.line_num_to_byte(line_num)?;
        let prefix = src.get(line_byte..byte)?;
        let mut col_num = prefix.chars().count() + 1;
        if prefix.ends_with('\r') && src[byte..].starts_with('\n') {
            col_num -= 1;
        }
        Some((line_num, col_num))
    }

    /// Return the byte offsets of the start of the first line `span` touches and the end
    /// (excluding the newline) of the last line it touches. Offsets beyond the known input are
    /// clamped to its end.
    pub fn span_line_bytes(&self, span: Span) -> (usize, usize) {
        let len = self.input_length();
        let first = span.start().min(len);
        let last = if span.is_empty() {
            first
        } else {
            (span.end() - 1).min(len)
        };
        let start_line = self.byte_to_line_num(first).unwrap_or(self.newlines.len());
        let end_line = self.byte_to_line_num(last).unwrap_or(self.newlines.len());
        let start_byte = self.newlines[start_line - 1];
        let end_byte = if end_line < self.newlines.len() {
            self.newlines[end_line] - 1
        } else {
            len
        };
        (start_byte, end_byte)
    }
}

impl Default for NewlineCache {
    fn default() -> Self {
        NewlineCache::new()
    }
}

impl FromStr for NewlineCache {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut nlc = NewlineCache::new();
        nlc.feed(s);
        Ok(nlc)
    }
}
