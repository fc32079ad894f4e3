//! Human readable error messages which quote the grammar text an error refers to.

use std::{cell::OnceCell, fmt::Display, path::Path};

use unicode_width::UnicodeWidthStr;

use crate::{NewlineCache, Span, Spanned};

pub struct SpannedDiagnosticFormatter<'a> {
    src: &'a str,
    path: &'a Path,
    nlc: OnceCell<NewlineCache>,
}

impl<'a> SpannedDiagnosticFormatter<'a> {
    /// `src` is the grammar text errors will refer to, and `path` where it was read from.
    pub fn new(src: &'a str, path: &'a Path) -> Self {
        Self {
            src,
            path,
            nlc: OnceCell::new(),
        }
    }

    fn nlc(&self) -> &NewlineCache {
        self.nlc.get_or_init(|| {
            let mut nlc = NewlineCache::new();
            nlc.feed(self.src);
            nlc
        })
    }

    // If a span is given returns "msg at path/file.ebnf:5:6" otherwise returns "msg in path/file.ebnf"
    pub fn file_location_msg(&self, msg: &str, span: Option<Span>) -> String {
        match span {
            Some(span) => {
                let (line, col) = self
                    .nlc()
                    .byte_to_line_num_and_col_num(self.src, span.start())
                    .unwrap_or((0, 0));
                format!("{} at {}:{}:{}", msg, self.path.display(), line, col)
            }
            None => format!("{} in {}", msg, self.path.display()),
        }
    }

    /// Print the line number and source text of every line `span` touches, underlining the
    /// portion the span covers with `underline_c`, and `msg` after the last underline. An empty
    /// span is shown as a single `underline_c` at its position.
    pub fn underline_span_with_text(&self, span: Span, msg: &str, underline_c: char) -> String {
        let nlc = self.nlc();
        let (start_byte, end_byte) = nlc.span_line_bytes(span);
        let mut out = String::new();
        let mut line_start = start_byte;
        let mut lines = self.src[start_byte..end_byte].split('\n').peekable();
        while let Some(raw_line) = lines.next() {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            let line_end = line_start + line.len();
            let ul_start = span.start().clamp(line_start, line_end);
            let ul_end = span.end().clamp(ul_start, line_end);
            let gutter = format!("{}| ", nlc.byte_to_line_num(line_start).unwrap_or(0));
            out.push_str(&gutter);
            out.push_str(line);
            out.push('\n');
            out.push_str(&" ".repeat(
                gutter.len() + UnicodeWidthStr::width(&self.src[line_start..ul_start]),
            ));
            let ul_width = UnicodeWidthStr::width(&self.src[ul_start..ul_end]).max(1);
            out.push_str(&underline_c.to_string().repeat(ul_width));
            if lines.peek().is_none() {
                out.push(' ');
                out.push_str(msg);
            } else {
                out.push('\n');
            }
            line_start += raw_line.len() + 1;
        }
        out
    }

    /// Format an error with its location on the first line and the offending source below.
    pub fn format_error<E>(&self, e: &E) -> String
    where
        E: Spanned + Display,
    {
        let span = e.span();
        format!(
            "{}\n{}",
            self.file_location_msg("Error", Some(span)),
            self.underline_span_with_text(span, &e.to_string(), '^')
        )
    }
}
