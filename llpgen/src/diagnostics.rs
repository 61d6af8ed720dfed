use std::{path::Path, str::FromStr};

use llpgrammar::{Diagnostic, NewlineCache, Severity, Span, Spanned, SpansKind};
use unicode_width::UnicodeWidthStr;

const ERROR: &str = "[Error]";
const WARNING: &str = "[Warning]";
const INDENT: &str = "     ";

pub struct SpannedDiagnosticFormatter<'a> {
    src: &'a str,
    path: &'a Path,
    nlc: NewlineCache,
}

impl<'a> SpannedDiagnosticFormatter<'a> {
    #[allow(clippy::result_unit_err)]
    pub fn new(src: &'a str, path: &'a Path) -> Result<Self, ()> {
        Ok(Self {
            src,
            path,
            nlc: NewlineCache::from_str(src)?,
        })
    }

    pub fn ordinal(v: usize) -> String {
        let suffix = match ((11..=13).contains(&(v % 100)), v % 10) {
            (false, 1) => "st",
            (false, 2) => "nd",
            (false, 3) => "rd",
            _ => "th",
        };
        format!("{v}{suffix}")
    }

    // If a span is given returns "msg at path/file.llp:5:6" otherwise returns "msg in path/file.llp"
    pub fn file_location_msg(&self, msg: &str, span: Option<Span>) -> String {
        if let Some(span) = span {
            let (line, col) = self
                .nlc
                .byte_to_line_num_and_col_num(self.src, span.start())
                .unwrap_or((0, 0));
            format!("{} at {}:{line}:{col}", msg, self.path.display())
        } else {
            format!("{} in {}", msg, self.path.display())
        }
    }

    /// Print the line/column information and source text for all lines intersecting the span.
    /// Underline the portion covered by the span with the `underline_c` character.
    pub fn underline_span_with_text(&self, span: Span, s: String, underline_c: char) -> String {
        self.prefixed_underline_span_with_text("", span, s, underline_c)
    }

    // As `underline_span_with_text`, but with a prefix under the line numbers, used to show
    // that the next span is not on an adjacent line.
    pub fn prefixed_underline_span_with_text(
        &self,
        prefix: &str,
        mut span: Span,
        s: String,
        underline_c: char,
    ) -> String {
        let mut out = String::new();
        let (start_byte, end_byte) = self.nlc.span_line_bytes(span);
        let mut source_lines = self.src[start_byte..end_byte].lines().peekable();
        while let Some(source_line) = source_lines.next() {
            let (line_start_byte, _) = self.nlc.span_line_bytes(span);
            let span_offset_from_start = span.start() - line_start_byte;

            // The part of the span on this line.
            let underline_span = Span::new(
                span.start(),
                span.end()
                    .min(span.start() + (source_line.len() - span_offset_from_start)),
            );
            let (line_num, _) = self
                .nlc
                .byte_to_line_num_and_col_num(self.src, span.start())
                .unwrap_or((0, 0));
            out.push_str(&format!("{}| {}\n", line_num, source_line));
            let line_num_digits = line_num.to_string().len();
            let gutter = (line_num_digits + "| ".len()).saturating_sub(prefix.len());
            out.push_str(prefix);
            out.push_str(
                &" ".repeat(
                    UnicodeWidthStr::width(&self.src[line_start_byte..underline_span.start()])
                        + gutter,
                ),
            );
            out.push_str(&underline_c.to_string().repeat(UnicodeWidthStr::width(
                &self.src[underline_span.start()..underline_span.end()],
            )));

            if source_lines.peek().is_none() {
                out.push_str(&format!(" {}", &s));
            } else {
                out.push('\n');
                span = Span::new(line_start_byte + source_line.len() + 1, span.end())
            }
        }

        out
    }

    pub fn format_spanned(&self, e: &impl Spanned) -> String {
        let mut out = String::new();
        let mut spans = e.spans().iter().enumerate().peekable();
        while let Some((span_num, span)) = spans.next() {
            let line = self.nlc.byte_to_line_num(span.start()).unwrap_or(0);
            let next_line = spans
                .peek()
                .map(|(_, s)| self.nlc.byte_to_line_num(s.start()).unwrap_or(line))
                .unwrap_or(line);
            let dots = if line.abs_diff(next_line) > 1 { "..." } else { "" };
            if span_num == 0 {
                let s = e.to_string();
                out.push_str(&self.prefixed_underline_span_with_text(dots, *span, s, '^'));
            } else {
                out.push('\n');
                let s = match e.spanskind() {
                    SpansKind::DuplicationError => {
                        format!("{} occurrence", Self::ordinal(span_num + 1))
                    }
                    SpansKind::Conflict => "conflicts with".to_owned(),
                    SpansKind::Error => {
                        unreachable!("Should contain a single span at the site of the error")
                    }
                };
                out.push_str(&self.prefixed_underline_span_with_text(dots, *span, s, '-'));
            }
        }
        out
    }

    /// Format a diagnostic as a location line followed by the underlined source it refers to.
    pub fn format_diagnostic(&self, d: &Diagnostic) -> String {
        let label = match d.severity {
            Severity::Error => ERROR,
            Severity::Warning => WARNING,
        };
        let mut out = self.file_location_msg(label, d.spans.first().copied());
        let body = if d.spans.is_empty() {
            d.message.clone()
        } else {
            self.format_spanned(d)
        };
        for l in body.lines() {
            out.push('\n');
            out.push_str(INDENT);
            out.push_str(l);
        }
        out
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use llpgrammar::{Diagnostic, Severity, Span, SpansKind};

    use super::SpannedDiagnosticFormatter;

    #[test]
    fn test_ordinal() {
        let ords = [1, 2, 3, 4, 11, 12, 13, 21, 102, 111]
            .iter()
            .map(|&v| SpannedDiagnosticFormatter::ordinal(v))
            .collect::<Vec<_>>();
        assert_eq!(
            ords,
            vec!["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "102nd", "111th"]
        );
    }

    #[test]
    fn test_location() {
        let src = "%start S;\nS -> 'a';\n";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        assert_eq!(f.file_location_msg("Oops", Some(Span::new(15, 18))), "Oops at g.llp:2:6");
        assert_eq!(f.file_location_msg("Oops", None), "Oops in g.llp");
    }

    #[test]
    fn test_multiline_underline() {
        let src = "A -> 'x'\n  'y';\n";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        let out = format!(
            "\n{}",
            f.underline_span_with_text(Span::new(5, 14), "msg".to_owned(), '-')
        );
        assert_eq!(
            out,
            r"
1| A -> 'x'
        ---
2|   'y';
   ----- msg"
        );
    }

    #[test]
    fn test_unicode_underline() {
        let src = "S -> '🦀' 'b';";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        let crab = "'🦀'".len();
        let out =
            f.underline_span_with_text(Span::new(5 + crab + 1, 5 + crab + 4), "b".to_owned(), '^');
        assert_eq!(out, "1| S -> '🦀' 'b';\n             ^^^ b");
    }

    #[test]
    fn test_duplicate() {
        let src = "%start S;\nS -> 'a';\nS -> 'b';\n";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        let d = Diagnostic::new(
            Severity::Error,
            "Duplicate start rule".to_owned(),
            vec![Span::new(10, 11), Span::new(20, 21)],
            SpansKind::DuplicationError,
        );
        assert_eq!(
            f.format_diagnostic(&d),
            "[Error] at g.llp:2:1
     2| S -> 'a';
        ^ Duplicate start rule
     3| S -> 'b';
        - 2nd occurrence"
        );
    }

    #[test]
    fn test_conflict() {
        let src = "%start S;\nS -> 'a' E;\nE [x] -> 'b';\n\nE [y] -> 'b';\n";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        let d = Diagnostic::new(
            Severity::Error,
            "LL(1) conflict".to_owned(),
            vec![Span::new(37, 50), Span::new(22, 35)],
            SpansKind::Conflict,
        );
        assert_eq!(
            f.format_diagnostic(&d),
            "[Error] at g.llp:5:1
     5| E [y] -> 'b';
     ...^^^^^^^^^^^^^ LL(1) conflict
     3| E [x] -> 'b';
        ------------- conflicts with"
        );
    }

    #[test]
    fn test_no_spans() {
        let src = "";
        let path = PathBuf::from("g.llp");
        let f = SpannedDiagnosticFormatter::new(src, &path).unwrap();
        let d = Diagnostic::new(
            Severity::Warning,
            "Something odd".to_owned(),
            vec![],
            SpansKind::Error,
        );
        assert_eq!(f.format_diagnostic(&d), "[Warning] in g.llp\n     Something odd");
    }
}
