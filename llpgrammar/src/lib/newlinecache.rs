use std::str::FromStr;

use crate::Span;

/// Caches the byte offsets of line starts in a piece of text, so that byte offsets (e.g. from a
/// [Span]) can be cheaply turned into line and column numbers.
pub struct NewlineCache {
    newlines: Vec<usize>,
    trailing_bytes: usize,
}

impl Default for NewlineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for NewlineCache {
    type Err = ();

    fn from_str(src: &str) -> Result<Self, ()> {
        let mut nlc = Self::new();
        nlc.feed(src);
        Ok(nlc)
    }
}

impl NewlineCache {
    pub fn new() -> Self {
        Self {
            newlines: vec![0],
            trailing_bytes: 0,
        }
    }

    /// Feed more input into the cache. `src` is treated as if it were concatenated with the
    /// input of previous calls to `feed`.
    pub fn feed(&mut self, src: &str) {
        let start_pos = self.input_length();
        for (offset, c) in src.char_indices() {
            if c == '\n' {
                self.trailing_bytes = 0;
                self.newlines.push(start_pos + offset + 1);
            } else {
                self.trailing_bytes += c.len_utf8();
            }
        }
    }

    fn last_newline(&self) -> usize {
        self.newlines.last().copied().unwrap_or(0)
    }

    fn input_length(&self) -> usize {
        self.last_newline() + self.trailing_bytes
    }

    /// Convert a byte offset into a 1-based line number. Returns `None` if `byte` lies beyond
    /// the known input.
    pub fn byte_to_line_num(&self, byte: usize) -> Option<usize> {
        if byte > self.input_length() {
            return None;
        }
        Some(self.newlines.partition_point(|&off| off <= byte))
    }

    /// Convert a byte offset into 1-based `(line, column)` numbers, where columns count
    /// characters. `src` must be the concatenation of everything passed to `feed`; returns `None`
    /// if it isn't or if `byte` lies beyond it.
    pub fn byte_to_line_num_and_col_num(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if byte > self.input_length() || src.len() != self.input_length() {
            return None;
        }
        let line_num = self.byte_to_line_num(byte)?;
        let line_byte = self.newlines[line_num - 1];
        let col = src.get(line_byte..byte)?.chars().count() + 1;
        Some((line_num, col))
    }

    /// Returns the byte offsets of the start of the first line, and the end (excluding the
    /// newline) of the last line, that `span` touches.
    pub fn span_line_bytes(&self, span: Span) -> (usize, usize) {
        let start_line = self.byte_to_line_num(span.start()).unwrap_or(1);
        let end_line = self
            .byte_to_line_num(span.end())
            .unwrap_or(self.newlines.len());
        let start_byte = self.newlines[start_line - 1];
        let end_byte = if end_line < self.newlines.len() {
            self.newlines[end_line] - 1
        } else {
            self.input_length()
        };
        (start_byte, end_byte)
    }
}

#[cfg(test)]
mod test {
    use super::NewlineCache;
    use crate::Span;
    use std::str::FromStr;

    fn line_cols(feed: &[&str]) -> Vec<(usize, usize)> {
        let mut nlc = NewlineCache::new();
        let mut full = String::new();
        for f in feed {
            nlc.feed(f);
            full.push_str(f);
        }
        full.char_indices()
            .map(|(off, _)| nlc.byte_to_line_num_and_col_num(&full, off).unwrap())
            .collect()
    }

    #[test]
    fn line_col_various() {
        let abc = vec![(1, 1), (1, 2), (1, 3)];
        assert_eq!(line_cols(&["abc"]), abc);
        assert_eq!(line_cols(&["a", "bc"]), abc);

        let ab = vec![(1, 1), (1, 2), (2, 1)];
        assert_eq!(line_cols(&["a\n", "b"]), ab);
        assert_eq!(line_cols(&["a", "\nb"]), ab);

        assert_eq!(
            line_cols(&["\n\n'λ'"]),
            vec![(1, 1), (2, 1), (3, 1), (3, 2), (3, 3)]
        );
    }

    #[test]
    fn out_of_range() {
        let nlc = NewlineCache::from_str("ab\ncd").unwrap();
        assert_eq!(nlc.byte_to_line_num(5), Some(2));
        assert_eq!(nlc.byte_to_line_num(6), None);
        assert_eq!(nlc.byte_to_line_num_and_col_num("ab", 1), None);
    }

    #[test]
    fn span_lines() {
        let src = "S -> 'a';\nA -> 'b'\n  'c';\n";
        let nlc = NewlineCache::from_str(src).unwrap();
        assert_eq!(nlc.span_line_bytes(Span::new(0, 1)), (0, 9));
        assert_eq!(nlc.span_line_bytes(Span::new(10, 22)), (10, 25));
        assert_eq!(&src[10..25], "A -> 'b'\n  'c';");
    }
}
