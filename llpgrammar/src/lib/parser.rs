use std::{error::Error, fmt, sync::LazyLock};

use indexmap::IndexMap;
use regex::Regex;

use crate::{
    Span, Spanned,
    ast::{GrammarAST, Production, Rule, Symbol},
    span::SpansKind,
};

type GrammarResult<T> = Result<T, GrammarError>;

/// The various different possible grammar errors.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum GrammarErrorKind {
    IllegalName,
    IllegalTerminal,
    MissingRightArrow,
    MissingRightBracket,
    MissingSemicolon,
    /// Two right-hand side symbols were written with nothing separating them (e.g. `'a''b'`).
    MissingDelimiter,
    PrematureEnd,
    UnknownDirective(String),
    /// Contains the name of the duplicated directive.
    DuplicateDirective(String),
    MissingDirective(&'static str),
    MissingStartRule(String),
    DuplicateStartRule(String),
    /// Contains the expected shape of the start rule.
    InvalidStartRule(String),
    /// Contains the name of the duplicated tag.
    DuplicateTag(String),
    UnknownRuleRef(String),
    /// A delimiter terminal used anywhere other than the ends of the start rule.
    MisplacedDelimiter(String),
    /// The start nonterminal used on a right-hand side.
    StartRuleReferenced(String),
}

/// Any error from the grammar reader or grammar validation returns an instance of this struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub spans: Vec<Span>,
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for GrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            GrammarErrorKind::IllegalName => "Illegal name",
            GrammarErrorKind::IllegalTerminal => "Illegal terminal",
            GrammarErrorKind::MissingRightArrow => "Missing '->'",
            GrammarErrorKind::MissingRightBracket => "Missing ']'",
            GrammarErrorKind::MissingSemicolon => "Missing ';'",
            GrammarErrorKind::MissingDelimiter => {
                "Delimiter required between production right-hand side symbols"
            }
            GrammarErrorKind::PrematureEnd => "File ends prematurely",
            GrammarErrorKind::UnknownDirective(name) => {
                return write!(f, "Invalid directive '%{}'", name);
            }
            GrammarErrorKind::DuplicateDirective(name) => {
                return write!(f, "Duplicate directive '%{}'", name);
            }
            GrammarErrorKind::MissingDirective(name) => {
                return write!(f, "Missing directive '%{}'", name);
            }
            GrammarErrorKind::MissingStartRule(name) => {
                return write!(f, "Start rule '{}' has no production", name);
            }
            GrammarErrorKind::DuplicateStartRule(name) => {
                return write!(f, "Start rule '{}' has more than one production", name);
            }
            GrammarErrorKind::InvalidStartRule(expected) => {
                return write!(f, "Start rule not in correct form: expected {}", expected);
            }
            GrammarErrorKind::DuplicateTag(name) => {
                return write!(f, "Duplicate tag '{}'", name);
            }
            GrammarErrorKind::UnknownRuleRef(name) => {
                return write!(f, "Unknown reference to rule '{}'", name);
            }
            GrammarErrorKind::MisplacedDelimiter(name) => {
                return write!(
                    f,
                    "Delimiter '{}' may only appear at the ends of the start rule",
                    name
                );
            }
            GrammarErrorKind::StartRuleReferenced(name) => {
                return write!(f, "Start rule '{}' may not be referenced", name);
            }
        };
        write!(f, "{}", s)
    }
}

impl Spanned for GrammarError {
    fn spans(&self) -> &[Span] {
        self.spans.as_slice()
    }

    fn spanskind(&self) -> SpansKind {
        match self.kind {
            GrammarErrorKind::DuplicateDirective(_)
            | GrammarErrorKind::DuplicateStartRule(_)
            | GrammarErrorKind::DuplicateTag(_) => SpansKind::DuplicationError,
            _ => SpansKind::Error,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum GrammarWarningKind {
    /// A nonterminal which cannot be reached from the start rule.
    UnusedRule(String),
}

/// Problems which don't stop tables being generated, but which probably indicate a mistake.
#[derive(Debug, PartialEq, Eq)]
pub struct GrammarWarning {
    pub kind: GrammarWarningKind,
    pub spans: Vec<Span>,
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            GrammarWarningKind::UnusedRule(name) => write!(f, "Unused rule '{}'", name),
        }
    }
}

impl Spanned for GrammarWarning {
    fn spans(&self) -> &[Span] {
        self.spans.as_slice()
    }

    fn spanskind(&self) -> SpansKind {
        SpansKind::Error
    }
}

static RE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*").unwrap());
static RE_TERMINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^'([^'\r\n]+)'").unwrap());

#[derive(Clone, Copy)]
enum Directive {
    Start,
    LeftDelim,
    RightDelim,
}

impl Directive {
    fn name(self) -> &'static str {
        match self {
            Directive::Start => "start",
            Directive::LeftDelim => "left_delim",
            Directive::RightDelim => "right_delim",
        }
    }
}

/// A recursive-descent reader for the grammar format:
///
/// ```text
/// # Comments run to the end of the line.
/// %start = S;
/// %left_delim = 'lbr';
/// %right_delim = 'rbr';
/// S -> 'lbr' expr 'rbr';
/// expr [expr_add] -> atom 'plus' expr;
/// expr [expr_atom] -> atom;
/// ```
///
/// Errors in one statement do not stop the reader: it skips to the next `;` and carries on, so
/// that as many errors as possible are reported in one go.
pub(crate) struct GrammarParser {
    src: String,
    ast: GrammarAST,
    errors: Vec<GrammarError>,
    /// Maps a directive name to the spans of its first definition and of every duplicate.
    duplicate_directives: IndexMap<&'static str, Vec<Span>>,
    /// Maps a tag to the span of its first definition.
    tags: IndexMap<String, Span>,
    /// Maps a tag to the spans of its first definition and of every duplicate.
    duplicate_tags: IndexMap<String, Vec<Span>>,
}

impl GrammarParser {
    pub(crate) fn new(src: String) -> Self {
        GrammarParser {
            src,
            ast: GrammarAST::new(),
            errors: Vec::new(),
            duplicate_directives: IndexMap::new(),
            tags: IndexMap::new(),
            duplicate_tags: IndexMap::new(),
        }
    }

    pub(crate) fn parse(&mut self) -> Result<(), Vec<GrammarError>> {
        // We pass around an index into the *bytes* of self.src, which always points to the
        // beginning of a UTF-8 character.
        let mut i = self.parse_ws(0);
        while i < self.src.len() {
            let r = if self.lookahead_is("%", i).is_some() {
                self.parse_directive(i)
            } else {
                self.parse_production(i)
            };
            i = match r {
                Ok(j) => j,
                Err(e) => {
                    self.errors.push(e);
                    self.skip_statement(i)
                }
            };
            i = self.parse_ws(i);
        }

        for (name, spans) in self.duplicate_directives.drain(..) {
            self.errors.push(GrammarError {
                kind: GrammarErrorKind::DuplicateDirective(name.to_owned()),
                spans,
            });
        }
        for (tag, spans) in self.duplicate_tags.drain(..) {
            self.errors.push(GrammarError {
                kind: GrammarErrorKind::DuplicateTag(tag),
                spans,
            });
        }
        let end = self.src.len();
        for (dir, present) in [
            (Directive::Start, self.ast.start.is_some()),
            (Directive::LeftDelim, self.ast.left_delim.is_some()),
            (Directive::RightDelim, self.ast.right_delim.is_some()),
        ] {
            if !present {
                self.errors.push(GrammarError {
                    kind: GrammarErrorKind::MissingDirective(dir.name()),
                    spans: vec![Span::new(end, end)],
                });
            }
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    pub(crate) fn ast(self) -> GrammarAST {
        self.ast
    }

    fn parse_directive(&mut self, i: usize) -> GrammarResult<usize> {
        let (j, name) = self.parse_name(i + '%'.len_utf8())?;
        let dir_span = Span::new(i, j);
        let dir = match name.as_str() {
            "start" => Directive::Start,
            "left_delim" => Directive::LeftDelim,
            "right_delim" => Directive::RightDelim,
            _ => {
                return Err(GrammarError {
                    kind: GrammarErrorKind::UnknownDirective(name),
                    spans: vec![dir_span],
                });
            }
        };
        let mut j = self.parse_ws(j);
        // The `=` between a directive and its value is optional.
        if let Some(k) = self.lookahead_is("=", j) {
            j = self.parse_ws(k);
        }
        let (j, value) = match dir {
            Directive::Start => self.parse_name(j)?,
            Directive::LeftDelim | Directive::RightDelim => {
                let (j, value, _) = self.parse_terminal(j)?;
                (j, value)
            }
        };
        let j = self.parse_ws(j);
        let j = self.expect(";", j, GrammarErrorKind::MissingSemicolon)?;

        let slot = match dir {
            Directive::Start => &mut self.ast.start,
            Directive::LeftDelim => &mut self.ast.left_delim,
            Directive::RightDelim => &mut self.ast.right_delim,
        };
        match slot {
            Some((_, orig_span)) => {
                self.duplicate_directives
                    .entry(dir.name())
                    .or_insert_with(|| vec![*orig_span])
                    .push(dir_span);
            }
            None => *slot = Some((value, dir_span)),
        }
        Ok(j)
    }

    fn parse_production(&mut self, i: usize) -> GrammarResult<usize> {
        let (j, lhs) = self.parse_name(i)?;
        let lhs_span = Span::new(i, j);
        let mut j = self.parse_ws(j);

        let tag = if let Some(k) = self.lookahead_is("[", j) {
            let k = self.parse_ws(k);
            let (l, tag) = self.parse_name(k)?;
            let tag_span = Span::new(k, l);
            let l = self.parse_ws(l);
            j = self.parse_ws(self.expect("]", l, GrammarErrorKind::MissingRightBracket)?);
            (tag, tag_span)
        } else {
            (lhs.clone(), lhs_span)
        };

        j = self.expect("->", j, GrammarErrorKind::MissingRightArrow)?;
        j = self.parse_ws(j);

        let mut symbols = Vec::new();
        let mut delimited = true;
        loop {
            let (k, sym) = match self.src[j..].chars().next() {
                Some('\'') => {
                    let (k, n, span) = self.parse_terminal(j)?;
                    (k, Symbol::Token(n, span))
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let (k, n) = self.parse_name(j)?;
                    (k, Symbol::Rule(n, Span::new(j, k)))
                }
                _ => break,
            };
            if !delimited {
                return Err(self.mk_error(GrammarErrorKind::MissingDelimiter, j));
            }
            symbols.push(sym);
            j = self.parse_ws(k);
            delimited = j > k;
        }
        let j = self.expect(";", j, GrammarErrorKind::MissingSemicolon)?;
        let span = Span::new(i, j);

        if let Some(orig_span) = self.tags.get(&tag.0) {
            self.duplicate_tags
                .entry(tag.0)
                .or_insert_with(|| vec![*orig_span])
                .push(tag.1);
            return Ok(j);
        }
        self.tags.insert(tag.0.clone(), tag.1);

        for sym in &symbols {
            if let Symbol::Token(n, span) = sym {
                if !self.ast.tokens.contains_key(n) {
                    self.ast.tokens.insert(n.clone(), *span);
                }
            }
        }
        let pidx = self.ast.prods.len();
        self.ast
            .rules
            .entry(lhs.clone())
            .or_insert_with(|| Rule {
                name: (lhs.clone(), lhs_span),
                pidxs: Vec::new(),
            })
            .pidxs
            .push(pidx);
        self.ast.prods.push(Production {
            lhs,
            tag,
            symbols,
            span,
        });
        Ok(j)
    }

    fn parse_name(&self, i: usize) -> GrammarResult<(usize, String)> {
        match RE_NAME.find(&self.src[i..]) {
            Some(m) => Ok((i + m.end(), self.src[i..i + m.end()].to_string())),
            None if i == self.src.len() => Err(self.mk_error(GrammarErrorKind::PrematureEnd, i)),
            None => Err(self.mk_error(GrammarErrorKind::IllegalName, i)),
        }
    }

    /// Parse a quoted terminal, returning the index after the closing quote, the terminal's name
    /// (without quotes) and its span (including quotes).
    fn parse_terminal(&self, i: usize) -> GrammarResult<(usize, String, Span)> {
        match RE_TERMINAL.captures(&self.src[i..]) {
            Some(caps) => {
                let end = i + caps[0].len();
                Ok((end, caps[1].to_string(), Span::new(i, end)))
            }
            None if i == self.src.len() => Err(self.mk_error(GrammarErrorKind::PrematureEnd, i)),
            None => Err(self.mk_error(GrammarErrorKind::IllegalTerminal, i)),
        }
    }

    /// Skip whitespace and `#` comments.
    fn parse_ws(&self, mut i: usize) -> usize {
        while let Some(c) = self.src[i..].chars().next() {
            match c {
                ' ' | '\t' | '\n' | '\r' => i += c.len_utf8(),
                '#' => match self.src[i..].find('\n') {
                    Some(off) => i += off + 1,
                    None => i = self.src.len(),
                },
                _ => break,
            }
        }
        i
    }

    /// Skip past the next `;` which is not inside a comment or a terminal. Returns the index after
    /// that `;` (or the end of the input).
    fn skip_statement(&self, mut i: usize) -> usize {
        loop {
            i = self.parse_ws(i);
            match self.src[i..].chars().next() {
                None => return i,
                Some(';') => return i + 1,
                Some('\'') => match self.parse_terminal(i) {
                    Ok((j, _, _)) => i = j,
                    Err(_) => i += 1,
                },
                Some(c) => i += c.len_utf8(),
            }
        }
    }

    fn expect(&self, s: &'static str, i: usize, kind: GrammarErrorKind) -> GrammarResult<usize> {
        match self.lookahead_is(s, i) {
            Some(j) => Ok(j),
            None if i == self.src.len() => Err(self.mk_error(GrammarErrorKind::PrematureEnd, i)),
            None => Err(self.mk_error(kind, i)),
        }
    }

    fn lookahead_is(&self, s: &'static str, i: usize) -> Option<usize> {
        if self.src[i..].starts_with(s) {
            Some(i + s.len())
        } else {
            None
        }
    }

    fn mk_error(&self, kind: GrammarErrorKind, off: usize) -> GrammarError {
        GrammarError {
            kind,
            spans: vec![Span::new(off, off)],
        }
    }
}
