use std::collections::HashSet;

use indexmap::IndexMap;

use crate::{
    Span,
    parser::{GrammarError, GrammarErrorKind, GrammarParser, GrammarWarning, GrammarWarningKind},
};

/// Contains a `GrammarAST` structure produced from a grammar source file, as well as any errors
/// which occurred during the construction of the AST.
pub struct ASTWithValidityInfo {
    ast: GrammarAST,
    errs: Vec<GrammarError>,
}

impl ASTWithValidityInfo {
    /// Parses a source file and validates the resulting AST. Parse errors and validation errors
    /// are both available through [ASTWithValidityInfo::errors]; validation is only attempted if
    /// parsing succeeded.
    pub fn new(s: &str) -> Self {
        let mut gp = GrammarParser::new(s.to_string());
        let mut errs = match gp.parse() {
            Ok(()) => Vec::new(),
            Err(errs) => errs,
        };
        let ast = gp.ast();
        if errs.is_empty() {
            errs = ast.validate();
        }
        ASTWithValidityInfo { ast, errs }
    }

    /// Returns a `GrammarAST` constructed as the result of parsing a source file. When errors
    /// have occurred the AST may be incomplete.
    pub fn ast(&self) -> &GrammarAST {
        &self.ast
    }

    /// Returns whether any errors were encountered.
    pub fn is_valid(&self) -> bool {
        self.errs.is_empty()
    }

    /// Returns all errors which were encountered.
    pub fn errors(&self) -> &[GrammarError] {
        self.errs.as_slice()
    }
}

/// An AST representing a grammar as it was read from source. It only describes a usable grammar
/// once validation has reported no errors.
#[derive(Debug)]
pub struct GrammarAST {
    /// The `%start` directive's value and the directive's span.
    pub start: Option<(String, Span)>,
    /// The `%left_delim` directive's terminal and the directive's span.
    pub left_delim: Option<(String, Span)>,
    /// The `%right_delim` directive's terminal and the directive's span.
    pub right_delim: Option<(String, Span)>,
    /// Rules in the order their first production appears.
    pub rules: IndexMap<String, Rule>,
    pub prods: Vec<Production>,
    /// Terminals in the order they first appear, mapped to the span of that first appearance.
    pub tokens: IndexMap<String, Span>,
}

#[derive(Debug)]
pub struct Rule {
    pub name: (String, Span),
    pub pidxs: Vec<usize>, // index into GrammarAST.prods
}

#[derive(Debug)]
pub struct Production {
    pub lhs: String,
    /// The tag is the production's external name. If no tag is written, the lhs is used.
    pub tag: (String, Span),
    pub symbols: Vec<Symbol>,
    /// Covers the production from the start of its lhs to its terminating `;`.
    pub span: Span,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Symbol {
    Rule(String, Span),
    Token(String, Span),
}

impl GrammarAST {
    pub fn new() -> GrammarAST {
        GrammarAST {
            start: None,
            left_delim: None,
            right_delim: None,
            rules: IndexMap::new(),
            prods: Vec::new(),
            tokens: IndexMap::new(),
        }
    }

    /// Returns the start production (i.e. the first production of the start rule), if there is
    /// one.
    pub fn start_prod(&self) -> Option<usize> {
        let (start, _) = self.start.as_ref()?;
        self.rules.get(start)?.pidxs.first().copied()
    }

    /// Check that the AST is valid, returning every problem found. The checks are:
    ///
    ///   * The start rule exists, has exactly one production, and that production has the form
    ///     `start -> left_delim ... right_delim`.
    ///   * The delimiters appear nowhere else.
    ///   * The start rule is not referenced by any production.
    ///   * Every rule referenced in a production has at least one production of its own.
    pub(crate) fn validate(&self) -> Vec<GrammarError> {
        let mut errs = Vec::new();
        let mut missing = Vec::new();
        for (dir, name) in [
            (&self.start, "start"),
            (&self.left_delim, "left_delim"),
            (&self.right_delim, "right_delim"),
        ] {
            if dir.is_none() {
                missing.push(GrammarError {
                    kind: GrammarErrorKind::MissingDirective(name),
                    spans: vec![Span::new(0, 0)],
                });
            }
        }
        let (
            Some((start, start_span)),
            Some((left_delim, _)),
            Some((right_delim, _)),
        ) = (&self.start, &self.left_delim, &self.right_delim)
        else {
            return missing;
        };

        match self.rules.get(start) {
            None => {
                errs.push(GrammarError {
                    kind: GrammarErrorKind::MissingStartRule(start.clone()),
                    spans: vec![*start_span],
                });
            }
            Some(rule) => {
                if rule.pidxs.len() > 1 {
                    errs.push(GrammarError {
                        kind: GrammarErrorKind::DuplicateStartRule(start.clone()),
                        spans: rule.pidxs.iter().map(|&p| self.prods[p].span).collect(),
                    });
                }
                let prod = &self.prods[rule.pidxs[0]];
                let well_formed = prod.symbols.len() >= 2
                    && matches!(prod.symbols.first(), Some(Symbol::Token(n, _)) if n == left_delim)
                    && matches!(prod.symbols.last(), Some(Symbol::Token(n, _)) if n == right_delim);
                if !well_formed {
                    errs.push(GrammarError {
                        kind: GrammarErrorKind::InvalidStartRule(format!(
                            "{} -> '{}' ... '{}';",
                            start, left_delim, right_delim
                        )),
                        spans: vec![prod.span],
                    });
                }
            }
        }

        // Without a start rule every delimiter is "misplaced", which only repeats the error above.
        let check_delims = self.rules.contains_key(start);
        for prod in &self.prods {
            let is_start = &prod.lhs == start;
            for (sidx, sym) in prod.symbols.iter().enumerate() {
                match sym {
                    Symbol::Rule(name, span) => {
                        if !self.rules.contains_key(name) {
                            errs.push(GrammarError {
                                kind: GrammarErrorKind::UnknownRuleRef(name.clone()),
                                spans: vec![*span],
                            });
                        } else if name == start {
                            errs.push(GrammarError {
                                kind: GrammarErrorKind::StartRuleReferenced(name.clone()),
                                spans: vec![*span],
                            });
                        }
                    }
                    Symbol::Token(name, span) => {
                        if !check_delims || (name != left_delim && name != right_delim) {
                            continue;
                        }
                        let at_ends = is_start
                            && ((sidx == 0 && name == left_delim)
                                || (sidx == prod.symbols.len() - 1 && name == right_delim));
                        if !at_ends {
                            errs.push(GrammarError {
                                kind: GrammarErrorKind::MisplacedDelimiter(name.clone()),
                                spans: vec![*span],
                            });
                        }
                    }
                }
            }
        }
        errs
    }

    /// Return warnings for rules which can't be reached from the start rule.
    pub fn warnings(&self) -> Vec<GrammarWarning> {
        let Some((start, _)) = &self.start else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut todo = vec![start.as_str()];
        while let Some(name) = todo.pop() {
            if !seen.insert(name) {
                continue;
            }
            let Some(rule) = self.rules.get(name) else {
                continue;
            };
            for &pidx in &rule.pidxs {
                for sym in &self.prods[pidx].symbols {
                    if let Symbol::Rule(n, _) = sym {
                        todo.push(n.as_str());
                    }
                }
            }
        }
        self.rules
            .values()
            .filter(|rule| !seen.contains(rule.name.0.as_str()))
            .map(|rule| GrammarWarning {
                kind: GrammarWarningKind::UnusedRule(rule.name.0.clone()),
                spans: vec![rule.name.1],
            })
            .collect()
    }
}

impl Default for GrammarAST {
    fn default() -> Self {
        Self::new()
    }
}
