#![allow(clippy::new_without_default)]

//! Generate LL(1) and parallel LL (LLP) parsing tables from an `llpgrammar` grammar.
//!
//! An LLP table maps every *admissible pair* of terminals (two terminals which can be adjacent in
//! a sentence) to the productions applied, and the parse stack changes made, between them. Since
//! each pair can be looked up independently, a sentence can be parsed by looking up all its
//! adjacent pairs in parallel and then matching the brackets which encode the stack changes.
//!
//! The simplest way to use this crate is via [generate], which runs every stage and returns the
//! [ParseTables] ready to be rendered with [ParseTables::to_rust].

use std::{error::Error, fmt, hash::Hash};

use llpgrammar::{
    Diagnostic, ErrorReport, Grammar, RIdx, TIdx, TerminalSets, ast::ASTWithValidityInfo,
};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

mod codegen;
pub mod llptable;
pub mod lltable;
pub mod render;
pub mod stacks;

pub use crate::{
    llptable::{AdmissiblePair, LlpConflict, LlpEntry, LlpTable, LlpTableError, admissible_pairs},
    lltable::{LlConflict, LlState, LlTable, ParseError},
    render::{EncodedTable, ParseTables, StringTable, SymbolIndex, int_bit_width},
    stacks::TrailingStacks,
};

/// The ways in which the table generator can find itself in a state that a correct
/// implementation should never reach.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InternalErrorKind<StorageT> {
    /// A terminal was popped from the parse stack when a different terminal was expected.
    TerminalMismatch {
        expected: TIdx<StorageT>,
        found: TIdx<StorageT>,
    },
    /// A nonterminal was popped from the parse stack for which the LL(1) table has no
    /// production.
    MissingEntry {
        stack_top: RIdx<StorageT>,
        lookahead: TIdx<StorageT>,
    },
    /// The parse stack was empty when a terminal was still expected.
    StackExhausted { lookahead: TIdx<StorageT> },
    /// The terminal sets show that a pair can be adjacent, but the LLP table has no entry for it.
    MissingPair(AdmissiblePair<StorageT>),
    /// The LLP table has an entry for a pair which the terminal sets say can't be adjacent.
    UnexpectedPair(AdmissiblePair<StorageT>),
}

/// An internal inconsistency in table generation. This indicates a bug, not a problem with the
/// user's grammar.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InternalError<StorageT> {
    pub kind: InternalErrorKind<StorageT>,
}

impl<StorageT: fmt::Debug> Error for InternalError<StorageT> {}

impl<StorageT: fmt::Debug> fmt::Display for InternalError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            InternalErrorKind::TerminalMismatch { expected, found } => write!(
                f,
                "Terminal mismatch: expected {:?} but found {:?}",
                expected, found
            ),
            InternalErrorKind::MissingEntry {
                stack_top,
                lookahead,
            } => write!(f, "No LL(1) entry for ({:?}, {:?})", stack_top, lookahead),
            InternalErrorKind::StackExhausted { lookahead } => {
                write!(f, "Parse stack exhausted before {:?}", lookahead)
            }
            InternalErrorKind::MissingPair(p) => {
                write!(f, "Admissible pair ({:?}, {:?}) has no entry", p.x, p.y)
            }
            InternalErrorKind::UnexpectedPair(p) => {
                write!(f, "Entry for pair ({:?}, {:?}) which is not admissible", p.x, p.y)
            }
        }
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> InternalError<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Pretty print this error with the names used in `grm`.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        match &self.kind {
            InternalErrorKind::TerminalMismatch { expected, found } => format!(
                "Terminal mismatch: expected '{}' but found '{}'",
                grm.token_name(*expected),
                grm.token_name(*found)
            ),
            InternalErrorKind::MissingEntry {
                stack_top,
                lookahead,
            } => format!(
                "No LL(1) entry for ({}, '{}')",
                grm.rule_name_str(*stack_top),
                grm.token_name(*lookahead)
            ),
            InternalErrorKind::StackExhausted { lookahead } => format!(
                "Parse stack exhausted before '{}'",
                grm.token_name(*lookahead)
            ),
            InternalErrorKind::MissingPair(p) => format!(
                "Admissible pair ('{}', '{}') has no entry",
                grm.token_name(p.x),
                grm.token_name(p.y)
            ),
            InternalErrorKind::UnexpectedPair(p) => format!(
                "Entry for pair ('{}', '{}') which is not admissible",
                grm.token_name(p.x),
                grm.token_name(p.y)
            ),
        }
    }
}

/// Why [generate] failed. The details of user-facing problems have already been passed to the
/// [ErrorReport] by the time this is returned.
#[derive(Debug)]
pub enum GenerateError<StorageT> {
    /// The grammar source could not be read or is not a valid grammar.
    GrammarParse,
    /// The grammar is valid, but not LL(1) or not LLP(1,1).
    InvalidGrammar,
    Internal(InternalError<StorageT>),
}

impl<StorageT: fmt::Debug> Error for GenerateError<StorageT> {}

impl<StorageT: fmt::Debug> fmt::Display for GenerateError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerateError::GrammarParse => write!(f, "Invalid grammar source"),
            GenerateError::InvalidGrammar => write!(f, "Grammar is not LLP(1,1)"),
            GenerateError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

/// Everything computed while generating tables for a grammar.
pub struct Generated<StorageT> {
    pub grammar: Grammar<StorageT>,
    pub sets: TerminalSets<StorageT>,
    pub ll_table: LlTable<StorageT>,
    pub stacks: TrailingStacks<StorageT>,
    pub llp_table: LlpTable<StorageT>,
    pub tables: ParseTables,
}

/// Read the grammar `src` and generate its tables. Every error and warning found along the way
/// is passed to `report`; generation stops after the first stage which reports an error.
/// `report.finish()` is called exactly once, whether or not generation succeeds.
pub fn generate<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned>(
    src: &str,
    report: &mut impl ErrorReport,
) -> Result<Generated<StorageT>, GenerateError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let r = generate_stages(src, report);
    report.finish();
    r
}

fn generate_stages<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned>(
    src: &str,
    report: &mut impl ErrorReport,
) -> Result<Generated<StorageT>, GenerateError<StorageT>>
where
    usize: AsPrimitive<StorageT>,
{
    let avi = ASTWithValidityInfo::new(src);
    for e in avi.errors() {
        report.report(Diagnostic::error(e));
    }
    if report.has_errors() {
        return Err(GenerateError::GrammarParse);
    }
    for w in avi.ast().warnings() {
        report.report(Diagnostic::warning(&w));
    }
    let grammar = match Grammar::<StorageT>::new_from_ast_with_validity_info(&avi) {
        Ok(grm) => grm,
        Err(errs) => {
            for e in &errs {
                report.report(Diagnostic::error(e));
            }
            return Err(GenerateError::GrammarParse);
        }
    };
    log::debug!(
        "Grammar has {} rules, {} tokens, and {} productions",
        usize::from(grammar.rules_len()),
        usize::from(grammar.tokens_len()),
        usize::from(grammar.prods_len())
    );

    let sets = grammar.terminal_sets();
    let ll_table = match LlTable::new(&grammar, &sets) {
        Ok(t) => t,
        Err(conflicts) => {
            for c in &conflicts {
                report.report(c.diagnostic(&grammar));
            }
            return Err(GenerateError::InvalidGrammar);
        }
    };

    let stacks = TrailingStacks::new(&grammar, &sets);
    let llp_table = match LlpTable::new(&grammar, &sets, &ll_table, &stacks) {
        Ok(t) => t,
        Err(LlpTableError::Conflicts(conflicts)) => {
            for c in &conflicts {
                report.report(c.diagnostic(&grammar));
            }
            return Err(GenerateError::InvalidGrammar);
        }
        Err(LlpTableError::Internal(e)) => return Err(GenerateError::Internal(e)),
    };

    let tables = ParseTables::new(&grammar, &llp_table);
    log::debug!(
        "Stack change table has {} elements, partial parse table has {} elements",
        tables.stack_change.elements.len(),
        tables.partial_parse.elements.len()
    );
    Ok(Generated {
        grammar,
        sets,
        ll_table,
        stacks,
        llp_table,
        tables,
    })
}
