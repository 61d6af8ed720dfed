#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! A library for reading and analysing the grammars from which parallel LL (LLP) parsing tables
//! are generated.
//!
//! A grammar here is an LL(1) context free grammar whose every sentence is wrapped in two
//! *delimiter* terminals. The grammar source names them with `%left_delim` and `%right_delim` and
//! the start rule must have precisely one production of the form
//! `start -> left_delim ... right_delim`. For example:
//!
//! ```text
//!   %start S;
//!   %left_delim '(';
//!   %right_delim ')';
//!   S -> '(' E ')';
//!   E [e_add] -> 'a' 'plus' E;
//!   E [e_atom] -> 'a';
//! ```
//!
//! We use the following terminology:
//!
//!   * A *grammar* is an ordered sequence of *productions*.
//!   * A *production* is an ordered sequence of *symbols*, together with a *tag*: a grammar-wide
//!     unique name which is used as the production's name in generated code. A production without
//!     an explicit `[tag]` is tagged with the name of its rule.
//!   * A *rule* (or *nonterminal*) maps a name to one or more productions.
//!   * A *token* (or *terminal*) is the name of a syntactic element.
//!
//! llpgrammar makes the following guarantees about grammars:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive) in the order they
//!     appear in the source.
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive) in the order their first
//!     production appears.
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive) in the order they first
//!     appear in a production.
//!
//! The main entry points are [`Grammar::new()`](grammar/struct.Grammar.html#method.new) and
//! [`Grammar::terminal_sets()`](grammar/struct.Grammar.html#method.terminal_sets).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod ast;
pub mod grammar;
mod idxnewtype;
pub mod newlinecache;
pub mod parser;
pub mod reporting;
pub mod sets;
pub mod span;

pub use crate::{
    grammar::Grammar,
    idxnewtype::{PIdx, RIdx, TIdx},
    newlinecache::NewlineCache,
    parser::{GrammarError, GrammarErrorKind, GrammarWarning, GrammarWarningKind},
    reporting::{Diagnostic, Diagnostics, ErrorReport, Severity},
    sets::{Direction, TerminalSets},
    span::{Span, Spanned, SpansKind},
};

/// A grammar symbol. Symbols compare and hash by value, so two occurrences of the same terminal
/// (or nonterminal) anywhere in the grammar are equal.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol<StorageT> {
    Nonterminal(RIdx<StorageT>),
    Terminal(TIdx<StorageT>),
}
