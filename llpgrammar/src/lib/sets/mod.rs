//! The terminal sets (FIRST, FOLLOW, LAST, and BEFORE) of a grammar.
//!
//! FIRST and LAST are the same computation scanning productions in opposite directions, as are
//! FOLLOW and BEFORE, so each pair shares an implementation parameterised by [Direction].

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use crate::{Grammar, RIdx, Symbol, TIdx};

pub mod firsts;
pub mod follows;

use firsts::Firsts;
use follows::Follows;

/// Which way a production's right-hand side is scanned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Left to right (FIRST, FOLLOW).
    Forward,
    /// Right to left (LAST, BEFORE).
    Backward,
}

impl Direction {
    /// Map the `n`th step of a scan over a sequence of length `len` to an index into the
    /// sequence.
    pub fn index(self, n: usize, len: usize) -> usize {
        match self {
            Direction::Forward => n,
            Direction::Backward => len - 1 - n,
        }
    }
}

/// Create a `Vob` of `len` unset bits.
pub(crate) fn empty_vob(len: usize) -> Vob {
    let mut v = Vob::new();
    v.resize(len, false);
    v
}

/// All four terminal sets of a grammar, computed once.
#[derive(Debug)]
pub struct TerminalSets<StorageT> {
    first: Firsts<StorageT>,
    follow: Follows<StorageT>,
    last: Firsts<StorageT>,
    before: Follows<StorageT>,
    tokens_len: usize,
}

impl<StorageT: 'static + PrimInt + Unsigned> TerminalSets<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(grm: &Grammar<StorageT>) -> Self {
        let first = Firsts::new(grm, Direction::Forward);
        let follow = Follows::new(grm, &first, Direction::Forward);
        let last = Firsts::new(grm, Direction::Backward);
        let before = Follows::new(grm, &last, Direction::Backward);
        log::debug!(
            "Terminal sets reached fixed points after {}/{}/{}/{} passes (first/follow/last/before)",
            first.passes(),
            follow.passes(),
            last.passes(),
            before.passes()
        );
        TerminalSets {
            first,
            follow,
            last,
            before,
            tokens_len: usize::from(grm.tokens_len()),
        }
    }

    /// The FIRST set of rule `ridx`.
    pub fn first(&self, ridx: RIdx<StorageT>) -> &Vob {
        self.first.firsts(ridx)
    }

    /// The FOLLOW set of rule `ridx`.
    pub fn follow(&self, ridx: RIdx<StorageT>) -> &Vob {
        self.follow.follows(ridx)
    }

    /// The LAST set of rule `ridx`.
    pub fn last(&self, ridx: RIdx<StorageT>) -> &Vob {
        self.last.firsts(ridx)
    }

    /// The BEFORE set of rule `ridx`.
    pub fn before(&self, ridx: RIdx<StorageT>) -> &Vob {
        self.before.follows(ridx)
    }

    /// The largest number of passes any of the four fixed points took.
    pub fn passes(&self) -> usize {
        self.first
            .passes()
            .max(self.follow.passes())
            .max(self.last.passes())
            .max(self.before.passes())
    }

    /// Can rule `ridx` derive the empty string?
    pub fn is_nullable(&self, ridx: RIdx<StorageT>) -> bool {
        self.first.is_epsilon_set(ridx)
    }

    /// Can every symbol in `syms` derive the empty string? True for an empty sequence.
    pub fn is_nullable_seq(&self, syms: &[Symbol<StorageT>]) -> bool {
        syms.iter().all(|sym| match *sym {
            Symbol::Terminal(_) => false,
            Symbol::Nonterminal(ridx) => self.is_nullable(ridx),
        })
    }

    /// The FIRST set of the sequence `syms`, and whether the whole sequence is nullable.
    pub fn first_of(&self, syms: &[Symbol<StorageT>]) -> (Vob, bool) {
        self.seq_set(syms, Direction::Forward)
    }

    /// The LAST set of the sequence `syms`, and whether the whole sequence is nullable.
    pub fn last_of(&self, syms: &[Symbol<StorageT>]) -> (Vob, bool) {
        self.seq_set(syms, Direction::Backward)
    }

    fn seq_set(&self, syms: &[Symbol<StorageT>], dir: Direction) -> (Vob, bool) {
        let mut set = empty_vob(self.tokens_len);
        for n in 0..syms.len() {
            match syms[dir.index(n, syms.len())] {
                Symbol::Terminal(tidx) => {
                    set.set(usize::from(tidx), true);
                    return (set, false);
                }
                Symbol::Nonterminal(ridx) => {
                    let rset = match dir {
                        Direction::Forward => self.first(ridx),
                        Direction::Backward => self.last(ridx),
                    };
                    set.or(rset);
                    if !self.is_nullable(ridx) {
                        return (set, false);
                    }
                }
            }
        }
        (set, true)
    }

    /// Pretty print every rule's sets, one rule per line.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let pp_set = |v: &Vob| {
            v.iter_set_bits(..)
                .map(|i| format!("'{}'", grm.token_name(TIdx(i.as_()))))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut s = String::new();
        for ridx in grm.iter_rules() {
            s.push_str(&format!(
                "{}{}\n  FIRST:  {{{}}}\n  FOLLOW: {{{}}}\n  LAST:   {{{}}}\n  BEFORE: {{{}}}\n",
                grm.rule_name_str(ridx),
                if self.is_nullable(ridx) { " (nullable)" } else { "" },
                pp_set(self.first(ridx)),
                pp_set(self.follow(ridx)),
                pp_set(self.last(ridx)),
                pp_set(self.before(ridx)),
            ));
        }
        s
    }
}
