use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use super::{Direction, empty_vob};
use crate::{Grammar, RIdx, Symbol, TIdx};

/// `Firsts` stores the first sets (or, scanning [Direction::Backward], the last sets) of every
/// rule in a grammar. For example, given this grammar:
/// ```text
///   %start S; %left_delim 'l'; %right_delim 'r';
///   S -> 'l' A 'b' 'r';
///   A -> 'a';
///   A [A_empty] -> ;
/// ```
/// then, scanning forwards, FIRST(S) = {l}, FIRST(A) = {a} and A is nullable. Scanning backwards,
/// LAST(S) = {r} and LAST(A) = {a}.
#[derive(Debug)]
pub struct Firsts<StorageT> {
    firsts: Vec<Vob>,
    epsilons: Vob,
    passes: usize,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Firsts<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the first (`Direction::Forward`) or last (`Direction::Backward`)
    /// sets for the given grammar.
    pub fn new(grm: &Grammar<StorageT>, dir: Direction) -> Self {
        let mut firsts = Firsts {
            firsts: vec![empty_vob(usize::from(grm.tokens_len())); usize::from(grm.rules_len())],
            epsilons: empty_vob(usize::from(grm.rules_len())),
            passes: 0,
            phantom: PhantomData,
        };

        // Loop looking for changes to the sets, until we reach a fixed point. In essence, we look
        // at each production of each rule R, and see if any of the rules at its "near" end have
        // new elements in since we last looked. If they do, we'll have to do another round.
        loop {
            firsts.passes += 1;
            let mut changed = false;
            for pidx in grm.iter_pidxs() {
                let ridx = grm.prod_to_rule(pidx);
                let prod = grm.prod(pidx);
                let mut nullable = true;
                for n in 0..prod.len() {
                    match prod[dir.index(n, prod.len())] {
                        Symbol::Terminal(tidx) => {
                            if !firsts.set(ridx, tidx) {
                                changed = true;
                            }
                            nullable = false;
                            break;
                        }
                        Symbol::Nonterminal(s_ridx) => {
                            // Union s_ridx's set into ridx's. Note this is (intentionally) a no-op
                            // if the two rules are one and the same.
                            if s_ridx != ridx {
                                let other = firsts.firsts[usize::from(s_ridx)].clone();
                                if firsts.firsts[usize::from(ridx)].or(&other) {
                                    changed = true;
                                }
                            }
                            // If s_ridx can't produce the empty string, the symbols beyond it
                            // can't contribute.
                            if !firsts.is_epsilon_set(s_ridx) {
                                nullable = false;
                                break;
                            }
                        }
                    }
                }
                if nullable && !firsts.is_epsilon_set(ridx) {
                    firsts.epsilons.set(usize::from(ridx), true);
                    changed = true;
                }
            }
            if !changed {
                return firsts;
            }
        }
    }

    /// Return all the firsts for rule `ridx`.
    pub fn firsts(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.firsts[usize::from(ridx)]
    }

    /// Returns true if the token `tidx` is in the first set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.firsts[usize::from(ridx)][usize::from(tidx)]
    }

    /// Returns true if the rule `ridx` can derive the empty string.
    pub fn is_epsilon_set(&self, ridx: RIdx<StorageT>) -> bool {
        self.epsilons[usize::from(ridx)]
    }

    /// How many full passes over the grammar it took to reach the fixed point (including the
    /// final pass which found nothing new).
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Ensures that the firsts bit for token `tidx` rule `ridx` is set. Returns true if
    /// it was already set, or false otherwise.
    fn set(&mut self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        let r = &mut self.firsts[usize::from(ridx)];
        if r[usize::from(tidx)] {
            true
        } else {
            r.set(usize::from(tidx), true);
            false
        }
    }
}
