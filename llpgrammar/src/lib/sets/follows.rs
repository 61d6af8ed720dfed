use std::marker::PhantomData;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use super::{Direction, empty_vob, firsts::Firsts};
use crate::{Grammar, RIdx, Symbol, TIdx};

/// `Follows` stores the follow sets (or, scanning [Direction::Backward], the before sets) of every
/// rule in a grammar. For example, given this grammar:
/// ```text
///   %start S; %left_delim 'l'; %right_delim 'r';
///   S -> 'l' A 'b' 'r';
///   A -> 'a';
///   A [A_empty] -> ;
/// ```
/// then FOLLOW(A) = {b} and BEFORE(A) = {l}.
///
/// Since every sentence is wrapped in the delimiters, nothing can follow (or come before) the
/// start rule: its sets are always empty, and there is no need for an end-of-input token.
#[derive(Debug)]
pub struct Follows<StorageT> {
    follows: Vec<Vob>,
    passes: usize,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Follows<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Generates and returns the follow (`Direction::Forward`) or before (`Direction::Backward`)
    /// sets for the given grammar. `firsts` must have been computed in the same direction.
    pub fn new(grm: &Grammar<StorageT>, firsts: &Firsts<StorageT>, dir: Direction) -> Self {
        let mut follows =
            vec![empty_vob(usize::from(grm.tokens_len())); usize::from(grm.rules_len())];
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for pidx in grm.iter_pidxs() {
                let ridx = grm.prod_to_rule(pidx);
                let prod = grm.prod(pidx);
                // We start from the "far" end of a production and work back towards its "near"
                // end, keeping track of the set of tokens which can appear straight after the
                // current symbol (`trailer`). While everything we have passed can produce the
                // empty string, the rule's own follow set can also appear after the current
                // symbol.
                let mut trailer = empty_vob(usize::from(grm.tokens_len()));
                let mut epsilon = true;
                for n in (0..prod.len()).rev() {
                    match prod[dir.index(n, prod.len())] {
                        Symbol::Terminal(tidx) => {
                            trailer = empty_vob(usize::from(grm.tokens_len()));
                            trailer.set(usize::from(tidx), true);
                            epsilon = false;
                        }
                        Symbol::Nonterminal(s_ridx) => {
                            if follows[usize::from(s_ridx)].or(&trailer) {
                                changed = true;
                            }
                            if epsilon && s_ridx != ridx {
                                let rule_follows = follows[usize::from(ridx)].clone();
                                if follows[usize::from(s_ridx)].or(&rule_follows) {
                                    changed = true;
                                }
                            }
                            if firsts.is_epsilon_set(s_ridx) {
                                trailer.or(firsts.firsts(s_ridx));
                            } else {
                                trailer = firsts.firsts(s_ridx).clone();
                                epsilon = false;
                            }
                        }
                    }
                }
            }
            if !changed {
                return Follows {
                    follows,
                    passes,
                    phantom: PhantomData,
                };
            }
        }
    }

    /// Return the follows `Vob` for rule `ridx`.
    pub fn follows(&self, ridx: RIdx<StorageT>) -> &Vob {
        &self.follows[usize::from(ridx)]
    }

    /// Returns true if the token `tidx` is in the follow set for rule `ridx`.
    pub fn is_set(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> bool {
        self.follows[usize::from(ridx)][usize::from(tidx)]
    }

    /// How many full passes over the grammar it took to reach the fixed point.
    pub fn passes(&self) -> usize {
        self.passes
    }
}
