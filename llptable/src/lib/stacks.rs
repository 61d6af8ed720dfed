use std::hash::Hash;

use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use llpgrammar::{Grammar, RIdx, Symbol, TIdx, TerminalSets};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// Once a (rule, terminal) pair has this many distinct trailing stacks, the grammar is already
/// known not to be LLP(1,1) wherever the pair is used, so there is no point looking for more.
const MAX_FRAGMENTS: usize = 2;

type Fragments<StorageT> = IndexMap<TIdx<StorageT>, Vec<Vec<Symbol<StorageT>>>, FnvBuildHasher>;

/// The *trailing stacks* of a grammar. For a rule `X` and a terminal `x` in LAST(X), a trailing
/// stack is a sequence of symbols which are still on the parse stack, left there by `X`'s
/// expansion, immediately after `x` has been consumed as the last terminal of `X`. Every symbol
/// in a trailing stack derives the empty string. Stacks are stored top first. For example, given:
///
/// ```text
///   %start S; %left_delim 'l'; %right_delim 'r';
///   S -> 'l' A 'r';
///   A -> 'a' B;
///   B [B_b] -> 'b';
///   B [B_empty] -> ;
/// ```
///
/// then the trailing stacks of `(A, 'a')` are `{[B]}` and those of `(A, 'b')` are `{[]}`.
#[derive(Debug)]
pub struct TrailingStacks<StorageT> {
    stacks: Vec<Fragments<StorageT>>,
    passes: usize,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> TrailingStacks<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(grm: &Grammar<StorageT>, sets: &TerminalSets<StorageT>) -> Self {
        let mut stacks = vec![Fragments::default(); usize::from(grm.rules_len())];
        let mut passes = 0;
        loop {
            passes += 1;
            let mut changed = false;
            for pidx in grm.iter_pidxs() {
                let ridx = usize::from(grm.prod_to_rule(pidx));
                let prod = grm.prod(pidx);
                // Walk back from the end of the production for as long as everything after the
                // current symbol can be empty.
                for k in (0..prod.len()).rev() {
                    let suffix = &prod[k + 1..];
                    match prod[k] {
                        Symbol::Terminal(tidx) => {
                            changed |= add(&mut stacks[ridx], tidx, suffix.to_vec());
                            break;
                        }
                        Symbol::Nonterminal(s_ridx) => {
                            let new = stacks[usize::from(s_ridx)]
                                .iter()
                                .flat_map(|(&x, frags)| {
                                    frags.iter().map(move |frag| {
                                        (x, frag.iter().chain(suffix).copied().collect::<Vec<_>>())
                                    })
                                })
                                .collect::<Vec<_>>();
                            for (x, frag) in new {
                                changed |= add(&mut stacks[ridx], x, frag);
                            }
                            if !sets.is_nullable(s_ridx) {
                                break;
                            }
                        }
                    }
                }
            }
            if !changed {
                log::debug!("Trailing stacks reached a fixed point after {} passes", passes);
                return TrailingStacks { stacks, passes };
            }
        }
    }

    /// The trailing stacks (top first) of rule `ridx` after terminal `tidx`. Empty if `tidx` is
    /// not in LAST(`ridx`).
    pub fn get(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> &[Vec<Symbol<StorageT>>] {
        self.stacks[usize::from(ridx)]
            .get(&tidx)
            .map(|frags| frags.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate over the terminals in LAST(`ridx`) and their trailing stacks.
    pub fn iter(
        &self,
        ridx: RIdx<StorageT>,
    ) -> impl Iterator<Item = (TIdx<StorageT>, &[Vec<Symbol<StorageT>>])> {
        self.stacks[usize::from(ridx)]
            .iter()
            .map(|(&x, frags)| (x, frags.as_slice()))
    }

    /// How many full passes over the grammar it took to reach the fixed point.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Pretty print every rule's trailing stacks.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        let mut s = String::new();
        for ridx in grm.iter_rules() {
            for (x, frags) in self.iter(ridx) {
                s.push_str(&format!(
                    "{} '{}': {}\n",
                    grm.rule_name_str(ridx),
                    grm.token_name(x),
                    frags
                        .iter()
                        .map(|frag| format!("[{}]", grm.pp_symbols(frag)))
                        .collect::<Vec<_>>()
                        .join(" | ")
                ));
            }
        }
        s
    }
}

/// Record `frag` as a trailing stack of `x`, returning true if it was new.
fn add<StorageT: Hash + Eq>(
    frags: &mut Fragments<StorageT>,
    x: TIdx<StorageT>,
    frag: Vec<Symbol<StorageT>>,
) -> bool {
    let e = frags.entry(x).or_default();
    if e.len() >= MAX_FRAGMENTS || e.contains(&frag) {
        false
    } else {
        e.push(frag);
        true
    }
}

#[cfg(test)]
mod test {
    use llpgrammar::{Grammar, Symbol};

    use super::TrailingStacks;

    fn has(grm: &Grammar, stacks: &TrailingStacks<u32>, rn: &str, tn: &str, should_be: &[&[&str]]) {
        let ridx = grm.rule_idx(rn).unwrap();
        let tidx = grm.token_idx(tn).unwrap();
        let expected = should_be
            .iter()
            .map(|frag| {
                frag.iter()
                    .map(|n| Symbol::Nonterminal(grm.rule_idx(n).unwrap()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        assert_eq!(stacks.get(ridx, tidx), expected.as_slice(), "{} '{}'", rn, tn);
    }

    #[test]
    fn test_doc_example() {
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' A 'r';
            A -> 'a' B;
            B [B_b] -> 'b';
            B [B_empty] -> ;
            ",
        )
        .unwrap();
        let stacks = TrailingStacks::new(&grm, &grm.terminal_sets());
        has(&grm, &stacks, "A", "a", &[&["B"]]);
        has(&grm, &stacks, "A", "b", &[&[]]);
        has(&grm, &stacks, "B", "b", &[&[]]);
        has(&grm, &stacks, "S", "r", &[&[]]);
        has(&grm, &stacks, "S", "a", &[]);
    }

    #[test]
    fn test_expr() {
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' E 'r';
            E -> T E2;
            E2 [E2_add] -> 'plus' T E2;
            E2 [E2_empty] -> ;
            T -> F T2;
            T2 [T2_mul] -> 'mul' F T2;
            T2 [T2_empty] -> ;
            F [F_paren] -> 'lpar' E 'rpar';
            F [F_id] -> 'id';
            ",
        )
        .unwrap();
        let sets = grm.terminal_sets();
        let stacks = TrailingStacks::new(&grm, &sets);
        has(&grm, &stacks, "F", "id", &[&[]]);
        has(&grm, &stacks, "T2", "id", &[&["T2"]]);
        has(&grm, &stacks, "T", "id", &[&["T2"]]);
        has(&grm, &stacks, "E2", "rpar", &[&["T2", "E2"]]);
        has(&grm, &stacks, "E", "id", &[&["T2", "E2"]]);

        // A terminal has a trailing stack precisely when it is in the rule's LAST set.
        for ridx in grm.iter_rules() {
            for tidx in grm.iter_tidxs() {
                assert_eq!(
                    !stacks.get(ridx, tidx).is_empty(),
                    sets.last(ridx)[usize::from(tidx)]
                );
            }
        }
        let bound = 2 * usize::from(grm.rules_len()) * usize::from(grm.tokens_len()) + 1;
        assert!(stacks.passes() <= bound);
    }

    #[test]
    fn test_ambiguous_trailing_stacks() {
        // After 'rb' the optional else branch may or may not still be pending.
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' Stmt 'r';
            Stmt [Stmt_if] -> 'if' Block Else;
            Stmt [Stmt_id] -> 'id';
            Block -> 'lb' Stmt 'rb';
            Else [Else_else] -> 'else' Block;
            Else [Else_empty] -> ;
            ",
        )
        .unwrap();
        let stacks = TrailingStacks::new(&grm, &grm.terminal_sets());
        has(&grm, &stacks, "Stmt", "rb", &[&[], &["Else"]]);
    }

    #[test]
    fn test_pp() {
        let grm = Grammar::new(
            "%start S; %left_delim 'l'; %right_delim 'r'; S -> 'l' A 'r'; A -> 'a' B; B -> ;",
        )
        .unwrap();
        let stacks = TrailingStacks::new(&grm, &grm.terminal_sets());
        assert_eq!(stacks.pp(&grm), "S 'r': []\nA 'a': [B]\n");
    }
}
