use std::hash::Hash;

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet, map::Entry};
use llpgrammar::{
    Diagnostic, Grammar, PIdx, Severity, SpansKind, Symbol, TIdx, TerminalSets,
};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{InternalError, InternalErrorKind, LlTable, TrailingStacks, lltable::csv_escape};

/// Two terminals which can be adjacent in a sentence of the grammar.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdmissiblePair<StorageT> {
    pub x: TIdx<StorageT>,
    pub y: TIdx<StorageT>,
}

/// What happens to the parse stack between consuming the two terminals of an admissible pair.
/// Both stacks are ordered bottom to top.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LlpEntry<StorageT> {
    /// The symbols popped after `x` is consumed and before `y` is.
    pub initial_stack: Vec<Symbol<StorageT>>,
    /// The symbols pushed while reaching `y` which are still on the stack once `y` is consumed.
    pub final_stack: Vec<Symbol<StorageT>>,
    /// The productions applied between the two terminals, in the order they were applied.
    pub productions: Vec<PIdx<StorageT>>,
}

/// An admissible pair which can be reached with two different stacks between its terminals. No
/// single table entry can describe both, so the grammar is not LLP(1,1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LlpConflict<StorageT> {
    pub pair: AdmissiblePair<StorageT>,
    /// The production in which the pair was first found, and the stack (top first) popped between
    /// its terminals.
    pub first: (PIdx<StorageT>, Vec<Symbol<StorageT>>),
    /// A later production in which the pair was found with a different stack.
    pub second: (PIdx<StorageT>, Vec<Symbol<StorageT>>),
}

impl<StorageT: 'static + PrimInt + Unsigned> LlpConflict<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        format!(
            "LLP conflict on pair ('{}', '{}'): the stack between them may be [{}] (in '{}') or [{}] (in '{}')",
            grm.token_name(self.pair.x),
            grm.token_name(self.pair.y),
            grm.pp_symbols(&self.first.1),
            grm.prod_tag(self.first.0),
            grm.pp_symbols(&self.second.1),
            grm.prod_tag(self.second.0)
        )
    }

    pub fn diagnostic(&self, grm: &Grammar<StorageT>) -> Diagnostic {
        let mut spans = vec![grm.prod_span(self.second.0)];
        if self.first.0 != self.second.0 {
            spans.push(grm.prod_span(self.first.0));
        }
        Diagnostic::new(Severity::Error, self.pp(grm), spans, SpansKind::Conflict)
    }
}

#[derive(Debug)]
pub enum LlpTableError<StorageT> {
    /// The grammar is LL(1) but not LLP(1,1).
    Conflicts(Vec<LlpConflict<StorageT>>),
    Internal(InternalError<StorageT>),
}

impl<StorageT> From<InternalError<StorageT>> for LlpTableError<StorageT> {
    fn from(e: InternalError<StorageT>) -> Self {
        LlpTableError::Internal(e)
    }
}

/// A parallel LL table: for every admissible pair of terminals, the [LlpEntry] describing how
/// the parse progresses from one to the other. A sentence `t0 t1 ... tn` is parsed by
/// concatenating the start entry with the entries for `(t0, t1)`, `(t1, t2)`, and so on, each
/// of which can be looked up independently.
#[derive(Debug)]
pub struct LlpTable<StorageT> {
    start: LlpEntry<StorageT>,
    table: IndexMap<AdmissiblePair<StorageT>, LlpEntry<StorageT>, FnvBuildHasher>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> LlpTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new(
        grm: &Grammar<StorageT>,
        sets: &TerminalSets<StorageT>,
        ll: &LlTable<StorageT>,
        stacks: &TrailingStacks<StorageT>,
    ) -> Result<Self, LlpTableError<StorageT>> {
        let mut stack = vec![Symbol::Nonterminal(grm.start_rule_idx())];
        let productions = ll.partial_parse(grm, grm.left_delim(), &mut stack)?;
        let start = LlpEntry {
            initial_stack: Vec::new(),
            final_stack: stack,
            productions,
        };

        let popped = popped_stacks(grm, sets, stacks)?;
        let mut table = IndexMap::with_capacity_and_hasher(popped.len(), FnvBuildHasher::default());
        for (pair, (_, frag)) in popped {
            // `frag` is top first: reversing it gives a stack ordered bottom to top.
            let mut stack = frag.into_iter().rev().collect::<Vec<_>>();
            let initial_stack = stack.clone();
            let productions = ll.partial_parse(grm, pair.y, &mut stack)?;
            log::trace!(
                "('{}', '{}'): pop [{}], push [{}], apply [{}]",
                grm.token_name(pair.x),
                grm.token_name(pair.y),
                grm.pp_symbols(&initial_stack),
                grm.pp_symbols(&stack),
                productions
                    .iter()
                    .map(|&p| grm.prod_tag(p))
                    .collect::<Vec<_>>()
                    .join(" ")
            );
            table.insert(
                pair,
                LlpEntry {
                    initial_stack,
                    final_stack: stack,
                    productions,
                },
            );
        }

        let llp = LlpTable { start, table };
        llp.check_complete(grm, sets)?;
        log::debug!("LLP table has {} admissible pairs", llp.len());
        Ok(llp)
    }

    /// The entry describing the consumption of the left delimiter from a stack holding only the
    /// start rule.
    pub fn start(&self) -> &LlpEntry<StorageT> {
        &self.start
    }

    /// The entry for the pair `(x, y)`, or `None` if the pair is not admissible.
    pub fn get(&self, x: TIdx<StorageT>, y: TIdx<StorageT>) -> Option<&LlpEntry<StorageT>> {
        self.table.get(&AdmissiblePair { x, y })
    }

    /// Iterate over every admissible pair and its entry, in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (&AdmissiblePair<StorageT>, &LlpEntry<StorageT>)> {
        self.table.iter()
    }

    /// How many admissible pairs are there?
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check that the pairs in this table are exactly those which the terminal sets say can be
    /// adjacent.
    fn check_complete(
        &self,
        grm: &Grammar<StorageT>,
        sets: &TerminalSets<StorageT>,
    ) -> Result<(), InternalError<StorageT>> {
        let expected = admissible_pairs(grm, sets);
        if let Some(&pair) = expected.iter().find(|p| !self.table.contains_key(*p)) {
            return Err(InternalError {
                kind: InternalErrorKind::MissingPair(pair),
            });
        }
        if let Some(&pair) = self.table.keys().find(|p| !expected.contains(*p)) {
            return Err(InternalError {
                kind: InternalErrorKind::UnexpectedPair(pair),
            });
        }
        Ok(())
    }

    /// Render the table as CSV, one row per entry, starting with the start entry (whose pair
    /// columns are empty).
    pub fn dump_csv(&self, grm: &Grammar<StorageT>) -> String {
        let row = |x: &str, y: &str, e: &LlpEntry<StorageT>| {
            [
                csv_escape(x),
                csv_escape(y),
                csv_escape(&grm.pp_symbols(&e.initial_stack)),
                csv_escape(&grm.pp_symbols(&e.final_stack)),
                csv_escape(
                    &e.productions
                        .iter()
                        .map(|&p| grm.prod_tag(p))
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
            ]
            .join(",")
        };
        let mut s = String::from("x,y,initial_stack,final_stack,productions\n");
        s.push_str(&row("", "", &self.start));
        s.push('\n');
        for (pair, e) in &self.table {
            s.push_str(&row(grm.token_name(pair.x), grm.token_name(pair.y), e));
            s.push('\n');
        }
        s
    }
}

/// For every admissible pair, find the stack (top first) popped between its two terminals. A
/// pair `(x, y)` is found in a production `A -> α` at positions `i < j` where `x` ends `α[i]`,
/// `y` starts `α[j]`, and everything between them can be empty. The popped stack is then
/// whatever `α[i]` left behind after `x` followed by `α[i+1..=j]`.
fn popped_stacks<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    sets: &TerminalSets<StorageT>,
    stacks: &TrailingStacks<StorageT>,
) -> Result<
    IndexMap<AdmissiblePair<StorageT>, (PIdx<StorageT>, Vec<Symbol<StorageT>>), FnvBuildHasher>,
    LlpTableError<StorageT>,
>
where
    usize: AsPrimitive<StorageT>,
{
    let mut popped = IndexMap::with_hasher(FnvBuildHasher::default());
    let mut conflicts = IndexMap::<_, _, FnvBuildHasher>::default();
    for pidx in grm.iter_pidxs() {
        let prod = grm.prod(pidx);
        for j in 1..prod.len() {
            let (ys, _) = sets.first_of(&prod[j..=j]);
            for i in (0..j).rev() {
                let trailing = match prod[i] {
                    Symbol::Terminal(tidx) => vec![(tidx, Vec::new())],
                    Symbol::Nonterminal(ridx) => stacks
                        .iter(ridx)
                        .flat_map(|(x, frags)| frags.iter().map(move |f| (x, f.clone())))
                        .collect(),
                };
                for (x, mut frag) in trailing {
                    frag.extend_from_slice(&prod[i + 1..=j]);
                    for y in ys.iter_set_bits(..) {
                        let pair = AdmissiblePair {
                            x,
                            y: TIdx(y.as_()),
                        };
                        match popped.entry(pair) {
                            Entry::Vacant(e) => {
                                e.insert((pidx, frag.clone()));
                            }
                            Entry::Occupied(e) => {
                                if e.get().1 != frag {
                                    conflicts.entry(pair).or_insert_with(|| LlpConflict {
                                        pair,
                                        first: e.get().clone(),
                                        second: (pidx, frag.clone()),
                                    });
                                }
                            }
                        }
                    }
                }
                if !sets.is_nullable_seq(&prod[i..=i]) {
                    break;
                }
            }
        }
    }
    if conflicts.is_empty() {
        Ok(popped)
    } else {
        Err(LlpTableError::Conflicts(conflicts.into_values().collect()))
    }
}

/// Compute, from the terminal sets alone, every pair of terminals which can be adjacent in a
/// sentence: for `A -> α` and `y` in FIRST(`α[j]`), `x` can be any terminal in LAST(`α[k]`) for
/// a `k < j` with `α[k+1..j]` nullable, or any terminal in BEFORE(`A`) if `α[..j]` is nullable.
pub fn admissible_pairs<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &Grammar<StorageT>,
    sets: &TerminalSets<StorageT>,
) -> IndexSet<AdmissiblePair<StorageT>, FnvBuildHasher>
where
    usize: AsPrimitive<StorageT>,
{
    let mut pairs = IndexSet::with_hasher(FnvBuildHasher::default());
    for pidx in grm.iter_pidxs() {
        let prod = grm.prod(pidx);
        for j in 0..prod.len() {
            let (ys, _) = sets.first_of(&prod[j..=j]);
            let mut xs = sets.last_of(&prod[..j]).0;
            if sets.is_nullable_seq(&prod[..j]) {
                xs.or(sets.before(grm.prod_to_rule(pidx)));
            }
            for x in xs.iter_set_bits(..) {
                for y in ys.iter_set_bits(..) {
                    pairs.insert(AdmissiblePair {
                        x: TIdx(x.as_()),
                        y: TIdx(y.as_()),
                    });
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod test {
    use llpgrammar::{Grammar, Symbol};

    use super::{AdmissiblePair, LlpEntry, LlpTable, LlpTableError, admissible_pairs};
    use crate::{LlTable, TrailingStacks};

    fn build(grm: &Grammar) -> Result<LlpTable<u32>, LlpTableError<u32>> {
        let sets = grm.terminal_sets();
        let ll = LlTable::new(grm, &sets).unwrap();
        let stacks = TrailingStacks::new(grm, &sets);
        LlpTable::new(grm, &sets, &ll, &stacks)
    }

    #[test]
    fn test_small() {
        let grm = Grammar::new(
            "%start S; %left_delim '('; %right_delim ')'; S -> '(' E ')'; E -> 'a';",
        )
        .unwrap();
        let llp = build(&grm).unwrap();
        let e = grm.rule_idx("E").unwrap();
        let lbr = grm.token_idx("(").unwrap();
        let rbr = grm.token_idx(")").unwrap();
        let a = grm.token_idx("a").unwrap();

        assert_eq!(
            llp.start(),
            &LlpEntry {
                initial_stack: vec![],
                final_stack: vec![Symbol::Terminal(rbr), Symbol::Nonterminal(e)],
                productions: vec![grm.tag_idx("S").unwrap()],
            }
        );
        assert_eq!(
            llp.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
            vec![
                AdmissiblePair { x: lbr, y: a },
                AdmissiblePair { x: a, y: rbr }
            ]
        );
        assert_eq!(
            llp.get(lbr, a),
            Some(&LlpEntry {
                initial_stack: vec![Symbol::Nonterminal(e)],
                final_stack: vec![],
                productions: vec![grm.tag_idx("E").unwrap()],
            })
        );
        assert_eq!(
            llp.get(a, rbr),
            Some(&LlpEntry {
                initial_stack: vec![Symbol::Terminal(rbr)],
                final_stack: vec![],
                productions: vec![],
            })
        );
        assert_eq!(llp.get(lbr, rbr), None);
    }

    #[test]
    fn test_pending_stack() {
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
        let llp = build(&grm).unwrap();
        let t = |n| grm.token_idx(n).unwrap();
        let nt = |n| Symbol::Nonterminal(grm.rule_idx(n).unwrap());
        let tag = |n| grm.tag_idx(n).unwrap();

        // After an id which closes a parenthesised expression, the tails of the expression and
        // the closing parenthesis are popped.
        let e = llp.get(t("id"), t("rpar")).unwrap();
        assert_eq!(
            e.initial_stack,
            vec![Symbol::Terminal(t("rpar")), nt("E2"), nt("T2")]
        );
        assert_eq!(e.final_stack, vec![]);
        assert_eq!(e.productions, vec![tag("T2_empty"), tag("E2_empty")]);

        // An opening parenthesis leaves the rest of the factor, the term, and the expression
        // pending.
        let e = llp.get(t("lpar"), t("id")).unwrap();
        assert_eq!(e.initial_stack, vec![nt("E")]);
        assert_eq!(e.final_stack, vec![nt("E2"), nt("T2")]);
        assert_eq!(e.productions, vec![tag("E"), tag("T"), tag("F_id")]);

        assert_eq!(llp.get(t("id"), t("id")), None);
        assert_eq!(llp.get(t("rpar"), t("lpar")), None);
    }

    #[test]
    fn test_conflict() {
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' Stmts 'r';
            Stmts [Stmts_more] -> Stmt Stmts;
            Stmts [Stmts_empty] -> ;
            Stmt [Stmt_if] -> 'if' Block Else;
            Stmt [Stmt_id] -> 'id';
            Block -> 'lb' Stmts 'rb';
            Else [Else_else] -> 'else' Block;
            Else [Else_empty] -> ;
            ",
        )
        .unwrap();
        match build(&grm) {
            Err(LlpTableError::Conflicts(conflicts)) => {
                let pairs = conflicts
                    .iter()
                    .map(|c| {
                        (
                            grm.token_name(c.pair.x).to_owned(),
                            grm.token_name(c.pair.y).to_owned(),
                        )
                    })
                    .collect::<Vec<_>>();
                assert!(pairs.contains(&("rb".to_owned(), "id".to_owned())));
                assert!(conflicts.iter().all(|c| c.first.1 != c.second.1));
                assert!(conflicts[0].pp(&grm).starts_with("LLP conflict on pair"));
            }
            Err(e) => panic!("Unexpected error {:?}", e),
            Ok(_) => panic!("Conflict not detected"),
        }
    }

    #[test]
    fn test_admissible_pairs() {
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' A B 'r';
            A [A_a] -> 'a';
            A [A_e] -> ;
            B [B_b] -> 'b';
            B [B_e] -> ;
            ",
        )
        .unwrap();
        let sets = grm.terminal_sets();
        let mut pairs = admissible_pairs(&grm, &sets)
            .into_iter()
            .map(|p| format!("{}{}", grm.token_name(p.x), grm.token_name(p.y)))
            .collect::<Vec<_>>();
        pairs.sort();
        assert_eq!(pairs, vec!["ab", "ar", "br", "la", "lb", "lr"]);
        let llp = build(&grm).unwrap();
        assert_eq!(llp.len(), 6);
    }

    #[test]
    fn test_dump_csv() {
        let grm = Grammar::new(
            "%start S; %left_delim '('; %right_delim ')'; S -> '(' E ')'; E -> 'a';",
        )
        .unwrap();
        let llp = build(&grm).unwrap();
        assert_eq!(
            llp.dump_csv(&grm),
            "x,y,initial_stack,final_stack,productions\n,,,\"')' E\",S\n(,a,E,,E\na,),')',,\n"
        );
    }
}
