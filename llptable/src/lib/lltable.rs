use std::{
    error::Error,
    fmt::{self, Debug},
    hash::Hash,
};

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, map::Entry};
use llpgrammar::{
    Diagnostic, Grammar, PIdx, RIdx, Severity, SpansKind, Symbol, TIdx, TerminalSets,
};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::{InternalError, InternalErrorKind};

/// A cell of the LL(1) table: the nonterminal on top of the parse stack and the lookahead
/// terminal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LlState<StorageT> {
    pub stack_top: RIdx<StorageT>,
    pub lookahead: TIdx<StorageT>,
}

/// Two productions which both claim the same cell of the LL(1) table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LlConflict<StorageT> {
    pub state: LlState<StorageT>,
    /// The production which was installed in the cell first.
    pub existing: PIdx<StorageT>,
    /// The production which tried to install itself in the same cell.
    pub conflicting: PIdx<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> LlConflict<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Pretty print this conflict with the names used in `grm`.
    pub fn pp(&self, grm: &Grammar<StorageT>) -> String {
        format!(
            "LL(1) conflict in cell ({}, '{}'): productions '{}' and '{}' both apply",
            grm.rule_name_str(self.state.stack_top),
            grm.token_name(self.state.lookahead),
            grm.prod_tag(self.existing),
            grm.prod_tag(self.conflicting)
        )
    }

    /// Turn this conflict into a [Diagnostic] pointing at the conflicting production first and
    /// the production it conflicts with second.
    pub fn diagnostic(&self, grm: &Grammar<StorageT>) -> Diagnostic {
        Diagnostic::new(
            Severity::Error,
            self.pp(grm),
            vec![grm.prod_span(self.conflicting), grm.prod_span(self.existing)],
            SpansKind::Conflict,
        )
    }
}

/// Returned by [LlTable::parse] when the input is not a sentence of the grammar.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError<StorageT> {
    /// The index of the rejected token. If the input ended while the parse still expected more
    /// tokens, this is the length of the input.
    pub pos: usize,
    /// The rejected token, or `None` if the input ended prematurely.
    pub token: Option<TIdx<StorageT>>,
}

impl<StorageT: Debug> Error for ParseError<StorageT> {}

impl<StorageT: Debug> fmt::Display for ParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.token {
            Some(tidx) => write!(f, "Unexpected token {:?} at position {}", tidx, self.pos),
            None => write!(f, "Input ended prematurely at position {}", self.pos),
        }
    }
}

/// An LL(1) parsing table, mapping `(nonterminal, lookahead)` cells to the single production
/// which applies.
#[derive(Debug)]
pub struct LlTable<StorageT> {
    table: IndexMap<LlState<StorageT>, PIdx<StorageT>, FnvBuildHasher>,
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> LlTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Build the LL(1) table for `grm`. If the grammar is not LL(1), every conflicting cell is
    /// returned.
    pub fn new(
        grm: &Grammar<StorageT>,
        sets: &TerminalSets<StorageT>,
    ) -> Result<Self, Vec<LlConflict<StorageT>>> {
        let mut table = IndexMap::with_hasher(FnvBuildHasher::default());
        let mut conflicts = Vec::new();
        for pidx in grm.iter_pidxs() {
            let ridx = grm.prod_to_rule(pidx);
            let (mut lookaheads, nullable) = sets.first_of(grm.prod(pidx));
            if nullable {
                lookaheads.or(sets.follow(ridx));
            }
            for tidx in lookaheads.iter_set_bits(..) {
                let state = LlState {
                    stack_top: ridx,
                    // Since `lookaheads` is exactly tokens_len bits long, as_ is safe.
                    lookahead: TIdx(tidx.as_()),
                };
                match table.entry(state) {
                    Entry::Vacant(e) => {
                        e.insert(pidx);
                    }
                    Entry::Occupied(e) => {
                        if *e.get() != pidx {
                            conflicts.push(LlConflict {
                                state,
                                existing: *e.get(),
                                conflicting: pidx,
                            });
                        }
                    }
                }
            }
        }
        if conflicts.is_empty() {
            log::debug!("LL(1) table has {} entries", table.len());
            Ok(LlTable { table })
        } else {
            Err(conflicts)
        }
    }

    /// The production to apply when `ridx` is on top of the stack and `tidx` is the lookahead,
    /// if there is one.
    pub fn get(&self, ridx: RIdx<StorageT>, tidx: TIdx<StorageT>) -> Option<PIdx<StorageT>> {
        self.table
            .get(&LlState {
                stack_top: ridx,
                lookahead: tidx,
            })
            .copied()
    }

    /// How many cells of the table are filled?
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterate over the filled cells in the order they were filled.
    pub fn iter(&self) -> impl Iterator<Item = (LlState<StorageT>, PIdx<StorageT>)> + '_ {
        self.table.iter().map(|(&state, &pidx)| (state, pidx))
    }

    /// Simulate the parse stack until the terminal `y` is consumed. `stack` is ordered bottom to
    /// top. Nonterminals popped from the stack are expanded with the production the table
    /// selects for lookahead `y`, and those productions are returned in the order they were
    /// applied. On success the terminal `y` has been popped and `stack` holds whatever remains.
    pub fn partial_parse(
        &self,
        grm: &Grammar<StorageT>,
        y: TIdx<StorageT>,
        stack: &mut Vec<Symbol<StorageT>>,
    ) -> Result<Vec<PIdx<StorageT>>, InternalError<StorageT>> {
        let mut prods = Vec::new();
        loop {
            match stack.pop() {
                None => {
                    return Err(InternalError {
                        kind: InternalErrorKind::StackExhausted { lookahead: y },
                    });
                }
                Some(Symbol::Terminal(tidx)) => {
                    if tidx != y {
                        return Err(InternalError {
                            kind: InternalErrorKind::TerminalMismatch {
                                expected: y,
                                found: tidx,
                            },
                        });
                    }
                    return Ok(prods);
                }
                Some(Symbol::Nonterminal(ridx)) => {
                    let Some(pidx) = self.get(ridx, y) else {
                        return Err(InternalError {
                            kind: InternalErrorKind::MissingEntry {
                                stack_top: ridx,
                                lookahead: y,
                            },
                        });
                    };
                    prods.push(pidx);
                    stack.extend(grm.prod(pidx).iter().rev().copied());
                }
            }
        }
    }

    /// A sequential LL(1) parse of `tokens`, which must start with the left delimiter and end
    /// with the right delimiter. Returns the productions applied, in the order they were applied.
    pub fn parse(
        &self,
        grm: &Grammar<StorageT>,
        tokens: &[TIdx<StorageT>],
    ) -> Result<Vec<PIdx<StorageT>>, ParseError<StorageT>> {
        let mut stack = vec![Symbol::Nonterminal(grm.start_rule_idx())];
        let mut prods = Vec::new();
        for (pos, &tidx) in tokens.iter().enumerate() {
            match self.partial_parse(grm, tidx, &mut stack) {
                Ok(p) => prods.extend(p),
                Err(_) => {
                    return Err(ParseError {
                        pos,
                        token: Some(tidx),
                    });
                }
            }
        }
        if stack.is_empty() {
            Ok(prods)
        } else {
            Err(ParseError {
                pos: tokens.len(),
                token: None,
            })
        }
    }

    /// Render the table as CSV: one row per nonterminal, one column per terminal which appears
    /// in at least one cell.
    pub fn dump_csv(&self, grm: &Grammar<StorageT>) -> String {
        let tidxs = grm
            .iter_tidxs()
            .filter(|&t| self.table.keys().any(|s| s.lookahead == t))
            .collect::<Vec<_>>();
        let mut s = String::new();
        for &tidx in &tidxs {
            s.push(',');
            s.push_str(&csv_escape(grm.token_name(tidx)));
        }
        s.push('\n');
        for ridx in grm.iter_rules() {
            s.push_str(&csv_escape(grm.rule_name_str(ridx)));
            for &tidx in &tidxs {
                s.push(',');
                if let Some(pidx) = self.get(ridx, tidx) {
                    s.push_str(&csv_escape(&grm.pp_prod(pidx)));
                }
            }
            s.push('\n');
        }
        s
    }
}

/// Quote `s` for use as a CSV field if it contains anything which would otherwise confuse a CSV
/// reader.
pub(crate) fn csv_escape(s: &str) -> String {
    if s.contains([',', '"', '\n', ' ']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_owned()
    }
}

#[cfg(test)]
mod test {
    use llpgrammar::{Grammar, PIdx, Symbol, TIdx};

    use super::{LlConflict, LlState, LlTable};
    use crate::InternalErrorKind;

    fn build(src: &str) -> (Grammar, LlTable<u32>) {
        let grm = Grammar::new(src).unwrap();
        let sets = grm.terminal_sets();
        let ll = LlTable::new(&grm, &sets).unwrap();
        (grm, ll)
    }

    fn toks(grm: &Grammar, names: &[&str]) -> Vec<TIdx<u32>> {
        names.iter().map(|n| grm.token_idx(n).unwrap()).collect()
    }

    const EXPR: &str = "
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
    ";

    #[test]
    fn test_cells() {
        let (grm, ll) = build(EXPR);
        let e2 = grm.rule_idx("E2").unwrap();
        let f = grm.rule_idx("F").unwrap();
        let t = |n| grm.token_idx(n).unwrap();
        assert_eq!(ll.get(e2, t("plus")), grm.tag_idx("E2_add"));
        assert_eq!(ll.get(e2, t("r")), grm.tag_idx("E2_empty"));
        assert_eq!(ll.get(e2, t("rpar")), grm.tag_idx("E2_empty"));
        assert_eq!(ll.get(e2, t("id")), None);
        assert_eq!(ll.get(f, t("lpar")), grm.tag_idx("F_paren"));
        assert_eq!(ll.get(f, t("id")), grm.tag_idx("F_id"));
        // S: 1, E: 2, E2: 3, T: 2, T2: 4, F: 2
        assert_eq!(ll.len(), 14);
    }

    #[test]
    fn test_conflict() {
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' E 'r';
            E [E_add] -> 'a' 'plus' E;
            E [E_a] -> 'a';
            ",
        )
        .unwrap();
        let sets = grm.terminal_sets();
        let conflicts = LlTable::new(&grm, &sets).unwrap_err();
        assert_eq!(
            conflicts,
            vec![LlConflict {
                state: LlState {
                    stack_top: grm.rule_idx("E").unwrap(),
                    lookahead: grm.token_idx("a").unwrap(),
                },
                existing: grm.tag_idx("E_add").unwrap(),
                conflicting: grm.tag_idx("E_a").unwrap(),
            }]
        );
        assert_eq!(
            conflicts[0].pp(&grm),
            "LL(1) conflict in cell (E, 'a'): productions 'E_add' and 'E_a' both apply"
        );
        let d = conflicts[0].diagnostic(&grm);
        assert_eq!(
            d.spans,
            vec![
                grm.prod_span(grm.tag_idx("E_a").unwrap()),
                grm.prod_span(grm.tag_idx("E_add").unwrap())
            ]
        );
    }

    #[test]
    fn test_nullable_conflict() {
        // B is nullable and 'b' is in both FIRST(B) and FOLLOW(B).
        let grm = Grammar::new(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' B 'b' 'r';
            B [B_b] -> 'b';
            B [B_e] -> ;
            ",
        )
        .unwrap();
        let sets = grm.terminal_sets();
        let conflicts = LlTable::new(&grm, &sets).unwrap_err();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].existing, PIdx(1));
        assert_eq!(conflicts[0].conflicting, PIdx(2));
    }

    #[test]
    fn test_partial_parse() {
        let (grm, ll) = build(EXPR);
        let mut stack = vec![Symbol::Nonterminal(grm.start_rule_idx())];
        let prods = ll.partial_parse(&grm, grm.left_delim(), &mut stack).unwrap();
        assert_eq!(prods, vec![grm.start_prod()]);
        assert_eq!(
            stack,
            vec![
                Symbol::Terminal(grm.right_delim()),
                Symbol::Nonterminal(grm.rule_idx("E").unwrap())
            ]
        );
        let prods = ll
            .partial_parse(&grm, grm.token_idx("id").unwrap(), &mut stack)
            .unwrap();
        assert_eq!(
            prods,
            vec![
                grm.tag_idx("E").unwrap(),
                grm.tag_idx("T").unwrap(),
                grm.tag_idx("F_id").unwrap()
            ]
        );
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_partial_parse_errors() {
        let (grm, ll) = build(EXPR);
        let id = grm.token_idx("id").unwrap();
        let plus = grm.token_idx("plus").unwrap();

        let mut stack = vec![];
        assert_eq!(
            ll.partial_parse(&grm, id, &mut stack).unwrap_err().kind,
            InternalErrorKind::StackExhausted { lookahead: id }
        );

        let mut stack = vec![Symbol::Terminal(plus)];
        assert_eq!(
            ll.partial_parse(&grm, id, &mut stack).unwrap_err().kind,
            InternalErrorKind::TerminalMismatch {
                expected: id,
                found: plus
            }
        );

        let f = grm.rule_idx("F").unwrap();
        let mut stack = vec![Symbol::Nonterminal(f)];
        assert_eq!(
            ll.partial_parse(&grm, plus, &mut stack).unwrap_err().kind,
            InternalErrorKind::MissingEntry {
                stack_top: f,
                lookahead: plus
            }
        );
    }

    #[test]
    fn test_parse() {
        let (grm, ll) = build(EXPR);
        let prods = ll
            .parse(&grm, &toks(&grm, &["l", "id", "plus", "id", "r"]))
            .unwrap();
        let tags = prods
            .iter()
            .map(|&p| grm.prod_tag(p))
            .collect::<Vec<_>>();
        assert_eq!(
            tags,
            vec![
                "S", "E", "T", "F_id", "T2_empty", "E2_add", "T", "F_id", "T2_empty", "E2_empty"
            ]
        );

        let err = ll
            .parse(&grm, &toks(&grm, &["l", "id", "id", "r"]))
            .unwrap_err();
        assert_eq!(err.pos, 2);
        assert_eq!(err.token, grm.token_idx("id"));

        let err = ll.parse(&grm, &toks(&grm, &["l", "id"])).unwrap_err();
        assert_eq!(err.pos, 2);
        assert_eq!(err.token, None);
    }

    #[test]
    fn test_dump_csv() {
        let (grm, ll) = build(
            "
            %start S; %left_delim 'l'; %right_delim 'r';
            S -> 'l' E 'r';
            E [E_a] -> 'a';
            E [E_e] -> ;
            ",
        );
        assert_eq!(
            ll.dump_csv(&grm),
            ",l,r,a\nS,\"S -> 'l' E 'r'\",,\nE,,\"E [E_e] ->\",\"E [E_a] -> 'a'\"\n"
        );
    }
}
