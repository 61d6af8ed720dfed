use llpgrammar::{Diagnostics, ErrorReport, Grammar, PIdx, RIdx, Symbol, TIdx};
use llptable::{Generated, admissible_pairs, generate};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Beyond this derivation depth, the sentence generator always picks the production which
/// finishes soonest.
const MAX_DEPTH: usize = 12;
const SENTENCES: usize = 200;

const WORKED_EXAMPLE: &str = "%start S; %left_delim '('; %right_delim ')'; S -> '(' E ')'; E -> 'a';";

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

const OPTIONALS: &str = "
    %start S; %left_delim 'l'; %right_delim 'r';
    S -> 'l' A B C 'r';
    A [A_a] -> 'a' A;
    A [A_empty] -> ;
    B [B_b] -> 'b';
    B [B_empty] -> ;
    C [C_c] -> 'c' D;
    C [C_empty] -> ;
    D [D_d] -> 'd';
    D [D_empty] -> ;
";

const STATEMENTS: &str = "
    %start Program; %left_delim 'bof'; %right_delim 'eof';
    Program -> 'bof' Stmts 'eof';
    Stmts [Stmts_more] -> Stmt Stmts;
    Stmts [Stmts_empty] -> ;
    Stmt [Stmt_if] -> 'if' Expr Block;
    Stmt [Stmt_while] -> 'while' Expr Block;
    Stmt [Stmt_assign] -> 'id' 'eq' Expr 'semi';
    Block -> 'lb' Stmts 'rb';
    Expr -> Atom Args;
    Args [Args_call] -> 'lpar' Expr 'rpar';
    Args [Args_none] -> ;
    Atom [Atom_id] -> 'id';
    Atom [Atom_num] -> 'num';
";

const GRAMMARS: [&str; 4] = [WORKED_EXAMPLE, EXPR, OPTIONALS, STATEMENTS];

fn build(src: &str) -> Generated<u32> {
    let mut diags = Diagnostics::new();
    let g = generate::<u32>(src, &mut diags).unwrap();
    assert!(!diags.has_errors());
    g
}

/// For each rule, the smallest depth of any derivation tree rooted at that rule.
fn heights(grm: &Grammar) -> Vec<usize> {
    let mut hs = vec![usize::MAX; usize::from(grm.rules_len())];
    loop {
        let mut changed = false;
        for pidx in grm.iter_pidxs() {
            let h = prod_height(grm, &hs, pidx);
            let ridx = usize::from(grm.prod_to_rule(pidx));
            if h < hs[ridx] {
                hs[ridx] = h;
                changed = true;
            }
        }
        if !changed {
            return hs;
        }
    }
}

fn prod_height(grm: &Grammar, hs: &[usize], pidx: PIdx<u32>) -> usize {
    grm.prod(pidx)
        .iter()
        .map(|sym| match sym {
            Symbol::Terminal(_) => 0,
            Symbol::Nonterminal(ridx) => hs[usize::from(*ridx)],
        })
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Randomly derive a sentence from `ridx`, recording its tokens and, in the order they are
/// applied in a leftmost derivation, its productions.
fn derive(
    grm: &Grammar,
    hs: &[usize],
    rng: &mut StdRng,
    ridx: RIdx<u32>,
    depth: usize,
    toks: &mut Vec<TIdx<u32>>,
    prods: &mut Vec<PIdx<u32>>,
) {
    let pidxs = grm.rule_to_prods(ridx);
    let pidx = if depth > MAX_DEPTH {
        *pidxs
            .iter()
            .min_by_key(|&&p| prod_height(grm, hs, p))
            .unwrap()
    } else {
        pidxs[rng.random_range(0..pidxs.len())]
    };
    prods.push(pidx);
    for &sym in grm.prod(pidx) {
        match sym {
            Symbol::Terminal(tidx) => toks.push(tidx),
            Symbol::Nonterminal(r) => derive(grm, hs, rng, r, depth + 1, toks, prods),
        }
    }
}

fn sentences(grm: &Grammar, seed: u64) -> Vec<(Vec<TIdx<u32>>, Vec<PIdx<u32>>)> {
    let hs = heights(grm);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..SENTENCES)
        .map(|_| {
            let mut toks = Vec::new();
            let mut prods = Vec::new();
            derive(grm, &hs, &mut rng, grm.start_rule_idx(), 0, &mut toks, &mut prods);
            (toks, prods)
        })
        .collect()
}

#[test]
fn worked_example() {
    let g = build(WORKED_EXAMPLE);
    let grm = &g.grammar;
    let t = |n| grm.token_idx(n).unwrap();
    let pairs = g
        .llp_table
        .iter()
        .map(|(p, _)| (grm.token_name(p.x), grm.token_name(p.y)))
        .collect::<Vec<_>>();
    assert_eq!(pairs, vec![("(", "a"), ("a", ")")]);

    let sc = &g.tables.stack_change;
    let pp = &g.tables.partial_parse;
    let mut prods = pp.initial().to_vec();
    prods.extend(pp.lookup(usize::from(t("(")), usize::from(t("a"))).unwrap());
    prods.extend(pp.lookup(usize::from(t("a")), usize::from(t(")"))).unwrap());
    let tags = prods
        .iter()
        .map(|&p| g.tables.production_tags[p as usize].as_str())
        .collect::<Vec<_>>();
    assert_eq!(tags, vec!["S", "E"]);

    let mut brackets = sc.initial().to_vec();
    brackets.extend(sc.lookup(usize::from(t("(")), usize::from(t("a"))).unwrap());
    brackets.extend(sc.lookup(usize::from(t("a")), usize::from(t(")"))).unwrap());
    assert_eq!(brackets, vec![1, 3, 2, 0]);
}

#[test]
fn round_trip() {
    for (i, src) in GRAMMARS.iter().enumerate() {
        let g = build(src);
        let grm = &g.grammar;
        let sc = &g.tables.stack_change;
        let pp = &g.tables.partial_parse;
        for (toks, expected) in sentences(grm, i as u64) {
            assert_eq!(g.ll_table.parse(grm, &toks).unwrap(), expected);

            let mut prods = pp.initial().to_vec();
            let mut brackets = sc.initial().to_vec();
            for w in toks.windows(2) {
                let (x, y) = (usize::from(w[0]), usize::from(w[1]));
                prods.extend(pp.lookup(x, y).unwrap());
                brackets.extend(sc.lookup(x, y).unwrap());
            }
            assert_eq!(
                prods,
                expected
                    .iter()
                    .map(|&p| usize::from(p) as u64)
                    .collect::<Vec<_>>()
            );

            // Every right bracket closes the most recent unclosed left bracket of the same
            // symbol, and nothing is left open at the end.
            let mut open = Vec::new();
            for b in brackets {
                if b % 2 == 1 {
                    open.push(b / 2);
                } else {
                    assert_eq!(open.pop(), Some(b / 2));
                }
            }
            assert!(open.is_empty());
        }
    }
}

#[test]
fn bracket_counts() {
    for src in GRAMMARS {
        let g = build(src);
        let sc = &g.tables.stack_change;
        let start = sc.initial();
        assert!(start.iter().all(|b| b % 2 == 1));
        assert_eq!(start.len(), g.llp_table.start().final_stack.len());
        for (pair, e) in g.llp_table.iter() {
            let bs = sc
                .lookup(usize::from(pair.x), usize::from(pair.y))
                .unwrap();
            let right = bs.iter().filter(|&&b| b % 2 == 0).count();
            assert_eq!(right, e.initial_stack.len());
            assert_eq!(bs.len() - right, e.final_stack.len());
            // All the right brackets come before all the left brackets.
            assert!(bs.iter().skip(right).all(|b| b % 2 == 1));
            assert!(bs.iter().all(|&b| (b as usize) < 2 * g.tables.num_symbols));
        }
    }
}

#[test]
fn tiling() {
    for src in GRAMMARS {
        let g = build(src);
        for table in [&g.tables.stack_change, &g.tables.partial_parse] {
            let mut regions = table
                .refs
                .iter()
                .copied()
                .filter(|&(off, len)| {
                    assert!((off < 0) == (len < 0));
                    off >= 0
                })
                .collect::<Vec<_>>();
            regions.push(table.initial);
            regions.sort();
            let mut next = 0;
            for (off, len) in regions {
                assert_eq!(off, next);
                next += len;
            }
            assert_eq!(next as usize, table.elements.len());
            assert!(table.elements.len() < 1 << (table.offset_bits - 1));
        }
    }
}

#[test]
fn completeness() {
    for (i, src) in GRAMMARS.iter().enumerate() {
        let g = build(src);
        let grm = &g.grammar;
        let expected = admissible_pairs(grm, &g.sets);
        assert_eq!(expected.len(), g.llp_table.len());
        for (pair, _) in g.llp_table.iter() {
            assert!(expected.contains(pair));
        }
        // Every pair of adjacent tokens in a sentence is admissible.
        for (toks, _) in sentences(grm, 100 + i as u64) {
            for w in toks.windows(2) {
                assert!(g.llp_table.get(w[0], w[1]).is_some());
            }
        }
        let n = g.tables.num_tokens();
        let admissible = g
            .tables
            .stack_change
            .refs
            .iter()
            .filter(|&&(off, _)| off >= 0)
            .count();
        assert_eq!(admissible, g.llp_table.len());
        assert_eq!(g.tables.stack_change.refs.len(), n * n);
    }
}

#[test]
fn deterministic() {
    for src in GRAMMARS {
        let g1 = build(src);
        let g2 = build(src);
        assert_eq!(g1.tables, g2.tables);
        assert_eq!(g1.llp_table.dump_csv(&g1.grammar), g2.llp_table.dump_csv(&g2.grammar));
        assert_eq!(g1.tables.to_rust().unwrap(), g2.tables.to_rust().unwrap());
    }
}

#[test]
fn fixed_point_bounds() {
    for src in GRAMMARS {
        let g = build(src);
        let bound = usize::from(g.grammar.rules_len()) * usize::from(g.grammar.tokens_len()) + 2;
        assert!(g.sets.passes() <= bound);
        assert!(g.stacks.passes() <= 2 * bound);
    }
}
