use std::collections::HashMap;

use num_traits::{self, AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    PIdx, RIdx, Span, Symbol, TIdx,
    ast::{self, ASTWithValidityInfo},
    parser::{GrammarError, GrammarErrorKind},
    sets::TerminalSets,
};

/// Representation of a validated `Grammar`. See the [top-level documentation](../index.html) for
/// the guarantees this struct makes about rules, tokens, and productions.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grammar<StorageT = u32> {
    /// How many rules does this grammar have?
    rules_len: RIdx<StorageT>,
    /// A mapping from `RIdx` -> rule name.
    rule_names: Vec<String>,
    /// How many tokens does this grammar have?
    tokens_len: TIdx<StorageT>,
    /// A mapping from `TIdx` -> token name, in order of first use.
    token_names: Vec<String>,
    /// How many productions does this grammar have?
    prods_len: PIdx<StorageT>,
    /// A list of all productions.
    prods: Vec<Vec<Symbol<StorageT>>>,
    /// A mapping from `PIdx` -> `(tag, Span)`.
    prod_tags: Vec<(String, Span)>,
    /// A mapping from `PIdx` -> the span of the whole production.
    prod_spans: Vec<Span>,
    /// A mapping from rules to their productions. Note that 1) the order of rules is identical to
    /// that of `rule_names` 2) every rule will have at least 1 production 3) productions
    /// are not necessarily stored sequentially.
    rules_prods: Vec<Vec<PIdx<StorageT>>>,
    /// A mapping from productions to their corresponding rule indexes.
    prods_rules: Vec<RIdx<StorageT>>,
    /// The start rule's sole production.
    start_prod: PIdx<StorageT>,
    left_delim: TIdx<StorageT>,
    right_delim: TIdx<StorageT>,
}

impl Grammar<u32> {
    pub fn new(s: &str) -> Result<Self, Vec<GrammarError>> {
        Grammar::new_with_storaget(s)
    }
}

impl<StorageT: 'static + PrimInt + Unsigned> Grammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Takes as input a grammar source `s` and returns a [Grammar] or every error found while
    /// reading and validating it.
    pub fn new_with_storaget(s: &str) -> Result<Self, Vec<GrammarError>> {
        Self::new_from_ast_with_validity_info(&ASTWithValidityInfo::new(s))
    }

    pub fn new_from_ast_with_validity_info(
        ast_validation: &ASTWithValidityInfo,
    ) -> Result<Self, Vec<GrammarError>> {
        if !ast_validation.is_valid() {
            return Err(ast_validation.errors().to_owned());
        }
        let ast = ast_validation.ast();

        // Check that StorageT is big enough to hold RIdx/PIdx/TIdx values; after these checks we
        // can guarantee that things like RIdx(ast.rules.len().as_()) are safe.
        if ast.rules.len() > num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX) {
            panic!("StorageT is not big enough to store this grammar's rules.");
        }
        if ast.tokens.len() > num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX) {
            panic!("StorageT is not big enough to store this grammar's tokens.");
        }
        if ast.prods.len() > num_traits::cast(StorageT::max_value()).unwrap_or(usize::MAX) {
            panic!("StorageT is not big enough to store this grammar's productions.");
        }

        let (Some((start, start_span)), Some((left_delim, _)), Some((right_delim, _))) =
            (&ast.start, &ast.left_delim, &ast.right_delim)
        else {
            return Err(ast_validation.errors().to_owned());
        };
        let Some(start_pidx) = ast.start_prod() else {
            return Err(vec![GrammarError {
                kind: GrammarErrorKind::MissingStartRule(start.clone()),
                spans: vec![*start_span],
            }]);
        };

        let rule_map = ast
            .rules
            .keys()
            .enumerate()
            .map(|(i, n)| (n.as_str(), RIdx(i.as_())))
            .collect::<HashMap<_, _>>();
        let token_map = ast
            .tokens
            .keys()
            .enumerate()
            .map(|(i, n)| (n.as_str(), TIdx(i.as_())))
            .collect::<HashMap<_, _>>();

        let mut prods = Vec::with_capacity(ast.prods.len());
        let mut prods_rules = Vec::with_capacity(ast.prods.len());
        for prod in &ast.prods {
            prods.push(
                prod.symbols
                    .iter()
                    .map(|sym| match sym {
                        ast::Symbol::Rule(n, _) => Symbol::Nonterminal(rule_map[n.as_str()]),
                        ast::Symbol::Token(n, _) => Symbol::Terminal(token_map[n.as_str()]),
                    })
                    .collect(),
            );
            prods_rules.push(rule_map[prod.lhs.as_str()]);
        }

        Ok(Grammar {
            rules_len: RIdx(ast.rules.len().as_()),
            rule_names: ast.rules.values().map(|r| r.name.0.clone()).collect(),
            tokens_len: TIdx(ast.tokens.len().as_()),
            token_names: ast.tokens.keys().cloned().collect(),
            prods_len: PIdx(ast.prods.len().as_()),
            prods,
            prod_tags: ast.prods.iter().map(|p| p.tag.clone()).collect(),
            prod_spans: ast.prods.iter().map(|p| p.span).collect(),
            rules_prods: ast
                .rules
                .values()
                .map(|r| r.pidxs.iter().map(|&p| PIdx(p.as_())).collect())
                .collect(),
            prods_rules,
            start_prod: PIdx(start_pidx.as_()),
            left_delim: token_map[left_delim.as_str()],
            right_delim: token_map[right_delim.as_str()],
        })
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> PIdx<StorageT> {
        self.prods_len
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx<StorageT>> + use<StorageT> {
        // We can use as_ safely, because we know that we're only generating integers from
        // 0..self.prods_len() and, since prods_len() returns a PIdx<StorageT>, then by
        // definition the integers we're creating fit within StorageT.
        (0..usize::from(self.prods_len())).map(|x| PIdx(x.as_()))
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx<StorageT>) -> &[Symbol<StorageT>] {
        &self.prods[usize::from(pidx)]
    }

    /// How many symbols does production `pidx` have? Panics if `pidx` doesn't exist.
    pub fn prod_arity(&self, pidx: PIdx<StorageT>) -> usize {
        self.prods[usize::from(pidx)].len()
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx<StorageT>) -> RIdx<StorageT> {
        self.prods_rules[usize::from(pidx)]
    }

    /// Return the tag of production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_tag(&self, pidx: PIdx<StorageT>) -> &str {
        self.prod_tags[usize::from(pidx)].0.as_str()
    }

    /// Return the span of the whole of production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_span(&self, pidx: PIdx<StorageT>) -> Span {
        self.prod_spans[usize::from(pidx)]
    }

    /// Return the index of the production tagged `tag` or `None` if it doesn't exist.
    pub fn tag_idx(&self, tag: &str) -> Option<PIdx<StorageT>> {
        self.prod_tags
            .iter()
            .position(|(x, _)| x == tag)
            // The call to as_() is safe because prod_tags is guaranteed to be small enough to fit
            // into StorageT.
            .map(|x| PIdx(x.as_()))
    }

    /// Return the production index of the start rule's sole production.
    pub fn start_prod(&self) -> PIdx<StorageT> {
        self.start_prod
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        self.rules_len
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx<StorageT>> + use<StorageT> {
        (0..usize::from(self.rules_len())).map(|x| RIdx(x.as_()))
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_to_prods(&self, ridx: RIdx<StorageT>) -> &[PIdx<StorageT>] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx<StorageT>) -> &str {
        self.rule_names[usize::from(ridx)].as_str()
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx<StorageT>> {
        self.rule_names
            .iter()
            .position(|x| x == n)
            .map(|x| RIdx(x.as_()))
    }

    /// What is the index of the start rule?
    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.prod_to_rule(self.start_prod)
    }

    /// How many tokens does this grammar have?
    pub fn tokens_len(&self) -> TIdx<StorageT> {
        self.tokens_len
    }

    /// Return an iterator which produces (in order from `0..self.tokens_len()`) all this
    /// grammar's valid `TIdx`s.
    pub fn iter_tidxs(&self) -> impl Iterator<Item = TIdx<StorageT>> + use<StorageT> {
        (0..usize::from(self.tokens_len())).map(|x| TIdx(x.as_()))
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        self.token_names[usize::from(tidx)].as_str()
    }

    /// Return the index of the token named `n` or `None` if it doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|x| x == n)
            .map(|x| TIdx(x.as_()))
    }

    /// The terminal which opens every sentence of the grammar.
    pub fn left_delim(&self) -> TIdx<StorageT> {
        self.left_delim
    }

    /// The terminal which closes every sentence of the grammar.
    pub fn right_delim(&self) -> TIdx<StorageT> {
        self.right_delim
    }

    /// Compute the FIRST, FOLLOW, LAST, and BEFORE sets of this grammar.
    pub fn terminal_sets(&self) -> TerminalSets<StorageT> {
        TerminalSets::new(self)
    }

    /// Pretty print `sym`: terminals are quoted, nonterminals are not.
    pub fn pp_symbol(&self, sym: Symbol<StorageT>) -> String {
        match sym {
            Symbol::Nonterminal(ridx) => self.rule_name_str(ridx).to_owned(),
            Symbol::Terminal(tidx) => format!("'{}'", self.token_name(tidx)),
        }
    }

    /// Pretty print a sequence of symbols separated by spaces.
    pub fn pp_symbols(&self, syms: &[Symbol<StorageT>]) -> String {
        syms.iter()
            .map(|&sym| self.pp_symbol(sym))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Pretty print production `pidx` in the same form it was written. The tag is only shown
    /// if it differs from the rule's name.
    pub fn pp_prod(&self, pidx: PIdx<StorageT>) -> String {
        let rule = self.rule_name_str(self.prod_to_rule(pidx));
        let tag = self.prod_tag(pidx);
        let mut s = rule.to_owned();
        if tag != rule {
            s.push_str(&format!(" [{}]", tag));
        }
        s.push_str(" ->");
        if !self.prod(pidx).is_empty() {
            s.push(' ');
            s.push_str(&self.pp_symbols(self.prod(pidx)));
        }
        s
    }

    /// Pretty print the whole grammar.
    pub fn pp(&self) -> String {
        let mut s = format!(
            "%start {};\n%left_delim '{}';\n%right_delim '{}';\n",
            self.rule_name_str(self.start_rule_idx()),
            self.token_name(self.left_delim),
            self.token_name(self.right_delim)
        );
        for pidx in self.iter_pidxs() {
            s.push_str(&self.pp_prod(pidx));
            s.push_str(";\n");
        }
        s
    }
}
