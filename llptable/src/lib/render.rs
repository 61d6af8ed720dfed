//! Turning an [LlpTable] into flat arrays which a parser can index without any further
//! processing.
//!
//! Every entry of the table is rendered twice: once as a *bracket string* describing its stack
//! change, and once as the sequence of productions it applies. All strings of one kind are then
//! concatenated into a single superstring and addressed by `(offset, length)`.

use std::hash::Hash;

use fnv::FnvBuildHasher;
use indexmap::{IndexMap, IndexSet};
use llpgrammar::{Grammar, Symbol};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AdmissiblePair, LlpEntry, LlpTable};

/// The width in bits of the smallest unsigned integer type of at least 8 bits which can hold
/// `v`. For example `int_bit_width(200) == 8` and `int_bit_width(400) == 16`.
pub fn int_bit_width(v: u64) -> u32 {
    let bits = u64::BITS - v.leading_zeros();
    bits.next_power_of_two().max(8)
}

/// The width in bits of the smallest signed integer type of at least 8 bits which can hold `v`.
fn signed_int_bit_width(v: u64) -> u32 {
    let width = (u64::BITS - v.leading_zeros() + 1).next_power_of_two().max(8);
    debug_assert!(width <= 64);
    width
}

/// A dense numbering of the stack symbols which appear in an [LlpTable]'s entries. Symbols are
/// numbered in the order they are first seen. A symbol with id `i` is encoded in bracket strings
/// as `2 * i` when it is popped (a right bracket) and `2 * i + 1` when it is pushed (a left
/// bracket).
#[derive(Debug)]
pub struct SymbolIndex<StorageT> {
    symbols: IndexSet<Symbol<StorageT>, FnvBuildHasher>,
}

impl<StorageT: Hash + Eq + Copy> SymbolIndex<StorageT> {
    pub fn new() -> Self {
        SymbolIndex {
            symbols: IndexSet::with_hasher(FnvBuildHasher::default()),
        }
    }

    /// Number any symbols of `e` not yet seen (those of `e.initial_stack` first), and return the
    /// bracket string of `e`: a right bracket for each popped symbol, from the top of the stack
    /// down, followed by a left bracket for each pushed symbol, from the bottom of the stack up.
    pub fn brackets(&mut self, e: &LlpEntry<StorageT>) -> Vec<u64> {
        let popped = e
            .initial_stack
            .iter()
            .map(|&sym| self.symbols.insert_full(sym).0)
            .collect::<Vec<_>>();
        let pushed = e
            .final_stack
            .iter()
            .map(|&sym| self.symbols.insert_full(sym).0)
            .collect::<Vec<_>>();
        popped
            .into_iter()
            .rev()
            .map(|id| 2 * id as u64)
            .chain(pushed.into_iter().map(|id| 2 * id as u64 + 1))
            .collect()
    }

    /// The id of `sym`, if it has been seen.
    pub fn id(&self, sym: Symbol<StorageT>) -> Option<usize> {
        self.symbols.get_index_of(&sym)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate over the symbols in id order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol<StorageT>> + '_ {
        self.symbols.iter().copied()
    }

    /// How many bits are needed to store any bracket code.
    pub fn bracket_bit_width(&self) -> u32 {
        int_bit_width(2 * self.len() as u64)
    }
}

/// The strings of one kind for every entry of an [LlpTable], laid end to end. The start entry's
/// string comes first, followed by each pair's string in table order, so the recorded regions
/// are disjoint and cover the whole superstring.
#[derive(Debug)]
pub struct StringTable<StorageT> {
    superstring: Vec<u64>,
    initial: (usize, usize),
    strings: IndexMap<AdmissiblePair<StorageT>, (usize, usize), FnvBuildHasher>,
}

impl<StorageT: Hash + Eq + Copy> StringTable<StorageT> {
    /// Create a table whose first string is `start`.
    pub fn new(start: Vec<u64>) -> Self {
        let initial = (0, start.len());
        StringTable {
            superstring: start,
            initial,
            strings: IndexMap::with_hasher(FnvBuildHasher::default()),
        }
    }

    /// Append the string `s` for `pair`.
    pub fn push(&mut self, pair: AdmissiblePair<StorageT>, s: &[u64]) {
        self.strings.insert(pair, (self.superstring.len(), s.len()));
        self.superstring.extend_from_slice(s);
    }

    pub fn superstring(&self) -> &[u64] {
        &self.superstring
    }

    /// The `(offset, length)` of the start entry's string.
    pub fn initial(&self) -> (usize, usize) {
        self.initial
    }

    /// The `(offset, length)` of `pair`'s string, or `None` if `pair` is not admissible.
    pub fn get(&self, pair: AdmissiblePair<StorageT>) -> Option<(usize, usize)> {
        self.strings.get(&pair).copied()
    }

    /// Iterate over each pair's `(offset, length)` in the order they were pushed.
    pub fn iter(&self) -> impl Iterator<Item = (AdmissiblePair<StorageT>, (usize, usize))> + '_ {
        self.strings.iter().map(|(&p, &r)| (p, r))
    }

    /// How many bits a signed offset or length into this table needs. No offset or length
    /// exceeds the superstring's length, and a signed type always has room for `-1`, which marks
    /// pairs which are not admissible.
    pub fn offset_bit_width(&self) -> u32 {
        signed_int_bit_width(self.superstring.len() as u64)
    }
}

impl<StorageT: 'static + Hash + PrimInt + Unsigned> StringTable<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Flatten this table into an [EncodedTable] whose references are a dense
    /// `num_tokens * num_tokens` grid.
    pub fn encode(&self, num_tokens: usize, element_bits: u32) -> EncodedTable {
        let mut refs = vec![(-1, -1); num_tokens * num_tokens];
        for (pair, (off, len)) in self.iter() {
            refs[usize::from(pair.x) * num_tokens + usize::from(pair.y)] = (off as i64, len as i64);
        }
        EncodedTable {
            elements: self.superstring.clone(),
            element_bits,
            offset_bits: self.offset_bit_width(),
            initial: (self.initial.0 as i64, self.initial.1 as i64),
            num_tokens,
            refs,
        }
    }
}

/// A string table in the form in which it is emitted.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EncodedTable {
    /// The superstring.
    pub elements: Vec<u64>,
    /// The width of the unsigned type needed to store an element.
    pub element_bits: u32,
    /// The width of the signed type needed to store an offset or length.
    pub offset_bits: u32,
    /// The `(offset, length)` of the start entry's string.
    pub initial: (i64, i64),
    pub num_tokens: usize,
    /// The `(offset, length)` of the string for the pair `(x, y)` is at index
    /// `x * num_tokens + y`. Pairs which are not admissible are `(-1, -1)`.
    pub refs: Vec<(i64, i64)>,
}

impl EncodedTable {
    /// The string for the pair of token ids `(x, y)`, or `None` if the pair is not admissible.
    pub fn lookup(&self, x: usize, y: usize) -> Option<&[u64]> {
        let (off, len) = *self.refs.get(x * self.num_tokens + y)?;
        if off < 0 {
            return None;
        }
        self.elements.get(off as usize..(off + len) as usize)
    }

    /// The start entry's string.
    pub fn initial(&self) -> &[u64] {
        let (off, len) = self.initial;
        &self.elements[off as usize..(off + len) as usize]
    }
}

/// Everything needed to emit a grammar's tables, with all grammar types reduced to plain
/// numbers and strings. Token ids are the grammar's token indices; production ids are its
/// production indices.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParseTables {
    pub token_names: Vec<String>,
    pub production_tags: Vec<String>,
    pub production_arities: Vec<usize>,
    /// How many distinct stack symbols the bracket strings refer to.
    pub num_symbols: usize,
    /// Bracket strings.
    pub stack_change: EncodedTable,
    /// Production id strings.
    pub partial_parse: EncodedTable,
}

impl ParseTables {
    pub fn new<StorageT: 'static + Hash + PrimInt + Unsigned>(
        grm: &Grammar<StorageT>,
        llp: &LlpTable<StorageT>,
    ) -> Self
    where
        usize: AsPrimitive<StorageT>,
    {
        let mut symbols = SymbolIndex::new();
        let mut stack_change = StringTable::new(symbols.brackets(llp.start()));
        let mut partial_parse = StringTable::new(prod_ids(llp.start()));
        for (&pair, e) in llp.iter() {
            stack_change.push(pair, &symbols.brackets(e));
            partial_parse.push(pair, &prod_ids(e));
        }

        let num_tokens = usize::from(grm.tokens_len());
        let num_prods = usize::from(grm.prods_len());
        ParseTables {
            token_names: grm
                .iter_tidxs()
                .map(|tidx| grm.token_name(tidx).to_owned())
                .collect(),
            production_tags: grm
                .iter_pidxs()
                .map(|pidx| grm.prod_tag(pidx).to_owned())
                .collect(),
            production_arities: grm.iter_pidxs().map(|pidx| grm.prod_arity(pidx)).collect(),
            num_symbols: symbols.len(),
            stack_change: stack_change.encode(num_tokens, symbols.bracket_bit_width()),
            partial_parse: partial_parse.encode(num_tokens, int_bit_width(num_prods as u64)),
        }
    }

    pub fn num_tokens(&self) -> usize {
        self.token_names.len()
    }

    pub fn num_productions(&self) -> usize {
        self.production_tags.len()
    }
}

fn prod_ids<StorageT: 'static + PrimInt + Unsigned>(e: &LlpEntry<StorageT>) -> Vec<u64> {
    e.productions
        .iter()
        .map(|&pidx| usize::from(pidx) as u64)
        .collect()
}
