use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::{ToTokens, quote};

use crate::{EncodedTable, ParseTables};

/// Names which can't be used as identifiers even in their raw form.
const UNRAWABLE: [&str; 5] = ["self", "Self", "super", "crate", "_"];

impl ParseTables {
    /// Render these tables as the source of a self-contained Rust module.
    ///
    /// Production tags become the variants of a `Production` enum. A tag which is a Rust keyword
    /// is emitted as a raw identifier; tags which can't be emitted at all cause an error.
    pub fn to_rust(&self) -> Result<String, syn::Error> {
        let variants = self
            .production_tags
            .iter()
            .map(|t| variant_ident(t))
            .collect::<Result<Vec<_>, _>>()?;

        let num_tokens = self.num_tokens();
        let num_prods = self.num_productions();
        let token_names = &self.token_names;
        let prod_names = &self.production_tags;
        let arities = self.production_arities.iter().map(|&a| Literal::usize_unsuffixed(a));
        let prod_repr = uint_ident(self.partial_parse.element_bits);
        let discriminants = variants
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let i = Literal::usize_unsuffixed(i);
                quote!(#v = #i)
            })
            .collect::<Vec<_>>();

        let bracket = uint_ident(self.stack_change.element_bits);
        let sc_offset = int_ident(self.stack_change.offset_bits);
        let sc_size = Literal::usize_unsuffixed(self.stack_change.elements.len());
        let sc_elements = self
            .stack_change
            .elements
            .iter()
            .map(|&e| Literal::u64_unsuffixed(e));
        let sc_initial = offset_pair(self.stack_change.initial);
        let sc_refs = ref_rows(&self.stack_change);

        let pp_offset = int_ident(self.partial_parse.offset_bits);
        let pp_size = Literal::usize_unsuffixed(self.partial_parse.elements.len());
        let pp_elements = self
            .partial_parse
            .elements
            .iter()
            .map(|&e| &variants[e as usize]);
        let pp_initial = offset_pair(self.partial_parse.initial);
        let pp_refs = ref_rows(&self.partial_parse);

        let num_tokens = Literal::usize_unsuffixed(num_tokens);
        let num_prods = Literal::usize_unsuffixed(num_prods);
        let out = quote! {
            pub const NUM_TOKENS: usize = #num_tokens;
            pub const TOKEN_NAMES: [&str; NUM_TOKENS] = [#(#token_names),*];
            pub const NUM_PRODUCTIONS: usize = #num_prods;
            pub const PRODUCTION_NAMES: [&str; NUM_PRODUCTIONS] = [#(#prod_names),*];
            pub const PRODUCTION_ARITIES: [usize; NUM_PRODUCTIONS] = [#(#arities),*];

            #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
            #[repr(#prod_repr)]
            #[allow(non_camel_case_types)]
            pub enum Production {
                #(#discriminants),*
            }

            pub type Bracket = #bracket;
            pub type StackChangeOffset = #sc_offset;
            pub const STACK_CHANGE_TABLE_SIZE: usize = #sc_size;
            pub const STACK_CHANGE_TABLE: [Bracket; STACK_CHANGE_TABLE_SIZE] = [#(#sc_elements),*];
            pub const STACK_CHANGE_INITIAL: (StackChangeOffset, StackChangeOffset) = #sc_initial;
            pub const STACK_CHANGE_REFS: [[(StackChangeOffset, StackChangeOffset); NUM_TOKENS]; NUM_TOKENS] = [#(#sc_refs),*];

            pub type ParseOffset = #pp_offset;
            pub const PARSE_TABLE_SIZE: usize = #pp_size;
            pub const PARSE_TABLE: [Production; PARSE_TABLE_SIZE] = [#(Production::#pp_elements),*];
            pub const PARSE_INITIAL: (ParseOffset, ParseOffset) = #pp_initial;
            pub const PARSE_REFS: [[(ParseOffset, ParseOffset); NUM_TOKENS]; NUM_TOKENS] = [#(#pp_refs),*];
        };
        Ok(prettyplease::unparse(&syn::parse2::<syn::File>(out)?))
    }
}

fn variant_ident(tag: &str) -> Result<Ident, syn::Error> {
    if UNRAWABLE.contains(&tag) {
        return Err(syn::Error::new(
            Span::call_site(),
            format!("Production tag '{}' can't be used as a Rust identifier", tag),
        ));
    }
    match syn::parse_str::<Ident>(tag) {
        Ok(i) => Ok(i),
        Err(_) => Ok(Ident::new_raw(tag, Span::call_site())),
    }
}

fn uint_ident(bits: u32) -> Ident {
    Ident::new(&format!("u{}", bits), Span::call_site())
}

fn int_ident(bits: u32) -> Ident {
    Ident::new(&format!("i{}", bits), Span::call_site())
}

fn int_lit(v: i64) -> TokenStream {
    let lit = Literal::u64_unsuffixed(v.unsigned_abs());
    if v < 0 { quote!(-#lit) } else { lit.into_token_stream() }
}

fn offset_pair((off, len): (i64, i64)) -> TokenStream {
    let off = int_lit(off);
    let len = int_lit(len);
    quote!((#off, #len))
}

fn ref_rows(t: &EncodedTable) -> Vec<TokenStream> {
    if t.num_tokens == 0 {
        return Vec::new();
    }
    t.refs
        .chunks(t.num_tokens)
        .map(|row| {
            let row = row.iter().map(|&r| offset_pair(r));
            quote!([#(#row),*])
        })
        .collect()
}
