// Generates index newtypes which expose a `usize` API, while internally storing a (possibly
// smaller) `StorageT`.

use std::mem::size_of;

use num_traits::{self, PrimInt, Unsigned};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                // A `StorageT` value always fits into a `usize` (checked above), so the cast
                // cannot fail.
                num_traits::cast(st.0).unwrap_or(usize::MAX)
            }
        }
    }
}

IdxNewtype!(
    /// A type specifically for nonterminal (rule) indices.
    ///
    /// `RIdx` can be converted, without loss of precision, to `usize` with `usize::from(ridx)`.
    RIdx);
IdxNewtype!(
    /// A type specifically for production indices. Production indices follow the order in which
    /// productions appear in the grammar source and are also the ids emitted for production tags.
    PIdx);
IdxNewtype!(
    /// A type specifically for terminal (token) indices. These are the dense token ids used to
    /// address the generated `num_tokens × num_tokens` tables.
    TIdx);
