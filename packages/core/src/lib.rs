//! `kvdex` Core: key naming, record field maps, value-object codec, and ranking types.

pub mod codec;
pub mod fields;
pub mod keys;
pub mod types;

pub use codec::{decode, encode, CodecError};
pub use fields::Fields;
pub use types::{RankOrder, ScoredEntry};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
