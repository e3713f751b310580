//! Reading archive pages: table extraction, entry extraction, range linking
//! and the normalisation of free-text metadata.

pub mod entries;
pub mod linker;
pub mod normalize;
pub mod page;
