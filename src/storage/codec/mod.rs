mod btree_page;
mod common;
mod scalar;
mod sort_page;
mod table_page;
mod tuple;

pub use btree_page::*;
pub use common::CommonCodec;
pub use scalar::ScalarValueCodec;
pub use sort_page::SortPageCodec;
pub use table_page::*;
pub use tuple::{RidCodec, TupleCodec};

/// Decoded value plus the number of bytes consumed.
pub type DecodedData<T> = (T, usize);
