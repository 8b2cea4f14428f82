pub mod btree;
pub mod iterator;
pub mod key;
pub mod node;

pub use btree::BPlusTree;
pub use iterator::BPlusTreeIter;
pub use key::{
    BytewiseComparator, GenericComparator, GenericKey, GenericKey16, GenericKey32, GenericKey4,
    GenericKey64, GenericKey8, KeyComparator,
};
pub use node::{InternalMut, InternalRef, LeafMut, LeafRef, NodeKind, NodeRef};

/// Generic-key index families over the standard integer comparator.
pub type BPlusTree4 = BPlusTree<4, GenericComparator<4>>;
pub type BPlusTree8 = BPlusTree<8, GenericComparator<8>>;
pub type BPlusTree16 = BPlusTree<16, GenericComparator<16>>;
pub type BPlusTree32 = BPlusTree<32, GenericComparator<32>>;
pub type BPlusTree64 = BPlusTree<64, GenericComparator<64>>;
