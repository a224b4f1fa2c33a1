pub mod search;
pub mod summary;
pub mod tree;
