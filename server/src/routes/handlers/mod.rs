#[cfg(debug_assertions)]
pub mod dev_only;
pub mod knowledge;
pub mod search;
