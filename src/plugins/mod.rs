//! Filter predicates: named capabilities deciding whether a subscriber wants
//! a file, registered once at engine construction.
mod builtin;
mod predicate;
pub use builtin::*;
pub use predicate::*;
