//! ARC-4 interchange format support: the binary encoding rules and the
//! method-signature grammar

pub mod encoding;
pub mod signature;

pub use encoding::{Arc4Value, decode, encode, static_size};
pub use signature::{Arc4Signature, method_selector, parse_method_signature, split_tuple_types};
