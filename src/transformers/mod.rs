//! Built-in transformers.

/// Limit-enforcing pass-through stage.
pub mod bounded_transformer;

pub use bounded_transformer::BoundedTransformer;
