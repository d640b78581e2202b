//! Built-in consumers.

/// Consumer collecting items into a vector.
pub mod vec_consumer;

pub use vec_consumer::VecConsumer;
