//! Output trait for components that produce streams.
//!
//! Implemented by producers and transformers that emit data for a
//! downstream component. Paired with [`crate::input::Input`], it lets the
//! pipeline builder check at compile time that adjacent stages agree on the
//! item type flowing between them.

use futures::Stream;

/// Trait for components that emit an output stream.
pub trait Output
where
  Self::Output: Send + 'static,
{
  /// The type of items this component emits.
  type Output;
  /// The output stream yielding items of type `Self::Output`.
  type OutputStream: Stream<Item = Self::Output> + Send + 'static;
}
