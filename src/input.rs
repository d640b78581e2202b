//! Input trait for components that consume streams.
//!
//! Implemented by transformers and consumers that receive data from an
//! upstream component. The stream type is a pinned, boxed `Send` stream so
//! stages with different concrete adapters compose behind one type.

use futures::Stream;

/// Trait for components that accept an input stream.
pub trait Input
where
  Self::Input: Send + 'static,
{
  /// The type of items this component receives.
  type Input;
  /// The input stream yielding items of type `Self::Input`.
  type InputStream: Stream<Item = Self::Input> + Send + 'static;
}
