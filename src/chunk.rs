//! Byte-length measurement for payloads counted in byte mode.
//!
//! A bounded stage in [`crate::limit::CountingMode::Byte`] mode needs to ask
//! each chunk how many bytes it contributes toward the limit. `ByteSized`
//! is that question: implemented for the usual text and binary payload
//! types, including the `bytes` crate buffers used by network pipelines.
//! Object-mode stages need no measurement (every item counts as one unit)
//! and therefore carry no `ByteSized` bound.

use bytes::{Bytes, BytesMut};

/// Types whose transfer size can be measured in bytes.
///
/// For text payloads the measured quantity is the UTF-8 byte length, the
/// element length of the underlying byte sequence.
pub trait ByteSized {
  /// Number of bytes this payload contributes toward a byte-counted limit.
  fn byte_len(&self) -> usize;
}

impl ByteSized for str {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl ByteSized for String {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl ByteSized for [u8] {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl ByteSized for Vec<u8> {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl ByteSized for Bytes {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl ByteSized for BytesMut {
  fn byte_len(&self) -> usize {
    self.len()
  }
}

impl<T: ByteSized + ?Sized> ByteSized for &T {
  fn byte_len(&self) -> usize {
    (**self).byte_len()
  }
}
