//! Built-in producers.

/// Producer fed through a bounded channel.
pub mod channel_producer;
/// Producer over an in-memory vector.
pub mod vec_producer;

pub use channel_producer::ChannelProducer;
pub use vec_producer::VecProducer;
