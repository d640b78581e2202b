//! Producer fed through a bounded channel.
//!
//! The channel capacity is the backpressure window: `send` on the returned
//! handle suspends while the pipeline is not ready for more data, which is
//! the flow-control contract a bounded stage assumes of its upstream.

use crate::output::Output;
use crate::producer::{Producer, ProducerConfig};
use futures::Stream;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A producer whose items arrive over a bounded `mpsc` channel.
///
/// Dropping the sender handle signals natural end-of-input downstream.
pub struct ChannelProducer<T: std::fmt::Debug + Clone + Send + Sync + 'static> {
  receiver: Option<mpsc::Receiver<T>>,
  config: ProducerConfig<T>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> ChannelProducer<T> {
  /// Creates a producer with the given channel capacity and returns the
  /// sender handle alongside it.
  pub fn new(capacity: usize) -> (mpsc::Sender<T>, Self) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
      sender,
      Self {
        receiver: Some(receiver),
        config: ProducerConfig::default(),
      },
    )
  }

  /// Sets the name for this producer.
  pub fn with_name(mut self, name: String) -> Self {
    self.config.name = Some(name);
    self
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Output for ChannelProducer<T> {
  type Output = T;
  type OutputStream = Pin<Box<dyn Stream<Item = T> + Send>>;
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Producer for ChannelProducer<T> {
  fn produce(&mut self) -> Self::OutputStream {
    // The receiver can feed only one attachment; a second produce() call
    // yields an immediately-ending stream.
    match self.receiver.take() {
      Some(receiver) => Box::pin(ReceiverStream::new(receiver)),
      None => Box::pin(futures::stream::empty()),
    }
  }

  fn set_config_impl(&mut self, config: ProducerConfig<T>) {
    self.config = config;
  }

  fn get_config_impl(&self) -> &ProducerConfig<T> {
    &self.config
  }

  fn get_config_mut_impl(&mut self) -> &mut ProducerConfig<T> {
    &mut self.config
  }
}
