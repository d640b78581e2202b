//! Producer over an in-memory vector.

use crate::output::Output;
use crate::producer::{Producer, ProducerConfig};
use futures::Stream;
use std::pin::Pin;

/// A producer that emits the items of a vector in order.
#[derive(Clone)]
pub struct VecProducer<T: std::fmt::Debug + Clone + Send + Sync + 'static> {
  items: Vec<T>,
  config: ProducerConfig<T>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> VecProducer<T> {
  /// Creates a producer over the given items.
  pub fn new(items: Vec<T>) -> Self {
    Self {
      items,
      config: ProducerConfig::default(),
    }
  }

  /// Sets the name for this producer.
  pub fn with_name(mut self, name: String) -> Self {
    self.config.name = Some(name);
    self
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Output for VecProducer<T> {
  type Output = T;
  type OutputStream = Pin<Box<dyn Stream<Item = T> + Send>>;
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Producer for VecProducer<T> {
  fn produce(&mut self) -> Self::OutputStream {
    Box::pin(futures::stream::iter(self.items.clone()))
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
