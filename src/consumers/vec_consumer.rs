//! Consumer collecting items into a vector.

use crate::consumer::{Consumer, ConsumerConfig};
use crate::input::Input;
use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// A consumer that collects every delivered item, preserving order.
#[derive(Clone)]
pub struct VecConsumer<T: std::fmt::Debug + Clone + Send + Sync + 'static> {
  items: Vec<T>,
  config: ConsumerConfig<T>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> VecConsumer<T> {
  /// Creates an empty collecting consumer.
  pub fn new() -> Self {
    Self {
      items: Vec::new(),
      config: ConsumerConfig::default(),
    }
  }

  /// Sets the name for this consumer.
  pub fn with_name(mut self, name: String) -> Self {
    self.config.name = Some(name);
    self
  }

  /// Items delivered so far, in delivery order.
  pub fn items(&self) -> &[T] {
    &self.items
  }

  /// Consumes self, returning the collected items.
  pub fn into_items(self) -> Vec<T> {
    self.items
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Default for VecConsumer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Input for VecConsumer<T> {
  type Input = T;
  type InputStream = Pin<Box<dyn Stream<Item = T> + Send>>;
}

#[async_trait]
impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Consumer for VecConsumer<T> {
  async fn consume(&mut self, input: Self::InputStream) {
    let mut items = Vec::new();
    input
      .for_each(|item| {
        items.push(item);
        futures::future::ready(())
      })
      .await;
    self.items.extend(items);
  }

  fn set_config_impl(&mut self, config: ConsumerConfig<T>) {
    self.config = config;
  }

  fn get_config_impl(&self) -> ConsumerConfig<T> {
    self.config.clone()
  }
}
