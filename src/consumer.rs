//! Consumer trait for components that terminate pipelines.

use crate::error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError};
use crate::input::Input;
use async_trait::async_trait;

/// Configuration for a consumer component: error handling strategy and an
/// optional name for logs and error reports.
#[derive(Debug, Clone)]
pub struct ConsumerConfig<T: std::fmt::Debug + Clone + Send + Sync> {
  /// The error handling strategy to use during consumption.
  pub error_strategy: ErrorStrategy<T>,
  /// Optional name identifying this consumer.
  pub name: Option<String>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync> Default for ConsumerConfig<T> {
  fn default() -> Self {
    Self {
      error_strategy: ErrorStrategy::Stop,
      name: None,
    }
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync> ConsumerConfig<T> {
  /// Sets the error handling strategy.
  pub fn with_error_strategy(mut self, strategy: ErrorStrategy<T>) -> Self {
    self.error_strategy = strategy;
    self
  }

  /// Sets the component name.
  pub fn with_name(mut self, name: String) -> Self {
    self.name = Some(name);
    self
  }

  /// Returns the current error handling strategy.
  pub fn error_strategy(&self) -> ErrorStrategy<T> {
    self.error_strategy.clone()
  }

  /// Returns the current name, if set.
  pub fn name(&self) -> Option<String> {
    self.name.clone()
  }
}

/// Trait for components that consume a stream at the end of a pipeline.
#[async_trait]
pub trait Consumer: Input
where
  Self::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  /// Consumes the input stream to completion.
  async fn consume(&mut self, input: Self::InputStream);

  /// Stores the configuration. Implemented by each consumer.
  fn set_config_impl(&mut self, config: ConsumerConfig<Self::Input>);

  /// Returns the stored configuration. Implemented by each consumer.
  fn get_config_impl(&self) -> ConsumerConfig<Self::Input>;

  /// Returns this consumer's configuration.
  fn config(&self) -> ConsumerConfig<Self::Input> {
    self.get_config_impl()
  }

  /// Maps an error to the action dictated by the configured strategy.
  fn handle_error(&self, error: &StreamError<Self::Input>) -> ErrorAction {
    match self.config().error_strategy {
      ErrorStrategy::Stop => ErrorAction::Stop,
      ErrorStrategy::Skip => ErrorAction::Skip,
      ErrorStrategy::Retry(n) if error.retries < n => ErrorAction::Retry,
      ErrorStrategy::Custom(ref handler) => handler(error),
      _ => ErrorAction::Stop,
    }
  }

  /// Builds an error context for the given in-flight item.
  fn create_error_context(&self, item: Option<Self::Input>) -> ErrorContext<Self::Input> {
    ErrorContext {
      timestamp: chrono::Utc::now(),
      item,
      component_name: self.component_info().name,
      component_type: self.component_info().type_name,
    }
  }

  /// Identifying information for logs and error reports.
  fn component_info(&self) -> ComponentInfo {
    ComponentInfo {
      name: self
        .config()
        .name
        .unwrap_or_else(|| "consumer".to_string()),
      type_name: std::any::type_name::<Self>().to_string(),
    }
  }
}
