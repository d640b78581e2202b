//! Producer trait for components that originate streams.

use crate::error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError};
use crate::output::Output;

/// Configuration for a producer component: error handling strategy and an
/// optional name for logs and error reports.
#[derive(Debug, Clone)]
pub struct ProducerConfig<T: std::fmt::Debug + Clone + Send + Sync> {
  /// The error handling strategy to use when producing items.
  pub error_strategy: ErrorStrategy<T>,
  /// Optional name identifying this producer.
  pub name: Option<String>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync> Default for ProducerConfig<T> {
  fn default() -> Self {
    Self {
      error_strategy: ErrorStrategy::Stop,
      name: None,
    }
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync> ProducerConfig<T> {
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

/// Trait for components that originate a data stream.
///
/// A producer is the start of a pipeline; the pipeline driver calls
/// [`Producer::produce`] once per attachment.
pub trait Producer: Output
where
  Self::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  /// Produces the output stream for this attachment.
  fn produce(&mut self) -> Self::OutputStream;

  /// Stores the configuration. Implemented by each producer.
  fn set_config_impl(&mut self, config: ProducerConfig<Self::Output>);

  /// Returns the stored configuration. Implemented by each producer.
  fn get_config_impl(&self) -> &ProducerConfig<Self::Output>;

  /// Returns the stored configuration mutably. Implemented by each producer.
  fn get_config_mut_impl(&mut self) -> &mut ProducerConfig<Self::Output>;

  /// Returns this producer's configuration.
  fn config(&self) -> &ProducerConfig<Self::Output> {
    self.get_config_impl()
  }

  /// Maps an error to the action dictated by the configured strategy.
  fn handle_error(&self, error: &StreamError<Self::Output>) -> ErrorAction {
    match self.config().error_strategy {
      ErrorStrategy::Stop => ErrorAction::Stop,
      ErrorStrategy::Skip => ErrorAction::Skip,
      ErrorStrategy::Retry(n) if error.retries < n => ErrorAction::Retry,
      ErrorStrategy::Custom(ref handler) => handler(error),
      _ => ErrorAction::Stop,
    }
  }

  /// Builds an error context for the given in-flight item.
  fn create_error_context(&self, item: Option<Self::Output>) -> ErrorContext<Self::Output> {
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
        .clone()
        .unwrap_or_else(|| "producer".to_string()),
      type_name: std::any::type_name::<Self>().to_string(),
    }
  }
}
