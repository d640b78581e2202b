//! Transformer trait for components that reshape streams mid-pipeline.

use crate::error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError};
use crate::input::Input;
use crate::output::Output;

/// Configuration for a transformer component: error handling strategy and
/// an optional name for logs and error reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerConfig<T: std::fmt::Debug + Clone + Send + Sync> {
  /// The error handling strategy to use during transformation.
  pub error_strategy: ErrorStrategy<T>,
  /// Optional name identifying this transformer.
  pub name: Option<String>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync> Default for TransformerConfig<T> {
  fn default() -> Self {
    Self {
      error_strategy: ErrorStrategy::Stop,
      name: None,
    }
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync> TransformerConfig<T> {
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

/// Trait for components that transform an input stream into an output
/// stream.
///
/// `transform` is called once per pipeline attachment; the returned stream
/// is driven by the flow-control driver, which delivers chunks strictly in
/// order with at most one in flight.
pub trait Transformer: Input + Output
where
  Self::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  /// Transforms the input stream into this component's output stream.
  fn transform(&mut self, input: Self::InputStream) -> Self::OutputStream;

  /// Stores the configuration. Implemented by each transformer.
  fn set_config_impl(&mut self, config: TransformerConfig<Self::Input>);

  /// Returns the stored configuration. Implemented by each transformer.
  fn get_config_impl(&self) -> &TransformerConfig<Self::Input>;

  /// Returns the stored configuration mutably. Implemented by each
  /// transformer.
  fn get_config_mut_impl(&mut self) -> &mut TransformerConfig<Self::Input>;

  /// Returns a clone of this transformer with the given configuration.
  #[must_use]
  fn with_config(&self, config: TransformerConfig<Self::Input>) -> Self
  where
    Self: Sized + Clone,
  {
    let mut this = self.clone();
    this.set_config_impl(config);
    this
  }

  /// Returns this transformer's configuration.
  fn config(&self) -> &TransformerConfig<Self::Input> {
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
        .clone()
        .unwrap_or_else(|| "transformer".to_string()),
      type_name: std::any::type_name::<Self>().to_string(),
    }
  }
}
