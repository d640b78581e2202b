//! Component-level error machinery.
//!
//! Every stage (producer, transformer, consumer) carries an
//! [`ErrorStrategy`] in its configuration and exposes a `handle_error`
//! method mapping a [`StreamError`] to an [`ErrorAction`]. The bounded
//! stage overrides that mapping: a limit breach is fatal to the pipeline
//! instance whatever strategy is configured (see
//! [`crate::transformers::BoundedTransformer`]). The domain errors
//! themselves live in [`crate::limit`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Action to take when an error occurs in a pipeline component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
  /// Stop processing immediately.
  Stop,
  /// Skip the item that caused the error and continue.
  Skip,
  /// Retry the operation that caused the error.
  Retry,
}

type CustomErrorHandler<T> = Arc<dyn Fn(&StreamError<T>) -> ErrorAction + Send + Sync>;

/// Strategy for handling errors in a pipeline component.
///
/// Set per component through its config builder; `Stop` is the default.
pub enum ErrorStrategy<T> {
  /// Stop processing immediately when an error occurs.
  Stop,
  /// Skip items that cause errors and continue processing.
  Skip,
  /// Retry failed operations up to the given number of times.
  Retry(usize),
  /// Custom error handling logic.
  Custom(CustomErrorHandler<T>),
}

impl<T: fmt::Debug + Clone + Send + Sync> ErrorStrategy<T> {
  /// Creates a custom strategy from a handler function.
  pub fn new_custom<F>(f: F) -> Self
  where
    F: Fn(&StreamError<T>) -> ErrorAction + Send + Sync + 'static,
  {
    Self::Custom(Arc::new(f))
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> Clone for ErrorStrategy<T> {
  fn clone(&self) -> Self {
    match self {
      ErrorStrategy::Stop => ErrorStrategy::Stop,
      ErrorStrategy::Skip => ErrorStrategy::Skip,
      ErrorStrategy::Retry(n) => ErrorStrategy::Retry(*n),
      ErrorStrategy::Custom(handler) => ErrorStrategy::Custom(handler.clone()),
    }
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> fmt::Debug for ErrorStrategy<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorStrategy::Stop => write!(f, "ErrorStrategy::Stop"),
      ErrorStrategy::Skip => write!(f, "ErrorStrategy::Skip"),
      ErrorStrategy::Retry(n) => write!(f, "ErrorStrategy::Retry({})", n),
      ErrorStrategy::Custom(_) => write!(f, "ErrorStrategy::Custom"),
    }
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> PartialEq for ErrorStrategy<T> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (ErrorStrategy::Stop, ErrorStrategy::Stop) => true,
      (ErrorStrategy::Skip, ErrorStrategy::Skip) => true,
      (ErrorStrategy::Retry(a), ErrorStrategy::Retry(b)) => a == b,
      (ErrorStrategy::Custom(_), ErrorStrategy::Custom(_)) => true,
      _ => false,
    }
  }
}

/// Error that occurred during stream processing, with context about where
/// and when it happened.
#[derive(Debug)]
pub struct StreamError<T> {
  /// The original error.
  pub source: Box<dyn Error + Send + Sync>,
  /// When and where the error occurred.
  pub context: ErrorContext<T>,
  /// The component that encountered the error.
  pub component: ComponentInfo,
  /// Number of times this error has been retried.
  pub retries: usize,
}

impl<T: fmt::Debug + Clone + Send + Sync> StreamError<T> {
  /// Creates a new `StreamError` with `retries` set to 0.
  pub fn new(
    source: Box<dyn Error + Send + Sync>,
    context: ErrorContext<T>,
    component: ComponentInfo,
  ) -> Self {
    Self {
      source,
      context,
      component,
      retries: 0,
    }
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> Clone for StreamError<T> {
  fn clone(&self) -> Self {
    Self {
      source: Box::new(StringError(self.source.to_string())),
      context: self.context.clone(),
      component: self.component.clone(),
      retries: self.retries,
    }
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> fmt::Display for StreamError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Error in {} ({}): {}",
      self.component.name, self.component.type_name, self.source
    )
  }
}

impl<T: fmt::Debug + Clone + Send + Sync> Error for StreamError<T> {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(self.source.as_ref())
  }
}

/// A simple error type wrapping a string message. Used when cloning a
/// `StreamError` whose source is not itself cloneable.
#[derive(Debug)]
pub struct StringError(pub String);

impl fmt::Display for StringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Error for StringError {}

/// Context about the circumstances of an error: timestamp, the in-flight
/// item if one was available, and the component identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext<T> {
  /// When the error occurred.
  pub timestamp: chrono::DateTime<chrono::Utc>,
  /// The item being processed when the error occurred, if available.
  pub item: Option<T>,
  /// Name of the component that encountered the error.
  pub component_name: String,
  /// Type of the component that encountered the error.
  pub component_type: String,
}

impl<T: fmt::Debug + Clone + Send + Sync> Default for ErrorContext<T> {
  fn default() -> Self {
    Self {
      timestamp: chrono::Utc::now(),
      item: None,
      component_name: "default".to_string(),
      component_type: "default".to_string(),
    }
  }
}

/// Identifying information about a pipeline component, used in logs and
/// error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
  /// The configured (or defaulted) component name.
  pub name: String,
  /// The Rust type name of the component.
  pub type_name: String,
}

impl ComponentInfo {
  /// Creates a new `ComponentInfo`.
  pub fn new(name: String, type_name: String) -> Self {
    Self { name, type_name }
  }
}

impl Default for ComponentInfo {
  fn default() -> Self {
    Self {
      name: "default".to_string(),
      type_name: "default".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_strategy_equality() {
    assert_eq!(ErrorStrategy::<i32>::Stop, ErrorStrategy::<i32>::Stop);
    assert_eq!(ErrorStrategy::<i32>::Retry(3), ErrorStrategy::<i32>::Retry(3));
    assert_ne!(ErrorStrategy::<i32>::Retry(3), ErrorStrategy::<i32>::Retry(4));
    assert_ne!(ErrorStrategy::<i32>::Stop, ErrorStrategy::<i32>::Skip);
  }

  #[test]
  fn test_custom_strategy_handler() {
    let strategy = ErrorStrategy::<i32>::new_custom(|error| {
      if error.retries < 2 {
        ErrorAction::Retry
      } else {
        ErrorAction::Stop
      }
    });

    let mut error = StreamError::new(
      Box::new(StringError("boom".to_string())),
      ErrorContext::default(),
      ComponentInfo::default(),
    );

    match &strategy {
      ErrorStrategy::Custom(handler) => {
        assert_eq!(handler(&error), ErrorAction::Retry);
        error.retries = 2;
        assert_eq!(handler(&error), ErrorAction::Stop);
      }
      _ => unreachable!(),
    }
  }

  #[test]
  fn test_stream_error_display() {
    let error: StreamError<i32> = StreamError::new(
      Box::new(StringError("transfer limit exceeded".to_string())),
      ErrorContext::default(),
      ComponentInfo::new("bounded".to_string(), "BoundedTransformer".to_string()),
    );
    let rendered = error.to_string();
    assert!(rendered.contains("bounded"));
    assert!(rendered.contains("transfer limit exceeded"));
  }

  #[test]
  fn test_stream_error_clone_preserves_message() {
    let error: StreamError<i32> = StreamError::new(
      Box::new(StringError("original".to_string())),
      ErrorContext::default(),
      ComponentInfo::default(),
    );
    let cloned = error.clone();
    assert_eq!(cloned.source.to_string(), "original");
    assert_eq!(cloned.retries, 0);
  }
}
