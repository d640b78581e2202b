//! Limit-enforcing pass-through transformer.
//!
//! [`BoundedTransformer`] wires a [`LimitGuard`] into the streaming world:
//! chunks are pulled from upstream one at a time, admitted or rejected by
//! the guard, and forwarded unmodified as `Ok` items. The first terminal
//! condition (limit breach or external cancellation) is yielded as exactly
//! one `Err` item, after which the stream ends: downstream receives nothing
//! further and upstream is never polled again. Natural end-of-input passes
//! through as plain stream termination.

use crate::chunk::ByteSized;
use crate::error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError};
use crate::input::Input;
use crate::limit::{ChunkProcessor, CountingMode, LimitConfig, LimitError, LimitGuard};
use crate::output::Output;
use crate::transformer::{Transformer, TransformerConfig};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// One step of the drive loop: either the pipeline was cancelled or the
/// upstream produced its next chunk (`None` = end-of-input).
enum Drive<T> {
  Cancelled,
  Next(Option<T>),
}

/// A transformer that enforces a hard upper bound on the total volume of
/// data passing through it.
///
/// Counting semantics are fixed at construction: [`BoundedTransformer::bytes`]
/// measures each chunk's byte length, [`BoundedTransformer::objects`] counts
/// each chunk as one unit. A chunk that brings the running total exactly to
/// the limit is forwarded; the first chunk that would push past it is
/// rejected in the same call and the pipeline is terminated with
/// [`LimitError::Exceeded`].
///
/// External cancellation is supported through a [`CancellationToken`]; a
/// cancelled pipeline terminates with [`LimitError::Cancelled`], never with
/// a spurious limit breach.
#[derive(Clone)]
pub struct BoundedTransformer<T: std::fmt::Debug + Clone + Send + Sync + 'static> {
  guard: LimitGuard<T>,
  cancellation: CancellationToken,
  config: TransformerConfig<T>,
}

impl<T: std::fmt::Debug + Clone + Send + Sync + ByteSized + 'static> BoundedTransformer<T> {
  /// Byte-counting stage: each chunk contributes its byte length.
  pub fn bytes(limit: u64) -> Self {
    Self::with_guard(LimitGuard::bytes(limit))
  }

  /// Stage for an already-validated [`LimitConfig`], dispatching on its
  /// counting mode.
  pub fn from_config(config: LimitConfig) -> Self {
    Self::with_guard(LimitGuard::from_config(config))
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> BoundedTransformer<T> {
  /// Item-counting stage: each chunk contributes one unit regardless of its
  /// payload size. Available for any payload type.
  pub fn objects(limit: u64) -> Self {
    Self::with_guard(LimitGuard::objects(limit))
  }

  fn with_guard(guard: LimitGuard<T>) -> Self {
    Self {
      guard,
      cancellation: CancellationToken::new(),
      config: TransformerConfig::<T>::default(),
    }
  }

  /// Attaches an external cancellation token. Cancelling it terminates the
  /// stage with [`LimitError::Cancelled`].
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancellation = token;
    self
  }

  /// Sets the error handling strategy carried in this transformer's
  /// configuration. Note that terminal limit errors always stop the
  /// pipeline regardless of strategy; see [`Transformer::handle_error`].
  pub fn with_error_strategy(mut self, strategy: ErrorStrategy<T>) -> Self {
    self.config.error_strategy = strategy;
    self
  }

  /// Sets the name for this transformer.
  pub fn with_name(mut self, name: String) -> Self {
    self.config.name = Some(name);
    self
  }

  /// The configured hard upper bound.
  pub fn limit(&self) -> u64 {
    self.guard.config().limit()
  }

  /// The configured counting mode.
  pub fn counting_mode(&self) -> CountingMode {
    self.guard.config().counting_mode()
  }
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Input for BoundedTransformer<T> {
  type Input = T;
  type InputStream = Pin<Box<dyn Stream<Item = T> + Send>>;
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Output for BoundedTransformer<T> {
  type Output = Result<T, LimitError>;
  type OutputStream = Pin<Box<dyn Stream<Item = Result<T, LimitError>> + Send>>;
}

impl<T: std::fmt::Debug + Clone + Send + Sync + 'static> Transformer for BoundedTransformer<T> {
  fn transform(&mut self, input: Self::InputStream) -> Self::OutputStream {
    // Each attachment gets its own accounting state; the instance keeps the
    // validated config as a prototype.
    let mut guard = self.guard.clone();
    let token = self.cancellation.clone();
    let name = self.component_info().name;

    Box::pin(stream! {
      let mut input = input;
      loop {
        let step = tokio::select! {
          biased;
          _ = token.cancelled() => Drive::Cancelled,
          chunk = input.next() => Drive::Next(chunk),
        };

        match step {
          Drive::Cancelled => {
            guard.cancel();
            tracing::debug!(
              component = %name,
              consumed = guard.total_consumed(),
              "pipeline cancelled, terminating bounded stage"
            );
            yield Err(LimitError::Cancelled);
            break;
          }
          Drive::Next(None) => {
            guard.complete();
            break;
          }
          Drive::Next(Some(chunk)) => match guard.process_chunk(chunk) {
            Ok(chunk) => yield Ok(chunk),
            Err(err) => {
              tracing::warn!(
                component = %name,
                limit = guard.config().limit(),
                consumed = guard.total_consumed(),
                error = %err,
                "terminating pipeline"
              );
              yield Err(err);
              break;
            }
          },
        }
      }
    })
  }

  fn set_config_impl(&mut self, config: TransformerConfig<T>) {
    self.config = config;
  }

  fn get_config_impl(&self) -> &TransformerConfig<T> {
    &self.config
  }

  fn get_config_mut_impl(&mut self) -> &mut TransformerConfig<T> {
    &mut self.config
  }

  fn handle_error(&self, _error: &StreamError<T>) -> ErrorAction {
    // A limit breach is fatal to the pipeline instance and never recovered
    // in place, whatever strategy the config carries. Same for
    // cancellation.
    ErrorAction::Stop
  }

  fn create_error_context(&self, item: Option<T>) -> ErrorContext<T> {
    ErrorContext {
      timestamp: chrono::Utc::now(),
      item,
      component_name: self.component_info().name,
      component_type: std::any::type_name::<Self>().to_string(),
    }
  }

  fn component_info(&self) -> ComponentInfo {
    ComponentInfo {
      name: self
        .config
        .name
        .clone()
        .unwrap_or_else(|| "bounded_transformer".to_string()),
      type_name: std::any::type_name::<Self>().to_string(),
    }
  }
}
