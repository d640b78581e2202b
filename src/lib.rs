//! # streamgate
//!
//! Bounded streaming pipelines in pure Rust.
//!
//! streamgate is a small flow-based streaming framework whose centerpiece is
//! the [`BoundedTransformer`]: a pipeline stage that forwards chunks
//! unmodified while the cumulative transferred volume stays under a
//! configured limit, and terminates the pipeline with a distinguished error
//! the instant forwarding a chunk would exceed that limit. The stage counts
//! either raw byte length ([`CountingMode::Byte`]) or one unit per discrete
//! item ([`CountingMode::Object`]).
//!
//! ## Key pieces
//!
//! - **[`LimitGuard`]**: the synchronous per-chunk state machine (measure,
//!   compare, count) behind the stage, usable on its own through the
//!   [`ChunkProcessor`] trait
//! - **[`BoundedTransformer`]**: the async stream adapter wiring the guard
//!   into a producer → transformer → consumer pipeline, with external
//!   cancellation support
//! - **[`PipelineBuilder`]**: typestate builder assembling a pipeline and
//!   driving it to its terminal outcome
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use streamgate::{BoundedTransformer, PipelineBuilder, VecConsumer, VecProducer};
//!
//! # async fn example() {
//! let pipeline = PipelineBuilder::new()
//!   .producer(VecProducer::new(vec!["hello".to_string(), "world".to_string()]))
//!   .transformer(BoundedTransformer::bytes(8))
//!   .consumer(VecConsumer::new());
//!
//! // "hello" fits (5 of 8); forwarding "world" would reach 10 > 8.
//! let (outcome, consumer) = pipeline.run().await;
//! assert!(outcome.is_err());
//! assert_eq!(consumer.items(), ["hello".to_string()]);
//! # }
//! ```

/// Byte-length measurement for payloads counted in byte mode.
pub mod chunk;
/// Consumer trait and configuration.
pub mod consumer;
/// Built-in consumers.
pub mod consumers;
/// Component-level error machinery (strategies, stream errors, context).
pub mod error;
/// Input trait for stages that receive a stream.
pub mod input;
/// Core limit accounting: configuration, guard state machine, errors.
pub mod limit;
/// Output trait for stages that emit a stream.
pub mod output;
/// Pipeline builder and flow-control driver.
pub mod pipeline;
/// Producer trait and configuration.
pub mod producer;
/// Built-in producers.
pub mod producers;
/// Transformer trait and configuration.
pub mod transformer;
/// Built-in transformers.
pub mod transformers;

pub use chunk::ByteSized;
pub use consumer::{Consumer, ConsumerConfig};
pub use consumers::VecConsumer;
pub use error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError, StringError};
pub use input::Input;
pub use limit::{
  ChunkProcessor, ConfigError, CountingMode, LimitConfig, LimitError, LimitGuard, TerminalCause,
};
pub use output::Output;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use producer::{Producer, ProducerConfig};
pub use producers::{ChannelProducer, VecProducer};
pub use transformer::{Transformer, TransformerConfig};
pub use transformers::BoundedTransformer;
