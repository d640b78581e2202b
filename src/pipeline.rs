//! Pipeline assembly and flow-control driving.
//!
//! [`PipelineBuilder`] is a typestate builder: a producer must be attached
//! before a transformer, a transformer before a consumer, and the item type
//! flowing between adjacent stages is checked at compile time. The
//! assembled [`Pipeline`] is driven by [`Pipeline::run`], which forwards
//! admitted chunks downstream and stops at the first terminal error so both
//! ends of the pipeline unwind: downstream sees no further chunks and
//! upstream is not polled again.

use crate::consumer::Consumer;
use crate::limit::LimitError;
use crate::output::Output;
use crate::producer::Producer;
use crate::transformer::Transformer;
use futures::{Stream, StreamExt};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Builder state: no stages attached yet.
pub struct Empty;
/// Builder state: producer attached.
pub struct HasProducer<P>(PhantomData<P>);
/// Builder state: producer and transformer attached.
pub struct HasTransformer<P, T>(PhantomData<(P, T)>);

/// Typestate builder for pipelines.
pub struct PipelineBuilder<State> {
  producer_stream: Option<Box<dyn std::any::Any + Send + 'static>>,
  transformer_stream: Option<Box<dyn std::any::Any + Send + 'static>>,
  _state: State,
}

/// An assembled pipeline, ready to run once.
pub struct Pipeline<P, T, C>
where
  P: Producer,
  T: Transformer,
  C: Consumer,
  P::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
  T::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
  C::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  transformer_stream: Option<T::OutputStream>,
  consumer: Option<C>,
  _producer: PhantomData<P>,
}

impl PipelineBuilder<Empty> {
  /// Starts an empty pipeline.
  pub fn new() -> Self {
    PipelineBuilder {
      producer_stream: None,
      transformer_stream: None,
      _state: Empty,
    }
  }

  /// Attaches the producer and captures its output stream.
  pub fn producer<P>(mut self, mut producer: P) -> PipelineBuilder<HasProducer<P>>
  where
    P: Producer + 'static,
    P::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
    P::OutputStream: 'static,
  {
    let stream = producer.produce();
    self.producer_stream = Some(Box::new(stream));

    PipelineBuilder {
      producer_stream: self.producer_stream,
      transformer_stream: None,
      _state: HasProducer(PhantomData),
    }
  }
}

impl Default for PipelineBuilder<Empty> {
  fn default() -> Self {
    Self::new()
  }
}

impl<P> PipelineBuilder<HasProducer<P>>
where
  P: Producer + 'static,
  P::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
  P::OutputStream: 'static,
{
  /// Attaches a transformer over the producer's output.
  pub fn transformer<T>(mut self, mut transformer: T) -> PipelineBuilder<HasTransformer<P, T>>
  where
    T: Transformer + 'static,
    T::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
    T::InputStream: From<P::OutputStream>,
    T::OutputStream: 'static,
  {
    let producer_stream = self
      .producer_stream
      .take()
      .unwrap()
      .downcast::<P::OutputStream>()
      .unwrap();

    let transformer_stream = transformer.transform((*producer_stream).into());
    self.transformer_stream = Some(Box::new(transformer_stream));

    PipelineBuilder {
      producer_stream: None,
      transformer_stream: self.transformer_stream,
      _state: HasTransformer(PhantomData),
    }
  }
}

impl<P, T> PipelineBuilder<HasTransformer<P, T>>
where
  P: Producer + 'static,
  T: Transformer + 'static,
  P::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
  T::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
  T::OutputStream: 'static,
{
  /// Attaches a further transformer over the previous transformer's output.
  pub fn transformer<U>(mut self, mut transformer: U) -> PipelineBuilder<HasTransformer<P, U>>
  where
    U: Transformer + 'static,
    U::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
    U::InputStream: From<T::OutputStream>,
    U::OutputStream: 'static,
  {
    let transformer_stream = self
      .transformer_stream
      .take()
      .unwrap()
      .downcast::<T::OutputStream>()
      .unwrap();

    let next_stream = transformer.transform((*transformer_stream).into());
    self.transformer_stream = Some(Box::new(next_stream));

    PipelineBuilder {
      producer_stream: None,
      transformer_stream: self.transformer_stream,
      _state: HasTransformer(PhantomData),
    }
  }

  /// Attaches the consumer, producing a runnable pipeline.
  pub fn consumer<C>(mut self, consumer: C) -> Pipeline<P, T, C>
  where
    C: Consumer + 'static,
    C::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
  {
    let transformer_stream = self
      .transformer_stream
      .take()
      .unwrap()
      .downcast::<T::OutputStream>()
      .unwrap();

    Pipeline {
      transformer_stream: Some(*transformer_stream),
      consumer: Some(consumer),
      _producer: PhantomData,
    }
  }
}

impl<P, T, C> Pipeline<P, T, C>
where
  P: Producer,
  T: Transformer,
  C: Consumer,
  P::Output: std::fmt::Debug + Clone + Send + Sync + 'static,
  T::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
  C::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  /// Drives the pipeline to its terminal outcome.
  ///
  /// Admitted chunks (`Ok` items from the transformer) are forwarded to the
  /// consumer in order; the first terminal error stops delivery and is
  /// returned as the pipeline's outcome. The consumer is handed back in
  /// either case so callers can inspect what was delivered before a breach
  /// or cancellation.
  pub async fn run(mut self) -> (Result<(), LimitError>, C)
  where
    T: Output<Output = Result<C::Input, LimitError>>,
    C::InputStream: From<Pin<Box<dyn Stream<Item = C::Input> + Send>>>,
  {
    let stream = self.transformer_stream.take().unwrap();
    let mut consumer = self.consumer.take().unwrap();

    tracing::debug!("running pipeline");

    // The first terminal error ends the downstream stream; it is parked
    // here until the consumer has finished unwinding.
    let failure: Arc<Mutex<Option<LimitError>>> = Arc::new(Mutex::new(None));
    let slot = failure.clone();
    let downstream: Pin<Box<dyn Stream<Item = C::Input> + Send>> =
      Box::pin(stream.scan(slot, |slot, item| {
        futures::future::ready(match item {
          Ok(chunk) => Some(chunk),
          Err(error) => {
            *slot.lock().unwrap() = Some(error);
            None
          }
        })
      }));

    consumer.consume(downstream.into()).await;

    let outcome = match failure.lock().unwrap().take() {
      Some(error) => {
        tracing::debug!(error = %error, "pipeline terminated with error");
        Err(error)
      }
      None => Ok(()),
    };
    (outcome, consumer)
  }
}
