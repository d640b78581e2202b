//! Core limit accounting for bounded pipeline stages.
//!
//! [`LimitGuard`] is the per-attachment state machine: it measures each
//! chunk according to the configured [`CountingMode`], tracks the running
//! total, forwards chunks while the *prospective* total (current + incoming)
//! stays within the limit, and terminates permanently the moment a chunk
//! would push past it. A chunk that lands exactly on the limit is still
//! forwarded; the chunk that would overshoot is rejected in the same call
//! that discovered the breach and is never counted.
//!
//! The guard is deliberately synchronous and constant-time per chunk. All
//! asynchrony (backpressure, cancellation) lives in the stream adapter
//! around it, [`crate::transformers::BoundedTransformer`]. One pipeline
//! attachment owns one guard; the single-flight delivery contract of the
//! driver makes locking unnecessary.

use crate::chunk::ByteSized;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// How a chunk contributes to the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountingMode {
  /// Each chunk contributes its byte length (see [`ByteSized`]).
  Byte,
  /// Each chunk contributes exactly one unit, regardless of payload size.
  Object,
}

impl FromStr for CountingMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "byte" => Ok(CountingMode::Byte),
      "object" => Ok(CountingMode::Object),
      other => Err(ConfigError::UnknownCountingMode(other.to_string())),
    }
  }
}

/// Invalid limit configuration, surfaced at construction. Fatal: a stage is
/// never built from a config that failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  /// No limit was supplied.
  #[error("transfer limit is required")]
  MissingLimit,
  /// The supplied limit was negative.
  #[error("transfer limit must be non-negative, got {0}")]
  NegativeLimit(f64),
  /// The supplied limit was not a finite whole number.
  #[error("transfer limit must be a finite whole number, got {0}")]
  InvalidLimit(f64),
  /// No counting mode was supplied.
  #[error("counting mode is required (`byte` or `object`)")]
  MissingCountingMode,
  /// The supplied counting mode was not recognized.
  #[error("unrecognized counting mode `{0}`, expected `byte` or `object`")]
  UnknownCountingMode(String),
}

/// Untyped shape accepted from config sources. Validated into
/// [`LimitConfig`]; both `counting_mode` and the original `countingMode`
/// spelling are accepted.
#[derive(Debug, Deserialize)]
struct RawLimitConfig {
  limit: Option<f64>,
  #[serde(alias = "countingMode")]
  counting_mode: Option<String>,
}

impl TryFrom<RawLimitConfig> for LimitConfig {
  type Error = ConfigError;

  fn try_from(raw: RawLimitConfig) -> Result<Self, Self::Error> {
    let limit = raw.limit.ok_or(ConfigError::MissingLimit)?;
    let mode = raw.counting_mode.ok_or(ConfigError::MissingCountingMode)?;
    LimitConfig::from_raw(limit, &mode)
  }
}

/// Immutable configuration for a bounded stage: the hard upper bound and
/// the counting mode. Set once at construction, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimitConfig")]
pub struct LimitConfig {
  limit: u64,
  counting_mode: CountingMode,
}

impl LimitConfig {
  /// Creates a config from already-typed values. Cannot fail: the type
  /// system rules out negative or non-numeric limits.
  pub fn new(limit: u64, counting_mode: CountingMode) -> Self {
    Self {
      limit,
      counting_mode,
    }
  }

  /// Byte-counting config.
  pub fn bytes(limit: u64) -> Self {
    Self::new(limit, CountingMode::Byte)
  }

  /// Item-counting config.
  pub fn objects(limit: u64) -> Self {
    Self::new(limit, CountingMode::Object)
  }

  /// Validates values taken from an untyped source (JSON, CLI strings).
  ///
  /// The limit must be a non-negative finite whole number and the mode one
  /// of `byte` or `object`.
  pub fn from_raw(limit: f64, counting_mode: &str) -> Result<Self, ConfigError> {
    if !limit.is_finite() {
      return Err(ConfigError::InvalidLimit(limit));
    }
    if limit < 0.0 {
      return Err(ConfigError::NegativeLimit(limit));
    }
    // `u64::MAX as f64` rounds up to 2^64, which is itself out of range.
    if limit.fract() != 0.0 || limit >= u64::MAX as f64 {
      return Err(ConfigError::InvalidLimit(limit));
    }
    Ok(Self::new(limit as u64, counting_mode.parse()?))
  }

  /// The hard upper bound on the cumulative measured size.
  pub fn limit(&self) -> u64 {
    self.limit
  }

  /// The configured counting mode.
  pub fn counting_mode(&self) -> CountingMode {
    self.counting_mode
  }
}

/// Terminal errors surfaced by a bounded stage. None of these is
/// recoverable in place: each ends the pipeline attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitError {
  /// Forwarding the chunk would push the cumulative measured size past the
  /// configured limit.
  #[error("transfer limit exceeded")]
  Exceeded,
  /// The pipeline was cancelled externally before completion. Not a data
  /// error, and deliberately distinct from [`LimitError::Exceeded`].
  #[error("pipeline cancelled before completion")]
  Cancelled,
  /// A chunk was delivered after the stage had already terminated. This is
  /// an integration-contract violation by the driver, not a data error; the
  /// chunk is neither forwarded nor counted.
  #[error("chunk delivered after stage termination")]
  AlreadyTerminated,
}

/// Why a bounded stage stopped accepting chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCause {
  /// Upstream signalled natural end-of-input while under the limit.
  Completed,
  /// A chunk would have pushed the cumulative total past the limit.
  LimitExceeded,
  /// The surrounding pipeline was cancelled externally.
  Cancelled,
}

/// Narrow per-chunk capability consumed by a pipeline driver.
///
/// One chunk in, one decision out: the chunk handed back for forwarding
/// downstream unmodified, or the terminal error that ends the pipeline.
/// The driver must wait for each call to return before delivering the next
/// chunk and must stop delivering once an `Err` comes back.
pub trait ChunkProcessor {
  /// The payload type flowing through the stage.
  type Chunk;

  /// Processes one chunk in delivery order.
  fn process_chunk(&mut self, chunk: Self::Chunk) -> Result<Self::Chunk, LimitError>;
}

/// Per-attachment limit state machine.
///
/// Owns the running total and the terminal state for exactly one pipeline
/// attachment; instances are never shared across pipelines. The stored
/// measure function is fixed at construction from the counting mode, so
/// `process_chunk` is a measure, a compare and at most one add.
pub struct LimitGuard<T> {
  config: LimitConfig,
  total_consumed: u64,
  terminal: Option<TerminalCause>,
  measure: fn(&T) -> u64,
}

impl<T> Clone for LimitGuard<T> {
  fn clone(&self) -> Self {
    Self {
      config: self.config,
      total_consumed: self.total_consumed,
      terminal: self.terminal,
      measure: self.measure,
    }
  }
}

impl<T> std::fmt::Debug for LimitGuard<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LimitGuard")
      .field("config", &self.config)
      .field("total_consumed", &self.total_consumed)
      .field("terminal", &self.terminal)
      .finish()
  }
}

impl<T: ByteSized> LimitGuard<T> {
  /// Guard counting the byte length of each chunk.
  pub fn bytes(limit: u64) -> Self {
    Self::with_measure(LimitConfig::bytes(limit), |chunk| chunk.byte_len() as u64)
  }

  /// Guard for an already-validated config. In byte mode chunks are
  /// measured through [`ByteSized`]; in object mode each counts as one.
  pub fn from_config(config: LimitConfig) -> Self {
    match config.counting_mode() {
      CountingMode::Byte => Self::with_measure(config, |chunk| chunk.byte_len() as u64),
      CountingMode::Object => Self::with_measure(config, |_| 1),
    }
  }
}

impl<T> LimitGuard<T> {
  /// Guard counting each discrete item as one unit. Available for any
  /// payload type; no byte measurement is involved.
  pub fn objects(limit: u64) -> Self {
    Self::with_measure(LimitConfig::objects(limit), |_| 1)
  }

  fn with_measure(config: LimitConfig, measure: fn(&T) -> u64) -> Self {
    Self {
      config,
      total_consumed: 0,
      terminal: None,
      measure,
    }
  }

  /// The configuration this guard was built from.
  pub fn config(&self) -> LimitConfig {
    self.config
  }

  /// Sum of the measured sizes of every chunk forwarded so far. Chunks
  /// rejected for breaching the limit are not counted.
  pub fn total_consumed(&self) -> u64 {
    self.total_consumed
  }

  /// The measured size of a chunk under this guard's counting mode.
  pub fn measure(&self, chunk: &T) -> u64 {
    (self.measure)(chunk)
  }

  /// Why the guard terminated, or `None` while it is still accepting.
  pub fn terminal_cause(&self) -> Option<TerminalCause> {
    self.terminal
  }

  /// Whether the guard has entered its permanent terminal state.
  pub fn is_terminated(&self) -> bool {
    self.terminal.is_some()
  }

  /// Records natural end-of-input. No-op if already terminated: the
  /// completion signal is suppressed once the pipeline is closed.
  pub fn complete(&mut self) {
    if self.terminal.is_none() {
      self.terminal = Some(TerminalCause::Completed);
    }
  }

  /// Records forced external cancellation. Never reported as a limit
  /// breach; no-op if already terminated.
  pub fn cancel(&mut self) {
    if self.terminal.is_none() {
      self.terminal = Some(TerminalCause::Cancelled);
    }
  }
}

impl<T> ChunkProcessor for LimitGuard<T> {
  type Chunk = T;

  fn process_chunk(&mut self, chunk: T) -> Result<T, LimitError> {
    if self.terminal.is_some() {
      return Err(LimitError::AlreadyTerminated);
    }

    let size = (self.measure)(&chunk);
    // An overflowing prospective total exceeds any representable limit, so
    // it is a breach like any other.
    match self.total_consumed.checked_add(size) {
      Some(prospective) if prospective <= self.config.limit() => {
        self.total_consumed = prospective;
        Ok(chunk)
      }
      _ => {
        self.terminal = Some(TerminalCause::LimitExceeded);
        Err(LimitError::Exceeded)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn test_new_guard_starts_empty() {
    let guard = LimitGuard::<String>::bytes(10);
    assert_eq!(guard.total_consumed(), 0);
    assert!(!guard.is_terminated());
    assert_eq!(guard.config().limit(), 10);
    assert_eq!(guard.config().counting_mode(), CountingMode::Byte);
  }

  #[test]
  fn test_forwards_while_under_limit() {
    let mut guard = LimitGuard::<String>::bytes(10);
    assert_eq!(guard.process_chunk("aaaa".to_string()), Ok("aaaa".to_string()));
    assert_eq!(guard.total_consumed(), 4);
    assert_eq!(guard.process_chunk("bbbb".to_string()), Ok("bbbb".to_string()));
    assert_eq!(guard.total_consumed(), 8);
  }

  #[test]
  fn test_rejects_breaching_chunk_without_counting_it() {
    let mut guard = LimitGuard::<String>::bytes(10);
    guard.process_chunk("aaaa".to_string()).unwrap();
    guard.process_chunk("bbbb".to_string()).unwrap();

    assert_eq!(
      guard.process_chunk("cccc".to_string()),
      Err(LimitError::Exceeded)
    );
    assert_eq!(guard.total_consumed(), 8);
    assert_eq!(guard.terminal_cause(), Some(TerminalCause::LimitExceeded));
  }

  #[test]
  fn test_chunk_landing_exactly_on_limit_is_forwarded() {
    let mut guard = LimitGuard::<String>::bytes(10);
    guard.process_chunk("aaaaa".to_string()).unwrap();
    assert_eq!(
      guard.process_chunk("bbbbb".to_string()),
      Ok("bbbbb".to_string())
    );
    assert_eq!(guard.total_consumed(), 10);
    assert!(!guard.is_terminated());
  }

  #[test]
  fn test_zero_limit_rejects_first_nonempty_chunk() {
    let mut guard = LimitGuard::<String>::bytes(0);
    assert_eq!(guard.process_chunk("x".to_string()), Err(LimitError::Exceeded));
    assert_eq!(guard.total_consumed(), 0);
  }

  #[test]
  fn test_zero_limit_admits_zero_sized_chunks() {
    let mut guard = LimitGuard::<String>::bytes(0);
    assert_eq!(guard.process_chunk(String::new()), Ok(String::new()));
    assert!(!guard.is_terminated());
  }

  #[test]
  fn test_object_mode_counts_one_per_item_regardless_of_size() {
    let mut guard = LimitGuard::<String>::objects(3);
    for chunk in ["a", "a very large payload indeed", ""] {
      assert_eq!(guard.measure(&chunk.to_string()), 1);
      guard.process_chunk(chunk.to_string()).unwrap();
    }
    assert_eq!(guard.total_consumed(), 3);
    assert_eq!(
      guard.process_chunk("fourth".to_string()),
      Err(LimitError::Exceeded)
    );
  }

  #[test]
  fn test_object_mode_works_for_non_byte_payloads() {
    #[derive(Debug, Clone, PartialEq)]
    struct Record {
      id: u32,
    }

    let mut guard = LimitGuard::<Record>::objects(2);
    guard.process_chunk(Record { id: 1 }).unwrap();
    guard.process_chunk(Record { id: 2 }).unwrap();
    assert_eq!(
      guard.process_chunk(Record { id: 3 }),
      Err(LimitError::Exceeded)
    );
  }

  #[test]
  fn test_terminated_guard_rejects_without_side_effects() {
    let mut guard = LimitGuard::<String>::bytes(4);
    guard.process_chunk("aaaa".to_string()).unwrap();
    guard.process_chunk("bbbb".to_string()).unwrap_err();

    for _ in 0..3 {
      assert_eq!(
        guard.process_chunk("c".to_string()),
        Err(LimitError::AlreadyTerminated)
      );
      assert_eq!(guard.total_consumed(), 4);
      assert_eq!(guard.terminal_cause(), Some(TerminalCause::LimitExceeded));
    }
  }

  #[test]
  fn test_cancellation_is_distinct_from_breach() {
    let mut guard = LimitGuard::<String>::bytes(100);
    guard.process_chunk("data".to_string()).unwrap();
    guard.cancel();

    assert_eq!(guard.terminal_cause(), Some(TerminalCause::Cancelled));
    assert_eq!(
      guard.process_chunk("more".to_string()),
      Err(LimitError::AlreadyTerminated)
    );
    // Cancellation after termination does not rewrite the cause.
    guard.cancel();
    assert_eq!(guard.terminal_cause(), Some(TerminalCause::Cancelled));
  }

  #[test]
  fn test_completion_is_suppressed_after_termination() {
    let mut guard = LimitGuard::<String>::bytes(2);
    guard.process_chunk("abc".to_string()).unwrap_err();
    guard.complete();
    assert_eq!(guard.terminal_cause(), Some(TerminalCause::LimitExceeded));

    let mut fresh = LimitGuard::<String>::bytes(2);
    fresh.complete();
    assert_eq!(fresh.terminal_cause(), Some(TerminalCause::Completed));
  }

  #[test]
  fn test_overflowing_prospective_total_is_a_breach() {
    let mut guard = LimitGuard::<Vec<u8>>::objects(u64::MAX);
    guard.total_consumed = u64::MAX;
    assert_eq!(guard.process_chunk(vec![1u8]), Err(LimitError::Exceeded));
  }

  #[test]
  fn test_config_from_raw_validation() {
    assert!(LimitConfig::from_raw(10.0, "byte").is_ok());
    assert!(LimitConfig::from_raw(0.0, "object").is_ok());
    assert_eq!(
      LimitConfig::from_raw(-1.0, "byte"),
      Err(ConfigError::NegativeLimit(-1.0))
    );
    assert_eq!(
      LimitConfig::from_raw(1.5, "byte"),
      Err(ConfigError::InvalidLimit(1.5))
    );
    assert!(matches!(
      LimitConfig::from_raw(f64::NAN, "byte"),
      Err(ConfigError::InvalidLimit(_))
    ));
    assert_eq!(
      LimitConfig::from_raw(f64::INFINITY, "byte"),
      Err(ConfigError::InvalidLimit(f64::INFINITY))
    );
    assert_eq!(
      LimitConfig::from_raw(10.0, "lines"),
      Err(ConfigError::UnknownCountingMode("lines".to_string()))
    );
  }

  #[test]
  fn test_config_from_raw_rejects_out_of_range_limit() {
    // 2^64 rounds to itself as f64 and would saturate on the cast.
    let two_pow_64 = u64::MAX as f64;
    assert_eq!(
      LimitConfig::from_raw(two_pow_64, "byte"),
      Err(ConfigError::InvalidLimit(two_pow_64))
    );
    assert_eq!(
      LimitConfig::from_raw(1e30, "byte"),
      Err(ConfigError::InvalidLimit(1e30))
    );

    // The largest in-range whole f64 below 2^64 still validates.
    let largest = (u64::MAX as f64).next_down();
    let config = LimitConfig::from_raw(largest, "byte").expect("in-range limit");
    assert_eq!(config.limit(), largest as u64);
  }

  #[test]
  fn test_config_from_json() {
    let config: LimitConfig = serde_json::from_str(r#"{"limit": 64, "counting_mode": "byte"}"#)
      .expect("valid config");
    assert_eq!(config.limit(), 64);
    assert_eq!(config.counting_mode(), CountingMode::Byte);

    // The original camelCase spelling is accepted too.
    let config: LimitConfig =
      serde_json::from_str(r#"{"limit": 3, "countingMode": "object"}"#).expect("valid config");
    assert_eq!(config.counting_mode(), CountingMode::Object);

    assert!(serde_json::from_str::<LimitConfig>(r#"{"counting_mode": "byte"}"#).is_err());
    assert!(serde_json::from_str::<LimitConfig>(r#"{"limit": -5, "counting_mode": "byte"}"#).is_err());
    assert!(serde_json::from_str::<LimitConfig>(r#"{"limit": 5, "counting_mode": "rows"}"#).is_err());
    assert!(serde_json::from_str::<LimitConfig>(r#"{"limit": 5}"#).is_err());
  }

  proptest! {
    // Any sequence whose cumulative size fits the limit is forwarded
    // whole, in order, and the total equals the sum of measured sizes.
    #[test]
    fn prop_conservation_under_limit(chunks in prop::collection::vec(".{0,16}", 0..32)) {
      let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
      let mut guard = LimitGuard::<String>::bytes(total);

      for chunk in &chunks {
        let forwarded = guard.process_chunk(chunk.clone());
        prop_assert_eq!(forwarded, Ok(chunk.clone()));
      }
      prop_assert_eq!(guard.total_consumed(), total);
      prop_assert!(!guard.is_terminated());
    }

    // The first chunk to push the cumulative size past the limit is
    // rejected, nothing before it is lost, nothing after it is processed.
    #[test]
    fn prop_fail_fast_at_first_breach(
      chunks in prop::collection::vec(".{0,16}", 1..32),
      limit in 0u64..64,
    ) {
      let mut guard = LimitGuard::<String>::bytes(limit);
      let mut running = 0u64;
      let mut breached = false;

      for chunk in &chunks {
        let size = chunk.len() as u64;
        let result = guard.process_chunk(chunk.clone());
        if breached {
          prop_assert_eq!(result, Err(LimitError::AlreadyTerminated));
        } else if running + size > limit {
          prop_assert_eq!(result, Err(LimitError::Exceeded));
          breached = true;
        } else {
          prop_assert_eq!(result, Ok(chunk.clone()));
          running += size;
        }
        prop_assert_eq!(guard.total_consumed(), running);
      }
    }
  }
}
