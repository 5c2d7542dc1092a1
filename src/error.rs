//! Error taxonomy for the core (spec §7).
//!
//! `CoreError` covers mutation and lookup failures that are reported to the
//! caller unchanged. `RuleStop`/`RuleJump` are deliberately *not* variants
//! here: they are expected control signals inside the evaluation loop, not
//! exceptions, and are modeled by [`crate::executor::ExecResult`] instead.

use crate::value::ValueType;
use thiserror::Error;

/// Errors raised by value/column/axis/cube mutation and lookup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
  /// A null or wrong-shape value was supplied for an axis type.
  #[error("invalid value for axis `{axis}`: {reason}")]
  InvalidValue { axis: String, reason: String },

  /// A value could not be coerced to the axis's declared `ValueType`.
  #[error("cannot convert {raw} to {target:?}")]
  ValueConversion { raw: String, target: ValueType },

  /// Inserting/updating a column would violate the axis's no-overlap invariant.
  #[error("column would overlap an existing column on axis `{axis}`")]
  AxisOverlap { axis: String },

  /// A DISCRETE/NEAREST axis already has a column with this value.
  #[error("duplicate column value on axis `{axis}`")]
  DuplicateColumn { axis: String },

  /// No column bound on a non-default axis, or no rule fired on a rule axis.
  #[error("no coordinate found for axis `{axis}`")]
  CoordinateNotFound { axis: String },

  /// The input coordinate map was missing a key the cube's scope requires.
  #[error("missing required scope key `{key}`")]
  MissingScope { key: String },

  /// An operation is illegal given the axis/column's current state.
  #[error("invalid operation: {reason}")]
  InvalidOperation { reason: String },

  /// JSON import/export (spec §6) failed to parse or construct a cube.
  #[error("json import/export failed: {0}")]
  Json(String),
}

/// Convenience alias used throughout the core for `CoreError`-producing calls.
pub type CoreResult<T> = Result<T, CoreError>;

/// Outer error returned from a cube's `get_cell`: either a structural/lookup
/// failure (`CoreError`) or a command cell that failed while running
/// (`ExecError`). Kept as a separate enum (rather than folding `ExecError`
/// into `CoreError`) because `ExecError::CellExecution` wraps an opaque
/// `Box<dyn std::error::Error>` from outside the crate and can't derive
/// `Clone`/`PartialEq` the way the rest of `CoreError` does.
#[derive(Debug, Error)]
pub enum CubeError {
  #[error(transparent)]
  Core(#[from] CoreError),
  #[error(transparent)]
  Exec(#[from] crate::executor::ExecError),
}

pub type CubeResult<T> = Result<T, CubeError>;
