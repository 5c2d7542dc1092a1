//! The executor contract: command cells and the capability a cube invokes to
//! run them (spec §3/§4.4/§4.5, component C5).
//!
//! The core never compiles or interprets expressions itself — that's the
//! scripting/classloader machinery spec.md explicitly keeps external. It only
//! needs a stable trait object to call into, and a three-armed result that
//! lets a cell say "here's a value" or "stop/restart this evaluation" without
//! abusing `Result`'s error channel for expected control flow.

use crate::column::ColumnId;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What an `Executable` returns from one invocation (spec §4.4/§9).
///
/// `Stop`/`Jump` are not errors: a well-formed rule expression may
/// legitimately halt or redirect the evaluation pass it's participating in.
#[derive(Debug, Clone)]
pub enum ExecResult {
  /// An ordinary computed value.
  Value(Value),
  /// Halts the in-progress evaluation pass immediately (`RuleStop`).
  Stop,
  /// Restarts evaluation with a modified coordinate (`RuleJump`).
  Jump(HashMap<String, Value>),
}

impl ExecResult {
  pub fn value(v: impl Into<Value>) -> Self {
    ExecResult::Value(v.into())
  }
}

/// Failure raised by running a command cell (spec §7).
#[derive(Debug)]
pub enum ExecError {
  /// A non-default, non-rule axis had no matching column for the given input.
  CoordinateNotFound { axis: String },
  /// An expression failed. Raised bare by an `Executable` impl, which has no
  /// way to know the cube's current execution stack; the cube wraps it into
  /// `CellExecution` on the way out (spec §4.4/§5).
  Failed(Box<dyn std::error::Error + Send + Sync>),
  /// The cube's own wrapping of a `Failed` error, with the execution stack
  /// at the point of failure attached (spec §4.4/§5/§7). Only ever
  /// constructed by the cube itself — see `cube::eval::wrap_exec_error`.
  CellExecution { stack: Vec<String>, source: Box<dyn std::error::Error + Send + Sync> },
}

impl fmt::Display for ExecError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExecError::CoordinateNotFound { axis } => {
        write!(f, "no coordinate found for axis `{axis}`")
      }
      ExecError::Failed(source) => write!(f, "cell execution failed: {source}"),
      ExecError::CellExecution { stack, source } => {
        write!(f, "cell execution failed: {source} (stack: {})", stack.join(" -> "))
      }
    }
  }
}

impl std::error::Error for ExecError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ExecError::Failed(source) | ExecError::CellExecution { source, .. } => Some(source.as_ref()),
      ExecError::CoordinateNotFound { .. } => None,
    }
  }
}

pub type ExecOutcome = Result<ExecResult, ExecError>;

/// What a `Cube` invokes to run a command cell. Implementations live outside
/// this crate (the scripting runtime this spec excludes); the core only
/// needs the shape.
pub trait Executable: fmt::Debug + Send + Sync {
  /// Runs the expression against the current coordinate. Takes `ctx` by
  /// unique reference so the expression can append to `ctx.output`.
  fn execute(&self, ctx: &mut ExecutionContext) -> ExecOutcome;

  /// Cube names this expression may look up via the registry (spec §6),
  /// used to compute a cube's transitive optional scope (spec §4.6).
  fn referenced_cube_names(&self) -> Vec<String> {
    Vec::new()
  }

  /// `input.<name>` references this expression reads directly, independent
  /// of any axis's required scope (spec §4.6 "optional scope").
  fn scope_keys(&self) -> Vec<String> {
    Vec::new()
  }
}

/// Everything an `Executable` needs to run: the coordinate it was bound
/// under, the running output accumulator, and the cube/registry it may
/// reach through (spec §4.4/§6).
pub struct ExecutionContext<'a> {
  pub input: &'a HashMap<String, Value>,
  pub output: &'a mut HashMap<String, Value>,
  pub cube_name: &'a str,
  pub app_id: &'a str,
  pub registry: Option<&'a dyn crate::registry::CubeRegistry>,
}

/// What's stored in a cell: a plain value, or a command cell to execute on
/// every lookup (spec §3).
#[derive(Debug, Clone)]
pub enum CellValue {
  Value(Value),
  Command(Arc<dyn Executable>),
}

impl CellValue {
  pub fn is_command(&self) -> bool {
    matches!(self, CellValue::Command(_))
  }
}

/// A coordinate binding: which column on which axis a lookup resolved to
/// (spec §4.4). Carried on the per-thread execution stack for diagnostics
/// and cycle detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
  pub axis_name: String,
  pub column_id: ColumnId,
}
