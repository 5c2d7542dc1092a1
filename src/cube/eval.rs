//! The `get_cell` evaluation loop (spec §4.4): binds every axis to a
//! candidate column, enumerates the cartesian product of those bindings
//! with a variable-radix counter, and looks up the first coordinate that
//! has a cell. RULE axes additionally require *running* their columns'
//! conditions to discover which ones fire before a binding even exists.

use super::{CellKey, Cube};
use crate::axis::{Axis, AxisType};
use crate::column::ColumnId;
use crate::error::{CoreError, CubeError, CubeResult};
use crate::executor::{CellValue, ExecError, ExecResult, ExecutionContext};
use crate::registry::CubeRegistry;
use crate::value::{is_truthy, promote, Value};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

const MAX_PASSES: u32 = 1_000;

thread_local! {
  static EXEC_STACK: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// RAII guard pushing/popping the per-thread execution stack (spec §5), so
/// every exit path — including the `?` early returns throughout this
/// module — pops its frame.
struct StackGuard;

impl StackGuard {
  fn push(frame: String) -> CubeResult<Self> {
    let cycle = EXEC_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      if stack.iter().any(|f| f == &frame) {
        return true;
      }
      stack.push(frame);
      false
    });
    if cycle {
      return Err(CubeError::from(CoreError::InvalidOperation {
        reason: "cycle detected: a cube is already being evaluated on this thread".to_string(),
      }));
    }
    Ok(StackGuard)
  }
}

impl Drop for StackGuard {
  fn drop(&mut self) {
    EXEC_STACK.with(|stack| {
      stack.borrow_mut().pop();
    });
  }
}

/// Current stack of cube frames, for diagnostics attached to execution
/// errors (spec §4.4/§7).
pub fn current_stack() -> Vec<String> {
  EXEC_STACK.with(|stack| stack.borrow().clone())
}

/// Converts an `Executable`'s raw error into what the cube re-throws (spec
/// §4.4/§7): `CoordinateNotFound` propagates unmodified, same as
/// `RuleStop`/`RuleJump`; any other failure is wrapped with the execution
/// stack at the point of failure, becoming `CellExecution`.
fn wrap_exec_error(err: ExecError) -> CubeError {
  match err {
    ExecError::CoordinateNotFound { axis } => CubeError::from(CoreError::CoordinateNotFound { axis }),
    ExecError::Failed(source) => {
      CubeError::from(ExecError::CellExecution { stack: current_stack(), source })
    }
    already @ ExecError::CellExecution { .. } => CubeError::from(already),
  }
}

enum PassOutcome {
  Value(Value),
  Jump(HashMap<String, Value>),
  Stop,
}

/// Checks the cube's declared `requiredScopeKeys` meta-property against
/// `input` (spec §4.6/§7 `MissingScopeError`). Per-axis required scope
/// (spec scenario 1) is enforced separately as `CoordinateNotFound` at
/// the axis-binding step, since a missing axis coordinate has an axis to
/// point at; a missing *meta-declared* scope key has none, so it is
/// reported distinctly before evaluation even starts.
fn check_required_scope(cube: &Cube, input: &HashMap<String, Value>) -> CubeResult<()> {
  if let Some(declared) = cube.meta.get("requiredScopeKeys") {
    for key in declared.split(',').map(str::trim).filter(|s| !s.is_empty()) {
      if !input.contains_key(key) {
        return Err(CubeError::from(CoreError::MissingScope { key: key.to_string() }));
      }
    }
  }
  Ok(())
}

/// Evaluates `cube` at `input`, writing intermediate bindings to `output`
/// as they're resolved (spec §4.4).
pub fn get_cell(
  cube: &Cube,
  input: &HashMap<String, Value>,
  output: &mut HashMap<String, Value>,
  registry: Option<&dyn CubeRegistry>,
) -> CubeResult<Value> {
  let _guard = StackGuard::push(format!("{}::{}", cube.app_id, cube.name))?;
  check_required_scope(cube, input)?;

  let mut working_input = input.clone();
  for pass in 0..MAX_PASSES {
    tracing::trace!(cube = %cube.name, pass, "evaluating pass");
    match run_pass(cube, &working_input, output, registry)? {
      PassOutcome::Value(v) => {
        output.insert("return".to_string(), v.clone());
        return Ok(v);
      }
      PassOutcome::Jump(overrides) => {
        tracing::trace!(cube = %cube.name, pass, "RuleJump restarting evaluation");
        working_input.extend(overrides);
      }
      PassOutcome::Stop => {
        tracing::trace!(cube = %cube.name, pass, "RuleStop halted evaluation");
        return Err(CubeError::from(CoreError::InvalidOperation {
          reason: format!("cube `{}` evaluation stopped with no value produced", cube.name),
        }));
      }
    }
  }
  Err(CubeError::from(CoreError::InvalidOperation {
    reason: format!("cube `{}` exceeded {MAX_PASSES} RuleJump passes", cube.name),
  }))
}

fn run_pass(
  cube: &Cube,
  input: &HashMap<String, Value>,
  output: &mut HashMap<String, Value>,
  registry: Option<&dyn CubeRegistry>,
) -> CubeResult<PassOutcome> {
  let axes: Vec<&Axis> = cube.axes().collect();
  let mut candidates: Vec<Vec<ColumnId>> = Vec::with_capacity(axes.len());

  for axis in &axes {
    if axis.axis_type == AxisType::Rule {
      match fire_rule_axis(axis, cube, input, output, registry)? {
        RuleFireOutcome::Fired(ids) => {
          if ids.is_empty() {
            return Err(CubeError::from(CoreError::CoordinateNotFound { axis: axis.name.clone() }));
          }
          candidates.push(ids);
        }
        RuleFireOutcome::Stop => return Ok(PassOutcome::Stop),
        RuleFireOutcome::Jump(overrides) => return Ok(PassOutcome::Jump(overrides)),
      }
      continue;
    }

    let ids = match input.get(&axis.name) {
      Some(raw) => {
        let key = promote(axis.value_type, raw.clone()).map_err(CubeError::from)?;
        axis.find_multi(&key).map_err(CubeError::from)?
      }
      None => match axis.default_column() {
        Some(col) => vec![col.id],
        None => {
          return Err(CubeError::from(CoreError::CoordinateNotFound { axis: axis.name.clone() }))
        }
      },
    };
    if ids.is_empty() {
      return Err(CubeError::from(CoreError::CoordinateNotFound { axis: axis.name.clone() }));
    }
    if let Some(col) = ids.first().and_then(|id| axis.column_by_id(*id)) {
      output.insert(axis.name.clone(), col.value.clone().unwrap_or_else(|| Value::String("default".to_string())));
    }
    candidates.push(ids);
  }

  // Variable-radix enumeration over each axis's candidate list (spec §4.4):
  // an odometer of per-axis counters, advanced low-digit-first, running
  // every coordinate in the cartesian product rather than stopping at the
  // first one with a cell.
  let radices: Vec<usize> = candidates.iter().map(Vec::len).collect();
  if radices.iter().any(|&r| r == 0) {
    // Already handled above for non-rule axes; defensive for rule axes too.
    return Err(CubeError::from(CoreError::InvalidOperation {
      reason: format!("cube `{}` has an axis with no candidate bindings", cube.name),
    }));
  }
  let total_combinations: usize = radices.iter().product::<usize>().max(1);
  let mut counters = vec![0usize; candidates.len()];
  let mut last_value: Option<Value> = None;

  // Every binding in the cartesian product is resolved, not just the
  // first hit: spec §4.4's loop overwrites `last_value` on each complete
  // binding and only inspects it after the `repeat...until` exits. This is
  // what lets a `fire_all` rule/range/set axis run a *chain* of cells (each
  // with its own side effects on `output`) where the last one's value wins,
  // rather than short-circuiting on the first stored cell found.
  for _ in 0..total_combinations {
    let key: CellKey = counters
      .iter()
      .enumerate()
      .map(|(axis_idx, &c)| candidates[axis_idx][c])
      .collect::<BTreeSet<ColumnId>>();

    let cell = cube.cell_by_key(&key).or(cube.default_value.as_ref());
    if let Some(cell) = cell {
      match resolve_cell(cell, cube, input, output, registry)? {
        PassOutcome::Value(v) => last_value = Some(v),
        stop_or_jump => return Ok(stop_or_jump),
      }
    }

    // Odometer advance: increment the last digit, carrying into earlier
    // digits on overflow.
    for digit in (0..counters.len()).rev() {
      counters[digit] += 1;
      if counters[digit] < radices[digit] {
        break;
      }
      counters[digit] = 0;
    }
  }

  match last_value {
    Some(v) => Ok(PassOutcome::Value(v)),
    None => Err(CubeError::from(CoreError::CoordinateNotFound { axis: cube.name.clone() })),
  }
}

fn resolve_cell(
  cell: &CellValue,
  cube: &Cube,
  input: &HashMap<String, Value>,
  output: &mut HashMap<String, Value>,
  registry: Option<&dyn CubeRegistry>,
) -> CubeResult<PassOutcome> {
  match cell {
    CellValue::Value(v) => Ok(PassOutcome::Value(v.clone())),
    CellValue::Command(exec) => {
      let mut ctx = ExecutionContext {
        input,
        output,
        cube_name: &cube.name,
        app_id: &cube.app_id,
        registry,
      };
      match exec.execute(&mut ctx).map_err(wrap_exec_error)? {
        ExecResult::Value(v) => Ok(PassOutcome::Value(v)),
        ExecResult::Stop => Ok(PassOutcome::Stop),
        ExecResult::Jump(overrides) => Ok(PassOutcome::Jump(overrides)),
      }
    }
  }
}

enum RuleFireOutcome {
  Fired(Vec<ColumnId>),
  Stop,
  Jump(HashMap<String, Value>),
}

/// Executes every command-cell condition on a RULE axis, in declared order
/// (spec §4.4). Collapses to the first truthy column unless `fire_all`.
fn fire_rule_axis(
  axis: &Axis,
  cube: &Cube,
  input: &HashMap<String, Value>,
  output: &mut HashMap<String, Value>,
  registry: Option<&dyn CubeRegistry>,
) -> CubeResult<RuleFireOutcome> {
  let mut fired = Vec::new();
  for column in axis.columns() {
    if column.is_default {
      continue;
    }
    let Some(condition) = &column.condition else { continue };
    let mut ctx =
      ExecutionContext { input, output, cube_name: &cube.name, app_id: &cube.app_id, registry };
    match condition.execute(&mut ctx).map_err(wrap_exec_error)? {
      ExecResult::Stop => return Ok(RuleFireOutcome::Stop),
      ExecResult::Jump(overrides) => return Ok(RuleFireOutcome::Jump(overrides)),
      ExecResult::Value(v) => {
        if is_truthy(&v) {
          tracing::trace!(axis = %axis.name, column = %column.name().unwrap_or_default(), "rule fired");
          output.insert(
            format!("{}.{}", axis.name, column.name().unwrap_or_default()),
            v,
          );
          fired.push(column.id);
          if !axis.fire_all {
            break;
          }
        }
      }
    }
  }
  if fired.is_empty() {
    if let Some(default) = axis.default_column() {
      fired.push(default.id);
    }
  }
  Ok(RuleFireOutcome::Fired(fired))
}
