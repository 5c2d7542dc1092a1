use indexmap::IndexMap;
use ncube::axis::{Axis, AxisType, Order};
use ncube::cube::Cube;
use ncube::error::{CoreError, CubeError};
use ncube::executor::{CellValue, ExecError, ExecOutcome, ExecResult, Executable, ExecutionContext};
use ncube::value::{LatLon, Range, RangeSet, RangeSetMember, Value, ValueType};
use std::collections::HashMap;
use std::sync::Arc;

fn input(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
  pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn eval(cube: &Cube, pairs: &[(&str, Value)]) -> Result<Value, CubeError> {
  let mut output = HashMap::new();
  cube.get_cell(&input(pairs), &mut output, None)
}

/// Scenario 1: discrete lookup (spec §8).
#[test]
fn scenario_discrete_lookup() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let green = axis.add_column(Value::String("green".into()), IndexMap::new()).unwrap();
  let blue = axis.add_column(Value::String("blue".into()), IndexMap::new()).unwrap();

  let mut cube = Cube::new("colors", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  cube.set_cell(&[green], CellValue::Value(Value::Long(2))).unwrap();
  cube.set_cell(&[blue], CellValue::Value(Value::Long(3))).unwrap();

  assert_eq!(eval(&cube, &[("color", Value::String("green".into()))]).unwrap(), Value::Long(2));

  let err = eval(&cube, &[("color", Value::String("orange".into()))]).unwrap_err();
  assert!(matches!(err, CubeError::Core(CoreError::CoordinateNotFound { .. })));
}

#[test]
fn scenario_discrete_lookup_with_default_cell() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let default_col = axis.set_default_column(IndexMap::new()).unwrap();

  let mut cube = Cube::new("colors", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  cube.set_cell(&[default_col], CellValue::Value(Value::Long(0))).unwrap();

  assert_eq!(eval(&cube, &[("color", Value::String("orange".into()))]).unwrap(), Value::Long(0));
}

/// Scenario 2: range lookup (spec §8).
#[test]
fn scenario_range_lookup() {
  let mut axis = Axis::new(1, "age", AxisType::Range, ValueType::Long, Order::Sorted, false).unwrap();
  let minor = axis.add_column(Value::Range(Range::new(Value::Long(0), Value::Long(18))), IndexMap::new()).unwrap();
  let adult = axis.add_column(Value::Range(Range::new(Value::Long(18), Value::Long(65))), IndexMap::new()).unwrap();
  let senior = axis.add_column(Value::Range(Range::new(Value::Long(65), Value::Long(120))), IndexMap::new()).unwrap();

  let mut cube = Cube::new("ages", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[minor], CellValue::Value(Value::String("minor".into()))).unwrap();
  cube.set_cell(&[adult], CellValue::Value(Value::String("adult".into()))).unwrap();
  cube.set_cell(&[senior], CellValue::Value(Value::String("senior".into()))).unwrap();

  assert_eq!(eval(&cube, &[("age", Value::Long(17))]).unwrap(), Value::String("minor".into()));
  assert_eq!(eval(&cube, &[("age", Value::Long(18))]).unwrap(), Value::String("adult".into()));
  assert!(eval(&cube, &[("age", Value::Long(120))]).is_err());
}

/// Scenario 3: set lookup (spec §8).
#[test]
fn scenario_set_lookup() {
  let mut axis = Axis::new(1, "day", AxisType::Set, ValueType::String, Order::Sorted, false).unwrap();
  let weekday = axis
    .add_column(
      Value::RangeSet(RangeSet::new(
        ["mon", "tue", "wed", "thu", "fri"]
          .iter()
          .map(|d| RangeSetMember::Discrete(Value::String((*d).into())))
          .collect(),
      )),
      IndexMap::new(),
    )
    .unwrap();
  let weekend = axis
    .add_column(
      Value::RangeSet(RangeSet::new(
        ["sat", "sun"].iter().map(|d| RangeSetMember::Discrete(Value::String((*d).into()))).collect(),
      )),
      IndexMap::new(),
    )
    .unwrap();

  let mut cube = Cube::new("days", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[weekday], CellValue::Value(Value::String("weekday".into()))).unwrap();
  cube.set_cell(&[weekend], CellValue::Value(Value::String("weekend".into()))).unwrap();

  assert_eq!(eval(&cube, &[("day", Value::String("wed".into()))]).unwrap(), Value::String("weekday".into()));
  assert_eq!(eval(&cube, &[("day", Value::String("sun".into()))]).unwrap(), Value::String("weekend".into()));
}

/// Scenario 4: nearest lookup (spec §8).
#[test]
fn scenario_nearest_lookup() {
  let mut axis = Axis::new(1, "city", AxisType::Nearest, ValueType::LatLon, Order::Sorted, false).unwrap();
  let nyc = axis.add_column(Value::LatLon(LatLon::new(40.71, -74.00)), IndexMap::new()).unwrap();
  axis.add_column(Value::LatLon(LatLon::new(34.05, -118.24)), IndexMap::new()).unwrap();

  let mut cube = Cube::new("cities", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[nyc], CellValue::Value(Value::String("NYC".into()))).unwrap();

  let result = eval(&cube, &[("city", Value::LatLon(LatLon::new(41.88, -87.63)))]);
  // Chicago's nearest city column is NYC, but only NYC has a cell: LA's
  // column would miss with CoordinateNotFound if it were chosen instead.
  assert_eq!(result.unwrap(), Value::String("NYC".into()));
}

#[derive(Debug)]
struct Threshold {
  key: String,
  min: i64,
}

impl Executable for Threshold {
  fn execute(&self, ctx: &mut ExecutionContext) -> ExecOutcome {
    let value = ctx.input.get(&self.key).and_then(Value::as_long).unwrap_or(0);
    Ok(ExecResult::Value(Value::Long((value > self.min) as i64)))
  }
}

#[derive(Debug)]
struct AlwaysTrue;

impl Executable for AlwaysTrue {
  fn execute(&self, _ctx: &mut ExecutionContext) -> ExecOutcome {
    Ok(ExecResult::Value(Value::Long(1)))
  }
}

fn meta(name: &str) -> IndexMap<String, String> {
  let mut m = IndexMap::new();
  m.insert("name".to_string(), name.to_string());
  m
}

fn tiered_cube() -> (Cube, ncube::column::ColumnId, ncube::column::ColumnId, ncube::column::ColumnId) {
  let mut axis = Axis::new(1, "tier", AxisType::Rule, ValueType::Expression, Order::Display, false).unwrap();
  let a = axis
    .add_rule_column(Arc::new(Threshold { key: "amount".into(), min: 1000 }), meta("A"))
    .unwrap();
  let b = axis
    .add_rule_column(Arc::new(Threshold { key: "amount".into(), min: 100 }), meta("B"))
    .unwrap();
  let c = axis.add_rule_column(Arc::new(AlwaysTrue), meta("C")).unwrap();

  let mut cube = Cube::new("tiers", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[a], CellValue::Value(Value::String("gold".into()))).unwrap();
  cube.set_cell(&[b], CellValue::Value(Value::String("silver".into()))).unwrap();
  cube.set_cell(&[c], CellValue::Value(Value::String("bronze".into()))).unwrap();
  (cube, a, b, c)
}

/// Scenario 5: rule axis, first-fired-wins collapse (spec §8).
#[test]
fn scenario_rule_axis_collapses_to_first_fired() {
  let (cube, ..) = tiered_cube();
  assert_eq!(eval(&cube, &[("amount", Value::Long(5000))]).unwrap(), Value::String("gold".into()));
  assert_eq!(eval(&cube, &[("amount", Value::Long(50))]).unwrap(), Value::String("bronze".into()));
}

#[derive(Debug)]
struct JumpToGold;

impl Executable for JumpToGold {
  fn execute(&self, _ctx: &mut ExecutionContext) -> ExecOutcome {
    let mut overrides = HashMap::new();
    overrides.insert("amount".to_string(), Value::Long(5000));
    Ok(ExecResult::Jump(overrides))
  }
}

/// Scenario 6: RuleJump restarts the top-level loop with a new input (spec §8).
#[test]
fn scenario_rule_jump_restarts_with_new_input() {
  let mut axis = Axis::new(1, "tier", AxisType::Rule, ValueType::Expression, Order::Display, false).unwrap();
  let a = axis
    .add_rule_column(Arc::new(Threshold { key: "amount".into(), min: 1000 }), meta("A"))
    .unwrap();
  let b = axis.add_rule_column(Arc::new(JumpToGold), meta("B")).unwrap();
  let c = axis.add_rule_column(Arc::new(AlwaysTrue), meta("C")).unwrap();

  let mut cube = Cube::new("tiers", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[a], CellValue::Value(Value::String("gold".into()))).unwrap();
  cube.set_cell(&[b], CellValue::Value(Value::String("silver".into()))).unwrap();
  cube.set_cell(&[c], CellValue::Value(Value::String("bronze".into()))).unwrap();

  // B's condition never returns a plain truthy value here; it always jumps.
  // Starting below A's threshold, B jumps to amount=5000 and the replay
  // fires A.
  assert_eq!(eval(&cube, &[("amount", Value::Long(50))]).unwrap(), Value::String("gold".into()));
}

#[test]
fn output_return_key_matches_the_returned_value() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("colors", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(7))).unwrap();

  let mut output = HashMap::new();
  let result = cube.get_cell(&input(&[("color", Value::String("red".into()))]), &mut output, None).unwrap();
  assert_eq!(output.get("return"), Some(&result));
}

#[derive(Debug)]
struct AlwaysFails;

impl Executable for AlwaysFails {
  fn execute(&self, _ctx: &mut ExecutionContext) -> ExecOutcome {
    Err(ExecError::Failed("boom".into()))
  }
}

#[test]
fn command_cell_failure_is_wrapped_with_the_execution_stack() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("colors", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Command(Arc::new(AlwaysFails))).unwrap();

  let err = eval(&cube, &[("color", Value::String("red".into()))]).unwrap_err();
  match err {
    CubeError::Exec(ExecError::CellExecution { stack, source }) => {
      assert!(stack.iter().any(|frame| frame.contains("colors")));
      assert_eq!(source.to_string(), "boom");
    }
    other => panic!("expected a wrapped CellExecution error, got {other:?}"),
  }
}

#[test]
fn missing_non_default_axis_coordinate_is_coordinate_not_found() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("colors", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();

  let err = eval(&cube, &[]).unwrap_err();
  assert!(matches!(err, CubeError::Core(CoreError::CoordinateNotFound { .. })));
}

/// A meta-declared `requiredScopeKeys` entry has no backing axis, so its
/// absence is reported as `MissingScope`, not `CoordinateNotFound` (spec §7).
#[test]
fn missing_meta_declared_required_scope_key_is_missing_scope() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("colors", "demo");
  cube.meta.insert("requiredScopeKeys".to_string(), "region".to_string());
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();

  let err = eval(&cube, &[("color", Value::String("red".into()))]).unwrap_err();
  assert!(matches!(err, CubeError::Core(CoreError::MissingScope { ref key }) if key == "region"));

  // Supplying the declared key (even though no axis reads it) clears the error.
  assert_eq!(
    eval(&cube, &[("color", Value::String("red".into())), ("region", Value::String("west".into()))]).unwrap(),
    Value::Long(1)
  );
}

/// With `fire_all`, every matching rule column's cell executes in order and
/// the *last* one's value wins, since the evaluation loop walks the full
/// cartesian product of bindings rather than stopping at the first hit
/// (spec §4.4's `repeat...until` + `last_value`).
#[test]
fn fire_all_rule_axis_runs_every_fired_cell_and_keeps_the_last_value() {
  let mut axis = Axis::new(1, "tier", AxisType::Rule, ValueType::Expression, Order::Display, true).unwrap();
  let a = axis.add_rule_column(Arc::new(AlwaysTrue), meta("A")).unwrap();
  let b = axis.add_rule_column(Arc::new(AlwaysTrue), meta("B")).unwrap();

  let mut cube = Cube::new("tiers", "demo");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[a], CellValue::Value(Value::String("first".into()))).unwrap();
  cube.set_cell(&[b], CellValue::Value(Value::String("second".into()))).unwrap();

  assert_eq!(eval(&cube, &[("amount", Value::Long(1))]).unwrap(), Value::String("second".into()));
}
