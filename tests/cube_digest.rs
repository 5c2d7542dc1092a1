use indexmap::IndexMap;
use ncube::axis::{Axis, AxisType, Order};
use ncube::cube::Cube;
use ncube::executor::CellValue;
use ncube::value::{Value, ValueType};

fn build(axis_order: [&str; 2]) -> Cube {
  let mut cube = Cube::new("demo", "app");
  for name in axis_order {
    let mut axis = Axis::new(
      if name == "color" { 1 } else { 2 },
      name,
      AxisType::Discrete,
      ValueType::String,
      Order::Sorted,
      false,
    )
    .unwrap();
    let a = axis.add_column(Value::String("a".into()), IndexMap::new()).unwrap();
    let b = axis.add_column(Value::String("b".into()), IndexMap::new()).unwrap();
    cube.add_axis(axis).unwrap();
    let axis_name = name.to_string();
    let _ = (a, b, axis_name);
  }
  cube
}

#[test]
fn digest_is_independent_of_axis_insertion_order() {
  let cube_a = build(["color", "size"]);
  let cube_b = build(["size", "color"]);
  assert_eq!(cube_a.digest(), cube_b.digest());
}

#[test]
fn digest_changes_when_a_column_value_changes() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  let before = cube.digest();

  cube.update_column("color", red, Value::String("crimson".into())).unwrap();
  let after = cube.digest();
  assert_ne!(before, after);
}

#[test]
fn digest_changes_when_a_cell_value_changes() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  let before = cube.digest();

  cube.set_cell(&[red], CellValue::Value(Value::Long(2))).unwrap();
  let after = cube.digest();
  assert_ne!(before, after);
}

#[test]
fn update_column_with_the_same_value_is_a_sha1_no_op() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  let before = cube.digest();

  cube.update_column("color", red, Value::String("red".into())).unwrap();
  let after = cube.digest();
  assert_eq!(before, after);
}

#[test]
fn digest_changes_when_the_cube_is_renamed() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  let before = cube.digest();

  cube.name = "renamed".to_string();
  let after = cube.digest();
  assert_ne!(before, after);
}

#[test]
fn digest_changes_when_cube_meta_changes() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  let before = cube.digest();

  cube.meta.insert("owner".to_string(), "billing".to_string());
  let after = cube.digest();
  assert_ne!(before, after);
}

#[test]
fn add_axis_or_remove_axis_clears_all_cells() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  assert_eq!(cube.cell_count(), 1);

  let mut axis2 = Axis::new(2, "size", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  axis2.add_column(Value::String("small".into()), IndexMap::new()).unwrap();
  cube.add_axis(axis2).unwrap();
  assert_eq!(cube.cell_count(), 0);
}

#[test]
fn delete_column_drops_every_cell_that_references_it() {
  let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let green = axis.add_column(Value::String("green".into()), IndexMap::new()).unwrap();
  let mut cube = Cube::new("demo", "app");
  cube.add_axis(axis).unwrap();
  cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
  cube.set_cell(&[green], CellValue::Value(Value::Long(2))).unwrap();
  assert_eq!(cube.cell_count(), 2);

  cube.delete_column("color", red).unwrap();
  assert_eq!(cube.cell_count(), 1);
  assert!(cube.cell(&[red]).is_none());
}
