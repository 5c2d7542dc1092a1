use indexmap::IndexMap;
use ncube::axis::{Axis, AxisType, Order};
use ncube::error::CoreError;
use ncube::value::{Value, ValueType};

fn discrete_axis() -> Axis {
  Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap()
}

#[test]
fn binary_search_finds_exact_match() {
  let mut axis = discrete_axis();
  let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  axis.add_column(Value::String("green".into()), IndexMap::new()).unwrap();
  axis.add_column(Value::String("blue".into()), IndexMap::new()).unwrap();

  let found = axis.find(&Value::String("red".into())).unwrap();
  assert_eq!(found, Some(red));
}

#[test]
fn miss_returns_default_column_when_present() {
  let mut axis = discrete_axis();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let default_id = axis.set_default_column(IndexMap::new()).unwrap();

  let found = axis.find(&Value::String("purple".into())).unwrap();
  assert_eq!(found, Some(default_id));
}

#[test]
fn miss_returns_none_without_default() {
  let mut axis = discrete_axis();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();

  let found = axis.find(&Value::String("purple".into())).unwrap();
  assert_eq!(found, None);
}

#[test]
fn duplicate_value_is_rejected() {
  let mut axis = discrete_axis();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  let err = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap_err();
  assert!(matches!(err, CoreError::DuplicateColumn { .. }));
}

#[test]
fn binary_search_matches_linear_search_on_sorted_axis() {
  let mut axis = discrete_axis();
  let names = ["delta", "alpha", "charlie", "bravo", "echo"];
  for name in names {
    axis.add_column(Value::String(name.into()), IndexMap::new()).unwrap();
  }
  for name in names {
    let key = Value::String(name.into());
    let via_find = axis.find(&key).unwrap();
    let via_linear = axis.columns().iter().find(|c| c.value.as_ref() == Some(&key)).map(|c| c.id);
    assert_eq!(via_find, via_linear, "mismatch for {name}");
  }
}

#[test]
fn default_column_always_sorts_last_with_max_display_order() {
  let mut axis = discrete_axis();
  axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
  axis.set_default_column(IndexMap::new()).unwrap();
  let last = axis.columns().last().unwrap();
  assert!(last.is_default);
  assert_eq!(last.display_order, i32::MAX);
}
