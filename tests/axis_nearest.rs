use indexmap::IndexMap;
use ncube::axis::{Axis, AxisType, Order};
use ncube::error::CoreError;
use ncube::value::{LatLon, Value, ValueType};

#[test]
fn nearest_returns_closest_by_great_circle_distance() {
  let mut axis = Axis::new(1, "city", AxisType::Nearest, ValueType::LatLon, Order::Sorted, false).unwrap();
  let nyc = axis.add_column(Value::LatLon(LatLon::new(40.71, -74.00)), IndexMap::new()).unwrap();
  axis.add_column(Value::LatLon(LatLon::new(34.05, -118.24)), IndexMap::new()).unwrap();

  // Chicago is closer to NYC than to LA.
  let chicago = Value::LatLon(LatLon::new(41.88, -87.63));
  assert_eq!(axis.find(&chicago).unwrap(), Some(nyc));
}

#[test]
fn nearest_on_long_uses_absolute_difference() {
  let mut axis = Axis::new(1, "bucket", AxisType::Nearest, ValueType::Long, Order::Sorted, false).unwrap();
  let low = axis.add_column(Value::Long(10), IndexMap::new()).unwrap();
  let high = axis.add_column(Value::Long(100), IndexMap::new()).unwrap();

  assert_eq!(axis.find(&Value::Long(20)).unwrap(), Some(low));
  assert_eq!(axis.find(&Value::Long(90)).unwrap(), Some(high));
}

#[test]
fn default_column_is_disallowed_on_nearest_axes() {
  let mut axis = Axis::new(1, "city", AxisType::Nearest, ValueType::LatLon, Order::Sorted, false).unwrap();
  let err = axis.set_default_column(IndexMap::new()).unwrap_err();
  assert!(matches!(err, CoreError::InvalidOperation { .. }));
}
