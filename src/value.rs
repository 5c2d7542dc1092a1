//! Typed, promoted comparable values (spec §3/§4.1, component C1).
//!
//! Every value stored on an axis is promoted to that axis's declared
//! [`ValueType`] before it is compared, sorted, or stored. Promotion and
//! standardization are total, deterministic functions over [`Value`] — they
//! never depend on axis mutation order.

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque handle to a compiled/dispatched command cell.
///
/// The core does not know how expressions are compiled; it only needs a
/// stable, comparable, cloneable identity for them so they can sit in a
/// `Value` and participate in axis storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExpressionHandle(pub u64);

/// Latitude/longitude pair, compared with total ordering via `OrderedFloat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LatLon {
  pub lat: OrderedFloat<f64>,
  pub lon: OrderedFloat<f64>,
}

impl LatLon {
  pub fn new(lat: f64, lon: f64) -> Self {
    LatLon { lat: OrderedFloat(lat), lon: OrderedFloat(lon) }
  }

  /// Great-circle distance in kilometers (haversine).
  pub fn great_circle_distance(&self, other: &LatLon) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1) = (self.lat.0.to_radians(), self.lon.0.to_radians());
    let (lat2, lon2) = (other.lat.0.to_radians(), other.lon.0.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2)
      + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
  }
}

impl fmt::Display for LatLon {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.lat.0, self.lon.0)
  }
}

/// A 3D point, compared with total ordering via `OrderedFloat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point3D {
  pub x: OrderedFloat<f64>,
  pub y: OrderedFloat<f64>,
  pub z: OrderedFloat<f64>,
}

impl Point3D {
  pub fn new(x: f64, y: f64, z: f64) -> Self {
    Point3D { x: OrderedFloat(x), y: OrderedFloat(y), z: OrderedFloat(z) }
  }

  pub fn euclidean_distance(&self, other: &Point3D) -> f64 {
    let dx = self.x.0 - other.x.0;
    let dy = self.y.0 - other.y.0;
    let dz = self.z.0 - other.z.0;
    (dx * dx + dy * dy + dz * dz).sqrt()
  }
}

impl fmt::Display for Point3D {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{},{}", self.x.0, self.y.0, self.z.0)
  }
}

/// The polymorphic `Comparable` bucket: a scalar whose concrete subtype is
/// decided at promotion time from the raw input's shape (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComparableValue {
  LatLon(LatLon),
  Point3D(Point3D),
  /// Anything else comparable that doesn't fit the two recognized shapes;
  /// kept as its textual form so it remains `Ord`.
  Text(String),
}

impl fmt::Display for ComparableValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ComparableValue::LatLon(v) => write!(f, "{v}"),
      ComparableValue::Point3D(v) => write!(f, "{v}"),
      ComparableValue::Text(v) => write!(f, "{v}"),
    }
  }
}

/// A half-open `[low, high)` range over scalar values (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
  pub low: Box<Value>,
  pub high: Box<Value>,
}

impl Range {
  pub fn new(low: Value, high: Value) -> Self {
    if low <= high {
      Range { low: Box::new(low), high: Box::new(high) }
    } else {
      Range { low: Box::new(high), high: Box::new(low) }
    }
  }

  /// `-1` if `key < low`, `0` if `low <= key < high`, `+1` if `key >= high`.
  pub fn contains_ordering(&self, key: &Value) -> i32 {
    if key < self.low.as_ref() {
      -1
    } else if key < self.high.as_ref() {
      0
    } else {
      1
    }
  }

  pub fn contains(&self, key: &Value) -> bool {
    self.contains_ordering(key) == 0
  }

  /// `true` iff the two half-open ranges overlap: `a.low < b.high && b.low < a.high`.
  pub fn overlaps(&self, other: &Range) -> bool {
    self.low < other.high && other.low < self.high
  }
}

/// An ordered sequence of discrete values and/or ranges (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RangeSet {
  pub members: Vec<RangeSetMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RangeSetMember {
  Discrete(Value),
  Range(Range),
}

impl RangeSet {
  pub fn new(members: Vec<RangeSetMember>) -> Self {
    RangeSet { members }
  }

  pub fn contains(&self, key: &Value) -> bool {
    self.members.iter().any(|m| match m {
      RangeSetMember::Discrete(v) => v == key,
      RangeSetMember::Range(r) => r.contains(key),
    })
  }

  /// Pairwise overlap test used by SET axis invariant maintenance (spec §4.2).
  pub fn overlaps(&self, other: &RangeSet) -> bool {
    for a in &self.members {
      for b in &other.members {
        let hit = match (a, b) {
          (RangeSetMember::Discrete(x), RangeSetMember::Discrete(y)) => x == y,
          (RangeSetMember::Discrete(x), RangeSetMember::Range(r))
          | (RangeSetMember::Range(r), RangeSetMember::Discrete(x)) => r.contains(x),
          (RangeSetMember::Range(r1), RangeSetMember::Range(r2)) => r1.overlaps(r2),
        };
        if hit {
          return true;
        }
      }
    }
    false
  }
}

/// The canonical type an axis declares for its columns (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
  String,
  Long,
  Double,
  BigDecimal,
  Date,
  LatLon,
  Point3D,
  Comparable,
  Expression,
}

/// One of the value kinds a column can hold (spec §3).
///
/// `Boolean` and `Collection` never arrive as an axis's declared `ValueType`
/// (no axis is typed `BOOLEAN`); they exist so a command cell's result
/// (`Executable::execute`, spec §4.5 "returns any") can actually carry a
/// bare true/false or an enumerable, which the truthiness table (§4.4) has
/// dedicated rows for. A plain stored cell may also hold one directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
  String(String),
  Long(i64),
  Double(OrderedFloat<f64>),
  BigDecimal(Decimal),
  Date(NaiveDate),
  LatLon(LatLon),
  Point3D(Point3D),
  Comparable(ComparableValue),
  Expression(ExpressionHandle),
  Range(Range),
  RangeSet(RangeSet),
  Boolean(bool),
  Collection(Vec<Value>),
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::String(s) => write!(f, "{s}"),
      Value::Long(n) => write!(f, "{n}"),
      Value::Double(d) => write!(f, "{}", d.0),
      Value::BigDecimal(d) => write!(f, "{d}"),
      Value::Date(d) => write!(f, "{d}"),
      Value::LatLon(v) => write!(f, "{v}"),
      Value::Point3D(v) => write!(f, "{v}"),
      Value::Comparable(v) => write!(f, "{v}"),
      Value::Expression(h) => write!(f, "expr#{}", h.0),
      Value::Range(r) => write!(f, "[{},{})", r.low, r.high),
      Value::RangeSet(_) => write!(f, "{{range-set}}"),
      Value::Boolean(b) => write!(f, "{b}"),
      Value::Collection(items) => {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ",")?;
          }
          write!(f, "{item}")?;
        }
        write!(f, "]")
      }
    }
  }
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_long(&self) -> Option<i64> {
    match self {
      Value::Long(n) => Some(*n),
      _ => None,
    }
  }

  pub fn is_expression(&self) -> bool {
    matches!(self, Value::Expression(_))
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  fn conversion_error(&self, target: ValueType) -> CoreError {
    CoreError::ValueConversion { raw: self.to_string(), target }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

/// Parses `"a,b"` into a `LatLon`, or `None` if the shape doesn't match.
fn parse_lat_lon(s: &str) -> Option<LatLon> {
  let parts: Vec<&str> = s.split(',').map(str::trim).collect();
  if parts.len() != 2 {
    return None;
  }
  let lat = parts[0].parse::<f64>().ok()?;
  let lon = parts[1].parse::<f64>().ok()?;
  Some(LatLon::new(lat, lon))
}

/// Parses `"a,b,c"` into a `Point3D`, or `None` if the shape doesn't match.
fn parse_point3d(s: &str) -> Option<Point3D> {
  let parts: Vec<&str> = s.split(',').map(str::trim).collect();
  if parts.len() != 3 {
    return None;
  }
  let x = parts[0].parse::<f64>().ok()?;
  let y = parts[1].parse::<f64>().ok()?;
  let z = parts[2].parse::<f64>().ok()?;
  Some(Point3D::new(x, y, z))
}

/// Maps any incoming value to the canonical type of an axis (spec §4.1).
///
/// Promotion is total and deterministic: it either returns the promoted
/// value or a [`CoreError::ValueConversion`]. `Expression`/`Comparable`
/// targets are the identity for inputs that already match, with
/// `Comparable` additionally attempting the `LatLon`/`Point3D` textual
/// parse described in spec §4.1.
pub fn promote(value_type: ValueType, raw: Value) -> CoreResult<Value> {
  use Value::*;
  match (value_type, &raw) {
    (ValueType::String, String(_)) => Ok(raw),
    (ValueType::String, _) => Ok(Value::String(raw.to_string())),

    (ValueType::Long, Long(_)) => Ok(raw),
    (ValueType::Long, Double(d)) => Ok(Value::Long(d.0.round() as i64)),
    (ValueType::Long, BigDecimal(d)) => d
      .to_string()
      .parse::<i64>()
      .map(Value::Long)
      .map_err(|_| raw.conversion_error(ValueType::Long)),
    (ValueType::Long, String(s)) => {
      s.trim().parse::<i64>().map(Value::Long).map_err(|_| raw.conversion_error(ValueType::Long))
    }
    (ValueType::Long, _) => Err(raw.conversion_error(ValueType::Long)),

    (ValueType::Double, Double(_)) => Ok(raw),
    (ValueType::Double, Long(n)) => Ok(Value::Double(OrderedFloat(*n as f64))),
    (ValueType::Double, BigDecimal(d)) => d
      .to_string()
      .parse::<f64>()
      .map(|f| Value::Double(OrderedFloat(f)))
      .map_err(|_| raw.conversion_error(ValueType::Double)),
    (ValueType::Double, String(s)) => s
      .trim()
      .parse::<f64>()
      .map(|f| Value::Double(OrderedFloat(f)))
      .map_err(|_| raw.conversion_error(ValueType::Double)),
    (ValueType::Double, _) => Err(raw.conversion_error(ValueType::Double)),

    (ValueType::BigDecimal, BigDecimal(_)) => Ok(raw),
    (ValueType::BigDecimal, Long(n)) => Ok(Value::BigDecimal(Decimal::from(*n))),
    (ValueType::BigDecimal, Double(d)) => Decimal::from_str(&d.0.to_string())
      .map(Value::BigDecimal)
      .map_err(|_| raw.conversion_error(ValueType::BigDecimal)),
    (ValueType::BigDecimal, String(s)) => Decimal::from_str(s.trim())
      .map(Value::BigDecimal)
      .map_err(|_| raw.conversion_error(ValueType::BigDecimal)),
    (ValueType::BigDecimal, _) => Err(raw.conversion_error(ValueType::BigDecimal)),

    (ValueType::Date, Date(_)) => Ok(raw),
    (ValueType::Date, Long(millis)) => {
      let days = millis.div_euclid(86_400_000);
      NaiveDate::from_num_days_from_ce_opt((days + 719_163) as i32)
        .map(Value::Date)
        .ok_or_else(|| raw.conversion_error(ValueType::Date))
    }
    (ValueType::Date, String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
      .or_else(|_| NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y"))
      .map(Value::Date)
      .map_err(|_| raw.conversion_error(ValueType::Date)),
    (ValueType::Date, _) => Err(raw.conversion_error(ValueType::Date)),

    (ValueType::LatLon, LatLon(_)) => Ok(raw),
    (ValueType::LatLon, String(s)) => {
      parse_lat_lon(s).map(Value::LatLon).ok_or_else(|| raw.conversion_error(ValueType::LatLon))
    }
    (ValueType::LatLon, _) => Err(raw.conversion_error(ValueType::LatLon)),

    (ValueType::Point3D, Point3D(_)) => Ok(raw),
    (ValueType::Point3D, String(s)) => {
      parse_point3d(s).map(Value::Point3D).ok_or_else(|| raw.conversion_error(ValueType::Point3D))
    }
    (ValueType::Point3D, _) => Err(raw.conversion_error(ValueType::Point3D)),

    // Comparable and Expression are promoted as the identity; Comparable
    // additionally accepts the LatLon/Point3D textual shapes (spec §4.1).
    (ValueType::Comparable, Comparable(_)) => Ok(raw),
    (ValueType::Comparable, LatLon(v)) => Ok(Value::Comparable(ComparableValue::LatLon(*v))),
    (ValueType::Comparable, Point3D(v)) => Ok(Value::Comparable(ComparableValue::Point3D(*v))),
    (ValueType::Comparable, String(s)) => {
      if let Some(ll) = parse_lat_lon(s) {
        Ok(Value::Comparable(ComparableValue::LatLon(ll)))
      } else if let Some(p3) = parse_point3d(s) {
        Ok(Value::Comparable(ComparableValue::Point3D(p3)))
      } else {
        Ok(Value::Comparable(ComparableValue::Text(s.clone())))
      }
    }
    (ValueType::Comparable, _) => Ok(Value::Comparable(ComparableValue::Text(raw.to_string()))),

    (ValueType::Expression, Expression(_)) => Ok(raw),
    (ValueType::Expression, _) => Err(raw.conversion_error(ValueType::Expression)),
  }
}

/// Type-widened promotion plus axis-shape enforcement (spec §4.1).
///
/// `axis_name`/`axis_type` describe the caller axis (only used for error
/// messages and shape dispatch); `value_type` is the axis's declared type.
pub fn standardize(
  axis_name: &str,
  axis_type: crate::axis::AxisType,
  value_type: ValueType,
  raw: Option<Value>,
) -> CoreResult<Value> {
  use crate::axis::AxisType;

  let raw = raw.ok_or_else(|| CoreError::InvalidValue {
    axis: axis_name.to_string(),
    reason: "null value".to_string(),
  })?;

  match axis_type {
    AxisType::Discrete | AxisType::Nearest => promote(value_type, raw),
    AxisType::Range => match raw {
      Value::Range(r) => {
        let low = promote(value_type, *r.low)?;
        let high = promote(value_type, *r.high)?;
        Ok(Value::Range(Range::new(low, high)))
      }
      other => Err(CoreError::InvalidValue {
        axis: axis_name.to_string(),
        reason: format!("expected a Range, found {other}"),
      }),
    },
    AxisType::Set => match raw {
      Value::RangeSet(rs) => {
        let mut promoted = Vec::with_capacity(rs.members.len());
        for m in rs.members {
          promoted.push(match m {
            RangeSetMember::Discrete(v) => RangeSetMember::Discrete(promote(value_type, v)?),
            RangeSetMember::Range(r) => {
              let low = promote(value_type, *r.low)?;
              let high = promote(value_type, *r.high)?;
              RangeSetMember::Range(Range::new(low, high))
            }
          });
        }
        Ok(Value::RangeSet(RangeSet::new(promoted)))
      }
      other => Err(CoreError::InvalidValue {
        axis: axis_name.to_string(),
        reason: format!("expected a RangeSet, found {other}"),
      }),
    },
    AxisType::Rule => match raw {
      Value::Expression(_) => Ok(raw),
      other => Err(CoreError::InvalidValue {
        axis: axis_name.to_string(),
        reason: format!("expected a command cell expression, found {other}"),
      }),
    },
  }
}

/// Truthiness table used by the rule-axis evaluation loop (spec §4.4):
/// empty string/collection and zero-valued numbers are false, `Boolean` is
/// itself, everything else (dates, points, expressions, ranges...) is true.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::String(s) => !s.is_empty(),
    Value::Long(n) => *n != 0,
    Value::Double(d) => d.0 != 0.0,
    Value::BigDecimal(d) => !d.is_zero(),
    Value::Boolean(b) => *b,
    Value::Collection(items) => !items.is_empty(),
    _ => true,
  }
}
