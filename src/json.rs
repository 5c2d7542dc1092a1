//! JSON import/export of cubes (spec §6).
//!
//! The wire format persists `ncube` (name), `axes[]` (each with `name`,
//! `type`, `valueType`, `hasDefault`, `preferredOrder`, `fireAll`,
//! `columns[]`), and `cells[]` (each carrying a set of column ids, a value,
//! optional `type`/`url`/`cache`). The core accepts arbitrary ordering of
//! columns inside each axis and re-sorts on import (spec §6); compiling a
//! `type`/`url`/`cmd` cell into something runnable is the scripting
//! runtime's job (spec §1 keeps it an external collaborator) — this module
//! bridges raw command-cell rows into runnable cells through an optional
//! [`CellCompiler`], and otherwise imports everything losslessly as plain
//! values.
//!
//! Per spec §9 Open Questions, a stored `sha1` field on the wire payload is
//! never trusted: import always recomputes the digest after construction
//! and only logs when the two disagree.

use crate::axis::{Axis, AxisType, Order};
use crate::column::ColumnId;
use crate::cube::Cube;
use crate::error::{CoreError, CoreResult};
use crate::executor::{CellValue, Executable};
use crate::value::{LatLon, Point3D, Range, RangeSet, RangeSetMember, Value, ValueType};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Wire representation of a [`Value`] (spec §3/§6). Tagged so the format is
/// self-describing independent of the axis's declared `valueType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JsonValue {
  String { value: String },
  Long { value: i64 },
  Double { value: f64 },
  BigDecimal { value: String },
  Date { value: String },
  LatLon { lat: f64, lon: f64 },
  Point3D { x: f64, y: f64, z: f64 },
  Comparable { value: String },
  Range { low: Box<JsonValue>, high: Box<JsonValue> },
  RangeSet { members: Vec<JsonRangeSetMember> },
  Boolean { value: bool },
  Collection { items: Vec<JsonValue> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JsonRangeSetMember {
  Discrete { value: JsonValue },
  Range { low: JsonValue, high: JsonValue },
}

impl JsonValue {
  fn to_value(&self) -> CoreResult<Value> {
    Ok(match self {
      JsonValue::String { value } => Value::String(value.clone()),
      JsonValue::Long { value } => Value::Long(*value),
      JsonValue::Double { value } => Value::Double(ordered_float::OrderedFloat(*value)),
      JsonValue::BigDecimal { value } => Value::BigDecimal(
        Decimal::from_str(value).map_err(|e| CoreError::Json(format!("bad BigDecimal {value}: {e}")))?,
      ),
      JsonValue::Date { value } => Value::Date(
        chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
          .map_err(|e| CoreError::Json(format!("bad Date {value}: {e}")))?,
      ),
      JsonValue::LatLon { lat, lon } => Value::LatLon(LatLon::new(*lat, *lon)),
      JsonValue::Point3D { x, y, z } => Value::Point3D(Point3D::new(*x, *y, *z)),
      JsonValue::Comparable { value } => {
        crate::value::promote(ValueType::Comparable, Value::String(value.clone()))?
      }
      JsonValue::Range { low, high } => {
        Value::Range(Range::new(low.to_value()?, high.to_value()?))
      }
      JsonValue::RangeSet { members } => {
        let mut out = Vec::with_capacity(members.len());
        for m in members {
          out.push(match m {
            JsonRangeSetMember::Discrete { value } => RangeSetMember::Discrete(value.to_value()?),
            JsonRangeSetMember::Range { low, high } => {
              RangeSetMember::Range(Range::new(low.to_value()?, high.to_value()?))
            }
          });
        }
        Value::RangeSet(RangeSet::new(out))
      }
      JsonValue::Boolean { value } => Value::Boolean(*value),
      JsonValue::Collection { items } => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.push(item.to_value()?);
        }
        Value::Collection(out)
      }
    })
  }

  fn from_value(value: &Value) -> Self {
    match value {
      Value::String(s) => JsonValue::String { value: s.clone() },
      Value::Long(n) => JsonValue::Long { value: *n },
      Value::Double(d) => JsonValue::Double { value: d.0 },
      Value::BigDecimal(d) => JsonValue::BigDecimal { value: d.to_string() },
      Value::Date(d) => JsonValue::Date { value: d.format("%Y-%m-%d").to_string() },
      Value::LatLon(v) => JsonValue::LatLon { lat: v.lat.0, lon: v.lon.0 },
      Value::Point3D(v) => JsonValue::Point3D { x: v.x.0, y: v.y.0, z: v.z.0 },
      Value::Comparable(v) => JsonValue::Comparable { value: v.to_string() },
      Value::Expression(_) => JsonValue::String { value: String::new() },
      Value::Range(r) => JsonValue::Range {
        low: Box::new(JsonValue::from_value(&r.low)),
        high: Box::new(JsonValue::from_value(&r.high)),
      },
      Value::RangeSet(rs) => JsonValue::RangeSet {
        members: rs
          .members
          .iter()
          .map(|m| match m {
            RangeSetMember::Discrete(v) => JsonRangeSetMember::Discrete { value: JsonValue::from_value(v) },
            RangeSetMember::Range(r) => JsonRangeSetMember::Range {
              low: JsonValue::from_value(&r.low),
              high: JsonValue::from_value(&r.high),
            },
          })
          .collect(),
      },
      Value::Boolean(b) => JsonValue::Boolean { value: *b },
      Value::Collection(items) => {
        JsonValue::Collection { items: items.iter().map(JsonValue::from_value).collect() }
      }
    }
  }
}

/// Raw, uncompiled description of a command cell (spec §6's `type`/`url`/
/// `cmd` cell fields). The core hands this to a [`CellCompiler`] rather
/// than interpreting it itself.
#[derive(Debug, Clone)]
pub struct RawCommand<'a> {
  pub cell_type: Option<&'a str>,
  pub url: Option<&'a str>,
  pub cmd: Option<&'a str>,
  pub cacheable: bool,
}

/// Bridges a wire-format command-cell row into something the cube can run.
/// The core ships no implementation — compiling/dispatching expressions is
/// the embedded scripting runtime's concern (spec §1/§6) — but import needs
/// *some* collaborator to turn `type`/`url`/`cmd` rows into an
/// [`Executable`].
pub trait CellCompiler {
  fn compile(&self, raw: &RawCommand<'_>) -> CoreResult<Arc<dyn Executable>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonColumn {
  id: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  value: Option<JsonValue>,
  display_order: i32,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  meta: IndexMap<String, String>,
  #[serde(default)]
  is_default: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  cell_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  cmd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonAxis {
  name: String,
  #[serde(rename = "type")]
  axis_type: String,
  value_type: String,
  has_default: bool,
  preferred_order: String,
  #[serde(default)]
  fire_all: bool,
  #[serde(default)]
  meta: IndexMap<String, String>,
  columns: Vec<JsonColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCell {
  column_ids: Vec<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  value: Option<JsonValue>,
  #[serde(skip_serializing_if = "Option::is_none")]
  cell_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  cmd: Option<String>,
  #[serde(default, skip_serializing_if = "is_false")]
  cache: bool,
}

fn is_false(b: &bool) -> bool {
  !*b
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCube {
  ncube: String,
  #[serde(default)]
  meta: IndexMap<String, String>,
  axes: Vec<JsonAxis>,
  cells: Vec<JsonCell>,
  #[serde(skip_serializing_if = "Option::is_none")]
  default_value: Option<JsonCell>,
  /// Written on export for human/tooling convenience; never trusted on
  /// import (spec §9 Open Questions) — the digest is always recomputed.
  #[serde(skip_serializing_if = "Option::is_none")]
  sha1: Option<String>,
}

fn axis_type_to_str(t: AxisType) -> &'static str {
  match t {
    AxisType::Discrete => "DISCRETE",
    AxisType::Range => "RANGE",
    AxisType::Set => "SET",
    AxisType::Nearest => "NEAREST",
    AxisType::Rule => "RULE",
  }
}

fn axis_type_from_str(s: &str) -> CoreResult<AxisType> {
  Ok(match s.to_ascii_uppercase().as_str() {
    "DISCRETE" => AxisType::Discrete,
    "RANGE" => AxisType::Range,
    "SET" => AxisType::Set,
    "NEAREST" => AxisType::Nearest,
    "RULE" => AxisType::Rule,
    other => return Err(CoreError::Json(format!("unknown axis type `{other}`"))),
  })
}

fn value_type_to_str(t: ValueType) -> &'static str {
  match t {
    ValueType::String => "STRING",
    ValueType::Long => "LONG",
    ValueType::Double => "DOUBLE",
    ValueType::BigDecimal => "BIG_DECIMAL",
    ValueType::Date => "DATE",
    ValueType::LatLon => "LAT_LON",
    ValueType::Point3D => "POINT3D",
    ValueType::Comparable => "COMPARABLE",
    ValueType::Expression => "EXPRESSION",
  }
}

fn value_type_from_str(s: &str) -> CoreResult<ValueType> {
  Ok(match s.to_ascii_uppercase().replace('-', "_").as_str() {
    "STRING" => ValueType::String,
    "LONG" => ValueType::Long,
    "DOUBLE" => ValueType::Double,
    "BIG_DECIMAL" | "BIGDECIMAL" => ValueType::BigDecimal,
    "DATE" => ValueType::Date,
    "LAT_LON" | "LATLON" => ValueType::LatLon,
    "POINT3D" | "POINT_3_D" => ValueType::Point3D,
    "COMPARABLE" => ValueType::Comparable,
    "EXPRESSION" => ValueType::Expression,
    other => return Err(CoreError::Json(format!("unknown value type `{other}`"))),
  })
}

fn raw_command<'a>(cell_type: &'a Option<String>, url: &'a Option<String>, cmd: &'a Option<String>, cache: bool) -> RawCommand<'a> {
  RawCommand {
    cell_type: cell_type.as_deref(),
    url: url.as_deref(),
    cmd: cmd.as_deref(),
    cacheable: cache,
  }
}

/// Imports a cube from its JSON wire form (spec §6). `app_id` scopes the
/// constructed cube the same way it scopes persistence calls; `compiler`
/// is consulted for any column/cell carrying `type`/`url`/`cmd` and may be
/// omitted for cubes with no command cells.
pub fn import(json: &str, app_id: &str, compiler: Option<&dyn CellCompiler>) -> CoreResult<Cube> {
  let parsed: JsonCube = serde_json::from_str(json).map_err(|e| CoreError::Json(e.to_string()))?;
  let mut cube = Cube::new(parsed.ncube.clone(), app_id.to_string());
  cube.meta = parsed.meta;

  // json-side column id -> real ColumnId, used to translate cell references.
  let mut id_map: HashMap<i64, ColumnId> = HashMap::new();

  for (axis_idx, jaxis) in parsed.axes.iter().enumerate() {
    let axis_type = axis_type_from_str(&jaxis.axis_type)?;
    let value_type = value_type_from_str(&jaxis.value_type)?;
    let order = match jaxis.preferred_order.to_ascii_uppercase().as_str() {
      "SORTED" => Order::Sorted,
      "DISPLAY" => Order::Display,
      other => return Err(CoreError::Json(format!("unknown order `{other}`"))),
    };
    let mut axis = Axis::new(
      (axis_idx + 1) as u64,
      jaxis.name.clone(),
      axis_type,
      value_type,
      order,
      jaxis.fire_all,
    )?;
    axis.meta = jaxis.meta.clone();

    // The core accepts arbitrary column ordering inside an axis and
    // re-sorts on import (spec §6); we sort by display_order here only so
    // RULE axes (order = DISPLAY) fire in the declared sequence, not the
    // arrival order of the JSON array.
    let mut columns: Vec<&JsonColumn> = jaxis.columns.iter().collect();
    columns.sort_by_key(|c| c.display_order);

    for jcol in columns {
      if jcol.is_default {
        let id = axis.set_default_column(jcol.meta.clone())?;
        id_map.insert(jcol.id, id);
        continue;
      }
      if axis_type == AxisType::Rule {
        let compiler = compiler.ok_or_else(|| {
          CoreError::Json(format!(
            "axis `{}` has RULE column `{}` but no CellCompiler was supplied",
            jaxis.name, jcol.id
          ))
        })?;
        let raw = raw_command(&jcol.cell_type, &jcol.url, &jcol.cmd, true);
        let executable = compiler.compile(&raw)?;
        let id = axis.add_rule_column(executable, jcol.meta.clone())?;
        id_map.insert(jcol.id, id);
        continue;
      }
      let value = jcol
        .value
        .as_ref()
        .ok_or_else(|| CoreError::Json(format!("column `{}` is missing a value", jcol.id)))?
        .to_value()?;
      let id = axis.add_column(value, jcol.meta.clone())?;
      id_map.insert(jcol.id, id);
    }

    cube.add_axis(axis)?;
  }

  for jcell in &parsed.cells {
    let coordinate: Vec<ColumnId> = jcell
      .column_ids
      .iter()
      .map(|jid| {
        id_map
          .get(jid)
          .copied()
          .ok_or_else(|| CoreError::Json(format!("cell references unknown column id {jid}")))
      })
      .collect::<CoreResult<_>>()?;
    let cell_value = decode_cell_value(jcell, compiler)?;
    cube.set_cell(&coordinate, cell_value)?;
  }

  if let Some(jdefault) = &parsed.default_value {
    cube.default_value = Some(decode_cell_value(jdefault, compiler)?);
  }

  if let Some(stored) = &parsed.sha1 {
    let computed = cube.digest();
    if stored != &computed {
      tracing::warn!(
        cube = %cube.name,
        stored_sha1 = %stored,
        computed_sha1 = %computed,
        "imported cube's stored sha1 does not match the recomputed digest; recomputed value wins"
      );
    }
  }

  Ok(cube)
}

fn decode_cell_value(jcell: &JsonCell, compiler: Option<&dyn CellCompiler>) -> CoreResult<CellValue> {
  if jcell.cell_type.is_some() || jcell.url.is_some() || jcell.cmd.is_some() {
    let compiler = compiler
      .ok_or_else(|| CoreError::Json("cell carries type/url/cmd but no CellCompiler was supplied".to_string()))?;
    let raw = raw_command(&jcell.cell_type, &jcell.url, &jcell.cmd, jcell.cache);
    return Ok(CellValue::Command(compiler.compile(&raw)?));
  }
  let value = jcell
    .value
    .as_ref()
    .ok_or_else(|| CoreError::Json("cell has neither a value nor a command".to_string()))?
    .to_value()?;
  Ok(CellValue::Value(value))
}

/// Exports `cube` to its JSON wire form (spec §6), recomputing the digest
/// so the written `sha1` field is always authoritative at write time.
pub fn export(cube: &Cube) -> CoreResult<String> {
  let mut axes = Vec::new();
  for axis in cube.axes() {
    let mut columns = Vec::new();
    for column in axis.columns() {
      columns.push(JsonColumn {
        id: column.id.0 as i64,
        value: column.value.as_ref().map(JsonValue::from_value),
        display_order: column.display_order,
        meta: column.meta.clone(),
        is_default: column.is_default,
        cell_type: None,
        url: None,
        cmd: None,
      });
    }
    axes.push(JsonAxis {
      name: axis.name.clone(),
      axis_type: axis_type_to_str(axis.axis_type).to_string(),
      value_type: value_type_to_str(axis.value_type).to_string(),
      has_default: axis.has_default(),
      preferred_order: match axis.order {
        Order::Sorted => "SORTED".to_string(),
        Order::Display => "DISPLAY".to_string(),
      },
      fire_all: axis.fire_all,
      meta: axis.meta.clone(),
      columns,
    });
  }

  let mut cells = Vec::new();
  for (key, value) in cube.cell_entries() {
    let column_ids: Vec<i64> = key.iter().map(|id| id.0 as i64).collect();
    cells.push(match value {
      CellValue::Value(v) => JsonCell {
        column_ids,
        value: Some(JsonValue::from_value(v)),
        cell_type: None,
        url: None,
        cmd: None,
        cache: false,
      },
      CellValue::Command(_) => JsonCell {
        column_ids,
        value: None,
        cell_type: Some("command".to_string()),
        url: None,
        cmd: None,
        cache: false,
      },
    });
  }

  let default_value = cube.default_value.as_ref().map(|v| match v {
    CellValue::Value(v) => JsonCell {
      column_ids: Vec::new(),
      value: Some(JsonValue::from_value(v)),
      cell_type: None,
      url: None,
      cmd: None,
      cache: false,
    },
    CellValue::Command(_) => JsonCell {
      column_ids: Vec::new(),
      value: None,
      cell_type: Some("command".to_string()),
      url: None,
      cmd: None,
      cache: false,
    },
  });

  let dto = JsonCube {
    ncube: cube.name.clone(),
    meta: cube.meta.clone(),
    axes,
    cells,
    default_value,
    sha1: Some(cube.digest()),
  };
  serde_json::to_string_pretty(&dto).map_err(|e| CoreError::Json(e.to_string()))
}
