//! Identified holder for a value plus display/sort metadata (spec §3, C2).

use crate::executor::Executable;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Axis ids are embedded in the high bits of every column id they mint
/// (spec §4.7) so `axis_of(column_id)` is a single arithmetic step.
pub const AXIS_ID_MULTIPLIER: u64 = 1_000_000_000_000;

/// Sentinel display order / id suffix for the (at most one) default column.
pub const DEFAULT_SENTINEL: u64 = i32::MAX as u64;

/// A stable, process-wide-unique column identifier.
///
/// `ColumnId(axis.id * 10^12 + counter)`, with the default column using
/// `axis.id * 10^12 + i32::MAX` (spec §4.7). Reverse-lookup of the owning
/// axis is therefore integer division, not a map probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

impl ColumnId {
  pub fn for_axis(axis_id: u64, counter: u64) -> Self {
    ColumnId(axis_id * AXIS_ID_MULTIPLIER + counter)
  }

  pub fn default_for_axis(axis_id: u64) -> Self {
    ColumnId(axis_id * AXIS_ID_MULTIPLIER + DEFAULT_SENTINEL)
  }

  /// The id of the axis that minted this column, independent of the
  /// axis's current in-memory state (spec §4.7).
  pub fn axis_id(&self) -> u64 {
    self.0 / AXIS_ID_MULTIPLIER
  }

  pub fn is_default_sentinel(&self) -> bool {
    self.0 % AXIS_ID_MULTIPLIER == DEFAULT_SENTINEL
  }
}

impl fmt::Display for ColumnId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A single matchable entity on an axis (spec §3).
///
/// `value = None` marks the *default column*: the fallback matched when no
/// other column matches. At most one per axis, and always last in sort
/// order with `display_order = i32::MAX`.
///
/// `condition` is only populated on RULE axis columns: `value` carries the
/// opaque [`crate::value::ExpressionHandle`] identity, while `condition`
/// carries the actual runnable command cell the evaluation loop invokes to
/// decide whether the column fires (spec §4.4). It never round-trips
/// through JSON — compiling an expression from its wire form is the
/// scripting runtime's job, not the core's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
  pub id: ColumnId,
  pub value: Option<Value>,
  pub display_order: i32,
  pub meta: IndexMap<String, String>,
  pub is_default: bool,
  #[serde(skip)]
  pub condition: Option<Arc<dyn Executable>>,
}

impl PartialEq for Column {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
      && self.value == other.value
      && self.display_order == other.display_order
      && self.meta == other.meta
      && self.is_default == other.is_default
  }
}

impl Column {
  pub fn new(id: ColumnId, value: Value, display_order: i32) -> Self {
    Column {
      id,
      value: Some(value),
      display_order,
      meta: IndexMap::new(),
      is_default: false,
      condition: None,
    }
  }

  pub fn default_column(id: ColumnId) -> Self {
    Column {
      id,
      value: None,
      display_order: i32::MAX,
      meta: IndexMap::new(),
      is_default: true,
      condition: None,
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.meta.get("name").map(String::as_str)
  }

  pub fn with_condition(mut self, condition: Arc<dyn Executable>) -> Self {
    self.condition = Some(condition);
    self
  }
}
