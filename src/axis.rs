//! Typed column container: the Axis (spec §3/§4.2/§4.3, component C3).
//!
//! An axis owns an ordered sequence of [`Column`]s plus the auxiliary
//! indices that keep lookups at `O(log n)` or `O(1)`. Exactly one axis type
//! is active per axis; the matching discipline (`find`/`find_multi`) and the
//! mutation invariants it enforces both follow from that type.

use crate::column::{Column, ColumnId};
use crate::error::{CoreError, CoreResult};
use crate::executor::Executable;
use crate::value::{standardize, ExpressionHandle, Range, RangeSet, RangeSetMember, Value, ValueType};
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The five matching disciplines a column container can implement (spec §1/§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisType {
  /// Discrete equality, binary search on sorted scalar values.
  Discrete,
  /// Half-open `[low, high)` ranges; no two may overlap.
  Range,
  /// Ordered sequences of discrete values and/or ranges; no two may overlap.
  Set,
  /// Nearest-neighbor match by distance; no default column allowed.
  Nearest,
  /// Rule-chain: column values are command-cell expressions evaluated in order.
  Rule,
}

/// Whether an axis's physical column order is value-sorted (for binary
/// search) or declaration/display order (for rule-firing sequence and UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
  Sorted,
  Display,
}

/// A named dimension with a typed matching discipline (spec §3).
#[derive(Debug, Clone)]
pub struct Axis {
  pub id: u64,
  pub name: String,
  pub axis_type: AxisType,
  pub value_type: ValueType,
  pub order: Order,
  pub fire_all: bool,
  pub meta: IndexMap<String, String>,

  /// Sort-order by value for `Sorted` axes; declaration order for `Display`
  /// axes (spec §3's "columns is maintained in sort order by value", with
  /// RULE's mandated `order = DISPLAY` overriding that for expressions,
  /// which have no business-meaningful total order).
  columns: Vec<Column>,
  next_counter: u64,

  id_to_col: HashMap<ColumnId, usize>,
  name_to_col: HashMap<String, usize>,
  discrete_to_col: BTreeMap<Value, usize>,
  range_to_col: Vec<(Range, usize)>,
}

impl Axis {
  pub fn new(
    id: u64,
    name: impl Into<String>,
    axis_type: AxisType,
    value_type: ValueType,
    order: Order,
    fire_all: bool,
  ) -> CoreResult<Self> {
    if axis_type == AxisType::Rule
      && (value_type != ValueType::Expression || order != Order::Display)
    {
      return Err(CoreError::InvalidOperation {
        reason: "RULE axes must declare value_type = Expression and order = Display".to_string(),
      });
    }
    Ok(Axis {
      id,
      name: name.into(),
      axis_type,
      value_type,
      order,
      fire_all,
      meta: IndexMap::new(),
      columns: Vec::new(),
      next_counter: 1,
      id_to_col: HashMap::new(),
      name_to_col: HashMap::new(),
      discrete_to_col: BTreeMap::new(),
      range_to_col: Vec::new(),
    })
  }

  pub fn columns(&self) -> &[Column] {
    &self.columns
  }

  pub fn default_column(&self) -> Option<&Column> {
    self.columns.iter().find(|c| c.is_default)
  }

  pub fn has_default(&self) -> bool {
    self.default_column().is_some()
  }

  /// Non-default columns, in the axis's physical storage order.
  fn active_columns(&self) -> &[Column] {
    match self.default_column() {
      Some(_) => &self.columns[..self.columns.len() - 1],
      None => &self.columns[..],
    }
  }

  pub fn column_by_id(&self, id: ColumnId) -> Option<&Column> {
    self.id_to_col.get(&id).map(|&i| &self.columns[i])
  }

  /// Rebuilds every auxiliary index from `columns` in a single pass (spec
  /// Design Notes: "rebuildable from the authoritative columns list").
  fn rebuild_indices(&mut self) {
    self.id_to_col.clear();
    self.name_to_col.clear();
    self.discrete_to_col.clear();
    self.range_to_col.clear();

    for (idx, col) in self.columns.iter().enumerate() {
      self.id_to_col.insert(col.id, idx);
      if let Some(name) = col.name() {
        self.name_to_col.insert(name.to_lowercase(), idx);
      }
      if self.axis_type == AxisType::Set {
        if let Some(Value::RangeSet(rs)) = &col.value {
          for member in &rs.members {
            match member {
              RangeSetMember::Discrete(v) => {
                self.discrete_to_col.insert(v.clone(), idx);
              }
              RangeSetMember::Range(r) => {
                self.range_to_col.push((r.clone(), idx));
              }
            }
          }
        }
      }
    }
    self.range_to_col.sort_by(|a, b| a.0.low.cmp(&b.0.low));
  }

  fn next_display_order(&self) -> i32 {
    self.active_columns().iter().map(|c| c.display_order).max().map(|m| m + 1).unwrap_or(0)
  }

  /// Finds the sorted insertion index for `value` among non-default columns.
  fn sorted_insert_index(&self, value: &Value) -> usize {
    let active = self.active_columns();
    active.partition_point(|c| c.value.as_ref().expect("non-default column has a value") < value)
  }

  fn insert_active(&mut self, column: Column) {
    let has_default = self.has_default();
    let insert_at = match self.order {
      Order::Sorted => self.sorted_insert_index(column.value.as_ref().expect("non-default")),
      Order::Display => self.active_columns().len(),
    };
    self.columns.insert(insert_at, column);
    debug_assert_eq!(self.has_default(), has_default);
  }

  // ---------------------------------------------------------------- mutate

  /// Adds a column, standardizing and validating `raw` against the axis's
  /// type and invariants before allocating an id (spec §4.3).
  pub fn add_column(&mut self, raw: Value, meta: IndexMap<String, String>) -> CoreResult<ColumnId> {
    let value = standardize(&self.name, self.axis_type, self.value_type, Some(raw))?;
    self.check_insertable(&value, None)?;
    if self.axis_type == AxisType::Rule && !meta.contains_key("name") {
      return Err(CoreError::InvalidValue {
        axis: self.name.clone(),
        reason: "RULE columns require a `name` meta property".to_string(),
      });
    }

    let id = ColumnId::for_axis(self.id, self.next_counter);
    self.next_counter += 1;
    let mut column = Column::new(id, value, self.next_display_order());
    column.meta = meta;
    self.insert_active(column);
    self.rebuild_indices();
    Ok(id)
  }

  /// Adds a RULE axis column: the condition is the runnable command cell
  /// evaluated every pass, while its `value` is a synthesized opaque handle
  /// used only for identity/storage (spec §4.4, §3's "command cell" shape).
  pub fn add_rule_column(
    &mut self,
    condition: Arc<dyn Executable>,
    meta: IndexMap<String, String>,
  ) -> CoreResult<ColumnId> {
    if self.axis_type != AxisType::Rule {
      return Err(CoreError::InvalidOperation {
        reason: format!("axis `{}` is not a RULE axis", self.name),
      });
    }
    if !meta.contains_key("name") {
      return Err(CoreError::InvalidValue {
        axis: self.name.clone(),
        reason: "RULE columns require a `name` meta property".to_string(),
      });
    }
    let handle_id = self.next_counter;
    let id = ColumnId::for_axis(self.id, handle_id);
    self.next_counter += 1;
    let mut column =
      Column::new(id, Value::Expression(ExpressionHandle(handle_id)), self.next_display_order())
        .with_condition(condition);
    column.meta = meta;
    self.insert_active(column);
    self.rebuild_indices();
    Ok(id)
  }

  /// Sets (replacing any existing) the axis's default column. Disallowed on
  /// NEAREST axes (spec §3 invariant).
  pub fn set_default_column(&mut self, meta: IndexMap<String, String>) -> CoreResult<ColumnId> {
    if self.axis_type == AxisType::Nearest {
      return Err(CoreError::InvalidOperation {
        reason: "NEAREST axes may not have a default column".to_string(),
      });
    }
    if let Some(existing) = self.default_column().map(|c| c.id) {
      self.delete_column(existing)?;
    }
    let id = ColumnId::default_for_axis(self.id);
    let mut column = Column::default_column(id);
    column.meta = meta;
    self.columns.push(column);
    self.rebuild_indices();
    Ok(id)
  }

  /// Deletes by id, unused if absent. Callers one layer up (the cube) are
  /// responsible for dropping cells that reference the returned column.
  pub fn delete_column(&mut self, id: ColumnId) -> CoreResult<Column> {
    let pos = self.id_to_col.get(&id).copied().ok_or_else(|| CoreError::InvalidOperation {
      reason: format!("no column with id {id} on axis `{}`", self.name),
    })?;
    let removed = self.columns.remove(pos);
    self.rebuild_indices();
    Ok(removed)
  }

  /// Replaces a column's value in place, keeping its id, display order, and
  /// meta (spec §4.3: "delete by id -> create with same id and same
  /// display_order -> re-insert in sort-order").
  pub fn update_column(&mut self, id: ColumnId, raw: Value) -> CoreResult<()> {
    let pos = self.id_to_col.get(&id).copied().ok_or_else(|| CoreError::InvalidOperation {
      reason: format!("no column with id {id} on axis `{}`", self.name),
    })?;
    if self.columns[pos].is_default {
      return Err(CoreError::InvalidOperation {
        reason: "cannot update the default column's value".to_string(),
      });
    }
    let value = standardize(&self.name, self.axis_type, self.value_type, Some(raw))?;
    let old = self.columns.remove(pos);
    if let Err(e) = self.check_insertable(&value, Some(id)) {
      // Validation failed: put the old column back so mutation is atomic.
      self.columns.insert(pos, old);
      self.rebuild_indices();
      return Err(e);
    }
    let mut replacement = Column::new(id, value, old.display_order);
    replacement.meta = old.meta;
    self.insert_active(replacement);
    self.rebuild_indices();
    Ok(())
  }

  /// Bulk edit from a display-ordered DTO (spec §4.3 `update_columns`).
  /// `edits` carries `(existing_id, new_raw_value, meta)` for surviving
  /// columns and `(None, new_raw_value, meta)` for newly added ones, in the
  /// caller's desired display order. Returns the ids of deleted columns so
  /// the cube can drop referencing cells.
  pub fn update_columns(
    &mut self,
    edits: Vec<(Option<ColumnId>, Value, IndexMap<String, String>)>,
  ) -> CoreResult<Vec<ColumnId>> {
    let incoming_ids: std::collections::HashSet<ColumnId> =
      edits.iter().filter_map(|(id, _, _)| *id).collect();
    let deleted: Vec<ColumnId> = self
      .active_columns()
      .iter()
      .map(|c| c.id)
      .filter(|id| !incoming_ids.contains(id))
      .collect();
    for id in &deleted {
      self.delete_column(*id)?;
    }

    let mut assigned_ids = Vec::with_capacity(edits.len());
    for (existing_id, raw, meta) in edits {
      match existing_id {
        Some(id) => {
          self.update_column(id, raw)?;
          if let Some(col) = self.id_to_col.get(&id).map(|&i| &mut self.columns[i]) {
            col.meta = meta;
          }
          assigned_ids.push(id);
        }
        None => {
          let id = self.add_column(raw, meta)?;
          assigned_ids.push(id);
        }
      }
    }

    // Reassign display_order from the DTO's ordering (spec §4.3).
    for (order, id) in assigned_ids.iter().enumerate() {
      if let Some(&pos) = self.id_to_col.get(id) {
        self.columns[pos].display_order = order as i32;
      }
    }
    self.rebuild_indices();
    Ok(deleted)
  }

  /// Valid only on `Display`-ordered axes; never moves the default column
  /// (spec §4.3).
  pub fn move_column(&mut self, id: ColumnId, to_index: usize) -> CoreResult<()> {
    if self.order != Order::Display {
      return Err(CoreError::InvalidOperation {
        reason: format!("axis `{}` is not display-ordered", self.name),
      });
    }
    let pos = self.id_to_col.get(&id).copied().ok_or_else(|| CoreError::InvalidOperation {
      reason: format!("no column with id {id} on axis `{}`", self.name),
    })?;
    if self.columns[pos].is_default {
      return Err(CoreError::InvalidOperation {
        reason: "the default column cannot be moved".to_string(),
      });
    }
    let active_len = self.active_columns().len();
    let to_index = to_index.min(active_len.saturating_sub(1));
    let column = self.columns.remove(pos);
    self.columns.insert(to_index, column);
    for (order, col) in self.active_columns().to_vec().iter().enumerate() {
      if let Some(&idx) = self.id_to_col.get(&col.id) {
        self.columns[idx].display_order = order as i32;
      }
    }
    self.rebuild_indices();
    Ok(())
  }

  // ----------------------------------------------------------- invariants

  /// Runs the uniqueness/overlap check appropriate to `axis_type`, excluding
  /// `ignore` (the column currently being updated, if any) from comparison.
  fn check_insertable(&self, value: &Value, ignore: Option<ColumnId>) -> CoreResult<()> {
    match (self.axis_type, value) {
      (AxisType::Discrete, _) => {
        let dup = self.active_columns().iter().any(|c| {
          Some(c.id) != ignore && c.value.as_ref() == Some(value)
        });
        if dup {
          return Err(CoreError::DuplicateColumn { axis: self.name.clone() });
        }
        Ok(())
      }
      (AxisType::Range, Value::Range(new_range)) => {
        if self.fire_all {
          return Ok(());
        }
        if self.range_overlaps_existing(new_range, ignore) {
          return Err(CoreError::AxisOverlap { axis: self.name.clone() });
        }
        Ok(())
      }
      (AxisType::Set, Value::RangeSet(new_set)) => {
        if self.fire_all {
          return Ok(());
        }
        for c in self.active_columns() {
          if Some(c.id) == ignore {
            continue;
          }
          if let Some(Value::RangeSet(existing)) = &c.value {
            if existing.overlaps(new_set) {
              return Err(CoreError::AxisOverlap { axis: self.name.clone() });
            }
          }
        }
        Ok(())
      }
      _ => Ok(()),
    }
  }

  /// Binary-search-assisted overlap scan (spec §4.2): find where `new.low`
  /// would sort, step back one, then sweep forward while the candidate's
  /// `low` is still within reach of `new.high` (past that point, sorted
  /// ascending-by-low ranges cannot overlap a half-open `new`).
  fn range_overlaps_existing(&self, new_range: &Range, ignore: Option<ColumnId>) -> bool {
    let active = self.active_columns();
    let ranges: Vec<(&Range, ColumnId)> = active
      .iter()
      .filter_map(|c| match &c.value {
        Some(Value::Range(r)) if Some(c.id) != ignore => Some((r, c.id)),
        _ => None,
      })
      .collect();
    let insertion = ranges.partition_point(|(r, _)| r.low < new_range.low);
    let start = insertion.saturating_sub(1);
    for (r, _) in &ranges[start..] {
      if r.low >= new_range.high {
        break;
      }
      if new_range.overlaps(r) {
        return true;
      }
    }
    false
  }

  // -------------------------------------------------------------- lookup

  /// Matches an already-promoted `key` against this axis's columns (spec §4.2).
  pub fn find(&self, key: &Value) -> CoreResult<Option<ColumnId>> {
    let hit = match self.axis_type {
      AxisType::Discrete => {
        let active = self.active_columns();
        active
          .binary_search_by(|c| c.value.as_ref().unwrap().cmp(key))
          .ok()
          .map(|i| active[i].id)
      }
      AxisType::Range => {
        let active = self.active_columns();
        active
          .binary_search_by(|c| match &c.value {
            Some(Value::Range(r)) => match r.contains_ordering(key) {
              0 => std::cmp::Ordering::Equal,
              n if n < 0 => std::cmp::Ordering::Greater,
              _ => std::cmp::Ordering::Less,
            },
            _ => std::cmp::Ordering::Less,
          })
          .ok()
          .map(|i| active[i].id)
      }
      AxisType::Set => self.find_set(key),
      AxisType::Nearest => self.find_nearest(key),
      AxisType::Rule => self.name_to_col.get(&key.to_string().to_lowercase()).map(|&i| self.columns[i].id),
    };
    Ok(hit.or_else(|| self.default_column().map(|c| c.id)))
  }

  fn find_set(&self, key: &Value) -> Option<ColumnId> {
    if let Some(&idx) = self.discrete_to_col.get(key) {
      return Some(self.columns[idx].id);
    }
    let insertion = self.range_to_col.partition_point(|(r, _)| *r.low < *key);
    let start = insertion.saturating_sub(1);
    for (r, idx) in &self.range_to_col[start..] {
      if *r.low > *key {
        break;
      }
      if r.contains(key) {
        return Some(self.columns[*idx].id);
      }
    }
    None
  }

  fn find_nearest(&self, key: &Value) -> Option<ColumnId> {
    self
      .columns
      .iter()
      .filter(|c| !c.is_default)
      .min_by(|a, b| {
        let da = distance(key, a.value.as_ref().unwrap());
        let db = distance(key, b.value.as_ref().unwrap());
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
      })
      .map(|c| c.id)
  }

  /// All matching columns, honoring `fire_all` overlap on RANGE/SET axes
  /// (spec §4.2). Non-overlapping axis configurations return at most one.
  pub fn find_multi(&self, key: &Value) -> CoreResult<Vec<ColumnId>> {
    if !self.fire_all || !matches!(self.axis_type, AxisType::Range | AxisType::Set) {
      return Ok(self.find(key)?.into_iter().collect());
    }
    let mut hits: Vec<ColumnId> = self
      .active_columns()
      .iter()
      .filter(|c| match &c.value {
        Some(Value::Range(r)) => r.contains(key),
        Some(Value::RangeSet(rs)) => rs.contains(key),
        _ => false,
      })
      .map(|c| c.id)
      .collect();
    if hits.is_empty() {
      hits.extend(self.default_column().map(|c| c.id));
    }
    Ok(hits)
  }
}

/// Distance metric used by NEAREST axes (spec §4.2): Euclidean on `Point3D`,
/// great-circle on `LatLon`, absolute numeric difference otherwise.
fn distance(key: &Value, candidate: &Value) -> f64 {
  match (key, candidate) {
    (Value::Point3D(a), Value::Point3D(b)) => a.euclidean_distance(b),
    (Value::LatLon(a), Value::LatLon(b)) => a.great_circle_distance(b),
    (Value::Long(a), Value::Long(b)) => (*a - *b).unsigned_abs() as f64,
    (Value::Double(a), Value::Double(b)) => (a.0 - b.0).abs(),
    (Value::Comparable(crate::value::ComparableValue::LatLon(a)), Value::Comparable(crate::value::ComparableValue::LatLon(b))) => {
      a.great_circle_distance(b)
    }
    (Value::Comparable(crate::value::ComparableValue::Point3D(a)), Value::Comparable(crate::value::ComparableValue::Point3D(b))) => {
      a.euclidean_distance(b)
    }
    _ => f64::INFINITY,
  }
}
