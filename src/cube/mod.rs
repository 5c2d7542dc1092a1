//! The sparse N-dimensional cell store (spec §3/§4.3/§4.6/§4.7, component C4).

pub mod digest;
pub mod eval;
pub mod scope;

pub use eval::get_cell;
pub use scope::ScopeKeys;

use crate::axis::Axis;
use crate::column::{Column, ColumnId};
use crate::error::{CoreError, CoreResult};
use crate::executor::{CellValue, Executable};
use crate::registry::CubeRegistry;
use crate::value::Value;
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// A coordinate key as stored in the sparse cell map: one column id per
/// axis, order-independent (spec §3: "cells keyed by an unordered set of
/// column references").
pub type CellKey = BTreeSet<ColumnId>;

/// The cube itself: a named set of axes plus the sparse map of cells they
/// address (spec §3/§4).
#[derive(Debug)]
pub struct Cube {
  pub name: String,
  pub app_id: String,
  pub meta: IndexMap<String, String>,
  axes: IndexMap<String, Axis>,
  cells: HashMap<CellKey, CellValue>,
  pub default_value: Option<CellValue>,
  digest_cache: Mutex<Option<String>>,
  scope_cache: Mutex<Option<ScopeKeys>>,
}

impl Cube {
  pub fn new(name: impl Into<String>, app_id: impl Into<String>) -> Self {
    Cube {
      name: name.into(),
      app_id: app_id.into(),
      meta: IndexMap::new(),
      axes: IndexMap::new(),
      cells: HashMap::new(),
      default_value: None,
      digest_cache: Mutex::new(None),
      scope_cache: Mutex::new(None),
    }
  }

  fn invalidate(&self) {
    *self.digest_cache.lock().expect("digest cache lock poisoned") = None;
    *self.scope_cache.lock().expect("scope cache lock poisoned") = None;
  }

  fn canonical_axis_name(&self, name: &str) -> Option<String> {
    self.axes.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()
  }

  pub fn axis(&self, name: &str) -> Option<&Axis> {
    self.canonical_axis_name(name).and_then(|k| self.axes.get(&k))
  }

  fn axis_mut(&mut self, name: &str) -> CoreResult<&mut Axis> {
    let canonical = self.canonical_axis_name(name).ok_or_else(|| CoreError::InvalidOperation {
      reason: format!("cube `{}` has no axis named `{}`", self.name, name),
    })?;
    Ok(self.axes.get_mut(&canonical).expect("canonical name came from this map"))
  }

  pub fn axes(&self) -> impl Iterator<Item = &Axis> {
    self.axes.values()
  }

  pub fn axis_count(&self) -> usize {
    self.axes.len()
  }

  /// Adding an axis changes every cell's required key cardinality, so the
  /// whole sparse map is invalidated (spec §4.3).
  pub fn add_axis(&mut self, axis: Axis) -> CoreResult<()> {
    if self.axis(&axis.name).is_some() {
      return Err(CoreError::InvalidOperation {
        reason: format!("cube `{}` already has an axis named `{}`", self.name, axis.name),
      });
    }
    self.axes.insert(axis.name.clone(), axis);
    self.cells.clear();
    self.invalidate();
    Ok(())
  }

  pub fn remove_axis(&mut self, name: &str) -> CoreResult<Axis> {
    let canonical = self.canonical_axis_name(name).ok_or_else(|| CoreError::InvalidOperation {
      reason: format!("cube `{}` has no axis named `{}`", self.name, name),
    })?;
    let axis = self.axes.shift_remove(&canonical).expect("canonical name came from this map");
    self.cells.clear();
    self.invalidate();
    Ok(axis)
  }

  pub fn add_column(
    &mut self,
    axis_name: &str,
    raw: Value,
    meta: IndexMap<String, String>,
  ) -> CoreResult<ColumnId> {
    let id = self.axis_mut(axis_name)?.add_column(raw, meta)?;
    self.invalidate();
    Ok(id)
  }

  pub fn add_rule_column(
    &mut self,
    axis_name: &str,
    condition: Arc<dyn Executable>,
    meta: IndexMap<String, String>,
  ) -> CoreResult<ColumnId> {
    let id = self.axis_mut(axis_name)?.add_rule_column(condition, meta)?;
    self.invalidate();
    Ok(id)
  }

  pub fn set_default_column(
    &mut self,
    axis_name: &str,
    meta: IndexMap<String, String>,
  ) -> CoreResult<ColumnId> {
    let id = self.axis_mut(axis_name)?.set_default_column(meta)?;
    self.invalidate();
    Ok(id)
  }

  pub fn update_column(&mut self, axis_name: &str, id: ColumnId, raw: Value) -> CoreResult<()> {
    self.axis_mut(axis_name)?.update_column(id, raw)?;
    self.invalidate();
    Ok(())
  }

  /// Deleting a column drops every cell that references it (spec §4.3).
  pub fn delete_column(&mut self, axis_name: &str, id: ColumnId) -> CoreResult<Column> {
    let removed = self.axis_mut(axis_name)?.delete_column(id)?;
    self.cells.retain(|key, _| !key.contains(&id));
    self.invalidate();
    Ok(removed)
  }

  pub fn move_column(&mut self, axis_name: &str, id: ColumnId, to_index: usize) -> CoreResult<()> {
    self.axis_mut(axis_name)?.move_column(id, to_index)?;
    self.invalidate();
    Ok(())
  }

  pub fn update_columns(
    &mut self,
    axis_name: &str,
    edits: Vec<(Option<ColumnId>, Value, IndexMap<String, String>)>,
  ) -> CoreResult<Vec<ColumnId>> {
    let deleted = self.axis_mut(axis_name)?.update_columns(edits)?;
    for id in &deleted {
      self.cells.retain(|key, _| !key.contains(id));
    }
    self.invalidate();
    Ok(deleted)
  }

  /// Sets the cell at `coordinate` (exactly one column id per axis). The
  /// axis each id belongs to is derived from the id itself (spec §4.7).
  pub fn set_cell(&mut self, coordinate: &[ColumnId], value: CellValue) -> CoreResult<()> {
    if coordinate.len() != self.axes.len() {
      return Err(CoreError::InvalidOperation {
        reason: format!(
          "cube `{}` requires {} coordinates, got {}",
          self.name,
          self.axes.len(),
          coordinate.len()
        ),
      });
    }
    let mut seen_axes = BTreeSet::new();
    for id in coordinate {
      let axis = self
        .axes
        .values()
        .find(|a| a.id == id.axis_id())
        .ok_or_else(|| CoreError::InvalidOperation {
          reason: format!("column {id} does not belong to any axis on cube `{}`", self.name),
        })?;
      if !seen_axes.insert(axis.id) {
        return Err(CoreError::InvalidOperation {
          reason: format!("coordinate binds axis `{}` more than once", axis.name),
        });
      }
    }
    let key: CellKey = coordinate.iter().copied().collect();
    self.cells.insert(key, value);
    self.invalidate();
    Ok(())
  }

  pub fn remove_cell(&mut self, coordinate: &[ColumnId]) -> Option<CellValue> {
    let key: CellKey = coordinate.iter().copied().collect();
    let removed = self.cells.remove(&key);
    if removed.is_some() {
      self.invalidate();
    }
    removed
  }

  pub fn cell(&self, coordinate: &[ColumnId]) -> Option<&CellValue> {
    let key: CellKey = coordinate.iter().copied().collect();
    self.cells.get(&key)
  }

  pub(crate) fn cell_by_key(&self, key: &CellKey) -> Option<&CellValue> {
    self.cells.get(key)
  }

  pub fn cell_count(&self) -> usize {
    self.cells.len()
  }

  /// All stored (non-default) cells, for export/iteration (spec §6).
  pub fn cell_entries(&self) -> impl Iterator<Item = (&CellKey, &CellValue)> {
    self.cells.iter()
  }

  /// Content-addressed digest over the cube's structure and cells (spec
  /// §4.7), cached and invalidated on every mutation.
  pub fn digest(&self) -> String {
    if let Some(cached) = self.digest_cache.lock().expect("digest cache lock poisoned").clone() {
      return cached;
    }
    let computed = digest::compute(self);
    *self.digest_cache.lock().expect("digest cache lock poisoned") = Some(computed.clone());
    computed
  }

  /// Required/optional scope keys (spec §4.6). The local (non-recursive)
  /// portion is cached; a registry-backed lookup always walks referenced
  /// cubes live, since which cubes a registry can see is call-site state we
  /// don't own.
  pub fn scope_keys(&self, registry: Option<&dyn CubeRegistry>) -> ScopeKeys {
    if registry.is_none() {
      if let Some(cached) = self.scope_cache.lock().expect("scope cache lock poisoned").clone() {
        return cached;
      }
    }
    let computed = scope::compute(self, registry);
    if registry.is_none() {
      *self.scope_cache.lock().expect("scope cache lock poisoned") = Some(computed.clone());
    }
    computed
  }

  pub fn get_cell(
    &self,
    input: &std::collections::HashMap<String, Value>,
    output: &mut std::collections::HashMap<String, Value>,
    registry: Option<&dyn CubeRegistry>,
  ) -> crate::error::CubeResult<Value> {
    eval::get_cell(self, input, output, registry)
  }
}
