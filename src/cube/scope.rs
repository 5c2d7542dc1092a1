//! Required/optional scope key computation (spec §4.6).
//!
//! "Required" scope is the set of `input` keys a caller must supply for
//! `get_cell` to have any chance of finding a cell: every non-default,
//! non-rule axis, plus anything the cube's own meta declares. "Optional"
//! scope is everything a cell or rule condition might *read* but isn't
//! required to be present: rule axes, axes with a default column, any
//! `input.<name>` reference inside a command cell, and the optional scope
//! of any cube reachable through a registry lookup.

use super::Cube;
use crate::axis::AxisType;
use crate::registry::CubeRegistry;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeKeys {
  pub required: BTreeSet<String>,
  pub optional: BTreeSet<String>,
}

/// The non-recursive portion: this cube's own axes, meta, and the direct
/// `input.*` references its own command cells and rule conditions carry.
fn local_scope(cube: &Cube) -> ScopeKeys {
  let mut required = BTreeSet::new();
  let mut optional = BTreeSet::new();

  for axis in cube.axes() {
    if axis.axis_type == AxisType::Rule || axis.has_default() {
      optional.insert(axis.name.clone());
    } else {
      required.insert(axis.name.clone());
    }
    if axis.axis_type == AxisType::Rule {
      for column in axis.columns() {
        if let Some(condition) = &column.condition {
          for key in condition.scope_keys() {
            optional.insert(key);
          }
        }
      }
    }
  }

  if let Some(declared) = cube.meta.get("requiredScopeKeys") {
    for key in declared.split(',').map(str::trim).filter(|s| !s.is_empty()) {
      required.insert(key.to_string());
    }
  }

  for cell in cube.cells.values() {
    if let crate::executor::CellValue::Command(exec) = cell {
      for key in exec.scope_keys() {
        optional.insert(key);
      }
    }
  }
  if let Some(crate::executor::CellValue::Command(exec)) = &cube.default_value {
    for key in exec.scope_keys() {
      optional.insert(key);
    }
  }

  optional = optional.difference(&required).cloned().collect();
  ScopeKeys { required, optional }
}

/// Cube names this cube's cells and rule conditions reference, for the
/// recursive optional-scope walk.
fn referenced_cube_names(cube: &Cube) -> BTreeSet<String> {
  let mut names = BTreeSet::new();
  for axis in cube.axes() {
    if axis.axis_type == AxisType::Rule {
      for column in axis.columns() {
        if let Some(condition) = &column.condition {
          names.extend(condition.referenced_cube_names());
        }
      }
    }
  }
  for cell in cube.cells.values() {
    if let crate::executor::CellValue::Command(exec) = cell {
      names.extend(exec.referenced_cube_names());
    }
  }
  if let Some(crate::executor::CellValue::Command(exec)) = &cube.default_value {
    names.extend(exec.referenced_cube_names());
  }
  names
}

/// Full scope, recursing through `registry` to union in the optional scope
/// of every cube this one references. Cycle-safe: a cube already on the
/// visit path contributes nothing further (spec §4.6 "cycle-safe").
pub fn compute(cube: &Cube, registry: Option<&dyn CubeRegistry>) -> ScopeKeys {
  let mut visited = BTreeSet::new();
  compute_inner(cube, registry, &mut visited)
}

fn compute_inner(
  cube: &Cube,
  registry: Option<&dyn CubeRegistry>,
  visited: &mut BTreeSet<String>,
) -> ScopeKeys {
  let key = format!("{}::{}", cube.app_id, cube.name.to_lowercase());
  if !visited.insert(key) {
    return ScopeKeys::default();
  }

  let mut scope = local_scope(cube);

  if let Some(registry) = registry {
    for name in referenced_cube_names(cube) {
      if let Some(referenced) = registry.get_cube(&cube.app_id, &name) {
        let child = compute_inner(&referenced, Some(registry), visited);
        for key in child.required.into_iter().chain(child.optional) {
          if !scope.required.contains(&key) {
            scope.optional.insert(key);
          }
        }
      }
    }
  }

  scope
}
