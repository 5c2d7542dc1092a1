//! Content-addressed, order-independent SHA-1 digest (spec §4.7).
//!
//! Two cubes with identical axes and cells hash identically regardless of
//! insertion order or internal map iteration order: axes are visited in
//! name order, each axis's columns in id order, and cells are hashed
//! individually then sorted before the final concatenation.

use super::Cube;
use crate::executor::CellValue;
use crate::value::Value;
use sha1::{Digest, Sha1};

fn to_hex(bytes: &[u8]) -> String {
  let mut s = String::with_capacity(bytes.len() * 2);
  for b in bytes {
    s.push_str(&format!("{b:02x}"));
  }
  s
}

fn sha1_hex(input: &str) -> String {
  let mut hasher = Sha1::new();
  hasher.update(input.as_bytes());
  to_hex(&hasher.finalize())
}

fn meta_repr(meta: &indexmap::IndexMap<String, String>) -> String {
  let mut entries: Vec<(&String, &String)> = meta.iter().collect();
  entries.sort_by_key(|(k, _)| k.clone());
  entries.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(";")
}

fn axis_section(cube: &Cube) -> String {
  let mut axis_names: Vec<&str> = cube.axes().map(|a| a.name.as_str()).collect();
  axis_names.sort_by_key(|n| n.to_lowercase());

  let mut buf = String::new();
  for name in axis_names {
    let axis = cube.axis(name).expect("name came from this cube's own axes");
    // Per spec §4.7: name (lowercased), order, type, value_type, hasDefault,
    // fire_all, then axis meta, then each non-default column in id order.
    buf.push_str(&format!(
      "axis|{}|{:?}|{:?}|{:?}|{}|{}|{}\n",
      axis.name.to_lowercase(),
      axis.order,
      axis.axis_type,
      axis.value_type,
      axis.has_default(),
      axis.fire_all,
      meta_repr(&axis.meta),
    ));
    let mut columns: Vec<_> = axis.columns().iter().filter(|c| !c.is_default).collect();
    columns.sort_by_key(|c| c.id);
    for column in columns {
      let value_repr = column.value.as_ref().map(Value::to_string).unwrap_or_default();
      buf.push_str(&format!("  col|{}|{}|{}\n", column.id, value_repr, meta_repr(&column.meta)));
    }
  }
  buf
}

fn cell_value_repr(cell: &CellValue) -> String {
  match cell {
    // A command cell's own digest surface is its presence, not its
    // behavior: the core has no visibility into an `Executable`'s
    // internals, which live in the scripting runtime this crate excludes.
    CellValue::Command(_) => "command".to_string(),
    CellValue::Value(v) => format!("value:{v}"),
  }
}

/// Computes the digest fresh from `cube`'s current state.
pub fn compute(cube: &Cube) -> String {
  let axes_bytes = axis_section(cube);

  let mut cell_hashes: Vec<String> = cube
    .cells
    .iter()
    .map(|(key, value)| {
      let mut ids: Vec<u64> = key.iter().map(|id| id.0).collect();
      ids.sort_unstable();
      let key_repr = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
      sha1_hex(&format!("{key_repr}|{}", cell_value_repr(value)))
    })
    .collect();
  cell_hashes.sort();

  let default_repr = cube.default_value.as_ref().map(cell_value_repr).unwrap_or_default();

  // Per spec §4.7 the hash starts from (name, default_value, meta), so a
  // rename or a meta edit changes the digest even with identical axes/cells.
  sha1_hex(&format!(
    "name:{}\nmeta:{}\n{axes_bytes}---\n{}\ndefault:{default_repr}",
    cube.name,
    meta_repr(&cube.meta),
    cell_hashes.join("\n")
  ))
}
