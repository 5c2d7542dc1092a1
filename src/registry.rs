//! Cross-cube name resolution (spec §6).
//!
//! A command cell that references another cube by name never touches that
//! cube's `Cube` struct directly; it goes through a `CubeRegistry`. The core
//! ships no implementation of this trait — persistence/CRUD across an
//! application's full cube set is explicitly out of scope — but the
//! evaluation loop and scope computation both need the lookup surface.

use crate::cube::Cube;
use std::sync::Arc;

/// Minimal collaborator contract for locating sibling cubes by application
/// id and name (spec §6). Implementations are free to back this with a
/// database, a file tree, or an in-memory map; the core only depends on the
/// trait.
pub trait CubeRegistry: Send + Sync {
  /// Looks up a cube by (application id, name), case-insensitive on name.
  fn get_cube(&self, app_id: &str, name: &str) -> Option<Arc<Cube>>;

  /// Registers a cube under the given application id.
  fn add_cube(&self, app_id: &str, cube: Arc<Cube>);
}
