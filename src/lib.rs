//! # ncube
//!
//! `ncube` is a multi-dimensional decision engine: an in-memory data
//! structure that maps an *input coordinate* (a mapping of named dimensions
//! to values) to a *cell* — a stored value or an executable expression —
//! through per-axis matching semantics. It powers rule-based decisioning,
//! lookup tables, and computed derivations in business-policy applications.
//!
//! ## Examples
//!
//! **Library**
//!
//! ```
//! use ncube::axis::{Axis, AxisType, Order};
//! use ncube::cube::Cube;
//! use ncube::executor::CellValue;
//! use ncube::value::{Value, ValueType};
//! use indexmap::IndexMap;
//! use std::collections::HashMap;
//!
//! let mut axis = Axis::new(1, "color", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
//! let red = axis.add_column(Value::String("red".into()), IndexMap::new()).unwrap();
//! let green = axis.add_column(Value::String("green".into()), IndexMap::new()).unwrap();
//!
//! let mut cube = Cube::new("colors", "demo");
//! cube.add_axis(axis).unwrap();
//! cube.set_cell(&[red], CellValue::Value(Value::Long(1))).unwrap();
//! cube.set_cell(&[green], CellValue::Value(Value::Long(2))).unwrap();
//!
//! let mut input = HashMap::new();
//! input.insert("color".to_string(), Value::String("green".into()));
//! let mut output = HashMap::new();
//! let result = cube.get_cell(&input, &mut output, None).unwrap();
//! assert_eq!(result, Value::Long(2));
//! ```
//!
//! **CLI**
//!
//! ```bash
//! $ ncube --input-path ./cube.json --coordinate color=green
//! ```
//!
//! This crate provides both a library and a CLI for evaluating decision
//! cubes. Key components, dependency-leaves-first:
//!
//! - [`value`] — typed, promoted comparable values (`Value`, `Range`, `RangeSet`).
//! - [`column`] — identified holder for a value plus display/sort metadata.
//! - [`axis`] — typed column container with five matching disciplines.
//! - [`cube`] — sparse N-axis cell store and the `get_cell` evaluation loop.
//! - [`executor`] — the interface and control-signal taxonomy between cells
//!   and the cube.
//! - [`registry`] — cross-cube name resolution collaborator trait.
//! - [`json`] — lossless JSON import/export of cubes.
//!
//! Supported feature flags:
//! - `cli` - command line interface.
//! - `insta` - enabled by default; gates nothing in the library itself but
//!   keeps parity with the dev-dependency used by the test suite.

pub mod axis;
pub mod column;
pub mod cube;
pub mod error;
pub mod executor;
pub mod json;
pub mod registry;
pub mod value;

pub use crate::cube::Cube;
pub use crate::error::{CoreError, CoreResult, CubeError, CubeResult};
pub use crate::value::Value;
