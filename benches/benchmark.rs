use criterion::*;
use indexmap::IndexMap;
use ncube::axis::{Axis, AxisType, Order};
use ncube::cube::Cube;
use ncube::executor::CellValue;
use ncube::value::{Range, Value, ValueType};
use std::collections::HashMap;

/// Builds a cube with one DISCRETE `region` axis and one RANGE `age` axis,
/// `width` columns each, every cell populated, to exercise the variable-radix
/// enumeration across two bound axes (spec §4.4).
fn build_cube(width: i64) -> Cube {
  let mut region = Axis::new(1, "region", AxisType::Discrete, ValueType::String, Order::Sorted, false).unwrap();
  let mut region_ids = Vec::new();
  for i in 0..width {
    region_ids.push(region.add_column(Value::String(format!("region-{i:04}")), IndexMap::new()).unwrap());
  }

  let mut age = Axis::new(2, "age", AxisType::Range, ValueType::Long, Order::Sorted, false).unwrap();
  let mut age_ids = Vec::new();
  for i in 0..width {
    let low = i * 10;
    let high = low + 10;
    age_ids.push(
      age
        .add_column(Value::Range(Range::new(Value::Long(low), Value::Long(high))), IndexMap::new())
        .unwrap(),
    );
  }

  let mut cube = Cube::new("benchmark", "bench");
  cube.add_axis(region).unwrap();
  cube.add_axis(age).unwrap();

  for (i, &r) in region_ids.iter().enumerate() {
    let a = age_ids[i];
    cube.set_cell(&[r, a], CellValue::Value(Value::Long(i as i64))).unwrap();
  }
  cube
}

fn get_cell(c: &mut Criterion) {
  let mut group = c.benchmark_group("get_cell");
  for width in [8usize, 64, 512] {
    let cube = build_cube(width as i64);
    group.throughput(Throughput::Elements(1));
    group.bench_with_input(BenchmarkId::from_parameter(width), &cube, |b, cube| {
      b.iter(|| {
        let mut input = HashMap::new();
        input.insert("region".to_string(), Value::String(format!("region-{:04}", width / 2)));
        input.insert("age".to_string(), Value::Long((width as i64 / 2) * 10 + 1));
        let mut output = HashMap::new();
        black_box(cube.get_cell(&input, &mut output, None).ok());
      });
    });
  }
  group.finish();
}

fn digest(c: &mut Criterion) {
  let mut group = c.benchmark_group("digest");
  for width in [8usize, 64, 512] {
    let cube = build_cube(width as i64);
    group.bench_with_input(BenchmarkId::from_parameter(width), &cube, |b, cube| {
      b.iter(|| black_box(cube.digest()));
    });
  }
  group.finish();
}

criterion_group!(benches, get_cell, digest);
criterion_main!(benches);
