mod cli;
use clap::Parser;
use cli::Cli;
use color_eyre::{eyre::eyre, Result};
use ncube::value::Value;
use std::collections::HashMap;
use std::fs;

fn parse_coordinate(entries: &[String]) -> Result<HashMap<String, Value>> {
  let mut input = HashMap::new();
  for entry in entries {
    let (key, value) = entry
      .split_once('=')
      .ok_or_else(|| eyre!("coordinate entry `{entry}` is not `key=value`"))?;
    input.insert(key.to_string(), Value::String(value.to_string()));
  }
  Ok(input)
}

fn main() -> Result<()> {
  color_eyre::install()?;
  if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
    tracing_subscriber::fmt().with_env_filter(filter).init();
  }

  let args = Cli::parse();
  let contents = fs::read_to_string(&args.input_path)?;
  let cube = ncube::json::import(&contents, &args.app_id, None)
    .map_err(|e| eyre!(e.to_string()))?;

  let input = parse_coordinate(&args.coordinate)?;
  let mut output = HashMap::new();
  let result = cube
    .get_cell(&input, &mut output, None)
    .map_err(|e| eyre!(e.to_string()))?;

  match output.get(&args.output) {
    Some(v) => println!("{v}"),
    None => println!("{result}"),
  }
  Ok(())
}
